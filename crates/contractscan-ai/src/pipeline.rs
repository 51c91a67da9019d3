//! End-to-end analysis of one contract.
//!
//! [`Analyzer`] owns the two collaborators a request needs (a [`TextModel`]
//! and a [`RecordStore`]) and runs the stages in order. Nothing is persisted
//! until validation has succeeded, so a failed or abandoned request never
//! leaves a partial record behind.

use std::time::{Duration, Instant};

use contractscan_core::{
    AnalysisRecord, JurisdictionProfile, OwnerId, RequestMeta, assemble, resolve,
};
use contractscan_store::{RecordStore, StoreError};
use thiserror::Error;
use tracing::{error, info};

use crate::model::{ModelError, RetryPolicy, TextModel, invoke};
use crate::prompt::compose;
use crate::validate::{Degradation, ValidationError, validate};

/// Raw model text longer than this is cut in log lines. The error value
/// keeps the full text.
const RAW_LOG_CHARS: usize = 2_000;

/// Why an analysis request produced no record.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("model invocation failed: {0}")]
    ModelInvocationFailed(#[from] ModelError),
    #[error("malformed model response: {0}")]
    MalformedResponse(#[from] ValidationError),
    #[error("failed to persist analysis: {0}")]
    Store(#[from] StoreError),
    #[error("analysis deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl AnalysisError {
    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ModelInvocationFailed(e) => e.is_retryable(),
            Self::DeadlineExceeded(_) => true,
            Self::MalformedResponse(_) | Self::Store(_) => false,
        }
    }

    /// The model's raw output, when the failure was a malformed response.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse(e) => Some(e.raw()),
            _ => None,
        }
    }
}

/// One uploaded contract to analyse.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub owner_id: OwnerId,
    pub file_name: String,
    pub profile: &'static JurisdictionProfile,
    pub source_text: String,
}

impl AnalysisRequest {
    /// Build a request, resolving `jurisdiction_id` (unknown ids mean Global).
    pub fn new(
        owner_id: OwnerId,
        file_name: impl Into<String>,
        jurisdiction_id: &str,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            owner_id,
            file_name: file_name.into(),
            profile: resolve(jurisdiction_id),
            source_text: source_text.into(),
        }
    }
}

/// A persisted analysis plus what it took to produce it.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub record: AnalysisRecord,
    /// Corrections applied to the model output. Empty for a clean reply.
    pub degradations: Vec<Degradation>,
    /// Model calls made, including retries.
    pub model_attempts: u32,
}

/// Runs compose → invoke → validate → assemble → persist for each request.
///
/// Requests share no mutable state; one `Analyzer` can serve any number of
/// concurrent requests.
pub struct Analyzer<M, S> {
    model: M,
    store: S,
    retry: RetryPolicy,
}

impl<M: TextModel, S: RecordStore> Analyzer<M, S> {
    /// An analyzer that makes a single model attempt per request.
    pub fn new(model: M, store: S) -> Self {
        Self {
            model,
            store,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Analyse one contract and persist the result.
    ///
    /// Dropping the returned future abandons the model call; no record is
    /// created in that case.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let started = Instant::now();
        let profile = request.profile;

        let prompt = compose(profile, &request.source_text);
        info!(
            jurisdiction = %profile.id,
            file = %request.file_name,
            owner = %request.owner_id,
            excerpt_chars = prompt.excerpt_chars(),
            truncated = prompt.is_truncated(),
            "analysis started"
        );

        let raw = invoke(&self.model, &prompt, &self.retry).await?;

        let validated = match validate(&raw.text, profile, &request.source_text) {
            Ok(v) => v,
            Err(e) => {
                error!(
                    jurisdiction = %profile.id,
                    file = %request.file_name,
                    error = %e,
                    raw = log_excerpt(e.raw()),
                    "model returned an unusable response"
                );
                return Err(e.into());
            }
        };

        let record = assemble(
            validated.result,
            RequestMeta {
                owner_id: request.owner_id,
                file_name: request.file_name,
                jurisdiction: profile.id,
                source_text: request.source_text,
            },
        );
        let record = self.store.create(record)?;

        info!(
            id = %record.id,
            risk_score = record.analysis.risk_score,
            clauses = record.analysis.clauses.len(),
            missing = record.analysis.missing().count(),
            degradations = validated.degradations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis stored"
        );

        Ok(AnalysisOutcome {
            record,
            degradations: validated.degradations,
            model_attempts: raw.attempts,
        })
    }

    /// [`analyze`](Self::analyze) bounded by `deadline`.
    pub async fn analyze_with_deadline(
        &self,
        request: AnalysisRequest,
        deadline: Duration,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        match tokio::time::timeout(deadline, self.analyze(request)).await {
            Ok(result) => result,
            Err(_) => {
                error!(deadline_ms = deadline.as_millis() as u64, "analysis deadline exceeded");
                Err(AnalysisError::DeadlineExceeded(deadline))
            }
        }
    }
}

fn log_excerpt(raw: &str) -> &str {
    match raw.char_indices().nth(RAW_LOG_CHARS) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
