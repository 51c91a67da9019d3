//! Contract analysis pipeline: prompt composition, model invocation, and
//! validation of the model's JSON reply into a typed analysis.
//!
//! Stages run strictly in sequence for each request:
//! resolve → [`compose`] → [`invoke`] → [`validate`] → assemble → persist.

pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod validate;

pub use model::{
    ConfigError, GeminiClient, ModelConfig, ModelError, RawModelOutput, RetryPolicy, TextModel,
    invoke,
};
pub use pipeline::{AnalysisError, AnalysisOutcome, AnalysisRequest, Analyzer};
pub use prompt::{MAX_SOURCE_CHARS, PromptDocument, compose};
pub use validate::{Degradation, Validated, ValidationError, strip_code_fences, validate};
