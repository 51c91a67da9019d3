mod display;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use contractscan_ai::model::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use contractscan_ai::{
    AnalysisError, AnalysisRequest, Analyzer, GeminiClient, ModelConfig, RetryPolicy, compose,
};
use contractscan_core::{Jurisdiction, OwnerId, RecordId, resolve};
use contractscan_store::{DuckStore, RecordStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "contractscan",
    version,
    about = "Jurisdiction-aware contract risk analysis"
)]
struct Cli {
    /// Path to the DuckDB file holding analysis records
    #[arg(long, global = true, env = "CONTRACTSCAN_DB", default_value = "contractscan.duckdb")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a plain-text contract and store the result
    Analyze {
        /// Contract text file
        file: PathBuf,

        /// Jurisdiction: Global, India, US or UK (unknown values mean Global)
        #[arg(short, long, default_value = "Global")]
        jurisdiction: String,

        #[command(flatten)]
        owner: OwnerArgs,

        /// Display name stored on the record (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Print the prompt that would be sent for a contract (no network)
    Prompt {
        /// Contract text file
        file: PathBuf,

        #[arg(short, long, default_value = "Global")]
        jurisdiction: String,
    },
    /// List stored analyses, newest first
    List {
        #[command(flatten)]
        owner: OwnerArgs,

        #[arg(long)]
        json: bool,
    },
    /// Show one stored analysis
    Show {
        /// Record id
        id: RecordId,

        #[command(flatten)]
        owner: OwnerArgs,

        #[arg(long)]
        json: bool,
    },
    /// Delete one stored analysis
    Delete {
        /// Record id
        id: RecordId,

        #[command(flatten)]
        owner: OwnerArgs,
    },
    /// List supported jurisdictions and their standard-clause checklists
    Jurisdictions,
}

#[derive(Args)]
struct OwnerArgs {
    /// Owner the records belong to
    #[arg(long, env = "CONTRACTSCAN_OWNER", default_value = "local")]
    owner: String,
}

impl OwnerArgs {
    fn id(&self) -> OwnerId {
        OwnerId::new(self.owner.trim())
    }
}

#[derive(Args)]
struct ModelArgs {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model id
    #[arg(long, env = "CONTRACTSCAN_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Model service root URL
    #[arg(long, env = "CONTRACTSCAN_MODEL_URL", default_value = DEFAULT_BASE_URL)]
    model_url: String,

    /// Per-call HTTP timeout in seconds
    #[arg(long, env = "CONTRACTSCAN_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Deadline for the whole analysis, retries included, in seconds
    #[arg(long, env = "CONTRACTSCAN_DEADLINE_SECS", default_value_t = 300)]
    deadline_secs: u64,

    /// Extra attempts after a transient model failure
    #[arg(long, env = "CONTRACTSCAN_RETRIES", default_value_t = 0)]
    retries: u32,
}

impl ModelArgs {
    fn config(&self) -> ModelConfig {
        ModelConfig {
            model: self.model.clone(),
            base_url: self.model_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            ..ModelConfig::new(self.api_key.clone().unwrap_or_default())
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.retries.saturating_add(1))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            file,
            jurisdiction,
            owner,
            name,
            json,
            model,
        } => {
            let source_text = read_contract(&file).await?;
            let file_name = name.unwrap_or_else(|| display_name(&file));

            // Fail on bad credentials before touching the database.
            let client =
                GeminiClient::new(model.config()).context("invalid model configuration")?;
            let store = open_store(&cli.db)?;
            let analyzer = Analyzer::new(client, store).with_retry(model.retry_policy());

            let jurisdiction = canonical_jurisdiction(&jurisdiction);
            let request = AnalysisRequest::new(owner.id(), file_name, &jurisdiction, source_text);
            let deadline = Duration::from_secs(model.deadline_secs);

            let outcome = tokio::select! {
                result = analyzer.analyze_with_deadline(request, deadline) => match result {
                    Ok(outcome) => outcome,
                    Err(e) => return Err(report_failure(e)),
                },
                _ = tokio::signal::ctrl_c() => {
                    warn!("interrupted, analysis abandoned");
                    bail!("interrupted");
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.record)?);
            } else {
                display::print_degradations(&outcome.degradations);
                display::print_record_card(&outcome.record);
            }
        }

        Command::Prompt { file, jurisdiction } => {
            let source_text = read_contract(&file).await?;
            let prompt = compose(resolve(&canonical_jurisdiction(&jurisdiction)), &source_text);
            if prompt.is_truncated() {
                warn!(
                    kept_chars = prompt.excerpt_chars(),
                    "contract text truncated for the prompt"
                );
            }
            println!("{}", prompt.as_str());
        }

        Command::List { owner, json } => {
            let store = open_store(&cli.db)?;
            let records = store.find_all_by_owner(&owner.id())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                display::print_record_table(&records);
            }
        }

        Command::Show { id, owner, json } => {
            let store = open_store(&cli.db)?;
            let Some(record) = store.find_by_id(&owner.id(), &id)? else {
                bail!("no analysis {id} for owner {}", owner.owner);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                display::print_record_card(&record);
            }
        }

        Command::Delete { id, owner } => {
            let store = open_store(&cli.db)?;
            if !store.delete_by_id(&owner.id(), &id)? {
                bail!("no analysis {id} for owner {}", owner.owner);
            }
            info!(%id, "analysis deleted");
            println!("Deleted {id}");
        }

        Command::Jurisdictions => display::print_jurisdictions(),
    }

    Ok(())
}

/// Map user input such as `india` or ` uk ` onto the canonical id. Anything
/// else is passed through and resolves to Global.
fn canonical_jurisdiction(input: &str) -> String {
    let trimmed = input.trim();
    Jurisdiction::ALL
        .into_iter()
        .find(|j| j.as_str().eq_ignore_ascii_case(trimmed))
        .map_or_else(|| trimmed.to_string(), |j| j.as_str().to_string())
}

fn open_store(path: &Path) -> anyhow::Result<DuckStore> {
    DuckStore::open_persistent(path)
        .with_context(|| format!("failed to open record store {}", path.display()))
}

async fn read_contract(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read contract text from {}", path.display()))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Attach operator hints to a failed analysis.
fn report_failure(e: AnalysisError) -> anyhow::Error {
    if let Some(raw) = e.raw_output() {
        eprintln!("--- raw model output ---\n{raw}\n--- end raw model output ---");
    }
    let hint = if e.is_retryable() {
        "analysis failed (transient, safe to retry)"
    } else {
        "analysis failed"
    };
    anyhow::Error::new(e).context(hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_analyze_with_defaults() {
        let cli = Cli::try_parse_from(["contractscan", "analyze", "nda.txt", "-j", "India"]).unwrap();
        assert_eq!(cli.db, PathBuf::from("contractscan.duckdb"));
        let Command::Analyze {
            file,
            jurisdiction,
            name,
            json,
            model,
            ..
        } = cli.command
        else {
            panic!("expected analyze");
        };
        assert_eq!(file, PathBuf::from("nda.txt"));
        assert_eq!(jurisdiction, "India");
        assert!(name.is_none());
        assert!(!json);
        assert_eq!(model.model, DEFAULT_MODEL);
        assert_eq!(model.retry_policy().max_attempts, 1);
    }

    #[test]
    fn retries_flag_adds_attempts() {
        let cli = Cli::try_parse_from([
            "contractscan",
            "analyze",
            "nda.txt",
            "--retries",
            "2",
            "--api-key",
            "k",
        ])
        .unwrap();
        let Command::Analyze { model, .. } = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(model.retry_policy().max_attempts, 3);
        assert_eq!(model.config().api_key, "k");
    }

    #[test]
    fn show_rejects_malformed_id() {
        assert!(Cli::try_parse_from(["contractscan", "show", "not-a-uuid"]).is_err());
    }

    #[test]
    fn jurisdiction_flag_is_case_insensitive() {
        assert_eq!(canonical_jurisdiction(" india "), "India");
        assert_eq!(canonical_jurisdiction("us"), "US");
        assert_eq!(canonical_jurisdiction("UK"), "UK");
        assert_eq!(canonical_jurisdiction("France"), "France");
        assert_eq!(resolve(&canonical_jurisdiction("uk")).id, Jurisdiction::Uk);
    }

    #[test]
    fn display_name_uses_file_name() {
        assert_eq!(display_name(Path::new("/tmp/contracts/lease.txt")), "lease.txt");
    }
}
