pub mod analysis;
pub mod jurisdiction;
pub mod record;

pub use analysis::{
    AnalysisResult, Clause, ClauseStatus, MissingClauseFinding, RiskBand, RiskLevel,
};
pub use jurisdiction::{ComplianceRule, Jurisdiction, JurisdictionProfile, resolve};
pub use record::{AnalysisRecord, OwnerId, RecordId, RequestMeta, assemble};
