pub mod analysis;
pub mod config;
pub mod entry;
pub mod orchestrator;
pub mod resources;
pub mod risk;
pub mod session;
pub mod store;

pub use analysis::{AnalysisService, HttpAnalysisClient};
pub use config::Config;
pub use entry::{IconKey, JournalEntry, SuggestedAction};
pub use orchestrator::{SubmissionOrchestrator, SubmissionOutcome};
pub use resources::{ResourceBundle, ResourceSelector};
pub use risk::{RiskCategory, RiskClassifier};
pub use session::Session;
pub use store::{BlobStore, EntryStore, FileBlobStore, MemoryBlobStore};
