pub mod aggregate;
pub mod config;
pub mod error;
pub mod file_set;
pub mod models;
pub mod orchestrator;
pub mod params;
pub mod preview;
pub mod session;

pub use aggregate::{BatchSummary, CorrelatedEntry, EntryOutcome, ResultEntry};
pub use config::Config;
pub use error::{FileSetError, SubmitError, ValidationError};
pub use file_set::{AddOutcome, FileSetManager, BATCH_SIZE};
pub use models::{BatchResult, MediaItem, ParameterField, ParameterSet, PerFileMetrics, PerFileResult};
pub use orchestrator::{Submission, SubmissionPhase, UploadProcessOrchestrator};
pub use params::ParameterForm;
pub use preview::{PreviewHandle, PreviewRegistry};
pub use session::BatchSession;
