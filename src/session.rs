use tracing::info;

use crate::aggregate::{correlate, BatchSummary, CorrelatedEntry};
use crate::error::{FileSetError, SubmitError, ValidationError};
use crate::file_set::{AddOutcome, FileSetManager};
use crate::models::{BatchResult, MediaItem, ParameterField};
use crate::orchestrator::{SubmissionPhase, UploadProcessOrchestrator};
use crate::params::ParameterForm;

/// One upload-and-analyze screen: selection, parameters, last outcome.
///
/// Any change to the selection invalidates the last result.
#[derive(Debug)]
pub struct BatchSession {
    files: FileSetManager,
    form: ParameterForm,
    orchestrator: UploadProcessOrchestrator,
    result: Option<BatchResult>,
    submitted_names: Vec<String>,
    uploaded_names: Vec<String>,
    error: Option<String>,
}

impl BatchSession {
    pub fn new(orchestrator: UploadProcessOrchestrator) -> Self {
        Self {
            files: FileSetManager::new(),
            form: ParameterForm::new(),
            orchestrator,
            result: None,
            submitted_names: Vec::new(),
            uploaded_names: Vec::new(),
            error: None,
        }
    }

    pub fn files(&self) -> &FileSetManager {
        &self.files
    }

    pub fn form(&self) -> &ParameterForm {
        &self.form
    }

    pub fn orchestrator(&self) -> &UploadProcessOrchestrator {
        &self.orchestrator
    }

    pub fn result(&self) -> Option<&BatchResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> SubmissionPhase {
        self.orchestrator.phase()
    }

    /// False while a submission is in flight.
    pub fn can_submit(&self) -> bool {
        !self.orchestrator.is_busy()
    }

    pub fn add_files(
        &mut self,
        candidates: impl IntoIterator<Item = MediaItem>,
    ) -> Result<AddOutcome, ValidationError> {
        self.error = None;
        match self.files.add_files(candidates) {
            Ok(outcome) => {
                self.clear_result();
                Ok(outcome)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Result<MediaItem, FileSetError> {
        let removed = self.files.remove_at(index)?;
        self.clear_result();
        Ok(removed)
    }

    pub fn reset(&mut self) {
        self.files.reset();
        self.clear_result();
        self.error = None;
        info!("[session] Reset");
    }

    pub fn set_parameter(&mut self, field: ParameterField, value: impl Into<String>) {
        self.form.set_field(field, value);
    }

    pub fn set_parameter_by_name(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.form.set_field_by_name(name, value)
    }

    /// Submits the current selection. The previous result and error are
    /// cleared first; the outcome's message is kept in [`error`](Self::error).
    pub async fn submit(&mut self) -> Result<&BatchResult, SubmitError> {
        if !self.can_submit() {
            return Err(SubmitError::AlreadyInProgress);
        }

        self.error = None;
        self.clear_result();

        match self.orchestrator.run(self.files.items(), &self.form).await {
            Ok(submission) => {
                self.submitted_names = self
                    .files
                    .items()
                    .iter()
                    .map(|item| item.display_name().to_string())
                    .collect();
                self.uploaded_names = submission.uploaded;
                Ok(self.result.insert(submission.result))
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn summary(&self) -> Option<BatchSummary> {
        self.result.as_ref().map(BatchSummary::from_result)
    }

    /// Results matched back to the selected videos by upload position.
    pub fn correlated(&self) -> Vec<CorrelatedEntry> {
        match &self.result {
            Some(result) => correlate(result, &self.submitted_names, &self.uploaded_names),
            None => Vec::new(),
        }
    }

    fn clear_result(&mut self) {
        self.result = None;
        self.submitted_names.clear();
        self.uploaded_names.clear();
    }
}
