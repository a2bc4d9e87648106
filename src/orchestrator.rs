use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{SubmitError, ValidationError};
use crate::file_set::BATCH_SIZE;
use crate::models::{
    BatchResult, ErrorResponse, MediaItem, ParameterSet, ProcessRequest, UploadResponse,
};
use crate::params::ParameterForm;

pub const UPLOAD_FALLBACK: &str = "Upload failed";
pub const PROCESS_FALLBACK: &str = "Processing failed";
pub const ABORTED_MESSAGE: &str = "submission aborted";

/// Where the current (or last) submission stands.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionPhase {
    Idle,
    Uploading,
    Processing,
    /// Carries the filenames the upload service confirmed, in upload order.
    Succeeded { uploaded: Vec<String> },
    Failed { message: String },
}

impl SubmissionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionPhase::Idle => "Idle",
            SubmissionPhase::Uploading => "Uploading",
            SubmissionPhase::Processing => "Processing",
            SubmissionPhase::Succeeded { .. } => "Succeeded",
            SubmissionPhase::Failed { .. } => "Failed",
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, SubmissionPhase::Uploading | SubmissionPhase::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionPhase::Succeeded { .. } | SubmissionPhase::Failed { .. }
        )
    }
}

impl fmt::Display for SubmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Holds the busy flag for one submission. Dropping it publishes the
/// terminal phase and then clears the flag, on every exit path.
struct BusyGuard {
    busy: Arc<AtomicBool>,
    phase: Arc<watch::Sender<SubmissionPhase>>,
    outcome: Option<SubmissionPhase>,
}

impl BusyGuard {
    fn acquire(busy: &Arc<AtomicBool>, phase: &Arc<watch::Sender<SubmissionPhase>>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self {
            busy: Arc::clone(busy),
            phase: Arc::clone(phase),
            outcome: None,
        })
    }

    fn enter(&self, phase: SubmissionPhase) {
        self.phase.send_replace(phase);
    }

    fn finish(mut self, outcome: SubmissionPhase) {
        self.outcome = Some(outcome);
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let outcome = self.outcome.take();
        let busy = &self.busy;
        // Busy is cleared under the channel lock, so the next submission's
        // first phase is always published after this outcome.
        self.phase.send_if_modified(|phase| {
            let modified = match outcome {
                Some(outcome) => {
                    *phase = outcome;
                    true
                }
                None if phase.is_in_flight() => {
                    warn!("[submit] Submission dropped mid-flight");
                    *phase = SubmissionPhase::Failed {
                        message: ABORTED_MESSAGE.to_string(),
                    };
                    true
                }
                None => false,
            };
            busy.store(false, Ordering::Release);
            modified
        });
    }
}

/// A finished submission: the process response and the filenames the upload
/// service confirmed, in upload order.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub uploaded: Vec<String>,
    pub result: BatchResult,
}

/// Drives rename → upload → process for one batch of four videos.
///
/// Clones share the busy flag and phase, so only one submission runs at a
/// time across all of them.
#[derive(Clone, Debug)]
pub struct UploadProcessOrchestrator {
    client: Client,
    base_url: String,
    upload_field: String,
    strict_parameters: bool,
    busy: Arc<AtomicBool>,
    phase: Arc<watch::Sender<SubmissionPhase>>,
}

impl UploadProcessOrchestrator {
    pub fn new(config: &Config) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &Config) -> Self {
        let (phase, _) = watch::channel(SubmissionPhase::Idle);
        Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            upload_field: config.upload_field.clone(),
            strict_parameters: config.strict_parameters,
            busy: Arc::new(AtomicBool::new(false)),
            phase: Arc::new(phase),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.phase.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionPhase> {
        self.phase.subscribe()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Runs one submission to completion. Never issues a request when the
    /// preconditions fail or another submission holds the busy flag.
    pub async fn submit(
        &self,
        items: &[MediaItem],
        form: &ParameterForm,
    ) -> Result<BatchResult, SubmitError> {
        self.run(items, form).await.map(|submission| submission.result)
    }

    /// Like [`submit`](Self::submit), also returning the confirmed filenames.
    pub async fn run(
        &self,
        items: &[MediaItem],
        form: &ParameterForm,
    ) -> Result<Submission, SubmitError> {
        let guard = match BusyGuard::acquire(&self.busy, &self.phase) {
            Some(guard) => guard,
            None => {
                warn!("[submit] Rejected: a submission is already in progress");
                return Err(SubmitError::AlreadyInProgress);
            }
        };

        let parameters = self.check_preconditions(items, form).map_err(|e| {
            warn!("[submit] Rejected: {}", e);
            e
        })?;

        guard.enter(SubmissionPhase::Uploading);
        let renamed = rename_batch(unix_millis(), items);

        let uploaded = match self.upload(items, &renamed).await {
            Ok(files) => files,
            Err(message) => {
                error!("[upload] ❌ {}", message);
                guard.finish(SubmissionPhase::Failed {
                    message: message.clone(),
                });
                return Err(SubmitError::Upload(message));
            }
        };

        guard.enter(SubmissionPhase::Processing);

        let result = match self.process(&uploaded, parameters).await {
            Ok(result) => result,
            Err(message) => {
                error!("[process] ❌ {}", message);
                guard.finish(SubmissionPhase::Failed {
                    message: message.clone(),
                });
                return Err(SubmitError::Processing(message));
            }
        };

        guard.finish(SubmissionPhase::Succeeded {
            uploaded: uploaded.clone(),
        });
        Ok(Submission { uploaded, result })
    }

    fn check_preconditions(
        &self,
        items: &[MediaItem],
        form: &ParameterForm,
    ) -> Result<ParameterSet, ValidationError> {
        if items.len() != BATCH_SIZE {
            return Err(ValidationError::WrongFileCount { found: items.len() });
        }
        form.validate_complete()?;

        if self.strict_parameters {
            form.coerce_strict()
        } else {
            Ok(form.coerce())
        }
    }

    async fn upload(&self, items: &[MediaItem], renamed: &[String]) -> Result<Vec<String>, String> {
        let total_bytes: usize = items.iter().map(MediaItem::size).sum();
        info!(
            "[upload] 📤 Sending {} files ({:.2} MB) to {}",
            items.len(),
            total_bytes as f64 / 1024.0 / 1024.0,
            self.endpoint("upload")
        );

        let mut form = Form::new();
        for (item, name) in items.iter().zip(renamed) {
            let part = Part::stream_with_length(item.payload.clone(), item.size() as u64)
                .file_name(name.clone())
                .mime_str(&item.mime_type)
                .map_err(|e| format!("Invalid content type {}: {}", item.mime_type, e))?;
            form = form.part(self.upload_field.clone(), part);
        }

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let body: UploadResponse = read_json(response, UPLOAD_FALLBACK).await?;

        if let Some(message) = &body.message {
            info!("[upload] {}", message);
        }
        if body.files.len() != items.len() {
            warn!(
                "[upload] Service confirmed {} files for {} sent",
                body.files.len(),
                items.len()
            );
        }
        info!("[upload] ✅ Stored as: {}", body.files.join(", "));

        Ok(body.files)
    }

    async fn process(&self, files: &[String], parameters: ParameterSet) -> Result<BatchResult, String> {
        info!("[process] ⚙️  Processing {} files at {}", files.len(), self.endpoint("process"));

        let response = self
            .client
            .post(self.endpoint("process"))
            .json(&ProcessRequest { files, parameters })
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let result: BatchResult = read_json(response, PROCESS_FALLBACK).await?;

        info!(
            "[process] ✅ Intersection {}: {} results",
            result.intersection,
            result.results.len()
        );
        Ok(result)
    }
}

/// Reads a JSON body, or the service's `{error}` message on a non-2xx status.
async fn read_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T, String> {
    let status = response.status();
    let text = response.text().await.map_err(|e| e.to_string())?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .ok()
            .and_then(|body| body.error)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        warn!("[http] {} answered {}", fallback, status);
        return Err(message);
    }

    serde_json::from_str(&text).map_err(|e| format!("Invalid response from service: {}", e))
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Replaces everything outside `[A-Za-z0-9.\-_]` with `_`, one underscore
/// per UTF-16 unit so astral characters become two.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        } else {
            for _ in 0..c.len_utf16() {
                out.push('_');
            }
        }
    }
    out
}

pub fn upload_file_name(timestamp: u128, index: usize, original_name: &str) -> String {
    format!("{}_{}_{}", timestamp, index, sanitize_file_name(original_name))
}

pub fn rename_batch(timestamp: u128, items: &[MediaItem]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| upload_file_name(timestamp, index, item.display_name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_file_name("north cam (1).mp4"), "north_cam__1_.mp4");
        assert_eq!(sanitize_file_name("a-b_c.MOV"), "a-b_c.MOV");
        assert_eq!(sanitize_file_name("straße.mp4"), "stra_e.mp4");
        assert_eq!(sanitize_file_name("🚗.mp4"), "__.mp4");
        assert_eq!(sanitize_file_name("../etc/passwd"), ".._etc_passwd");
    }

    #[test]
    fn test_upload_file_name() {
        assert_eq!(
            upload_file_name(1_700_000_000_123, 2, "my clip.mp4"),
            "1700000000123_2_my_clip.mp4"
        );
    }

    #[test]
    fn test_rename_batch_unique_even_for_same_names() {
        let items: Vec<_> = (0..4)
            .map(|_| MediaItem::new("same name.mp4", "video/mp4", Vec::new()))
            .collect();
        let renamed = rename_batch(42, &items);

        assert_eq!(renamed.len(), 4);
        let unique: HashSet<_> = renamed.iter().collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(renamed[3], "42_3_same_name.mp4");
    }

    #[test]
    fn test_rename_uses_base_name() {
        let items = vec![
            MediaItem::new("/tmp/cams/north.mp4", "video/mp4", Vec::new()),
            MediaItem::new("C:\\cams\\east cam.mov", "video/quicktime", Vec::new()),
        ];
        assert_eq!(
            rename_batch(9, &items),
            vec!["9_0_north.mp4".to_string(), "9_1_east_cam.mov".to_string()]
        );
    }

    #[test]
    fn test_rename_is_deterministic() {
        let items = vec![
            MediaItem::new("a b.mp4", "video/mp4", Vec::new()),
            MediaItem::new("c#d.mp4", "video/mp4", Vec::new()),
        ];
        assert_eq!(rename_batch(7, &items), rename_batch(7, &items));
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(SubmissionPhase::Idle.to_string(), "Idle");
        assert_eq!(SubmissionPhase::Uploading.label(), "Uploading");
        assert!(SubmissionPhase::Processing.is_in_flight());
        assert!(SubmissionPhase::Failed { message: "x".into() }.is_terminal());
        assert!(!SubmissionPhase::Idle.is_terminal());
    }

    fn shared() -> (Arc<AtomicBool>, Arc<watch::Sender<SubmissionPhase>>) {
        let (tx, _) = watch::channel(SubmissionPhase::Idle);
        (Arc::new(AtomicBool::new(false)), Arc::new(tx))
    }

    #[test]
    fn test_guard_is_exclusive() {
        let (busy, phase) = shared();
        let guard = BusyGuard::acquire(&busy, &phase).unwrap();
        assert!(busy.load(Ordering::Acquire));
        assert!(BusyGuard::acquire(&busy, &phase).is_none());

        drop(guard);
        assert!(!busy.load(Ordering::Acquire));
        assert!(BusyGuard::acquire(&busy, &phase).is_some());
    }

    #[test]
    fn test_guard_publishes_outcome_before_release() {
        let (busy, phase) = shared();
        let mut rx = phase.subscribe();
        let guard = BusyGuard::acquire(&busy, &phase).unwrap();
        guard.enter(SubmissionPhase::Uploading);
        guard.finish(SubmissionPhase::Failed {
            message: "disk full".into(),
        });

        assert!(!busy.load(Ordering::Acquire));
        assert_eq!(
            *rx.borrow_and_update(),
            SubmissionPhase::Failed {
                message: "disk full".into()
            }
        );
    }

    #[test]
    fn test_next_guard_phase_is_not_overwritten() {
        let (busy, phase) = shared();
        let first = BusyGuard::acquire(&busy, &phase).unwrap();
        first.enter(SubmissionPhase::Processing);
        first.finish(SubmissionPhase::Succeeded { uploaded: vec![] });

        let second = BusyGuard::acquire(&busy, &phase).unwrap();
        second.enter(SubmissionPhase::Uploading);
        assert_eq!(*phase.borrow(), SubmissionPhase::Uploading);
        assert!(busy.load(Ordering::Acquire));

        drop(second);
        assert_eq!(
            *phase.borrow(),
            SubmissionPhase::Failed {
                message: ABORTED_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_guard_dropped_mid_flight_fails() {
        let (busy, phase) = shared();
        let guard = BusyGuard::acquire(&busy, &phase).unwrap();
        guard.enter(SubmissionPhase::Processing);
        drop(guard);

        assert!(!busy.load(Ordering::Acquire));
        assert_eq!(
            *phase.borrow(),
            SubmissionPhase::Failed {
                message: ABORTED_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_guard_dropped_before_start_keeps_phase() {
        let (busy, phase) = shared();
        phase.send_replace(SubmissionPhase::Succeeded { uploaded: vec![] });
        drop(BusyGuard::acquire(&busy, &phase).unwrap());

        assert_eq!(*phase.borrow(), SubmissionPhase::Succeeded { uploaded: vec![] });
    }
}
