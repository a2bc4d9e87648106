//! Display-ready view over a [`BatchResult`].
//!
//! Per-file errors are kept next to the successes; they only contribute 0 to
//! the batch score.

use crate::models::{BatchResult, PerFileMetrics, PerFileResult};

#[derive(Clone, Debug, PartialEq)]
pub enum EntryOutcome {
    Success(PerFileMetrics),
    Error(String),
    /// Listed as processed or uploaded, but no result came back for it.
    Missing,
}

impl EntryOutcome {
    fn from_result(result: Option<&PerFileResult>) -> Self {
        match result {
            Some(PerFileResult::Success(metrics)) => EntryOutcome::Success(metrics.clone()),
            Some(PerFileResult::Error { error }) => EntryOutcome::Error(error.clone()),
            None => EntryOutcome::Missing,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EntryOutcome::Success(_))
    }

    pub fn cps(&self) -> f64 {
        match self {
            EntryOutcome::Success(metrics) => metrics.cps.unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultEntry {
    pub file_name: String,
    pub outcome: EntryOutcome,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchSummary {
    pub intersection: String,
    pub videos_processed: Vec<String>,
    pub entries: Vec<ResultEntry>,
    pub batch_score: f64,
}

impl BatchSummary {
    pub fn from_result(result: &BatchResult) -> Self {
        let mut entries: Vec<ResultEntry> = result
            .results
            .iter()
            .map(|(file_name, res)| ResultEntry {
                file_name: file_name.clone(),
                outcome: EntryOutcome::from_result(Some(res)),
            })
            .collect();

        for name in &result.videos_processed {
            if !result.results.contains_key(name) {
                entries.push(ResultEntry {
                    file_name: name.clone(),
                    outcome: EntryOutcome::Missing,
                });
            }
        }

        let batch_score = entries.iter().map(|entry| entry.outcome.cps()).sum();

        Self {
            intersection: result.intersection.clone(),
            videos_processed: result.videos_processed.clone(),
            entries,
            batch_score,
        }
    }

    /// One decimal, exact ties rounded away from zero.
    pub fn formatted_batch_score(&self) -> String {
        format!("{:.1}", (self.batch_score * 10.0).round() / 10.0)
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_success()).count()
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Error(_)))
            .count()
    }

    pub fn missing_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == EntryOutcome::Missing)
            .count()
    }

    /// `(file_name, message)` for every per-file failure.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            EntryOutcome::Error(message) => Some((entry.file_name.as_str(), message.as_str())),
            _ => None,
        })
    }
}

/// One selected video matched to the name the service gave it and its result.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelatedEntry {
    pub position: usize,
    pub original_name: String,
    pub uploaded_name: String,
    pub outcome: EntryOutcome,
}

/// Pairs `original_names[i]` with `uploaded[i]` and looks the result up by
/// name, so a service that reorders `results` cannot shift outcomes onto the
/// wrong video.
pub fn correlate(
    result: &BatchResult,
    original_names: &[String],
    uploaded: &[String],
) -> Vec<CorrelatedEntry> {
    original_names
        .iter()
        .zip(uploaded)
        .enumerate()
        .map(|(position, (original_name, uploaded_name))| CorrelatedEntry {
            position,
            original_name: original_name.clone(),
            uploaded_name: uploaded_name.clone(),
            outcome: EntryOutcome::from_result(result.results.get(uploaded_name)),
        })
        .collect()
}
