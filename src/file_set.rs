use tracing::{info, warn};

use crate::error::{FileSetError, ValidationError};
use crate::models::MediaItem;
use crate::preview::{PreviewHandle, PreviewRegistry};

/// Number of videos in one batch.
pub const BATCH_SIZE: usize = 4;

/// What happened to a set of candidates passed to [`FileSetManager::add_files`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddOutcome {
    pub accepted: usize,
    /// Non-video candidates filtered out.
    pub rejected: usize,
    /// Videos past the fourth slot.
    pub dropped: usize,
}

/// Bounded, ordered selection of videos with one preview handle per item.
#[derive(Debug, Default)]
pub struct FileSetManager {
    items: Vec<MediaItem>,
    previews: Vec<PreviewHandle>,
    registry: PreviewRegistry,
}

impl FileSetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn previews(&self) -> &[PreviewHandle] {
        &self.previews
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == BATCH_SIZE
    }

    /// Appends the video candidates and keeps the first four.
    pub fn add_files(
        &mut self,
        candidates: impl IntoIterator<Item = MediaItem>,
    ) -> Result<AddOutcome, ValidationError> {
        let (videos, others): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(MediaItem::is_video);

        for other in &others {
            warn!(
                "[files] Skipping {} ({}): not a video",
                other.original_name,
                if other.mime_type.is_empty() { "unknown type" } else { other.mime_type.as_str() }
            );
        }

        if videos.is_empty() {
            return Err(ValidationError::NoVideoFiles);
        }

        let offered = videos.len();
        self.items.extend(videos);
        let dropped = self.items.len().saturating_sub(BATCH_SIZE);
        self.items.truncate(BATCH_SIZE);

        if dropped > 0 {
            warn!("[files] Selection is capped at {}, dropped {} file(s)", BATCH_SIZE, dropped);
        }

        self.registry.release_all();
        let registry = &mut self.registry;
        self.previews = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| registry.create(index, item))
            .collect();

        info!("[files] 📁 {}/{} selected", self.items.len(), BATCH_SIZE);

        Ok(AddOutcome {
            accepted: offered - dropped,
            rejected: others.len(),
            dropped,
        })
    }

    pub fn remove_at(&mut self, index: usize) -> Result<MediaItem, FileSetError> {
        if index >= self.items.len() {
            return Err(FileSetError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }

        if index < self.previews.len() {
            let handle = self.previews.remove(index);
            self.registry.release(&handle);
        }
        let removed = self.items.remove(index);

        self.previews = self
            .previews
            .iter()
            .enumerate()
            .map(|(position, handle)| handle.repositioned(position))
            .collect();

        info!(
            "[files] Removed {}, {}/{} selected",
            removed.original_name,
            self.items.len(),
            BATCH_SIZE
        );
        Ok(removed)
    }

    pub fn reset(&mut self) {
        self.registry.release_all();
        self.previews.clear();
        self.items.clear();
    }
}

impl Drop for FileSetManager {
    fn drop(&mut self) {
        self.registry.release_all();
    }
}
