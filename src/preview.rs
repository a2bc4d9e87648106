use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::models::MediaItem;

const PREVIEW_SCHEME: &str = "blob:roads-preview/";

/// Renderable reference to a selected video's in-memory payload.
///
/// The `id` is `<position>_<name>` and must be re-derived whenever the
/// selection shifts; the `uri` stays bound to the payload until released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    pub id: String,
    pub name: String,
    pub uri: String,
    token: Uuid,
}

impl PreviewHandle {
    /// Same handle, re-keyed for a new position in the selection.
    pub fn repositioned(&self, index: usize) -> Self {
        Self {
            id: preview_id(index, &self.name),
            ..self.clone()
        }
    }
}

pub fn preview_id(index: usize, name: &str) -> String {
    format!("{}_{}", index, name)
}

/// Owns every live preview URI. Releasing is infallible and idempotent.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: HashMap<Uuid, Bytes>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, index: usize, item: &MediaItem) -> PreviewHandle {
        let token = Uuid::new_v4();
        self.live.insert(token, item.payload.clone());

        PreviewHandle {
            id: preview_id(index, item.display_name()),
            name: item.display_name().to_string(),
            uri: format!("{}{}", PREVIEW_SCHEME, token.simple()),
            token,
        }
    }

    pub fn release(&mut self, handle: &PreviewHandle) {
        if self.live.remove(&handle.token).is_none() {
            debug!("[preview] {} already released", handle.uri);
        }
    }

    pub fn release_all(&mut self) {
        self.live.clear();
    }

    /// Payload behind a URI, or `None` once it has been released.
    pub fn resolve(&self, uri: &str) -> Option<Bytes> {
        let token = uri.strip_prefix(PREVIEW_SCHEME)?;
        let token = Uuid::parse_str(token).ok()?;
        self.live.get(&token).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
