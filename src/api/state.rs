use std::sync::Arc;

use crate::api::session::{SessionLimits, SessionStore};
use crate::application::{DocumentProcessor, RagService};
use crate::domain::ports::Assistant;

/// Largest accepted upload body.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<DocumentProcessor>,
    pub rag: Arc<RagService>,
    pub assistant: Arc<dyn Assistant>,
    pub sessions: SessionStore,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        processor: Arc<DocumentProcessor>,
        rag: Arc<RagService>,
        assistant: Arc<dyn Assistant>,
    ) -> Self {
        Self {
            processor,
            rag,
            assistant,
            sessions: SessionStore::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_session_limits(mut self, limits: SessionLimits) -> Self {
        self.sessions = SessionStore::with_limits(limits);
        self
    }
}
