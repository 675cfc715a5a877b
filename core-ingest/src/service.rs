//! Chat-facing entry point: allow-list plus final feedback.

use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{IngestError, Result};
use crate::feedback::{failure_message, success_message};
use crate::orchestrator::{IngestReport, Orchestrator};
use crate::progress::ProgressSink;

/// Wraps the [`Orchestrator`] with the static allow-list of chat users and
/// sends the final success or failure message to the sink.
#[derive(Clone)]
pub struct IngestService {
    orchestrator: Arc<Orchestrator>,
    allowed_users: Arc<HashSet<i64>>,
}

impl IngestService {
    /// An empty `allowed_users` admits everyone.
    pub fn new(orchestrator: Arc<Orchestrator>, allowed_users: impl IntoIterator<Item = i64>) -> Self {
        Self {
            orchestrator,
            allowed_users: Arc::new(allowed_users.into_iter().collect()),
        }
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }

    /// Ingest on behalf of a chat user.
    pub async fn ingest_from(
        &self,
        user_id: i64,
        text: &str,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        if !self.is_allowed(user_id) {
            warn!(user_id, "Rejected ingest from unlisted user");
            let err = IngestError::Unauthorized(user_id);
            sink.send(failure_message(&err)).await;
            return Err(err);
        }
        self.ingest(text, sink, cancel).await
    }

    /// Ingest without an identity check (CLI and local callers).
    pub async fn ingest(
        &self,
        text: &str,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        let result = self.orchestrator.ingest(text, sink, cancel).await;
        let message = match &result {
            Ok(report) => success_message(&report.files),
            Err(e) => failure_message(e),
        };
        sink.send(message).await;
        result
    }
}
