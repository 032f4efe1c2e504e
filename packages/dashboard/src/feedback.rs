//! User feedback: submission from the settings panel and the admin table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashboard_api::FeedbackPublic;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::SessionStore;
use crate::config::FeedbackSink;
use crate::error::{DashboardError, Result};
use crate::storage::Slot;
use crate::tables::{RowSource, TableRow};
use crate::validation::FeedbackForm;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: String,
    pub username: String,
    pub rating: u8,
    pub message: String,
    /// RFC 3339
    pub timestamp: String,
}

impl From<FeedbackPublic> for FeedbackEntry {
    fn from(entry: FeedbackPublic) -> Self {
        Self {
            id: entry.id,
            username: entry.username,
            rating: entry.rating,
            message: entry.message,
            timestamp: entry.timestamp,
        }
    }
}

impl TableRow for FeedbackEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl FeedbackEntry {
    /// `★★★☆☆`
    pub fn stars(&self) -> String {
        let filled = usize::from(self.rating.min(5));
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }
}

/// Sends feedback to the configured sink and lists it back for admins.
pub struct FeedbackService {
    sink: FeedbackSink,
    session: Arc<SessionStore>,
    local: Slot,
}

impl FeedbackService {
    pub fn new(sink: FeedbackSink, session: Arc<SessionStore>, local: Slot) -> Self {
        Self {
            sink,
            session,
            local,
        }
    }

    pub fn sink(&self) -> FeedbackSink {
        self.sink
    }

    /// Returns the new entry's id.
    pub async fn submit(&self, form: &FeedbackForm) -> Result<String> {
        let message = form.validate()?;
        let session = self.session.session().ok_or(DashboardError::NotAuthenticated)?;

        let id = match self.sink {
            FeedbackSink::Rest => self.session.submit_feedback(form.rating, &message).await?,
            FeedbackSink::Local => {
                let entry = FeedbackEntry {
                    id: Uuid::new_v4().to_string(),
                    username: session.identity.clone(),
                    rating: form.rating,
                    message,
                    timestamp: Utc::now().to_rfc3339(),
                };
                let id = entry.id.clone();
                self.local
                    .update_json(|entries: &mut Vec<FeedbackEntry>| entries.push(entry))
                    .await?;
                id
            }
        };

        tracing::info!(feedback_id = %id, rating = form.rating, "Feedback submitted");
        Ok(id)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<FeedbackEntry>> {
        let mut entries = match self.sink {
            FeedbackSink::Rest => self.session.list_feedback().await?,
            FeedbackSink::Local => {
                let session = self.session.session().ok_or(DashboardError::NotAuthenticated)?;
                if !session.is_admin() {
                    return Err(DashboardError::Forbidden);
                }
                self.local.read_json().await
            }
        };
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}

#[async_trait]
impl RowSource for FeedbackService {
    type Row = FeedbackEntry;

    fn name(&self) -> &'static str {
        match self.sink {
            FeedbackSink::Rest => "feedback-rest",
            FeedbackSink::Local => "feedback-local",
        }
    }

    async fn fetch(&self) -> Result<Vec<FeedbackEntry>> {
        self.list().await
    }
}
