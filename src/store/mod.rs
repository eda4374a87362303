//! Summary cache and store.
//!
//! Every generated summary is written as a [`SummaryRecord`] partitioned by
//! user. The orchestrator looks records up by `(base_name, model)` within the
//! user's partition and then picks the first one whose `custom_prompt` is an
//! exact match ([`find_cached`]); that triple is the dedup key.
//!
//! Stores assign `created_at` from their own clock and reject a second record
//! with the same `(user_id, summary_id)` via [`StoreError::IdConflict`]; they
//! never update summary text. The only mutation after creation is the
//! optional feedback annotation.
//!
//! Two implementations ship with the crate:
//! - [`MemorySummaryStore`]: process-local, for tests and one-shot runs
//! - [`SqliteSummaryStore`]: durable, one SQLite file

mod memory;
mod sqlite;

pub use memory::MemorySummaryStore;
pub use sqlite::SqliteSummaryStore;

use crate::config::SummarizerKind;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A record as handed to [`SummaryStore::create`]; the store adds `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSummary {
    pub summary_id: String,
    pub user_id: String,
    pub display_name: String,
    pub base_name: String,
    pub model: SummarizerKind,
    pub custom_prompt: String,
    pub summary: String,
    pub input_data: String,
    pub file_url: Option<String>,
}

/// A persisted summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub summary_id: String,
    pub user_id: String,
    pub display_name: String,
    pub base_name: String,
    pub model: SummarizerKind,
    pub custom_prompt: String,
    pub summary: String,
    pub input_data: String,
    pub file_url: Option<String>,
    /// Assigned by the store's clock at insertion.
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackEntry>,
}

impl SummaryRecord {
    pub(crate) fn from_new(new: NewSummary, created_at: DateTime<Utc>) -> Self {
        Self {
            summary_id: new.summary_id,
            user_id: new.user_id,
            display_name: new.display_name,
            base_name: new.base_name,
            model: new.model,
            custom_prompt: new.custom_prompt,
            summary: new.summary,
            input_data: new.input_data,
            file_url: new.file_url,
            created_at,
            feedback: None,
        }
    }
}

/// Thumbs up / thumbs down on a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Like,
    Dislike,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Like => "like",
            Rating::Dislike => "dislike",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Rating::Like),
            "dislike" => Ok(Rating::Dislike),
            other => Err(StoreError::InvalidData(format!("unknown rating '{other}'"))),
        }
    }
}

/// Feedback as submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: Rating,
    pub comment: Option<String>,
}

/// Feedback as stored, with the store-assigned timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub rating: Rating,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Persistence contract for summaries.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Records of `user_id` with matching `base_name` and `model`, oldest first.
    async fn find(
        &self,
        user_id: &str,
        base_name: &str,
        model: SummarizerKind,
    ) -> Result<Vec<SummaryRecord>, StoreError>;

    /// Insert a new record under its explicit id.
    ///
    /// # Errors
    /// [`StoreError::IdConflict`] when `(user_id, summary_id)` already exists;
    /// [`StoreError::WriteFailed`] for any other write failure.
    async fn create(&self, record: NewSummary) -> Result<SummaryRecord, StoreError>;

    /// Fetch one record by id.
    async fn get(&self, user_id: &str, summary_id: &str)
        -> Result<Option<SummaryRecord>, StoreError>;

    /// Attach (or replace) feedback on an existing record.
    async fn record_feedback(
        &self,
        user_id: &str,
        summary_id: &str,
        feedback: Feedback,
    ) -> Result<(), StoreError>;
}

/// First record whose prompt matches `custom_prompt` exactly.
pub fn find_cached<'a>(records: &'a [SummaryRecord], custom_prompt: &str) -> Option<&'a SummaryRecord> {
    records.iter().find(|r| r.custom_prompt == custom_prompt)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn new_summary(id: &str, user: &str, base: &str, model: SummarizerKind, prompt: &str) -> NewSummary {
        NewSummary {
            summary_id: id.to_string(),
            user_id: user.to_string(),
            display_name: "Ada".to_string(),
            base_name: base.to_string(),
            model,
            custom_prompt: prompt.to_string(),
            summary: format!("summary of {base} for '{prompt}'"),
            input_data: base.to_string(),
            file_url: None,
        }
    }

    /// Contract checks shared by every store implementation.
    pub async fn exercise_contract(store: &dyn SummaryStore) {
        let m = SummarizerKind::Gpt4Mini;
        store
            .create(new_summary("hb1.pdf_100", "u1", "hb1.pdf", m, "short"))
            .await
            .unwrap();
        store
            .create(new_summary("hb1.pdf_101", "u1", "hb1.pdf", m, "long"))
            .await
            .unwrap();
        store
            .create(new_summary("hb1.pdf_102", "u1", "hb1.pdf", SummarizerKind::Gpt4, "short"))
            .await
            .unwrap();
        store
            .create(new_summary("hb1.pdf_100", "u2", "hb1.pdf", m, "short"))
            .await
            .unwrap();

        // Equality on (base_name, model) within the user partition.
        let found = store.find("u1", "hb1.pdf", m).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.summary_id.as_str()).collect();
        assert_eq!(ids, vec!["hb1.pdf_100", "hb1.pdf_101"]);
        assert_eq!(
            find_cached(&found, "long").map(|r| r.summary_id.as_str()),
            Some("hb1.pdf_101")
        );
        assert!(find_cached(&found, "Long").is_none());
        assert!(store.find("u3", "hb1.pdf", m).await.unwrap().is_empty());

        // Duplicate id within a partition.
        let dup = store
            .create(new_summary("hb1.pdf_100", "u1", "other.pdf", m, "x"))
            .await
            .unwrap_err();
        assert!(matches!(dup, StoreError::IdConflict { .. }));

        // Feedback annotates without touching the summary.
        let before = store.get("u1", "hb1.pdf_101").await.unwrap().unwrap();
        store
            .record_feedback(
                "u1",
                "hb1.pdf_101",
                Feedback {
                    rating: Rating::Dislike,
                    comment: Some("missed section 4".into()),
                },
            )
            .await
            .unwrap();
        let after = store.get("u1", "hb1.pdf_101").await.unwrap().unwrap();
        assert_eq!(after.summary, before.summary);
        assert_eq!(after.created_at, before.created_at);
        let fb = after.feedback.unwrap();
        assert_eq!(fb.rating, Rating::Dislike);
        assert_eq!(fb.comment.as_deref(), Some("missed section 4"));

        let missing = store
            .record_feedback(
                "u1",
                "nope_1",
                Feedback {
                    rating: Rating::Like,
                    comment: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::NotFound { .. }));
        assert!(store.get("u2", "hb1.pdf_101").await.unwrap().is_none());
    }
}
