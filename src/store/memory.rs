use super::{Feedback, FeedbackEntry, NewSummary, SummaryRecord, SummaryStore};
use crate::config::SummarizerKind;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

/// Process-local store; records live as long as the value.
#[derive(Debug, Default)]
pub struct MemorySummaryStore {
    records: RwLock<Vec<SummaryRecord>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all users.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn find(
        &self,
        user_id: &str,
        base_name: &str,
        model: SummarizerKind,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.base_name == base_name && r.model == model)
            .cloned()
            .collect())
    }

    async fn create(&self, record: NewSummary) -> Result<SummaryRecord, StoreError> {
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|r| r.user_id == record.user_id && r.summary_id == record.summary_id)
        {
            return Err(StoreError::IdConflict {
                summary_id: record.summary_id,
            });
        }
        let stored = SummaryRecord::from_new(record, Utc::now());
        records.push(stored.clone());
        Ok(stored)
    }

    async fn get(
        &self,
        user_id: &str,
        summary_id: &str,
    ) -> Result<Option<SummaryRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.user_id == user_id && r.summary_id == summary_id)
            .cloned())
    }

    async fn record_feedback(
        &self,
        user_id: &str,
        summary_id: &str,
        feedback: Feedback,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.user_id == user_id && r.summary_id == summary_id)
            .ok_or_else(|| StoreError::NotFound {
                summary_id: summary_id.to_string(),
            })?;
        record.feedback = Some(FeedbackEntry {
            rating: feedback.rating,
            comment: feedback.comment,
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}
