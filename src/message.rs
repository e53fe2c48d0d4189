//! Failed message documents and their processing-attempt history.
//!
//! Documents are owned by the failure-handling system that writes them. This
//! crate only models the two fields it needs, the message id and the attempt
//! list, and carries every other field through untouched so a
//! read-modify-write cycle never drops data it does not understand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One recorded attempt to process a message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingAttempt {
    /// When the attempt was made
    pub attempted_at: DateTime<Utc>,

    /// Remaining attempt metadata (headers, failure details, ...)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ProcessingAttempt {
    pub fn new(attempted_at: DateTime<Utc>) -> Self {
        Self {
            attempted_at,
            metadata: Map::new(),
        }
    }
}

/// A message that failed processing, together with its attempt history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct FailedMessage {
    /// Unique identifier for the message
    pub unique_message_id: String,

    /// Attempts in the order the store holds them
    #[serde(default)]
    pub processing_attempts: Vec<ProcessingAttempt>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FailedMessage {
    pub fn new(
        unique_message_id: impl Into<String>,
        processing_attempts: Vec<ProcessingAttempt>,
    ) -> Self {
        Self {
            unique_message_id: unique_message_id.into(),
            processing_attempts,
            extra: Map::new(),
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.processing_attempts.len()
    }

    pub fn exceeds(&self, max_attempts: usize) -> bool {
        self.attempt_count() > max_attempts
    }

    /// Keeps the `max_attempts` most recent attempts, newest first.
    ///
    /// The sort is stable, so attempts sharing a timestamp keep their original
    /// relative order. Returns the number of attempts removed.
    pub fn truncate_attempts(&mut self, max_attempts: usize) -> usize {
        let before = self.processing_attempts.len();

        self.processing_attempts
            .sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        self.processing_attempts.truncate(max_attempts);

        before - self.processing_attempts.len()
    }
}
