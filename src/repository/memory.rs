//! In-memory implementation of the failed message store.
//!
//! Keeps documents in insertion order, which stands in for the store-default
//! order of a real database. Primarily used for testing.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{error::Error, message::FailedMessage};

use super::Repository;

#[derive(Clone, Default)]
pub struct InMemoryRepository {
    messages: Arc<Mutex<Vec<FailedMessage>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(
        messages: impl IntoIterator<Item = FailedMessage>,
    ) -> Result<Self, Error> {
        let repo = Self::new();

        for message in messages {
            repo.insert(message)?;
        }

        Ok(repo)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FailedMessage>> {
        // Batches are validated before any write, so a poisoned lock never
        // guards a half-applied batch.
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends `message`; ids are unique, as with the SQLite primary key.
    pub fn insert(&self, message: FailedMessage) -> Result<(), Error> {
        let mut messages = self.lock();

        if messages
            .iter()
            .any(|m| m.unique_message_id == message.unique_message_id)
        {
            return Err(Error::AlreadyExists {
                id: message.unique_message_id,
            });
        }

        messages.push(message);

        Ok(())
    }

    pub fn get(&self, id: impl AsRef<str>) -> Option<FailedMessage> {
        self.lock()
            .iter()
            .find(|m| m.unique_message_id == id.as_ref())
            .cloned()
    }

    /// Snapshot of every stored message, in store order.
    pub fn messages(&self) -> Vec<FailedMessage> {
        self.lock().clone()
    }
}

impl Repository for InMemoryRepository {
    fn query_over_threshold<'a>(
        &'a self,
        threshold: usize,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FailedMessage>, Error>> + 'a>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .iter()
                .filter(|m| m.exceeds(threshold))
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn save_batch<'a>(
        &'a self,
        batch: Vec<FailedMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>> {
        Box::pin(async move {
            let mut messages = self.lock();

            let mut positions = Vec::with_capacity(batch.len());
            for message in &batch {
                let position = messages
                    .iter()
                    .position(|m| m.unique_message_id == message.unique_message_id)
                    .ok_or_else(|| Error::message_not_found(&message.unique_message_id))?;
                positions.push(position);
            }

            for (position, message) in positions.into_iter().zip(batch) {
                messages[position] = message;
            }

            Ok(())
        })
    }
}
