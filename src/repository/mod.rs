//! Storage seam for failed message documents.
//!
//! The cleanup driver only ever needs two operations from a store: fetch a
//! bounded page of messages with too many attempts, and write a page back as
//! one unit. [`Repository`] captures exactly that so the driver can run
//! against the SQLite document store or an in-memory store alike.

use std::{future::Future, pin::Pin};

use crate::{error::Error, message::FailedMessage};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

/// Core trait for failed message storage.
pub trait Repository {
    /// Fetches up to `limit` messages holding strictly more than `threshold`
    /// processing attempts, in the store's default order.
    fn query_over_threshold<'a>(
        &'a self,
        threshold: usize,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FailedMessage>, Error>> + 'a>>;

    /// Persists every message in `batch`.
    ///
    /// # Important
    /// A batch is all-or-nothing: if any message cannot be written, none of
    /// the batch is applied.
    fn save_batch<'a>(
        &'a self,
        batch: Vec<FailedMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>>;
}
