//! Progress reporting for the cleanup driver.
//!
//! The driver never logs directly; it reports what it is doing through a
//! [`ProgressReporter`] handed to it by the caller.

use crate::cleaner::CleanupReport;

pub trait ProgressReporter {
    /// A page of `count` over-threshold messages was fetched.
    fn page_fetched(&self, page: usize, count: usize);

    /// `message_id` is about to lose all but the most recent attempts out of
    /// `attempts`.
    fn truncating(&self, message_id: &str, attempts: usize);

    /// A page of `count` messages was committed.
    fn page_saved(&self, page: usize, count: usize);

    /// The store returned an empty page and the run is over.
    fn finished(&self, report: &CleanupReport);
}

/// Reports progress as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn page_fetched(&self, page: usize, count: usize) {
        tracing::debug!(page, count, "Fetched page");
    }

    fn truncating(&self, message_id: &str, attempts: usize) {
        tracing::info!(
            message_id,
            attempts,
            "Processing: {message_id} truncating {attempts} processed attempts"
        );
    }

    fn page_saved(&self, page: usize, count: usize) {
        tracing::debug!(page, count, "Saved page");
    }

    fn finished(&self, report: &CleanupReport) {
        tracing::info!(
            documents_scanned = report.documents_scanned,
            pages = report.pages,
            attempts_removed = report.attempts_removed,
            "Scanned {} documents.",
            report.documents_scanned
        );
    }
}
