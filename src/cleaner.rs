//! The cleanup driver.
//!
//! Pages through every failed message holding more than
//! `max_attempts_per_message` processing attempts, trims each one down to its
//! most recent attempts and writes the page back as a single batch. The loop
//! ends when the store has no over-threshold message left to return.
//!
//! Trimmed messages no longer match the over-threshold query, so each page is
//! always fetched from the start of the store's default order rather than at
//! an offset.

use serde::Serialize;

use crate::{
    config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_SIZE},
    error::Error,
    progress::ProgressReporter,
    repository::Repository,
};

/// Totals for one cleanup run.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Over-threshold documents fetched across all pages
    pub documents_scanned: usize,
    /// Pages fetched and saved
    pub pages: usize,
    /// Processing attempts discarded across all documents
    pub attempts_removed: usize,
}

/// Returns a builder for a cleanup run; `.run()` executes it.
///
/// A save failure aborts the run. Pages committed before the failure stay
/// committed; the failing page is not applied.
#[bon::builder(finish_fn = run)]
pub async fn cleanup<R, P>(
    repository: &R,
    reporter: &P,
    #[builder(default = DEFAULT_PAGE_SIZE)] page_size: usize,
    #[builder(default = DEFAULT_MAX_ATTEMPTS)] max_attempts_per_message: usize,
) -> Result<CleanupReport, Error>
where
    R: Repository,
    P: ProgressReporter,
{
    if page_size == 0 {
        return Err(Error::invalid_parameter("page size must be at least 1"));
    }

    let mut report = CleanupReport::default();

    loop {
        let mut page = repository
            .query_over_threshold(max_attempts_per_message, page_size)
            .await?;

        if page.is_empty() {
            reporter.finished(&report);
            return Ok(report);
        }

        report.pages += 1;
        report.documents_scanned += page.len();
        reporter.page_fetched(report.pages, page.len());

        for message in page.iter_mut() {
            reporter.truncating(&message.unique_message_id, message.attempt_count());
            report.attempts_removed += message.truncate_attempts(max_attempts_per_message);
        }

        let count = page.len();
        repository.save_batch(page).await?;
        reporter.page_saved(report.pages, count);
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, future::Future, pin::Pin};

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::{
        message::{FailedMessage, ProcessingAttempt},
        progress::TracingReporter,
        repository::InMemoryRepository,
    };

    #[derive(Default)]
    struct RecordingReporter {
        events: RefCell<Vec<String>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn page_fetched(&self, page: usize, count: usize) {
            self.events
                .borrow_mut()
                .push(format!("fetched {page} ({count})"));
        }

        fn truncating(&self, message_id: &str, attempts: usize) {
            self.events
                .borrow_mut()
                .push(format!("truncating {message_id} ({attempts})"));
        }

        fn page_saved(&self, page: usize, count: usize) {
            self.events
                .borrow_mut()
                .push(format!("saved {page} ({count})"));
        }

        fn finished(&self, report: &CleanupReport) {
            self.events
                .borrow_mut()
                .push(format!("finished {}", report.documents_scanned));
        }
    }

    /// Serves queries from an inner store but refuses every save.
    struct ReadOnlyRepository(InMemoryRepository);

    impl Repository for ReadOnlyRepository {
        fn query_over_threshold<'a>(
            &'a self,
            threshold: usize,
            limit: usize,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<FailedMessage>, Error>> + 'a>> {
            self.0.query_over_threshold(threshold, limit)
        }

        fn save_batch<'a>(
            &'a self,
            _batch: Vec<FailedMessage>,
        ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>> {
            Box::pin(async { Err(Error::invalid_parameter("store is read-only")) })
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn message(id: &str, timestamps: &[i64]) -> FailedMessage {
        FailedMessage::new(
            id,
            timestamps
                .iter()
                .map(|&secs| ProcessingAttempt::new(at(secs)))
                .collect(),
        )
    }

    fn timestamps(message: &FailedMessage) -> Vec<i64> {
        message
            .processing_attempts
            .iter()
            .map(|a| a.attempted_at.timestamp())
            .collect()
    }

    #[tokio::test]
    async fn test_keeps_most_recent_attempts() {
        let repo = InMemoryRepository::with_messages([message("m1", &[1, 2, 3])]).unwrap();
        let reporter = RecordingReporter::default();

        let report = cleanup()
            .repository(&repo)
            .reporter(&reporter)
            .page_size(1)
            .max_attempts_per_message(2)
            .run()
            .await
            .unwrap();

        assert_eq!(timestamps(&repo.get("m1").unwrap()), vec![3, 2]);
        assert_eq!(
            report,
            CleanupReport {
                documents_scanned: 1,
                pages: 1,
                attempts_removed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_store() {
        let repo = InMemoryRepository::new();
        let reporter = RecordingReporter::default();

        let report = cleanup()
            .repository(&repo)
            .reporter(&reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(report, CleanupReport::default());
        assert_eq!(*reporter.events.borrow(), vec!["finished 0"]);
    }

    #[tokio::test]
    async fn test_messages_at_or_under_threshold_untouched() {
        // Stored oldest-last so any rewrite would reorder the attempts.
        let under = message("under", &[2, 1]);
        let equal = message("equal", &[1, 3, 2]);
        let repo = InMemoryRepository::with_messages([under.clone(), equal.clone()]).unwrap();

        let report = cleanup()
            .repository(&repo)
            .reporter(&RecordingReporter::default())
            .max_attempts_per_message(3)
            .run()
            .await
            .unwrap();

        assert_eq!(report.documents_scanned, 0);
        assert_eq!(repo.get("under").unwrap(), under);
        assert_eq!(repo.get("equal").unwrap(), equal);
    }

    #[tokio::test]
    async fn test_pages_through_all_messages() {
        let all: Vec<i64> = (0..12).collect();
        let repo = InMemoryRepository::with_messages(
            (0..40).map(|i| message(&format!("m{i}"), &all)),
        )
        .unwrap();
        let reporter = RecordingReporter::default();

        let report = cleanup()
            .repository(&repo)
            .reporter(&reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(report.documents_scanned, 40);
        assert_eq!(report.pages, 3);
        assert_eq!(report.attempts_removed, 40 * 2);

        for message in repo.messages() {
            assert_eq!(timestamps(&message), (2..12).rev().collect::<Vec<_>>());
        }

        let events = reporter.events.borrow();
        assert_eq!(events.first().map(String::as_str), Some("fetched 1 (15)"));
        assert!(events.contains(&"saved 3 (10)".to_owned()));
        assert_eq!(events.last().map(String::as_str), Some("finished 40"));
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let repo = InMemoryRepository::with_messages([
            message("a", &[5, 1, 4, 2, 3]),
            message("b", &[1]),
        ])
        .unwrap();

        let run = || {
            cleanup()
                .repository(&repo)
                .reporter(&TracingReporter)
                .max_attempts_per_message(2)
                .run()
        };

        let first = run().await.unwrap();
        let after_first = repo.messages();
        let second = run().await.unwrap();

        assert_eq!(first.documents_scanned, 1);
        assert_eq!(second, CleanupReport::default());
        assert_eq!(repo.messages(), after_first);
    }

    #[tokio::test]
    async fn test_save_failure_aborts_run() {
        let inner = InMemoryRepository::with_messages([message("a", &[1, 2, 3])]).unwrap();
        let repo = ReadOnlyRepository(inner.clone());
        let reporter = RecordingReporter::default();

        let err = cleanup()
            .repository(&repo)
            .reporter(&reporter)
            .max_attempts_per_message(1)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert_eq!(inner.get("a").unwrap().attempt_count(), 3);
        assert_eq!(
            *reporter.events.borrow(),
            vec!["fetched 1 (1)", "truncating a (3)"]
        );
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let repo = InMemoryRepository::with_messages([message("a", &[1, 2, 3])]).unwrap();

        let err = cleanup()
            .repository(&repo)
            .reporter(&RecordingReporter::default())
            .page_size(0)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert_eq!(repo.get("a").unwrap().attempt_count(), 3);
    }
}
