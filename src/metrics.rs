use std::sync::atomic::{AtomicU64, Ordering};

use crate::session::ArtifactCounts;

/// Thread-safe counters describing ingestion and question-answering activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_ingested: AtomicU64,
    ingest_failures: AtomicU64,
    texts_indexed: AtomicU64,
    tables_indexed: AtomicU64,
    images_indexed: AtomicU64,
    images_skipped: AtomicU64,
    questions_answered: AtomicU64,
    question_failures: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully ingested document and the artifacts indexed for it.
    pub fn record_ingestion(&self, counts: &ArtifactCounts) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.texts_indexed
            .fetch_add(counts.texts as u64, Ordering::Relaxed);
        self.tables_indexed
            .fetch_add(counts.tables as u64, Ordering::Relaxed);
        self.images_indexed
            .fetch_add(counts.images as u64, Ordering::Relaxed);
        self.images_skipped
            .fetch_add(counts.images_skipped as u64, Ordering::Relaxed);
    }

    /// Record a failed ingestion.
    pub fn record_ingest_failure(&self) {
        self.ingest_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered question.
    pub fn record_question(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question that ended in an error.
    pub fn record_question_failure(&self) {
        self.question_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            ingest_failures: self.ingest_failures.load(Ordering::Relaxed),
            texts_indexed: self.texts_indexed.load(Ordering::Relaxed),
            tables_indexed: self.tables_indexed.load(Ordering::Relaxed),
            images_indexed: self.images_indexed.load(Ordering::Relaxed),
            images_skipped: self.images_skipped.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            question_failures: self.question_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents ingested since startup.
    pub documents_ingested: u64,
    /// Ingestion requests that failed.
    pub ingest_failures: u64,
    /// Text artifacts indexed.
    pub texts_indexed: u64,
    /// Table artifacts indexed.
    pub tables_indexed: u64,
    /// Image artifacts indexed.
    pub images_indexed: u64,
    /// Images left out after a failed description.
    pub images_skipped: u64,
    /// Questions answered.
    pub questions_answered: u64,
    /// Questions that ended in an error.
    pub question_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_ingestions_per_kind() {
        let metrics = PipelineMetrics::new();
        metrics.record_ingestion(&ArtifactCounts {
            texts: 2,
            tables: 1,
            images: 2,
            images_skipped: 1,
        });
        metrics.record_ingestion(&ArtifactCounts {
            texts: 3,
            ..Default::default()
        });
        metrics.record_ingest_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 2);
        assert_eq!(snapshot.texts_indexed, 5);
        assert_eq!(snapshot.tables_indexed, 1);
        assert_eq!(snapshot.images_indexed, 2);
        assert_eq!(snapshot.images_skipped, 1);
        assert_eq!(snapshot.ingest_failures, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let metrics = PipelineMetrics::new();
        metrics.record_question();
        metrics.record_question_failure();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 0);
        assert_eq!(snapshot.questions_answered, 1);
        assert_eq!(snapshot.question_failures, 1);
    }
}
