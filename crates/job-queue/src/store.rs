use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::types::{FileRecord, Job, JobFilter, JobPatch, SegmentRow, TranscriptionPatch};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Persistence seam for the queue. Every call is a single round trip; the
/// worker never holds a transaction across calls.
pub trait JobStore: Send + Sync + 'static {
    /// Oldest first. `filter.limit` caps the page.
    fn list_jobs(
        &self,
        filter: &JobFilter,
    ) -> impl Future<Output = Result<Vec<Job>, StoreError>> + Send;

    /// Applies `patch` only if the job is still `pending`. `None` means another
    /// worker got there first.
    fn claim_job(
        &self,
        id: &str,
        patch: &JobPatch,
    ) -> impl Future<Output = Result<Option<Job>, StoreError>> + Send;

    /// Applies `patch` only if the job is still `processing` and was started
    /// at `started_at`. `None` means the job moved on after it was listed.
    fn reclaim_job(
        &self,
        id: &str,
        started_at: Option<DateTime<Utc>>,
        patch: &JobPatch,
    ) -> impl Future<Output = Result<Option<Job>, StoreError>> + Send;

    fn update_job(
        &self,
        id: &str,
        patch: &JobPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_segments(
        &self,
        transcription_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_segments(
        &self,
        rows: &[SegmentRow],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn update_transcription(
        &self,
        id: &str,
        patch: &TranscriptionPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_file(
        &self,
        file_id: &str,
    ) -> impl Future<Output = Result<Option<FileRecord>, StoreError>> + Send;

    fn signed_download_url(
        &self,
        storage_path: &str,
        ttl_secs: u64,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    fn download(&self, url: &str) -> impl Future<Output = Result<Bytes, StoreError>> + Send;
}
