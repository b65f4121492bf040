use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

use vox_job_queue::{
    FileRecord, Job, JobFilter, JobPatch, JobStore, SegmentRow, StoreError, TranscriptionPatch,
};

use crate::error::Error;

pub const DEFAULT_AUDIO_BUCKET: &str = "audio-files";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// PostgREST and Storage access with the service-role key. Listing on behalf
/// of an end user goes through [`SupabaseClient::list_jobs_as_user`], which
/// keeps row-level security in effect.
#[derive(Clone)]
pub struct SupabaseClient {
    supabase_url: String,
    supabase_service_role_key: String,
    supabase_anon_key: Option<String>,
    audio_bucket: String,
    http_client: reqwest::Client,
}

impl SupabaseClient {
    pub fn new(
        supabase_url: impl Into<String>,
        supabase_service_role_key: impl Into<String>,
    ) -> Result<Self, Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            supabase_url: supabase_url.into().trim_end_matches('/').to_string(),
            supabase_service_role_key: supabase_service_role_key.into(),
            supabase_anon_key: None,
            audio_bucket: DEFAULT_AUDIO_BUCKET.to_string(),
            http_client,
        })
    }

    pub fn with_anon_key(mut self, anon_key: impl Into<String>) -> Self {
        self.supabase_anon_key = Some(anon_key.into()).filter(|k| !k.is_empty());
        self
    }

    pub fn with_audio_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.audio_bucket = bucket.into();
        self
    }

    fn rest_url(&self, table: &str, query: &str) -> String {
        format!("{}/rest/v1/{}?{}", self.supabase_url, table, query)
    }

    fn service(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(
                "Authorization",
                format!("Bearer {}", self.supabase_service_role_key),
            )
            .header("apikey", &self.supabase_service_role_key)
    }

    /// Same listing as [`JobStore::list_jobs`], authorized as the caller.
    pub async fn list_jobs_as_user(
        &self,
        access_token: &str,
        filter: &JobFilter,
    ) -> Result<Vec<Job>, Error> {
        let anon_key = self
            .supabase_anon_key
            .as_deref()
            .ok_or(Error::NotConfigured("supabase_anon_key"))?;

        let response = self
            .http_client
            .get(self.rest_url("jobs", &jobs_query(filter)))
            .header("Authorization", format!("Bearer {}", access_token))
            .header("apikey", anon_key)
            .send()
            .await?;

        decode(check(response, "list jobs").await?, "list jobs").await
    }

    async fn fetch_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, Error> {
        let response = self
            .service(
                self.http_client
                    .get(self.rest_url("jobs", &jobs_query(filter))),
            )
            .send()
            .await?;

        decode(check(response, "list jobs").await?, "list jobs").await
    }

    async fn patch_pending_job(&self, id: &str, patch: &JobPatch) -> Result<Option<Job>, Error> {
        let query = format!("id=eq.{}&status=eq.pending", urlencoding::encode(id));
        let response = self
            .service(self.http_client.patch(self.rest_url("jobs", &query)))
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;

        let rows: Vec<Job> = decode(check(response, "claim job").await?, "claim job").await?;
        Ok(rows.into_iter().next())
    }

    async fn patch_processing_job(
        &self,
        id: &str,
        started_at: Option<DateTime<Utc>>,
        patch: &JobPatch,
    ) -> Result<Option<Job>, Error> {
        let query = format!(
            "id=eq.{}&status=eq.processing&{}",
            urlencoding::encode(id),
            started_at_guard(started_at)
        );
        let response = self
            .service(self.http_client.patch(self.rest_url("jobs", &query)))
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;

        let rows: Vec<Job> = decode(check(response, "reclaim job").await?, "reclaim job").await?;
        Ok(rows.into_iter().next())
    }

    async fn patch_job(&self, id: &str, patch: &JobPatch) -> Result<(), Error> {
        let query = format!("id=eq.{}", urlencoding::encode(id));
        let response = self
            .service(self.http_client.patch(self.rest_url("jobs", &query)))
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;

        check(response, "update job").await?;
        Ok(())
    }

    async fn remove_segments(&self, transcription_id: &str) -> Result<(), Error> {
        let query = format!(
            "transcription_id=eq.{}",
            urlencoding::encode(transcription_id)
        );
        let response = self
            .service(
                self.http_client
                    .delete(self.rest_url("transcription_segments", &query)),
            )
            .send()
            .await?;

        check(response, "delete segments").await?;
        Ok(())
    }

    async fn add_segments(&self, rows: &[SegmentRow]) -> Result<(), Error> {
        let url = format!("{}/rest/v1/transcription_segments", self.supabase_url);
        let response = self
            .service(self.http_client.post(&url))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;

        check(response, "insert segments").await?;
        Ok(())
    }

    async fn patch_transcription(&self, id: &str, patch: &TranscriptionPatch) -> Result<(), Error> {
        let query = format!("id=eq.{}", urlencoding::encode(id));
        let response = self
            .service(
                self.http_client
                    .patch(self.rest_url("transcriptions", &query)),
            )
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;

        check(response, "update transcription").await?;
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Option<FileRecord>, Error> {
        let query = format!(
            "select=id,storage_path,file_name,mime_type&id=eq.{}&limit=1",
            urlencoding::encode(file_id)
        );
        let response = self
            .service(self.http_client.get(self.rest_url("files", &query)))
            .send()
            .await?;

        let rows: Vec<FileRecord> =
            decode(check(response, "get file").await?, "get file").await?;
        Ok(rows.into_iter().next())
    }

    async fn sign_object(&self, storage_path: &str, ttl_secs: u64) -> Result<String, Error> {
        let object_path = storage_path
            .trim_start_matches('/')
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.supabase_url,
            urlencoding::encode(&self.audio_bucket),
            object_path
        );

        let response = self
            .service(self.http_client.post(&url))
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;

        let signed: SignedUrlResponse =
            decode(check(response, "sign url").await?, "sign url").await?;

        if signed.signed_url.starts_with("http://") || signed.signed_url.starts_with("https://") {
            return Ok(signed.signed_url);
        }
        Ok(format!(
            "{}/storage/v1/{}",
            self.supabase_url,
            signed.signed_url.trim_start_matches('/')
        ))
    }

    async fn fetch_object(&self, url: &str) -> Result<Bytes, Error> {
        let response = self.http_client.get(url).send().await?;
        let bytes = check(response, "download").await?.bytes().await?;
        Ok(bytes)
    }
}

#[derive(serde::Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

async fn check(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(operation, status = status.as_u16(), body = %body, "supabase_request_failed");
        return Err(Error::Api {
            operation,
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<T, Error> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Decode { operation, source })
}

/// Full precision, so the guard matches the stored value exactly.
fn started_at_guard(started_at: Option<DateTime<Utc>>) -> String {
    match started_at {
        Some(started_at) => format!(
            "started_at=eq.{}",
            urlencoding::encode(&started_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        ),
        None => "started_at=is.null".to_string(),
    }
}

pub(crate) fn jobs_query(filter: &JobFilter) -> String {
    let mut params = vec!["select=*".to_string()];

    if let Some(status) = filter.status {
        params.push(format!("status=eq.{}", status.as_ref()));
    }
    if let Some(job_type) = &filter.job_type {
        params.push(format!("job_type=eq.{}", urlencoding::encode(job_type)));
    }
    if let Some(transcription_id) = &filter.transcription_id {
        params.push(format!(
            "payload->>transcription_id=eq.{}",
            urlencoding::encode(transcription_id)
        ));
    }
    if let Some(cutoff) = filter.started_before {
        let cutoff = cutoff.to_rfc3339_opts(SecondsFormat::Millis, true);
        params.push(format!("started_at=lt.{}", urlencoding::encode(&cutoff)));
    }

    params.push("order=created_at.asc".to_string());
    if let Some(limit) = filter.limit {
        params.push(format!("limit={}", limit));
    }

    params.join("&")
}

impl JobStore for SupabaseClient {
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        Ok(self.fetch_jobs(filter).await?)
    }

    async fn claim_job(&self, id: &str, patch: &JobPatch) -> Result<Option<Job>, StoreError> {
        Ok(self.patch_pending_job(id, patch).await?)
    }

    async fn reclaim_job(
        &self,
        id: &str,
        started_at: Option<DateTime<Utc>>,
        patch: &JobPatch,
    ) -> Result<Option<Job>, StoreError> {
        Ok(self.patch_processing_job(id, started_at, patch).await?)
    }

    async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<(), StoreError> {
        Ok(self.patch_job(id, patch).await?)
    }

    async fn delete_segments(&self, transcription_id: &str) -> Result<(), StoreError> {
        Ok(self.remove_segments(transcription_id).await?)
    }

    async fn insert_segments(&self, rows: &[SegmentRow]) -> Result<(), StoreError> {
        Ok(self.add_segments(rows).await?)
    }

    async fn update_transcription(
        &self,
        id: &str,
        patch: &TranscriptionPatch,
    ) -> Result<(), StoreError> {
        Ok(self.patch_transcription(id, patch).await?)
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.fetch_file(file_id).await?)
    }

    async fn signed_download_url(
        &self,
        storage_path: &str,
        ttl_secs: u64,
    ) -> Result<String, StoreError> {
        Ok(self.sign_object(storage_path, ttl_secs).await?)
    }

    async fn download(&self, url: &str) -> Result<Bytes, StoreError> {
        Ok(self.fetch_object(url).await?)
    }
}
