//! Supabase (PostgREST) file store
//!
//! Two tables are used: the records table (default `files`, with a `seq`
//! bigserial giving insertion order) and `<table>_runs`, holding the newest
//! generation recorded for each user.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::FileStore;
use crate::error::{IndexError, IndexResult};
use crate::models::FileRecord;

/// Rows requested per page, matches PostgREST's default `max_rows` on Supabase
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
struct RunRow {
    generation: String,
}

/// File store backed by a hosted Supabase table
#[derive(Clone)]
pub struct SupabaseFileStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
    page_size: usize,
}

impl SupabaseFileStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Page size for reads; must not exceed the project's `max_rows`
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn runs_url(&self) -> String {
        format!("{}/rest/v1/{}_runs", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Move the user's recorded generation forward to `generation` unless a
    /// newer one is already there, and return whatever is recorded afterwards
    async fn advance_generation(&self, user_email: &str, generation: &str) -> IndexResult<String> {
        let response = self
            .authorized(self.client.post(self.runs_url()))
            .query(&[("on_conflict", "user_email")])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(&json!([{ "user_email": user_email, "generation": generation }]))
            .send()
            .await?;
        check_status(response).await?;

        let response = self
            .authorized(self.client.patch(self.runs_url()))
            .query(&[
                ("user_email", format!("eq.{}", user_email)),
                ("generation", format!("lt.{}", generation)),
            ])
            .header("Prefer", "return=minimal")
            .json(&json!({ "generation": generation }))
            .send()
            .await?;
        check_status(response).await?;

        self.current_generation(user_email).await?.ok_or_else(|| {
            IndexError::Store(format!("no generation recorded for {}", user_email))
        })
    }

    async fn current_generation(&self, user_email: &str) -> IndexResult<Option<String>> {
        let response = self
            .authorized(self.client.get(self.runs_url()))
            .query(&[
                ("select", "generation".to_string()),
                ("user_email", format!("eq.{}", user_email)),
            ])
            .send()
            .await?;
        let rows: Vec<RunRow> = check_status(response).await?.json().await?;
        Ok(rows.into_iter().next().map(|row| row.generation))
    }
}

/// Turn a non-2xx PostgREST reply into a store error carrying its body
async fn check_status(response: Response) -> IndexResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IndexError::Store(format!("{}: {}", status, body)))
}

#[async_trait]
impl FileStore for SupabaseFileStore {
    async fn replace_user_files(
        &self,
        user_email: &str,
        generation: &str,
        records: &[FileRecord],
    ) -> IndexResult<usize> {
        let current = self.advance_generation(user_email, generation).await?;
        if current != generation {
            info!(
                "Dropping generation {} for {}, newer generation {} is already stored",
                generation, user_email, current
            );
            return Ok(0);
        }

        if !records.is_empty() {
            let rows: Vec<FileRecord> = records
                .iter()
                .cloned()
                .map(|mut record| {
                    record.user_email = user_email.to_string();
                    record.generation = generation.to_string();
                    record
                })
                .collect();

            let response = self
                .authorized(self.client.post(self.table_url()))
                .header("Prefer", "return=minimal")
                .json(&rows)
                .send()
                .await?;
            check_status(response).await?;
            debug!("Inserted {} rows into {}", rows.len(), self.table);
        }

        let response = self
            .authorized(self.client.delete(self.table_url()))
            .query(&[
                ("user_email", format!("eq.{}", user_email)),
                ("generation", format!("lt.{}", generation)),
            ])
            .send()
            .await?;
        check_status(response).await?;

        Ok(records.len())
    }

    async fn list_user_files(&self, user_email: &str) -> IndexResult<Vec<FileRecord>> {
        let Some(generation) = self.current_generation(user_email).await? else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        loop {
            let response = self
                .authorized(self.client.get(self.table_url()))
                .query(&[
                    ("select", "*".to_string()),
                    ("user_email", format!("eq.{}", user_email)),
                    ("generation", format!("eq.{}", generation)),
                    ("order", "seq.asc".to_string()),
                    ("limit", self.page_size.to_string()),
                    ("offset", records.len().to_string()),
                ])
                .send()
                .await?;
            let page: Vec<FileRecord> = check_status(response).await?.json().await?;
            let last_page = page.len() < self.page_size;
            records.extend(page);
            if last_page {
                break;
            }
        }
        debug!("Read {} rows of generation {} for {}", records.len(), generation, user_email);
        Ok(records)
    }

    async fn ping(&self) -> IndexResult<()> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("select", "name"), ("limit", "1")])
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "supabase"
    }
}
