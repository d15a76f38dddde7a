//! Record store over a PostgREST-style REST endpoint.
//!
//! Rows live in the `study_sessions` table; filters use the PostgREST
//! operator syntax (`user_id=eq.<id>`, `ended_at=is.null`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::json;
use url::Url;

use super::{Finalization, SessionRecord, SessionRecordStore};
use crate::error::RemoteError;

const TABLE_PATH: &str = "rest/v1/study_sessions";

pub struct HttpSessionStore {
    http_client: Client,
    table_url: Url,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl HttpSessionStore {
    /// # Errors
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        access_token: Option<String>,
    ) -> Result<Self, RemoteError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let table_url = Url::parse(&base)?.join(TABLE_PATH)?;
        Ok(Self {
            http_client: Client::new(),
            table_url,
            api_key,
            access_token,
        })
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let mut req = self.http_client.request(method, self.table_url.clone());
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key);
        }
        if let Some(token) = self.access_token.as_ref().or(self.api_key.as_ref()) {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn fetch_rows(
        &self,
        operation: &'static str,
        req: RequestBuilder,
    ) -> Result<Vec<SessionRecord>, RemoteError> {
        let resp = check(operation, req.send().await?).await?;
        Ok(resp.json::<Vec<SessionRecord>>().await?)
    }
}

async fn check(operation: &'static str, resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        operation,
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SessionRecordStore for HttpSessionStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<SessionRecord>, RemoteError> {
        let req = self.request(Method::GET).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
            ("ended_at", "is.null".to_string()),
            ("order", "started_at.desc".to_string()),
            ("limit", "1".to_string()),
        ]);
        let rows = self.fetch_rows("find_active_session", req).await?;
        Ok(rows.into_iter().next())
    }

    async fn create_session(
        &self,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RemoteError> {
        let req = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": user_id,
                "started_at": started_at,
                "total_break_secs": 0,
            }));
        let rows = self.fetch_rows("create_session", req).await?;
        rows.into_iter()
            .next()
            .ok_or(RemoteError::EmptyResponse("create_session"))
    }

    async fn patch_break_seconds(&self, id: &str, secs: u64) -> Result<(), RemoteError> {
        let req = self
            .request(Method::PATCH)
            .query(&[("id", format!("eq.{id}"))])
            .json(&json!({ "total_break_secs": secs }));
        check("patch_break_seconds", req.send().await?).await?;
        Ok(())
    }

    async fn finalize_session(
        &self,
        id: &str,
        finalization: &Finalization,
    ) -> Result<(), RemoteError> {
        let req = self
            .request(Method::PATCH)
            .query(&[("id", format!("eq.{id}"))])
            .json(&json!({
                "ended_at": finalization.ended_at,
                "productivity": finalization.productivity.get(),
                "note": finalization.note,
            }));
        check("finalize_session", req.send().await?).await?;
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, RemoteError> {
        let req = self.request(Method::GET).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
            ("order", "started_at.desc".to_string()),
        ]);
        self.fetch_rows("list_sessions", req).await
    }
}
