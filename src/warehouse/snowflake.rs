//! Snowflake REST client.
//!
//! Speaks the session and query endpoints used by the Snowflake connectors:
//! token login, synchronous query submission with result polling, chunked
//! result download and logout.

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::{RawColumn, RawResultSet, Warehouse, WarehouseSession};
use crate::config::WarehouseSettings;
use crate::credentials::{ConnectionConfig, DEFAULT_AUTHENTICATOR};
use crate::error::{ChatError, Result};

const LOGIN_PATH: &str = "/session/v1/login-request";
const QUERY_PATH: &str = "/queries/v1/query-request";
const LOGOUT_PATH: &str = "/session/logout-request";

const CLIENT_APP_ID: &str = "cortex-chat";

/// Codes returned while a statement is still running.
const QUERY_IN_PROGRESS_CODES: [&str; 2] = ["333333", "333334"];

/// Session token no longer valid.
const SESSION_EXPIRED_CODE: &str = "390112";

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Snowflake warehouse client over HTTPS.
#[derive(Debug)]
pub struct SnowflakeRestClient {
    client: Client,
    base_url: Option<Url>,
    timeout: Duration,
    sequence: AtomicU64,
}

impl SnowflakeRestClient {
    /// Creates a new client with the given settings.
    pub fn new(settings: &WarehouseSettings) -> Result<Self> {
        let timeout = settings.query_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::internal(format!("Failed to create HTTP client: {e}")))?;

        let base_url = settings
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| {
                    ChatError::config(format!("Invalid warehouse.base_url '{raw}': {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            client,
            base_url,
            timeout,
            sequence: AtomicU64::new(1),
        })
    }

    /// Endpoint for an account, honoring the configured override.
    fn account_url(&self, account: &str) -> Result<Url> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        let raw = format!("https://{}.snowflakecomputing.com", account.to_lowercase());
        Url::parse(&raw).map_err(|e| ChatError::config(format!("Invalid account '{account}': {e}")))
    }

    fn endpoint(base: &Url, path: &str) -> Result<Url> {
        base.join(path)
            .map_err(|e| ChatError::internal(format!("Invalid endpoint {path}: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ChatError::from_request_error(e, self.timeout))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::from_request_error(e, self.timeout))?;
        Ok((status, body))
    }

    async fn send_json<T>(&self, request: RequestBuilder) -> Result<SnowflakeResponse<T>>
    where
        T: DeserializeOwned,
    {
        let (status, body) = self.send(request).await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ChatError::auth(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ChatError::transport(format!(
                "Warehouse returned HTTP {status}: {}",
                body.trim()
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| ChatError::transport(format!("Invalid warehouse response: {e}")))
    }

    /// Follows `getResultUrl` until the statement leaves the in-progress state.
    async fn wait_for_result(
        &self,
        session: &WarehouseSession,
        mut response: SnowflakeResponse<QueryData>,
    ) -> Result<SnowflakeResponse<QueryData>> {
        let started = Instant::now();
        while response.is_in_progress() {
            if started.elapsed() >= self.timeout {
                return Err(ChatError::Timeout(self.timeout));
            }
            let result_path = response
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| ChatError::execution("Query still running but no result URL"))?;

            tokio::time::sleep(POLL_INTERVAL).await;
            debug!(path = %result_path, "Polling for query result");

            let url = Self::endpoint(&session.base_url, &result_path)?;
            let request = self
                .client
                .get(url)
                .header(AUTHORIZATION, session.authorization_header());
            response = self.send_json(request).await?;
        }
        Ok(response)
    }

    async fn download_chunk(
        &self,
        chunk: &ChunkInfo,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<Vec<Option<String>>>> {
        let mut request = self.client.get(&chunk.url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(ChatError::transport(format!(
                "Result chunk download failed with HTTP {status}"
            )));
        }

        // Chunk bodies are a comma-separated list of row arrays.
        let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(&format!("[{body}]"))
            .map_err(|e| ChatError::transport(format!("Invalid result chunk: {e}")))?;
        Ok(rows.into_iter().map(convert_row).collect())
    }
}

#[async_trait]
impl Warehouse for SnowflakeRestClient {
    async fn login(&self, config: &ConnectionConfig) -> Result<WarehouseSession> {
        let (account, user, token) = config.require_credentials()?;
        let base_url = self.account_url(account)?;

        let mut url = Self::endpoint(&base_url, LOGIN_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("request_id", &Uuid::new_v4().to_string());
            if let Some(warehouse) = &config.warehouse {
                query.append_pair("warehouse", warehouse);
            }
            if let Some(database) = &config.database {
                query.append_pair("databaseName", database);
            }
            if let Some(schema) = &config.schema {
                query.append_pair("schemaName", schema);
            }
        }

        let authenticator = (!config
            .authenticator
            .eq_ignore_ascii_case(DEFAULT_AUTHENTICATOR))
        .then(|| config.authenticator.to_uppercase());

        let body = LoginRequest {
            data: LoginData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: env!("CARGO_PKG_VERSION"),
                account_name: account_name(account),
                login_name: user,
                password: token.expose(),
                authenticator,
            },
        };

        info!(account = %account, user = %user, "Logging in to Snowflake");
        let response: SnowflakeResponse<LoginResponseData> =
            self.send_json(self.client.post(url).json(&body)).await?;

        if !response.success {
            return Err(ChatError::auth(response.describe_failure()));
        }

        let token = response
            .data
            .and_then(|d| d.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChatError::auth("Login response did not include a session token"))?;

        Ok(WarehouseSession::new(token, base_url))
    }

    async fn execute(&self, session: &WarehouseSession, sql: &str) -> Result<RawResultSet> {
        let mut url = Self::endpoint(&session.base_url, QUERY_PATH)?;
        url.query_pairs_mut()
            .append_pair("requestId", &Uuid::new_v4().to_string());

        let body = QueryRequest {
            sql_text: sql,
            async_exec: false,
            sequence_id: self.sequence.fetch_add(1, Ordering::Relaxed),
            is_internal: false,
        };

        debug!(sql = %sql, "Submitting query");
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, session.authorization_header())
            .json(&body);
        let response = self.send_json::<QueryData>(request).await?;
        let response = self.wait_for_result(session, response).await?;

        if !response.success {
            if response.code() == Some(SESSION_EXPIRED_CODE) {
                return Err(ChatError::auth("Session has expired. Please reconnect."));
            }
            return Err(ChatError::execution(response.describe_failure()));
        }

        let data = response
            .data
            .ok_or_else(|| ChatError::execution("Query response contained no data"))?;

        if let Some(format) = &data.query_result_format {
            if !format.eq_ignore_ascii_case("json") {
                return Err(ChatError::execution(format!(
                    "Unsupported result format '{format}'"
                )));
            }
        }

        let columns = data
            .rowtype
            .iter()
            .map(|c| RawColumn {
                name: c.name.clone(),
                data_type: c.data_type.clone(),
                scale: c.scale,
            })
            .collect();

        let mut rows: Vec<Vec<Option<String>>> =
            data.rowset.into_iter().map(convert_row).collect();

        if !data.chunks.is_empty() {
            let headers = chunk_headers(&data.chunk_headers, data.qrmk.as_deref());
            debug!(chunks = data.chunks.len(), "Downloading result chunks");
            let chunks = try_join_all(
                data.chunks
                    .iter()
                    .map(|chunk| self.download_chunk(chunk, &headers)),
            )
            .await?;
            rows.extend(chunks.into_iter().flatten());
        }

        if let Some(query_id) = &data.query_id {
            debug!(query_id = %query_id, rows = rows.len(), "Query complete");
        }

        Ok(RawResultSet { columns, rows })
    }

    async fn logout(&self, session: &WarehouseSession) -> Result<()> {
        let mut url = Self::endpoint(&session.base_url, LOGOUT_PATH)?;
        url.query_pairs_mut().append_pair("delete", "true");

        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, session.authorization_header());
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            warn!(status = %status, body = %body, "Logout request failed");
        }
        Ok(())
    }
}

/// Account name as expected by the login endpoint (locator without region).
fn account_name(account: &str) -> String {
    account
        .split('.')
        .next()
        .unwrap_or(account)
        .to_uppercase()
}

fn convert_row(row: Vec<serde_json::Value>) -> Vec<Option<String>> {
    row.into_iter()
        .map(|cell| match cell {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .collect()
}

/// Headers for chunk downloads: explicit headers win, otherwise the SSE key.
fn chunk_headers(explicit: &HashMap<String, String>, qrmk: Option<&str>) -> HashMap<String, String> {
    if !explicit.is_empty() {
        return explicit.clone();
    }
    let mut headers = HashMap::new();
    if let Some(key) = qrmk {
        headers.insert(
            "x-amz-server-side-encryption-customer-algorithm".to_string(),
            "AES256".to_string(),
        );
        headers.insert(
            "x-amz-server-side-encryption-customer-key".to_string(),
            key.to_string(),
        );
    }
    headers
}

// Snowflake API request/response types

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    data: LoginData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: String,
    login_name: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    authenticator: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponseData {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    is_internal: bool,
}

#[derive(Debug, Deserialize)]
struct SnowflakeResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> SnowflakeResponse<T> {
    fn code(&self) -> Option<&str> {
        self.code.as_ref().and_then(|c| c.as_str())
    }

    fn is_in_progress(&self) -> bool {
        self.code()
            .is_some_and(|code| QUERY_IN_PROGRESS_CODES.contains(&code))
    }

    fn describe_failure(&self) -> String {
        let message = self.message.as_deref().unwrap_or("Unknown error");
        match &self.code {
            Some(code) => {
                let code = code.as_str().map(String::from).unwrap_or_else(|| code.to_string());
                format!("{message} (code {code})")
            }
            None => message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    chunks: Vec<ChunkInfo>,
    #[serde(default)]
    chunk_headers: HashMap<String, String>,
    qrmk: Option<String>,
    query_result_format: Option<String>,
    get_result_url: Option<String>,
    query_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
    scale: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChunkInfo {
    url: String,
}
