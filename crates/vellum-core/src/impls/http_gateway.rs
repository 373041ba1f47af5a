//! HttpGateway - REST API 経由のリモートワークスペース
//!
//! Thin reqwest client over the page and block endpoints. Every request
//! carries the bearer token and the pinned API version header. No retries:
//! a non-success status is reported once and the caller decides.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::domain::{BlockId, ContentBlock, PageId, PageRecord, Properties, VaultError};
use crate::ports::{ChildrenPage, ContentGateway};

/// Upper bound the API accepts for one append request.
pub const MAX_APPEND_BATCH: usize = 100;

const VERSION_HEADER: &str = "notion-version";

/// Property types computed by the server. Sending them back is rejected.
const READ_ONLY_PROPERTY_TYPES: &[&str] = &[
    "formula",
    "rollup",
    "created_time",
    "created_by",
    "last_edited_time",
    "last_edited_by",
    "unique_id",
];

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    #[serde(default)]
    results: Vec<ContentBlock>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig, token: &str) -> Result<Self, VaultError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| VaultError::Config("API token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            VERSION_HEADER,
            HeaderValue::from_str(&config.api_version)
                .map_err(|e| VaultError::Config(format!("gateway.api_version: {e}")))?,
        );

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("vellum/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| VaultError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }

    /// Read the token from the variable named by `config.token_env`.
    pub fn from_env(config: &GatewayConfig) -> Result<Self, VaultError> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            VaultError::Config(format!("environment variable {} is not set", config.token_env))
        })?;
        Self::new(config, &token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Send and classify the status. `kind`/`id` name the resource for NotFound.
    async fn send(
        &self,
        request: RequestBuilder,
        kind: &'static str,
        id: &str,
    ) -> Result<Response, VaultError> {
        let response = request
            .send()
            .await
            .map_err(|e| VaultError::RemoteUnavailable(format!("{kind} {id}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(VaultError::not_found(kind, id));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(ApiErrorBody { code: Some(code), message }) => format!("{code}: {message}"),
            Ok(ApiErrorBody { code: None, message }) => message,
            Err(_) => body,
        };
        warn!(%status, kind, id, "remote request failed");
        Err(VaultError::RemoteUnavailable(format!(
            "{kind} {id}: HTTP {status}: {detail}"
        )))
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, VaultError> {
        response
            .json::<T>()
            .await
            .map_err(|e| VaultError::RemoteUnavailable(format!("undecodable {what} response: {e}")))
    }
}

/// Drop server-computed properties before a write.
pub fn writable_properties(properties: &Properties) -> Properties {
    properties
        .iter()
        .filter(|(_, value)| {
            let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
            !READ_ONLY_PROPERTY_TYPES.contains(&kind)
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[async_trait]
impl ContentGateway for HttpGateway {
    async fn get_page(&self, page_id: &PageId) -> Result<PageRecord, VaultError> {
        let request = self.client.get(self.url(&format!("pages/{page_id}")));
        let response = self.send(request, "page", page_id.as_str()).await?;
        Self::decode(response, "page").await
    }

    async fn list_children(
        &self,
        block_id: &BlockId,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, VaultError> {
        let mut request = self
            .client
            .get(self.url(&format!("blocks/{block_id}/children")))
            .query(&[("page_size", self.page_size.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("start_cursor", cursor)]);
        }

        let response = self.send(request, "block", block_id.as_str()).await?;
        let body: ChildrenResponse = Self::decode(response, "children").await?;
        debug!(block_id = %block_id, count = body.results.len(), has_more = body.has_more, "children listed");
        Ok(ChildrenPage {
            items: body.results,
            next_cursor: body.next_cursor,
            has_more: body.has_more,
        })
    }

    async fn update_page_properties(
        &self,
        page_id: &PageId,
        properties: &Properties,
    ) -> Result<(), VaultError> {
        let request = self
            .client
            .patch(self.url(&format!("pages/{page_id}")))
            .json(&json!({ "properties": writable_properties(properties) }));
        self.send(request, "page", page_id.as_str()).await?;
        Ok(())
    }

    async fn delete_block(&self, block_id: &BlockId) -> Result<(), VaultError> {
        let request = self.client.delete(self.url(&format!("blocks/{block_id}")));
        self.send(request, "block", block_id.as_str()).await?;
        Ok(())
    }

    async fn append_children(
        &self,
        parent: &BlockId,
        blocks: &[ContentBlock],
    ) -> Result<(), VaultError> {
        for batch in blocks.chunks(MAX_APPEND_BATCH) {
            let children: Vec<Value> = batch.iter().map(ContentBlock::creation_body).collect();
            let request = self
                .client
                .patch(self.url(&format!("blocks/{parent}/children")))
                .json(&json!({ "children": children }));
            self.send(request, "block", parent.as_str()).await?;
            debug!(parent = %parent, count = batch.len(), "children appended");
        }
        Ok(())
    }

    async fn archive_page(&self, page_id: &PageId) -> Result<(), VaultError> {
        let request = self
            .client
            .patch(self.url(&format!("pages/{page_id}")))
            .json(&json!({ "archived": true }));
        self.send(request, "page", page_id.as_str()).await?;
        Ok(())
    }
}
