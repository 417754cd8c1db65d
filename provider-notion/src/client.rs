//! Record-store access
//!
//! [`RecordStore`] is the seam the reader depends on; [`NotionClient`] is
//! its implementation over the Notion REST API.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_auth::CredentialManager;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{NotionError, Result};
use crate::types::{DatabaseSchema, PropertyKind, QueryPage, Record, RecordQuery};

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";

/// Largest page the query endpoint returns
pub const MAX_PAGE_SIZE: usize = 100;

const UNTITLED: &str = "Untitled";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A queryable table of records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one page of records matching `query`
    ///
    /// # Errors
    ///
    /// [`NotionError::Unsupported`], or an API error with status 404, 405
    /// or 501, when the paginated endpoint is unavailable.
    async fn query(
        &self,
        query: &RecordQuery,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<QueryPage>;

    /// Single request with the same filter and sorts but no pagination
    /// parameters, returning whatever the first response holds.
    ///
    /// [`NotionClient`] sends it to the same query endpoint, so it only helps
    /// when the paginated request was refused for its cursor or page size.
    async fn query_direct(&self, query: &RecordQuery) -> Result<Vec<Record>>;

    async fn describe_schema(&self) -> Result<DatabaseSchema>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatabaseResponse {
    id: String,
    #[serde(default)]
    title: Vec<TitleRun>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyDefinition>,
}

#[derive(Debug, Deserialize)]
struct TitleRun {
    #[serde(default)]
    plain_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PropertyDefinition {
    #[serde(rename = "type")]
    kind: String,
}

/// Notion database client
///
/// Authenticates with the integration token held by the
/// [`CredentialManager`].
pub struct NotionClient {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<CredentialManager>,
    database_id: String,
    api_base: String,
}

impl NotionClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<CredentialManager>,
        database_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            credentials,
            database_id: database_id.into(),
            api_base: NOTION_API_BASE.to_string(),
        }
    }

    /// Point at a different API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    fn database_url(&self) -> String {
        format!(
            "{}/databases/{}",
            self.api_base,
            urlencoding::encode(&self.database_id)
        )
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let token = self.credentials.access_token().await?;
        let request = request
            .bearer_token(token)
            .header("Notion-Version", NOTION_VERSION)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            debug!(status = response.status, "Notion request succeeded");
            return Ok(response);
        }

        let error = api_error(&response);
        warn!(status = response.status, error = %error, "Notion request failed");
        Err(error)
    }

    async fn post_query(&self, body: &Value) -> Result<QueryResponse> {
        let request = HttpRequest::post(format!("{}/query", self.database_url())).json(body)?;
        let response = self.send(request).await?;
        response
            .json()
            .map_err(|e| NotionError::ParseError(format!("query response: {}", e)))
    }
}

fn api_error(response: &HttpResponse) -> NotionError {
    let body = response.json::<ApiErrorBody>().ok();
    let code = body
        .as_ref()
        .and_then(|b| b.code.clone())
        .unwrap_or_else(|| format!("http_{}", response.status));
    let message = body
        .and_then(|b| b.message)
        .unwrap_or_else(|| response.text_lossy());
    NotionError::Api {
        status: response.status,
        code,
        message,
    }
}

fn parse_records(results: &[Value]) -> Result<Vec<Record>> {
    results.iter().map(Record::from_json).collect()
}

#[async_trait]
impl RecordStore for NotionClient {
    #[instrument(skip(self, query), fields(database_id = %self.database_id, has_cursor = cursor.is_some()))]
    async fn query(
        &self,
        query: &RecordQuery,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<QueryPage> {
        let body = query.page_body(cursor.as_deref(), page_size.clamp(1, MAX_PAGE_SIZE));
        let response = self.post_query(&body).await?;

        Ok(QueryPage {
            records: parse_records(&response.results)?,
            has_more: response.has_more,
            next_cursor: response.next_cursor,
        })
    }

    #[instrument(skip(self, query), fields(database_id = %self.database_id))]
    async fn query_direct(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        let response = self.post_query(&query.direct_body()).await?;
        parse_records(&response.results)
    }

    #[instrument(skip(self), fields(database_id = %self.database_id))]
    async fn describe_schema(&self) -> Result<DatabaseSchema> {
        let response = self.send(HttpRequest::get(self.database_url())).await?;
        let database: DatabaseResponse = response
            .json()
            .map_err(|e| NotionError::ParseError(format!("database response: {}", e)))?;

        let title = database
            .title
            .first()
            .and_then(|run| run.plain_text.clone())
            .unwrap_or_else(|| UNTITLED.to_string());

        Ok(DatabaseSchema {
            id: database.id,
            title,
            columns: database
                .properties
                .into_iter()
                .map(|(name, definition)| (name, PropertyKind::from_tag(&definition.kind)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemorySecureStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::DownloadStream;
    use bridge_traits::time::SystemClock;
    use bytes::Bytes;
    use core_auth::{BearerTokenFlow, TokenStore};
    use core_runtime::events::EventBus;
    use mockall::mock;
    use serde_json::json;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn download_stream(&self, request: HttpRequest) -> BridgeResult<DownloadStream>;
        }
    }

    fn client(http: MockHttpClient) -> NotionClient {
        let credentials = Arc::new(CredentialManager::new(
            Arc::new(BearerTokenFlow::notion("secret_abc")),
            TokenStore::new(Arc::new(MemorySecureStore::new())),
            Arc::new(SystemClock),
            EventBus::default(),
        ));
        NotionClient::new(Arc::new(http), credentials, "db1")
    }

    fn response(status: u16, body: Value) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn request_body(request: &HttpRequest) -> Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_query_sends_cursor_and_headers() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.url, "https://api.notion.com/v1/databases/db1/query");
            assert_eq!(
                req.headers.get("Notion-Version").map(String::as_str),
                Some("2022-06-28")
            );
            assert_eq!(
                req.headers.get("Authorization").map(String::as_str),
                Some("Bearer secret_abc")
            );
            let body = request_body(&req);
            assert_eq!(body["start_cursor"], "c1");
            assert_eq!(body["page_size"], 100);
            assert_eq!(body["sorts"][0]["property"], "Name");

            response(
                200,
                json!({
                    "object": "list",
                    "results": [{"id": "r1", "url": "https://notion.so/r1", "properties": {}}],
                    "has_more": true,
                    "next_cursor": "c2"
                }),
            )
        });

        let query = RecordQuery::new().with_sorts(json!([{"property": "Name", "direction": "ascending"}]));
        let page = client(http)
            .query(&query, Some("c1".to_string()), 500)
            .await
            .unwrap();

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].url.as_deref(), Some("https://notion.so/r1"));
        assert_eq!(page.continuation().as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_query_direct_has_no_pagination_parameters() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|req| {
            let body = request_body(&req);
            assert!(body.get("page_size").is_none());
            assert!(body.get("start_cursor").is_none());
            assert_eq!(body["filter"]["property"], "Done");
            response(200, json!({"results": [{"id": "r1"}, {"id": "r2"}]}))
        });

        let query = RecordQuery::new().with_filter(json!({"property": "Done", "checkbox": {"equals": true}}));
        let records = client(http).query_direct(&query).await.unwrap();

        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_api_error_body_is_parsed() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| {
            response(
                404,
                json!({
                    "object": "error",
                    "status": 404,
                    "code": "object_not_found",
                    "message": "Could not find database with ID: db1."
                }),
            )
        });

        let err = client(http)
            .query(&RecordQuery::new(), None, 10)
            .await
            .unwrap_err();

        match &err {
            NotionError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(*status, 404);
                assert_eq!(code, "object_not_found");
                assert!(message.starts_with("Could not find database"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_non_json_error_falls_back_to_status_code() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| {
            Ok(HttpResponse {
                status: 502,
                headers: HashMap::new(),
                body: Bytes::from_static(b"Bad Gateway"),
            })
        });

        let err = client(http).describe_schema().await.unwrap_err();

        assert!(matches!(
            err,
            NotionError::Api { status: 502, ref code, ref message }
                if code == "http_502" && message == "Bad Gateway"
        ));
    }

    #[tokio::test]
    async fn test_describe_schema() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.url, "https://api.notion.com/v1/databases/db1");
            response(
                200,
                json!({
                    "object": "database",
                    "id": "db1",
                    "title": [{"plain_text": "Videos"}],
                    "properties": {
                        "Name": {"id": "title", "type": "title", "title": {}},
                        "Tags": {"id": "t", "type": "multi_select", "multi_select": {"options": []}},
                        "Owner": {"id": "o", "type": "people", "people": {}}
                    }
                }),
            )
        });

        let schema = client(http).describe_schema().await.unwrap();

        assert_eq!(schema.title, "Videos");
        assert_eq!(schema.kind_of("Name"), Some(&PropertyKind::Title));
        assert_eq!(schema.kind_of("Tags"), Some(&PropertyKind::MultiSelect));
        assert_eq!(
            schema.kind_of("Owner"),
            Some(&PropertyKind::Other("people".to_string()))
        );
    }

    #[tokio::test]
    async fn test_untitled_database() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| response(200, json!({"id": "db1", "title": [], "properties": {}})));

        assert_eq!(client(http).describe_schema().await.unwrap().title, "Untitled");
    }
}
