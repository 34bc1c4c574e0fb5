//! GraphQL client for the Hardcover API.

use super::queries::{self, Envelope, GraphQlError, MutationResult};
use super::{ProgressUpdate, RemoteApi, RemoteError, RemoteResult, RemoteUserBook};
use crate::config::HardcoverConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

/// HTTP client for the Hardcover GraphQL endpoint.
///
/// Holds one pooled [`reqwest::Client`]; create it once per run and pass it
/// to the sync engine by reference.
pub struct HardcoverClient {
    client: reqwest::Client,
    api_url: String,
}

impl HardcoverClient {
    /// Build a client from configuration.
    pub fn new(config: &HardcoverConfig) -> Result<Self> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Config("Hardcover token is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&authorization_value(token))
            .map_err(|e| AppError::Config(format!("Invalid Hardcover token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config.api_url.clone()))
    }

    /// Create a client reusing an existing [`reqwest::Client`]. The caller is
    /// responsible for its default headers and timeout.
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Run one GraphQL document and decode its `data` member.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> RemoteResult<T> {
        tracing::debug!(operation, "Hardcover request");

        let response = self
            .client
            .post(&self.api_url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            tracing::warn!(operation, status = status.as_u16(), "Hardcover request rejected");
            return Err(status_error(status, &body));
        }

        decode_envelope(&body)
    }
}

/// Token as sent in the `Authorization` header.
fn authorization_value(token: &str) -> String {
    let token = token.trim();
    if token
        .get(..7)
        .is_some_and(|p| p.eq_ignore_ascii_case("bearer "))
    {
        token.to_string()
    } else {
        format!("Bearer {}", token)
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Network(format!("request timed out: {}", e))
    } else if e.is_decode() {
        RemoteError::GraphQl(format!("unreadable response: {}", e))
    } else {
        RemoteError::Network(e.to_string())
    }
}

/// Map a non-2xx HTTP status to an error kind.
fn status_error(status: StatusCode, body: &str) -> RemoteError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Authentication(detail),
        StatusCode::NOT_FOUND => RemoteError::NotFound(detail),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            RemoteError::Network(detail)
        }
        s if s.is_server_error() => RemoteError::Network(detail),
        _ => RemoteError::GraphQl(detail),
    }
}

/// Map a GraphQL `errors` list to an error kind.
fn graphql_error(errors: &[GraphQlError]) -> RemoteError {
    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    let auth = errors.iter().any(|e| {
        matches!(
            e.extensions.as_ref().and_then(|x| x.code.as_deref()),
            Some("invalid-jwt" | "invalid-headers" | "access-denied")
        )
    });

    if auth {
        RemoteError::Authentication(message)
    } else {
        RemoteError::GraphQl(message)
    }
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> RemoteResult<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| RemoteError::GraphQl(format!("malformed response: {}", e)))?;

    if !envelope.errors.is_empty() {
        return Err(graphql_error(&envelope.errors));
    }

    envelope
        .data
        .ok_or_else(|| RemoteError::GraphQl("response carried no data".to_string()))
}

/// Variables of the read-record mutation.
fn read_record_variables(read_id: i64, update: &ProgressUpdate) -> RemoteResult<Value> {
    let mut variables = serde_json::to_value(update)
        .map_err(|e| RemoteError::GraphQl(format!("unencodable progress update: {}", e)))?;
    variables["id"] = json!(read_id);
    Ok(variables)
}

/// Extract the ID of a mutation result, surfacing its `error` member.
fn mutation_id(operation: &str, result: MutationResult) -> RemoteResult<i64> {
    if let Some(error) = result.error.filter(|e| !e.is_empty()) {
        return Err(RemoteError::GraphQl(format!("{}: {}", operation, error)));
    }
    result
        .id
        .ok_or_else(|| RemoteError::GraphQl(format!("{} returned no id", operation)))
}

#[async_trait]
impl RemoteApi for HardcoverClient {
    async fn edition_pages(&self, edition_id: i64) -> RemoteResult<Option<i64>> {
        let data: queries::EditionPagesData = self
            .execute("GetEditionPages", queries::EDITION_PAGES, json!({ "id": edition_id }))
            .await?;
        data.editions_by_pk
            .map(|e| e.pages)
            .ok_or_else(|| RemoteError::NotFound(format!("edition {}", edition_id)))
    }

    async fn book_pages(&self, book_id: i64) -> RemoteResult<Option<i64>> {
        let data: queries::BookPagesData = self
            .execute("GetBookPages", queries::BOOK_PAGES, json!({ "id": book_id }))
            .await?;
        data.books_by_pk
            .map(|b| b.pages)
            .ok_or_else(|| RemoteError::NotFound(format!("book {}", book_id)))
    }

    async fn user_book(&self, book_id: i64) -> RemoteResult<Option<RemoteUserBook>> {
        let data: queries::UserBookData = self
            .execute("GetUserBookInfo", queries::USER_BOOK, json!({ "book_id": book_id }))
            .await?;

        let me = data.me.into_iter().next().ok_or_else(|| {
            RemoteError::Authentication("token does not resolve to a user".to_string())
        })?;

        Ok(me.user_books.into_iter().next().map(RemoteUserBook::from))
    }

    async fn latest_read_id(&self, user_book_id: i64) -> RemoteResult<Option<i64>> {
        let data: queries::LatestReadData = self
            .execute("GetLatestRead", queries::LATEST_READ, json!({ "id": user_book_id }))
            .await?;
        let reads = data
            .user_books_by_pk
            .ok_or_else(|| RemoteError::NotFound(format!("user book {}", user_book_id)))?;
        Ok(reads.user_book_reads.first().map(|r| r.id))
    }

    async fn create_user_book(
        &self,
        book_id: i64,
        status_id: i64,
        edition_id: Option<i64>,
    ) -> RemoteResult<i64> {
        let data: queries::CreateUserBookData = self
            .execute(
                "CreateUserBook",
                queries::CREATE_USER_BOOK,
                json!({ "book_id": book_id, "status_id": status_id, "edition_id": edition_id }),
            )
            .await?;
        mutation_id("insert_user_book", data.insert_user_book)
    }

    async fn create_read_record(&self, user_book_id: i64) -> RemoteResult<i64> {
        let data: queries::CreateReadRecordData = self
            .execute(
                "CreateUserBookRead",
                queries::CREATE_READ_RECORD,
                json!({ "user_book_id": user_book_id }),
            )
            .await?;
        mutation_id("insert_user_book_read", data.insert_user_book_read)
    }

    async fn update_read_record(&self, read_id: i64, update: &ProgressUpdate) -> RemoteResult<()> {
        let variables = read_record_variables(read_id, update)?;

        let data: queries::UpdateReadRecordData = self
            .execute("UpdateUserBookRead", queries::UPDATE_READ_RECORD, variables)
            .await?;
        mutation_id("update_user_book_read", data.update_user_book_read).map(|_| ())
    }

    async fn update_user_book(
        &self,
        user_book_id: i64,
        status_id: i64,
        edition_id: Option<i64>,
    ) -> RemoteResult<()> {
        let data: queries::UpdateUserBookData = self
            .execute(
                "UpdateUserBook",
                queries::UPDATE_USER_BOOK,
                json!({ "id": user_book_id, "status_id": status_id, "edition_id": edition_id }),
            )
            .await?;
        mutation_id("update_user_book", data.update_user_book).map(|_| ())
    }
}
