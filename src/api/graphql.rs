//! GraphQL request envelope and cursor-paged response shapes.
//!
//! Queries POST a `{query, variables}` body to the endpoint's GraphQL URL.
//! A per-query Accept override opts into schema-preview behaviour on the
//! server. Connection fields deserialise through [`GraphQlPage`] into the
//! generic pagination [`Page`] type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::endpoint::ServerEndpoint;
use super::error::ApiError;
use super::pagination::{Page, PageToken};
use super::request::ApiRequest;

/// A GraphQL query with its variables and optional Accept override.
#[derive(Debug, Clone)]
pub struct GraphQlQuery {
    query: String,
    variables: serde_json::Value,
    accept: Option<String>,
    operation: Option<String>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    query: &'a str,
    variables: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ResponseEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlErrorEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

impl GraphQlQuery {
    /// Creates a query with its variables object.
    #[must_use]
    pub fn new(query: &str, variables: serde_json::Value) -> Self {
        Self {
            query: query.to_owned(),
            variables,
            accept: None,
            operation: None,
        }
    }

    /// Opts this query into a schema-preview media type.
    #[must_use]
    pub fn with_accept(mut self, media_type: &str) -> Self {
        self.accept = Some(media_type.to_owned());
        self
    }

    /// Sets the human-readable operation name used in error messages.
    #[must_use]
    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_owned());
        self
    }

    /// Builds the POST request for this query against an endpoint.
    ///
    /// The extraction function unwraps the `{data, errors}` envelope: any
    /// reported error fails the request, and a missing `data` field maps to
    /// [`ApiError::Deserialization`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the endpoint cannot produce a
    /// GraphQL URL, or [`ApiError::Deserialization`] when the envelope fails
    /// to encode.
    pub fn request<T>(
        &self,
        endpoint: &ServerEndpoint,
    ) -> Result<ApiRequest<T>, ApiError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let url = endpoint.graphql_url()?;
        let envelope = Envelope {
            query: &self.query,
            variables: &self.variables,
        };
        let body = serde_json::to_value(&envelope).map_err(|error| ApiError::Deserialization {
            message: format!("GraphQL envelope encode failed: {error}"),
        })?;
        let mut request = ApiRequest::<ResponseEnvelope<T>>::post_json(url, &body)?;
        if let Some(accept) = &self.accept {
            request = request.with_accept(accept);
        }
        if let Some(operation) = &self.operation {
            request = request.with_operation(operation);
        }
        Ok(map_envelope(request))
    }
}

fn map_envelope<T>(inner: ApiRequest<ResponseEnvelope<T>>) -> ApiRequest<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    inner.map(|envelope| {
        if let Some(errors) = envelope.errors.filter(|entries| !entries.is_empty()) {
            let joined = errors
                .iter()
                .map(|entry| entry.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::RequestFailed {
                status: 200,
                message: format!("GraphQL query failed: {joined}"),
            });
        }
        envelope.data.ok_or_else(|| ApiError::Deserialization {
            message: "GraphQL response carried neither data nor errors".to_owned(),
        })
    })
}

/// Cursor-paged connection body: `{pageInfo, nodes}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlPage<T> {
    /// Cursor state for the connection.
    pub page_info: GraphQlPageInfo,
    /// Nodes on this page, in server order.
    pub nodes: Vec<T>,
}

/// Connection cursor state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlPageInfo {
    /// Whether another page follows this one.
    pub has_next_page: bool,
    /// Opaque cursor addressing the next page, when one exists.
    pub end_cursor: Option<String>,
}

impl<T> GraphQlPage<T> {
    /// Converts the connection body into the generic page type.
    ///
    /// The next-token is present only when the server reports another page
    /// and supplied a cursor for it.
    #[must_use]
    pub fn into_page(self) -> Page<T> {
        let next = if self.page_info.has_next_page {
            self.page_info.end_cursor.map(PageToken::Cursor)
        } else {
            None
        };
        Page {
            items: self.nodes,
            next,
        }
    }
}
