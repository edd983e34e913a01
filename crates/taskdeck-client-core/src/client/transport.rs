//! The GraphQL transport the session layer sends operations through

use std::fmt::Debug;

use anyhow::Context as _;
use futures::future::{BoxFuture, FutureExt as _};
use reqwest::{header::HeaderMap, StatusCode};
use taskdeck_shared::{
    const_config::{error::ERROR_CODE_UNAUTHENTICATED, operation::OperationSpec},
    uac::SessionError,
};
use tracing::info;

/// Executes one GraphQL operation. Implementations only move bytes, they must
/// not add authentication of their own
pub trait GraphQlTransport: Send + Sync + Debug + 'static {
    fn execute(
        &self,
        request: GraphQlRequest,
    ) -> BoxFuture<'static, Result<GraphQlResponse, TransportError>>;
}

#[derive(Debug, Clone)]
pub struct GraphQlRequest {
    pub operation_name: String,
    pub query: String,
    pub variables: serde_json::Value,
    pub headers: HeaderMap,
    /// Set for requests that must go out exactly as built, without an
    /// `Authorization` header being added
    pub skip_auth: bool,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphQlResponse {
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ErrorExtensions {
    pub code: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to send request: {0}")]
    Network(String),
    #[error("request failed with status code: {status}. {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Decode(String),
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody<'a> {
    query: &'a str,
    operation_name: &'a str,
    variables: &'a serde_json::Value,
}

impl GraphQlRequest {
    pub fn new(spec: OperationSpec, variables: serde_json::Value) -> Self {
        Self::custom(spec.name, spec.document, variables)
    }

    /// For operations that are not part of the session layer itself
    pub fn custom<N, Q>(operation_name: N, query: Q, variables: serde_json::Value) -> Self
    where
        N: Into<String>,
        Q: Into<String>,
    {
        Self {
            operation_name: operation_name.into(),
            query: query.into(),
            variables,
            headers: HeaderMap::new(),
            skip_auth: false,
        }
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// The bearer token attached to this request if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

impl GraphQlResponse {
    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            errors: vec![],
        }
    }

    pub fn with_error<S: Into<String>>(message: S, code: Option<&str>) -> Self {
        Self {
            data: None,
            errors: vec![GraphQlError {
                message: message.into(),
                extensions: Some(ErrorExtensions {
                    code: code.map(ToString::to_string),
                }),
            }],
        }
    }

    /// Returns `data` or the first error converted for the caller
    pub fn into_data(self) -> Result<serde_json::Value, SessionError> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(SessionError::Server {
                code: first.code().map(ToString::to_string),
                message: first.message,
            });
        }
        self.data
            .filter(|data| !data.is_null())
            .ok_or_else(|| SessionError::UnexpectedResponse("response has no data".into()))
    }
}

impl GraphQlError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.code.as_deref()
    }
}

impl From<TransportError> for SessionError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Network(e) => SessionError::Network(e),
            TransportError::Status { status, body } => SessionError::Server {
                code: (status == StatusCode::UNAUTHORIZED.as_u16())
                    .then(|| ERROR_CODE_UNAUTHENTICATED.to_string()),
                message: if body.is_empty() {
                    format!("request failed with status code: {status} and no body")
                } else {
                    body
                },
            },
            TransportError::Decode(e) => SessionError::UnexpectedResponse(e),
        }
    }
}

/// Sends operations as JSON POST requests to a single GraphQL endpoint
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    api_client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    #[tracing::instrument(name = "NEW REQWEST-TRANSPORT")]
    pub fn new(endpoint: String) -> anyhow::Result<Self> {
        let api_client = reqwest::Client::builder()
            .build()
            .context("unable to create reqwest client")?;
        Ok(Self {
            api_client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl GraphQlTransport for ReqwestTransport {
    // WARNING: Must skip request as it may contain secrets in the variables
    #[tracing::instrument(skip(self, request), fields(operation = %request.operation_name))]
    fn execute(
        &self,
        request: GraphQlRequest,
    ) -> BoxFuture<'static, Result<GraphQlResponse, TransportError>> {
        let body = RequestBody {
            query: &request.query,
            operation_name: &request.operation_name,
            variables: &request.variables,
        };
        let builder = self
            .api_client
            .post(&self.endpoint)
            .headers(request.headers.clone())
            .json(&body);
        async move { process_response(builder.send().await).await }.boxed()
    }
}

// WARNING: Must not record the response body, login and refresh replies carry
// tokens
#[tracing::instrument(skip(response), fields(status), err(Debug))]
async fn process_response(
    response: reqwest::Result<reqwest::Response>,
) -> Result<GraphQlResponse, TransportError> {
    let (response, status) = extract_response(response)?;
    tracing::Span::current().record("status", status.as_u16());
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    } else {
        Err(handle_error(response).await)
    }
}

#[tracing::instrument(ret)]
async fn handle_error(response: reqwest::Response) -> TransportError {
    let status = response.status();
    debug_assert!(
        !status.is_success(),
        "this is supposed to be an error, right? Status code is: {status}"
    );
    let body = response.text().await.unwrap_or_default();
    // GraphQL servers often still send a proper error document with a non 2xx
    if let Ok(document) = serde_json::from_str::<GraphQlResponse>(&body) {
        if let Some(first) = document.errors.into_iter().next() {
            return TransportError::Status {
                status: status.as_u16(),
                body: first.message,
            };
        }
    }
    TransportError::Status {
        status: status.as_u16(),
        body,
    }
}

/// Provides a way to standardize the error message
#[tracing::instrument(ret, err(Debug))]
fn extract_response(
    response: reqwest::Result<reqwest::Response>,
) -> Result<(reqwest::Response, StatusCode), TransportError> {
    if response.is_err() {
        info!("Response is err: {:#?}", response);
    }
    let response = response.map_err(|e| TransportError::Network(e.to_string()))?;
    let status = response.status();
    Ok((response, status))
}
