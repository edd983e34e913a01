use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use taskdeck_shared::const_config::operation::is_public_operation;
use tracing::{error, instrument, warn};

use super::{
    events::{EventBus, SessionEvent},
    token_store::TokenStore,
    transport::GraphQlRequest,
};

/// What [`RequestAuthenticator::authenticate`] did to a request
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Request asked to go out unmodified
    Skipped,
    /// `Authorization: Bearer <token>` was attached
    Attached,
    /// No token available but the operation does not need one
    Public,
    /// No token available for an operation that needs one. Sent anyway, the
    /// server's rejection is handled by whoever executes the request
    Unauthenticated,
}

/// Attaches bearer authentication to outgoing operations
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    tokens: Arc<TokenStore>,
    events: EventBus,
}

impl RequestAuthenticator {
    pub fn new(tokens: Arc<TokenStore>, events: EventBus) -> Self {
        Self { tokens, events }
    }

    #[instrument(skip(self, request), fields(operation = %request.operation_name), ret)]
    pub fn authenticate(&self, request: &mut GraphQlRequest) -> AuthDecision {
        if request.skip_auth {
            return AuthDecision::Skipped;
        }
        if let Some(token) = self.tokens.access_token() {
            match HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    request.headers.insert(AUTHORIZATION, value);
                    return AuthDecision::Attached;
                }
                Err(e) => {
                    // Token holds bytes not allowed in a header, treat as absent
                    error!(?e, "stored access token is not a valid header value");
                }
            }
        }
        if is_public_operation(&request.operation_name) {
            AuthDecision::Public
        } else {
            warn!("operation attempted without an access token");
            self.events.emit(SessionEvent::UnauthenticatedRequest {
                operation_name: request.operation_name.clone(),
            });
            AuthDecision::Unauthenticated
        }
    }
}
