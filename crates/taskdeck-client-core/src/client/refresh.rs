use std::sync::Arc;

use futures::future::FutureExt as _;
use taskdeck_shared::{
    const_config::{client::CLIENT_REFRESH_TIMEOUT, operation::OPERATION_REFRESH_TOKEN},
    time::Seconds,
    token::AccessToken,
    uac::{RefreshTokenData, SessionError},
};
use tracing::{info, instrument, warn};

use super::{
    events::{EventBus, SessionEvent},
    single_flight::{with_timeout, SingleFlight},
    token_store::TokenStore,
    transport::{GraphQlRequest, GraphQlTransport},
};

/// Makes sure at most one refresh token request is outstanding. Every caller
/// that arrives while one is running gets that request's outcome
#[derive(Debug)]
pub struct RefreshCoordinator {
    transport: Arc<dyn GraphQlTransport>,
    tokens: Arc<TokenStore>,
    events: EventBus,
    timeout: Seconds,
    flight: SingleFlight<AccessToken>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn GraphQlTransport>,
        tokens: Arc<TokenStore>,
        events: EventBus,
    ) -> Self {
        Self {
            transport,
            tokens,
            events,
            timeout: CLIENT_REFRESH_TIMEOUT,
            flight: SingleFlight::new("refresh_token"),
        }
    }

    pub fn with_timeout(mut self, timeout: Seconds) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_refreshing(&self) -> bool {
        self.flight.is_in_flight()
    }

    /// Detaches a running refresh so the next caller starts a new one. Used
    /// when the session it was started for ends
    pub fn detach(&self) {
        self.flight.clear();
    }

    /// Returns a new access token.
    ///
    /// On failure all tokens are cleared so the user has to log in again.
    /// Nothing is retried. Outcomes are only written if the stored refresh
    /// token is still the one that was sent, otherwise they belong to a
    /// session that has ended and [`SessionError::SessionChanged`] is returned.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<AccessToken, SessionError> {
        let transport = Arc::clone(&self.transport);
        let tokens = Arc::clone(&self.tokens);
        let events = self.events.clone();
        let timeout = self.timeout;
        self.flight
            .run(move || {
                async move {
                    let Some(refresh_token) = tokens.refresh_token() else {
                        warn!("refresh requested without a refresh token");
                        return Err(SessionError::NoRefreshToken);
                    };
                    // The access token is stale or missing by definition, never attach it
                    let request = GraphQlRequest::new(
                        OPERATION_REFRESH_TOKEN,
                        serde_json::json!({ "refreshToken": refresh_token.expose_secret() }),
                    )
                    .skip_auth();
                    let outcome = with_timeout(OPERATION_REFRESH_TOKEN.name, timeout, async {
                        let response = transport.execute(request).await?;
                        let data: RefreshTokenData = serde_json::from_value(response.into_data()?)
                            .map_err(|e| SessionError::UnexpectedResponse(e.to_string()))?;
                        Ok(data.refresh_token)
                    })
                    .await;
                    let stale = SessionError::SessionChanged {
                        operation: OPERATION_REFRESH_TOKEN.name,
                    };
                    match outcome {
                        Ok(pair) => {
                            if !tokens.replace_tokens_if(&refresh_token, &pair) {
                                warn!("discarding tokens refreshed for a session that has ended");
                                return Err(stale);
                            }
                            info!("access token refreshed");
                            events.emit(SessionEvent::TokensRefreshed);
                            Ok(pair.access_token)
                        }
                        Err(e) => {
                            if !tokens.clear_tokens_if(&refresh_token) {
                                warn!(?e, "refresh failed for a session that has ended");
                                return Err(stale);
                            }
                            warn!(?e, "refresh failed, cleared tokens");
                            events.emit(SessionEvent::RefreshFailed {
                                reason: e.to_string(),
                            });
                            Err(SessionError::RefreshFailed(e.to_string()))
                        }
                    }
                }
                .boxed()
            })
            .await
    }
}
