use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use serde::de::DeserializeOwned;
use taskdeck_shared::{
    const_config::{
        client::{CLIENT_PERMISSION_TIMEOUT, CLIENT_REFRESH_TIMEOUT},
        error::ERROR_CODE_UNAUTHENTICATED,
        operation::OperationSpec,
        token::{TOKEN_ACCESS_LIFETIME, TOKEN_REFRESH_LIFETIME},
    },
    id::UserId,
    time::Seconds,
    uac::{SessionError, User},
};
use tracing::{debug, info, instrument};

use crate::configuration::ClientSettings;

pub mod authenticator;
pub mod events;
pub mod guard;
pub mod permissions;
pub mod refresh;
mod session;
pub mod single_flight;
pub mod storage;
pub mod token_store;
pub mod transport;

use authenticator::RequestAuthenticator;
use events::{EventBus, EventHook, SessionEvent, SessionState};
use permissions::PermissionCache;
use refresh::RefreshCoordinator;
use storage::{ExpiringStore, FileStore, KeyValueStore, MemoryStore};
use token_store::TokenStore;
use transport::{GraphQlRequest, GraphQlTransport, ReqwestTransport};

/// The session: who is logged in, their tokens and their permissions.
///
/// Cheap to clone, clones share the same session.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Arc<dyn GraphQlTransport>,
    tokens: Arc<TokenStore>,
    authenticator: RequestAuthenticator,
    refresher: Arc<RefreshCoordinator>,
    permissions: Arc<PermissionCache>,
    events: EventBus,
    settings: SessionSettings,
    inner: Arc<Mutex<ClientInner>>,
}

#[derive(Debug)]
struct ClientInner {
    user: Option<Arc<User>>,
    /// Request level cache of the `Me` result, tied to the session
    me: Option<Arc<User>>,
    /// Bumped every time the user is replaced or cleared so late results
    /// from an earlier session are not stored
    generation: u64,
    state: SessionState,
}

#[derive(Debug, Clone, Copy)]
struct SessionSettings {
    access_lifetime: Seconds,
    refresh_lifetime: Seconds,
    refresh_timeout: Seconds,
    permission_timeout: Seconds,
}

#[derive(Debug)]
pub struct ClientBuilder {
    transport: Arc<dyn GraphQlTransport>,
    primary: Option<Arc<dyn KeyValueStore>>,
    fallback: Option<Arc<dyn KeyValueStore>>,
    settings: SessionSettings,
    events: EventBus,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_lifetime: TOKEN_ACCESS_LIFETIME,
            refresh_lifetime: TOKEN_REFRESH_LIFETIME,
            refresh_timeout: CLIENT_REFRESH_TIMEOUT,
            permission_timeout: CLIENT_PERMISSION_TIMEOUT,
        }
    }
}

impl ClientInner {
    fn new() -> Self {
        Self {
            user: None,
            me: None,
            generation: 0,
            state: SessionState::Anonymous,
        }
    }
}

impl ClientBuilder {
    /// Primary store, expiring. Defaults to an in memory [`ExpiringStore`]
    pub fn primary_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.primary = Some(store);
        self
    }

    /// Fallback store, durable. Defaults to an in memory [`MemoryStore`]
    pub fn fallback_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.fallback = Some(store);
        self
    }

    pub fn token_lifetimes(mut self, access: Seconds, refresh: Seconds) -> Self {
        self.settings.access_lifetime = access;
        self.settings.refresh_lifetime = refresh;
        self
    }

    pub fn refresh_timeout(mut self, timeout: Seconds) -> Self {
        self.settings.refresh_timeout = timeout;
        self
    }

    pub fn permission_timeout(mut self, timeout: Seconds) -> Self {
        self.settings.permission_timeout = timeout;
        self
    }

    /// Subscribes before the client exists so no event is missed
    pub fn event_hook<F: EventHook>(self, hook: F) -> Self {
        self.events.subscribe(hook);
        self
    }

    #[instrument(name = "NEW CLIENT-CORE", skip(self))]
    pub fn build(self) -> Client {
        let primary = self
            .primary
            .unwrap_or_else(|| Arc::new(ExpiringStore::new()));
        let fallback = self.fallback.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let tokens = Arc::new(
            TokenStore::new(primary, fallback)
                .with_lifetimes(self.settings.access_lifetime, self.settings.refresh_lifetime)
                .with_events(self.events.clone()),
        );
        let authenticator = RequestAuthenticator::new(Arc::clone(&tokens), self.events.clone());
        let refresher = RefreshCoordinator::new(
            Arc::clone(&self.transport),
            Arc::clone(&tokens),
            self.events.clone(),
        )
        .with_timeout(self.settings.refresh_timeout);
        Client {
            transport: self.transport,
            tokens,
            authenticator,
            refresher: Arc::new(refresher),
            permissions: Arc::new(PermissionCache::new()),
            events: self.events,
            settings: self.settings,
            inner: Arc::new(Mutex::new(ClientInner::new())),
        }
    }
}

impl Client {
    pub fn builder(transport: Arc<dyn GraphQlTransport>) -> ClientBuilder {
        ClientBuilder {
            transport,
            primary: None,
            fallback: None,
            settings: SessionSettings::default(),
            events: EventBus::default(),
        }
    }

    /// Builds a client talking to the configured endpoint over HTTP. Uses a
    /// [`FileStore`] as the fallback store if a token file is configured
    pub fn from_settings(settings: &ClientSettings) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(settings.endpoint.clone())?;
        let mut builder = Self::builder(Arc::new(transport))
            .token_lifetimes(settings.access_lifetime(), settings.refresh_lifetime())
            .refresh_timeout(settings.refresh_timeout())
            .permission_timeout(settings.permission_timeout());
        if let Some(path) = &settings.token_file {
            info!(?path, "persisting tokens to file");
            builder = builder.fallback_store(Arc::new(FileStore::new(path)));
        }
        Ok(builder.build())
    }

    pub fn subscribe<F: EventHook>(&self, hook: F) {
        self.events.subscribe(hook);
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn permission_cache(&self) -> &PermissionCache {
        &self.permissions
    }

    pub fn current_user(&self) -> Option<Arc<User>> {
        self.inner.lock().expect("mutex poisoned").user.clone()
    }

    /// A user is set and an access token is readable
    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some() && self.tokens.access_token().is_some()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().expect("mutex poisoned").state
    }

    /// Runs an operation on behalf of the current user.
    ///
    /// Refreshes first if only a refresh token is left. If the server answers
    /// that the request was not authenticated, refreshes once and retries
    /// once.
    #[instrument(skip(self, variables), fields(operation = spec.name))]
    pub async fn execute(
        &self,
        spec: OperationSpec,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, SessionError> {
        let needs_auth = !spec.is_public();
        if needs_auth && self.should_refresh_token() {
            self.refresh_tokens().await?;
        }
        match self.send(GraphQlRequest::new(spec, variables.clone())).await {
            Err(e) if needs_auth && is_unauthenticated(&e) && self.tokens.refresh_token().is_some() => {
                info!("server rejected access token, refreshing and retrying once");
                self.refresh_tokens().await?;
                self.send(GraphQlRequest::new(spec, variables)).await
            }
            outcome => outcome,
        }
    }

    /// [`Client::execute`] then deserializes `data`
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        spec: OperationSpec,
        variables: serde_json::Value,
    ) -> Result<T, SessionError> {
        let data = self.execute(spec, variables).await?;
        decode(data)
    }

    /// Authenticates and sends a single request, no refresh handling
    async fn send(&self, mut request: GraphQlRequest) -> Result<serde_json::Value, SessionError> {
        let _decision = self.authenticator.authenticate(&mut request);
        let response = self.transport.execute(request).await?;
        response.into_data()
    }

    fn set_state(&self, to: SessionState) {
        let from = {
            let mut guard = self.inner.lock().expect("mutex poisoned");
            std::mem::replace(&mut guard.state, to)
        };
        if from != to {
            info!(%from, %to, "session state changed");
            self.events.emit(SessionEvent::StateChanged { from, to });
        }
    }

    /// The resting state implied by the current user and tokens
    fn settled_state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    fn current_user_and_generation(&self) -> Option<(UserId, u64)> {
        let guard = self.inner.lock().expect("mutex poisoned");
        guard
            .user
            .as_ref()
            .map(|user| (user.id.clone(), guard.generation))
    }

    /// Applies `update` to the current user if the session is still the one
    /// identified by `generation` and `user_id`. Returns false if it changed
    fn update_user_if_current<F>(&self, generation: u64, user_id: &UserId, update: F) -> bool
    where
        F: FnOnce(&mut User),
    {
        let mut guard = self.inner.lock().expect("mutex poisoned");
        if guard.generation != generation {
            return false;
        }
        match guard.user.as_mut() {
            Some(user) if &user.id == user_id => {
                update(Arc::make_mut(user));
                true
            }
            _ => false,
        }
    }
}

fn is_unauthenticated(error: &SessionError) -> bool {
    matches!(
        error,
        SessionError::Server { code: Some(code), .. } if code == ERROR_CODE_UNAUTHENTICATED
    )
}

fn decode<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, SessionError> {
    serde_json::from_value(data).map_err(|e| SessionError::UnexpectedResponse(e.to_string()))
}

/// Runs `future` on the current runtime, sends its output down the returned
/// channel then calls `ui_notify`
fn spawn_with_notify<T, Fut, F>(future: Fut, ui_notify: F) -> oneshot::Receiver<T>
where
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    F: UiCallBack,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let msg = future.await;
        if tx.send(msg).is_err() {
            debug!("receiver dropped before the result was ready");
        }
        ui_notify();
    });
    rx
}

/// Called once a `*_with_notify` request has finished, usually to wake up the
/// UI so it repaints
pub trait UiCallBack: 'static + Send + FnOnce() {}
impl<T> UiCallBack for T where T: 'static + Send + FnOnce() {}
