use std::sync::Arc;

use futures::channel::oneshot;
use secrecy::ExposeSecret as _;
use taskdeck_shared::{
    const_config::{
        error::{ERROR_CODE_BAD_CREDENTIALS, ERROR_CODE_UNAUTHENTICATED},
        operation::{OPERATION_LOGIN, OPERATION_LOGOUT, OPERATION_ME},
    },
    id::UserId,
    req_args::LoginReqArgs,
    token::{AccessToken, RefreshToken, TokenPair},
    uac::{LoginData, LogoutData, MeData, Permissions, SessionError, User},
};
use tracing::{debug, info, instrument, warn};

use super::{
    events::{SessionEvent, SessionState},
    single_flight::with_timeout,
    transport::GraphQlRequest,
    spawn_with_notify, Client, UiCallBack,
};

impl Client {
    /// Logs in and returns the user with only the identity fields set.
    ///
    /// Role and permissions are fetched in the background afterwards and
    /// written into the current user when they arrive.
    #[instrument(skip(self))]
    pub async fn login(&self, args: LoginReqArgs) -> Result<Arc<User>, SessionError> {
        self.set_state(SessionState::Authenticating);
        let request = GraphQlRequest::new(
            OPERATION_LOGIN,
            serde_json::json!({
                "email": args.email,
                "password": args.password.expose_secret(),
            }),
        );
        let outcome = match self.send(request).await {
            Ok(data) => super::decode::<LoginData>(data),
            Err(e) => Err(classify_login_error(e)),
        };
        let (tokens, user) = match outcome {
            Ok(data) => data.login.split(),
            Err(e) => {
                warn!(?e, "login failed");
                self.set_state(self.settled_state());
                return Err(e);
            }
        };

        self.tokens.set_tokens(&tokens);
        let user = self.start_session(user);
        info!(user_id = %user.id, "logged in");
        Ok(user)
    }

    /// Runs [`Client::login`] on the runtime and calls `ui_notify` when done
    #[instrument(skip(self, ui_notify))]
    pub fn login_with_notify<F: UiCallBack>(
        &self,
        args: LoginReqArgs,
        ui_notify: F,
    ) -> oneshot::Receiver<Result<Arc<User>, SessionError>> {
        let client = self.clone();
        spawn_with_notify(async move { client.login(args).await }, ui_notify)
    }

    /// Sets the user and tokens obtained outside of login, for example when an
    /// invitation is accepted. Without a refresh token the stored one is kept
    #[instrument(skip(self, access_token, refresh_token))]
    pub fn set_user(
        &self,
        user: User,
        access_token: AccessToken,
        refresh_token: Option<RefreshToken>,
    ) -> Arc<User> {
        match refresh_token {
            Some(refresh_token) => self
                .tokens
                .set_tokens(&TokenPair::new(access_token, refresh_token)),
            None => self.tokens.set_access_token(&access_token),
        }
        self.start_session(user)
    }

    /// Overwrites the stored tokens only, the user is left untouched
    #[instrument(skip(self, tokens))]
    pub fn update_tokens(&self, tokens: TokenPair) {
        self.tokens.set_tokens(&tokens);
    }

    /// Tells the server the session is over then clears all local state.
    ///
    /// Never fails. Local state is cleared even if the server could not be
    /// reached.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.tokens.access_token().is_some() {
            let request = GraphQlRequest::new(OPERATION_LOGOUT, serde_json::json!({}));
            let notification = with_timeout(
                OPERATION_LOGOUT.name,
                self.settings.refresh_timeout,
                async {
                    let data = self.send(request).await?;
                    super::decode::<LogoutData>(data)
                },
            )
            .await;
            match notification {
                Ok(data) => debug!(message = %data.logout.message, "server ended session"),
                Err(e) => {
                    warn!(?e, "server side logout failed, clearing local state anyway");
                    self.events.emit(SessionEvent::LogoutNotificationFailed {
                        reason: e.to_string(),
                    });
                }
            }
        } else {
            debug!("no access token, skipping server side logout");
        }
        self.clear_session();
        info!("logged out");
        self.events.emit(SessionEvent::LoggedOut);
    }

    #[instrument(skip(self, ui_notify))]
    pub fn logout_with_notify<F: UiCallBack>(&self, ui_notify: F) -> oneshot::Receiver<()> {
        let client = self.clone();
        spawn_with_notify(async move { client.logout().await }, ui_notify)
    }

    /// Fetches the permissions again and stores them on the current user.
    /// Empty if nobody is logged in
    #[instrument(skip(self))]
    pub async fn refresh_user_permissions(&self) -> Result<Permissions, SessionError> {
        if self.current_user().is_none() {
            return Ok(Permissions::default());
        }
        self.permissions.clear();
        self.load_permissions().await
    }

    /// True only when the access token is gone but a refresh token is left
    pub fn should_refresh_token(&self) -> bool {
        self.tokens.access_token().is_none() && self.tokens.refresh_token().is_some()
    }

    /// Gets a new access token, joining a refresh that is already running.
    ///
    /// If the refresh fails the session is cleared and the user has to log in
    /// again. A refresh that completes after the session changed leaves the new
    /// session alone.
    #[instrument(skip(self))]
    pub async fn refresh_tokens(&self) -> Result<AccessToken, SessionError> {
        let generation = self.generation();
        self.set_state(SessionState::Refreshing);
        let outcome = self.refresher.refresh().await;
        match &outcome {
            Err(e) if e.requires_login() && generation == self.generation() => {
                self.clear_session()
            }
            _ => self.set_state(self.settled_state()),
        }
        outcome
    }

    /// The current user as the server sees it. Cached until the session
    /// changes
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<Arc<User>, SessionError> {
        let generation = {
            let guard = self.inner.lock().expect("mutex poisoned");
            if let Some(me) = &guard.me {
                return Ok(Arc::clone(me));
            }
            guard.generation
        };
        let data: MeData = self.execute_as(OPERATION_ME, serde_json::json!({})).await?;
        let me = Arc::new(data.me);
        let mut guard = self.inner.lock().expect("mutex poisoned");
        if guard.generation == generation {
            guard.me = Some(Arc::clone(&me));
        }
        Ok(me)
    }

    /// Replaces the user, invalidating everything tied to the previous one
    fn start_session(&self, mut user: User) -> Arc<User> {
        user.permissions = None;
        let user = Arc::new(user);
        let generation = {
            let mut guard = self.inner.lock().expect("mutex poisoned");
            guard.generation += 1;
            guard.user = Some(Arc::clone(&user));
            guard.me = None;
            guard.generation
        };
        // Cleared after the generation moved so an older fetch has nothing to
        // write into
        self.permissions.clear();
        self.refresher.detach();
        self.set_state(self.settled_state());
        self.events.emit(SessionEvent::LoggedIn {
            user_id: user.id.clone(),
        });
        self.spawn_profile_completion(generation, user.id.clone());
        user
    }

    /// Clears the user, the cached `Me` result, the permissions and the tokens
    fn clear_session(&self) {
        {
            let mut guard = self.inner.lock().expect("mutex poisoned");
            guard.generation += 1;
            guard.user = None;
            guard.me = None;
        }
        self.permissions.clear();
        self.refresher.detach();
        self.tokens.clear_tokens();
        self.set_state(SessionState::Anonymous);
    }

    fn generation(&self) -> u64 {
        self.inner.lock().expect("mutex poisoned").generation
    }

    fn spawn_profile_completion(&self, generation: u64, user_id: UserId) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.clone();
                handle.spawn(async move { client.complete_profile(generation, user_id).await });
            }
            Err(e) => {
                warn!(?e, "no runtime available, profile will be completed on first check")
            }
        }
    }

    /// Fills in the role and permissions of a freshly set user
    #[instrument(skip(self))]
    async fn complete_profile(&self, generation: u64, user_id: UserId) {
        let (me, permissions) = futures::join!(self.me(), self.load_permissions());
        let mut failure = permissions.err();
        match me {
            Ok(me) if me.id == user_id => {
                let role = me.role.clone();
                self.update_user_if_current(generation, &user_id, |user| user.role = role);
            }
            Ok(me) => warn!(me = %me.id, "server returned a different user, role not applied"),
            Err(e) => failure = Some(e),
        }
        match failure {
            None => self.events.emit(SessionEvent::ProfileCompleted { user_id }),
            Some(e) => {
                warn!(?e, "unable to complete profile");
                self.events.emit(SessionEvent::ProfileFetchFailed {
                    user_id,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Rejected credentials are reported with the server's message, anything else
/// is passed on unchanged
fn classify_login_error(error: SessionError) -> SessionError {
    match error {
        SessionError::Server {
            message,
            code: Some(code),
        } if code == ERROR_CODE_UNAUTHENTICATED || code == ERROR_CODE_BAD_CREDENTIALS => {
            SessionError::Authentication { message }
        }
        e => e,
    }
}
