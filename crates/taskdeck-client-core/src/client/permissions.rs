use futures::future::{BoxFuture, FutureExt as _};
use taskdeck_shared::{
    const_config::operation::OPERATION_USER_PERMISSIONS,
    id::UserId,
    req_args::UserPermissionsReqArgs,
    uac::{Permissions, RoleLevel, SessionError, UserPermissionsData},
};
use tracing::{instrument, warn};

use super::{
    events::SessionEvent,
    single_flight::{with_timeout, SingleFlight},
    Client,
};

/// Lazily loaded permission strings of the current user.
///
/// Loads are single flight: concurrent checks share one fetch. A successful
/// load is kept until [`PermissionCache::clear`]. Errors are never kept so the
/// next check tries again.
#[derive(Debug)]
pub struct PermissionCache {
    flight: SingleFlight<Permissions>,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self {
            flight: SingleFlight::memoized("user_permissions"),
        }
    }

    pub fn cached(&self) -> Option<Permissions> {
        self.flight.completed()
    }

    pub fn is_loaded(&self) -> bool {
        self.cached().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.flight.is_in_flight()
    }

    /// Never fetches, false until a load has succeeded
    pub fn allows_sync(&self, action: &str) -> bool {
        self.cached().is_some_and(|perms| perms.allows(action))
    }

    /// Returns the kept permissions, joins a running fetch or starts `fetch`
    pub async fn load<F>(&self, fetch: F) -> Result<Permissions, SessionError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Permissions, SessionError>>,
    {
        self.flight.run(fetch).await
    }

    pub fn clear(&self) {
        self.flight.clear();
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Instant check against the role level, never touches the network
    pub fn has_role_level(&self, min_level: RoleLevel) -> bool {
        self.current_user()
            .and_then(|user| user.role_level())
            .is_some_and(|level| level >= min_level)
    }

    /// Fetches permissions on first use. Fails closed: any error denies
    #[instrument(skip(self))]
    pub async fn has_permission(&self, action: &str) -> bool {
        match self.try_has_permission(action).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(?e, "permission check failed, denying");
                false
            }
        }
    }

    /// Like [`Client::has_permission`] but lets the caller see why a check
    /// could not be answered
    pub async fn try_has_permission(&self, action: &str) -> Result<bool, SessionError> {
        if self.current_user().is_none() {
            return Ok(false);
        }
        Ok(self.load_permissions().await?.allows(action))
    }

    /// Answers only from already loaded permissions, false if not loaded
    pub fn has_permission_sync(&self, action: &str) -> bool {
        self.current_user().is_some() && self.permissions.allows_sync(action)
    }

    /// Loads permissions now so later sync checks can answer. No-op if already
    /// loaded, joins the fetch if one is running
    #[instrument(skip(self))]
    pub async fn preload_permissions(&self) -> Result<(), SessionError> {
        self.load_permissions().await.map(|_| ())
    }

    /// Forces the next check to fetch again. Use after changing roles or
    /// permissions on the server
    #[instrument(skip(self))]
    pub fn clear_permission_cache(&self) {
        self.permissions.clear();
    }

    /// True if the current user may assign a role of `target` level
    pub fn can_assign_role(&self, target: RoleLevel) -> bool {
        self.current_user()
            .and_then(|user| user.role.as_ref().map(|role| role.can_assign_role(target)))
            .unwrap_or(false)
    }

    /// True if the current user may manage a user holding a role of `target`
    /// level
    pub fn can_manage_user(&self, target: RoleLevel) -> bool {
        self.current_user()
            .and_then(|user| user.role.as_ref().map(|role| role.can_manage_user(target)))
            .unwrap_or(false)
    }

    /// Loads (or joins the load of) the current user's permissions and stores
    /// them on the user. Empty if nobody is logged in
    pub(crate) async fn load_permissions(&self) -> Result<Permissions, SessionError> {
        let Some((user_id, generation)) = self.current_user_and_generation() else {
            return Ok(Permissions::default());
        };
        let client = self.clone();
        let fetch_for = user_id.clone();
        let permissions = self
            .permissions
            .load(move || {
                async move {
                    let outcome = with_timeout(
                        OPERATION_USER_PERMISSIONS.name,
                        client.settings.permission_timeout,
                        client.fetch_permissions(&fetch_for),
                    )
                    .await
                    .map_err(|e| match e {
                        e @ SessionError::PermissionFetch(_) => e,
                        e => SessionError::PermissionFetch(e.to_string()),
                    });
                    match &outcome {
                        Ok(perms) => client.events.emit(SessionEvent::PermissionsLoaded {
                            user_id: fetch_for,
                            count: perms.len(),
                        }),
                        Err(e) => client.events.emit(SessionEvent::PermissionFetchFailed {
                            user_id: fetch_for,
                            reason: e.to_string(),
                        }),
                    }
                    outcome
                }
                .boxed()
            })
            .await?;

        let is_stored = self.update_user_if_current(generation, &user_id, |user| {
            user.permissions = Some(permissions.clone())
        });
        if is_stored {
            Ok(permissions)
        } else {
            // The session changed while loading, these belong to someone else
            Err(SessionError::PermissionFetch(
                "session changed while loading permissions".into(),
            ))
        }
    }

    async fn fetch_permissions(&self, user_id: &UserId) -> Result<Permissions, SessionError> {
        let args = UserPermissionsReqArgs {
            user_id: user_id.clone(),
        };
        let variables = serde_json::to_value(args)
            .map_err(|e| SessionError::UnexpectedResponse(e.to_string()))?;
        let data: UserPermissionsData = self
            .execute_as(OPERATION_USER_PERMISSIONS, variables)
            .await?;
        Ok(data.user_permissions)
    }
}
