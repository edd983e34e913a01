//! Answers "may the current user go there" for the router. Redirecting and
//! telling the user why is left to the caller

use futures::{
    channel::oneshot,
    future::{BoxFuture, FutureExt as _},
};
use taskdeck_shared::uac::RoleLevel;
use tracing::{debug, instrument};

use super::{spawn_with_notify, Client, UiCallBack};

/// What a route needs before it may be entered. Every variant other than
/// [`Requirement::Authenticated`] also needs a logged in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Permission(String),
    RoleLevel(RoleLevel),
    /// At least one must hold. Empty never allows
    AnyOf(Vec<Requirement>),
    /// All must hold. Empty never allows
    AllOf(Vec<Requirement>),
}

impl Requirement {
    pub fn permission<S: Into<String>>(action: S) -> Self {
        Self::Permission(action.into())
    }

    pub fn role_level<L: Into<RoleLevel>>(level: L) -> Self {
        Self::RoleLevel(level.into())
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    client: Client,
}

impl RouteGuard {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Resolves to `true` only if the requirement holds. Checks that cannot be
    /// answered deny
    pub fn check<'a>(&'a self, requirement: &'a Requirement) -> BoxFuture<'a, bool> {
        async move {
            if !self.client.is_authenticated() {
                debug!(?requirement, "denied, not authenticated");
                return false;
            }
            match requirement {
                Requirement::Authenticated => true,
                Requirement::Permission(action) => self.client.has_permission(action).await,
                Requirement::RoleLevel(min_level) => self.client.has_role_level(*min_level),
                Requirement::AnyOf(options) => {
                    for option in options {
                        if self.check(option).await {
                            return true;
                        }
                    }
                    false
                }
                Requirement::AllOf(needed) => {
                    if needed.is_empty() {
                        return false;
                    }
                    for each in needed {
                        if !self.check(each).await {
                            return false;
                        }
                    }
                    true
                }
            }
        }
        .boxed()
    }

    /// Runs [`RouteGuard::check`] on the runtime and calls `ui_notify` when
    /// the answer is ready
    #[instrument(skip(self, ui_notify))]
    pub fn check_with_notify<F: UiCallBack>(
        &self,
        requirement: Requirement,
        ui_notify: F,
    ) -> oneshot::Receiver<bool> {
        let guard = self.clone();
        spawn_with_notify(async move { guard.check(&requirement).await }, ui_notify)
    }
}
