//! Structured diagnostics the host application can subscribe to

use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};

use taskdeck_shared::id::UserId;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    LoggedIn {
        user_id: UserId,
    },
    LoggedOut,
    /// The best effort server side logout failed, local state was still cleared
    LogoutNotificationFailed {
        reason: String,
    },
    TokensRefreshed,
    RefreshFailed {
        reason: String,
    },
    /// A non public operation was sent without an access token
    UnauthenticatedRequest {
        operation_name: String,
    },
    PermissionsLoaded {
        user_id: UserId,
        count: usize,
    },
    PermissionFetchFailed {
        user_id: UserId,
        reason: String,
    },
    ProfileCompleted {
        user_id: UserId,
    },
    ProfileFetchFailed {
        user_id: UserId,
        reason: String,
    },
    StorageDegraded {
        key: &'static str,
        reason: String,
    },
}

pub trait EventHook: Fn(&SessionEvent) + Send + Sync + 'static {}
impl<T> EventHook for T where T: Fn(&SessionEvent) + Send + Sync + 'static {}

type SharedHook = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Fans events out to every subscribed hook. Clones share the same hooks
#[derive(Clone, Default)]
pub struct EventBus {
    hooks: Arc<Mutex<Vec<SharedHook>>>,
}

impl EventBus {
    pub fn subscribe<F: EventHook>(&self, hook: F) {
        self.hooks
            .lock()
            .expect("mutex poisoned")
            .push(Arc::new(hook));
    }

    pub fn emit(&self, event: SessionEvent) {
        debug!(?event, "session event");
        // Snapshot so a hook may subscribe without deadlocking
        let hooks = self.hooks.lock().expect("mutex poisoned").clone();
        for hook in hooks.iter() {
            hook(&event);
        }
    }
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.hooks.lock().map(|hooks| hooks.len()).unwrap_or_default();
        f.debug_struct("EventBus").field("hooks", &count).finish()
    }
}
