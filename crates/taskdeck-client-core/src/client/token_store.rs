use std::sync::{Arc, Mutex};

use taskdeck_shared::{
    const_config::token::{
        TOKEN_ACCESS_LIFETIME, TOKEN_KEY_ACCESS, TOKEN_KEY_REFRESH, TOKEN_REFRESH_LIFETIME,
    },
    time::Seconds,
    token::{AccessToken, RefreshToken, TokenPair},
};
use tracing::{instrument, warn};

use super::{
    events::{EventBus, SessionEvent},
    storage::{KeyValueStore, StorageError},
};

/// Persists the token pair redundantly into a primary (expiring) store and a
/// fallback store.
///
/// Storage failures never reach the caller. They are traced and reported as
/// [`SessionEvent::StorageDegraded`], the session keeps working with whatever
/// store is still usable.
#[derive(Debug)]
pub struct TokenStore {
    primary: Arc<dyn KeyValueStore>,
    fallback: Arc<dyn KeyValueStore>,
    access_lifetime: Seconds,
    refresh_lifetime: Seconds,
    events: EventBus,
    /// Held for every write so a compare-and-set sees no write in between
    writes: Mutex<()>,
}

#[derive(Debug, Clone, Copy)]
enum Backing {
    Primary,
    Fallback,
}

impl TokenStore {
    pub fn new(primary: Arc<dyn KeyValueStore>, fallback: Arc<dyn KeyValueStore>) -> Self {
        Self {
            primary,
            fallback,
            access_lifetime: TOKEN_ACCESS_LIFETIME,
            refresh_lifetime: TOKEN_REFRESH_LIFETIME,
            events: EventBus::default(),
            writes: Mutex::new(()),
        }
    }

    pub fn with_lifetimes(mut self, access_lifetime: Seconds, refresh_lifetime: Seconds) -> Self {
        self.access_lifetime = access_lifetime;
        self.refresh_lifetime = refresh_lifetime;
        self
    }

    pub(crate) fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    #[instrument(skip(self))]
    pub fn set_tokens(&self, tokens: &TokenPair) {
        let _guard = self.writes.lock().expect("mutex poisoned");
        self.write_pair(tokens);
    }

    /// Replaces only the access token, the stored refresh token is left as is
    #[instrument(skip(self))]
    pub fn set_access_token(&self, access_token: &AccessToken) {
        let _guard = self.writes.lock().expect("mutex poisoned");
        self.write_access(access_token);
    }

    /// Stores `tokens` only if the stored refresh token is still `expected`.
    /// Returns `false` and leaves the store untouched otherwise
    #[instrument(skip(self))]
    pub fn replace_tokens_if(&self, expected: &RefreshToken, tokens: &TokenPair) -> bool {
        let _guard = self.writes.lock().expect("mutex poisoned");
        if self.refresh_token().as_ref() != Some(expected) {
            return false;
        }
        self.write_pair(tokens);
        true
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.read(TOKEN_KEY_ACCESS).map(Into::into)
    }

    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.read(TOKEN_KEY_REFRESH).map(Into::into)
    }

    /// Removes both tokens from both stores. Safe to call repeatedly
    #[instrument(skip(self))]
    pub fn clear_tokens(&self) {
        let _guard = self.writes.lock().expect("mutex poisoned");
        self.remove_all();
    }

    /// Clears the tokens only if the stored refresh token is still `expected`
    #[instrument(skip(self))]
    pub fn clear_tokens_if(&self, expected: &RefreshToken) -> bool {
        let _guard = self.writes.lock().expect("mutex poisoned");
        if self.refresh_token().as_ref() != Some(expected) {
            return false;
        }
        self.remove_all();
        true
    }

    pub fn has_tokens(&self) -> bool {
        self.access_token().is_some() && self.refresh_token().is_some()
    }

    fn write_pair(&self, tokens: &TokenPair) {
        self.write_access(&tokens.access_token);
        self.write(
            TOKEN_KEY_REFRESH,
            tokens.refresh_token.expose_secret(),
            self.refresh_lifetime,
        );
    }

    fn write_access(&self, access_token: &AccessToken) {
        self.write(
            TOKEN_KEY_ACCESS,
            access_token.expose_secret(),
            self.access_lifetime,
        );
    }

    fn remove_all(&self) {
        for key in [TOKEN_KEY_ACCESS, TOKEN_KEY_REFRESH] {
            self.absorb(Backing::Primary, key, self.primary.remove(key));
            self.absorb(Backing::Fallback, key, self.fallback.remove(key));
        }
    }

    fn write(&self, key: &'static str, value: &str, lifetime: Seconds) {
        // Each write is attempted even if the other one failed
        self.absorb(
            Backing::Primary,
            key,
            self.primary.set(key, value, Some(lifetime)),
        );
        self.absorb(Backing::Fallback, key, self.fallback.set(key, value, None));
    }

    fn read(&self, key: &'static str) -> Option<String> {
        let primary = self.primary.get(key).unwrap_or_else(|e| {
            self.report(Backing::Primary, key, &e);
            None
        });
        primary.or_else(|| {
            self.fallback.get(key).unwrap_or_else(|e| {
                self.report(Backing::Fallback, key, &e);
                None
            })
        })
    }

    fn absorb(&self, backing: Backing, key: &'static str, result: Result<(), StorageError>) {
        if let Err(e) = result {
            self.report(backing, key, &e);
        }
    }

    fn report(&self, backing: Backing, key: &'static str, error: &StorageError) {
        warn!(?backing, key, ?error, "token storage degraded");
        self.events.emit(SessionEvent::StorageDegraded {
            key,
            reason: error.to_string(),
        });
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(
            Arc::new(super::storage::ExpiringStore::new()),
            Arc::new(super::storage::MemoryStore::new()),
        )
    }
}
