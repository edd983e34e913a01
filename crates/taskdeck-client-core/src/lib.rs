//! Authenticated GraphQL session layer shared by the Taskdeck clients.
//!
//! Owns token storage, request authentication, single flight token refresh and
//! the permission cache. NB: The assumption is made that a tokio runtime has
//! already been started before any functions from this library are called
//! (background profile completion is spawned onto it)

#![warn(unused_crate_dependencies)]


mod client;
mod configuration;

pub use client::{
    authenticator::{AuthDecision, RequestAuthenticator},
    events::{EventBus, EventHook, SessionEvent, SessionState},
    guard::{Requirement, RouteGuard},
    permissions::PermissionCache,
    refresh::RefreshCoordinator,
    single_flight::SingleFlight,
    storage::{ExpiringStore, FileStore, KeyValueStore, MemoryStore, StorageError},
    token_store::TokenStore,
    transport::{
        ErrorExtensions, GraphQlError, GraphQlRequest, GraphQlResponse, GraphQlTransport,
        ReqwestTransport, TransportError,
    },
    Client, ClientBuilder, UiCallBack,
};
pub use configuration::{
    get_configuration, get_configuration_from, ClientSettings, Configuration, Environment,
};
