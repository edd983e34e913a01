#![warn(unused_crate_dependencies)]

use futures::future::{BoxFuture, FutureExt as _};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{Duration, Instant};
use taskdeck_client_core::{
    Client, GraphQlRequest, GraphQlResponse, GraphQlTransport, KeyValueStore, StorageError,
    TransportError,
};
use taskdeck_shared::{
    req_args::LoginReqArgs,
    telemetry::{self, get_subscriber, init_subscriber},
    time::Seconds,
};
use uuid::Uuid;

const CONDITION_WAIT_TIMEOUT: Seconds = Seconds::new(2);

// Ensure that the `tracing` stack is only initialised once
pub static TRACING: LazyLock<String> = LazyLock::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    if std::env::var("TEST_LOG").is_ok() {
        let log_file_name = format!("client_tests{}", Uuid::new_v4());
        let (file, path) = telemetry::create_trace_file(&log_file_name).unwrap();
        let subscriber = get_subscriber(subscriber_name, default_filter_level, file);
        init_subscriber(subscriber).unwrap();
        format!("Traces for tests being written to: {path:?}")
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber).unwrap();
        "Traces set to std::io::sink".to_string()
    }
});

pub fn start_tracing() {
    LazyLock::force(&TRACING);
}

/// Empty function for use when a call back isn't needed
pub fn no_cb() {}

type Reply = Result<GraphQlResponse, TransportError>;

/// A request as the transport received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub operation_name: String,
    pub bearer_token: Option<String>,
    pub variables: serde_json::Value,
}

/// Transport answering from scripted replies instead of a server.
///
/// One-off replies queued with [`StubTransport::reply_once`] are used first,
/// then the standing reply set with [`StubTransport::reply`]. Operations with
/// neither fail with a network error.
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    inner: Arc<Mutex<StubInner>>,
}

#[derive(Debug, Default)]
struct StubInner {
    standing: HashMap<String, Reply>,
    queued: HashMap<String, VecDeque<Reply>>,
    delays: HashMap<String, Duration>,
    requests: Vec<RecordedRequest>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, operation_name: &str, reply: Reply) -> &Self {
        self.lock().standing.insert(operation_name.to_string(), reply);
        self
    }

    pub fn reply_once(&self, operation_name: &str, reply: Reply) -> &Self {
        self.lock()
            .queued
            .entry(operation_name.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn reply_data(&self, operation_name: &str, data: serde_json::Value) -> &Self {
        self.reply(operation_name, Ok(GraphQlResponse::with_data(data)))
    }

    pub fn reply_error(&self, operation_name: &str, message: &str, code: Option<&str>) -> &Self {
        self.reply(
            operation_name,
            Ok(GraphQlResponse::with_error(message, code)),
        )
    }

    /// Every reply to `operation_name` is held back this long
    pub fn delay(&self, operation_name: &str, delay: Duration) -> &Self {
        self.lock()
            .delays
            .insert(operation_name.to_string(), delay);
        self
    }

    pub fn calls(&self, operation_name: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.operation_name == operation_name)
            .count()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self, operation_name: &str) -> Option<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .rev()
            .find(|r| r.operation_name == operation_name)
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubInner> {
        self.inner.lock().expect("mutex poisoned")
    }
}

impl GraphQlTransport for StubTransport {
    fn execute(&self, request: GraphQlRequest) -> BoxFuture<'static, Reply> {
        let (reply, delay) = {
            let mut guard = self.lock();
            guard.requests.push(RecordedRequest {
                operation_name: request.operation_name.clone(),
                bearer_token: request.bearer_token().map(ToString::to_string),
                variables: request.variables.clone(),
            });
            let queued = guard
                .queued
                .get_mut(&request.operation_name)
                .and_then(VecDeque::pop_front);
            let reply = queued
                .or_else(|| guard.standing.get(&request.operation_name).cloned())
                .unwrap_or_else(|| {
                    Err(TransportError::Network(format!(
                        "no reply scripted for {}",
                        request.operation_name
                    )))
                });
            let delay = guard.delays.get(&request.operation_name).copied();
            (reply, delay)
        };
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            reply
        }
        .boxed()
    }
}

/// Store where every call fails, like storage disabled by the user
#[derive(Debug, Default)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str, _lifetime: Option<Seconds>) -> Result<(), StorageError> {
        Err(StorageError::Persist("storage disabled".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Persist("storage disabled".into()))
    }
}

#[derive(Debug)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub password: String,
}

impl TestUser {
    pub fn generate() -> Self {
        Self::new(&Uuid::new_v4().to_string(), "a@b.com")
    }

    pub fn new(id: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            password: Uuid::new_v4().to_string(),
        }
    }

    pub fn login_args(&self) -> LoginReqArgs {
        LoginReqArgs::new(self.email.clone(), self.password.clone().into())
    }

    /// `data` of a successful `Login`, identity fields only
    pub fn login_data(&self, access_token: &str, refresh_token: &str) -> serde_json::Value {
        serde_json::json!({
            "login": {
                "accessToken": access_token,
                "refreshToken": refresh_token,
                "user": { "id": self.id, "email": self.email },
            }
        })
    }

    /// `data` of `Me`. `role` is `(id, name, level)`
    pub fn me_data(&self, role: Option<(&str, &str, i32)>) -> serde_json::Value {
        let role = role.map(|(id, name, level)| {
            serde_json::json!({ "id": id, "name": name, "level": level })
        });
        serde_json::json!({
            "me": { "id": self.id, "email": self.email, "role": role }
        })
    }
}

pub fn refresh_data(access_token: &str, refresh_token: &str) -> serde_json::Value {
    serde_json::json!({
        "refreshToken": { "accessToken": access_token, "refreshToken": refresh_token }
    })
}

pub fn permissions_data(permissions: &[&str]) -> serde_json::Value {
    serde_json::json!({ "userPermissions": permissions })
}

pub fn logout_data() -> serde_json::Value {
    serde_json::json!({ "logout": { "message": "Logged out" } })
}

/// A client with in memory stores talking to `transport`
pub fn build_client(transport: &StubTransport) -> Client {
    start_tracing();
    Client::builder(Arc::new(transport.clone())).build()
}

/// Polls `condition` until it holds, fails after [`CONDITION_WAIT_TIMEOUT`]
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> Result<(), String> {
    let start = Instant::now();
    let timeout: Duration = CONDITION_WAIT_TIMEOUT.into();
    while start.elapsed() < timeout {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    Err(format!("Timed out after {CONDITION_WAIT_TIMEOUT}"))
}
