//! Shared fixtures for unit tests: a scriptable transport, sample users and
//! a fully wired client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use uuid::Uuid;

use crate::api::client::ApiClient;
use crate::api::transport::HttpTransport;
use crate::api::types::{ApiRequest, ApiResponse, Method, Role, TransportError, User};
use crate::nav::RecordingNavigator;
use crate::session::SessionState;
use crate::storage::TokenStore;

pub const BASE_URL: &str = "https://api.test";

type Responder = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Transport answering every request through a closure and recording what
/// it was asked. Each call yields once first so concurrent callers interleave.
/// Paths registered with `hold` are recorded but not answered until their
/// `Notify` is signalled.
pub struct MockTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<ApiRequest>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            holds: Mutex::new(HashMap::new()),
        })
    }

    /// Park every request to `path` until the returned gate is notified.
    pub fn hold(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.holds
            .lock()
            .unwrap()
            .insert(path.to_owned(), Arc::clone(&gate));
        gate
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose URL is `BASE_URL` + `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        let url = format!("{BASE_URL}{path}");
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        tokio::task::yield_now().await;
        self.requests.lock().unwrap().push(request.clone());
        let gate = self.holds.lock().unwrap().get(path_of(&request)).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        (self.responder)(&request)
    }
}

pub fn path_of(request: &ApiRequest) -> &str {
    request.url.strip_prefix(BASE_URL).unwrap_or(&request.url)
}

pub fn is_call(request: &ApiRequest, method: Method, path: &str) -> bool {
    request.method == method && path_of(request) == path
}

pub fn json_response(status: u16, body: &serde_json::Value) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(status, body.to_string()))
}

pub fn user(role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        email: format!("{}@tenant.test", role.as_str().to_ascii_lowercase()),
        role,
        tenant_id: match role {
            Role::SuperAdmin => None,
            _ => Some(Uuid::new_v4()),
        },
        first_name: "Test".into(),
        last_name: "User".into(),
    }
}

pub fn user_json(user: &User) -> serde_json::Value {
    serde_json::to_value(user).unwrap()
}

/// Client, session and navigator wired over `transport` with empty storage.
pub struct Harness {
    pub client: ApiClient,
    pub session: SessionState,
    pub navigator: Arc<RecordingNavigator>,
}

pub fn harness(transport: Arc<MockTransport>) -> Harness {
    let session = SessionState::new(TokenStore::in_memory());
    let navigator = Arc::new(RecordingNavigator::new());
    let client = ApiClient::new(BASE_URL, transport, session.clone(), navigator.clone());
    Harness { client, session, navigator }
}
