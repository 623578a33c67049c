//! Test doubles shared by the crate's unit tests.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::backend::{Backend, BackendError, BackendRequest, BackendResponse};
use crate::credentials::Inbound;
use crate::routes::BffState;

enum Reply {
    Answer {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    Fail(BackendError),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    requests: Vec<BackendRequest>,
}

/// A backend that answers from a script and records every request.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: StatusCode, headers: HeaderMap, body: &'static str) -> Self {
        self.push(Reply::Answer {
            status,
            headers,
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    pub fn reply_json(self, status: StatusCode, value: serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.push(Reply::Answer {
            status,
            headers,
            body: Bytes::from(value.to_string()),
        })
    }

    pub fn fail(self, error: BackendError) -> Self {
        self.push(Reply::Fail(error))
    }

    fn push(self, reply: Reply) -> Self {
        self.script.lock().expect("script lock").replies.push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.script.lock().expect("script lock").requests.len()
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.script.lock().expect("script lock").requests.clone()
    }

    pub fn last_request(&self) -> Option<BackendRequest> {
        self.script.lock().expect("script lock").requests.last().cloned()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let mut script = self.script.lock().expect("script lock");
        let path = request.path.clone();
        script.requests.push(request);
        match script.replies.pop_front() {
            Some(Reply::Answer {
                status,
                headers,
                body,
            }) => Ok(BackendResponse {
                status,
                headers,
                body: Body::from(body),
            }),
            Some(Reply::Fail(error)) => Err(error),
            None => Err(BackendError::Transport {
                path,
                details: "no scripted reply".to_string(),
            }),
        }
    }
}

pub fn state_with(backend: &ScriptedBackend) -> BffState {
    BffState::new(Arc::new(backend.clone()))
}

pub async fn inbound_without_token(state: &BffState) -> Inbound {
    Inbound::from_headers(&HeaderMap::new(), state).await
}

pub async fn inbound_with_token(state: &BffState, token: &str) -> Inbound {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("{}={token}", state.cookies.token)).expect("cookie header"),
    );
    Inbound::from_headers(&headers, state).await
}
