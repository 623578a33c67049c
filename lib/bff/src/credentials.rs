//! Credential attachment for outbound backend calls.
//!
//! Every proxied call obtains its `Authorization` header here, from the
//! session token cookie. Nothing is refreshed, retried or validated: the
//! token is forwarded as stored and the backend is the judge.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum_extra::extract::CookieJar;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use crate::routes::BffState;
use crate::session::{Concern, CookieSessionStore, SessionStore};

/// Caller IP forwarded to the backend.
pub const X_CLIENT_IP: HeaderName = HeaderName::from_static("x-client-ip");

/// Override flag, read from and forwarded under the same name.
pub const X_AUTH_OVERRIDE: HeaderName = HeaderName::from_static("x-auth-override");

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Credentials resolved for one inbound request.
#[derive(Debug, Clone, Default)]
pub struct AccessContext {
    pub access_token: Option<String>,
    /// `Authorization: Bearer <token>` when a token is present, empty otherwise.
    pub auth_headers: HeaderMap,
}

impl AccessContext {
    /// Reads the token concern once and builds the bearer header.
    pub fn from_store<S>(store: &S) -> Self
    where
        S: SessionStore + ?Sized,
    {
        let Some(token) = store.get(Concern::Token) else {
            return Self::default();
        };

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                let mut auth_headers = HeaderMap::new();
                auth_headers.insert(AUTHORIZATION, value);
                Self {
                    access_token: Some(token),
                    auth_headers,
                }
            }
            Err(_) => {
                tracing::warn!("Session token is not a valid header value; treating as absent");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Resolves credentials from `store` and hands them to `continuation`.
///
/// The continuation always runs, with or without a token.
pub async fn with_access_token<S, F, Fut, T>(store: &S, continuation: F) -> T
where
    S: SessionStore + ?Sized,
    F: FnOnce(AccessContext) -> Fut,
    Fut: Future<Output = T>,
{
    continuation(AccessContext::from_store(store)).await
}

/// Caller facts forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfo {
    pub ip: Option<String>,
    pub user_agent: Option<HeaderValue>,
    pub auth_override: HeaderValue,
}

impl CallerInfo {
    /// Derives caller facts from inbound headers.
    ///
    /// The IP is the first `X-Forwarded-For` hop, else `X-Real-Ip`.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let forwarded = headers
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = headers
            .get(&X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        Self {
            ip: forwarded.or(real_ip).map(str::to_string),
            user_agent: headers.get(USER_AGENT).cloned(),
            auth_override: headers
                .get(&X_AUTH_OVERRIDE)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("false")),
        }
    }

    /// Writes the caller headers into an outbound header map.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(ip) = self.ip.as_deref().and_then(|ip| HeaderValue::from_str(ip).ok()) {
            headers.insert(X_CLIENT_IP, ip);
        }
        if let Some(agent) = &self.user_agent {
            headers.insert(USER_AGENT, agent.clone());
        }
        headers.insert(X_AUTH_OVERRIDE, self.auth_override.clone());
    }
}

/// Everything a proxy handler needs from the inbound request head.
///
/// Extraction never fails; a request without cookies simply carries no
/// credentials.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub store: CookieSessionStore,
    pub caller: CallerInfo,
    pub access: AccessContext,
    pub content_type: Option<HeaderValue>,
}

impl Inbound {
    /// Builds the inbound view over raw request headers.
    pub async fn from_headers(headers: &HeaderMap, state: &BffState) -> Self {
        let store = CookieSessionStore::new(CookieJar::from_headers(headers), state.cookies.clone());
        let access = with_access_token(&store, |access| async move { access }).await;
        Self {
            caller: CallerInfo::from_headers(headers),
            content_type: headers.get(CONTENT_TYPE).cloned(),
            store,
            access,
        }
    }

    /// Outbound headers: caller facts plus the bearer header.
    #[must_use]
    pub fn outbound_headers(&self) -> HeaderMap {
        let mut headers = self.access.auth_headers.clone();
        self.caller.apply(&mut headers);
        headers
    }
}

impl<S> FromRequestParts<S> for Inbound
where
    Arc<BffState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let bff = Arc::<BffState>::from_ref(state);
        Ok(Self::from_headers(&parts.headers, &bff).await)
    }
}
