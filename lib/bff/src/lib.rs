//! Backend-for-frontend tier of campus-console.
//!
//! This crate provides:
//! - The per-browser session store (`session`)
//! - Credential attachment for outbound calls (`credentials`)
//! - The backend client abstraction (`backend`)
//! - The proxy pipeline and its route table (`proxy`, `routes`, `auth`)
//!
//! # Request Flow
//!
//! Every inbound request is extracted into an [`Inbound`], which reads the
//! session token once. Handlers describe the backend call as an
//! [`Endpoint`] and hand it to the pipeline, which validates the payload,
//! rejects protected calls without a token, attaches the bearer and caller
//! headers, and serializes any failure as an [`ErrorBody`].
//!
//! Mount the routes with [`router`] on any state that can produce an
//! `Arc<BffState>`.

pub mod auth;
pub mod backend;
pub mod credentials;
pub mod disposition;
pub mod error;
pub mod proxy;
pub mod routes;
pub mod schema;
pub mod session;

#[cfg(test)]
mod testing;

pub use backend::{Backend, BackendConfig, BackendError, HttpBackend};
pub use credentials::{AccessContext, CallerInfo, Inbound, with_access_token};
pub use error::{ErrorBody, FieldErrors, ProxyError, StatusMode};
pub use proxy::{Access, Endpoint, ProxyConfig};
pub use routes::{BffState, router};
pub use session::{
    Concern, CookieNames, CookieSessionStore, MemorySessionStore, SessionSettings, SessionStore,
};
