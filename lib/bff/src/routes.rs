//! The BFF route table.
//!
//! Resource routes are declared once per backend collection through the
//! [`Resource`] trait and share the generic handlers below.

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{FromRef, Path, RawQuery, State};
use axum::http::Method;
use axum::response::Response;
use axum::routing::{get, post};
use campus_console_core::{DocumentId, ResourceId};
use std::sync::Arc;

use crate::auth;
use crate::backend::{Backend, BackendBody};
use crate::credentials::Inbound;
use crate::error::{ProxyError, StatusMode};
use crate::proxy::{self, Endpoint, ProxyConfig};
use crate::schema::{
    BranchPayload, ClassroomPayload, ComparisonPayload, InstitutePayload, ProfilePayload,
    RolePayload, Schema, UniversityPayload, UserPayload,
};
use crate::session::{CookieNames, SessionSettings};

/// Shared, immutable state of the BFF routes.
pub struct BffState {
    pub backend: Arc<dyn Backend>,
    pub cookies: CookieNames,
    pub session: SessionSettings,
    pub proxy: ProxyConfig,
    /// Largest backend body buffered in memory.
    pub max_body_bytes: usize,
}

impl BffState {
    /// Creates state with default cookie, session and proxy settings.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            cookies: CookieNames::default(),
            session: SessionSettings::default(),
            proxy: ProxyConfig::default(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }

    #[must_use]
    pub fn status_mode(&self) -> StatusMode {
        self.proxy.status_mode()
    }

    /// Renders a pipeline outcome, serializing failures.
    pub fn respond(&self, result: Result<Response, ProxyError>) -> Response {
        result.unwrap_or_else(|err| err.into_response_with(self.status_mode()))
    }
}

/// A backend collection exposed under `/api`.
pub trait Resource: Send + Sync + 'static {
    /// Backend path of the collection, e.g. `/branches`.
    const PATH: &'static str;
    /// Schema for create and update bodies.
    type Payload: Schema + Send;
}

macro_rules! resource {
    ($(#[$meta:meta])* $name:ident, $path:literal, $payload:ty) => {
        $(#[$meta])*
        pub struct $name;

        impl Resource for $name {
            const PATH: &'static str = $path;
            type Payload = $payload;
        }
    };
}

resource!(
    /// Study branches ("filières").
    Branches,
    "/branches",
    BranchPayload
);
resource!(Classrooms, "/classrooms", ClassroomPayload);
resource!(Institutes, "/institutes", InstitutePayload);
resource!(Universities, "/universities", UniversityPayload);
resource!(
    /// Permission profiles.
    Profiles,
    "/profiles",
    ProfilePayload
);
resource!(Roles, "/roles", RolePayload);
resource!(Users, "/users", UserPayload);

fn item_path<R: Resource>(id: &str) -> Result<String, ProxyError> {
    let id: ResourceId = id
        .parse()
        .map_err(|_| ProxyError::invalid("id", "Identifiant invalide"))?;
    Ok(format!("{}/{id}", R::PATH))
}

async fn list<R: Resource>(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    RawQuery(query): RawQuery,
) -> Response {
    let endpoint = Endpoint::protected(Method::GET, R::PATH);
    state.respond(proxy::pass_through(&state, &inbound, &endpoint, query, BackendBody::Empty).await)
}

async fn show<R: Resource>(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let result = match item_path::<R>(&id) {
        Ok(path) => {
            let endpoint = Endpoint::protected(Method::GET, path);
            proxy::pass_through(&state, &inbound, &endpoint, query, BackendBody::Empty).await
        }
        Err(err) => Err(err),
    };
    state.respond(result)
}

async fn create<R: Resource>(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    body: Bytes,
) -> Response {
    let endpoint = Endpoint::protected(Method::POST, R::PATH);
    state.respond(proxy::forward_validated::<R::Payload>(&state, &inbound, &endpoint, &body).await)
}

async fn update<R: Resource>(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let result = match item_path::<R>(&id) {
        Ok(path) => {
            let endpoint = Endpoint::protected(Method::PUT, path);
            proxy::forward_validated::<R::Payload>(&state, &inbound, &endpoint, &body).await
        }
        Err(err) => Err(err),
    };
    state.respond(result)
}

async fn remove<R: Resource>(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    Path(id): Path<String>,
) -> Response {
    let result = match item_path::<R>(&id) {
        Ok(path) => {
            let endpoint = Endpoint::protected(Method::DELETE, path);
            proxy::pass_through(&state, &inbound, &endpoint, None, BackendBody::Empty).await
        }
        Err(err) => Err(err),
    };
    state.respond(result)
}

async fn compare_programs(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    body: Bytes,
) -> Response {
    let endpoint = Endpoint::protected(Method::POST, "/programs/compare");
    state.respond(
        proxy::forward_validated::<ComparisonPayload>(&state, &inbound, &endpoint, &body).await,
    )
}

/// Reads the raw body up to the configured cap; oversized files get the
/// usual JSON error body.
async fn upload_document(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    body: Body,
) -> Response {
    let endpoint = Endpoint::protected(Method::POST, "/documents/upload");
    let result = match axum::body::to_bytes(body, state.proxy.max_upload_bytes).await {
        Ok(bytes) => proxy::upload(&state, &inbound, &endpoint, bytes).await,
        Err(e) => {
            tracing::warn!(error = %e, limit = state.proxy.max_upload_bytes, "Upload rejected");
            Err(ProxyError::invalid(
                "file",
                "Le fichier dépasse la taille maximale autorisée",
            ))
        }
    };
    state.respond(result)
}

async fn download_document(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    Path(id): Path<String>,
) -> Response {
    let result = match id.parse::<DocumentId>() {
        Ok(id) => proxy::download(&state, &inbound, &id).await,
        Err(_) => Err(ProxyError::invalid("id", "Identifiant de document invalide")),
    };
    state.respond(result)
}

fn with_resource<R, S>(router: Router<S>) -> Router<S>
where
    R: Resource,
    Arc<BffState>: FromRef<S>,
    S: Clone + Send + Sync + 'static,
{
    router
        .route(&format!("/api{}", R::PATH), get(list::<R>).post(create::<R>))
        .route(
            &format!("/api{}/{{id}}", R::PATH),
            get(show::<R>).put(update::<R>).delete(remove::<R>),
        )
}

/// Every BFF route: authentication, session, resources and documents.
pub fn router<S>() -> Router<S>
where
    Arc<BffState>: FromRef<S>,
    S: Clone + Send + Sync + 'static,
{
    let router = Router::new()
        // Authentication
        .route("/api/auth/login", post(auth::api_login))
        .route("/auth/login", get(auth::login_entry).post(auth::form_login))
        .route("/api/auth/logout", post(auth::api_logout))
        .route("/auth/logout", get(auth::form_logout))
        .route("/api/auth/verify-token", post(auth::verify_token))
        .route("/api/auth/redirect", get(auth::consume_redirect))
        // Session snapshot
        .route("/api/session", get(auth::session_snapshot))
        .route("/api/session/authorizations", get(auth::session_authorizations))
        .route("/api/session/institution", post(auth::switch_institution))
        // Pass-through computations and documents
        .route("/api/programs/compare", post(compare_programs))
        .route("/api/documents/upload", post(upload_document))
        .route("/api/documents/{id}/download", get(download_document));

    let router = with_resource::<Branches, S>(router);
    let router = with_resource::<Classrooms, S>(router);
    let router = with_resource::<Institutes, S>(router);
    let router = with_resource::<Universities, S>(router);
    let router = with_resource::<Profiles, S>(router);
    let router = with_resource::<Roles, S>(router);
    with_resource::<Users, S>(router)
}
