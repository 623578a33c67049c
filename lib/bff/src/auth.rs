//! Login, logout and session-snapshot routes.
//!
//! These are the only routes that write the session store. Everything else
//! only reads the token through [`Inbound`].

use axum::Form;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use campus_console_access::{AuthorizationSet, Institution, SessionSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::BackendBody;
use crate::credentials::Inbound;
use crate::error::ProxyError;
use crate::proxy::{self, Endpoint};
use crate::routes::BffState;
use crate::schema::{self, LoginPayload, Schema, SwitchInstitutionPayload, TokenPayload};
use crate::session::{
    Concern, CookieOptions, Expiry, SessionGrant, begin_session, end_session, remember_redirect,
    snapshot, take_redirect, write_companion,
};

/// Page the browser lands on when it has to log in.
pub const LOGIN_PAGE: &str = "/login";

/// Where the browser goes after login when nothing else was requested.
pub const HOME_PAGE: &str = "/";

/// Answer of a successful JSON login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub redirect: String,
}

/// Query of `GET /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginEntryQuery {
    next: Option<String>,
}

/// Logs in against the backend and persists the granted session.
async fn open_session(
    state: &BffState,
    inbound: &mut Inbound,
    payload: &LoginPayload,
) -> Result<SessionSnapshot, ProxyError> {
    let endpoint = Endpoint::anonymous(Method::POST, "/auth/login");
    let credentials = serde_json::json!({
        "email": payload.email.trim(),
        "password": payload.password,
    });
    let response =
        proxy::dispatch(state, inbound, &endpoint, None, BackendBody::Json(credentials)).await?;
    let grant: SessionGrant = proxy::read_json(state, response).await?;

    begin_session(&mut inbound.store, &grant, &state.session);
    tracing::info!(user = %grant.user.id, "Session opened");

    Ok(SessionSnapshot {
        profile: Some(grant.user),
        institution: grant.institution.unwrap_or_default(),
        authorizations: grant.authorizations,
    })
}

/// Picks the post-login destination: the caller's request, else the stored
/// target, else home. The stored target is consumed either way.
fn post_login_target(inbound: &mut Inbound, requested: Option<&str>) -> String {
    let stored = take_redirect(&mut inbound.store);
    requested
        .map(str::to_string)
        .or(stored)
        .filter(|target| schema::is_local_path(target))
        .unwrap_or_else(|| HOME_PAGE.to_string())
}

/// `POST /api/auth/login`
pub async fn api_login(
    State(state): State<Arc<BffState>>,
    mut inbound: Inbound,
    body: Bytes,
) -> Response {
    let result = async {
        let (payload, _) = proxy::decode_body::<LoginPayload>(&body)?;
        let session = open_session(&state, &mut inbound, &payload).await?;
        let redirect = post_login_target(&mut inbound, payload.redirect.as_deref());
        Ok::<_, ProxyError>(LoginOutcome { session, redirect })
    }
    .await;

    match result {
        Ok(outcome) => (inbound.store.into_jar(), Json(outcome)).into_response(),
        Err(err) => err.into_response_with(state.status_mode()),
    }
}

/// `POST /auth/login` from the HTML form.
///
/// Always answers with a redirect; failures go back to the login page with
/// an error code the page can display.
pub async fn form_login(
    State(state): State<Arc<BffState>>,
    mut inbound: Inbound,
    Form(payload): Form<LoginPayload>,
) -> Response {
    if let Err(fields) = payload.validate() {
        tracing::debug!(fields = fields.len(), "Login form rejected");
        return Redirect::to(&format!("{LOGIN_PAGE}?error=invalid")).into_response();
    }

    match open_session(&state, &mut inbound, &payload).await {
        Ok(_) => {
            let target = post_login_target(&mut inbound, payload.redirect.as_deref());
            (inbound.store.into_jar(), Redirect::to(&target)).into_response()
        }
        Err(err) => {
            tracing::warn!(kind = err.kind(), error = %err, "Login failed");
            Redirect::to(&format!("{LOGIN_PAGE}?error=credentials")).into_response()
        }
    }
}

/// `GET /auth/login?next=…`: remembers where to go, then shows the login page.
pub async fn login_entry(
    State(state): State<Arc<BffState>>,
    mut inbound: Inbound,
    Query(query): Query<LoginEntryQuery>,
) -> Response {
    match query.next.as_deref() {
        Some(next) if schema::is_local_path(next) => {
            remember_redirect(&mut inbound.store, next, &state.session);
        }
        Some(next) => tracing::warn!(next, "Ignoring non-local redirect target"),
        None => {}
    }
    (inbound.store.into_jar(), Redirect::to(LOGIN_PAGE)).into_response()
}

/// `POST /api/auth/logout`: revokes upstream, then deletes every identity
/// cookie and answers an empty `204`.
pub async fn api_logout(State(state): State<Arc<BffState>>, mut inbound: Inbound) -> Response {
    let endpoint = Endpoint::protected(Method::POST, "/auth/logout");
    match proxy::dispatch(&state, &inbound, &endpoint, None, BackendBody::Empty).await {
        Ok(_) => {
            end_session(&mut inbound.store);
            tracing::info!("Session closed");
            (inbound.store.into_jar(), StatusCode::NO_CONTENT).into_response()
        }
        Err(err) => err.into_response_with(state.status_mode()),
    }
}

/// `GET /auth/logout`: local cookies are cleared even when the backend
/// call fails.
pub async fn form_logout(State(state): State<Arc<BffState>>, mut inbound: Inbound) -> Response {
    let endpoint = Endpoint::protected(Method::POST, "/auth/logout");
    if let Err(err) = proxy::dispatch(&state, &inbound, &endpoint, None, BackendBody::Empty).await {
        tracing::warn!(kind = err.kind(), error = %err, "Backend logout failed; clearing cookies anyway");
    }
    end_session(&mut inbound.store);
    (inbound.store.into_jar(), Redirect::to(LOGIN_PAGE)).into_response()
}

/// `POST /api/auth/verify-token`
///
/// Any backend-side failure answers `400` regardless of status mode.
pub async fn verify_token(
    State(state): State<Arc<BffState>>,
    inbound: Inbound,
    body: Bytes,
) -> Response {
    let value = match proxy::decode_body::<TokenPayload>(&body) {
        Ok((_, value)) => value,
        Err(err) => return err.into_response_with(state.status_mode()),
    };
    let endpoint = Endpoint::anonymous(Method::POST, "/auth/verify-token");
    match proxy::pass_through(&state, &inbound, &endpoint, None, BackendBody::Json(value)).await {
        Ok(response) => response,
        Err(err) => err.respond_with(StatusCode::BAD_REQUEST),
    }
}

/// Body of `GET /api/auth/redirect`.
#[derive(Debug, Serialize)]
pub struct RedirectTarget {
    pub redirect: Option<String>,
}

/// `GET /api/auth/redirect`: reads and clears the stored target.
pub async fn consume_redirect(mut inbound: Inbound) -> Response {
    let redirect = take_redirect(&mut inbound.store);
    (inbound.store.into_jar(), Json(RedirectTarget { redirect })).into_response()
}

/// `GET /api/session`
pub async fn session_snapshot(inbound: Inbound) -> Json<SessionSnapshot> {
    Json(snapshot(&inbound.store))
}

/// `GET /api/session/authorizations`
pub async fn session_authorizations(inbound: Inbound) -> Json<AuthorizationSet> {
    Json(snapshot(&inbound.store).authorizations)
}

/// `POST /api/session/institution`: fetches the institution and makes it
/// the active tenant.
pub async fn switch_institution(
    State(state): State<Arc<BffState>>,
    mut inbound: Inbound,
    body: Bytes,
) -> Response {
    let result = async {
        let (payload, _) = proxy::decode_body::<SwitchInstitutionPayload>(&body)?;
        let id = payload.id()?;
        let endpoint = Endpoint::protected(Method::GET, format!("/institutions/{id}"));
        let response =
            proxy::dispatch(&state, &inbound, &endpoint, None, BackendBody::Empty).await?;
        let institution: Institution = proxy::read_json(&state, response).await?;
        Ok::<_, ProxyError>(institution)
    }
    .await;

    match result {
        Ok(institution) => {
            let options =
                CookieOptions::for_concern(Concern::Tenant, &state.session, Expiry::BrowserSession);
            write_companion(&mut inbound.store, Concern::Tenant, &institution, options);
            tracing::info!(institution = %institution.id, "Active institution switched");
            (inbound.store.into_jar(), Json(institution)).into_response()
        }
        Err(err) => err.into_response_with(state.status_mode()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use crate::testing::{ScriptedBackend, state_with};
    use axum::Router;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, header};
    use serde_json::json;
    use tower::ServiceExt;

    fn app(backend: &ScriptedBackend) -> Router {
        router::<Arc<BffState>>().with_state(Arc::new(state_with(backend)))
    }

    fn grant() -> serde_json::Value {
        json!({
            "accessToken": "tok-123",
            "expiresAt": "2030-05-01T12:00:00Z",
            "user": {"id": "u_1", "name": "Awa Diop", "email": "awa@uadb.sn", "roles": ["recteur"]},
            "institution": {"id": "univ-1", "name": "UADB", "slug": "uadb", "code": "UADB", "model": "university"},
            "authorizations": ["dashboard.branches.view"]
        })
    }

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    fn cookie_named<'a>(cookies: &'a [String], name: &str) -> Option<&'a String> {
        cookies.iter().find(|c| c.starts_with(&format!("{name}=")))
    }

    async fn json_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn logout_deletes_identity_cookies_and_answers_204() {
        let backend = ScriptedBackend::new().reply(StatusCode::NO_CONTENT, HeaderMap::new(), "");
        let response = app(&backend)
            .oneshot(
                Request::post("/api/auth/logout")
                    .header(
                        header::COOKIE,
                        "cc_session=tok; cc_profile=p; cc_tenant=t; cc_authorizations=a",
                    )
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookies = set_cookies(response.headers());
        for name in ["cc_session", "cc_profile", "cc_tenant", "cc_authorizations"] {
            let cookie = cookie_named(&cookies, name).expect("removal cookie");
            assert!(cookie.starts_with(&format!("{name}=;")), "{cookie}");
            assert!(cookie.contains("Max-Age=0"), "{cookie}");
        }
        assert_eq!(cookies.len(), 4);
        let bytes = axum::body::to_bytes(response.into_body(), 16).await.expect("body");
        assert!(bytes.is_empty());

        let sent = backend.last_request().expect("request");
        assert_eq!(sent.path, "/auth/logout");
        assert_eq!(sent.headers["authorization"], "Bearer tok");
    }

    #[tokio::test]
    async fn logout_without_session_keeps_cookies_untouched() {
        let backend = ScriptedBackend::new();
        let response = app(&backend)
            .oneshot(Request::post("/api/auth/logout").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(set_cookies(response.headers()).is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn json_login_sets_session_cookies() {
        let backend = ScriptedBackend::new().reply_json(StatusCode::OK, grant());
        let response = app(&backend)
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"email":"awa@uadb.sn","password":"secret1"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(response.headers());
        let token = cookie_named(&cookies, "cc_session").expect("token cookie");
        assert!(token.starts_with("cc_session=tok-123;"));
        assert!(token.contains("HttpOnly"));
        assert!(cookie_named(&cookies, "cc_tenant").is_some());

        let body = json_of(response).await;
        assert_eq!(body["profile"]["name"], "Awa Diop");
        assert_eq!(body["institution"]["slug"], "uadb");
        assert_eq!(body["redirect"], "/");

        let sent = backend.last_request().expect("request");
        assert!(sent.headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn json_login_honours_stored_redirect() {
        let backend = ScriptedBackend::new().reply_json(StatusCode::OK, grant());
        let response = app(&backend)
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::COOKIE, "cc_redirect=/branches")
                    .body(Body::from(r#"{"email":"awa@uadb.sn","password":"secret1"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        let cookies = set_cookies(response.headers());
        assert!(cookie_named(&cookies, "cc_redirect").is_some_and(|c| c.contains("Max-Age=0")));
        assert_eq!(json_of(response).await["redirect"], "/branches");
    }

    #[tokio::test]
    async fn rejected_credentials_set_no_cookie() {
        let backend = ScriptedBackend::new()
            .reply_json(StatusCode::UNAUTHORIZED, json!({"message": "Identifiants invalides"}));
        let response = app(&backend)
            .oneshot(
                Request::post("/api/auth/login")
                    .body(Body::from(r#"{"email":"awa@uadb.sn","password":"wrong12"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(set_cookies(response.headers()).is_empty());
        assert_eq!(json_of(response).await["status"], 401);
    }

    #[tokio::test]
    async fn form_login_redirects_to_requested_page() {
        let backend = ScriptedBackend::new().reply_json(StatusCode::OK, grant());
        let response = app(&backend)
            .oneshot(
                Request::post("/auth/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("email=awa%40uadb.sn&password=secret1&redirect=%2Fusers"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/users");
        assert!(cookie_named(&set_cookies(response.headers()), "cc_session").is_some());
    }

    #[tokio::test]
    async fn form_login_with_bad_input_returns_to_login() {
        let backend = ScriptedBackend::new();
        let response = app(&backend)
            .oneshot(
                Request::post("/auth/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("email=awa&password=1"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.headers()[header::LOCATION], "/login?error=invalid");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn login_entry_remembers_local_targets_only() {
        let backend = ScriptedBackend::new();
        let app = app(&backend);

        let response = app
            .clone()
            .oneshot(Request::get("/auth/login?next=/roles").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.headers()[header::LOCATION], "/login");
        let cookies = set_cookies(response.headers());
        let redirect = cookie_named(&cookies, "cc_redirect").expect("redirect cookie");
        assert!(redirect.contains("roles"));
        assert!(redirect.contains("Max-Age=900"));

        let response = app
            .oneshot(
                Request::get("/auth/login?next=https://evil.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert!(set_cookies(response.headers()).is_empty());
    }

    #[tokio::test]
    async fn form_logout_clears_cookies_even_when_backend_fails() {
        let backend = ScriptedBackend::new()
            .reply_json(StatusCode::SERVICE_UNAVAILABLE, json!({"message": "down"}));
        let response = app(&backend)
            .oneshot(
                Request::get("/auth/logout")
                    .header(header::COOKIE, "cc_session=tok")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.headers()[header::LOCATION], "/login");
        let cookies = set_cookies(response.headers());
        assert!(cookie_named(&cookies, "cc_session").is_some_and(|c| c.contains("Max-Age=0")));
        assert_eq!(cookies.len(), 1);
    }

    #[tokio::test]
    async fn failed_token_verification_is_400() {
        let backend = ScriptedBackend::new()
            .reply_json(StatusCode::UNAUTHORIZED, json!({"message": "Jeton expiré"}));
        let response = app(&backend)
            .oneshot(
                Request::post("/api/auth/verify-token")
                    .body(Body::from(r#"{"token":"abc"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(response).await["upstream"]["message"], "Jeton expiré");
    }

    #[tokio::test]
    async fn session_snapshot_reads_cookies() {
        let backend = ScriptedBackend::new().reply_json(StatusCode::OK, grant());
        let app = app(&backend);
        let login = app
            .clone()
            .oneshot(
                Request::post("/api/auth/login")
                    .body(Body::from(r#"{"email":"awa@uadb.sn","password":"secret1"}"#))
                    .expect("request"),
            )
            .await
            .expect("login");
        let cookie_header = set_cookies(login.headers())
            .iter()
            .filter_map(|c| c.split(';').next().map(str::to_string))
            .collect::<Vec<_>>()
            .join("; ");

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/session/authorizations")
                    .header(header::COOKIE, &cookie_header)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(json_of(response).await, json!(["dashboard.branches.view"]));

        let response = app
            .oneshot(
                Request::get("/api/session")
                    .header(header::COOKIE, &cookie_header)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let body = json_of(response).await;
        assert_eq!(body["profile"]["email"], "awa@uadb.sn");
        assert_eq!(body["institution"]["model"], "university");
    }

    #[tokio::test]
    async fn anonymous_snapshot_has_placeholder_institution() {
        let backend = ScriptedBackend::new();
        let response = app(&backend)
            .oneshot(Request::get("/api/session").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let body = json_of(response).await;
        assert!(body["profile"].is_null());
        assert_eq!(
            body["institution"],
            json!({"id": "", "name": "", "slug": "", "code": ""})
        );
    }

    #[tokio::test]
    async fn switching_institution_writes_tenant_cookie() {
        let backend = ScriptedBackend::new().reply_json(
            StatusCode::OK,
            json!({"id": "inst-7", "name": "ISEP Thiès", "slug": "isep-thies", "code": "ISEP", "model": "institute"}),
        );
        let response = app(&backend)
            .oneshot(
                Request::post("/api/session/institution")
                    .header(header::COOKIE, "cc_session=tok")
                    .body(Body::from(r#"{"institutionId":"inst-7"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_named(&set_cookies(response.headers()), "cc_tenant").is_some());
        assert_eq!(backend.last_request().expect("request").path, "/institutions/inst-7");
        assert_eq!(json_of(response).await["slug"], "isep-thies");
    }
}
