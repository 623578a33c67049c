//! Per-browser session store backed by cookies.
//!
//! Each identity concern lives under its own cookie so it can expire and
//! rotate independently: the bearer token, the profile, the active
//! institution, the authorization set and a short-lived post-login
//! redirect target.
//!
//! Readers never fail. A missing or undecodable cookie reads as absent and
//! callers fall back to the unauthenticated defaults.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use campus_console_access::{
    AuthorizationSet, Institution, Session, SessionSnapshot, UserProfile,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::{Duration as TimeDuration, OffsetDateTime};

/// Identity concerns persisted per browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    Token,
    Profile,
    Tenant,
    Authorizations,
    RedirectTarget,
}

impl Concern {
    /// Concerns removed on logout.
    pub const IDENTITY: [Concern; 4] = [
        Concern::Token,
        Concern::Profile,
        Concern::Tenant,
        Concern::Authorizations,
    ];
}

/// Cookie names for each concern.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieNames {
    #[serde(default = "default_token_cookie")]
    pub token: String,
    #[serde(default = "default_profile_cookie")]
    pub profile: String,
    #[serde(default = "default_tenant_cookie")]
    pub tenant: String,
    #[serde(default = "default_authorizations_cookie")]
    pub authorizations: String,
    #[serde(default = "default_redirect_cookie")]
    pub redirect: String,
}

fn default_token_cookie() -> String {
    "cc_session".to_string()
}

fn default_profile_cookie() -> String {
    "cc_profile".to_string()
}

fn default_tenant_cookie() -> String {
    "cc_tenant".to_string()
}

fn default_authorizations_cookie() -> String {
    "cc_authorizations".to_string()
}

fn default_redirect_cookie() -> String {
    "cc_redirect".to_string()
}

impl Default for CookieNames {
    fn default() -> Self {
        Self {
            token: default_token_cookie(),
            profile: default_profile_cookie(),
            tenant: default_tenant_cookie(),
            authorizations: default_authorizations_cookie(),
            redirect: default_redirect_cookie(),
        }
    }
}

impl CookieNames {
    /// Cookie name for `concern`.
    #[must_use]
    pub fn name(&self, concern: Concern) -> &str {
        match concern {
            Concern::Token => &self.token,
            Concern::Profile => &self.profile,
            Concern::Tenant => &self.tenant,
            Concern::Authorizations => &self.authorizations,
            Concern::RedirectTarget => &self.redirect,
        }
    }
}

/// Session cookie behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Lifetime of the post-login redirect target, in minutes.
    #[serde(default = "default_redirect_ttl_minutes")]
    pub redirect_ttl_minutes: i64,
}

fn default_secure_cookies() -> bool {
    true
}

fn default_redirect_ttl_minutes() -> i64 {
    15
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secure_cookies: default_secure_cookies(),
            redirect_ttl_minutes: default_redirect_ttl_minutes(),
        }
    }
}

/// When a cookie stops being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Until the browser session ends.
    BrowserSession,
    /// At a fixed instant.
    At(OffsetDateTime),
    /// After a duration from now.
    MaxAge(TimeDuration),
}

impl Expiry {
    /// Converts a backend expiry instant.
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        OffsetDateTime::from_unix_timestamp(instant.timestamp())
            .map(Self::At)
            .unwrap_or(Self::BrowserSession)
    }
}

/// Attributes written alongside a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: &'static str,
    pub http_only: bool,
    pub same_site: SameSite,
    pub secure: bool,
    pub expiry: Expiry,
}

impl CookieOptions {
    /// Defaults for `concern`, expiring per `expiry`.
    #[must_use]
    pub fn for_concern(concern: Concern, settings: &SessionSettings, expiry: Expiry) -> Self {
        Self {
            path: "/",
            http_only: matches!(concern, Concern::Token | Concern::RedirectTarget),
            same_site: SameSite::Lax,
            secure: settings.secure_cookies,
            expiry,
        }
    }
}

/// Get/set/delete access to the per-browser session, keyed by concern.
pub trait SessionStore {
    /// Returns the stored value, if any.
    fn get(&self, concern: Concern) -> Option<String>;

    /// Stores `value` with the given attributes.
    fn set(&mut self, concern: Concern, value: String, options: CookieOptions);

    /// Removes the value. Removing an absent value is a no-op.
    fn delete(&mut self, concern: Concern);
}

/// [`SessionStore`] over the request's cookie jar.
///
/// Changes accumulate in the jar, which must be returned with the response
/// (see [`CookieSessionStore::into_jar`]) for `Set-Cookie` headers to go out.
#[derive(Debug, Clone)]
pub struct CookieSessionStore {
    jar: CookieJar,
    names: CookieNames,
}

impl CookieSessionStore {
    #[must_use]
    pub fn new(jar: CookieJar, names: CookieNames) -> Self {
        Self { jar, names }
    }

    /// Returns the jar carrying pending cookie changes.
    #[must_use]
    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

impl SessionStore for CookieSessionStore {
    fn get(&self, concern: Concern) -> Option<String> {
        self.jar
            .get(self.names.name(concern))
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn set(&mut self, concern: Concern, value: String, options: CookieOptions) {
        let name = self.names.name(concern).to_string();
        let builder = Cookie::build((name, value))
            .path(options.path)
            .http_only(options.http_only)
            .secure(options.secure)
            .same_site(options.same_site);
        let builder = match options.expiry {
            Expiry::BrowserSession => builder,
            Expiry::At(instant) => builder.expires(instant),
            Expiry::MaxAge(age) => builder.max_age(age),
        };
        self.jar = self.jar.clone().add(builder);
    }

    fn delete(&mut self, concern: Concern) {
        let name = self.names.name(concern).to_string();
        self.jar = self.jar.clone().remove(Cookie::build((name, "")).path("/"));
    }
}

/// In-process [`SessionStore`], for callers without a cookie jar.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: HashMap<Concern, String>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert with default attributes.
    #[must_use]
    pub fn with(mut self, concern: Concern, value: &str) -> Self {
        self.values.insert(concern, value.to_string());
        self
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, concern: Concern) -> Option<String> {
        self.values.get(&concern).cloned()
    }

    fn set(&mut self, concern: Concern, value: String, _options: CookieOptions) {
        self.values.insert(concern, value);
    }

    fn delete(&mut self, concern: Concern) {
        self.values.remove(&concern);
    }
}

/// Encodes a structured companion into a header-safe cookie value.
#[must_use]
pub fn encode_companion<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_vec(value) {
        Ok(json) => Some(URL_SAFE_NO_PAD.encode(json)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode session companion");
            None
        }
    }
}

/// Decodes a structured companion; corrupt values read as absent.
#[must_use]
pub fn decode_companion<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(raw.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Reads and decodes a structured companion.
pub fn read_companion<S, T>(store: &S, concern: Concern) -> Option<T>
where
    S: SessionStore + ?Sized,
    T: DeserializeOwned,
{
    let raw = store.get(concern)?;
    let decoded = decode_companion(&raw);
    if decoded.is_none() {
        tracing::warn!(?concern, "Ignoring undecodable session cookie");
    }
    decoded
}

/// Encodes and stores a structured companion.
pub fn write_companion<S, T>(store: &mut S, concern: Concern, value: &T, options: CookieOptions)
where
    S: SessionStore + ?Sized,
    T: Serialize,
{
    if let Some(encoded) = encode_companion(value) {
        store.set(concern, encoded, options);
    }
}

/// What the backend hands out on a successful login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
    #[serde(default)]
    pub institution: Option<Institution>,
    #[serde(default)]
    pub authorizations: AuthorizationSet,
}

impl SessionGrant {
    /// The bearer credential carried by this grant.
    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(
            self.access_token.clone(),
            self.expires_at,
            self.user.id.clone(),
        )
    }
}

/// Persists every artifact of a fresh login.
pub fn begin_session<S>(store: &mut S, grant: &SessionGrant, settings: &SessionSettings)
where
    S: SessionStore + ?Sized,
{
    let session = grant.session();
    let expiry = Expiry::at(session.expires_at());
    let options = |concern| CookieOptions::for_concern(concern, settings, expiry);

    store.set(
        Concern::Token,
        session.access_token().to_string(),
        options(Concern::Token),
    );
    write_companion(store, Concern::Profile, &grant.user, options(Concern::Profile));
    match &grant.institution {
        Some(institution) => {
            write_companion(store, Concern::Tenant, institution, options(Concern::Tenant));
        }
        None => store.delete(Concern::Tenant),
    }
    write_companion(
        store,
        Concern::Authorizations,
        &grant.authorizations,
        options(Concern::Authorizations),
    );
}

/// Deletes every identity concern, one by one.
pub fn end_session<S>(store: &mut S)
where
    S: SessionStore + ?Sized,
{
    for concern in Concern::IDENTITY {
        store.delete(concern);
    }
}

/// Stores where to send the user after logging in.
pub fn remember_redirect<S>(store: &mut S, target: &str, settings: &SessionSettings)
where
    S: SessionStore + ?Sized,
{
    let expiry = Expiry::MaxAge(TimeDuration::minutes(settings.redirect_ttl_minutes));
    store.set(
        Concern::RedirectTarget,
        target.to_string(),
        CookieOptions::for_concern(Concern::RedirectTarget, settings, expiry),
    );
}

/// Reads and clears the post-login redirect target.
pub fn take_redirect<S>(store: &mut S) -> Option<String>
where
    S: SessionStore + ?Sized,
{
    let target = store.get(Concern::RedirectTarget)?;
    store.delete(Concern::RedirectTarget);
    Some(target)
}

/// Builds the UI snapshot from the store.
///
/// Companions are only trusted while the token is present; a lingering
/// profile from an expired session reads as logged out.
pub fn snapshot<S>(store: &S) -> SessionSnapshot
where
    S: SessionStore + ?Sized,
{
    if store.get(Concern::Token).is_none() {
        return SessionSnapshot::default();
    }
    SessionSnapshot {
        profile: read_companion(store, Concern::Profile),
        institution: read_companion(store, Concern::Tenant).unwrap_or_default(),
        authorizations: read_companion(store, Concern::Authorizations).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header};
    use chrono::Duration;

    fn grant() -> SessionGrant {
        serde_json::from_value(serde_json::json!({
            "accessToken": "tok-123",
            "expiresAt": "2030-05-01T12:00:00Z",
            "user": {"id": "u_1", "name": "Awa Diop", "email": "awa@example.org", "roles": ["recteur"]},
            "institution": {"id": "univ-1", "name": "UADB", "slug": "uadb", "code": "UADB", "model": "university"},
            "authorizations": ["branches.view", "branches.edit"]
        }))
        .expect("grant")
    }

    fn jar_with(pairs: &[(&str, &str)]) -> CookieJar {
        let cookie = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).expect("cookie"));
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn missing_keys_read_as_absent() {
        let store = CookieSessionStore::new(CookieJar::new(), CookieNames::default());
        for concern in Concern::IDENTITY {
            assert!(store.get(concern).is_none());
        }
        assert_eq!(snapshot(&store), SessionSnapshot::default());
    }

    #[test]
    fn grant_exposes_the_bearer_session() {
        let session = grant().session();
        assert_eq!(session.access_token(), "tok-123");
        assert_eq!(session.user_id().as_str(), "u_1");
        assert!(!session.is_expired());
    }

    #[test]
    fn login_round_trips_through_the_jar() {
        let mut store = CookieSessionStore::new(CookieJar::new(), CookieNames::default());
        begin_session(&mut store, &grant(), &SessionSettings::default());

        assert_eq!(store.get(Concern::Token).as_deref(), Some("tok-123"));
        let snap = snapshot(&store);
        assert_eq!(snap.profile.expect("profile").name, "Awa Diop");
        assert_eq!(snap.institution.slug, "uadb");
        assert_eq!(snap.authorizations.len(), 2);
    }

    #[test]
    fn token_cookie_is_http_only_and_expires_with_session() {
        let mut store = CookieSessionStore::new(CookieJar::new(), CookieNames::default());
        begin_session(&mut store, &grant(), &SessionSettings::default());

        let jar = store.into_jar();
        let token = jar.get("cc_session").expect("token cookie");
        assert_eq!(token.http_only(), Some(true));
        assert_eq!(token.secure(), Some(true));
        assert_eq!(token.path(), Some("/"));
        assert!(token.expires_datetime().is_some());
    }

    #[test]
    fn logout_removes_identity_cookies_only() {
        let mut store = MemorySessionStore::new()
            .with(Concern::Token, "t")
            .with(Concern::Profile, "p")
            .with(Concern::RedirectTarget, "/branches");
        end_session(&mut store);

        for concern in Concern::IDENTITY {
            assert!(store.get(concern).is_none());
        }
        assert_eq!(store.get(Concern::RedirectTarget).as_deref(), Some("/branches"));
    }

    #[test]
    fn deleting_absent_keys_is_harmless() {
        let mut store = CookieSessionStore::new(CookieJar::new(), CookieNames::default());
        end_session(&mut store);
        end_session(&mut store);
        assert!(store.get(Concern::Token).is_none());
    }

    #[test]
    fn deleting_present_cookie_hides_it() {
        let mut store = CookieSessionStore::new(jar_with(&[("cc_session", "abc")]), CookieNames::default());
        assert_eq!(store.get(Concern::Token).as_deref(), Some("abc"));
        store.delete(Concern::Token);
        assert!(store.get(Concern::Token).is_none());
    }

    #[test]
    fn corrupt_companion_reads_as_default() {
        let store = CookieSessionStore::new(
            jar_with(&[("cc_session", "abc"), ("cc_tenant", "not-base64!"), ("cc_authorizations", "e30")]),
            CookieNames::default(),
        );
        let snap = snapshot(&store);
        assert!(snap.institution.is_placeholder());
        assert!(snap.authorizations.is_empty());
    }

    #[test]
    fn companions_without_token_are_ignored() {
        let profile = encode_companion(&grant().user).expect("encode");
        let store = CookieSessionStore::new(jar_with(&[("cc_profile", &profile)]), CookieNames::default());
        assert!(!snapshot(&store).is_authenticated());
    }

    #[test]
    fn redirect_target_is_consumed_once() {
        let mut store = MemorySessionStore::new();
        remember_redirect(&mut store, "/branches", &SessionSettings::default());
        assert_eq!(take_redirect(&mut store).as_deref(), Some("/branches"));
        assert!(take_redirect(&mut store).is_none());
    }

    #[test]
    fn redirect_cookie_has_its_own_short_lifetime() {
        let mut store = CookieSessionStore::new(CookieJar::new(), CookieNames::default());
        remember_redirect(&mut store, "/users", &SessionSettings::default());
        let jar = store.into_jar();
        let cookie = jar.get("cc_redirect").expect("redirect cookie");
        assert_eq!(cookie.max_age(), Some(TimeDuration::minutes(15)));
    }

    #[test]
    fn custom_cookie_names_are_honoured() {
        let names = CookieNames {
            token: "tok".into(),
            ..CookieNames::default()
        };
        let store = CookieSessionStore::new(jar_with(&[("tok", "v")]), names);
        assert_eq!(store.get(Concern::Token).as_deref(), Some("v"));
    }

    #[test]
    fn expiry_converts_from_backend_instant() {
        let instant = Utc::now() + Duration::hours(2);
        match Expiry::at(instant) {
            Expiry::At(at) => assert_eq!(at.unix_timestamp(), instant.timestamp()),
            other => panic!("unexpected expiry {other:?}"),
        }
    }
}
