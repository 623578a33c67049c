//! Client-side console state.
//!
//! All state changes go through [`ConsoleState::reduce`]; the UI layer wraps
//! the state in whatever observable it uses and dispatches [`Action`]s.
//! Results of asynchronous fetches carry a [`FetchTicket`] and are dropped
//! when the component that asked for them has gone away or the tenant has
//! changed in the meantime.

use crate::authorization::{AuthorizationSet, AuthorizationSnapshot, MatchRule};
use crate::navigation::{NavContext, NavItem, compose};
use crate::profile::UserProfile;
use crate::tenant::{Institution, TenantSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Ticks shown before redirecting to the login page after a broken session.
pub const REDIRECT_COUNTDOWN: u8 = 3;

/// Where a broken session sends the user.
pub const LOGIN_PATH: &str = "/login";

/// Everything the session store knows about the caller, as served to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub institution: Institution,
    #[serde(default)]
    pub authorizations: AuthorizationSet,
}

impl SessionSnapshot {
    /// Returns true if a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.profile.is_some()
    }
}

#[derive(Debug, Default)]
struct ScopeInner {
    generation: AtomicU64,
    cancelled: AtomicBool,
}

/// Lifetime of a consumer of fetched data (typically one component).
///
/// Starting a new fetch supersedes the previous one; cancelling the scope
/// invalidates every outstanding ticket.
#[derive(Debug, Clone, Default)]
pub struct FetchScope {
    inner: Arc<ScopeInner>,
}

impl FetchScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket for a fetch started under `tenant_epoch`.
    #[must_use]
    pub fn begin(&self, tenant_epoch: u64) -> FetchTicket {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        FetchTicket {
            scope: self.clone(),
            generation,
            tenant_epoch,
        }
    }

    /// Invalidates all outstanding tickets.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

/// Proof that a fetch result is still wanted.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    scope: FetchScope,
    generation: u64,
    tenant_epoch: u64,
}

impl FetchTicket {
    /// Returns true if the scope is alive and no newer fetch was started.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.scope.is_cancelled()
            && self.scope.inner.generation.load(Ordering::SeqCst) == self.generation
    }

    #[must_use]
    pub fn tenant_epoch(&self) -> u64 {
        self.tenant_epoch
    }
}

/// State transitions of the console.
#[derive(Debug, Clone)]
pub enum Action {
    /// A snapshot was read from the session store.
    SessionLoaded(SessionSnapshot),
    /// Result of re-reading the authorization set.
    AuthorizationsFetched(Result<AuthorizationSet, String>),
    /// The user picked another institution.
    SwitchTenant(Institution),
    /// Rows for a tenant-scoped table arrived.
    TableFetched {
        ticket: FetchTicket,
        key: String,
        rows: serde_json::Value,
    },
    /// The user logged out.
    Logout,
    /// A request failed in a way that invalidates the session.
    SessionBroken { reason: String },
    /// One tick of the redirect countdown elapsed.
    CountdownTick,
}

/// Client-side state of the console.
#[derive(Debug, Clone, Default)]
pub struct ConsoleState {
    profile: Option<UserProfile>,
    authorizations: AuthorizationSnapshot,
    tenant: TenantSnapshot,
    tenant_epoch: u64,
    tables: HashMap<String, serde_json::Value>,
    notice: Option<String>,
    countdown: Option<u8>,
    redirect: Option<&'static str>,
}

impl ConsoleState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one action.
    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::SessionLoaded(snapshot) => {
                self.clear_notice();
                self.profile = snapshot.profile;
                self.authorizations.replace(snapshot.authorizations);
                self.switch_tenant(snapshot.institution);
            }
            Action::AuthorizationsFetched(result) => {
                self.authorizations = AuthorizationSnapshot::from_fetch(result);
            }
            Action::SwitchTenant(institution) => self.switch_tenant(institution),
            Action::TableFetched { ticket, key, rows } => {
                if !ticket.is_live() {
                    tracing::debug!(table = %key, "Dropping result for a cancelled or superseded fetch");
                    return;
                }
                if ticket.tenant_epoch() != self.tenant_epoch {
                    tracing::debug!(table = %key, "Dropping result fetched for a previous institution");
                    return;
                }
                self.tables.insert(key, rows);
            }
            Action::Logout => {
                self.clear_identity();
                self.clear_notice();
            }
            Action::SessionBroken { reason } => {
                tracing::warn!(reason = %reason, "Session broken, redirecting to login");
                self.clear_identity();
                self.notice = Some(reason);
                self.countdown = Some(REDIRECT_COUNTDOWN);
            }
            Action::CountdownTick => {
                if let Some(remaining) = self.countdown {
                    let remaining = remaining.saturating_sub(1);
                    self.countdown = Some(remaining);
                    if remaining == 0 {
                        self.redirect = Some(LOGIN_PATH);
                    }
                }
            }
        }
    }

    fn switch_tenant(&mut self, institution: Institution) {
        if self.tenant.institution().id == institution.id {
            // Same scope; refresh descriptive fields without invalidating.
            self.tenant.replace(institution);
            return;
        }
        self.tenant.replace(institution);
        self.invalidate_tenant_caches();
    }

    fn clear_identity(&mut self) {
        self.profile = None;
        self.authorizations.clear();
        self.tenant.reset();
        self.invalidate_tenant_caches();
    }

    fn clear_notice(&mut self) {
        self.notice = None;
        self.countdown = None;
        self.redirect = None;
    }

    fn invalidate_tenant_caches(&mut self) {
        self.tenant_epoch += 1;
        self.tables.clear();
    }

    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn authorizations(&self) -> &AuthorizationSnapshot {
        &self.authorizations
    }

    #[must_use]
    pub fn institution(&self) -> &Institution {
        self.tenant.institution()
    }

    #[must_use]
    pub fn tenant_epoch(&self) -> u64 {
        self.tenant_epoch
    }

    /// Cached rows for a tenant-scoped table.
    #[must_use]
    pub fn table(&self, key: &str) -> Option<&serde_json::Value> {
        self.tables.get(key)
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    #[must_use]
    pub fn countdown(&self) -> Option<u8> {
        self.countdown
    }

    /// Path the UI should navigate to, if any.
    #[must_use]
    pub fn redirect(&self) -> Option<&'static str> {
        self.redirect
    }

    /// Visible navigation for the current state.
    #[must_use]
    pub fn navigation(&self, catalog: &[NavItem], rule: MatchRule) -> Vec<NavItem> {
        compose(
            catalog,
            NavContext {
                authorizations: self.authorizations.set(),
                institution: self.tenant.institution(),
                rule,
            },
        )
    }
}
