//! Main Leptos application component and routing.

use campus_console_access::{
    Action, ConsoleState, MatchRule, NavItem, Section, SessionSnapshot, default_catalog,
};
use leptos::prelude::*;
use leptos_meta::{Title, provide_meta_context};
use leptos_router::{
    components::{Route, Router, Routes},
    hooks::{use_navigate, use_params_map, use_query_map},
    path,
};
use std::time::Duration;

/// Capability matching used across the UI.
const MATCH_RULE: MatchRule = MatchRule::Substring;

/// Server function to read the caller's session snapshot from cookies.
#[server]
pub async fn get_session_snapshot() -> Result<SessionSnapshot, ServerFnError> {
    use axum::Extension;
    use axum_extra::extract::CookieJar;
    use campus_console_bff::session::snapshot;
    use campus_console_bff::{CookieNames, CookieSessionStore};

    // Extract the cookie jar from the request
    let jar: CookieJar = leptos_axum::extract().await?;

    // Cookie names are provided as a request extension
    let Extension(names): Extension<CookieNames> = leptos_axum::extract().await?;

    Ok(snapshot(&CookieSessionStore::new(jar, names)))
}

/// Handle on the console reducer, shared through context.
#[derive(Clone, Copy)]
pub struct Console(RwSignal<ConsoleState>);

impl Console {
    pub fn dispatch(&self, action: Action) {
        self.0.update(|state| state.reduce(action));
    }

    pub fn with<T>(&self, f: impl FnOnce(&ConsoleState) -> T) -> T {
        self.0.with(f)
    }
}

fn use_console() -> Console {
    expect_context::<Console>()
}

/// The main application component.
#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();
    provide_context(Console(RwSignal::new(ConsoleState::new())));

    view! {
        <Title text="Campus Console"/>
        <Router>
            <SessionLoader/>
            <Shell>
                <Routes fallback=|| "Page introuvable.".into_view()>
                    <Route path=path!("/") view=HomePage/>
                    <Route path=path!("/login") view=LoginPage/>
                    <Route path=path!("/programs/compare") view=ComparisonPage/>
                    <Route path=path!("/:section") view=SectionPage/>
                </Routes>
            </Shell>
        </Router>
    }
}

/// Loads the session snapshot into the reducer and drives the redirect
/// countdown when the session breaks.
#[component]
fn SessionLoader() -> impl IntoView {
    let console = use_console();
    let snapshot = Resource::new(|| (), |_| get_session_snapshot());
    let navigate = use_navigate();

    Effect::new(move || {
        if let Some(result) = snapshot.get() {
            match result {
                Ok(snapshot) => console.dispatch(Action::SessionLoaded(snapshot)),
                Err(e) => console.dispatch(Action::SessionBroken {
                    reason: format!("Session indisponible : {e}"),
                }),
            }
        }
    });

    Effect::new(move || {
        if console.with(ConsoleState::countdown).is_some_and(|n| n > 0) {
            set_timeout(
                move || console.dispatch(Action::CountdownTick),
                Duration::from_secs(1),
            );
        }
    });

    Effect::new(move || {
        if let Some(target) = console.with(ConsoleState::redirect) {
            navigate(target, Default::default());
        }
    });
}

/// Page chrome: header, sidebar and the session notice.
#[component]
fn Shell(children: Children) -> impl IntoView {
    let console = use_console();
    let theme = move || {
        console.with(|state| format!("console theme-{}", state.institution().theme()))
    };

    view! {
        <div class=theme>
            <Header/>
            <div class="console-body">
                <Sidebar/>
                <main class="container">
                    <SessionNotice/>
                    {children()}
                </main>
            </div>
        </div>
    }
}

/// Header component with the active institution and user menu.
#[component]
fn Header() -> impl IntoView {
    let console = use_console();
    let institution = move || {
        console.with(|state| {
            let institution = state.institution();
            (!institution.is_placeholder()).then(|| institution.name.clone())
        })
    };
    let user = move || console.with(|state| state.profile().map(|p| p.display_name().to_string()));

    view! {
        <header class="header">
            <div class="header-left">
                <a href="/" class="logo">"Campus Console"</a>
                {move || institution().map(|name| view! { <span class="institution">{name}</span> })}
            </div>
            <div class="header-right">
                {move || match user() {
                    Some(name) => view! {
                        <div class="user-menu">
                            <span class="user-name">{name}</span>
                            <a href="/auth/logout" rel="external">"Se déconnecter"</a>
                        </div>
                    }.into_any(),
                    None => view! {
                        <a href="/login" class="login-button">"Se connecter"</a>
                    }.into_any(),
                }}
            </div>
        </header>
    }
}

/// Sidebar navigation composed from the catalog and the current snapshot.
#[component]
fn Sidebar() -> impl IntoView {
    let console = use_console();
    let catalog = StoredValue::new(default_catalog());
    let items = move || catalog.with_value(|catalog| console.with(|state| state.navigation(catalog, MATCH_RULE)));

    view! {
        <nav class="sidebar">
            <ul>
                {move || items().into_iter().map(nav_entry).collect_view()}
            </ul>
        </nav>
    }
}

fn nav_entry(item: NavItem) -> AnyView {
    match item.link {
        Some(link) if item.children.is_empty() => view! {
            <li class="nav-leaf">
                <a href=link class=format!("icon-{}", item.icon)>{item.label}</a>
            </li>
        }
        .into_any(),
        _ => view! {
            <li class="nav-group">
                <span class=format!("nav-group-label icon-{}", item.icon)>{item.label}</span>
                <ul>{item.children.into_iter().map(nav_entry).collect_view()}</ul>
            </li>
        }
        .into_any(),
    }
}

/// Status message shown when the session broke, with the redirect countdown.
#[component]
fn SessionNotice() -> impl IntoView {
    let console = use_console();
    let notice = move || console.with(|state| state.notice().map(|n| (n.to_string(), state.countdown())));

    move || {
        notice().map(|(message, countdown)| {
            let countdown = countdown
                .map(|n| format!("Redirection vers la connexion dans {n} s."))
                .unwrap_or_default();
            view! {
                <div class="notice">
                    <p>{message}</p>
                    <p class="countdown">{countdown}</p>
                </div>
            }
        })
    }
}

/// The home page component.
#[component]
fn HomePage() -> impl IntoView {
    let console = use_console();
    let greeting = move || {
        console.with(|state| {
            state
                .profile()
                .map(|profile| format!("Bienvenue, {} !", profile.display_name()))
        })
    };

    view! {
        <div class="home-page">
            {move || match greeting() {
                Some(greeting) => view! {
                    <div>
                        <h1>{greeting}</h1>
                        <p>"Sélectionnez une rubrique dans le menu."</p>
                    </div>
                }.into_any(),
                None => view! {
                    <div>
                        <h1>"Campus Console"</h1>
                        <p>"Administration des établissements d'enseignement supérieur."</p>
                        <a href="/login" class="cta-button">"Se connecter"</a>
                    </div>
                }.into_any(),
            }}
        </div>
    }
}

/// Login page; the form posts to the BFF which sets the session cookies.
#[component]
fn LoginPage() -> impl IntoView {
    let query = use_query_map();
    let error = move || {
        query.read().get("error").map(|code| match code.as_str() {
            "credentials" => "Identifiants invalides.",
            _ => "Veuillez vérifier l'adresse e-mail et le mot de passe.",
        })
    };

    view! {
        <div class="login-page">
            <div class="login-box">
                <h1>"Connexion"</h1>
                {move || error().map(|message| view! { <p class="error">{message}</p> })}
                <form method="post" action="/auth/login">
                    <label for="email">"Adresse e-mail"</label>
                    <input id="email" name="email" type="email" required/>
                    <label for="password">"Mot de passe"</label>
                    <input id="password" name="password" type="password" minlength="6" required/>
                    <button type="submit" class="login-button">"Se connecter"</button>
                </form>
            </div>
        </div>
    }
}

/// Gated landing for a catalog section.
#[component]
fn SectionView(section: Section, title: String) -> impl IntoView {
    let console = use_console();
    let allowed = move || console.with(|state| state.authorizations().allows(section, MATCH_RULE));

    view! {
        <div class="section-page">
            <h1>{title}</h1>
            <Show
                when=allowed
                fallback=|| view! { <p class="error">"Accès refusé."</p> }
            >
                <p>"Les données sont chargées depuis l'API de l'établissement actif."</p>
            </Show>
        </div>
    }
}

/// Section resolved from the first path segment.
#[component]
fn SectionPage() -> impl IntoView {
    let params = use_params_map();

    move || {
        let segment = params.read().get("section").unwrap_or_default();
        match Section::ALL.into_iter().find(|s| s.tag() == segment) {
            Some(section) => view! { <SectionView section=section title=segment/> }.into_any(),
            None => view! { <p>"Page introuvable."</p> }.into_any(),
        }
    }
}

#[component]
fn ComparisonPage() -> impl IntoView {
    view! { <SectionView section=Section::Programs title="Comparaison de programmes".to_string()/> }
}
