//! campus-console web server and UI.
//!
//! This crate provides the Leptos-based shell of the administrative
//! console. The BFF routes it mounts live in `campus-console-bff`.

#![allow(non_snake_case)]

pub mod app;

#[cfg(feature = "ssr")]
pub mod config;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::App;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}
