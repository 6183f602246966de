//! Gruzzolo Kernel Library
//!
//! Exposes kernel internals for integration testing. The main entry
//! point for running the server is the `gruzzolo` binary.

pub mod config;
pub mod error;
pub mod locale;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Build the application router with the gate layer attached.
///
/// Outer infrastructure layers (tracing, CORS) are added by the binary;
/// tests drive this router directly.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::pages::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::gate_request,
        ))
        .with_state(state)
}
