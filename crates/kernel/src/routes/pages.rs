//! Localized page endpoints.
//!
//! Thin JSON stands-ins for the rendered pages: the real UI tree lives
//! with the frontend collaborator. These handlers exist so the gate has
//! routes to protect, and they read the locale and session identity the
//! gate records in request extensions on pass-through.

use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::ResolvedLocale;
use crate::session::SessionIdentity;
use crate::state::AppState;

#[derive(Serialize)]
struct Page {
    page: &'static str,
    locale: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<String>,
}

impl Page {
    fn new(page: &'static str, locale: ResolvedLocale) -> Self {
        Self {
            page,
            locale: locale.0.as_str(),
            subject: None,
            callback_url: None,
        }
    }
}

async fn landing(Extension(locale): Extension<ResolvedLocale>) -> Json<Page> {
    Json(Page::new("landing", locale))
}

/// Protected dashboard page.
///
/// The gate redirects anonymous requests before they get here; the
/// missing-identity branch only fires if the route map and the gate's
/// protected prefixes drift apart.
async fn dashboard(
    Extension(locale): Extension<ResolvedLocale>,
    identity: Option<Extension<SessionIdentity>>,
) -> AppResult<Json<Page>> {
    let Some(Extension(identity)) = identity else {
        return Err(AppError::Unauthorized);
    };

    Ok(Json(Page {
        subject: Some(identity.subject),
        ..Page::new("dashboard", locale)
    }))
}

#[derive(Deserialize)]
struct SigninQuery {
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
}

async fn signin(
    Extension(locale): Extension<ResolvedLocale>,
    Query(query): Query<SigninQuery>,
) -> Json<Page> {
    Json(Page {
        callback_url: query.callback_url,
        ..Page::new("signin", locale)
    })
}

async fn signup(Extension(locale): Extension<ResolvedLocale>) -> Json<Page> {
    Json(Page::new("signup", locale))
}

/// Create the localized pages router.
///
/// Every route sits under a `/{lang}` segment: the gate redirects
/// prefix-less requests to their canonical localized URL before routing.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{lang}", get(landing))
        .route("/{lang}/", get(landing))
        .route("/{lang}/dashboard", get(dashboard))
        .route("/{lang}/auth/signin", get(signin))
        .route("/{lang}/auth/signup", get(signup))
}
