//! Request gating middleware.
//!
//! Runs once per inbound request, before any handler. Decides whether to
//! pass the request through, redirect it to its canonical locale-prefixed
//! URL, or redirect it for authentication reasons:
//!
//! 1. Bypass infrastructure paths (assets, API, favicon, health).
//! 2. Detect a locale prefix; otherwise resolve the locale from the
//!    request (override query/header, then Accept-Language).
//! 3. Classify the locale-stripped path: auth-only prefixes are checked
//!    before protected prefixes, so auth pages stay reachable for
//!    anonymous visitors even under overlapping configuration.
//! 4. Protected path without a valid session → redirect to sign-in,
//!    carrying the original path as `callbackUrl`.
//! 5. Auth-only path with a valid session → redirect to the dashboard.
//! 6. Missing locale prefix → redirect to `/{locale}{path}`.
//! 7. Otherwise pass through.
//!
//! The precedence is a contract: the steps run strictly in this order,
//! and a request that is already canonical (locale prefix present, auth
//! requirement satisfied) always passes through, so the gate can never
//! redirect in a loop.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::locale::{self, Locale, LocaleSettings};
use crate::session::{self, SessionIdentity};
use crate::state::AppState;

/// Query parameter for an explicit locale override.
pub const LOCALE_QUERY_PARAM: &str = "lang";

/// Header for an explicit locale override.
pub const LOCALE_OVERRIDE_HEADER: &str = "x-locale";

/// Query parameter carrying the post-login return path on the sign-in URL.
pub const CALLBACK_PARAM: &str = "callbackUrl";

/// The locale resolved for the current request.
///
/// Stored in request extensions on pass-through for handler access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLocale(pub Locale);

/// Static gate configuration, fixed at startup and injected.
///
/// Read concurrently without synchronization; never mutated.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub locales: LocaleSettings,
    /// Path prefixes that never see locale or auth logic.
    pub bypass_prefixes: Vec<String>,
    /// Exact paths that never see locale or auth logic.
    pub bypass_paths: Vec<String>,
    /// Locale-stripped prefixes requiring an authenticated session.
    pub protected_prefixes: Vec<String>,
    /// Locale-stripped prefixes reserved for anonymous visitors
    /// (sign-in, sign-up).
    pub auth_prefixes: Vec<String>,
    /// Sign-in page, locale-stripped.
    pub signin_path: String,
    /// Where authenticated users land, locale-stripped.
    pub dashboard_path: String,
    /// Name of the session cookie.
    pub session_cookie: String,
}

impl GateConfig {
    /// The production route map.
    pub fn standard() -> Self {
        Self {
            locales: LocaleSettings::standard(),
            bypass_prefixes: vec!["/static".to_string(), "/api".to_string()],
            bypass_paths: vec!["/favicon.ico".to_string(), "/health".to_string()],
            protected_prefixes: vec![
                "/dashboard".to_string(),
                "/positions".to_string(),
                "/transactions".to_string(),
                "/goals".to_string(),
            ],
            auth_prefixes: vec!["/auth".to_string()],
            signin_path: "/auth/signin".to_string(),
            dashboard_path: "/dashboard".to_string(),
            session_cookie: "session-token".to_string(),
        }
    }

    /// Warn about prefixes listed as both protected and auth-only.
    ///
    /// The gate resolves the ambiguity (auth-only wins), but overlap is a
    /// configuration error to fix, not behavior to rely on.
    pub fn warn_on_overlap(&self) {
        for auth in &self.auth_prefixes {
            for protected in &self.protected_prefixes {
                if auth.starts_with(protected.as_str()) || protected.starts_with(auth.as_str()) {
                    tracing::warn!(
                        auth_prefix = %auth,
                        protected_prefix = %protected,
                        "auth and protected prefixes overlap; auth-only takes precedence"
                    );
                }
            }
        }
    }
}

/// Classification of a locale-stripped path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No session requirement either way.
    Public,
    /// Requires an authenticated session.
    Protected,
    /// Reserved for anonymous visitors (sign-in, sign-up).
    AuthOnly,
}

/// Session status as seen by the gate.
///
/// Verifier infrastructure failure is collapsed to `Anonymous` before
/// this point (fail closed); reporting it distinctly is the middleware's
/// job, not the decision function's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Anonymous,
}

/// The gate's verdict for one request. Exactly one is produced per
/// request; nothing is cached across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Continue to the matched handler unchanged.
    PassThrough,
    /// Redirect to the same logical page at its canonical
    /// locale-prefixed URL.
    RewritePath(String),
    /// Redirect for authentication reasons (to sign-in or dashboard).
    Redirect(String),
}

/// Prefix match on whole path segments: `/auth` matches `/auth` and
/// `/auth/signin` but not `/authors`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Classify a locale-stripped path.
///
/// Auth-only is checked first: auth routes must stay reachable for
/// anonymous users, so a path matching both lists is never treated as
/// protected. Prefixes match on segment boundaries, like locale
/// prefixes do.
pub fn classify(config: &GateConfig, logical_path: &str) -> RouteClass {
    if config.auth_prefixes.iter().any(|p| matches_prefix(logical_path, p)) {
        return RouteClass::AuthOnly;
    }
    if config
        .protected_prefixes
        .iter()
        .any(|p| matches_prefix(logical_path, p))
    {
        return RouteClass::Protected;
    }
    RouteClass::Public
}

/// True for infrastructure paths the gate must not touch.
pub fn is_bypassed(config: &GateConfig, path: &str) -> bool {
    config.bypass_paths.iter().any(|p| p == path)
        || config.bypass_prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

/// Produce the gate decision from fully resolved inputs (sync, testable).
///
/// Assumes bypass has already been ruled out. The branches run strictly
/// in the documented order; the first that fires wins.
pub fn decide(
    config: &GateConfig,
    path: &str,
    query: Option<&str>,
    locale: Locale,
    has_locale_prefix: bool,
    class: RouteClass,
    session: SessionState,
) -> GateDecision {
    let original = match query {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };

    if class == RouteClass::Protected && session == SessionState::Anonymous {
        return GateDecision::Redirect(format!(
            "/{locale}{signin}?{CALLBACK_PARAM}={original}",
            signin = config.signin_path,
        ));
    }

    if class == RouteClass::AuthOnly && session == SessionState::Authenticated {
        return GateDecision::Redirect(format!(
            "/{locale}{dashboard}",
            dashboard = config.dashboard_path,
        ));
    }

    if !has_locale_prefix {
        return GateDecision::RewritePath(format!("/{locale}{original}"));
    }

    GateDecision::PassThrough
}

/// Middleware entry point: evaluate the gate for one request.
///
/// The session verifier is consulted only for protected and auth-only
/// paths, is awaited, and is never retried. A verifier error is logged
/// and treated as "no session" (fail closed).
pub async fn gate_request(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let config = state.gate();
    let path = request.uri().path();

    if is_bypassed(config, path) {
        return next.run(request).await;
    }

    // Locale detection: a prefix wins outright; otherwise resolve from
    // the override sources and Accept-Language.
    let (has_locale_prefix, locale, logical_path) =
        match locale::locale_prefix(&config.locales, path) {
            Some((l, rest)) => (true, l, rest),
            None => {
                let override_tag = override_tag(request.uri(), request.headers());
                let accept_language = header_str(request.headers(), "accept-language");
                let resolved = locale::resolve(
                    &config.locales,
                    path,
                    override_tag.as_deref(),
                    accept_language,
                );
                (false, resolved, path)
            }
        };

    let class = classify(config, logical_path);

    // Session verification runs only when the classification needs it.
    let (session_state, identity) = match class {
        RouteClass::Public => (SessionState::Anonymous, None),
        RouteClass::Protected | RouteClass::AuthOnly => {
            verify_session(&state, request.headers()).await
        }
    };

    let decision = decide(
        config,
        request.uri().path(),
        request.uri().query(),
        locale,
        has_locale_prefix,
        class,
        session_state,
    );

    match decision {
        GateDecision::PassThrough => {
            request.extensions_mut().insert(ResolvedLocale(locale));
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
        GateDecision::RewritePath(location) => {
            tracing::debug!(from = %request.uri(), to = %location, "canonical locale redirect");
            redirect_to(&location)
        }
        GateDecision::Redirect(location) => {
            tracing::debug!(from = %request.uri(), to = %location, class = ?class, "gate redirect");
            redirect_to(&location)
        }
    }
}

/// Resolve session state from the request cookie, failing closed.
async fn verify_session(
    state: &AppState,
    headers: &HeaderMap,
) -> (SessionState, Option<SessionIdentity>) {
    let Some(token) = session::token_from_headers(headers, &state.gate().session_cookie) else {
        return (SessionState::Anonymous, None);
    };

    match state.session_verifier().verify(&token).await {
        Ok(Some(identity)) => (SessionState::Authenticated, Some(identity)),
        Ok(None) => (SessionState::Anonymous, None),
        Err(e) => {
            // Infrastructure failure, not a bad credential. Deny access
            // rather than fail open.
            tracing::warn!(error = %e, "session verifier unavailable; treating as unauthenticated");
            (SessionState::Anonymous, None)
        }
    }
}

/// Explicit locale override: `lang` query parameter, else `x-locale`
/// header. The query parameter wins when both are present.
fn override_tag(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    if let Some(query) = uri.query() {
        let from_query = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == LOCALE_QUERY_PARAM)
            .map(|(_, value)| value.into_owned());
        if from_query.is_some() {
            return from_query;
        }
    }

    header_str(headers, LOCALE_OVERRIDE_HEADER).map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Build a 302 response to `location`.
fn redirect_to(location: &str) -> Response {
    // Sanitize to prevent CRLF injection into the Location header.
    // HTTP header values must not contain \r or \n.
    let safe_location: String = location.chars().filter(|c| *c != '\r' && *c != '\n').collect();

    (StatusCode::FOUND, [("Location", safe_location)]).into_response()
}
