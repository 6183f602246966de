//! Application state shared across all handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::locale::Locale;
use crate::middleware::GateConfig;
use crate::session::{JwtSessionVerifier, SessionVerifier};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap. Everything inside is
/// immutable after startup, so concurrent request workers read it
/// without synchronization.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Gate configuration: locales, route prefixes, redirect targets.
    gate: GateConfig,

    /// Session verification capability.
    verifier: Arc<dyn SessionVerifier>,
}

impl AppState {
    /// Production wiring: standard route map, JWT session verifier.
    pub fn new(config: &Config) -> Self {
        let mut gate = GateConfig::standard();
        gate.locales.default_locale = config.default_locale;
        gate.session_cookie = config.session_cookie.clone();

        let verifier = Arc::new(JwtSessionVerifier::new(config.auth_secret.as_bytes()));

        Self::with_parts(gate, verifier)
    }

    /// Assemble state from explicit parts. Tests use this to inject
    /// alternate gate configurations and fake verifiers.
    pub fn with_parts(gate: GateConfig, verifier: Arc<dyn SessionVerifier>) -> Self {
        gate.warn_on_overlap();
        Self {
            inner: Arc::new(AppStateInner { gate, verifier }),
        }
    }

    pub fn gate(&self) -> &GateConfig {
        &self.inner.gate
    }

    pub fn session_verifier(&self) -> &Arc<dyn SessionVerifier> {
        &self.inner.verifier
    }

    pub fn default_locale(&self) -> Locale {
        self.inner.gate.locales.default_locale
    }
}
