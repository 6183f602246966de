//! Locale resolution.
//!
//! Resolves the active locale for each request using a chain of sources.
//! Resolution order: URL prefix → explicit override (query/header) →
//! Accept-Language → default.
//!
//! Pure over strings so it can be tested without building HTTP requests;
//! the gate middleware extracts the relevant request values and hands
//! them in.

use std::fmt;

/// A supported locale.
///
/// The set is closed: resolution can never produce a tag outside this
/// enum, and matching is exhaustive at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locale {
    EnUs,
    EsEs,
    PtBr,
}

impl Locale {
    /// All locales this build knows about, in canonical order.
    pub const ALL: [Locale; 3] = [Locale::EnUs, Locale::EsEs, Locale::PtBr];

    /// Canonical tag as it appears in URLs (`/en-US/dashboard`).
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::EnUs => "en-US",
            Locale::EsEs => "es-ES",
            Locale::PtBr => "pt-BR",
        }
    }

    /// Bare language code, used for Accept-Language base matching.
    pub fn base_lang(self) -> &'static str {
        match self {
            Locale::EnUs => "en",
            Locale::EsEs => "es",
            Locale::PtBr => "pt",
        }
    }

    /// Match a URL path segment. Exact and case-sensitive: `/EN-us/about`
    /// does not carry a locale prefix.
    pub fn from_segment(segment: &str) -> Option<Locale> {
        Locale::ALL.iter().copied().find(|l| l.as_str() == segment)
    }

    /// Normalize an explicit override value (`lang` query parameter or
    /// `x-locale` header). Accepts full tags and bare language codes.
    pub fn from_tag(tag: &str) -> Option<Locale> {
        Locale::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == tag || l.base_lang() == tag)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The enabled locale set and the fallback, fixed at startup.
///
/// Constructed once and injected; never mutated. Tests build their own
/// with whatever subset they need.
#[derive(Debug, Clone)]
pub struct LocaleSettings {
    /// Enabled locales, in negotiation-preference order.
    pub enabled: Vec<Locale>,
    /// Returned whenever no source yields an enabled locale.
    pub default_locale: Locale,
}

impl LocaleSettings {
    /// The production locale set: all known locales, `en-US` default.
    pub fn standard() -> Self {
        Self {
            enabled: Locale::ALL.to_vec(),
            default_locale: Locale::EnUs,
        }
    }

    pub fn is_enabled(&self, locale: Locale) -> bool {
        self.enabled.contains(&locale)
    }
}

/// Extract an enabled locale prefix from a URL path.
///
/// Returns `Some((locale, logical_path))` if the first path segment is an
/// enabled locale tag (exact, case-sensitive). A bare prefix like
/// `/en-US` yields the logical path `/`.
pub fn locale_prefix<'a>(settings: &LocaleSettings, path: &'a str) -> Option<(Locale, &'a str)> {
    let trimmed = path.strip_prefix('/')?;

    let (candidate, rest) = match trimmed.find('/') {
        Some(pos) => (&trimmed[..pos], &trimmed[pos..]),
        None => (trimmed, ""),
    };

    let locale = Locale::from_segment(candidate).filter(|l| settings.is_enabled(*l))?;

    if rest.is_empty() {
        Some((locale, "/"))
    } else {
        Some((locale, rest))
    }
}

/// Resolve the locale for one request.
///
/// Source precedence, first match wins:
/// 1. URL prefix — no negotiation runs.
/// 2. Explicit override. A present-but-unrecognized value resolves to
///    the default locale; it does not fall through to negotiation.
/// 3. Accept-Language negotiation.
/// 4. Default locale.
///
/// Never fails; always returns an enabled locale.
pub fn resolve(
    settings: &LocaleSettings,
    path: &str,
    override_tag: Option<&str>,
    accept_language: Option<&str>,
) -> Locale {
    if let Some((locale, _)) = locale_prefix(settings, path) {
        return locale;
    }

    if let Some(tag) = override_tag {
        return Locale::from_tag(tag)
            .filter(|l| settings.is_enabled(*l))
            .unwrap_or(settings.default_locale);
    }

    if let Some(header) = accept_language
        && let Some(locale) = negotiate_accept_language(settings, header)
    {
        return locale;
    }

    settings.default_locale
}

/// Negotiate a locale from an Accept-Language header value.
///
/// For each preference in descending quality order, try an exact tag
/// match first, then a base-language match (`es` matches `es-ES`).
pub fn negotiate_accept_language(settings: &LocaleSettings, header: &str) -> Option<Locale> {
    for (lang, _quality) in parse_accept_language(header) {
        let exact = settings
            .enabled
            .iter()
            .copied()
            .find(|l| l.as_str().eq_ignore_ascii_case(&lang));
        if let Some(locale) = exact {
            return Some(locale);
        }

        if let Some(primary) = lang.split('-').next() {
            let base = settings
                .enabled
                .iter()
                .copied()
                .find(|l| l.base_lang().eq_ignore_ascii_case(primary));
            if let Some(locale) = base {
                return Some(locale);
            }
        }
    }

    None
}

/// Parse an Accept-Language header value into (language, quality) pairs,
/// sorted by quality descending (stable sort preserves original order for
/// ties).
fn parse_accept_language(header: &str) -> Vec<(String, f32)> {
    let mut langs: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }

            let mut segments = part.split(';');
            let lang = segments.next()?.trim().to_string();
            if lang.is_empty() || lang == "*" {
                return None;
            }

            let quality = segments
                .find_map(|s| {
                    let s = s.trim();
                    s.strip_prefix("q=")
                        .and_then(|q| q.trim().parse::<f32>().ok())
                })
                .unwrap_or(1.0)
                .clamp(0.0, 1.0); // RFC 7231 §5.3.1: quality values are 0.000–1.000

            Some((lang, quality))
        })
        .collect();

    // Stable sort: preserves original order for equal quality values
    langs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    langs
}
