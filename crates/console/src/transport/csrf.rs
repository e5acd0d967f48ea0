//! Anti-forgery token handling.
//!
//! The token lives in the `XSRF-TOKEN` cookie, which the server rotates.
//! It is read from the cookie jar before every mutating request and never
//! cached, so a refresh done on behalf of one request is seen by the next.

use reqwest::Method;
use reqwest::cookie::CookieStore;
use url::Url;

pub const XSRF_COOKIE: &str = "XSRF-TOKEN";
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Methods that must carry the anti-forgery header.
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Current token as stored in the jar for `url`, if any.
pub fn read_token<S: CookieStore + ?Sized>(jar: &S, url: &Url) -> Option<String> {
    let header = jar.cookies(url)?;
    let header = header.to_str().ok()?;
    cookie_value(header, XSRF_COOKIE)
}

/// Extract one cookie from a `Cookie:` header value (`a=1; b=2`).
pub(crate) fn cookie_value(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Whether a 403 body signals a rejected anti-forgery token.
pub fn is_anti_forgery_failure(body: &[u8]) -> bool {
    let text = String::from_utf8_lossy(body).to_ascii_lowercase();
    text.contains("csrf") || text.contains("xsrf")
}

/// Number of anti-forgery refresh cycles a single logical request may use.
pub const MAX_CSRF_RETRIES: u8 = 1;

/// Explicit retry allowance carried through the transport's retry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u8,
}

impl RetryBudget {
    /// Budget for an original (non-retried) request.
    pub fn fresh() -> Self {
        Self {
            remaining: MAX_CSRF_RETRIES,
        }
    }

    /// Consume one retry; `false` when none is left.
    pub fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn is_retry(&self) -> bool {
        self.remaining < MAX_CSRF_RETRIES
    }
}
