//! Cookie objects handed back to the HTTP layer.

use crate::clock::unix_seconds;
use crate::{Error, Result};

use httpdate::fmt_http_date;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Last second `Expires` can render (9999-12-31T23:59:59Z).
const LATEST_EXPIRY: Duration = Duration::from_secs(253_402_300_799);

/// Cross-site policy for gateway cookies, written as `same_site = "lax"` in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Never sent on cross-site requests, including the provider's redirect back.
    Strict,
    /// Sent on top-level cross-site navigations such as the OAuth callback.
    Lax,
    /// Sent everywhere; browsers require `Secure` alongside it.
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attr = match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        };
        f.write_str(attr)
    }
}

/// `now + lifetime`, rejected when it cannot be written as an `Expires` date.
pub(crate) fn expiry_after(now: SystemTime, lifetime: Duration) -> Result<SystemTime> {
    now.checked_add(lifetime)
        .filter(|at| *at <= UNIX_EPOCH + LATEST_EXPIRY)
        .ok_or_else(|| Error::Config(format!("cookie lifetime {lifetime:?} is out of range")))
}

/// An expiry `by` before `now`, never earlier than the epoch.
pub(crate) fn expired_before(now: SystemTime, by: Duration) -> SystemTime {
    now.checked_sub(by)
        .filter(|at| *at >= UNIX_EPOCH)
        .unwrap_or(UNIX_EPOCH)
}

/// Attributes shared by every cookie the gateway sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieFlags {
    /// Send on HTTPS only.
    pub secure: bool,
    /// SameSite attribute; omitted when `None`.
    pub same_site: Option<SameSite>,
}

impl Default for CookieFlags {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: None,
        }
    }
}

/// A ready-to-set cookie. Always `Path=/` and `HttpOnly`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value. Empty for a clearing cookie.
    pub value: String,
    /// Cookie path.
    pub path: String,
    /// Domain attribute.
    pub domain: String,
    /// Send on HTTPS only.
    pub secure: bool,
    /// Not accessible to JS.
    pub http_only: bool,
    /// SameSite attribute.
    pub same_site: Option<SameSite>,
    /// Absolute expiry.
    pub expires: SystemTime,
}

impl Cookie {
    pub(crate) fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        flags: CookieFlags,
        expires: SystemTime,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            domain: domain.into(),
            secure: flags.secure,
            http_only: true,
            same_site: flags.same_site,
            expires,
        }
    }

    /// Expiry as Unix seconds.
    pub fn expires_unix(&self) -> i64 {
        unix_seconds(self.expires)
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_set_cookie(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(format!("{}={}", self.name, self.value));
        parts.push(format!("Path={}", self.path));

        if !self.domain.is_empty() {
            parts.push(format!("Domain={}", self.domain));
        }

        parts.push(format!("Expires={}", fmt_http_date(self.expires)));

        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={same_site}"));
        }

        parts.join("; ")
    }
}
