//! Login-flow CSRF protection.
//!
//! A login starts by minting a nonce. The nonce goes into the OAuth `state`
//! parameter (`nonce:provider:return_url`) and into a short-lived cookie named
//! `<prefix>_<first 6 chars of nonce>`. On callback the cookie must carry the
//! exact nonce the state starts with, which a third party cannot arrange.

use crate::clock::Clock;
use crate::cookie::{Cookie, CookieFlags, expired_before, expiry_after};
use crate::domain::{ScopeMatcher, strip_port};
use crate::request::ForwardedRequest;
use crate::session::CLEAR_BACKDATE;
use crate::{Error, Result};

use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Length of a nonce in hex characters.
pub const NONCE_LEN: usize = 32;

/// Shortest acceptable state: nonce, `:`, one provider character.
pub const MIN_STATE_LEN: usize = NONCE_LEN + 2;

/// CSRF cookies live a fixed hour so abandoned logins clean themselves up.
pub const CSRF_COOKIE_LIFETIME: Duration = Duration::from_secs(60 * 60);

const NAME_NONCE_CHARS: usize = 6;

/// Provider and return URL recovered from a verified state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
    /// Name of the OAuth provider that handled the login.
    pub provider: String,
    /// Where to send the user afterwards.
    pub return_url: String,
}

/// 16 random bytes from the OS, hex encoded (32 chars).
pub fn generate_nonce() -> Result<String> {
    let mut bytes = [0u8; NONCE_LEN / 2];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Nonce(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Build the OAuth `state` parameter.
pub fn issue_state(return_url: &str, provider: &str, nonce: &str) -> String {
    format!("{nonce}:{provider}:{return_url}")
}

/// Reject states too short to hold a nonce and a provider.
pub fn validate_state(state: &str) -> Result<()> {
    if state.len() < MIN_STATE_LEN {
        return Err(Error::Format("invalid CSRF state value".to_string()));
    }
    Ok(())
}

/// Check a CSRF cookie value against the returned state and unpack the state.
pub fn validate_csrf_cookie(cookie_value: &str, state: &str) -> Result<LoginState> {
    if cookie_value.len() != NONCE_LEN {
        return Err(Error::Format("invalid CSRF cookie value".to_string()));
    }

    if state.get(..NONCE_LEN) != Some(cookie_value) {
        return Err(Error::Format("CSRF cookie does not match state".to_string()));
    }

    let params = state
        .get(NONCE_LEN..)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| Error::Format("invalid CSRF state format".to_string()))?;

    let (provider, return_url) = params
        .split_once(':')
        .ok_or_else(|| Error::Format("invalid CSRF state format".to_string()))?;

    Ok(LoginState {
        provider: provider.to_string(),
        return_url: return_url.to_string(),
    })
}

/// Issues and locates CSRF cookies.
#[derive(Debug, Clone)]
pub struct CsrfCookies {
    prefix: String,
    flags: CookieFlags,
    scopes: ScopeMatcher,
    auth_host: Option<String>,
    clock: Arc<dyn Clock>,
}

impl CsrfCookies {
    /// `auth_host` is the central login host, if one is configured.
    pub fn new(
        prefix: impl Into<String>,
        flags: CookieFlags,
        scopes: ScopeMatcher,
        auth_host: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            flags,
            scopes,
            auth_host: auth_host.filter(|h| !h.is_empty()),
            clock,
        }
    }

    /// Name of the CSRF cookie for a nonce (or a state, which starts with one).
    pub fn cookie_name(&self, nonce: &str) -> Result<String> {
        let head = nonce
            .get(..NAME_NONCE_CHARS)
            .ok_or_else(|| Error::Format("nonce too short".to_string()))?;
        Ok(format!("{}_{head}", self.prefix))
    }

    /// The shared cookie domain when both `host` and the auth host fall under
    /// the same configured scope, so the auth host will see the cookie.
    pub fn use_auth_domain(&self, host: &str) -> Option<String> {
        let auth_host = self.auth_host.as_deref()?;

        let request = self.scopes.resolve(host);
        let auth = self.scopes.resolve(auth_host);

        (request.matched && auth.matched && request.domain == auth.domain)
            .then_some(request.domain)
    }

    /// Domain for CSRF cookies set on `host`.
    pub fn cookie_domain(&self, host: &str) -> String {
        self.use_auth_domain(host)
            .unwrap_or_else(|| strip_port(host).to_string())
    }

    /// A CSRF cookie carrying `nonce`, valid for one hour.
    pub fn issue(&self, host: &str, nonce: &str) -> Result<Cookie> {
        Ok(Cookie::new(
            self.cookie_name(nonce)?,
            nonce,
            self.cookie_domain(host),
            self.flags,
            expiry_after(self.clock.now(), CSRF_COOKIE_LIFETIME)?,
        ))
    }

    /// Expire the CSRF cookie called `name`.
    pub fn clear(&self, host: &str, name: &str) -> Cookie {
        Cookie::new(
            name,
            "",
            self.cookie_domain(host),
            self.flags,
            expired_before(self.clock.now(), CLEAR_BACKDATE),
        )
    }

    /// The CSRF cookie value matching `state`, if the request carries one.
    pub fn find<'r>(&self, req: &'r ForwardedRequest, state: &str) -> Option<&'r str> {
        let name = self.cookie_name(state).ok()?;
        let found = req.cookie(&name);
        if found.is_none() {
            debug!(cookie = %name, "missing CSRF cookie");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::CookieScope;

    const NONCE: &str = "0123456789abcdef0123456789abcdef";

    fn cookies(auth_host: Option<&str>) -> CsrfCookies {
        CsrfCookies::new(
            "_forward_auth_csrf",
            CookieFlags::default(),
            ScopeMatcher::new(vec![CookieScope::new("example.com")]),
            auth_host.map(str::to_string),
            Arc::new(ManualClock::at_unix(1_700_000_000)),
        )
    }

    #[test]
    fn nonce_is_32_hex_chars() {
        let a = generate_nonce().unwrap();
        let b = generate_nonce().unwrap();
        assert_eq!(a.len(), NONCE_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn state_length_check() {
        assert!(validate_state("").is_err());
        assert!(validate_state(&format!("{NONCE}:")).is_err());
        assert!(validate_state(&format!("{NONCE}:g")).is_ok());
        let state = format!("{NONCE}:google:/");
        assert_eq!(state.len(), 41);
        assert!(validate_state(&state).is_ok());
    }

    #[test]
    fn state_and_cookie_round_trip() {
        let csrf = cookies(None);
        let state = issue_state("https://app.example.com/x", "google", NONCE);
        let cookie = csrf.issue("app.example.com", NONCE).unwrap();

        assert_eq!(cookie.name, "_forward_auth_csrf_012345");
        assert_eq!(cookie.value, NONCE);
        assert_eq!(cookie.expires_unix(), 1_700_000_000 + 3_600);

        let login = validate_csrf_cookie(&cookie.value, &state).unwrap();
        assert_eq!(login.provider, "google");
        assert_eq!(login.return_url, "https://app.example.com/x");
    }

    #[test]
    fn extracts_short_return_url() {
        let login = validate_csrf_cookie(NONCE, &format!("{NONCE}:google:/")).unwrap();
        assert_eq!(
            login,
            LoginState {
                provider: "google".to_string(),
                return_url: "/".to_string(),
            }
        );
    }

    #[test]
    fn one_changed_nonce_char_is_rejected() {
        let state = issue_state("/", "google", NONCE);
        let other = "1123456789abcdef0123456789abcdef";
        assert!(validate_csrf_cookie(other, &state).is_err());
        assert!(validate_csrf_cookie(NONCE, &issue_state("/", "google", other)).is_err());
    }

    #[test]
    fn malformed_cookie_or_state() {
        assert!(validate_csrf_cookie("short", &issue_state("/", "g", NONCE)).is_err());
        assert!(validate_csrf_cookie(NONCE, NONCE).is_err());
        assert!(matches!(
            validate_csrf_cookie(NONCE, &format!("{NONCE}:google")),
            Err(Error::Format(_))
        ));
        assert!(validate_csrf_cookie(NONCE, &format!("{NONCE}Xgoogle:/")).is_err());
    }

    #[test]
    fn return_url_may_contain_colons() {
        let state = issue_state("https://app.example.com:8443/a", "oidc", NONCE);
        let login = validate_csrf_cookie(NONCE, &state).unwrap();
        assert_eq!(login.provider, "oidc");
        assert_eq!(login.return_url, "https://app.example.com:8443/a");
    }

    #[test]
    fn auth_domain_requires_same_scope() {
        let csrf = cookies(Some("auth.example.com"));
        assert_eq!(
            csrf.use_auth_domain("app.example.com:443"),
            Some("example.com".to_string())
        );
        assert_eq!(csrf.use_auth_domain("app.example.org"), None);
        assert_eq!(csrf.cookie_domain("app.example.org:8080"), "app.example.org");

        let unscoped_auth = cookies(Some("login.other.org"));
        assert_eq!(unscoped_auth.use_auth_domain("app.example.com"), None);
        assert_eq!(unscoped_auth.cookie_domain("app.example.com"), "app.example.com");

        assert_eq!(cookies(None).use_auth_domain("app.example.com"), None);
    }

    #[test]
    fn find_uses_state_prefix() {
        let csrf = cookies(None);
        let state = issue_state("/", "google", NONCE);
        let req = ForwardedRequest::new("app.example.com", "https", "/_oauth")
            .with_cookie("_forward_auth_csrf_012345", NONCE);
        assert_eq!(csrf.find(&req, &state), Some(NONCE));

        let bare = ForwardedRequest::new("app.example.com", "https", "/_oauth");
        assert_eq!(csrf.find(&bare, &state), None);
        assert_eq!(csrf.find(&req, "abc"), None);
    }

    #[test]
    fn clear_keeps_name_and_backdates() {
        let csrf = cookies(Some("auth.example.com"));
        let cookie = csrf.clear("app.example.com", "_forward_auth_csrf_012345");
        assert_eq!(cookie.name, "_forward_auth_csrf_012345");
        assert!(cookie.value.is_empty());
        assert_eq!(cookie.domain, "example.com");
        assert_eq!(cookie.expires_unix(), 1_700_000_000 - 3_600);
    }

    #[test]
    fn short_nonce_cannot_name_a_cookie() {
        assert!(cookies(None).issue("app.example.com", "abc").is_err());
    }
}
