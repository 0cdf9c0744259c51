//! Request-level entry points wiring the protocols together.

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::cookie::Cookie;
use crate::csrf::{self, CsrfCookies, LoginState};
use crate::identity::{Identity, IdentityCache};
use crate::policy::AuthorizationPolicy;
use crate::request::ForwardedRequest;
use crate::session::SessionCookies;
use crate::signature::Signer;
use crate::{Error, Result};

use std::sync::Arc;

/// Forward-auth core for one configuration.
///
/// Cheap to clone; clones share the identity cache.
#[derive(Debug, Clone)]
pub struct Gateway {
    sessions: SessionCookies,
    csrf: CsrfCookies,
    policy: AuthorizationPolicy,
    auth_host: Option<String>,
    path: String,
}

impl Gateway {
    /// Build from configuration with the system clock.
    pub fn from_config(cfg: &AuthConfig) -> Result<Self> {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    /// Build from configuration with a custom clock.
    pub fn with_clock(cfg: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        cfg.validate()?;

        let scopes = cfg.scope_matcher();
        let flags = cfg.cookie_flags();
        let signer = Signer::new(cfg.secret.as_bytes())?;
        let cache = IdentityCache::new(clock.clone());

        Ok(Self {
            sessions: SessionCookies::new(
                &cfg.cookie_name,
                cfg.lifetime(),
                flags,
                scopes.clone(),
                signer,
                cache,
            ),
            csrf: CsrfCookies::new(&cfg.csrf_cookie_name, flags, scopes, cfg.auth_host(), clock),
            policy: cfg.policy(),
            auth_host: cfg.auth_host(),
            path: cfg.path.clone(),
        })
    }

    /// The identity cache.
    pub fn cache(&self) -> &IdentityCache {
        self.sessions.cache()
    }

    /// Auth cookie name.
    pub fn cookie_name(&self) -> &str {
        self.sessions.name()
    }

    /// Issue the auth cookie after a successful login.
    pub fn make_cookie(&self, req: &ForwardedRequest, identity: &Identity) -> Result<Cookie> {
        self.sessions.issue(&req.host, identity)
    }

    /// Validate the request's auth cookie.
    pub fn validate_request(&self, req: &ForwardedRequest) -> Result<Identity> {
        let value = req
            .cookie(self.sessions.name())
            .ok_or_else(|| Error::Format("missing auth cookie".to_string()))?;
        self.validate_cookie(req, value)
    }

    /// Validate an auth cookie value presented on this request.
    pub fn validate_cookie(&self, req: &ForwardedRequest, value: &str) -> Result<Identity> {
        self.sessions.validate(&req.host, value)
    }

    /// Clear the auth cookie (logout).
    pub fn clear_cookie(&self, req: &ForwardedRequest) -> Cookie {
        self.sessions.clear(&req.host)
    }

    /// Build the OAuth `state` returning to the current request's URL.
    pub fn make_state(&self, req: &ForwardedRequest, provider: &str, nonce: &str) -> String {
        csrf::issue_state(&req.return_url(), provider, nonce)
    }

    /// Basic shape check of a returned `state`.
    pub fn validate_state(&self, state: &str) -> Result<()> {
        csrf::validate_state(state)
    }

    /// CSRF cookie for a login starting on this request.
    pub fn make_csrf_cookie(&self, req: &ForwardedRequest, nonce: &str) -> Result<Cookie> {
        self.csrf.issue(&req.host, nonce)
    }

    /// Expire the CSRF cookie named `name`.
    pub fn clear_csrf_cookie(&self, req: &ForwardedRequest, name: &str) -> Cookie {
        self.csrf.clear(&req.host, name)
    }

    /// The request's CSRF cookie value for `state`.
    pub fn find_csrf_cookie<'r>(&self, req: &'r ForwardedRequest, state: &str) -> Option<&'r str> {
        self.csrf.find(req, state)
    }

    /// Check a CSRF cookie value against `state`.
    pub fn validate_csrf_cookie(&self, cookie_value: &str, state: &str) -> Result<LoginState> {
        csrf::validate_csrf_cookie(cookie_value, state)
    }

    /// Shared cookie domain with the auth host, if any (see [`CsrfCookies::use_auth_domain`]).
    pub fn use_auth_domain(&self, req: &ForwardedRequest) -> Option<String> {
        self.csrf.use_auth_domain(&req.host)
    }

    /// OAuth redirect URI: the auth host when it shares the request's scope,
    /// otherwise the request's own host.
    pub fn redirect_uri(&self, req: &ForwardedRequest) -> String {
        match (&self.auth_host, self.use_auth_domain(req)) {
            (Some(auth_host), Some(_)) => format!("{}://{auth_host}{}", req.proto, self.path),
            _ => format!("{}{}", req.redirect_base(), self.path),
        }
    }

    /// Run the authorization policy.
    pub fn authorize(&self, identity: &Identity, rule_name: &str) -> bool {
        self.policy.authorize(identity, rule_name)
    }
}
