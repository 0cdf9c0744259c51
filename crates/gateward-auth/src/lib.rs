//! gateward-auth
//!
//! Stateless session cookies and a CSRF-protected OAuth login handshake for a
//! forward-authentication gateway. A reverse proxy asks the gateway about every
//! request; this crate answers "authenticated, and as whom?".
//!
//! - **Cookie scopes**: map a request host to the configured domain its cookies live on
//! - **Signed auth cookie**: `mac|expiry|identity-id`, HMAC-SHA256 bound to the scope
//! - **Identity cache**: short-lived id → profile map with a background sweep
//! - **Login CSRF**: `nonce:provider:return_url` state paired with a nonce cookie
//! - **Authorization**: email whitelist, email domains and roles, with named overrides
//!
//! ## Quick start
//! ```no_run
//! use gateward_auth::{AuthConfig, ForwardedRequest, Gateway, Identity, Uuid, generate_nonce};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = AuthConfig::from_toml_str(r#"
//!     secret = "change-me"
//!     cookie_domains = ["example.com"]
//! "#)?;
//! let gateway = Gateway::from_config(&cfg)?;
//!
//! // Login start.
//! let req = ForwardedRequest::new("app.example.com", "https", "/dashboard");
//! let nonce = generate_nonce()?;
//! let state = gateway.make_state(&req, "google", &nonce);
//! let csrf_cookie = gateway.make_csrf_cookie(&req, &nonce)?;
//! println!("Set-Cookie: {}", csrf_cookie.to_set_cookie());
//!
//! // Callback, after the provider returned `state` and a user profile.
//! let callback = ForwardedRequest::new("app.example.com", "https", "/_oauth")
//!     .with_cookie(&csrf_cookie.name, &csrf_cookie.value);
//! gateway.validate_state(&state)?;
//! let nonce_cookie = gateway.find_csrf_cookie(&callback, &state).ok_or("no csrf cookie")?;
//! let login = gateway.validate_csrf_cookie(nonce_cookie, &state)?;
//! let user = Identity::new(Uuid::new_v4(), "Alice", "alice@example.com");
//! let auth_cookie = gateway.make_cookie(&callback, &user)?;
//! println!("redirect to {}, Set-Cookie: {}", login.return_url, auth_cookie.to_set_cookie());
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod clock;
mod config;
mod cookie;
mod csrf;
mod domain;
mod error;
mod gateway;
mod identity;
mod policy;
mod request;
mod session;
mod signature;

pub use clock::{Clock, ManualClock, SystemClock, unix_seconds};
pub use config::AuthConfig;
pub use crate::cookie::{Cookie, CookieFlags, SameSite};
pub use csrf::{
    CSRF_COOKIE_LIFETIME, CsrfCookies, LoginState, MIN_STATE_LEN, NONCE_LEN, generate_nonce,
    issue_state, validate_csrf_cookie, validate_state,
};
pub use domain::{CookieScope, ResolvedScope, ScopeMatcher};
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use identity::{DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL, Identity, IdentityCache};
pub use policy::{AuthorizationPolicy, EffectiveRule, Rule};
pub use request::ForwardedRequest;
pub use session::SessionCookies;
pub use signature::{MAC_LEN, Signer, decode_mac};
pub use uuid::Uuid;
