//! Signed auth cookie.
//!
//! Wire format: `<base64 mac>|<expiry unix seconds>|<identity id>`. Nothing
//! about issued cookies is stored; every request re-derives the MAC.

use crate::clock::unix_seconds;
use crate::cookie::{Cookie, CookieFlags, expired_before, expiry_after};
use crate::domain::ScopeMatcher;
use crate::identity::{Identity, IdentityCache};
use crate::signature::{Signer, decode_mac};
use crate::{Error, Result};

use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// How far in the past clearing cookies expire.
pub(crate) const CLEAR_BACKDATE: Duration = Duration::from_secs(60 * 60);

/// Issues, validates and clears the auth cookie.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    lifetime: Duration,
    flags: CookieFlags,
    scopes: ScopeMatcher,
    signer: Signer,
    cache: IdentityCache,
}

impl SessionCookies {
    /// Assemble from its collaborators. Time is read from the cache's clock.
    pub fn new(
        name: impl Into<String>,
        lifetime: Duration,
        flags: CookieFlags,
        scopes: ScopeMatcher,
        signer: Signer,
        cache: IdentityCache,
    ) -> Self {
        Self {
            name: name.into(),
            lifetime,
            flags,
            scopes,
            signer,
            cache,
        }
    }

    /// Cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity cache backing validation.
    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Build a fresh auth cookie for `identity` on `host`, caching the identity.
    ///
    /// Fails with [`Error::Config`] when the lifetime pushes the expiry past
    /// what a cookie date can express.
    pub fn issue(&self, host: &str, identity: &Identity) -> Result<Cookie> {
        let expires_at = expiry_after(self.cache.clock().now(), self.lifetime)?;
        self.cache.ensure(identity.clone());

        let domain = self.scopes.cookie_domain(host);
        let expires = unix_seconds(expires_at).to_string();
        let mac = self.signer.sign_encoded(&domain, &identity.id, &expires);

        Ok(Cookie::new(
            &self.name,
            format!("{mac}|{expires}|{}", identity.id),
            domain,
            self.flags,
            expires_at,
        ))
    }

    /// Check a cookie value presented on `host` and return its identity.
    ///
    /// The MAC is checked before the expiry is parsed, so a forged expiry is
    /// reported as a signature failure.
    pub fn validate(&self, host: &str, value: &str) -> Result<Identity> {
        self.check(host, value).inspect_err(|e| {
            debug!(kind = e.kind(), host, "auth cookie rejected");
        })
    }

    fn check(&self, host: &str, value: &str) -> Result<Identity> {
        let parts: Vec<&str> = value.split('|').collect();
        let [mac, expires, id] = parts.as_slice() else {
            return Err(Error::Format("invalid cookie format".to_string()));
        };

        let mac = decode_mac(mac)?;

        let id = Uuid::parse_str(id)
            .map_err(|_| Error::Format("invalid identity id".to_string()))?;

        let identity = self.cache.lookup(&id).ok_or(Error::UnknownIdentity)?;

        let domain = self.scopes.cookie_domain(host);
        if !self.signer.verify(&domain, &id, expires, &mac) {
            return Err(Error::Signature);
        }

        let expires: i64 = expires
            .parse()
            .map_err(|_| Error::Format("unable to parse cookie expiry".to_string()))?;

        if unix_seconds(self.cache.clock().now()) >= expires {
            return Err(Error::Expired);
        }

        Ok(identity)
    }

    /// A cookie that makes the browser drop the auth cookie for `host`.
    pub fn clear(&self, host: &str) -> Cookie {
        let expires = expired_before(self.cache.clock().now(), CLEAR_BACKDATE);
        Cookie::new(
            &self.name,
            "",
            self.scopes.cookie_domain(host),
            self.flags,
            expires,
        )
    }
}
