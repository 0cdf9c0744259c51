//! Gateway configuration loaded from TOML.
//!
//! ```toml
//! secret = "change-me"
//! cookie_domains = ["example.com"]
//! auth_host = "auth.example.com"
//! whitelist = "alice@example.com,bob@example.com"
//!
//! [rules.admin]
//! allowed_roles = ["admin"]
//! ```

use crate::cookie::{CookieFlags, SameSite};
use crate::domain::{CookieScope, ScopeMatcher};
use crate::policy::{AuthorizationPolicy, Rule};
use crate::{Error, Result};

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Everything the gateway core needs from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared MAC secret; its bytes are used verbatim.
    pub secret: String,

    /// Auth cookie name.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Prefix of CSRF cookie names.
    #[serde(default = "default_csrf_cookie_name")]
    pub csrf_cookie_name: String,

    /// Auth cookie lifetime in seconds.
    #[serde(default = "default_lifetime_seconds")]
    pub lifetime_seconds: u64,

    /// Drop the `Secure` attribute (plain-HTTP deployments).
    #[serde(default)]
    pub insecure_cookie: bool,

    /// SameSite attribute for every cookie; omitted when unset.
    #[serde(default)]
    pub same_site: Option<SameSite>,

    /// Cookie scopes in match order. A list or a comma separated string.
    #[serde(default, deserialize_with = "string_list")]
    pub cookie_domains: Vec<String>,

    /// Central login host.
    #[serde(default)]
    pub auth_host: String,

    /// OAuth callback path.
    #[serde(default = "default_path")]
    pub path: String,

    /// Global rule.
    #[serde(flatten)]
    pub global: Rule,

    /// Named rule overrides.
    #[serde(default)]
    pub rules: BTreeMap<String, Rule>,
}

fn default_cookie_name() -> String {
    "_forward_auth".to_string()
}

fn default_csrf_cookie_name() -> String {
    "_forward_auth_csrf".to_string()
}

fn default_lifetime_seconds() -> u64 {
    43_200
}

/// Longest accepted cookie lifetime: 100 years.
const MAX_LIFETIME_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

fn default_path() -> String {
    "/_oauth".to_string()
}

impl AuthConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: AuthConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check the settings the protocols depend on.
    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(Error::Config("secret must not be empty".to_string()));
        }
        if self.lifetime_seconds == 0 {
            return Err(Error::Config("lifetime_seconds must be positive".to_string()));
        }
        if self.lifetime_seconds > MAX_LIFETIME_SECONDS {
            return Err(Error::Config(format!(
                "lifetime_seconds must not exceed {MAX_LIFETIME_SECONDS}"
            )));
        }
        if self.cookie_name.is_empty() || self.csrf_cookie_name.is_empty() {
            return Err(Error::Config("cookie names must not be empty".to_string()));
        }
        if self.cookie_name == self.csrf_cookie_name {
            return Err(Error::Config(
                "csrf_cookie_name must differ from cookie_name".to_string(),
            ));
        }
        if !self.path.starts_with('/') {
            return Err(Error::Config(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        Ok(())
    }

    /// Auth cookie lifetime.
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_seconds)
    }

    /// Flags applied to every cookie.
    pub fn cookie_flags(&self) -> CookieFlags {
        CookieFlags {
            secure: !self.insecure_cookie,
            same_site: self.same_site,
        }
    }

    /// Cookie scopes in match order.
    pub fn scope_matcher(&self) -> ScopeMatcher {
        ScopeMatcher::new(self.cookie_domains.iter().map(CookieScope::new).collect())
    }

    /// Central login host, if configured.
    pub fn auth_host(&self) -> Option<String> {
        (!self.auth_host.is_empty()).then(|| self.auth_host.clone())
    }

    /// The authorization policy.
    pub fn policy(&self) -> AuthorizationPolicy {
        AuthorizationPolicy::new(self.global.clone(), self.rules.clone())
    }
}

/// Accept either a TOML array of strings or a comma separated string.
pub(crate) fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Csv(s) => s.split(',').map(str::to_string).collect(),
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
