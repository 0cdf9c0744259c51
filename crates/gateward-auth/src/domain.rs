//! Cookie scope resolution.
//!
//! A request host is mapped to the domain its cookies are issued for. The
//! configured scopes are tried in order; when none matches, the port-stripped
//! request host itself is used, so a cookie never spans unrelated hosts.

use std::fmt;

/// A configured cookie domain. Covers the domain itself and every subdomain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieScope {
    domain: String,
    sub_domain: String,
}

impl CookieScope {
    /// Build a scope for `domain` (e.g. `example.com`).
    pub fn new(domain: impl Into<String>) -> Self {
        let domain = domain.into().trim().trim_start_matches('.').to_string();
        let sub_domain = format!(".{domain}");
        Self { domain, sub_domain }
    }

    /// The canonical domain, used as the cookie `Domain` attribute.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// True if `host` (port is ignored) is this domain or one of its subdomains.
    ///
    /// Comparison is ASCII case-insensitive. The suffix must include the
    /// leading dot, so `evilexample.com` never matches `example.com`.
    pub fn matches(&self, host: &str) -> bool {
        let host = strip_port(host);

        if host.eq_ignore_ascii_case(&self.domain) {
            return true;
        }

        let n = self.sub_domain.len();
        host.len() >= n
            && host.is_char_boundary(host.len() - n)
            && host[host.len() - n..].eq_ignore_ascii_case(&self.sub_domain)
    }
}

impl fmt::Display for CookieScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.domain)
    }
}

/// Outcome of resolving a host against the configured scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    /// True if a configured scope matched.
    pub matched: bool,
    /// The scope's canonical domain, or the port-stripped host on fallback.
    pub domain: String,
}

/// Ordered list of cookie scopes. First match wins.
#[derive(Debug, Clone, Default)]
pub struct ScopeMatcher {
    scopes: Vec<CookieScope>,
}

impl ScopeMatcher {
    /// Build a matcher over `scopes`, keeping their order.
    pub fn new(scopes: Vec<CookieScope>) -> Self {
        Self { scopes }
    }

    /// Configured scopes in evaluation order.
    pub fn scopes(&self) -> &[CookieScope] {
        &self.scopes
    }

    /// Resolve the cookie domain for `host`.
    pub fn resolve(&self, host: &str) -> ResolvedScope {
        let host = strip_port(host);

        match self.scopes.iter().find(|s| s.matches(host)) {
            Some(scope) => ResolvedScope {
                matched: true,
                domain: scope.domain().to_string(),
            },
            None => ResolvedScope {
                matched: false,
                domain: host.to_string(),
            },
        }
    }

    /// The cookie domain for `host`. Shorthand for `resolve(host).domain`.
    pub fn cookie_domain(&self, host: &str) -> String {
        self.resolve(host).domain
    }
}

/// Drop a `:port` suffix, if any.
pub(crate) fn strip_port(host: &str) -> &str {
    let host = host.trim();
    match host.split_once(':') {
        Some((h, _port)) => h,
        None => host,
    }
}
