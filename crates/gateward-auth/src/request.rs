//! The slice of an inbound request the gateway looks at.

use tracing::debug;

/// Forwarded request as seen by the gateway: the proxy's `Host`,
/// `X-Forwarded-Proto`, the original URI and the cookie jar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedRequest {
    /// Host header, possibly with a port.
    pub host: String,
    /// `X-Forwarded-Proto` (`http` / `https`).
    pub proto: String,
    /// Original request URI (path plus optional query).
    pub uri: String,
    cookies: Vec<(String, String)>,
}

impl ForwardedRequest {
    /// A request without cookies.
    pub fn new(host: impl Into<String>, proto: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            proto: proto.into(),
            uri: uri.into(),
            cookies: Vec::new(),
        }
    }

    /// Add the cookies of a raw `Cookie:` header (`a=1; b=2`).
    ///
    /// Malformed pairs are logged and skipped.
    #[must_use]
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        for parsed in ::cookie::Cookie::split_parse(header) {
            match parsed {
                Ok(c) => self.cookies.push((c.name().to_string(), c.value().to_string())),
                Err(e) => debug!("ignoring malformed cookie: {e}"),
            }
        }
        self
    }

    /// Add a single cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Value of the first cookie called `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path component of the URI, without the query string.
    pub fn path(&self) -> &str {
        match self.uri.split_once('?') {
            Some((path, _query)) => path,
            None => &self.uri,
        }
    }

    /// `proto://host`.
    pub fn redirect_base(&self) -> String {
        format!("{}://{}", self.proto, self.host)
    }

    /// The URL to send the user back to after login.
    pub fn return_url(&self) -> String {
        format!("{}{}", self.redirect_base(), self.path())
    }
}
