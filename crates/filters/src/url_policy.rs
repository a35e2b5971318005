//! URL policy and the `url` filter.

use crate::FilterError;
use serde::{Deserialize, Serialize};
use url::Url;

/// URL policy shared by every `url` filter of a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPolicy {
    /// Schemes accepted by the filter, compared case-insensitively.
    #[serde(default = "default_schemes")]
    pub allowed_schemes: Vec<String>,
    /// Hosts that are always rejected. `*.example.com` also matches
    /// `example.com` itself and every subdomain.
    #[serde(default)]
    pub disallowed_hosts: Vec<String>,
    /// When non-empty, only these hosts are accepted (same pattern syntax).
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    /// Accept scheme-less `//host/path` URLs.
    #[serde(default = "default_true")]
    pub allow_protocol_relative: bool,
}

fn default_schemes() -> Vec<String> {
    vec!["http".into(), "https".into()]
}

fn default_true() -> bool {
    true
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: default_schemes(),
            disallowed_hosts: Vec::new(),
            allowed_hosts: Vec::new(),
            allow_protocol_relative: true,
        }
    }
}

impl UrlPolicy {
    fn allows_scheme(&self, scheme: &str) -> bool {
        self.allowed_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }

    fn allows_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if self.disallowed_hosts.iter().any(|p| host_matches(p, &host)) {
            return false;
        }
        self.allowed_hosts.is_empty() || self.allowed_hosts.iter().any(|p| host_matches(p, &host))
    }

    /// Validate and sanitize a URL.
    ///
    /// The returned value is the trimmed input with the scheme lowercased and
    /// every byte outside the URL-safe set percent-encoded; it is not the
    /// `url` crate's normalized serialization.
    pub fn filter(&self, value: &str) -> Result<String, FilterError> {
        let trimmed = value.trim();
        let invalid = || FilterError::Invalid { filter: "url" };
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let protocol_relative = trimmed.starts_with("//");
        let parsed = if protocol_relative {
            if !self.allow_protocol_relative {
                return Err(invalid());
            }
            Url::parse(&format!("https:{trimmed}"))
        } else {
            Url::parse(trimmed)
        }
        .map_err(|_| invalid())?;

        if !protocol_relative && !self.allows_scheme(parsed.scheme()) {
            return Err(FilterError::DisallowedScheme(parsed.scheme().to_string()));
        }
        if let Some(host) = parsed.host_str()
            && !self.allows_host(host)
        {
            return Err(FilterError::DisallowedHost(host.to_string()));
        }

        let scheme_len = if protocol_relative {
            0
        } else {
            trimmed.find(':').unwrap_or(0)
        };
        Ok(sanitize(trimmed, scheme_len))
    }
}

fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(domain) => {
            host == domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|sub| sub.ends_with('.'))
        }
        None => host == pattern,
    }
}

/// Bytes kept as-is: `!`, `#`-`&`, `*`-`;`, `=`, `?`-`Z`, `_`, `a`-`z`, `~`.
fn is_url_safe(b: u8) -> bool {
    matches!(b, b'!' | b'#'..=b'&' | b'*'..=b';' | b'=' | b'?'..=b'Z' | b'_' | b'a'..=b'z' | b'~')
}

fn sanitize(url: &str, scheme_len: usize) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let bytes = url.as_bytes();
    let mut out = String::with_capacity(url.len());
    for (i, &b) in bytes.iter().enumerate() {
        let valid_escape = b == b'%'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
            && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
        if i < scheme_len {
            out.push(char::from(b.to_ascii_lowercase()));
        } else if is_url_safe(b) && (b != b'%' || valid_escape) {
            out.push(char::from(b));
        } else {
            out.push('%');
            out.push(char::from(HEX[usize::from(b >> 4)]));
            out.push(char::from(HEX[usize::from(b & 0xF)]));
        }
    }
    out
}
