#![forbid(unsafe_code)]

//! Connect-time option assembly.
//!
//! [`ConnectOptions`] is the flat key/value bag a backend receives. It is
//! built once per open attempt from a [`NetConfig`]; raw caller overrides
//! are applied last and win over every computed default.

use tracing::trace;

use crate::{backend::Mode, config::NetConfig};

/// Well-known option keys.
pub mod keys {
    pub const USER_AGENT: &str = "user-agent";
    pub const COOKIES: &str = "cookies";
    pub const TLS_VERIFY: &str = "tls_verify";
    pub const CA_FILE: &str = "ca_file";
    pub const HEADERS: &str = "headers";
    pub const ICY: &str = "icy";
}

/// Line terminator used in the composed header block.
pub const HEADER_LINE_END: &str = "\r\n";

/// Materializes a cookie header from a cookie file.
#[cfg_attr(test, unimock::unimock(api = CookieProviderMock))]
pub trait CookieProvider: Send + Sync {
    /// Cookie header value for `file`, or `None` if there is nothing to send.
    fn cookie_header(&self, file: Option<&str>) -> Option<String>;
}

/// Provider that never yields cookies.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCookies;

impl CookieProvider for NoCookies {
    fn cookie_header(&self, _file: Option<&str>) -> Option<String> {
        None
    }
}

/// Ordered option dictionary. Setting an existing key replaces its value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    entries: Vec<(String, String)>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles the options for one open attempt.
    pub fn build(config: &NetConfig, mode: Mode, cookies: &dyn CookieProvider) -> Self {
        let mut options = Self::new();

        if let Some(user_agent) = config.user_agent.as_deref().filter(|ua| !ua.is_empty()) {
            options.set(keys::USER_AGENT, user_agent);
        }

        if config.cookies_enabled {
            let file = config.cookies_file.as_deref().filter(|f| !f.is_empty());
            if let Some(cookie) = cookies.cookie_header(file).filter(|c| !c.is_empty()) {
                options.set(keys::COOKIES, cookie);
            }
        }

        options.set(keys::TLS_VERIFY, if config.tls_verify { "1" } else { "0" });
        if let Some(ca_file) = &config.tls_ca_file {
            options.set(keys::CA_FILE, ca_file.as_str());
        }

        let headers = compose_headers(config.referrer.as_deref(), &config.http_header_fields);
        if !headers.is_empty() {
            options.set(keys::HEADERS, headers);
        }

        if mode == Mode::Read {
            options.set(keys::ICY, "1");
        }

        for (key, value) in &config.backend_options {
            trace!(key, value, "applying backend option override");
            options.set(key.as_str(), value.as_str());
        }

        options
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Removes `key`, returning its value. Backends call this for every
    /// option they consume.
    pub fn take(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Referrer line followed by each raw header line, uniformly terminated.
pub fn compose_headers(referrer: Option<&str>, fields: &[String]) -> String {
    let mut block = String::new();
    if let Some(referrer) = referrer {
        block.push_str("Referer: ");
        block.push_str(referrer);
        block.push_str(HEADER_LINE_END);
    }
    for field in fields {
        block.push_str(field);
        block.push_str(HEADER_LINE_END);
    }
    block
}
