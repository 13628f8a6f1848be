use tokio_util::sync::CancellationToken;

/// Caller-level network configuration.
///
/// Passed by value to [`crate::NetStream::open`]; nothing is read from
/// process-wide state.
#[derive(Clone, Debug)]
pub struct NetConfig {
    /// User agent sent by protocols that support one. Empty means unset.
    pub user_agent: Option<String>,
    /// Whether cookies are looked up at all.
    pub cookies_enabled: bool,
    /// Cookie file handed to the cookie provider.
    pub cookies_file: Option<String>,
    /// Verify TLS peer certificates.
    pub tls_verify: bool,
    /// CA bundle used for TLS verification.
    pub tls_ca_file: Option<String>,
    /// Value of the `Referer:` header line.
    pub referrer: Option<String>,
    /// Raw header lines (`"Name: value"`), sent in order.
    pub http_header_fields: Vec<String>,
    /// Raw backend options applied after every computed default.
    pub backend_options: Vec<(String, String)>,
    /// Cancellation token consulted during blocking operations.
    pub cancel: Option<CancellationToken>,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            cookies_enabled: false,
            cookies_file: None,
            tls_verify: false,
            tls_ca_file: None,
            referrer: None,
            http_header_fields: Vec::new(),
            backend_options: Vec::new(),
            cancel: None,
        }
    }
}

impl NetConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Enable cookies, optionally reading them from `file`.
    #[must_use]
    pub fn with_cookies(mut self, file: Option<String>) -> Self {
        self.cookies_enabled = true;
        self.cookies_file = file;
        self
    }

    #[must_use]
    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    #[must_use]
    pub fn with_tls_ca_file<S: Into<String>>(mut self, path: S) -> Self {
        self.tls_ca_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_referrer<S: Into<String>>(mut self, referrer: S) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Append a raw header line.
    #[must_use]
    pub fn with_header_field<S: Into<String>>(mut self, line: S) -> Self {
        self.http_header_fields.push(line.into());
        self
    }

    /// Append a raw backend option. Later entries win over earlier ones.
    #[must_use]
    pub fn with_backend_option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.backend_options.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetConfig::default();

        assert!(config.user_agent.is_none());
        assert!(!config.cookies_enabled);
        assert!(!config.tls_verify);
        assert!(config.http_header_fields.is_empty());
        assert!(config.backend_options.is_empty());
        assert!(config.cancel.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let cancel = CancellationToken::new();
        let config = NetConfig::new()
            .with_user_agent("agent/1.0")
            .with_cookies(Some("/tmp/cookies.txt".into()))
            .with_tls_verify(true)
            .with_tls_ca_file("/etc/ssl/ca.pem")
            .with_referrer("http://ref")
            .with_header_field("A: 1")
            .with_header_field("B: 2")
            .with_backend_option("timeout", "5")
            .with_cancel(cancel.clone());

        assert_eq!(config.user_agent.as_deref(), Some("agent/1.0"));
        assert!(config.cookies_enabled);
        assert_eq!(config.cookies_file.as_deref(), Some("/tmp/cookies.txt"));
        assert!(config.tls_verify);
        assert_eq!(config.http_header_fields, vec!["A: 1", "B: 2"]);
        assert_eq!(
            config.backend_options,
            vec![("timeout".to_string(), "5".to_string())]
        );
        assert!(config.cancel.is_some());
    }

    #[test]
    fn test_clone_shares_cancel_token() {
        let cancel = CancellationToken::new();
        let config = NetConfig::new().with_cancel(cancel.clone());
        let cloned = config.clone();

        cancel.cancel();

        assert!(cloned.cancel.as_ref().is_some_and(CancellationToken::is_cancelled));
    }
}
