use std::time::Duration;

use netstream::{ConnectOptions, keys};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{HttpError, HttpResult};

#[derive(Clone, Debug)]
pub struct HttpOptions {
    /// Timeout for establishing the TCP/TLS connection. The body itself is
    /// never timed out: streams can run for arbitrary time.
    pub connect_timeout: Duration,
    /// How often a blocked call re-checks the interrupt hook.
    pub interrupt_poll: Duration,
    /// Max idle connections per host. Set to 0 to disable pooling and reduce memory.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            interrupt_poll: Duration::from_millis(50),
            pool_max_idle_per_host: 0,
        }
    }
}

impl HttpOptions {
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_interrupt_poll(mut self, every: Duration) -> Self {
        self.interrupt_poll = every;
        self
    }
}

/// Request settings derived from the connect options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestSettings {
    pub user_agent: Option<String>,
    pub cookies: Option<String>,
    pub headers: Vec<(String, String)>,
    pub tls_verify: bool,
    pub ca_file: Option<String>,
    pub icy: bool,
}

impl RequestSettings {
    /// Takes every option this backend understands out of `options`.
    pub fn take_from(options: &mut ConnectOptions) -> HttpResult<Self> {
        let headers = match options.take(keys::HEADERS) {
            Some(block) => parse_header_block(&block)?,
            None => Vec::new(),
        };
        Ok(Self {
            user_agent: options.take(keys::USER_AGENT),
            cookies: options.take(keys::COOKIES),
            headers,
            tls_verify: options
                .take(keys::TLS_VERIFY)
                .is_none_or(|value| parse_flag(&value)),
            ca_file: options.take(keys::CA_FILE),
            icy: options.take(keys::ICY).is_some_and(|value| parse_flag(&value)),
        })
    }

    pub fn header_map(&self) -> HttpResult<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidHeader(value.clone()))?;
            map.append(name, value);
        }
        if let Some(cookies) = &self.cookies {
            let value = HeaderValue::from_str(cookies)
                .map_err(|_| HttpError::InvalidHeader(cookies.clone()))?;
            map.insert(reqwest::header::COOKIE, value);
        }
        if self.icy {
            map.insert("icy-metadata", HeaderValue::from_static("1"));
        }
        Ok(map)
    }
}

/// Splits a CRLF separated header block into `(name, value)` pairs.
pub fn parse_header_block(block: &str) -> HttpResult<Vec<(String, String)>> {
    block
        .split("\r\n")
        .flat_map(|chunk| chunk.split('\n'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| HttpError::InvalidHeader(line.to_string()))
        })
        .collect()
}

/// Parses `"0"`/`"1"` style boolean options.
pub fn parse_flag(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false" | "no")
}
