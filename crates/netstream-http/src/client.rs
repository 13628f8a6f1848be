use std::sync::Arc;

use netstream::{
    Backend, BackendError, BackendResult, ConnectRequest, Connection, Mode, scheme_of,
};
use reqwest::{Certificate, Client};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;
use url::Url;

use crate::{
    blocking::Blocking,
    connection::HttpConnection,
    error::{HttpError, HttpResult},
    types::{HttpOptions, RequestSettings},
};

/// Schemes served by [`HttpBackend`].
pub const PROTOCOLS: &[&str] = &["http", "https"];

const RUNTIME_THREAD_NAME: &str = "netstream-http";

/// [`Backend`] for `http://` and `https://` built on `reqwest`.
///
/// Owns a small tokio runtime that drives every request; connection calls
/// block the calling thread. Do not call them from inside another tokio
/// runtime.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    runtime: Arc<Runtime>,
    options: HttpOptions,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns [`HttpError::Runtime`] if the I/O runtime cannot be started.
    pub fn new() -> HttpResult<Self> {
        Self::with_options(HttpOptions::default())
    }

    /// # Errors
    ///
    /// Returns [`HttpError::Runtime`] if the I/O runtime cannot be started.
    pub fn with_options(options: HttpOptions) -> HttpResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(RUNTIME_THREAD_NAME)
            .enable_all()
            .build()
            .map_err(|e| HttpError::Runtime(e.to_string()))?;
        Ok(Self {
            runtime: Arc::new(runtime),
            options,
        })
    }

    pub fn options(&self) -> &HttpOptions {
        &self.options
    }

    fn client(&self, settings: &RequestSettings) -> HttpResult<Client> {
        let _guard = self.runtime.enter();
        let mut builder = Client::builder()
            .use_rustls_tls()
            .connect_timeout(self.options.connect_timeout)
            .pool_max_idle_per_host(self.options.pool_max_idle_per_host)
            .danger_accept_invalid_certs(!settings.tls_verify);

        if let Some(user_agent) = &settings.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if let Some(path) = &settings.ca_file {
            builder = builder.add_root_certificate(load_ca(path)?);
        }

        builder.build().map_err(HttpError::from)
    }
}

fn load_ca(path: &str) -> HttpResult<Certificate> {
    let ca_error = |reason: String| HttpError::CaFile {
        path: path.to_string(),
        reason,
    };
    let pem = std::fs::read(path).map_err(|e| ca_error(e.to_string()))?;
    Certificate::from_pem(&pem).map_err(|e| ca_error(e.to_string()))
}

impl Backend for HttpBackend {
    fn protocols(&self) -> &[&str] {
        PROTOCOLS
    }

    fn connect(&self, request: ConnectRequest<'_>) -> BackendResult<Box<dyn Connection>> {
        let known = scheme_of(request.url)
            .is_some_and(|scheme| PROTOCOLS.iter().any(|p| p.eq_ignore_ascii_case(scheme)));
        if !known {
            return Err(BackendError::ProtocolNotFound);
        }
        if request.mode == Mode::Write {
            debug!(url = request.url, "http backend is read-only");
            return Err(BackendError::Unsupported);
        }

        let url = Url::parse(request.url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        let settings = RequestSettings::take_from(request.options)?;
        let client = self.client(&settings)?;
        let headers = settings.header_map()?;
        let blocking = Blocking::new(
            Arc::clone(&self.runtime),
            request.interrupt,
            self.options.interrupt_poll,
        );

        let connection = HttpConnection::open(client, url, headers, settings.icy, blocking)?;
        Ok(Box::new(connection))
    }
}
