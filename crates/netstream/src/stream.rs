#![forbid(unsafe_code)]

use std::{
    io::{self, Read, Seek, SeekFrom, Write},
    sync::Arc,
};

use tracing::{debug, trace, warn};

use crate::{
    backend::{Backend, ConnectRequest, Connection, Mode, scheme_of},
    config::NetConfig,
    control::{ControlReply, ControlRequest, ControlResult, ReconnectKind},
    error::{BackendError, Op, StreamError, StreamResult},
    interrupt::Interrupt,
    metadata::IcyDiffer,
    normalize::{DemuxerHint, Normalized, normalize, supports_protocol},
    options::{ConnectOptions, CookieProvider, NoCookies},
};

/// Opens [`NetStream`]s against one backend with one configuration.
#[derive(Clone)]
pub struct Opener {
    backend: Arc<dyn Backend>,
    config: NetConfig,
    cookies: Arc<dyn CookieProvider>,
}

impl Opener {
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            config: NetConfig::default(),
            cookies: Arc::new(NoCookies),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: NetConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_cookies<C: CookieProvider + 'static>(mut self, cookies: C) -> Self {
        self.cookies = Arc::new(cookies);
        self
    }

    /// Normalizes `url` and connects to it.
    ///
    /// # Errors
    ///
    /// [`StreamError::Input`] for an empty URL (no backend call is made),
    /// [`StreamError::ProtocolUnavailable`] when the backend has no
    /// implementation for the scheme, [`StreamError::Interrupted`] when the
    /// cancellation signal fired, [`StreamError::Connect`] otherwise.
    pub fn open(&self, url: &str, mode: Mode) -> StreamResult<Opened> {
        let url = match normalize(url)? {
            Normalized::Open(url) => url,
            Normalized::Delegate(hint) => return Ok(Opened::Delegate(hint)),
        };

        let mut stream = NetStream {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            cookies: Arc::clone(&self.cookies),
            url,
            mode,
            conn: None,
            seekable: false,
            mime_type: None,
            demuxer: None,
            differ: IcyDiffer::new(),
        };
        stream.connect()?;
        Ok(Opened::Stream(stream))
    }
}

impl std::fmt::Debug for Opener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opener")
            .field("protocols", &self.backend.protocols())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful open.
#[derive(Debug)]
pub enum Opened {
    Stream(NetStream),
    /// The URL is not a byte stream; a demuxer must handle it directly.
    Delegate(DemuxerHint),
}

impl Opened {
    pub fn into_stream(self) -> Option<NetStream> {
        match self {
            Opened::Stream(stream) => Some(stream),
            Opened::Delegate(_) => None,
        }
    }
}

/// One open network stream.
///
/// Owns its backend connection exclusively. Reconnecting replaces the
/// connection in place; the `NetStream` itself stays the same value.
/// Operations take `&mut self`: a stream is driven by one caller at a time.
pub struct NetStream {
    backend: Arc<dyn Backend>,
    config: NetConfig,
    cookies: Arc<dyn CookieProvider>,
    url: String,
    mode: Mode,
    conn: Option<Box<dyn Connection>>,
    seekable: bool,
    mime_type: Option<String>,
    demuxer: Option<DemuxerHint>,
    differ: IcyDiffer,
}

impl NetStream {
    /// Shorthand for [`Opener::open`] with the default cookie provider.
    ///
    /// # Errors
    ///
    /// See [`Opener::open`].
    pub fn open<B: Backend + 'static>(
        backend: B,
        url: &str,
        mode: Mode,
        config: NetConfig,
    ) -> StreamResult<Opened> {
        Opener::new(backend).with_config(config).open(url, mode)
    }

    fn connect(&mut self) -> StreamResult<()> {
        let mut options = ConnectOptions::build(&self.config, self.mode, self.cookies.as_ref());
        debug!(url = %self.url, mode = ?self.mode, "opening stream");

        let request = ConnectRequest {
            url: &self.url,
            mode: self.mode,
            options: &mut options,
            interrupt: Interrupt::from_token(self.config.cancel.clone()),
        };
        let conn = self.backend.connect(request).map_err(|e| {
            let err = StreamError::connect(&self.url, e);
            if matches!(err, StreamError::ProtocolUnavailable { .. }) {
                let advertised = scheme_of(&self.url).is_some_and(supports_protocol);
                warn!(
                    url = %self.url,
                    advertised,
                    "protocol not found; make sure the backend is built with networking support"
                );
            }
            err
        })?;

        for (key, value) in options.iter() {
            debug!(key, value, "could not set stream option");
        }

        self.seekable = conn.is_seekable();
        self.mime_type = conn.mime_type();
        self.demuxer = DemuxerHint::for_opened(&self.url);
        self.conn = Some(conn);
        trace!(seekable = self.seekable, mime = ?self.mime_type, "stream opened");
        Ok(())
    }

    fn conn_mut(&mut self, op: Op) -> StreamResult<&mut Box<dyn Connection>> {
        self.conn.as_mut().ok_or(StreamError::NoConnection { op })
    }

    /// Reads into `buf`.
    ///
    /// Any non-positive backend result is reported as [`StreamError::Eof`],
    /// except an interrupt, which stays [`StreamError::Interrupted`].
    ///
    /// # Errors
    ///
    /// `Eof`, `Interrupted`, or `NoConnection` after a failed reconnect.
    pub fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let conn = self.conn_mut(Op::Read)?;
        match conn.read(buf) {
            Ok(0) => Err(StreamError::Eof),
            Ok(n) => Ok(n),
            Err(BackendError::Interrupted) => Err(StreamError::Interrupted { op: Op::Read }),
            Err(e) => {
                debug!(error = %e, "read failed, reporting end of stream");
                Err(StreamError::Eof)
            }
        }
    }

    /// Writes `data` and flushes.
    ///
    /// A successful count only means the backend accepted the bytes before
    /// the flush; a flush or sticky backend error turns the call into a
    /// failure.
    ///
    /// # Errors
    ///
    /// `Io`, `Interrupted`, `Unsupported` for read-only backends, or
    /// `NoConnection`.
    pub fn write(&mut self, data: &[u8]) -> StreamResult<usize> {
        let conn = self.conn_mut(Op::Write)?;
        let written = conn
            .write(data)
            .map_err(|e| StreamError::backend(Op::Write, e))?;
        conn.flush()
            .map_err(|e| StreamError::backend(Op::Write, e))?;
        if let Some(e) = conn.error() {
            return Err(StreamError::backend(Op::Write, e));
        }
        Ok(written)
    }

    /// Absolute seek. Only available on seekable streams; never retried.
    ///
    /// # Errors
    ///
    /// `Unsupported` if the stream is not seekable, otherwise the backend
    /// failure.
    pub fn seek(&mut self, pos: u64) -> StreamResult<()> {
        if !self.seekable {
            return Err(StreamError::Unsupported { op: Op::Seek });
        }
        let conn = self.conn_mut(Op::Seek)?;
        conn.seek(pos)
            .map(|_| ())
            .map_err(|e| StreamError::backend(Op::Seek, e))
    }

    /// Dispatches an out-of-band request.
    ///
    /// Without a live connection every request except `Reconnect` is
    /// `Unsupported`.
    pub fn control(&mut self, request: ControlRequest) -> ControlResult {
        match request {
            ControlRequest::Reconnect => self.reconnect(),
            ControlRequest::GetSize => {
                let Some(conn) = self.conn.as_mut() else {
                    return ControlResult::Unsupported;
                };
                match conn.size() {
                    Ok(Some(size)) => ControlResult::Success(ControlReply::Size(size)),
                    Ok(None) | Err(BackendError::Unsupported) => ControlResult::Unsupported,
                    Err(e) => ControlResult::Failed(StreamError::backend(Op::Control, e)),
                }
            }
            ControlRequest::SeekByTimestamp(seek) => {
                let Some(conn) = self.conn.as_mut() else {
                    return ControlResult::Unsupported;
                };
                match conn.seek_time(seek) {
                    Ok(()) => ControlResult::Success(ControlReply::Seeked),
                    Err(BackendError::Unsupported) => ControlResult::Unsupported,
                    Err(e) => ControlResult::Failed(StreamError::backend(Op::Control, e)),
                }
            }
            ControlRequest::GetMetadataTags => {
                let Some(conn) = self.conn.as_ref() else {
                    return ControlResult::Unsupported;
                };
                match self.differ.poll(&conn.icy_fields()) {
                    Some(tags) => ControlResult::Success(ControlReply::Tags(tags)),
                    None => ControlResult::Unsupported,
                }
            }
        }
    }

    /// Emulates reconnect by closing and opening the connection again.
    fn reconnect(&mut self) -> ControlResult {
        if self.mode == Mode::Write {
            return ControlResult::Unsupported;
        }

        debug!(url = %self.url, "reconnecting by reopening");
        self.release();
        self.differ.reset();

        match self.connect() {
            Ok(()) => ControlResult::Success(ControlReply::Reconnected(ReconnectKind::Reopened)),
            Err(e) => {
                warn!(url = %self.url, error = %e, "reopen failed");
                ControlResult::Failed(e)
            }
        }
    }

    fn release(&mut self) {
        self.seekable = false;
        self.mime_type = None;
        if let Some(conn) = self.conn.take()
            && let Err(e) = conn.close()
        {
            debug!(error = %e, "error closing connection");
        }
    }

    /// Releases the connection. Write streams are flushed by every
    /// [`NetStream::write`], so no flush happens here.
    pub fn close(mut self) {
        self.release();
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    /// Always true: network streams should be cached by the layer above.
    pub fn is_streaming(&self) -> bool {
        true
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn demuxer_hint(&self) -> Option<DemuxerHint> {
        self.demuxer
    }

    /// Whether a live backend connection is installed.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

impl Drop for NetStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for NetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetStream")
            .field("url", &self.url)
            .field("mode", &self.mode)
            .field("connected", &self.conn.is_some())
            .field("seekable", &self.seekable)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match NetStream::read(self, buf) {
            Ok(n) => Ok(n),
            Err(StreamError::Eof) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        NetStream::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for NetStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(p) => {
                NetStream::seek(self, p)?;
                Ok(p)
            }
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("only absolute seeks are supported, got {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod stream_tests;
