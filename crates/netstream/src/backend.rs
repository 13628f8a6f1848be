#![forbid(unsafe_code)]

//! Protocol backend contract.
//!
//! A [`Backend`] turns a normalized URL plus [`ConnectOptions`] into a live
//! [`Connection`]. All connection methods may block on network I/O; a
//! backend must consult the [`Interrupt`] it was given while blocked and
//! return [`BackendError::Interrupted`] once it fires.

use crate::{
    error::{BackendError, BackendResult},
    interrupt::Interrupt,
    options::ConnectOptions,
};

/// Direction a stream is opened for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Read,
    Write,
}

/// Timestamp based seek forwarded verbatim to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimestampSeek {
    pub stream_index: i32,
    pub timestamp: i64,
    pub flags: i32,
}

/// In-band (ICY) metadata as currently exposed by a connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IcyFields {
    /// Header block, one `name: value` per line.
    pub headers: Option<String>,
    /// Most recent metadata packet.
    pub packet: Option<String>,
    /// Counter bumped for every packet received, if the backend tracks one.
    pub sequence: Option<u64>,
}

impl IcyFields {
    pub fn is_empty(&self) -> bool {
        self.headers.as_deref().is_none_or(str::is_empty)
            && self.packet.as_deref().is_none_or(str::is_empty)
    }
}

/// Arguments to [`Backend::connect`].
#[derive(Debug)]
pub struct ConnectRequest<'a> {
    pub url: &'a str,
    pub mode: Mode,
    /// Backends remove every option they apply; whatever remains is reported
    /// as unrecognized.
    pub options: &'a mut ConnectOptions,
    pub interrupt: Interrupt,
}

/// One open protocol session.
pub trait Connection: Send {
    /// Reads into `buf`. `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> BackendResult<usize>;

    fn write(&mut self, _buf: &[u8]) -> BackendResult<usize> {
        Err(BackendError::Unsupported)
    }

    fn flush(&mut self) -> BackendResult<()> {
        Ok(())
    }

    /// Sticky error state, set once any write or flush has failed.
    fn error(&self) -> Option<BackendError> {
        None
    }

    /// Absolute seek. Returns the new position.
    fn seek(&mut self, _pos: u64) -> BackendResult<u64> {
        Err(BackendError::Unsupported)
    }

    /// Total size if known.
    fn size(&mut self) -> BackendResult<Option<u64>> {
        Ok(None)
    }

    fn seek_time(&mut self, _seek: TimestampSeek) -> BackendResult<()> {
        Err(BackendError::Unsupported)
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn mime_type(&self) -> Option<String> {
        None
    }

    fn icy_fields(&self) -> IcyFields {
        IcyFields::default()
    }

    /// Releases the session.
    fn close(self: Box<Self>) -> BackendResult<()> {
        Ok(())
    }
}

/// Connector for a family of protocols.
pub trait Backend: Send + Sync {
    /// Schemes this backend can connect to.
    fn protocols(&self) -> &[&str];

    /// # Errors
    ///
    /// [`BackendError::ProtocolNotFound`] when the scheme has no registered
    /// implementation; any other error when the connection fails.
    fn connect(&self, request: ConnectRequest<'_>) -> BackendResult<Box<dyn Connection>>;
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn protocols(&self) -> &[&str] {
        (**self).protocols()
    }

    fn connect(&self, request: ConnectRequest<'_>) -> BackendResult<Box<dyn Connection>> {
        (**self).connect(request)
    }
}

/// Scheme of `url` (text before the first `:`), if any.
pub fn scheme_of(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once(':')?;
    (!scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
    .then_some(scheme)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("http://x", Some("http"))]
    #[case("mmsh://h/p", Some("mmsh"))]
    #[case("rtsp:cam", Some("rtsp"))]
    #[case("no-scheme", None)]
    #[case("://x", None)]
    #[case("a b://x", None)]
    #[test]
    fn test_scheme_of(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(scheme_of(url), expected);
    }

    #[rstest]
    #[case::none(IcyFields::default(), true)]
    #[case::empty_strings(IcyFields { headers: Some(String::new()), packet: Some(String::new()), sequence: None }, true)]
    #[case::headers(IcyFields { headers: Some("icy-name: x".into()), ..IcyFields::default() }, false)]
    #[case::packet(IcyFields { packet: Some("StreamTitle='a';".into()), ..IcyFields::default() }, false)]
    #[test]
    fn test_icy_fields_is_empty(#[case] fields: IcyFields, #[case] expected: bool) {
        assert_eq!(fields.is_empty(), expected);
    }
}
