#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors reported by a protocol backend.
///
/// Backends map their native failures into this small set; the adapter turns
/// them into [`StreamError`] with the operation that produced them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("protocol not found")]
    ProtocolNotFound,
    #[error("interrupted")]
    Interrupted,
    #[error("operation not supported")]
    Unsupported,
    #[error("end of stream")]
    Eof,
    #[error("{0}")]
    Io(String),
}

impl BackendError {
    /// Creates an I/O error from any displayable value.
    pub fn io<S: Into<String>>(msg: S) -> Self {
        Self::Io(msg.into())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Operation a [`StreamError`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open,
    Read,
    Write,
    Seek,
    Control,
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Op::Open => "open",
            Op::Read => "read",
            Op::Write => "write",
            Op::Seek => "seek",
            Op::Control => "control",
        };
        f.write_str(name)
    }
}

/// Centralized error type for netstream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error(
        "protocol not found for {url}; make sure the backend is built with networking support"
    )]
    ProtocolUnavailable { url: String },
    #[error("failed to open {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: BackendError,
    },
    #[error("{op} failed: {source}")]
    Io {
        op: Op,
        #[source]
        source: BackendError,
    },
    #[error("end of stream")]
    Eof,
    #[error("{op} interrupted")]
    Interrupted { op: Op },
    #[error("{op} not supported")]
    Unsupported { op: Op },
    #[error("{op} on a stream without a live connection")]
    NoConnection { op: Op },
}

impl StreamError {
    /// Maps a backend failure raised while running `op`.
    pub fn backend(op: Op, error: BackendError) -> Self {
        match error {
            BackendError::Interrupted => Self::Interrupted { op },
            BackendError::Unsupported => Self::Unsupported { op },
            BackendError::Eof => Self::Eof,
            other => Self::Io { op, source: other },
        }
    }

    /// Maps a backend failure raised while connecting to `url`.
    pub fn connect(url: &str, error: BackendError) -> Self {
        match error {
            BackendError::ProtocolNotFound => Self::ProtocolUnavailable {
                url: url.to_string(),
            },
            BackendError::Interrupted => Self::Interrupted { op: Op::Open },
            other => Self::Connect {
                url: url.to_string(),
                source: other,
            },
        }
    }

    /// Checks if the operation was aborted through the interrupt hook.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, StreamError::Interrupted { .. })
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, StreamError::Eof)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, StreamError::Unsupported { .. })
    }

    /// Operation the error was raised from, if it is tied to one.
    pub fn op(&self) -> Option<Op> {
        match self {
            StreamError::Input(_)
            | StreamError::ProtocolUnavailable { .. }
            | StreamError::Connect { .. } => Some(Op::Open),
            StreamError::Io { op, .. }
            | StreamError::Interrupted { op }
            | StreamError::Unsupported { op }
            | StreamError::NoConnection { op } => Some(*op),
            StreamError::Eof => Some(Op::Read),
        }
    }
}

impl From<StreamError> for std::io::Error {
    fn from(error: StreamError) -> Self {
        let kind = match &error {
            StreamError::Input(_) => std::io::ErrorKind::InvalidInput,
            StreamError::Eof => std::io::ErrorKind::UnexpectedEof,
            StreamError::Interrupted { .. } => std::io::ErrorKind::Interrupted,
            StreamError::Unsupported { .. } => std::io::ErrorKind::Unsupported,
            StreamError::NoConnection { .. } => std::io::ErrorKind::NotConnected,
            StreamError::ProtocolUnavailable { .. } => std::io::ErrorKind::NotFound,
            StreamError::Connect { .. } | StreamError::Io { .. } => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, error)
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::interrupted(BackendError::Interrupted, StreamError::Interrupted { op: Op::Read })]
    #[case::unsupported(BackendError::Unsupported, StreamError::Unsupported { op: Op::Read })]
    #[case::eof(BackendError::Eof, StreamError::Eof)]
    #[case::io(
        BackendError::io("reset"),
        StreamError::Io { op: Op::Read, source: BackendError::io("reset") }
    )]
    #[test]
    fn test_backend_mapping(#[case] error: BackendError, #[case] expected: StreamError) {
        assert_eq!(StreamError::backend(Op::Read, error), expected);
    }

    #[test]
    fn test_protocol_not_found_becomes_unavailable() {
        let err = StreamError::connect("gopher://x", BackendError::ProtocolNotFound);
        assert!(matches!(err, StreamError::ProtocolUnavailable { ref url } if url == "gopher://x"));
        assert!(err.to_string().contains("networking support"));
    }

    #[test]
    fn test_connect_interrupt_is_distinct() {
        let err = StreamError::connect("http://x", BackendError::Interrupted);
        assert!(err.is_interrupted());
        assert_eq!(err.op(), Some(Op::Open));
    }

    #[rstest]
    #[case::input(StreamError::Input("no URL".into()), "invalid input: no URL")]
    #[case::eof(StreamError::Eof, "end of stream")]
    #[case::interrupted(StreamError::Interrupted { op: Op::Seek }, "seek interrupted")]
    #[case::unsupported(StreamError::Unsupported { op: Op::Control }, "control not supported")]
    #[case::io(
        StreamError::Io { op: Op::Write, source: BackendError::io("broken pipe") },
        "write failed: broken pipe"
    )]
    #[test]
    fn test_error_display(#[case] error: StreamError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_into_io_error_kind() {
        let io: std::io::Error = StreamError::Interrupted { op: Op::Read }.into();
        assert_eq!(io.kind(), std::io::ErrorKind::Interrupted);
    }

    #[test]
    fn test_stream_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StreamError>();
    }
}
