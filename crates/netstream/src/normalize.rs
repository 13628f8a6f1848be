//! URL normalization performed before any backend is contacted.
//!
//! Pure string work: adapter prefixes are stripped, the delegated scheme
//! family is detected, and the deprecated MMS schemes are rewritten.

use tracing::debug;

use crate::error::{StreamError, StreamResult};

/// Adapter-level prefixes removed before the URL reaches the backend.
pub const ADAPTER_PREFIXES: [&str; 2] = ["lavf://", "ffmpeg://"];

/// Schemes the adapter advertises to the layer above.
///
/// Advisory: [`Opener`](crate::Opener) does not filter on it. Whether a
/// scheme can actually be opened is decided by the backend.
pub const PROTOCOLS: &[&str] = &[
    "lavf", "ffmpeg", "rtmp", "rtsp", "http", "https", "mms", "mmst", "mmsh", "mmshttp", "udp",
    "ftp", "rtp", "httpproxy", "hls", "rtmpe", "rtmps", "rtmpt", "rtmpte", "rtmpts", "srtp", "tcp",
    "tls", "unix", "sftp", "md5",
];

const DELEGATED_SCHEME: &str = "rtsp:";
const LEGACY_MMS: [&str; 2] = ["mms://", "mmshttp://"];
const MMS_OVER_HTTP: &str = "mmsh://";

/// Demuxer selection handed to the layer above.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DemuxerHint {
    pub demuxer: &'static str,
    pub format: &'static str,
}

impl DemuxerHint {
    pub const RTSP: DemuxerHint = DemuxerHint {
        demuxer: "lavf",
        format: "rtsp",
    };
    pub const FLV: DemuxerHint = DemuxerHint {
        demuxer: "lavf",
        format: "flv",
    };

    /// Hint attached after a successful open of `url`.
    pub fn for_opened(url: &str) -> Option<DemuxerHint> {
        url.starts_with("rtmp").then_some(DemuxerHint::FLV)
    }
}

/// Result of normalizing a caller URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    /// Open this URL as a byte stream.
    Open(String),
    /// Not a byte stream: hand the whole URL to a demuxer.
    Delegate(DemuxerHint),
}

/// Normalizes `url` for connection.
///
/// # Errors
///
/// Returns [`StreamError::Input`] when the URL is empty.
pub fn normalize(url: &str) -> StreamResult<Normalized> {
    if url.is_empty() {
        return Err(StreamError::Input("no URL".to_string()));
    }

    let mut rest = url;
    for prefix in ADAPTER_PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
        }
    }

    if rest.starts_with(DELEGATED_SCHEME) {
        debug!(url = rest, "delegating to demuxer");
        return Ok(Normalized::Delegate(DemuxerHint::RTSP));
    }

    for legacy in LEGACY_MMS {
        if let Some(tail) = rest.strip_prefix(legacy) {
            return Ok(Normalized::Open(format!("{MMS_OVER_HTTP}{tail}")));
        }
    }

    Ok(Normalized::Open(rest.to_string()))
}

/// Whether `scheme` is listed in [`PROTOCOLS`]. Case-insensitive.
pub fn supports_protocol(scheme: &str) -> bool {
    PROTOCOLS.iter().any(|p| p.eq_ignore_ascii_case(scheme))
}
