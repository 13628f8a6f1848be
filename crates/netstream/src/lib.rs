//! # netstream
//!
//! Uniform byte-stream interface over pluggable network protocol backends.
//!
//! A [`Backend`] knows how to talk to a family of protocols. `netstream`
//! wraps it so that any supported URL behaves like a well-formed stream:
//!
//! - URLs are normalized first: `lavf://` / `ffmpeg://` prefixes are
//!   stripped, `mms://` and `mmshttp://` become `mmsh://`, and `rtsp:` is
//!   handed to a demuxer instead of being opened ([`Opened::Delegate`]).
//! - [`ConnectOptions`] are assembled from a [`NetConfig`] value: user
//!   agent, cookies, TLS settings, the composed header block, ICY support
//!   for readers, then raw overrides, which always win.
//! - [`NetStream`] exposes read, write (always flushed), absolute seek and
//!   [`NetStream::control`] for size, timestamp seek, ICY metadata and
//!   reconnect-by-reopen.
//! - Cancellation is cooperative: the backend receives an [`Interrupt`]
//!   and aborts blocking calls with an interruption error once the caller's
//!   [`CancellationToken`](tokio_util::sync::CancellationToken) fires.
//!
//! ```ignore
//! use netstream::{ControlRequest, Mode, NetConfig, Opener};
//!
//! let opener = Opener::new(backend).with_config(NetConfig::new().with_user_agent("radio/1.0"));
//! let mut stream = opener.open("http://radio.example/stream", Mode::Read)?.into_stream().unwrap();
//! let mut buf = [0u8; 4096];
//! let n = stream.read(&mut buf)?;
//! if let Some(tags) = stream.control(ControlRequest::GetMetadataTags).into_tags() {
//!     println!("now playing: {:?}", tags.get(netstream::ICY_TITLE));
//! }
//! ```

#![forbid(unsafe_code)]

mod backend;
mod config;
mod control;
mod error;
mod interrupt;
mod metadata;
mod normalize;
mod options;
mod stream;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use backend::{Backend, ConnectRequest, Connection, IcyFields, Mode, TimestampSeek, scheme_of};
pub use config::NetConfig;
pub use control::{ControlReply, ControlRequest, ControlResult, ReconnectKind};
pub use error::{BackendError, BackendResult, Op, StreamError, StreamResult};
pub use interrupt::{CancellationSignal, Interrupt};
pub use metadata::{ICY_TITLE, IcyDiffer, Tags, parse_icy, stream_title};
pub use normalize::{
    ADAPTER_PREFIXES, DemuxerHint, Normalized, PROTOCOLS, normalize, supports_protocol,
};
pub use options::{ConnectOptions, CookieProvider, HEADER_LINE_END, NoCookies, compose_headers, keys};
pub use stream::{NetStream, Opened, Opener};

/// Whether the adapter offers write mode. Advisory, like [`PROTOCOLS`]:
/// a backend may still refuse [`Mode::Write`] at connect time.
pub const CAN_WRITE: bool = true;
