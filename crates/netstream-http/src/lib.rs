//! # netstream-http
//!
//! `http://` / `https://` [`Backend`](netstream::Backend) for `netstream`.
//!
//! Consumes the `user-agent`, `cookies`, `headers`, `tls_verify`,
//! `ca_file` and `icy` connect options. With `icy` set, the request carries
//! `Icy-MetaData: 1` and in-band metadata is stripped from the payload and
//! exposed through [`IcyFields`](netstream::IcyFields). Responses that
//! advertise `Accept-Ranges: bytes` with a known length are seekable via
//! ranged requests.

#![forbid(unsafe_code)]

mod blocking;
mod client;
mod connection;
mod error;
mod icy;
mod types;

pub use crate::{
    client::{HttpBackend, PROTOCOLS},
    connection::HttpConnection,
    error::{HttpError, HttpResult},
    icy::IcyDemuxer,
    types::{HttpOptions, RequestSettings, parse_header_block},
};
