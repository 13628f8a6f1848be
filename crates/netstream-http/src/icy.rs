//! ICY (SHOUTcast/Icecast) in-band metadata demultiplexer.
//!
//! With `icy-metaint: N`, the server sends N audio bytes, one length byte
//! `L`, then `L * 16` bytes of NUL-padded metadata, and repeats.

use bytes::{Buf, Bytes};
use reqwest::header::HeaderMap;
use tracing::trace;

const ICY_HEADER_PREFIX: &str = "icy-";
const BLOCK_UNIT: usize = 16;

#[derive(Debug, PartialEq, Eq)]
enum State {
    Audio { remaining: usize },
    Length,
    Meta { remaining: usize },
}

#[derive(Debug)]
pub struct IcyDemuxer {
    metaint: usize,
    state: State,
    block: Vec<u8>,
    packet: Option<String>,
    sequence: u64,
}

impl IcyDemuxer {
    /// `None` for a zero interval.
    pub fn new(metaint: usize) -> Option<Self> {
        (metaint > 0).then(|| Self {
            metaint,
            state: State::Audio { remaining: metaint },
            block: Vec::new(),
            packet: None,
            sequence: 0,
        })
    }

    /// Copies audio bytes from `input` into `out`, consuming metadata blocks
    /// on the way. Returns the number of audio bytes written.
    ///
    /// Metadata following the last copied audio byte is consumed eagerly, so
    /// a packet is visible as soon as the audio preceding it has been read.
    pub fn demux(&mut self, input: &mut Bytes, out: &mut [u8]) -> usize {
        let mut written = 0;
        while input.has_remaining() {
            match self.state {
                State::Audio { remaining } => {
                    if written == out.len() {
                        break;
                    }
                    let n = remaining.min(input.len()).min(out.len() - written);
                    out[written..written + n].copy_from_slice(&input[..n]);
                    input.advance(n);
                    written += n;
                    self.state = if remaining == n {
                        State::Length
                    } else {
                        State::Audio {
                            remaining: remaining - n,
                        }
                    };
                }
                State::Length => {
                    let len = usize::from(input.get_u8()) * BLOCK_UNIT;
                    self.block.clear();
                    self.state = if len == 0 {
                        self.audio()
                    } else {
                        State::Meta { remaining: len }
                    };
                }
                State::Meta { remaining } => {
                    let n = remaining.min(input.len());
                    self.block.extend_from_slice(&input[..n]);
                    input.advance(n);
                    self.state = if remaining == n {
                        self.finish_block();
                        self.audio()
                    } else {
                        State::Meta {
                            remaining: remaining - n,
                        }
                    };
                }
            }
        }
        written
    }

    fn audio(&self) -> State {
        State::Audio {
            remaining: self.metaint,
        }
    }

    fn finish_block(&mut self) {
        let text = String::from_utf8_lossy(&self.block);
        let text = text.trim_end_matches('\0');
        if !text.is_empty() {
            self.sequence += 1;
            trace!(sequence = self.sequence, packet = text, "icy packet");
            self.packet = Some(text.to_string());
        }
        self.block.clear();
    }

    /// Latest non-empty metadata packet.
    pub fn packet(&self) -> Option<&str> {
        self.packet.as_deref()
    }

    /// Number of non-empty packets seen.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// `icy-*` response headers as a `name: value` line block.
pub fn header_block(headers: &HeaderMap) -> Option<String> {
    let mut block = String::new();
    for (name, value) in headers {
        if !name.as_str().starts_with(ICY_HEADER_PREFIX) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            block.push_str(name.as_str());
            block.push_str(": ");
            block.push_str(value);
            block.push('\n');
        }
    }
    (!block.is_empty()).then_some(block)
}

/// Metadata interval advertised by the server.
pub fn metaint(headers: &HeaderMap) -> Option<usize> {
    headers
        .get("icy-metaint")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
