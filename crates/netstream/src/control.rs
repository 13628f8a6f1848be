#![forbid(unsafe_code)]

use crate::{backend::TimestampSeek, error::StreamError, metadata::Tags};

/// Out-of-band request handled by [`crate::NetStream::control`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlRequest {
    GetSize,
    SeekByTimestamp(TimestampSeek),
    GetMetadataTags,
    Reconnect,
}

/// How a reconnect was carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectKind {
    /// The connection was torn down and opened again from scratch. The read
    /// position is back at the backend's default; callers must re-seek.
    Reopened,
}

/// Payload of a handled request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlReply {
    Size(u64),
    Seeked,
    Tags(Tags),
    Reconnected(ReconnectKind),
}

/// Outcome of a control request.
#[derive(Debug, PartialEq, Eq)]
pub enum ControlResult {
    Success(ControlReply),
    /// Capability signal, not a failure.
    Unsupported,
    Failed(StreamError),
}

impl ControlResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ControlResult::Success(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ControlResult::Unsupported)
    }

    pub fn reply(self) -> Option<ControlReply> {
        match self {
            ControlResult::Success(reply) => Some(reply),
            ControlResult::Unsupported | ControlResult::Failed(_) => None,
        }
    }

    pub fn into_size(self) -> Option<u64> {
        match self.reply()? {
            ControlReply::Size(size) => Some(size),
            _ => None,
        }
    }

    pub fn into_tags(self) -> Option<Tags> {
        match self.reply()? {
            ControlReply::Tags(tags) => Some(tags),
            _ => None,
        }
    }
}
