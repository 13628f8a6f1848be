//! In-memory backend for tests.
//!
//! Serves a fixed byte buffer, records every connect, close and write, and
//! lets tests script connect failures, ICY fields and blocking reads.

use std::{collections::VecDeque, sync::Arc, thread, time::Duration};

use parking_lot::Mutex;

use crate::{
    backend::{Backend, ConnectRequest, Connection, IcyFields, Mode, TimestampSeek, scheme_of},
    error::{BackendError, BackendResult},
    interrupt::Interrupt,
    options::ConnectOptions,
};

const DEFAULT_PROTOCOLS: &[&str] = &["http", "https", "mmsh", "rtmp", "udp", "mock"];
const BLOCK_POLL: Duration = Duration::from_millis(1);

/// A recorded connect call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRecord {
    pub url: String,
    pub mode: Mode,
    /// Options as received, before the backend consumed any.
    pub options: ConnectOptions,
}

#[derive(Debug, Default)]
struct MockState {
    content: Vec<u8>,
    seekable: bool,
    size: Option<u64>,
    mime_type: Option<String>,
    consumed: Vec<String>,
    blocking_reads: bool,
    write_error: Option<BackendError>,
    seek_time: Option<BackendResult<()>>,
    icy: IcyFields,
    connect_failures: VecDeque<BackendError>,
    connects: Vec<ConnectRecord>,
    closes: usize,
    live: usize,
    next_id: u64,
    written: Vec<u8>,
    seeks: Vec<u64>,
}

/// Scriptable in-memory [`Backend`].
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_content<B: Into<Vec<u8>>>(self, content: B) -> Self {
        self.state.lock().content = content.into();
        self
    }

    #[must_use]
    pub fn with_seekable(self, seekable: bool) -> Self {
        self.state.lock().seekable = seekable;
        self
    }

    #[must_use]
    pub fn with_size(self, size: Option<u64>) -> Self {
        self.state.lock().size = size;
        self
    }

    #[must_use]
    pub fn with_mime_type<S: Into<String>>(self, mime: S) -> Self {
        self.state.lock().mime_type = Some(mime.into());
        self
    }

    /// Option keys the backend applies (and removes) on connect.
    #[must_use]
    pub fn with_consumed_options(self, keys: &[&str]) -> Self {
        self.state.lock().consumed = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Reads block until the interrupt fires.
    #[must_use]
    pub fn with_blocking_reads(self, blocking: bool) -> Self {
        self.state.lock().blocking_reads = blocking;
        self
    }

    /// Error state raised by the next flush.
    #[must_use]
    pub fn with_write_error(self, error: BackendError) -> Self {
        self.state.lock().write_error = Some(error);
        self
    }

    #[must_use]
    pub fn with_seek_time(self, result: BackendResult<()>) -> Self {
        self.state.lock().seek_time = Some(result);
        self
    }

    /// Make the next connect attempt fail with `error`.
    pub fn fail_next_connect(&self, error: BackendError) {
        self.state.lock().connect_failures.push_back(error);
    }

    /// Replace the ICY fields every live connection exposes.
    pub fn set_icy(&self, icy: IcyFields) {
        self.state.lock().icy = icy;
    }

    pub fn connects(&self) -> Vec<ConnectRecord> {
        self.state.lock().connects.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    /// Connections opened and not yet closed.
    pub fn live_connections(&self) -> usize {
        self.state.lock().live
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.state.lock().seeks.clone()
    }
}

impl Backend for MockBackend {
    fn protocols(&self) -> &[&str] {
        DEFAULT_PROTOCOLS
    }

    fn connect(&self, request: ConnectRequest<'_>) -> BackendResult<Box<dyn Connection>> {
        let mut state = self.state.lock();
        state.connects.push(ConnectRecord {
            url: request.url.to_string(),
            mode: request.mode,
            options: request.options.clone(),
        });

        request.interrupt.check()?;
        if let Some(error) = state.connect_failures.pop_front() {
            return Err(error);
        }
        let known = scheme_of(request.url).is_some_and(|s| DEFAULT_PROTOCOLS.contains(&s));
        if !known {
            return Err(BackendError::ProtocolNotFound);
        }

        for key in &state.consumed {
            request.options.take(key);
        }

        state.live += 1;
        state.next_id += 1;
        Ok(Box::new(MockConnection {
            id: state.next_id,
            state: Arc::clone(&self.state),
            interrupt: request.interrupt,
            pos: 0,
            error: None,
        }))
    }
}

struct MockConnection {
    id: u64,
    state: Arc<Mutex<MockState>>,
    interrupt: Interrupt,
    pos: usize,
    error: Option<BackendError>,
}

impl Connection for MockConnection {
    fn read(&mut self, buf: &mut [u8]) -> BackendResult<usize> {
        self.interrupt.check()?;
        if self.state.lock().blocking_reads {
            loop {
                self.interrupt.check()?;
                thread::sleep(BLOCK_POLL);
            }
        }

        let state = self.state.lock();
        let available = state.content.get(self.pos..).unwrap_or_default();
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> BackendResult<usize> {
        self.interrupt.check()?;
        self.state.lock().written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> BackendResult<()> {
        if let Some(error) = self.state.lock().write_error.clone() {
            self.error = Some(error);
        }
        Ok(())
    }

    fn error(&self) -> Option<BackendError> {
        self.error.clone()
    }

    fn seek(&mut self, pos: u64) -> BackendResult<u64> {
        self.interrupt.check()?;
        let mut state = self.state.lock();
        if pos > state.content.len() as u64 {
            return Err(BackendError::io(format!("seek past end: {pos}")));
        }
        state.seeks.push(pos);
        self.pos = pos as usize;
        Ok(pos)
    }

    fn size(&mut self) -> BackendResult<Option<u64>> {
        Ok(self.state.lock().size)
    }

    fn seek_time(&mut self, _seek: TimestampSeek) -> BackendResult<()> {
        self.state
            .lock()
            .seek_time
            .clone()
            .unwrap_or(Err(BackendError::Unsupported))
    }

    fn is_seekable(&self) -> bool {
        self.state.lock().seekable
    }

    fn mime_type(&self) -> Option<String> {
        self.state.lock().mime_type.clone()
    }

    fn icy_fields(&self) -> IcyFields {
        self.state.lock().icy.clone()
    }

    fn close(self: Box<Self>) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.closes += 1;
        state.live = state.live.saturating_sub(1);
        tracing::trace!(id = self.id, "mock connection closed");
        Ok(())
    }
}
