use std::pin::Pin;

use bytes::{Buf, Bytes};
use futures::{Stream, StreamExt};
use netstream::{BackendError, BackendResult, Connection, IcyFields};
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT_RANGES, CONTENT_TYPE, HeaderMap, RANGE},
};
use tracing::{debug, trace};
use url::Url;

use crate::{
    blocking::Blocking,
    error::{HttpError, HttpResult},
    icy::{self, IcyDemuxer},
};

type Body = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// One HTTP response body read through the blocking connection interface.
pub struct HttpConnection {
    client: Client,
    url: Url,
    headers: HeaderMap,
    blocking: Blocking,
    body: Option<Body>,
    pending: Bytes,
    icy: Option<IcyDemuxer>,
    icy_headers: Option<String>,
    pos: u64,
    size: Option<u64>,
    seekable: bool,
    mime_type: Option<String>,
}

impl HttpConnection {
    pub(crate) fn open(
        client: Client,
        url: Url,
        headers: HeaderMap,
        want_icy: bool,
        blocking: Blocking,
    ) -> BackendResult<Self> {
        let response = blocking.run(send(&client, &url, &headers, None))??;

        let size = response.content_length();
        let ranges = response
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("bytes"));
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string());
        let icy_headers = want_icy.then(|| icy::header_block(response.headers())).flatten();
        let demuxer = want_icy
            .then(|| icy::metaint(response.headers()))
            .flatten()
            .and_then(IcyDemuxer::new);
        let seekable = ranges && size.is_some() && demuxer.is_none();

        debug!(
            url = %url,
            status = response.status().as_u16(),
            ?size,
            seekable,
            ?mime_type,
            icy = demuxer.is_some(),
            "http connection opened"
        );

        Ok(Self {
            client,
            url,
            headers,
            blocking,
            body: Some(Box::pin(response.bytes_stream())),
            pending: Bytes::new(),
            icy: demuxer,
            icy_headers,
            pos: 0,
            size,
            seekable,
            mime_type,
        })
    }

    /// Current byte offset of the payload (metadata excluded).
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn take_pending(&mut self, buf: &mut [u8]) -> usize {
        match &mut self.icy {
            Some(demuxer) => demuxer.demux(&mut self.pending, buf),
            None => {
                let n = self.pending.len().min(buf.len());
                buf[..n].copy_from_slice(&self.pending[..n]);
                self.pending.advance(n);
                n
            }
        }
    }
}

async fn send(
    client: &Client,
    url: &Url,
    headers: &HeaderMap,
    offset: Option<u64>,
) -> HttpResult<Response> {
    let mut req = client.get(url.clone()).headers(headers.clone());
    if let Some(offset) = offset {
        req = req.header(RANGE, format!("bytes={offset}-"));
    }

    let resp = req.send().await?;
    let status = resp.status();
    let accepted = match offset {
        Some(0) | None => status.is_success(),
        Some(_) => status == StatusCode::PARTIAL_CONTENT,
    };
    if !accepted {
        return Err(HttpError::http_status(status.as_u16(), url.to_string()));
    }
    Ok(resp)
}

impl Connection for HttpConnection {
    fn read(&mut self, buf: &mut [u8]) -> BackendResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pending.has_remaining() {
                let n = self.take_pending(buf);
                if n > 0 {
                    self.pos += n as u64;
                    return Ok(n);
                }
                continue;
            }

            let Some(body) = self.body.as_mut() else {
                return Ok(0);
            };
            match self.blocking.run(body.next())? {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(HttpError::from(e).into()),
                None => {
                    trace!(url = %self.url, pos = self.pos, "http body finished");
                    self.body = None;
                    return Ok(0);
                }
            }
        }
    }

    fn seek(&mut self, pos: u64) -> BackendResult<u64> {
        if !self.seekable {
            return Err(BackendError::Unsupported);
        }
        if self.size == Some(pos) {
            // `bytes=<size>-` is unsatisfiable; there is nothing left to fetch.
            trace!(url = %self.url, pos, "seek to end of body");
            self.body = None;
            self.pending = Bytes::new();
            self.pos = pos;
            return Ok(pos);
        }
        debug!(url = %self.url, from = self.pos, to = pos, "http range seek");
        let response = self
            .blocking
            .run(send(&self.client, &self.url, &self.headers, Some(pos)))??;

        self.body = Some(Box::pin(response.bytes_stream()));
        self.pending = Bytes::new();
        self.pos = pos;
        Ok(pos)
    }

    fn size(&mut self) -> BackendResult<Option<u64>> {
        Ok(self.size)
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn mime_type(&self) -> Option<String> {
        self.mime_type.clone()
    }

    fn icy_fields(&self) -> IcyFields {
        IcyFields {
            headers: self.icy_headers.clone(),
            packet: self
                .icy
                .as_ref()
                .and_then(|d| d.packet().map(str::to_string)),
            sequence: self.icy.as_ref().map(IcyDemuxer::sequence),
        }
    }

    fn close(mut self: Box<Self>) -> BackendResult<()> {
        self.body = None;
        trace!(url = %self.url, pos = self.pos, "http connection closed");
        Ok(())
    }
}
