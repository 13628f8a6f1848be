//! Example: read an internet radio stream and print ICY metadata changes.
//!
//! Run with:
//! ```
//! cargo run -p netstream-http --example icy_probe [URL] [SECONDS]
//! ```

use std::{
    env::args,
    error::Error,
    thread,
    time::{Duration, Instant},
};

use netstream::{ControlRequest, ICY_TITLE, Mode, NetConfig, Opened, Opener};
use netstream_http::HttpBackend;
use tokio_util::sync::CancellationToken;
use tracing::{info, metadata::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default()
                .add_directive("netstream=debug".parse()?)
                .add_directive("netstream_http=debug".parse()?)
                .add_directive(LevelFilter::INFO.into()),
        )
        .with_line_number(false)
        .with_file(false)
        .init();

    let url = args()
        .nth(1)
        .unwrap_or_else(|| "http://ice1.somafm.com/groovesalad-128-mp3".to_string());
    let seconds: u64 = args().nth(2).map(|s| s.parse()).transpose()?.unwrap_or(30);

    let cancel = CancellationToken::new();
    let config = NetConfig::new()
        .with_user_agent("netstream-icy-probe/0.1")
        .with_cancel(cancel.clone());

    let opened = Opener::new(HttpBackend::new()?)
        .with_config(config)
        .open(&url, Mode::Read)?;
    let mut stream = match opened {
        Opened::Stream(stream) => stream,
        Opened::Delegate(hint) => {
            info!(demuxer = hint.demuxer, "url is handled by a demuxer, nothing to probe");
            return Ok(());
        }
    };
    info!(url = %url, mime = ?stream.mime_type(), seekable = stream.is_seekable(), "opened");

    let deadline = Duration::from_secs(seconds);
    thread::spawn(move || {
        thread::sleep(deadline);
        cancel.cancel();
    });

    let started = Instant::now();
    let mut total = 0u64;
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(n) => total += n as u64,
            Err(e) if e.is_interrupted() || e.is_eof() => break,
            Err(e) => {
                warn!(error = %e, "read failed");
                break;
            }
        }
        if let Some(tags) = stream.control(ControlRequest::GetMetadataTags).into_tags() {
            match tags.get(ICY_TITLE) {
                Some(title) => info!(title, "now playing"),
                None => info!(tags = tags.len(), "station metadata"),
            }
        }
    }

    info!(bytes = total, elapsed = ?started.elapsed(), "done");
    stream.close();
    Ok(())
}
