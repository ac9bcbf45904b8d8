//! Async output readers (non-UTF8-safe).
//!
//! llama-server and other C/C++ tooling can emit non-UTF8 bytes on
//! stdout/stderr. `BufReader::lines()` ends the reader on invalid UTF-8, so
//! lines are read as bytes and decoded lossily.

use runway_core::ports::{OutputLine, OutputStream};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use super::logs::OutputSink;

/// Longer lines are split into chunks of at most this many bytes.
pub(crate) const MAX_LINE_BYTES: u64 = 64 * 1024;

pub(crate) fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    runner: String,
    kind: OutputStream,
    sink: OutputSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match (&mut reader).take(MAX_LINE_BYTES).read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let line = String::from_utf8_lossy(&buf).into_owned();
                    debug!(runner = %runner, stream = kind.as_str(), "{line}");
                    sink.publish(OutputLine::now(kind, line));
                }
                Err(e) => {
                    debug!(runner = %runner, stream = kind.as_str(), error = %e, "Output reader exiting on read error");
                    break;
                }
            }
        }
    })
}
