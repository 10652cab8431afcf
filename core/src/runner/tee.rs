use std::sync::Arc;

use chrono::Utc;
use encoding_rs::Encoding;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

use super::events::{OutputEvent, OutputSink, OutputStream};
use super::progress::ProgressParser;

/// Everything a reader task needs to turn raw bytes into sink events.
#[derive(Clone)]
pub(crate) struct LineTap {
    pub correlation_id: Arc<str>,
    pub sink: Arc<dyn OutputSink>,
    pub encoding: &'static Encoding,
    pub progress: Arc<ProgressParser>,
}

impl LineTap {
    fn emit(&self, stream: OutputStream, raw: &[u8]) {
        let raw = trim_line_ending(raw);
        let (text, _) = self.encoding.decode_without_bom_handling(raw);
        let line = text.into_owned();

        let progress = match stream {
            OutputStream::Stdout => self.progress.parse_line(&line),
            _ => None,
        };
        let stream = if progress.is_some() {
            OutputStream::Progress
        } else {
            stream
        };

        self.sink.on_output(
            &self.correlation_id,
            OutputEvent {
                stream,
                line,
                timestamp: Utc::now(),
                progress,
            },
        );
    }
}

pub(crate) fn pump_stdout<R>(reader: R, tap: LineTap) -> JoinHandle<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pump(reader, tap, OutputStream::Stdout)
}

pub(crate) fn pump_stderr<R>(reader: R, tap: LineTap) -> JoinHandle<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pump(reader, tap, OutputStream::Stderr)
}

/// Reads until EOF, emitting one event per line. A trailing line without a
/// newline is still emitted. Returns the number of lines seen.
fn pump<R>(reader: R, tap: LineTap, stream: OutputStream) -> JoinHandle<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);
        let mut lines = 0u64;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    lines += 1;
                    tap.emit(stream, &buf);
                }
                Err(e) => {
                    tracing::debug!(
                        target: "adminkit.exec",
                        correlation_id = %tap.correlation_id,
                        stream = ?stream,
                        error = %e,
                        "output stream closed with error"
                    );
                    break;
                }
            }
        }
        lines
    })
}

fn trim_line_ending(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}
