use anyhow::{Result, anyhow};
use std::future::Future;
use std::io;
use std::time::{Duration, SystemTime};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::output::{AttachmentSource, FeedSource, Output, SCRATCH_SIZE};
use crate::http::response::{MIME_JSON, MIME_TEXTHTML, Reply, Status};

const SERVER_HEADER: &str = concat!("Server: folio ", env!("CARGO_PKG_VERSION"), "\r\n");

/// Fallback Content-Type when the dispatcher installed a body but no MIME
/// type: JSON for the successful statuses, text/html otherwise.
fn default_mime(status: Status) -> &'static str {
    match status {
        Status::Ok | Status::Created => MIME_JSON,
        _ => MIME_TEXTHTML,
    }
}

/// Serializes the response header block.
///
/// Streaming producers advertise chunked transfer coding and keep the
/// connection open; everything else gets a Content-Length and
/// `Connection: close`. Cache-Control, ETag and Last-Modified appear only
/// when the dispatcher supplied them.
pub fn build_header(status: Status, reply: &Reply) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.reason_phrase()
    );

    head.push_str(SERVER_HEADER);
    head.push_str(&format!(
        "Date: {}\r\n",
        httpdate::fmt_http_date(SystemTime::now())
    ));

    if let Some(cc) = &reply.cache_control {
        head.push_str(&format!("Cache-Control: {cc}\r\n"));
    }
    if let Some(etag) = &reply.etag {
        head.push_str(&format!("ETag: {etag}\r\n"));
    }
    if let Some(lm) = reply.last_modified {
        head.push_str(&format!("Last-Modified: {}\r\n", httpdate::fmt_http_date(lm)));
    }

    match reply.output.content_length() {
        Some(len) => head.push_str(&format!("Content-Length: {len}\r\n")),
        None => head.push_str("Transfer-Encoding: chunked\r\n"),
    }

    let mime = reply.mime.as_deref().unwrap_or(default_mime(status));
    head.push_str(&format!("Content-Type: {mime}; charset=utf-8\r\n"));

    if !reply.output.is_stream() {
        head.push_str("Connection: close\r\n");
    }

    head.push_str("\r\n");
    head.into_bytes()
}

/// Runs one socket operation under the connection's idle window.
async fn timed<T>(idle: Duration, op: impl Future<Output = io::Result<T>>) -> Result<T> {
    match tokio::time::timeout(idle, op).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(anyhow!("idle timeout")),
    }
}

/// Writes the serialized header block.
pub async fn write_header<W>(stream: &mut W, head: &[u8], idle: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    timed(idle, stream.write_all(head)).await?;
    timed(idle, stream.flush()).await
}

/// Drains the body producer into the stream.
pub async fn write_body<W>(stream: &mut W, output: &mut Output, idle: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match output {
        Output::None => Ok(()),
        Output::Buffer { bytes } => {
            timed(idle, stream.write_all(bytes)).await?;
            timed(idle, stream.flush()).await
        }
        Output::File { file, .. } => write_file(stream, file, idle).await,
        Output::Map { map } => {
            timed(idle, stream.write_all(map.bytes())).await?;
            timed(idle, stream.flush()).await
        }
        Output::Blob { source } => write_blob(stream, source.as_mut(), idle).await,
        Output::Feed { source, heartbeat } => {
            write_feed(stream, source.as_mut(), *heartbeat, idle).await
        }
    }
}

/// Refills a scratch buffer from the file and writes it out until a
/// zero-size refill signals the end.
async fn write_file<W>(stream: &mut W, file: &mut File, idle: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut scratch = [0u8; SCRATCH_SIZE];

    loop {
        let n = file.read(&mut scratch).await?;
        if n == 0 {
            break;
        }
        timed(idle, stream.write_all(&scratch[..n])).await?;
    }

    timed(idle, stream.flush()).await
}

/// Same refill-then-write loop as [`write_file`], paging the attachment
/// store at increasing offsets.
async fn write_blob<W>(
    stream: &mut W,
    source: &mut dyn AttachmentSource,
    idle: Duration,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut scratch = [0u8; SCRATCH_SIZE];
    let mut offset = 0u64;

    loop {
        let n = source.read(&mut scratch, offset)?;
        if n == 0 {
            break;
        }
        offset += n as u64;
        timed(idle, stream.write_all(&scratch[..n])).await?;
    }

    timed(idle, stream.flush()).await
}

/// Minimal HTTP chunked transfer coding over a change feed.
///
/// Every refill becomes one `<hex-length>\r\n<data>\r\n` chunk. A
/// one-byte `"\n"` payload is a heartbeat: after sending it the writer
/// waits out the feed's heartbeat interval instead of polling again
/// immediately. When the source reports exhaustion the terminal
/// `0\r\n\r\n` chunk ends the response.
async fn write_feed<W>(
    stream: &mut W,
    source: &mut dyn FeedSource,
    heartbeat: Duration,
    idle: Duration,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut scratch = [0u8; SCRATCH_SIZE];
    let mut offset = 0u64;

    loop {
        let (n, more) = source.read(&mut scratch, offset)?;

        if n == 0 {
            if !more {
                timed(idle, stream.write_all(b"0\r\n\r\n")).await?;
                return timed(idle, stream.flush()).await;
            }
            tokio::time::sleep(heartbeat).await;
            continue;
        }

        offset += n as u64;

        let frame = format!("{n:x}\r\n");
        timed(idle, stream.write_all(frame.as_bytes())).await?;
        timed(idle, stream.write_all(&scratch[..n])).await?;
        timed(idle, stream.write_all(b"\r\n")).await?;
        timed(idle, stream.flush()).await?;

        if &scratch[..n] == b"\n" {
            tokio::time::sleep(heartbeat).await;
        }
    }
}
