use anyhow::{Result, bail};
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::config::Limits;
use crate::http::parser;
use crate::http::request::Request;
use crate::http::response::{Reply, Status};
use crate::http::writer;

/// The route dispatcher the engine hands every complete request to.
///
/// Implementations choose the status code and may populate the reply's
/// body producer, MIME type and caching headers. A reply left empty gets
/// the status table's default JSON body.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: &Request, reply: &mut Reply) -> Status;
}

pub struct Connection {
    stream: TcpStream,
    peer: String,
    limits: Limits,
    dispatcher: Arc<dyn Dispatcher>,
    buf: BytesMut,
    state: ConnState,
}

enum ConnState {
    ReadHeaders,
    ReadBody { request: Request, want: usize },
    Dispatch { request: Request },
    WriteHeader {
        status: Status,
        reply: Reply,
        head: bool,
    },
    WriteBody { reply: Reply },
    Closed,
}

enum LineRead {
    Line(String),
    TooLong,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: String,
        limits: Limits,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            stream,
            peer,
            limits,
            dispatcher,
            buf: BytesMut::with_capacity(1024),
            state: ConnState::ReadHeaders,
        }
    }

    /// Drives the connection through its states until the response has
    /// been sent or the connection dies. Errors mean the socket was torn
    /// down mid-flight (I/O failure, EOF, idle timeout); protocol errors
    /// are answered with 400 and end in Ok.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnState::Closed) {
                ConnState::ReadHeaders => {
                    self.state = self.read_headers().await?;
                }

                ConnState::ReadBody { mut request, want } => {
                    let body = self.read_body(want).await?;
                    request.body = Some(body);
                    self.state = ConnState::Dispatch { request };
                }

                ConnState::Dispatch { request } => {
                    let mut reply = Reply::default();
                    let status = self.dispatcher.dispatch(&request, &mut reply);
                    reply.synthesize_default(status);

                    self.state = ConnState::WriteHeader {
                        status,
                        reply,
                        head: request.is_head(),
                    };
                }

                ConnState::WriteHeader {
                    status,
                    reply,
                    head,
                } => {
                    let bytes = writer::build_header(status, &reply);
                    let idle = self.idle();
                    writer::write_header(&mut self.stream, &bytes, idle).await?;

                    if head {
                        // HEAD never carries a body; dropping the reply
                        // releases whatever the producer held.
                        self.state = ConnState::Closed;
                    } else {
                        self.state = ConnState::WriteBody { reply };
                    }
                }

                ConnState::WriteBody { mut reply } => {
                    let idle = self.idle();
                    writer::write_body(&mut self.stream, &mut reply.output, idle).await?;
                    self.state = ConnState::Closed;
                }

                ConnState::Closed => return Ok(()),
            }
        }
    }

    fn idle(&self) -> Duration {
        self.limits.idle_timeout()
    }

    /// Answers a protocol error without involving the dispatcher.
    fn refuse(&self, status: Status) -> ConnState {
        let mut reply = Reply::default();
        reply.synthesize_default(status);
        ConnState::WriteHeader {
            status,
            reply,
            head: false,
        }
    }

    /// Reads header lines until the blank line, then parses the request.
    async fn read_headers(&mut self) -> Result<ConnState> {
        let mut lines = Vec::new();

        loop {
            let line = match self.read_line().await? {
                LineRead::Line(line) => line,
                LineRead::TooLong => {
                    tracing::warn!(peer = %self.peer, "Header line too long");
                    return Ok(self.refuse(Status::BadRequest));
                }
            };

            if line.is_empty() {
                break;
            }

            lines.push(line);

            if self.limits.max_headers > 0 && lines.len() >= self.limits.max_headers {
                tracing::warn!(peer = %self.peer, "Too many header lines");
                return Ok(self.refuse(Status::BadRequest));
            }
        }

        let Some(request_line) = lines.first() else {
            return Ok(self.refuse(Status::BadRequest));
        };

        let parsed = match parser::parse_request_line(request_line) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(peer = %self.peer, error = ?err, "Malformed request line");
                return Ok(self.refuse(Status::BadRequest));
            }
        };

        tracing::info!(peer = %self.peer, request = %request_line, "Request received");

        let fields = parser::parse_header_fields(&lines[1..]);

        let request = Request {
            method: parsed.method,
            segments: parsed.segments,
            args: parsed.args,
            conditionals: fields.conditionals,
            content_type: fields.content_type,
            body: None,
            peer: self.peer.clone(),
        };

        if fields.content_length > 0 {
            if self.limits.max_content_length != 0
                && fields.content_length >= self.limits.max_content_length
            {
                tracing::warn!(peer = %self.peer, "Content-Length too big");
                return Ok(self.refuse(Status::BadRequest));
            }

            return Ok(ConnState::ReadBody {
                request,
                want: fields.content_length,
            });
        }

        Ok(ConnState::Dispatch { request })
    }

    /// Reads one CRLF- or LF-terminated line from the socket, buffering
    /// whatever arrives past it for the next read.
    async fn read_line(&mut self) -> Result<LineRead> {
        let max = self.limits.max_header_line;

        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                if max > 0 && pos > max {
                    return Ok(LineRead::TooLong);
                }

                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }

                return Ok(LineRead::Line(String::from_utf8_lossy(&line).into_owned()));
            }

            if max > 0 && self.buf.len() > max {
                return Ok(LineRead::TooLong);
            }

            let n = match tokio::time::timeout(self.idle(), self.stream.read_buf(&mut self.buf))
                .await
            {
                Ok(res) => res?,
                Err(_) => bail!("idle timeout"),
            };

            if n == 0 {
                bail!("client closed connection");
            }
        }
    }

    /// Reads exactly `want` body bytes, starting with whatever the header
    /// reads already buffered.
    async fn read_body(&mut self, want: usize) -> Result<bytes::Bytes> {
        let mut body = BytesMut::with_capacity(want);

        let buffered = want.min(self.buf.len());
        body.extend_from_slice(&self.buf.split_to(buffered));

        let mut chunk = [0u8; 4096];

        while body.len() < want {
            let remaining = (want - body.len()).min(chunk.len());

            let n = match tokio::time::timeout(
                self.idle(),
                self.stream.read(&mut chunk[..remaining]),
            )
            .await
            {
                Ok(res) => res?,
                Err(_) => bail!("idle timeout"),
            };

            if n == 0 {
                bail!("client closed connection mid-body");
            }

            body.extend_from_slice(&chunk[..n]);
        }

        Ok(body.freeze())
    }
}
