//! Synchronous response emission.
//!
//! Used when the kernel is embedded in a host that hands over a raw output
//! sink instead of an async transport. Bodies go out in fixed-size chunks and
//! the connection is polled before every chunk; a severed connection simply
//! stops the loop.
//!
//! Library API only: `HttpServer` converts responses through axum's
//! `IntoResponse` and never goes through this emitter.

use std::io::{self, Write};

use axum::http::header;

use crate::http::response::Response;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Liveness probe for the client connection.
pub trait ConnectionStatus {
    fn is_connected(&self) -> bool;
}

/// A connection that never goes away (buffers, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl ConnectionStatus for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}

impl<F: Fn() -> bool> ConnectionStatus for F {
    fn is_connected(&self) -> bool {
        self()
    }
}

/// Outcome of one emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emitted {
    pub body_bytes: usize,
    /// The connection dropped before the body was complete.
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseEmitter {
    chunk_size: usize,
}

impl Default for ResponseEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ResponseEmitter {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Write status line, headers and body.
    pub fn emit<W: Write, C: ConnectionStatus>(
        &self,
        response: &Response,
        sink: &mut W,
        connection: &C,
    ) -> io::Result<Emitted> {
        self.emit_headers(response, sink)?;
        self.emit_body(response, sink, connection)
    }

    pub fn emit_headers<W: Write>(&self, response: &Response, sink: &mut W) -> io::Result<()> {
        let status = response.status();
        write!(
            sink,
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )?;

        for (name, value) in response.headers() {
            sink.write_all(name.as_str().as_bytes())?;
            sink.write_all(b": ")?;
            sink.write_all(value.as_bytes())?;
            sink.write_all(b"\r\n")?;
        }

        sink.write_all(b"\r\n")
    }

    /// Write the body. A positive `Content-Length` caps the bytes sent.
    pub fn emit_body<W: Write, C: ConnectionStatus>(
        &self,
        response: &Response,
        sink: &mut W,
        connection: &C,
    ) -> io::Result<Emitted> {
        let body = response.body();
        let length = content_length(response)
            .filter(|length| *length > 0)
            .map_or(body.len(), |length| length.min(body.len()));

        let mut written = 0;
        while written < length {
            if !connection.is_connected() {
                tracing::debug!(written, length, "Connection closed mid-body");
                return Ok(Emitted {
                    body_bytes: written,
                    aborted: true,
                });
            }

            let end = (written + self.chunk_size).min(length);
            sink.write_all(&body[written..end])?;
            written = end;
        }

        sink.flush()?;
        Ok(Emitted {
            body_bytes: written,
            aborted: false,
        })
    }
}

fn content_length(response: &Response) -> Option<usize> {
    response
        .header(header::CONTENT_LENGTH.as_str())
        .and_then(|value| value.trim().parse().ok())
}
