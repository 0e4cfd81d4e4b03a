use bytes::{Buf, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::time::timeout;

use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::static_files::StaticFileHandler;

pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    state: ConnectionState,
    handler: Arc<StaticFileHandler>,
    read_timeout: Duration,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

/// Result of trying to read the next request off the wire.
enum ReadOutcome {
    Request(Request),
    /// Answer with this response, then close.
    Reject(Response),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// A zero `read_timeout` waits for the client indefinitely.
    pub fn new(stream: S, handler: Arc<StaticFileHandler>, read_timeout: Duration) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::Reading,
            handler,
            read_timeout,
        }
    }

    /// Serves requests until the client or the keep-alive policy closes the
    /// connection. Errors are transport failures only.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.state = match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request().await? {
                    ReadOutcome::Request(req) => ConnectionState::Processing(req),
                    ReadOutcome::Reject(mut response) => {
                        response.set_header("Connection", "close");
                        ConnectionState::Writing(ResponseWriter::new(response), false)
                    }
                    ReadOutcome::Closed => ConnectionState::Closed,
                },

                ConnectionState::Processing(req) => {
                    let (response, keep_alive) = self.process(req).await;
                    ConnectionState::Writing(ResponseWriter::new(response), keep_alive)
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        ConnectionState::Reading // go back for next request
                    } else {
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<ReadOutcome> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(ReadOutcome::Request(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => {
                    tracing::debug!(error = %e, "Malformed request");
                    // The body can't be skipped, but an unsupported method
                    // is still answered as such before closing.
                    let response = match e.method() {
                        Some(method) if !method.is_allowed() => Response::method_not_allowed(),
                        _ => Response::bad_request(),
                    };
                    return Ok(ReadOutcome::Reject(response));
                }
            }

            let n = match self.read_more().await {
                Some(res) => res?,
                None if self.is_idle() => {
                    tracing::debug!("Idle connection timed out");
                    return Ok(ReadOutcome::Closed);
                }
                None => {
                    tracing::debug!("Client stalled mid-request");
                    return Ok(ReadOutcome::Reject(Response::request_timeout()));
                }
            };

            if n == 0 {
                // Client closed connection
                if !self.is_idle() {
                    tracing::debug!("Client closed connection mid-request");
                }
                return Ok(ReadOutcome::Closed);
            }
        }
    }

    /// Reads into the buffer. `None` means the read timeout elapsed.
    async fn read_more(&mut self) -> Option<std::io::Result<usize>> {
        let read = self.stream.read_buf(&mut self.buffer);

        if self.read_timeout.is_zero() {
            return Some(read.await);
        }

        timeout(self.read_timeout, read).await.ok()
    }

    /// True when nothing but stray line breaks is buffered.
    fn is_idle(&self) -> bool {
        self.buffer.iter().all(|b| *b == b'\r' || *b == b'\n')
    }

    /// Runs the handler on its own task so a panic becomes a 500 instead of
    /// tearing down the connection silently.
    async fn process(&self, request: Request) -> (Response, bool) {
        let keep_alive = request.keep_alive();
        let http10 = request.is_http10();
        let method = request.method;
        let path = request.path.clone();

        let handler = Arc::clone(&self.handler);
        let mut response = match tokio::spawn(async move { handler.handle(&request).await }).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, method = %method, path = %path, "Request handler failed");
                let response = Response::internal_error();
                if method == Method::HEAD {
                    response.without_body()
                } else {
                    response
                }
            }
        };

        tracing::info!(
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            "Request served"
        );

        if !keep_alive {
            response.set_header("Connection", "close");
        } else if http10 {
            response.set_header("Connection", "keep-alive");
        }

        (response, keep_alive)
    }
}
