use std::sync::Arc;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::http::parser::{HttpCode, RequestParser};
use crate::http::request::{Method, Request};
use crate::http::response::{ResponseBuilder, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::server::ServerContext;

pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    parser: RequestParser,
    response: ResponseBuilder,
    ctx: Arc<ServerContext>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Rejecting,
    Writing {
        header: BytesMut,
        keep_alive: bool,
        send_body: bool,
    },
    Closed,
}

enum ReadOutcome {
    Request(Request),
    Malformed,
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, ctx: Arc<ServerContext>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            parser: RequestParser::new(),
            response: ResponseBuilder::new(ctx.keep_alive),
            ctx,
            state: ConnectionState::Reading,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.drive().await;
        // The mapping must not outlive the exchange, whatever happened.
        self.response.release();
        result
    }

    async fn drive(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await? {
                        ReadOutcome::Request(req) => ConnectionState::Processing(req),
                        ReadOutcome::Malformed => ConnectionState::Rejecting,
                        ReadOutcome::Closed => ConnectionState::Closed,
                    };
                }

                ConnectionState::Processing(req) => {
                    let req = self.authenticate(req).await?;
                    let mut header = BytesMut::with_capacity(256);

                    self.response
                        .init(self.ctx.root.clone(), req.path.clone(), req.linger, None);
                    self.response.apply_request(&req);
                    self.response.make_response(&mut header);
                    debug!(
                        method = ?req.method,
                        path = %req.path,
                        status = self.response.code().map(|c| c.as_u16()),
                        body = self.response.file_len(),
                        "response ready"
                    );

                    self.state = ConnectionState::Writing {
                        header,
                        keep_alive: req.linger,
                        send_body: req.method != Method::HEAD,
                    };
                }

                ConnectionState::Rejecting => {
                    warn!("malformed request, answering 400");
                    let mut header = BytesMut::with_capacity(256);
                    self.response.init(
                        self.ctx.root.clone(),
                        "/400.html",
                        false,
                        Some(StatusCode::BadRequest),
                    );
                    self.response.make_response(&mut header);
                    self.state = ConnectionState::Writing {
                        header,
                        keep_alive: false,
                        send_body: true,
                    };
                }

                ConnectionState::Writing {
                    header,
                    keep_alive,
                    send_body,
                } => {
                    self.write_response(&header, send_body).await?;

                    if keep_alive {
                        self.parser.init();
                        self.state = ConnectionState::Reading;
                    } else {
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<ReadOutcome> {
        loop {
            // Try parsing whatever we already have
            match self.parser.parse(&mut self.buffer) {
                HttpCode::GetRequest => {
                    let req = self
                        .parser
                        .take_request()
                        .context("parser finished without a request")?;
                    return Ok(ReadOutcome::Request(req));
                }
                HttpCode::BadRequest => return Ok(ReadOutcome::Malformed),
                HttpCode::NoRequest => {}
            }

            let read = tokio::time::timeout(
                self.ctx.idle_timeout,
                self.stream.read_buf(&mut self.buffer),
            )
            .await;

            let n = match read {
                Ok(n) => n?,
                Err(_) => {
                    debug!("connection idle, closing");
                    return Ok(ReadOutcome::Closed);
                }
            };

            if n == 0 {
                // Client closed connection
                return Ok(ReadOutcome::Closed);
            }
        }
    }

    /// Runs the credential check of a login or registration form off the
    /// reactor, since the store may block.
    async fn authenticate(&self, req: Request) -> anyhow::Result<Request> {
        if req.credentials().is_none() {
            return Ok(req);
        }

        let gate = Arc::clone(&self.ctx.gate);
        let req = tokio::task::spawn_blocking(move || {
            let mut req = req;
            req.authenticate(gate.as_ref());
            req
        })
        .await
        .context("credential check panicked")?;
        Ok(req)
    }

    /// Sends the header block and the mapped body, then releases the mapping
    /// whether or not the write succeeded.
    async fn write_response(&mut self, header: &[u8], send_body: bool) -> anyhow::Result<()> {
        let body = if send_body { self.response.file() } else { None };
        let mut writer = ResponseWriter::new(header, body);
        let result = writer.write_to_stream(&mut self.stream).await;
        self.response.release();
        result
    }
}
