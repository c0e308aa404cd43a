//! Control channel: newline-delimited JSON over TCP.
//!
//! Any number of clients may connect. Each connection is served in
//! lockstep (one response per request line, in order) and every request
//! goes through a single dispatcher task, so commands run one at a time.

use std::{io, net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use meshlink_net_api::Overlay;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot, watch},
};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder, Framed};
use tracing::{debug, info, warn};

use crate::{CommandError, MeshNode, Response};

/// Default control address.
pub const DEFAULT_CONTROL_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 5555);

/// Default maximum request line length.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Requests waiting for the dispatcher.
const DISPATCH_QUEUE: usize = 64;

/// Control server settings.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
    /// Longer request lines are rejected as malformed.
    pub max_request_bytes: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_CONTROL_ADDR,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Control server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind control socket {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("control socket error: {0}")]
    Io(#[from] io::Error),
}

/// Stops a running [`ControlServer`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.0.send(true);
    }
}

/// A bound control server.
#[derive(Debug)]
pub struct ControlServer {
    listener: TcpListener,
    config: ControlConfig,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ControlServer {
    /// Bind the control socket.
    pub async fn bind(config: ControlConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.addr,
                source,
            })?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            listener,
            config,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    /// Accept clients and answer their requests until shut down.
    pub async fn serve<O: Overlay>(self, node: Arc<MeshNode<O>>) -> Result<(), ServerError> {
        let Self {
            listener,
            config,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;

        info!(addr = %listener.local_addr()?, "Control server started");

        let (requests_tx, requests_rx) = mpsc::channel(DISPATCH_QUEUE);
        let dispatcher = tokio::spawn(run_dispatcher(node, requests_rx));

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        debug!(%remote, "Control client connected");
                        tokio::spawn(serve_connection(
                            stream,
                            remote,
                            requests_tx.clone(),
                            config.max_request_bytes,
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => warn!(%e, "Failed to accept control connection"),
                },
                _ = shutdown_rx.changed() => break,
            }
        }

        drop(requests_tx);
        dispatcher.abort();
        info!("Control server stopped");
        Ok(())
    }
}

struct Request {
    line: String,
    reply: oneshot::Sender<Response>,
}

async fn run_dispatcher<O: Overlay>(node: Arc<MeshNode<O>>, mut requests: mpsc::Receiver<Request>) {
    while let Some(Request { line, reply }) = requests.recv().await {
        let response = node.handle_request(&line).await;
        let _ = reply.send(response);
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    requests: mpsc::Sender<Request>,
    max_request_bytes: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut framed = Framed::new(stream, RequestCodec::new(max_request_bytes));

    loop {
        let frame = tokio::select! {
            frame = framed.next() => frame,
            _ = shutdown.changed() => break,
        };

        let response = match frame {
            Some(Ok(Frame::Line(line))) => {
                let (reply, rx) = oneshot::channel();
                if requests.send(Request { line, reply }).await.is_err() {
                    break;
                }
                match rx.await {
                    Ok(response) => response,
                    Err(_) => break,
                }
            }
            Some(Ok(Frame::Malformed)) => Response::error(CommandError::InvalidFormat),
            Some(Err(e)) => {
                debug!(%remote, %e, "Control connection error");
                break;
            }
            None => break,
        };

        if let Err(e) = framed.send(response.to_line()).await {
            debug!(%remote, %e, "Failed to write control response");
            break;
        }
    }

    debug!(%remote, "Control client disconnected");
}

/// One request line, or a line that cannot be a request.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line(String),
    /// Too long or not UTF-8.
    Malformed,
}

/// Newline-delimited frames that survive bad lines instead of failing the stream.
#[derive(Debug)]
struct RequestCodec {
    inner: AnyDelimiterCodec,
}

impl RequestCodec {
    fn new(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_length),
        }
    }

    fn frame(result: Result<Option<bytes::Bytes>, AnyDelimiterCodecError>) -> io::Result<Option<Frame>> {
        match result {
            Ok(Some(chunk)) => {
                let chunk = chunk.strip_suffix(b"\r").unwrap_or(&chunk);
                Ok(Some(match std::str::from_utf8(chunk) {
                    Ok(line) => Frame::Line(line.to_string()),
                    Err(_) => Frame::Malformed,
                }))
            }
            Ok(None) => Ok(None),
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(Frame::Malformed)),
            Err(AnyDelimiterCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for RequestCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        Self::frame(self.inner.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        Self::frame(self.inner.decode_eof(buf))
    }
}

impl Encoder<String> for RequestCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> io::Result<()> {
        self.inner.encode(line, buf).map_err(|e| match e {
            AnyDelimiterCodecError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        })
    }
}
