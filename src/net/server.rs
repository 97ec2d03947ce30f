use super::frame::{FrameLimit, MAX_FRAME_LEN};
use crate::{
    config::ServeAddr,
    net::{Request, Response},
    Bootstrap, BoxFuture,
};
use async_bincode::tokio::AsyncBincodeStream;
use futures::{SinkExt, StreamExt};
use std::{io, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite, BufStream},
    net::TcpListener,
    task, time,
};
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixListener;

/// Pause after an accept error that is not about a single client, such as
/// running out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A source of connections: TCP and Unix-domain listeners.
pub trait Listener: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Accepts one connection and describes its peer for the logs.
    fn accept(&self) -> BoxFuture<'_, io::Result<(Self::Stream, String)>>;

    fn local_addr(&self) -> io::Result<String>;
}

impl Listener for TcpListener {
    type Stream = tokio::net::TcpStream;

    fn accept(&self) -> BoxFuture<'_, io::Result<(Self::Stream, String)>> {
        Box::pin(async move {
            let (sock, peer) = TcpListener::accept(self).await?;
            Ok((sock, peer.to_string()))
        })
    }

    fn local_addr(&self) -> io::Result<String> {
        Ok(TcpListener::local_addr(self)?.to_string())
    }
}

#[cfg(unix)]
impl Listener for UnixListener {
    type Stream = tokio::net::UnixStream;

    fn accept(&self) -> BoxFuture<'_, io::Result<(Self::Stream, String)>> {
        Box::pin(async move {
            let (sock, _) = UnixListener::accept(self).await?;
            Ok((sock, "unix".to_owned()))
        })
    }

    fn local_addr(&self) -> io::Result<String> {
        let addr = UnixListener::local_addr(self)?;
        Ok(match addr.as_pathname() {
            Some(path) => path.display().to_string(),
            None => "unnamed unix socket".to_owned(),
        })
    }
}

/// Serves a [`Bootstrap`] over TCP or a Unix-domain socket.
///
/// Every connection gets its own task and may carry any number of requests.
/// A failed call is answered in-band and the connection stays open. A frame
/// that cannot be decoded, or is longer than [`MAX_FRAME_LEN`], closes its
/// connection and nothing else.
pub struct Server<B> {
    bootstrap: B,
}

impl<B: Bootstrap> Server<B> {
    pub fn new(bootstrap: B) -> Self {
        Self { bootstrap }
    }

    async fn handle_request(&self, req: Request) -> Response {
        match req {
            Request::Ping => Response::Ping,
            Request::RpcFunctions => Response::RpcFunctions(self.bootstrap.rpc_functions()),
            Request::Call(call) => Response::Call(self.bootstrap.handle(call).await),
            Request::Eval(calls) => Response::Eval(self.bootstrap.eval(calls).await),
            Request::Update(calls) => Response::Update(self.bootstrap.update(calls).await),
        }
    }

    async fn serve_connection<S>(self: Arc<Self>, sock: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let sock = BufStream::new(FrameLimit::new(sock, MAX_FRAME_LEN));
        let mut sock = AsyncBincodeStream::<_, Request, Response, _>::from(sock).for_async();
        debug!(%peer, "connection opened");
        while let Some(request) = sock.next().await {
            let request = match request {
                Ok(request) => request,
                Err(e) => {
                    warn!(%peer, error = %e, "undecodable request");
                    break;
                }
            };
            let response = self.handle_request(request).await;
            if let Err(e) = sock.send(response).await {
                warn!(%peer, error = %e, "sending response");
                break;
            }
        }
        debug!(%peer, "connection closed");
    }

    /// Binds `addr` and serves on it until binding fails.
    pub async fn listen(self, addr: ServeAddr) -> io::Result<()> {
        match addr {
            #[cfg(unix)]
            ServeAddr::Unix(path) => self.serve_unix(&path).await,
            #[cfg(not(unix))]
            ServeAddr::Unix(path) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unix sockets are not available here: {}", path.display()),
            )),
            addr => self.serve_tcp(addr).await,
        }
    }

    /// Resolves `addr`, binds the first address that works and serves.
    pub async fn serve_tcp(self, addr: ServeAddr) -> io::Result<()> {
        let addrs = addr.resolve().await?;
        debug!(%addr, ?addrs, "resolved");
        let listener = TcpListener::bind(addrs.as_slice()).await?;
        self.serve(listener).await
    }

    /// Binds a Unix-domain socket at `path`, replacing a stale socket file
    /// left by an earlier run.
    #[cfg(unix)]
    pub async fn serve_unix(self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::FileTypeExt;

        if let Ok(meta) = std::fs::symlink_metadata(path) {
            if meta.file_type().is_socket() {
                debug!(path = %path.display(), "removing stale socket");
                std::fs::remove_file(path)?;
            }
        }
        let listener = UnixListener::bind(path)?;
        self.serve(listener).await
    }

    /// Accepts connections forever. Accept errors are logged and skipped.
    pub async fn serve<L: Listener>(self, listener: L) -> io::Result<()> {
        info!(addr = %listener.local_addr()?, "listening");
        let root_arc = Arc::new(self);
        loop {
            match listener.accept().await {
                Ok((sock, peer)) => {
                    task::spawn(root_arc.clone().serve_connection(sock, peer));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    if !is_per_connection(&e) {
                        time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
    }
}

/// Errors that concern only the client being accepted.
fn is_per_connection(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backends::counter, Client, Value};
    use tokio::{
        io::DuplexStream,
        sync::{mpsc, Mutex},
    };

    /// Hands out whatever the test pushes: streams or accept errors.
    struct Scripted {
        incoming: Mutex<mpsc::UnboundedReceiver<io::Result<DuplexStream>>>,
    }

    impl Listener for Scripted {
        type Stream = DuplexStream;

        fn accept(&self) -> BoxFuture<'_, io::Result<(DuplexStream, String)>> {
            Box::pin(async move {
                match self.incoming.lock().await.recv().await {
                    Some(next) => next.map(|sock| (sock, "scripted".to_owned())),
                    None => std::future::pending().await,
                }
            })
        }

        fn local_addr(&self) -> io::Result<String> {
            Ok("scripted".to_owned())
        }
    }

    fn connect(tx: &mpsc::UnboundedSender<io::Result<DuplexStream>>) -> Client<DuplexStream> {
        let (client, server) = tokio::io::duplex(4096);
        tx.send(Ok(server)).unwrap();
        Client::new(client)
    }

    #[tokio::test]
    async fn keeps_accepting_after_errors() {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Scripted {
            incoming: Mutex::new(rx),
        };
        let server = Server::new(counter::dispatcher(counter::Counter::new(0)));
        task::spawn(server.serve(listener));

        tx.send(Err(io::ErrorKind::ConnectionAborted.into())).unwrap();
        tx.send(Err(io::Error::new(io::ErrorKind::Other, "too many open files")))
            .unwrap();
        let mut client = connect(&tx);
        client.ping().await.unwrap();
        assert_eq!(client.call("inc", vec![]).await.unwrap(), Value::Int64(1));
    }

    #[test]
    fn classifies_accept_errors() {
        assert!(is_per_connection(&io::ErrorKind::ConnectionReset.into()));
        assert!(!is_per_connection(&io::Error::from_raw_os_error(24)));
    }
}
