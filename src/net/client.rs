use super::{Request, Response};
use crate::{
    dispatcher::{CallError, RpcFunctionInfo},
    types::{Call, Value},
};
use async_bincode::{tokio::AsyncBincodeStream, AsyncDestination};
use futures::{SinkExt, StreamExt};
use std::io;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, BufStream},
    net::{TcpStream, ToSocketAddrs},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection: {0}")]
    Io(#[from] io::Error),

    /// The frame could not be encoded or decoded, including I/O errors met
    /// while reading or writing one.
    #[error("codec: {0}")]
    Codec(String),

    #[error("no response from server")]
    Disconnected,

    #[error("unexpected response from server")]
    UnexpectedResponse,

    #[error(transparent)]
    Call(#[from] CallError),
}

/// One connection to a [`Server`](super::server::Server), over TCP unless
/// built from another stream.
pub struct Client<S = TcpStream> {
    sock: AsyncBincodeStream<BufStream<S>, Response, Request, AsyncDestination>,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let sock = TcpStream::connect(addr).await?;
        Ok(Client::new(sock))
    }
}

#[cfg(unix)]
impl Client<tokio::net::UnixStream> {
    pub async fn connect_unix(path: impl AsRef<std::path::Path>) -> Result<Self, ClientError> {
        let sock = tokio::net::UnixStream::connect(path).await?;
        Ok(Client::new(sock))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    pub fn new(sock: S) -> Self {
        let sock = BufStream::new(sock);
        let sock = AsyncBincodeStream::from(sock).for_async();
        Self { sock }
    }

    async fn send_recv(&mut self, req: Request) -> Result<Response, ClientError> {
        self.sock
            .send(req)
            .await
            .map_err(|e| ClientError::Codec(e.to_string()))?;
        self.sock
            .next()
            .await
            .ok_or(ClientError::Disconnected)?
            .map_err(|e| ClientError::Codec(e.to_string()))
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        match self.send_recv(Request::Ping).await? {
            Response::Ping => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn rpc_functions(&mut self) -> Result<Vec<RpcFunctionInfo>, ClientError> {
        match self.send_recv(Request::RpcFunctions).await? {
            Response::RpcFunctions(infos) => Ok(infos),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ClientError> {
        match self.send_recv(Request::Call(Call::new(name, args))).await? {
            Response::Call(result) => Ok(result?),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn eval(&mut self, calls: Vec<Call>) -> Result<Vec<Value>, ClientError> {
        match self.send_recv(Request::Eval(calls)).await? {
            Response::Eval(result) => Ok(result?),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn update(&mut self, calls: Vec<Call>) -> Result<(), ClientError> {
        match self.send_recv(Request::Update(calls)).await? {
            Response::Update(result) => Ok(result?),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}
