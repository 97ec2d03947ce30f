//! A generic remote-call protocol.
//!
//! A service exposes one entry point taking a call name and a list of
//! [`Value`]s and answering with a [`Value`] or a [`CallError`]. Backends
//! differ only in which names they register with a [`Dispatcher`] and how
//! they read and build values.

mod macros;

pub mod backends;
pub mod config;
pub mod dispatcher;
pub mod inventory;
pub mod net;
pub mod types;

pub use dispatcher::{CallError, CallResult, Dispatcher, HandlerError, RpcFunctionInfo};
pub use futures::future::BoxFuture;
pub use net::{
    client::{Client, ClientError},
    server::Server,
};
pub use types::{Call, Decode, Encode, FromArgs, Type, Value};

/// A single named operation.
///
/// `Domain` is the decoded argument list (a Rust tuple with one element per
/// argument, or `Vec<Value>` for variadic functions) and `Range` the encoded
/// result. The [`name!`] and [`call!`] macros fill in the boilerplate.
pub trait RpcFunction: Send + Sync {
    type Domain: FromArgs + Send;
    type Range: Encode;

    fn name(&self) -> &str;

    fn call<'call>(
        &'call self,
        args: Self::Domain,
    ) -> BoxFuture<'call, Result<Self::Range, HandlerError>>;
}

/// The object a transport serves.
///
/// `eval` and `update` are the batch forms; by default they run the calls in
/// order through `handle` and stop at the first error.
pub trait Bootstrap: Send + Sync + 'static {
    fn handle(&self, call: Call) -> BoxFuture<'_, CallResult>;

    fn eval(&self, calls: Vec<Call>) -> BoxFuture<'_, Result<Vec<Value>, CallError>> {
        Box::pin(async move {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.handle(call).await?);
            }
            Ok(results)
        })
    }

    fn update(&self, calls: Vec<Call>) -> BoxFuture<'_, Result<(), CallError>> {
        Box::pin(async move {
            for call in calls {
                self.handle(call).await?;
            }
            Ok(())
        })
    }

    fn rpc_functions(&self) -> Vec<RpcFunctionInfo> {
        Vec::new()
    }
}
