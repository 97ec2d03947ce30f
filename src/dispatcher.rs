use crate::{
    types::{ArgsError, Call, Encode, FromArgs, Type, Value},
    Bootstrap, RpcFunction,
};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

/// Maps [`RpcFunction`] names to type-erased handlers.
///
/// Functions are registered with [`Dispatcher::add`] and invoked with
/// [`Dispatcher::handle`]. Argument count and top-level argument variants are
/// checked here, before the function runs.
#[derive(Default)]
pub struct Dispatcher {
    rpc_functions: BTreeMap<String, Arc<dyn DynamicRpcFunction + Send + Sync + 'static>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<RFn>(&mut self, rpc_function: RFn)
    where
        RFn: RpcFunction + 'static,
    {
        let typed = TypedRpcFunction { rpc_function };
        let name = typed.name().to_owned();
        self.rpc_functions.insert(name, Arc::new(typed));
    }

    pub async fn handle(&self, call: Call) -> CallResult {
        debug!(%call, "dispatching call");
        let Call { name, args } = call;
        let result = match self.rpc_functions.get(&name) {
            Some(rfn) => rfn.call(args).await,
            None => Err(CallError::UnknownOperation { name }),
        };
        if let Err(e) = &result {
            warn!(error = %e, "call failed");
        }
        result
    }

    pub fn rpc_functions(&self) -> Vec<RpcFunctionInfo> {
        self.rpc_functions
            .iter()
            .map(|(name, rfn)| RpcFunctionInfo {
                name: name.clone(),
                arity: rfn.arity(),
            })
            .collect()
    }
}

impl Bootstrap for Dispatcher {
    fn handle(&self, call: Call) -> BoxFuture<'_, CallResult> {
        Box::pin(Dispatcher::handle(self, call))
    }

    fn rpc_functions(&self) -> Vec<RpcFunctionInfo> {
        Dispatcher::rpc_functions(self)
    }
}

pub type CallResult = Result<Value, CallError>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RpcFunctionInfo {
    pub name: String,
    /// `None` when the function takes any number of arguments.
    pub arity: Option<usize>,
}

struct TypedRpcFunction<RFn> {
    rpc_function: RFn,
}

impl<RFn> TypedRpcFunction<RFn>
where
    RFn: RpcFunction,
{
    fn name(&self) -> &str {
        self.rpc_function.name()
    }

    async fn call(&self, args: Vec<Value>) -> CallResult {
        let decoded_args =
            RFn::Domain::from_args(args).map_err(|e| CallError::from_args(self.name(), e))?;
        let retval = self
            .rpc_function
            .call(decoded_args)
            .await
            .map_err(|e| CallError::Handler {
                name: self.name().to_owned(),
                message: e.message,
            })?;
        Ok(RFn::Range::encode(retval))
    }
}

/// A type-erased version of the main trait, RpcFunction
trait DynamicRpcFunction {
    fn arity(&self) -> Option<usize>;
    fn call(&self, args: Vec<Value>) -> BoxFuture<'_, CallResult>;
}

impl<RFn> DynamicRpcFunction for TypedRpcFunction<RFn>
where
    RFn: RpcFunction,
{
    fn arity(&self) -> Option<usize> {
        RFn::Domain::ARITY
    }

    fn call(&self, args: Vec<Value>) -> BoxFuture<'_, CallResult> {
        Box::pin(self.call(args))
    }
}

/// Why a call produced no value. Every variant names the call it belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("unknown operation `{name}`")]
    UnknownOperation { name: String },

    #[error("`{name}` takes {expected} arguments, got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("`{name}` argument {position}: expected {expected}, found {actual}")]
    ArgumentType {
        name: String,
        position: usize,
        expected: Type,
        actual: Type,
    },

    #[error("`{name}` failed: {message}")]
    Handler { name: String, message: String },
}

impl CallError {
    pub fn name(&self) -> &str {
        use CallError::*;
        match self {
            UnknownOperation { name }
            | Arity { name, .. }
            | ArgumentType { name, .. }
            | Handler { name, .. } => name,
        }
    }

    fn from_args(name: &str, error: ArgsError) -> Self {
        let name = name.to_owned();
        match error {
            ArgsError::Arity { expected, actual } => CallError::Arity {
                name,
                expected,
                actual,
            },
            ArgsError::ArgumentType {
                position,
                expected,
                actual,
            } => CallError::ArgumentType {
                name,
                position,
                expected,
                actual,
            },
            ArgsError::Shape { .. } => CallError::Handler {
                name,
                message: error.to_string(),
            },
        }
    }
}

/// A domain-level rejection raised inside an [`RpcFunction`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
