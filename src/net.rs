pub mod client;
pub mod frame;
pub mod server;

use crate::{
    dispatcher::{CallError, CallResult, RpcFunctionInfo},
    types::{Call, Value},
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub(crate) enum Request {
    Ping,
    RpcFunctions,
    Call(Call),
    Eval(Vec<Call>),
    Update(Vec<Call>),
}

#[derive(Serialize, Deserialize, Debug)]
pub(crate) enum Response {
    Ping,
    RpcFunctions(Vec<RpcFunctionInfo>),
    Call(CallResult),
    Eval(Result<Vec<Value>, CallError>),
    Update(Result<(), CallError>),
}
