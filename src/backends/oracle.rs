use crate::{
    config::{self, ConfigError},
    Bootstrap, BoxFuture, Call, CallError, CallResult, RpcFunctionInfo, Value,
};
use futures::future::ready;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, VecDeque},
    path::Path,
};
use tokio::sync::Mutex;
use tracing::info;

/// Responses by call name, with an optional answer for every other name.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OracleTable {
    #[serde(default)]
    pub responses: BTreeMap<String, Value>,
    #[serde(default)]
    pub fallback: Option<Value>,
}

impl OracleTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        config::load_json(path.as_ref())
    }

    pub fn with_response(mut self, name: impl Into<String>, response: Value) -> Self {
        self.responses.insert(name.into(), response);
        self
    }

    fn respond(&self, call: &Call) -> CallResult {
        self.responses
            .get(&call.name)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| CallError::UnknownOperation {
                name: call.name.clone(),
            })
    }
}

impl Default for OracleTable {
    fn default() -> Self {
        Self {
            responses: BTreeMap::new(),
            fallback: Some(Value::List(vec![
                Value::Float64(3.141),
                Value::from("that worked"),
            ])),
        }
    }
}

/// How many `update` calls an [`Oracle`] keeps by default.
pub const DEFAULT_RECORD_LIMIT: usize = 1024;

/// Answers calls from an [`OracleTable`] and keeps the most recent calls sent
/// to it with `update`. Older calls are dropped once `record_limit` is
/// reached; every call is still logged.
#[derive(Debug)]
pub struct Oracle {
    table: OracleTable,
    record_limit: usize,
    recorded: Mutex<VecDeque<Call>>,
}

impl Default for Oracle {
    fn default() -> Self {
        Self::new(OracleTable::default())
    }
}

impl Oracle {
    pub fn new(table: OracleTable) -> Self {
        Self {
            table,
            record_limit: DEFAULT_RECORD_LIMIT,
            recorded: Mutex::default(),
        }
    }

    pub fn with_record_limit(mut self, record_limit: usize) -> Self {
        self.record_limit = record_limit;
        self
    }

    pub fn eval(&self, calls: &[Call]) -> Result<Vec<Value>, CallError> {
        for call in calls {
            info!(%call, "eval");
        }
        calls.iter().map(|call| self.table.respond(call)).collect()
    }

    pub async fn update(&self, calls: Vec<Call>) {
        let mut recorded = self.recorded.lock().await;
        for call in calls {
            info!(%call, "update");
            if self.record_limit == 0 {
                continue;
            }
            if recorded.len() == self.record_limit {
                recorded.pop_front();
            }
            recorded.push_back(call);
        }
    }

    /// The retained `update` calls, oldest first.
    pub async fn recorded(&self) -> Vec<Call> {
        self.recorded.lock().await.iter().cloned().collect()
    }
}

impl Bootstrap for Oracle {
    fn handle(&self, call: Call) -> BoxFuture<'_, CallResult> {
        info!(%call, "eval");
        Box::pin(ready(self.table.respond(&call)))
    }

    fn eval(&self, calls: Vec<Call>) -> BoxFuture<'_, Result<Vec<Value>, CallError>> {
        Box::pin(ready(Oracle::eval(self, &calls)))
    }

    fn update(&self, calls: Vec<Call>) -> BoxFuture<'_, Result<(), CallError>> {
        Box::pin(async move {
            Oracle::update(self, calls).await;
            Ok(())
        })
    }

    fn rpc_functions(&self) -> Vec<RpcFunctionInfo> {
        self.table
            .responses
            .keys()
            .map(|name| RpcFunctionInfo {
                name: name.clone(),
                arity: None,
            })
            .collect()
    }
}
