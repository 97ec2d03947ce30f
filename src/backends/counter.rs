use crate::{call, name, Dispatcher, HandlerError, RpcFunction, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_SEED: i64 = 2;

/// Counter state shared by `set` and `inc`. Updates happen under the lock.
#[derive(Debug, Clone)]
pub struct Counter(Arc<Mutex<i64>>);

impl Counter {
    pub fn new(seed: i64) -> Self {
        Self(Arc::new(Mutex::new(seed)))
    }

    pub async fn get(&self) -> i64 {
        *self.0.lock().await
    }

    async fn set(&self, value: i64) {
        *self.0.lock().await = value;
    }

    async fn increment(&self) -> Result<i64, HandlerError> {
        let mut i = self.0.lock().await;
        *i = i
            .checked_add(1)
            .ok_or_else(|| HandlerError::new("counter overflow"))?;
        Ok(*i)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

/// `set(v)` stores `v` and returns it.
pub struct Set {
    counter: Counter,
}

impl RpcFunction for Set {
    name!("set");
    call! {
        async fn call(&self, (value,): (i64,)) -> i64 {
            self.counter.set(value).await;
            debug!(value, "counter set");
            Ok(value)
        }
    }
}

/// `inc()` adds one and returns the new value.
pub struct Inc {
    counter: Counter,
}

impl RpcFunction for Inc {
    name!("inc");
    call! {
        async fn call(&self, _: ()) -> i64 {
            self.counter.increment().await
        }
    }
}

/// `rev([(a, b), ...])` reverses the list and swaps every pair.
pub struct Rev;

impl RpcFunction for Rev {
    name!("rev");
    call! {
        async fn call(&self, (pairs,): (Vec<(Value, Value)>,)) -> Vec<(Value, Value)> {
            Ok(reverse_swapped(pairs))
        }
    }
}

pub fn reverse_swapped(pairs: Vec<(Value, Value)>) -> Vec<(Value, Value)> {
    pairs.into_iter().rev().map(|(a, b)| (b, a)).collect()
}

pub fn dispatcher(counter: Counter) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add(Set {
        counter: counter.clone(),
    });
    dispatcher.add(Inc { counter });
    dispatcher.add(Rev);
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Call, CallError};
    use proptest::prelude::*;

    fn pair(a: impl Into<Value>, b: impl Into<Value>) -> Value {
        Value::Tuple(vec![a.into(), b.into()])
    }

    fn call(name: &str, args: Vec<Value>) -> Call {
        Call::new(name, args)
    }

    #[tokio::test]
    async fn set_then_inc() {
        let d = dispatcher(Counter::default());
        assert_eq!(d.handle(call("inc", vec![])).await, Ok(Value::Int64(3)));
        assert_eq!(d.handle(call("set", vec![10.into()])).await, Ok(Value::Int64(10)));
        for expected in 11..15 {
            assert_eq!(d.handle(call("inc", vec![])).await, Ok(Value::Int64(expected)));
        }
    }

    #[tokio::test]
    async fn inc_takes_no_arguments() {
        let counter = Counter::default();
        let d = dispatcher(counter.clone());
        assert_eq!(
            d.handle(call("inc", vec![1.into()])).await,
            Err(CallError::Arity {
                name: "inc".into(),
                expected: 0,
                actual: 1
            })
        );
        assert_eq!(
            d.handle(call("set", vec![])).await,
            Err(CallError::Arity {
                name: "set".into(),
                expected: 1,
                actual: 0
            })
        );
        assert_eq!(counter.get().await, DEFAULT_SEED);
    }

    #[tokio::test]
    async fn unknown_leaves_state_alone() {
        let counter = Counter::new(7);
        let d = dispatcher(counter.clone());
        let ret = d.handle(call("dec", vec![])).await;
        assert_eq!(ret, Err(CallError::UnknownOperation { name: "dec".into() }));
        assert_eq!(counter.get().await, 7);
    }

    #[tokio::test]
    async fn overflow_keeps_counter() {
        let counter = Counter::new(i64::MAX);
        let d = dispatcher(counter.clone());
        let ret = d.handle(call("inc", vec![])).await;
        assert!(matches!(ret, Err(CallError::Handler { .. })));
        assert_eq!(counter.get().await, i64::MAX);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments() {
        let counter = Counter::new(0);
        let d = Arc::new(dispatcher(counter.clone()));
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let d = d.clone();
                tokio::spawn(async move { d.handle(Call::new("inc", vec![])).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(counter.get().await, 50);
    }

    #[tokio::test]
    async fn rev_reverses_and_swaps() {
        let d = dispatcher(Counter::default());
        let list = Value::List(vec![pair(1, "a"), pair(2, "b"), pair(3, "c")]);
        assert_eq!(
            d.handle(call("rev", vec![list])).await,
            Ok(Value::List(vec![pair("c", 3), pair("b", 2), pair("a", 1)]))
        );
        assert_eq!(
            d.handle(call("rev", vec![Value::List(vec![])])).await,
            Ok(Value::List(vec![]))
        );
    }

    #[tokio::test]
    async fn rev_rejects_bad_shapes() {
        let d = dispatcher(Counter::default());
        let triple = Value::Tuple(vec![1.into(), 2.into(), 3.into()]);
        let ret = d
            .handle(call("rev", vec![Value::List(vec![pair(1, 2), triple])]))
            .await;
        assert!(matches!(ret, Err(CallError::Handler { ref name, .. }) if name == "rev"));

        let ret = d.handle(call("rev", vec!["not a list".into()])).await;
        assert!(matches!(ret, Err(CallError::ArgumentType { position: 0, .. })));
    }

    proptest! {
        #[test]
        fn rev_index_property(pairs in prop::collection::vec((any::<i64>(), "[a-z]{0,6}"), 0..20)) {
            let input: Vec<(Value, Value)> = pairs
                .iter()
                .map(|(n, s)| (Value::from(*n), Value::from(s.as_str())))
                .collect();
            let output = reverse_swapped(input.clone());
            let n = input.len();
            prop_assert_eq!(output.len(), n);
            for k in 0..n {
                let (a, b) = &input[n - 1 - k];
                prop_assert_eq!(&output[k], &(b.clone(), a.clone()));
            }
        }
    }
}
