use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod de;

pub use de::MAX_DEPTH;

/// The variant tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Type {
    Int64,
    Float64,
    Text,
    List,
    Tuple,
}

impl Type {
    pub fn name(&self) -> &'static str {
        use Type::*;
        match self {
            Int64 => "Int64",
            Float64 => "Float64",
            Text => "Text",
            List => "List",
            Tuple => "Tuple",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A self-describing value, exchanged as call arguments and results.
///
/// `List` is a collection of any length, `Tuple` is a positional record whose
/// arity is fixed by whoever consumes it. On the wire a value is a record with
/// exactly one of the fields `int64`, `float64`, `text`, `list` or `tuple`.
/// Decoding rejects values nested deeper than [`MAX_DEPTH`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Int64(i64),
    Float64(f64),
    Text(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn typ(&self) -> Type {
        match self {
            Value::Int64(_) => Type::Int64,
            Value::Float64(_) => Type::Float64,
            Value::Text(_) => Type::Text,
            Value::List(_) => Type::List,
            Value::Tuple(_) => Type::Tuple,
        }
    }

    fn mismatch(&self, expected: Type) -> TypeMismatch {
        TypeMismatch::new(expected, self.typ())
    }

    pub fn as_int64(&self) -> Result<i64, TypeMismatch> {
        match self {
            Value::Int64(n) => Ok(*n),
            _ => Err(self.mismatch(Type::Int64)),
        }
    }

    pub fn as_float64(&self) -> Result<f64, TypeMismatch> {
        match self {
            Value::Float64(x) => Ok(*x),
            _ => Err(self.mismatch(Type::Float64)),
        }
    }

    pub fn as_text(&self) -> Result<&str, TypeMismatch> {
        match self {
            Value::Text(s) => Ok(s),
            _ => Err(self.mismatch(Type::Text)),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], TypeMismatch> {
        match self {
            Value::List(items) => Ok(items),
            _ => Err(self.mismatch(Type::List)),
        }
    }

    pub fn as_tuple(&self) -> Result<&[Value], TypeMismatch> {
        match self {
            Value::Tuple(items) => Ok(items),
            _ => Err(self.mismatch(Type::Tuple)),
        }
    }

    pub fn into_text(self) -> Result<String, TypeMismatch> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(other.mismatch(Type::Text)),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value>, TypeMismatch> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch(Type::List)),
        }
    }

    pub fn into_tuple(self) -> Result<Vec<Value>, TypeMismatch> {
        match self {
            Value::Tuple(items) => Ok(items),
            other => Err(other.mismatch(Type::Tuple)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int64(n) => write!(f, "{n}"),
            Value::Float64(x) => fmt_float(*x, f),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                fmt_seq(items, f)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                fmt_seq(items, f)?;
                f.write_str(")")
            }
        }
    }
}

fn fmt_float(x: f64, f: &mut fmt::Formatter) -> fmt::Result {
    if x.is_finite() && x.abs() >= 1e9 {
        write!(f, "{x:e}")
    } else if x.fract() == 0.0 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

fn fmt_seq(items: &[Value], f: &mut fmt::Formatter) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float64(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

/// A named invocation with positional arguments.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Call {
    pub name: String,
    pub args: Vec<Value>,
}

impl Call {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        fmt_seq(&self.args, f)?;
        f.write_str(")")
    }
}

pub trait Encode {
    fn encode(val: Self) -> Value;
}

pub trait Decode: Sized {
    fn decode(val: Value) -> Result<Self, DecodeError>;
}

macro_rules! impl_encode_decode {
    ($rust_type:ty, $rpc_type:expr, $encode_name:pat => $encode_expr:expr, $($from_rpc_arm:tt)*) => {
        impl Encode for $rust_type {
            fn encode($encode_name: $rust_type) -> Value {
                $encode_expr
            }
        }

        impl Decode for $rust_type {
            fn decode(val: Value) -> Result<Self, DecodeError> {
                Ok(match val {
                    $($from_rpc_arm)*,
                    _ => return Err(TypeMismatch::new($rpc_type, val.typ()).into())
                })
            }
        }
    };
}

impl_encode_decode!(i64, Type::Int64, n => Value::Int64(n), Value::Int64(n) => n);
impl_encode_decode!(f64, Type::Float64, x => Value::Float64(x), Value::Float64(x) => x);
impl_encode_decode!(String, Type::Text, s => Value::Text(s), Value::Text(s) => s);

impl Encode for Value {
    fn encode(val: Value) -> Value {
        val
    }
}

impl Decode for Value {
    fn decode(val: Value) -> Result<Self, DecodeError> {
        Ok(val)
    }
}

impl Encode for &str {
    fn encode(s: Self) -> Value {
        Value::Text(s.to_owned())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(items: Vec<T>) -> Value {
        Value::List(items.into_iter().map(T::encode).collect())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(val: Value) -> Result<Self, DecodeError> {
        val.into_list()?
            .into_iter()
            .enumerate()
            .map(|(index, item)| T::decode(item).map_err(|e| DecodeError::element(index, e)))
            .collect()
    }
}

// Rust tuples travel as `Value::Tuple` of the same arity.
macro_rules! impl_tuple {
    ($len:expr; $($name:ident $var:ident $index:tt),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            fn encode(val: Self) -> Value {
                Value::Tuple(vec![$($name::encode(val.$index)),+])
            }
        }

        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(val: Value) -> Result<Self, DecodeError> {
                let [$($var),+] = <[Value; $len]>::try_from(val.into_tuple()?).map_err(
                    |items: Vec<Value>| DecodeError::TupleArity {
                        expected: $len,
                        actual: items.len(),
                    },
                )?;
                Ok(($($name::decode($var).map_err(|e| DecodeError::element($index, e))?,)+))
            }
        }
    };
}

impl_tuple!(2; A a 0, B b 1);
impl_tuple!(3; A a 0, B b 1, C c 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Error)]
#[error("expected {expected}, found {actual}")]
pub struct TypeMismatch {
    pub expected: Type,
    pub actual: Type,
}

impl TypeMismatch {
    pub fn new(expected: Type, actual: Type) -> Self {
        Self { expected, actual }
    }
}

/// Why a [`Value`] could not be decoded into a Rust type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Mismatch(#[from] TypeMismatch),

    #[error("expected a tuple of {expected} elements, found {actual}")]
    TupleArity { expected: usize, actual: usize },

    #[error("element {index}: {inner}")]
    Element {
        index: usize,
        inner: Box<DecodeError>,
    },
}

impl DecodeError {
    fn element(index: usize, inner: DecodeError) -> Self {
        DecodeError::Element {
            index,
            inner: Box::new(inner),
        }
    }
}

/// A positional argument list decoded as a whole.
///
/// Implemented for Rust tuples of [`Decode`] types (one element per argument)
/// and for `Vec<Value>`, which accepts any number of arguments.
pub trait FromArgs: Sized {
    /// Required argument count, `None` when variadic.
    const ARITY: Option<usize>;

    fn from_args(args: Vec<Value>) -> Result<Self, ArgsError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgsError {
    #[error("expected {expected} arguments, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("argument {position}: expected {expected}, found {actual}")]
    ArgumentType {
        position: usize,
        expected: Type,
        actual: Type,
    },

    #[error("argument {position}: {error}")]
    Shape { position: usize, error: DecodeError },
}

fn decode_arg<T: Decode>(position: usize, arg: Value) -> Result<T, ArgsError> {
    T::decode(arg).map_err(|error| match error {
        DecodeError::Mismatch(TypeMismatch { expected, actual }) => ArgsError::ArgumentType {
            position,
            expected,
            actual,
        },
        error => ArgsError::Shape { position, error },
    })
}

impl FromArgs for () {
    const ARITY: Option<usize> = Some(0);

    fn from_args(args: Vec<Value>) -> Result<Self, ArgsError> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(ArgsError::Arity {
                expected: 0,
                actual: args.len(),
            })
        }
    }
}

impl FromArgs for Vec<Value> {
    const ARITY: Option<usize> = None;

    fn from_args(args: Vec<Value>) -> Result<Self, ArgsError> {
        Ok(args)
    }
}

macro_rules! impl_from_args {
    ($len:expr; $($name:ident $var:ident $index:tt),+) => {
        impl<$($name: Decode),+> FromArgs for ($($name,)+) {
            const ARITY: Option<usize> = Some($len);

            fn from_args(args: Vec<Value>) -> Result<Self, ArgsError> {
                let [$($var),+] = <[Value; $len]>::try_from(args).map_err(
                    |args: Vec<Value>| ArgsError::Arity {
                        expected: $len,
                        actual: args.len(),
                    },
                )?;
                Ok(($(decode_arg::<$name>($index, $var)?,)+))
            }
        }
    };
}

impl_from_args!(1; A a 0);
impl_from_args!(2; A a 0, B b 1);
impl_from_args!(3; A a 0, B b 1, C c 2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_report_mismatch() {
        let v = Value::from("hello");
        assert_eq!(v.as_text(), Ok("hello"));
        assert_eq!(
            v.as_int64(),
            Err(TypeMismatch::new(Type::Int64, Type::Text))
        );
        assert_eq!(
            Value::List(vec![]).as_tuple(),
            Err(TypeMismatch::new(Type::Tuple, Type::List))
        );
        assert_eq!(Value::Tuple(vec![1.into()]).as_tuple().map(|t| t.len()), Ok(1));
    }

    #[test]
    fn list_and_tuple_are_distinct() {
        let items = vec![Value::from(1), Value::from(2)];
        assert_ne!(Value::List(items.clone()), Value::Tuple(items));
    }

    #[test]
    fn display_nested() {
        let v = Value::List(vec![
            Value::Tuple(vec![Value::from(1), Value::from("a")]),
            Value::Float64(2.0),
            Value::Float64(0.5),
            Value::Float64(3e12),
        ]);
        assert_eq!(v.to_string(), r#"[(1, "a"), 2.0, 0.5, 3e12]"#);
        assert_eq!(
            Call::new("rev", vec![Value::List(vec![])]).to_string(),
            "rev([])"
        );
    }

    #[test]
    fn decode_pairs() {
        let pair = Value::Tuple(vec![Value::from("a"), Value::from(1)]);
        let (s, n) = <(String, i64)>::decode(pair).unwrap();
        assert_eq!((s.as_str(), n), ("a", 1));

        let triple = Value::Tuple(vec![1.into(), 2.into(), 3.into()]);
        assert_eq!(
            <(i64, i64)>::decode(triple),
            Err(DecodeError::TupleArity {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn decode_list_reports_element() {
        let list = Value::List(vec![Value::from(1), Value::from("two")]);
        let err = <Vec<i64>>::decode(list).unwrap_err();
        assert_eq!(err, DecodeError::element(1, TypeMismatch::new(Type::Int64, Type::Text).into()));
        assert_eq!(err.to_string(), "element 1: expected Int64, found Text");
    }

    #[test]
    fn encode_nested() {
        let v = Vec::<(i64, String)>::encode(vec![(1, "x".to_owned())]);
        assert_eq!(
            v,
            Value::List(vec![Value::Tuple(vec![1.into(), "x".into()])])
        );
    }

    #[test]
    fn from_args_checks_arity_and_types() {
        assert_eq!(<()>::from_args(vec![]), Ok(()));
        assert_eq!(
            <()>::from_args(vec![1.into()]),
            Err(ArgsError::Arity {
                expected: 0,
                actual: 1
            })
        );
        assert_eq!(
            <(i64,)>::from_args(vec!["x".into()]),
            Err(ArgsError::ArgumentType {
                position: 0,
                expected: Type::Int64,
                actual: Type::Text
            })
        );
        let nested = <(Vec<(i64, i64)>,)>::from_args(vec![Value::List(vec![Value::Tuple(
            vec![1.into()],
        )])]);
        assert!(matches!(nested, Err(ArgsError::Shape { position: 0, .. })));
        assert_eq!(<Vec<Value>>::ARITY, None);
    }
}
