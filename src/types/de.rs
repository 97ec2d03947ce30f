//! Decoding for [`Value`] with a bound on how deeply lists and tuples nest.
//!
//! The wire shape is the same one `#[derive(Serialize)]` produces: an
//! externally tagged enum, so `{"list": [...]}` in JSON and a variant index
//! in bincode.

use super::Value;
use serde::de::{self, DeserializeSeed, EnumAccess, SeqAccess, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Deepest nesting accepted when decoding. A scalar has depth 1 and every
/// enclosing list or tuple adds one.
pub const MAX_DEPTH: usize = 64;

const VARIANTS: &[&str] = &["int64", "float64", "text", "list", "tuple"];

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Nested { depth: 1 }.deserialize(deserializer)
    }
}

#[derive(Clone, Copy)]
struct Nested {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for Nested {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        if self.depth > MAX_DEPTH {
            return Err(de::Error::custom(format_args!(
                "value nested deeper than {MAX_DEPTH} levels"
            )));
        }
        deserializer.deserialize_enum("Value", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for Nested {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Value, A::Error> {
        let (tag, variant) = data.variant()?;
        let items = Items {
            depth: self.depth + 1,
        };
        Ok(match tag {
            Tag::Int64 => Value::Int64(variant.newtype_variant()?),
            Tag::Float64 => Value::Float64(variant.newtype_variant()?),
            Tag::Text => Value::Text(variant.newtype_variant()?),
            Tag::List => Value::List(variant.newtype_variant_seed(items)?),
            Tag::Tuple => Value::Tuple(variant.newtype_variant_seed(items)?),
        })
    }
}

/// The elements of a list or tuple, one level below their container.
struct Items {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for Items {
    type Value = Vec<Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<Value>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for Items {
    type Value = Vec<Value>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a sequence of values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Value>, A::Error> {
        // Length prefixes come from the peer.
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
        let element = Nested { depth: self.depth };
        while let Some(item) = seq.next_element_seed(element)? {
            items.push(item);
        }
        Ok(items)
    }
}

enum Tag {
    Int64,
    Float64,
    Text,
    List,
    Tuple,
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_identifier(TagVisitor)
    }
}

struct TagVisitor;

impl<'de> Visitor<'de> for TagVisitor {
    type Value = Tag;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a value variant")
    }

    fn visit_u64<E: de::Error>(self, index: u64) -> Result<Tag, E> {
        Ok(match index {
            0 => Tag::Int64,
            1 => Tag::Float64,
            2 => Tag::Text,
            3 => Tag::List,
            4 => Tag::Tuple,
            _ => return Err(E::invalid_value(de::Unexpected::Unsigned(index), &self)),
        })
    }

    fn visit_str<E: de::Error>(self, name: &str) -> Result<Tag, E> {
        Ok(match name {
            "int64" => Tag::Int64,
            "float64" => Tag::Float64,
            "text" => Tag::Text,
            "list" => Tag::List,
            "tuple" => Tag::Tuple,
            _ => return Err(E::unknown_variant(name, VARIANTS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincode::Options;

    /// `depth - 1` single-element lists around `Int64(7)`, in the varint
    /// encoding the transport uses.
    fn nested_lists(depth: usize) -> Vec<u8> {
        let mut bytes = [3u8, 1].repeat(depth - 1);
        bytes.extend([0, 14]);
        bytes
    }

    fn decode(bytes: &[u8]) -> bincode::Result<Value> {
        bincode::options().deserialize(bytes)
    }

    fn depth(value: &Value) -> usize {
        match value {
            Value::List(items) | Value::Tuple(items) => {
                1 + items.iter().map(depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }

    #[test]
    fn accepts_up_to_the_limit() {
        let value = decode(&nested_lists(MAX_DEPTH)).unwrap();
        assert_eq!(depth(&value), MAX_DEPTH);
    }

    #[test]
    fn rejects_deeper_values() {
        let err = decode(&nested_lists(MAX_DEPTH + 1)).unwrap_err();
        assert!(err.to_string().contains("nested deeper"), "{err}");
        assert!(decode(&nested_lists(100_000)).is_err());
    }

    #[test]
    fn json_shape() {
        let value: Value =
            serde_json::from_str(r#"{"tuple": [{"int64": 1}, {"list": [{"text": "a"}]}]}"#)
                .unwrap();
        assert_eq!(
            value,
            Value::Tuple(vec![1.into(), Value::List(vec!["a".into()])])
        );
        let err = serde_json::from_str::<Value>(r#"{"bool": true}"#).unwrap_err();
        assert!(err.to_string().contains("unknown variant"), "{err}");
    }

    #[test]
    fn bad_variant_index() {
        assert!(decode(&[9, 0]).is_err());
    }
}
