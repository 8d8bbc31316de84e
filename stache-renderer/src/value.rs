//! Host values: the data a template renders against.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::deferred::Deferred;
use crate::error::RenderError;
use crate::object::{Lookup, Object};

/// A value a [`Scope`](crate::Scope) can wrap or resolve to.
///
/// `Map` is a plain keyed structure, `Node` a JSON-like document tree,
/// `Deferred` a value still being computed, and `Object` any host type that
/// exposes named members through [`Lookup`].
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(serde_json::Value),
    Deferred(Deferred),
    Object(Arc<dyn Object>),
}

impl Value {
    /// Wrap a host object.
    pub fn object<T: Lookup>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Convert any serializable value into a document-tree value.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, RenderError> {
        Ok(Value::Node(serde_json::to_value(value)?))
    }

    /// Wrap a document node, unwrapping textual and boolean leaves.
    pub fn from_node(node: serde_json::Value) -> Self {
        match node {
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Bool(b) => Value::Bool(b),
            other => Value::Node(other),
        }
    }

    /// Block on deferred values until a concrete value (or nothing) remains.
    pub fn settle(self) -> Option<Value> {
        let mut value = self;
        while let Value::Deferred(deferred) = value {
            value = deferred.wait()?;
        }
        Some(value)
    }

    /// Text written for this value by a variable tag.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Str(s) => Cow::Borrowed(s),
            Value::Bool(b) => Cow::Owned(b.to_string()),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::Float(f) => Cow::Owned(f.to_string()),
            Value::Node(node) => match node {
                serde_json::Value::Null => Cow::Borrowed(""),
                serde_json::Value::String(s) => Cow::Borrowed(s),
                other => Cow::Owned(other.to_string()),
            },
            Value::Object(object) => Cow::Owned(object.text().unwrap_or_default()),
            Value::Deferred(deferred) => Cow::Owned(
                deferred
                    .wait()
                    .map(|v| v.to_text().into_owned())
                    .unwrap_or_default(),
            ),
            Value::List(_) | Value::Map(_) => Cow::Borrowed(""),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Value::Deferred(deferred) => fmt::Debug::fmt(deferred, f),
            Value::Object(object) => write!(f, "Object({})", object.type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Deferred(a), Value::Deferred(b)) => a.same(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! int_values {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Int(i64::from(i))
            }
        })*
    };
}

int_values!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(map: BTreeMap<String, V>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(map: HashMap<String, V>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(node: serde_json::Value) -> Self {
        Value::Node(node)
    }
}

impl From<Deferred> for Value {
    fn from(deferred: Deferred) -> Self {
        Value::Deferred(deferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_of_scalars() {
        assert_eq!(Value::from("hi").to_text(), "hi");
        assert_eq!(Value::from(true).to_text(), "true");
        assert_eq!(Value::from(42u32).to_text(), "42");
        assert_eq!(Value::from(1.5).to_text(), "1.5");
        assert_eq!(Value::from(json!("doc")).to_text(), "doc");
        assert_eq!(Value::from(json!(7)).to_text(), "7");
        assert_eq!(Value::from(json!(null)).to_text(), "");
        assert_eq!(Value::from(vec!["a", "b"]).to_text(), "");
    }

    #[test]
    fn from_node_unwraps_text_and_bool_leaves() {
        assert_eq!(Value::from_node(json!("x")), Value::Str("x".into()));
        assert_eq!(Value::from_node(json!(false)), Value::Bool(false));
        assert_eq!(Value::from_node(json!(3)), Value::Node(json!(3)));
    }

    #[test]
    fn from_serialize_builds_a_document() {
        #[derive(Serialize)]
        struct Page {
            title: &'static str,
        }
        let value = Value::from_serialize(&Page { title: "Home" }).unwrap();
        assert_eq!(value, Value::Node(json!({"title": "Home"})));
    }

    #[test]
    fn settle_unwraps_nested_deferred() {
        let inner = Deferred::ready("done");
        let outer = Deferred::ready(Value::Deferred(inner));
        assert_eq!(
            Value::Deferred(outer).settle(),
            Some(Value::Str("done".into()))
        );
    }

    #[test]
    fn huge_unsigned_falls_back_to_float() {
        assert_eq!(Value::from(u64::MAX), Value::Float(u64::MAX as f64));
    }
}
