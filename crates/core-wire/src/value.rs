//! Wire object model.
//!
//! A closed enum rather than a dynamic/any type: every shape the peer can
//! send has an explicit arm, and unknown tags fail decode at the boundary
//! instead of leaking stringly-typed payloads upward.

use std::fmt;

/// Typed extension handle. Opaque identifiers the editor hands out for its
/// own objects; higher layers treat them as tokens and only ever echo them
/// back. Distinct wire tags per kind keep a buffer handle from ever being
/// mistaken for a window handle or a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtHandle {
    Buffer(u64),
    Window(u64),
    Tab(u64),
}

impl ExtHandle {
    pub fn raw(&self) -> u64 {
        match self {
            ExtHandle::Buffer(id) | ExtHandle::Window(id) | ExtHandle::Tab(id) => *id,
        }
    }
}

impl fmt::Display for ExtHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtHandle::Buffer(id) => write!(f, "buf:{id}"),
            ExtHandle::Window(id) => write!(f, "win:{id}"),
            ExtHandle::Tab(id) => write!(f, "tab:{id}"),
        }
    }
}

/// One wire value. Maps are association lists (insertion-ordered, small in
/// practice) rather than hash maps so decode stays allocation-light and
/// deterministic for tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Ext(ExtHandle),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Non-negative integer accessor; rejects negatives rather than wrapping.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(n) if *n >= 0 => Some(*n as u64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_ext(&self) -> Option<ExtHandle> {
        match self {
            Value::Ext(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Map lookup by string key (first match wins, mirroring peer semantics).
    pub fn map_get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ExtHandle> for Value {
    fn from(handle: ExtHandle) -> Self {
        Value::Ext(handle)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_reject_other_arms() {
        assert_eq!(Value::Int(7).as_str(), None);
        assert_eq!(Value::Str("x".into()).as_i64(), None);
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Int(42).as_u64(), Some(42));
    }

    #[test]
    fn map_get_first_match() {
        let map = Value::Map(vec![
            (Value::from("mode"), Value::from("insert")),
            (Value::from("mode"), Value::from("normal")),
        ]);
        assert_eq!(map.map_get("mode").and_then(Value::as_str), Some("insert"));
        assert!(map.map_get("missing").is_none());
    }

    #[test]
    fn ext_handles_are_distinct_kinds() {
        assert_ne!(
            Value::Ext(ExtHandle::Buffer(1)),
            Value::Ext(ExtHandle::Window(1))
        );
        assert_eq!(ExtHandle::Tab(9).raw(), 9);
    }
}
