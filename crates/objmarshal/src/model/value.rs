//! The closed set of serializable value kinds.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::model::{ObjectId, ProcedureRecord};

/// A text value.
///
/// Interned texts are canonicalized per graph: the graph hands out one node
/// per distinct interned content, so identity comparisons between them are
/// meaningful after a load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Text {
    pub value: String,
    pub interned: bool,
}

impl Text {
    /// Creates a plain (non-interned) text.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            interned: false,
        }
    }

    /// Creates an interned text.
    pub fn interned(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            interned: true,
        }
    }

    /// Returns true if every character is ASCII.
    pub fn is_ascii(&self) -> bool {
        self.value.is_ascii()
    }
}

/// A node in an object graph.
///
/// Container kinds refer to their children by [`ObjectId`], which is what
/// lets a graph share values and contain cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The unit value (none).
    Unit,

    /// Boolean value.
    Bool(bool),

    /// The ellipsis singleton.
    Ellipsis,

    /// Integer that fits a machine word.
    Int(i64),

    /// Arbitrary-precision integer.
    ///
    /// Values that fit `i64` are canonically stored as [`Value::Int`]; use
    /// [`Value::integer`] to get the canonical form.
    BigInt(BigInt),

    /// IEEE-754 binary64.
    Float(f64),

    /// Complex number as two binary64 parts.
    Complex { real: f64, imag: f64 },

    /// Raw octets.
    Bytes(Vec<u8>),

    /// Unicode text.
    Text(Text),

    /// Ordered, immutable sequence.
    Tuple(Vec<ObjectId>),

    /// Ordered, mutable sequence.
    Sequence(Vec<ObjectId>),

    /// Key/value pairs in emission order.
    Mapping(Vec<(ObjectId, ObjectId)>),

    /// Mutable set.
    MutableSet(Vec<ObjectId>),

    /// Immutable set.
    ImmutableSet(Vec<ObjectId>),

    /// Slice bounds, each itself a value.
    Slice {
        start: ObjectId,
        stop: ObjectId,
        step: ObjectId,
    },

    /// Compiled procedure record.
    ProcedureRecord(Box<ProcedureRecord>),

    /// Reserved reference slot whose value is still being read.
    Pending,

    /// A kind the codec cannot represent.
    Unsupported(&'static str),
}

impl Value {
    /// Returns the canonical integer value: `Int` when it fits `i64`.
    pub fn integer(value: BigInt) -> Value {
        match value.to_i64() {
            Some(small) => Value::Int(small),
            None => Value::BigInt(value),
        }
    }

    /// Returns a short name for the value's kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Ellipsis => "ellipsis",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Complex { .. } => "complex",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Tuple(_) => "tuple",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::MutableSet(_) => "set",
            Value::ImmutableSet(_) => "frozenset",
            Value::Slice { .. } => "slice",
            Value::ProcedureRecord(_) => "procedure record",
            Value::Pending => "pending slot",
            Value::Unsupported(kind) => *kind,
        }
    }

    /// Returns true for kinds that are never reference-tracked.
    pub fn is_singleton(&self) -> bool {
        matches!(self, Value::Unit | Value::Bool(_) | Value::Ellipsis)
    }

    /// Calls `f` for every child id, in emission order.
    pub fn for_each_child(&self, mut f: impl FnMut(ObjectId)) {
        match self {
            Value::Tuple(items)
            | Value::Sequence(items)
            | Value::MutableSet(items)
            | Value::ImmutableSet(items) => items.iter().copied().for_each(f),
            Value::Mapping(entries) => {
                for &(key, value) in entries {
                    f(key);
                    f(value);
                }
            }
            Value::Slice { start, stop, step } => {
                f(*start);
                f(*stop);
                f(*step);
            }
            Value::ProcedureRecord(record) => record.fields().into_iter().for_each(f),
            _ => {}
        }
    }

    /// Returns the text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(&text.value),
            _ => None,
        }
    }

    /// Returns the integer as a `BigInt`, if this is an integer value.
    pub fn as_bigint(&self) -> Option<BigInt> {
        match self {
            Value::Int(v) => Some(BigInt::from(*v)),
            Value::BigInt(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Text::new(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(Text::new(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_canonical_form() {
        assert_eq!(Value::integer(BigInt::from(42)), Value::Int(42));
        assert_eq!(Value::integer(BigInt::from(i64::MIN)), Value::Int(i64::MIN));

        let big: BigInt = BigInt::from(i64::MAX) + 1;
        assert_eq!(Value::integer(big.clone()), Value::BigInt(big));
    }

    #[test]
    fn test_children_order() {
        let a = ObjectId::from_index(10);
        let b = ObjectId::from_index(11);
        let c = ObjectId::from_index(12);

        let mut seen = Vec::new();
        Value::Mapping(vec![(a, b), (c, a)]).for_each_child(|id| seen.push(id));
        assert_eq!(seen, vec![a, b, c, a]);

        seen.clear();
        Value::Slice { start: c, stop: b, step: a }.for_each_child(|id| seen.push(id));
        assert_eq!(seen, vec![c, b, a]);

        seen.clear();
        Value::Float(1.0).for_each_child(|id| seen.push(id));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_singletons() {
        assert!(Value::Unit.is_singleton());
        assert!(Value::Bool(true).is_singleton());
        assert!(Value::Ellipsis.is_singleton());
        assert!(!Value::Int(0).is_singleton());
        assert!(!Value::Text(Text::interned("x")).is_singleton());
    }
}
