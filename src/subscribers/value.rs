//! # Tagged argument values.
//!
//! [`Value`] is the uniform argument currency of dynamic dispatch. Each value
//! narrows to a [`ParamType`] slot used to resolve a handler:
//!
//! | value                      | slot     |
//! |----------------------------|----------|
//! | `Int(i32)`                 | `int`    |
//! | `Bool(bool)`               | `bool`   |
//! | `Long(i64)`                | `long`   |
//! | `Short(i16)`               | `short`  |
//! | `Byte(i8)`                 | `byte`   |
//! | `Float(f32)`               | `float`  |
//! | `Double(f64)`              | `double` |
//! | `Char(char)`               | `char`   |
//! | `Str`, `Object`, `Null`    | `Object` |

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Parameter slot a value resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    Int,
    Bool,
    Long,
    Short,
    Byte,
    Float,
    Double,
    Char,
    /// Generic reference slot (strings, objects, null).
    Object,
}

impl ParamType {
    /// Name used in signatures and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Bool => "bool",
            ParamType::Long => "long",
            ParamType::Short => "short",
            ParamType::Byte => "byte",
            ParamType::Float => "float",
            ParamType::Double => "double",
            ParamType::Char => "char",
            ParamType::Object => "Object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dynamically typed argument.
#[derive(Clone)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Long(i64),
    Short(i16),
    Byte(i8),
    Float(f32),
    Double(f64),
    Char(char),
    Str(Arc<str>),
    Object(Arc<dyn Any + Send + Sync>),
    Null,
}

impl Value {
    /// Wraps an arbitrary shared object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    /// Slot this value narrows to.
    pub fn param_type(&self) -> ParamType {
        match self {
            Value::Int(_) => ParamType::Int,
            Value::Bool(_) => ParamType::Bool,
            Value::Long(_) => ParamType::Long,
            Value::Short(_) => ParamType::Short,
            Value::Byte(_) => ParamType::Byte,
            Value::Float(_) => ParamType::Float,
            Value::Double(_) => ParamType::Double,
            Value::Char(_) => ParamType::Char,
            Value::Str(_) | Value::Object(_) | Value::Null => ParamType::Object,
        }
    }

    /// Variant name, for mismatch reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Null => "null",
            other => other.param_type().as_str(),
        }
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrows the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows an object payload as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Long(v) => write!(f, "Long({v})"),
            Value::Short(v) => write!(f, "Short({v})"),
            Value::Byte(v) => write!(f, "Byte({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Double(v) => write!(f, "Double({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Object(_) => f.write_str("Object(..)"),
            Value::Null => f.write_str("Null"),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    i32 => Int,
    bool => Bool,
    i64 => Long,
    i16 => Short,
    i8 => Byte,
    f32 => Float,
    f64 => Double,
    char => Char,
    Arc<str> => Str,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_narrow_to_their_slot() {
        assert_eq!(Value::from(1i32).param_type(), ParamType::Int);
        assert_eq!(Value::from(true).param_type(), ParamType::Bool);
        assert_eq!(Value::from(1i64).param_type(), ParamType::Long);
        assert_eq!(Value::from(1i16).param_type(), ParamType::Short);
        assert_eq!(Value::from(1i8).param_type(), ParamType::Byte);
        assert_eq!(Value::from(1.0f32).param_type(), ParamType::Float);
        assert_eq!(Value::from(1.0f64).param_type(), ParamType::Double);
        assert_eq!(Value::from('x').param_type(), ParamType::Char);
    }

    #[test]
    fn references_use_object_slot() {
        assert_eq!(Value::from("s").param_type(), ParamType::Object);
        assert_eq!(Value::object(vec![1u8]).param_type(), ParamType::Object);
        assert_eq!(Value::Null.param_type(), ParamType::Object);
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Value::object(5u32);
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::object(5u32));
        assert_eq!(a.downcast_ref::<u32>(), Some(&5));
    }
}
