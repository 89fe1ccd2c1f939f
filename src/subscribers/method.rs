//! # Name-keyed method tables.
//!
//! A [`MethodTable<T>`] maps `(method name, signature)` to a handler taking `&T`.
//! Resolution derives the signature from the runtime argument values (see
//! [`Value::param_type`]) and requires an exact match, so overloads by
//! signature are supported:
//!
//! ```text
//! invoke(target, "onObserve", [Int(3), Str("x")])
//!     └─► signature (int, Object)
//!            └─► table["onObserve"] ─► [(int, Object) ✓, (int) ✗] ─► handler(target, args)
//! ```
//!
//! Typed registration (`method0` .. `method3`) builds the signature from the
//! [`FromValue`] parameter types and extracts arguments before calling the closure.

use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::value::{ParamType, Value};
use crate::error::DispatchError;

/// Result returned by method handlers.
pub type MethodResult = Result<(), Box<dyn Error + Send + Sync>>;

type Handler<T> = Box<dyn Fn(&T, &[Value]) -> Result<(), DispatchError> + Send + Sync>;

/// Ordered list of parameter slots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature(Vec<ParamType>);

impl Signature {
    /// Builds a signature from explicit slots.
    pub fn new(params: impl Into<Vec<ParamType>>) -> Self {
        Self(params.into())
    }

    /// Derives the signature of an argument list.
    pub fn of(args: &[Value]) -> Self {
        Self(args.iter().map(Value::param_type).collect())
    }

    /// Parameter slots.
    pub fn params(&self) -> &[ParamType] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p.as_str())?;
        }
        f.write_str(")")
    }
}

/// Conversion from a dispatch argument into a handler parameter.
pub trait FromValue: Sized {
    /// Slot this parameter occupies in the signature.
    const PARAM: ParamType;

    /// Extracts argument `index`.
    fn from_value(index: usize, value: &Value) -> Result<Self, DispatchError>;
}

fn mismatch(index: usize, expected: &'static str, value: &Value) -> DispatchError {
    DispatchError::ArgumentMismatch {
        index,
        expected,
        actual: value.kind_name(),
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident / $param:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const PARAM: ParamType = ParamType::$param;

                fn from_value(index: usize, value: &Value) -> Result<Self, DispatchError> {
                    match value {
                        Value::$variant(v) => Ok(*v),
                        other => Err(mismatch(index, ParamType::$param.as_str(), other)),
                    }
                }
            }
        )*
    };
}

impl_from_value! {
    i32 => Int / Int,
    bool => Bool / Bool,
    i64 => Long / Long,
    i16 => Short / Short,
    i8 => Byte / Byte,
    f32 => Float / Float,
    f64 => Double / Double,
    char => Char / Char,
}

/// Generic object slot receiving the raw value.
impl FromValue for Value {
    const PARAM: ParamType = ParamType::Object;

    fn from_value(_index: usize, value: &Value) -> Result<Self, DispatchError> {
        Ok(value.clone())
    }
}

impl FromValue for Arc<str> {
    const PARAM: ParamType = ParamType::Object;

    fn from_value(index: usize, value: &Value) -> Result<Self, DispatchError> {
        match value {
            Value::Str(s) => Ok(Arc::clone(s)),
            other => Err(mismatch(index, "string", other)),
        }
    }
}

impl FromValue for String {
    const PARAM: ParamType = ParamType::Object;

    fn from_value(index: usize, value: &Value) -> Result<Self, DispatchError> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(mismatch(index, "string", other)),
        }
    }
}

/// Name-keyed callable registry for subscriber type `T`.
pub struct MethodTable<T> {
    methods: HashMap<Cow<'static, str>, Vec<(Signature, Handler<T>)>>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }
}

impl<T: 'static> MethodTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an explicit signature; arguments are passed through untouched.
    ///
    /// Re-registering the same name and signature replaces the previous handler.
    pub fn raw<F>(mut self, name: impl Into<Cow<'static, str>>, signature: Signature, f: F) -> Self
    where
        F: Fn(&T, &[Value]) -> MethodResult + Send + Sync + 'static,
    {
        let name = name.into();
        let method = name.to_string();
        let handler: Handler<T> = Box::new(move |target, args| {
            f(target, args).map_err(|err| DispatchError::Failed {
                method: method.clone(),
                reason: err.to_string(),
            })
        });

        let overloads = self.methods.entry(name).or_default();
        if let Some(slot) = overloads.iter_mut().find(|(sig, _)| *sig == signature) {
            debug!(%signature, "replacing method handler");
            slot.1 = handler;
        } else {
            overloads.push((signature, handler));
        }
        self
    }

    /// Registers a handler with no parameters.
    pub fn method0<F>(self, name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(&T) -> MethodResult + Send + Sync + 'static,
    {
        self.raw(name, Signature::default(), move |target, _| f(target))
    }

    /// Registers a handler with one typed parameter.
    pub fn method1<A, F>(self, name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        A: FromValue,
        F: Fn(&T, A) -> MethodResult + Send + Sync + 'static,
    {
        self.typed(name, vec![A::PARAM], move |target, args| {
            let a = A::from_value(0, &args[0])?;
            Ok(f(target, a))
        })
    }

    /// Registers a handler with two typed parameters.
    pub fn method2<A, B, F>(self, name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        A: FromValue,
        B: FromValue,
        F: Fn(&T, A, B) -> MethodResult + Send + Sync + 'static,
    {
        self.typed(name, vec![A::PARAM, B::PARAM], move |target, args| {
            let a = A::from_value(0, &args[0])?;
            let b = B::from_value(1, &args[1])?;
            Ok(f(target, a, b))
        })
    }

    /// Registers a handler with three typed parameters.
    pub fn method3<A, B, C, F>(self, name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        A: FromValue,
        B: FromValue,
        C: FromValue,
        F: Fn(&T, A, B, C) -> MethodResult + Send + Sync + 'static,
    {
        self.typed(
            name,
            vec![A::PARAM, B::PARAM, C::PARAM],
            move |target, args| {
                let a = A::from_value(0, &args[0])?;
                let b = B::from_value(1, &args[1])?;
                let c = C::from_value(2, &args[2])?;
                Ok(f(target, a, b, c))
            },
        )
    }

    // Extraction errors surface as-is; handler errors become `Failed`.
    fn typed<F>(mut self, name: impl Into<Cow<'static, str>>, params: Vec<ParamType>, f: F) -> Self
    where
        F: Fn(&T, &[Value]) -> Result<MethodResult, DispatchError> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = name.to_string();
        let signature = Signature::new(params);
        let handler: Handler<T> = Box::new(move |target, args| {
            f(target, args)?.map_err(|err| DispatchError::Failed {
                method: method.clone(),
                reason: err.to_string(),
            })
        });

        let overloads = self.methods.entry(name).or_default();
        overloads.retain(|(sig, _)| *sig != signature);
        overloads.push((signature, handler));
        self
    }

    /// Resolves and invokes `method` on `target`.
    pub fn invoke(&self, target: &T, method: &str, args: &[Value]) -> Result<(), DispatchError> {
        let signature = Signature::of(args);
        let handler = self.methods.get(method).and_then(|overloads| {
            overloads
                .iter()
                .find(|(sig, _)| *sig == signature)
                .map(|(_, h)| h)
        });

        match handler {
            Some(h) => h(target, args),
            None => Err(DispatchError::MethodNotFound {
                method: method.to_string(),
                signature: signature.to_string(),
                target: std::any::type_name::<T>(),
            }),
        }
    }

    /// True when a handler matches `method` and `signature` exactly.
    pub fn resolves(&self, method: &str, signature: &Signature) -> bool {
        self.methods
            .get(method)
            .is_some_and(|o| o.iter().any(|(sig, _)| sig == signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Target {
        seen: Mutex<Vec<String>>,
    }

    fn table() -> MethodTable<Target> {
        MethodTable::new()
            .method0("ping", |t: &Target| {
                t.seen.lock().push("ping".into());
                Ok(())
            })
            .method2("onObserve", |t: &Target, ty: i32, info: Value| {
                t.seen.lock().push(format!("observe {ty} {info:?}"));
                Ok(())
            })
            .method1("onObserve", |t: &Target, ty: i32| {
                t.seen.lock().push(format!("observe {ty}"));
                Ok(())
            })
            .method1("scale", |t: &Target, v: f64| {
                t.seen.lock().push(format!("scale {v}"));
                Ok(())
            })
            .method1("named", |t: &Target, name: String| {
                t.seen.lock().push(format!("named {name}"));
                Ok(())
            })
            .method0("broken", |_: &Target| Err("nope".into()))
    }

    #[test]
    fn resolves_by_name_and_narrowed_signature() {
        let table = table();
        let t = Target::default();

        table.invoke(&t, "ping", &[]).unwrap();
        table
            .invoke(&t, "onObserve", &[Value::Int(3), Value::from("x")])
            .unwrap();
        table.invoke(&t, "onObserve", &[Value::Int(4)]).unwrap();
        table.invoke(&t, "scale", &[Value::Double(1.5)]).unwrap();

        assert_eq!(
            *t.seen.lock(),
            vec![
                "ping".to_string(),
                "observe 3 Str(\"x\")".to_string(),
                "observe 4".to_string(),
                "scale 1.5".to_string(),
            ]
        );
    }

    #[test]
    fn wrong_primitive_width_does_not_resolve() {
        let table = table();
        let t = Target::default();

        let err = table.invoke(&t, "scale", &[Value::Float(1.5)]).unwrap_err();
        assert!(matches!(err, DispatchError::MethodNotFound { .. }));
        assert!(err.to_string().contains("scale(float)"));

        let err = table.invoke(&t, "missing", &[]).unwrap_err();
        assert_eq!(err.as_label(), "dispatch_method_not_found");
    }

    #[test]
    fn object_slot_extraction_can_mismatch() {
        let table = table();
        let t = Target::default();

        let err = table
            .invoke(&t, "named", &[Value::object(1u8)])
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ArgumentMismatch {
                index: 0,
                expected: "string",
                actual: "object"
            }
        ));
        table.invoke(&t, "named", &[Value::from("bob")]).unwrap();
        assert_eq!(t.seen.lock().last().unwrap(), "named bob");
    }

    #[test]
    fn handler_errors_become_failed() {
        let table = table();
        let err = table
            .invoke(&Target::default(), "broken", &[])
            .unwrap_err();
        assert!(matches!(err, DispatchError::Failed { ref reason, .. } if reason == "nope"));
    }

    #[test]
    fn signature_renders_slots() {
        let sig = Signature::of(&[Value::Int(1), Value::Null, Value::Char('c')]);
        assert_eq!(sig.to_string(), "(int, Object, char)");
        assert!(table().resolves("onObserve", &Signature::new([ParamType::Int])));
    }
}
