//! # Dynamic-argument executor.
//!
//! [`Executor`] invokes a registered callable with loosely-typed arguments
//! ([`serde_json::Value`]), performing arity and type-coercion checks before
//! the callable runs. In a statically typed language this is realized as an
//! adapter generated at registration time: typed constructors
//! ([`Executor::from_fn2`] and friends) wrap an ordinary Rust closure in an
//! adapter of fixed signature `Vec<Value> -> Vec<Value>`, shifting type
//! checking to registration instead of call time.
//!
//! ## Contract
//! - arity must equal the argument count (`ArgumentError` otherwise);
//! - per position, a value not directly assignable to the declared
//!   [`ArgKind`] is coerced (decimal string → integer, integer → float,
//!   number → string, `"true"`/`"false"` → bool);
//! - an irreconcilable mismatch fails with an `ArgumentError` naming
//!   position, expected and actual type — **before** any side effect of
//!   invocation;
//! - zero-, one-, and multi-argument/result signatures are handled
//!   uniformly.
//!
//! ## Example
//! ```rust
//! use jobvisor::Executor;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sum = Executor::from_fn2(|a: i64, b: i64| a + b);
//!
//! // Direct invocation.
//! let out = sum.invoke(vec![json!(1), json!(2)]).await.unwrap();
//! assert_eq!(out, vec![json!(3)]);
//!
//! // Decimal strings coerce to integers.
//! let out = sum.invoke(vec![json!("1"), json!("2")]).await.unwrap();
//! assert_eq!(out, vec![json!(3)]);
//!
//! // Irreconcilable mismatch fails before the callable runs.
//! assert!(sum.invoke(vec![json!("x"), json!(2)]).await.is_err());
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;

/// Future returned by the executor adapter.
pub type ExecFuture = Pin<Box<dyn Future<Output = Result<Vec<Value>, Error>> + Send>>;

/// Adapter of fixed signature: ordered values in, ordered values out.
pub type ExecFn = Arc<dyn Fn(Vec<Value>) -> ExecFuture + Send + Sync>;

/// Declared parameter type of one executor position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Signed integer; decimal strings and integral floats coerce.
    Int,
    /// Floating point; integers and numeric strings coerce.
    Float,
    /// Boolean; `"true"`/`"false"` strings coerce.
    Bool,
    /// String; numbers and booleans coerce via their display form.
    String,
    /// Any JSON value; passed through unchanged.
    Any,
}

impl ArgKind {
    /// Human-readable type name used in `ArgumentError`s.
    pub fn name(self) -> &'static str {
        match self {
            ArgKind::Int => "int",
            ArgKind::Float => "float",
            ArgKind::Bool => "bool",
            ArgKind::String => "string",
            ArgKind::Any => "any",
        }
    }

    /// Coerces `value` to this kind, or fails with an `ArgumentError` naming
    /// `position`.
    fn coerce(self, position: usize, value: &Value) -> Result<Value, Error> {
        let mismatch = || Error::Argument {
            position,
            expected: self.name().to_string(),
            actual: json_type_name(value).to_string(),
        };

        match self {
            ArgKind::Any => Ok(value.clone()),
            ArgKind::Int => {
                if let Some(n) = value.as_i64() {
                    return Ok(Value::from(n));
                }
                if let Some(f) = value.as_f64() {
                    if f.fract() == 0.0 {
                        return Ok(Value::from(f as i64));
                    }
                }
                if let Some(s) = value.as_str() {
                    if let Ok(n) = s.trim().parse::<i64>() {
                        return Ok(Value::from(n));
                    }
                }
                Err(mismatch())
            }
            ArgKind::Float => {
                if let Some(f) = value.as_f64() {
                    return Ok(Value::from(f));
                }
                if let Some(s) = value.as_str() {
                    if let Ok(f) = s.trim().parse::<f64>() {
                        return Ok(Value::from(f));
                    }
                }
                Err(mismatch())
            }
            ArgKind::Bool => {
                if let Some(b) = value.as_bool() {
                    return Ok(Value::from(b));
                }
                if let Some(s) = value.as_str() {
                    match s.trim() {
                        "true" => return Ok(Value::from(true)),
                        "false" => return Ok(Value::from(false)),
                        _ => {}
                    }
                }
                Err(mismatch())
            }
            ArgKind::String => match value {
                Value::String(s) => Ok(Value::from(s.clone())),
                Value::Number(n) => Ok(Value::from(n.to_string())),
                Value::Bool(b) => Ok(Value::from(b.to_string())),
                _ => Err(mismatch()),
            },
        }
    }
}

/// JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extraction of a typed parameter from a coerced [`Value`].
///
/// Implemented for the primitive kinds the engine coerces between; used by
/// the typed [`Executor`] constructors.
pub trait FromValue: Sized + Send + 'static {
    /// The declared kind this type extracts from.
    const KIND: ArgKind;

    /// Extracts the typed value; the input has already been coerced to
    /// [`Self::KIND`].
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for i64 {
    const KIND: ArgKind = ArgKind::Int;
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for f64 {
    const KIND: ArgKind = ArgKind::Float;
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for bool {
    const KIND: ArgKind = ArgKind::Bool;
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for String {
    const KIND: ArgKind = ArgKind::String;
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromValue for Value {
    const KIND: ArgKind = ArgKind::Any;
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// Conversion of a callable's return value into the ordered result list.
pub trait IntoValues: Send + 'static {
    /// Converts the return value; errors propagate as execution failures.
    fn into_values(self) -> Result<Vec<Value>, Error>;
}

impl IntoValues for () {
    fn into_values(self) -> Result<Vec<Value>, Error> {
        Ok(Vec::new())
    }
}

impl IntoValues for i64 {
    fn into_values(self) -> Result<Vec<Value>, Error> {
        Ok(vec![Value::from(self)])
    }
}

impl IntoValues for f64 {
    fn into_values(self) -> Result<Vec<Value>, Error> {
        Ok(vec![Value::from(self)])
    }
}

impl IntoValues for bool {
    fn into_values(self) -> Result<Vec<Value>, Error> {
        Ok(vec![Value::from(self)])
    }
}

impl IntoValues for String {
    fn into_values(self) -> Result<Vec<Value>, Error> {
        Ok(vec![Value::from(self)])
    }
}

impl IntoValues for Value {
    fn into_values(self) -> Result<Vec<Value>, Error> {
        Ok(vec![self])
    }
}

impl IntoValues for Vec<Value> {
    fn into_values(self) -> Result<Vec<Value>, Error> {
        Ok(self)
    }
}

impl<T: IntoValues> IntoValues for Result<T, Error> {
    fn into_values(self) -> Result<Vec<Value>, Error> {
        self.and_then(IntoValues::into_values)
    }
}

/// Dynamic-dispatch callable with declared parameter kinds.
///
/// Cheap to clone; the adapter is shared behind an `Arc`.
#[derive(Clone)]
pub struct Executor {
    params: Vec<ArgKind>,
    f: ExecFn,
}

impl Executor {
    /// Creates an executor from a declared parameter list and a raw adapter.
    ///
    /// The adapter receives arguments already coerced to `params`; use this
    /// for async callables or signatures the typed constructors don't cover.
    pub fn new(params: Vec<ArgKind>, f: ExecFn) -> Self {
        Self { params, f }
    }

    /// Declared arity.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Declared parameter kinds.
    pub fn params(&self) -> &[ArgKind] {
        &self.params
    }

    /// Verifies arity and coerces every position, without invoking.
    ///
    /// This is the check that must surface before any side effect of
    /// invocation.
    pub fn check(&self, args: &[Value]) -> Result<Vec<Value>, Error> {
        if args.len() != self.params.len() {
            return Err(Error::Argument {
                position: args.len(),
                expected: format!("{} arguments", self.params.len()),
                actual: format!("{} arguments", args.len()),
            });
        }
        self.params
            .iter()
            .zip(args)
            .enumerate()
            .map(|(pos, (kind, value))| kind.coerce(pos, value))
            .collect()
    }

    /// Checks, coerces, and invokes the callable, returning the ordered
    /// result list.
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        let coerced = self.check(&args)?;
        (self.f)(coerced).await
    }

    /// Wraps a zero-argument callable.
    pub fn from_fn0<R, F>(f: F) -> Self
    where
        R: IntoValues,
        F: Fn() -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(
            Vec::new(),
            Arc::new(move |_args| {
                let f = Arc::clone(&f);
                Box::pin(async move { f().into_values() })
            }),
        )
    }

    /// Wraps a one-argument callable.
    pub fn from_fn1<A, R, F>(f: F) -> Self
    where
        A: FromValue,
        R: IntoValues,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(
            vec![A::KIND],
            Arc::new(move |args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let a = extract::<A>(&args, 0)?;
                    f(a).into_values()
                })
            }),
        )
    }

    /// Wraps a two-argument callable.
    pub fn from_fn2<A, B, R, F>(f: F) -> Self
    where
        A: FromValue,
        B: FromValue,
        R: IntoValues,
        F: Fn(A, B) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(
            vec![A::KIND, B::KIND],
            Arc::new(move |args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let a = extract::<A>(&args, 0)?;
                    let b = extract::<B>(&args, 1)?;
                    f(a, b).into_values()
                })
            }),
        )
    }

    /// Wraps a three-argument callable.
    pub fn from_fn3<A, B, C, R, F>(f: F) -> Self
    where
        A: FromValue,
        B: FromValue,
        C: FromValue,
        R: IntoValues,
        F: Fn(A, B, C) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(
            vec![A::KIND, B::KIND, C::KIND],
            Arc::new(move |args| {
                let f = Arc::clone(&f);
                Box::pin(async move {
                    let a = extract::<A>(&args, 0)?;
                    let b = extract::<B>(&args, 1)?;
                    let c = extract::<C>(&args, 2)?;
                    f(a, b, c).into_values()
                })
            }),
        )
    }
}

/// Extracts a typed parameter from an already-coerced argument list.
fn extract<T: FromValue>(args: &[Value], position: usize) -> Result<T, Error> {
    args.get(position)
        .and_then(T::from_value)
        .ok_or_else(|| Error::Argument {
            position,
            expected: T::KIND.name().to_string(),
            actual: args
                .get(position)
                .map(json_type_name)
                .unwrap_or("missing")
                .to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sum_with_native_ints() {
        let sum = Executor::from_fn2(|a: i64, b: i64| a + b);
        let out = sum.invoke(vec![json!(1), json!(2)]).await.unwrap();
        assert_eq!(out, vec![json!(3)]);
    }

    #[tokio::test]
    async fn decimal_strings_coerce_to_ints() {
        let sum = Executor::from_fn2(|a: i64, b: i64| a + b);
        let out = sum.invoke(vec![json!("1"), json!("2")]).await.unwrap();
        assert_eq!(out, vec![json!(3)]);
    }

    #[tokio::test]
    async fn irreconcilable_mismatch_names_position_and_types() {
        let sum = Executor::from_fn2(|a: i64, b: i64| a + b);
        let err = sum.invoke(vec![json!("x"), json!("2")]).await.unwrap_err();
        match err {
            Error::Argument {
                position,
                expected,
                actual,
            } => {
                assert_eq!(position, 0);
                assert_eq!(expected, "int");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn arity_mismatch_fails_before_invocation() {
        let called = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = called.clone();
        let exec = Executor::from_fn1(move |a: i64| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            a
        });

        let err = exec.invoke(vec![json!(1), json!(2)]).await.unwrap_err();
        assert!(matches!(err, Error::Argument { .. }));
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn zero_arity_and_unit_result() {
        let exec = Executor::from_fn0(|| ());
        let out = exec.invoke(vec![]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn callable_errors_propagate_as_execution() {
        let exec = Executor::from_fn1(|n: i64| -> Result<i64, Error> {
            if n < 0 {
                Err(Error::execution("negative input"))
            } else {
                Ok(n * 2)
            }
        });
        let out = exec.invoke(vec![json!(4)]).await.unwrap();
        assert_eq!(out, vec![json!(8)]);
        let err = exec.invoke(vec![json!(-1)]).await.unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));
    }

    #[tokio::test]
    async fn mixed_kinds_coerce_per_position() {
        let exec = Executor::from_fn3(|flag: bool, n: f64, label: String| {
            vec![json!(flag), json!(n), json!(label)]
        });
        let out = exec
            .invoke(vec![json!("true"), json!(2), json!(7)])
            .await
            .unwrap();
        assert_eq!(out, vec![json!(true), json!(2.0), json!("7")]);
    }
}
