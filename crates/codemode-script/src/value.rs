//! Runtime values
//!
//! Primitives are stored inline; arrays and objects are shared, interior
//! mutable references so scripts can mutate them through any alias, as they
//! would in JavaScript. Locks are never held across an `await`.

use crate::ast::FunctionDef;
use crate::builtins::NativeFn;
use crate::error::ConversionError;
use crate::host::HostFunction;
use crate::interpreter::Interrupt;
use crate::scope::Scope;
use futures::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value as Json;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

/// Deepest array/object nesting converted to JSON or strings
pub const MAX_NESTING_DEPTH: usize = 512;

/// Shared, mutable array storage
pub type ArrayRef = Arc<Elements>;

/// Shared, mutable object storage in insertion order
pub type ObjectRef = Arc<Properties>;

/// Array contents
///
/// Dropping releases nested arrays and objects with an explicit work list,
/// so arbitrarily deep values never exhaust the native stack.
#[derive(Default)]
pub struct Elements(RwLock<Vec<Value>>);

/// Object contents; dropped like [`Elements`]
#[derive(Default)]
pub struct Properties(RwLock<IndexMap<String, Value>>);

impl Deref for Elements {
    type Target = RwLock<Vec<Value>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for Properties {
    type Target = RwLock<IndexMap<String, Value>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for Elements {
    fn drop(&mut self) {
        release(std::mem::take(self.0.get_mut()));
    }
}

impl Drop for Properties {
    fn drop(&mut self) {
        release(std::mem::take(self.0.get_mut()).into_values().collect());
    }
}

/// Drop `values`, unnesting containers this is the last owner of
fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => {
                if let Some(mut items) = Arc::into_inner(items) {
                    pending.append(items.0.get_mut());
                }
            }
            Value::Object(props) => {
                if let Some(mut props) = Arc::into_inner(props) {
                    pending.extend(std::mem::take(props.0.get_mut()).into_values());
                }
            }
            _ => {}
        }
    }
}

/// Script value
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// IEEE-754 double
    Number(f64),
    /// String
    String(String),
    /// Array reference
    Array(ArrayRef),
    /// Plain object reference
    Object(ObjectRef),
    /// Callable
    Function(Function),
    /// Pending or settled async result
    Promise(Promise),
}

/// Callable value
#[derive(Clone)]
pub enum Function {
    /// Script-defined function or arrow
    Closure(Arc<Closure>),
    /// Built-in intrinsic
    Native(NativeFn),
    /// Function provided by the embedding host
    Host(HostFn),
}

/// Script function together with its defining scope
pub struct Closure {
    pub(crate) def: Arc<FunctionDef>,
    pub(crate) scope: Scope,
}

/// Named host function
#[derive(Clone)]
pub struct HostFn {
    pub(crate) name: Arc<str>,
    pub(crate) function: Arc<dyn HostFunction>,
}

/// Async result shared by every holder
///
/// Cloning a promise shares its outcome; settling happens once.
#[derive(Clone)]
pub struct Promise {
    inner: Shared<BoxFuture<'static, Result<Value, Interrupt>>>,
}

impl Promise {
    /// Promise driven by `future`
    pub(crate) fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, Interrupt>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// Already fulfilled promise
    pub(crate) fn resolved(value: Value) -> Self {
        Self::new(futures::future::ready(Ok(value)))
    }

    /// Already rejected promise
    pub(crate) fn rejected(reason: Value) -> Self {
        Self::new(futures::future::ready(Err(Interrupt::Throw(reason))))
    }

    /// Wait for the outcome
    pub(crate) async fn settle(&self) -> Result<Value, Interrupt> {
        self.inner.clone().await
    }

    /// Future that drives the promise to completion, for spawning
    pub(crate) fn driver(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.clone().map(drop)
    }
}

impl Value {
    /// String value
    #[inline]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// New array
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Arc::new(Elements(RwLock::new(items))))
    }

    /// New object
    #[must_use]
    pub fn object(props: IndexMap<String, Value>) -> Self {
        Self::Object(Arc::new(Properties(RwLock::new(props))))
    }

    /// New object from key/value pairs
    pub fn object_from<K: Into<String>>(props: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::object(props.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Host function callable from scripts; calls return promises
    pub fn host_function(name: impl Into<Arc<str>>, function: Arc<dyn HostFunction>) -> Self {
        Self::Function(Function::Host(HostFn {
            name: name.into(),
            function,
        }))
    }

    /// Error object with `name` and `message`
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Self::object_from([
            ("name", Self::string(name)),
            ("message", Self::String(message.into())),
        ])
    }

    /// JavaScript `typeof`
    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Promise(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
        }
    }

    /// `null` or `undefined`
    #[inline]
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Check if the value can be called
    #[inline]
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// JavaScript truthiness
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) | Self::Promise(_) => true,
        }
    }

    /// JavaScript `Number(value)`
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Array(items) => {
                let single = match items.read().as_slice() {
                    [] => return 0.0,
                    [single] => single.clone(),
                    _ => return f64::NAN,
                };
                match single {
                    Self::Array(_) => match single.to_js_string().as_str() {
                        "" => 0.0,
                        text => string_to_number(text),
                    },
                    other => other.to_number(),
                }
            }
            Self::Object(_) | Self::Function(_) | Self::Promise(_) => f64::NAN,
        }
    }

    /// JavaScript `String(value)`
    #[must_use]
    pub fn to_js_string(&self) -> String {
        self.to_js_string_inner(&mut Vec::new())
    }

    fn to_js_string_inner(&self, seen: &mut Vec<usize>) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.clone(),
            Self::Array(items) => {
                let id = Arc::as_ptr(items) as usize;
                if seen.contains(&id) || seen.len() >= MAX_NESTING_DEPTH {
                    return String::new();
                }
                seen.push(id);
                let snapshot = items.read().clone();
                let joined = snapshot
                    .iter()
                    .map(|v| {
                        if v.is_nullish() {
                            String::new()
                        } else {
                            v.to_js_string_inner(seen)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                seen.pop();
                joined
            }
            Self::Object(_) => match self.error_parts() {
                Some((name, message)) if message.is_empty() => name,
                Some((name, message)) => format!("{name}: {message}"),
                None => "[object Object]".to_string(),
            },
            Self::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
            Self::Promise(_) => "[object Promise]".to_string(),
        }
    }

    /// `(name, message)` when the value is an error object
    #[must_use]
    pub fn error_parts(&self) -> Option<(String, String)> {
        let Self::Object(obj) = self else {
            return None;
        };
        let obj = obj.read();
        let Some(Self::String(message)) = obj.get("message") else {
            return None;
        };
        let name = match obj.get("name") {
            Some(Self::String(name)) => name.clone(),
            _ => "Error".to_string(),
        };
        Some((name, message.clone()))
    }

    /// Convert to JSON following `JSON.stringify` rules
    ///
    /// Returns `Ok(None)` for values `JSON.stringify` skips (`undefined`,
    /// functions, promises).
    ///
    /// # Errors
    /// Returns [`ConversionError::Circular`] when the value contains a
    /// reference cycle and [`ConversionError::TooDeep`] when containers nest
    /// deeper than [`MAX_NESTING_DEPTH`].
    pub fn to_json(&self) -> Result<Option<Json>, ConversionError> {
        self.to_json_inner(&mut Vec::new())
    }

    fn to_json_inner(&self, seen: &mut Vec<usize>) -> Result<Option<Json>, ConversionError> {
        Ok(Some(match self {
            Self::Undefined | Self::Function(_) | Self::Promise(_) => return Ok(None),
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Json::String(s.clone()),
            Self::Array(items) => {
                enter(seen, Arc::as_ptr(items) as usize)?;
                let snapshot = items.read().clone();
                let mut out = Vec::with_capacity(snapshot.len());
                for item in &snapshot {
                    out.push(item.to_json_inner(seen)?.unwrap_or(Json::Null));
                }
                seen.pop();
                Json::Array(out)
            }
            Self::Object(obj) => {
                enter(seen, Arc::as_ptr(obj) as usize)?;
                let snapshot = obj.read().clone();
                let mut out = serde_json::Map::new();
                for (key, value) in &snapshot {
                    if let Some(json) = value.to_json_inner(seen)? {
                        out.insert(key.clone(), json);
                    }
                }
                seen.pop();
                Json::Object(out)
            }
        }))
    }

    /// Convert from JSON
    #[must_use]
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::array(items.into_iter().map(Self::from_json).collect()),
            Json::Object(map) => {
                Self::object(map.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
            }
        }
    }

    /// Argument form passed to host functions: JSON, with skipped values as `null`
    #[must_use]
    pub fn to_json_lossy(&self) -> Json {
        self.to_json().ok().flatten().unwrap_or(Json::Null)
    }

    /// Text shown for a script's final value
    ///
    /// Arrays and objects are pretty-printed JSON; everything else uses its
    /// string form.
    ///
    /// # Errors
    /// Fails like [`Value::to_json`] for cyclic or too deeply nested values.
    pub fn try_result_string(&self) -> Result<String, ConversionError> {
        match self {
            Self::Array(_) | Self::Object(_) => match self.to_json()? {
                Some(json) => Ok(serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|_| self.to_js_string())),
                None => Ok(self.to_js_string()),
            },
            other => Ok(other.to_js_string()),
        }
    }

    /// [`Value::try_result_string`], falling back to the plain string form
    #[must_use]
    pub fn to_result_string(&self) -> String {
        self.try_result_string().unwrap_or_else(|_| self.to_js_string())
    }

    /// Compact form used by `console.log`
    #[must_use]
    pub fn inspect(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Array(_) | Self::Object(_) => {
                if let Some((name, message)) = self.error_parts() {
                    return format!("{name}: {message}");
                }
                match self.to_json() {
                    Ok(Some(json)) => json.to_string(),
                    _ => self.to_js_string(),
                }
            }
            other => other.to_js_string(),
        }
    }

    /// `===`
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => a.same(b),
            _ => false,
        }
    }

    /// `==`
    #[must_use]
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            #[allow(clippy::float_cmp)]
            (Self::Number(_) | Self::Bool(_), Self::String(_) | Self::Bool(_))
            | (Self::String(_) | Self::Bool(_), Self::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Self::String(_), Self::Bool(_)) => self.to_number() == other.to_number(),
            (Self::Array(_) | Self::Object(_), Self::String(_) | Self::Number(_)) => {
                Self::String(self.to_js_string()).loose_equals(other)
            }
            (Self::String(_) | Self::Number(_), Self::Array(_) | Self::Object(_)) => {
                self.loose_equals(&Self::String(other.to_js_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Property key form of the value
    #[must_use]
    pub fn to_property_key(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            other => other.to_js_string(),
        }
    }
}

impl Function {
    /// Function name, empty for anonymous functions
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Closure(c) => c.def.name.clone().unwrap_or_default(),
            Self::Native(n) => n.name().to_string(),
            Self::Host(h) => h.name.to_string(),
        }
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Closure(a), Self::Closure(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => a == b,
            (Self::Host(a), Self::Host(b)) => Arc::ptr_eq(&a.function, &b.function),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", number_to_string(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(_) | Self::Object(_) => write!(f, "{}", self.inspect()),
            Self::Function(func) => write!(f, "[Function {}]", func.name()),
            Self::Promise(_) => write!(f, "Promise"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Self::from_json(json)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Track one more container on the conversion path
fn enter(seen: &mut Vec<usize>, id: usize) -> Result<(), ConversionError> {
    if seen.contains(&id) {
        return Err(ConversionError::Circular);
    }
    if seen.len() >= MAX_NESTING_DEPTH {
        return Err(ConversionError::TooDeep);
    }
    seen.push(id);
    Ok(())
}

/// Largest integer a double represents exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// JavaScript `Number.prototype.toString()` for base 10
#[must_use]
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let magnitude = n.abs();
    if n.fract() == 0.0 && magnitude < 1e21 {
        return integer_to_string(n);
    }
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{n}");
    }
    let formatted = format!("{n:e}");
    match formatted.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => formatted,
    }
}

/// Integral double below 1e21: shortest round-trip digits, zero padded
fn integer_to_string(n: f64) -> String {
    let formatted = format!("{n:e}");
    let Some((mantissa, exp)) = formatted.split_once('e') else {
        return formatted;
    };
    let Ok(exp) = exp.parse::<usize>() else {
        return formatted;
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let padding = (exp + 1).saturating_sub(digits.len());
    format!("{sign}{digits}{}", "0".repeat(padding))
}

/// JSON number, integral when exactly representable
#[must_use]
pub fn number_to_json(n: f64) -> Json {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        #[allow(clippy::cast_possible_truncation)]
        let int = n as i64;
        return Json::from(int);
    }
    serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
}

/// JavaScript string to number conversion
#[must_use]
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn number_formatting_matches_javascript() {
        assert_eq!(number_to_string(5.0), "5");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(2.5), "2.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.234_567_890_123_456_8e20), "123456789012345680000");
        assert_eq!(number_to_string(-1e20), "-100000000000000000000");
        assert_eq!(number_to_string(2f64.powi(53)), "9007199254740992");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn type_of_follows_javascript() {
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::array(vec![]).type_of(), "object");
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::string("x").type_of(), "string");
    }

    #[test]
    fn objects_render_as_pretty_json() {
        let value = Value::from_json(json!({"b": 1, "a": [true, null]}));
        assert_eq!(
            value.to_result_string(),
            "{\n  \"b\": 1,\n  \"a\": [\n    true,\n    null\n  ]\n}"
        );
    }

    #[test]
    fn undefined_members_are_skipped_in_json() {
        let value = Value::object_from([("a", Value::Undefined), ("b", Value::Number(1.0))]);
        assert_eq!(value.to_json().unwrap(), Some(json!({"b": 1})));

        let list = Value::array(vec![Value::Undefined]);
        assert_eq!(list.to_json().unwrap(), Some(json!([null])));
    }

    #[test]
    fn cycles_are_reported() {
        let list = Value::array(vec![]);
        if let Value::Array(items) = &list {
            items.write().push(list.clone());
        }
        assert_eq!(list.to_json(), Err(ConversionError::Circular));
    }

    fn nested(depth: usize) -> Value {
        let mut value = Value::array(vec![]);
        for _ in 0..depth {
            value = Value::array(vec![value]);
        }
        value
    }

    #[test]
    fn nesting_depth_is_limited() {
        assert!(nested(MAX_NESTING_DEPTH - 1).to_json().is_ok());
        assert_eq!(nested(MAX_NESTING_DEPTH).to_json(), Err(ConversionError::TooDeep));
        assert_eq!(
            nested(MAX_NESTING_DEPTH).try_result_string(),
            Err(ConversionError::TooDeep)
        );
        assert_eq!(nested(5_000).to_js_string(), "");
    }

    #[test]
    fn deeply_nested_values_drop_and_convert_without_overflow() {
        let value = nested(500_000);
        assert_eq!(value.to_number(), 0.0);
        assert_eq!(value.to_json(), Err(ConversionError::TooDeep));
        drop(value);

        let mut object = Value::object(IndexMap::new());
        for _ in 0..500_000 {
            object = Value::object_from([("next", object)]);
        }
        drop(object);
    }

    #[test]
    fn shared_children_survive_parent_drop() {
        let child = Value::array(vec![Value::Number(1.0)]);
        let parent = Value::array(vec![child.clone(), Value::object_from([("c", child.clone())])]);
        drop(parent);
        assert_eq!(child.to_json().unwrap(), Some(json!([1])));
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::Number(1.0).loose_equals(&Value::string("1")));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(!Value::string("1").strict_equals(&Value::Number(1.0)));
    }

    #[test]
    fn error_objects_stringify_with_name() {
        let err = Value::error("TypeError", "x is not a function");
        assert_eq!(err.to_js_string(), "TypeError: x is not a function");
        assert_eq!(
            err.error_parts(),
            Some(("TypeError".to_string(), "x is not a function".to_string()))
        );
    }

    #[test]
    fn string_to_number_conversion() {
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert!(string_to_number("12px").is_nan());
    }

    proptest! {
        #[test]
        fn integers_format_without_fraction(n in -1_000_000_000i64..1_000_000_000i64) {
            #[allow(clippy::cast_precision_loss)]
            let f = n as f64;
            prop_assert_eq!(number_to_string(f), n.to_string());
            prop_assert_eq!(number_to_json(f), json!(n));
        }

        #[test]
        fn json_conversion_preserves_strings(s in ".*") {
            let value = Value::string(s.clone());
            prop_assert_eq!(value.to_json().unwrap(), Some(Json::String(s)));
        }
    }
}
