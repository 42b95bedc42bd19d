//! Intrinsic globals and built-in methods
//!
//! Globals: `JSON`, `Math`, `Object`, `Array`, `Promise`, `Number`,
//! `String`, `Boolean`, the `Error` constructors, `parseInt`, `parseFloat`,
//! `isNaN`, `isFinite`, `console` and `Date.now`.
//!
//! Methods on arrays, strings, numbers and promises are resolved by name at
//! call time rather than stored on prototypes.

use crate::interpreter::{
    array_len, ensure_callable, get_member, index_of, len_to_number, Eval, Interpreter, Interrupt,
};
use crate::value::{number_to_string, ArrayRef, Function, Promise, Value};
use futures::future::{join_all, select_all, try_join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Error constructor flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorKind {
    /// Constructor name, also the `name` of created errors
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
            Self::ReferenceError => "ReferenceError",
            Self::SyntaxError => "SyntaxError",
        }
    }
}

/// `Math` function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MathFn {
    Abs,
    Ceil,
    Floor,
    Round,
    Trunc,
    Sign,
    Sqrt,
    Cbrt,
    Exp,
    Log,
    Log2,
    Log10,
    Max,
    Min,
    Pow,
    Random,
}

impl MathFn {
    const ALL: [Self; 16] = [
        Self::Abs,
        Self::Ceil,
        Self::Floor,
        Self::Round,
        Self::Trunc,
        Self::Sign,
        Self::Sqrt,
        Self::Cbrt,
        Self::Exp,
        Self::Log,
        Self::Log2,
        Self::Log10,
        Self::Max,
        Self::Min,
        Self::Pow,
        Self::Random,
    ];

    /// Property name on `Math`
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Round => "round",
            Self::Trunc => "trunc",
            Self::Sign => "sign",
            Self::Sqrt => "sqrt",
            Self::Cbrt => "cbrt",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Log2 => "log2",
            Self::Log10 => "log10",
            Self::Max => "max",
            Self::Min => "min",
            Self::Pow => "pow",
            Self::Random => "random",
        }
    }

    fn apply(self, args: &[Value]) -> f64 {
        let x = args.first().map_or(f64::NAN, Value::to_number);
        match self {
            Self::Abs => x.abs(),
            Self::Ceil => x.ceil(),
            Self::Floor => x.floor(),
            Self::Round => {
                let floor = x.floor();
                if x - floor >= 0.5 {
                    floor + 1.0
                } else {
                    floor
                }
            }
            Self::Trunc => x.trunc(),
            Self::Sign => {
                if x.is_nan() || x == 0.0 {
                    x
                } else {
                    x.signum()
                }
            }
            Self::Sqrt => x.sqrt(),
            Self::Cbrt => x.cbrt(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Log2 => x.log2(),
            Self::Log10 => x.log10(),
            Self::Max => args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else {
                    acc.max(n)
                }
            }),
            Self::Min => args.iter().map(Value::to_number).fold(f64::INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else {
                    acc.min(n)
                }
            }),
            Self::Pow => x.powf(args.get(1).map_or(f64::NAN, Value::to_number)),
            Self::Random => rand::random::<f64>(),
        }
    }
}

/// `console` method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ConsoleLevel {
    Log,
    Debug,
    Info,
    Warn,
    Error,
}

impl ConsoleLevel {
    fn name(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Built-in function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NativeFn {
    StringCtor,
    NumberCtor,
    BooleanCtor,
    ArrayCtor,
    ObjectCtor,
    PromiseCtor,
    ErrorCtor(ErrorKind),
    ParseInt,
    ParseFloat,
    IsNaN,
    IsFinite,
    NumberIsNaN,
    NumberIsFinite,
    NumberIsInteger,
    JsonStringify,
    JsonParse,
    Math(MathFn),
    ObjectKeys,
    ObjectValues,
    ObjectEntries,
    ObjectAssign,
    ObjectFromEntries,
    ObjectFreeze,
    ArrayIsArray,
    ArrayFrom,
    ArrayOf,
    PromiseAll,
    PromiseAllSettled,
    PromiseRace,
    PromiseResolve,
    PromiseReject,
    Console(ConsoleLevel),
    DateNow,
}

impl NativeFn {
    /// Function name as reported by `fn.name`
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::StringCtor => "String",
            Self::NumberCtor => "Number",
            Self::BooleanCtor => "Boolean",
            Self::ArrayCtor => "Array",
            Self::ObjectCtor => "Object",
            Self::PromiseCtor => "Promise",
            Self::ErrorCtor(kind) => kind.name(),
            Self::ParseInt => "parseInt",
            Self::ParseFloat => "parseFloat",
            Self::IsNaN | Self::NumberIsNaN => "isNaN",
            Self::IsFinite | Self::NumberIsFinite => "isFinite",
            Self::NumberIsInteger => "isInteger",
            Self::JsonStringify => "stringify",
            Self::JsonParse => "parse",
            Self::Math(f) => f.name(),
            Self::ObjectKeys => "keys",
            Self::ObjectValues => "values",
            Self::ObjectEntries => "entries",
            Self::ObjectAssign => "assign",
            Self::ObjectFromEntries => "fromEntries",
            Self::ObjectFreeze => "freeze",
            Self::ArrayIsArray => "isArray",
            Self::ArrayFrom => "from",
            Self::ArrayOf => "of",
            Self::PromiseAll => "all",
            Self::PromiseAllSettled => "allSettled",
            Self::PromiseRace => "race",
            Self::PromiseResolve => "resolve",
            Self::PromiseReject => "reject",
            Self::Console(level) => level.name(),
            Self::DateNow => "now",
        }
    }

    /// Whether `new` may be applied
    #[must_use]
    pub fn is_constructor(self) -> bool {
        matches!(
            self,
            Self::ErrorCtor(_)
                | Self::ArrayCtor
                | Self::ObjectCtor
                | Self::StringCtor
                | Self::NumberCtor
                | Self::BooleanCtor
        )
    }
}

fn native(f: NativeFn) -> Value {
    Value::Function(Function::Native(f))
}

/// Global bindings installed in every interpreter
pub(crate) fn intrinsics() -> Vec<(String, Value)> {
    let mut math: Vec<(&str, Value)> = MathFn::ALL
        .iter()
        .map(|f| (f.name(), native(NativeFn::Math(*f))))
        .collect();
    math.push(("PI", Value::Number(std::f64::consts::PI)));
    math.push(("E", Value::Number(std::f64::consts::E)));

    let console = [
        ConsoleLevel::Log,
        ConsoleLevel::Debug,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
    ]
    .map(|level| (level.name(), native(NativeFn::Console(level))));

    let mut globals = vec![
        ("String", native(NativeFn::StringCtor)),
        ("Number", native(NativeFn::NumberCtor)),
        ("Boolean", native(NativeFn::BooleanCtor)),
        ("Array", native(NativeFn::ArrayCtor)),
        ("Object", native(NativeFn::ObjectCtor)),
        ("Promise", native(NativeFn::PromiseCtor)),
        ("parseInt", native(NativeFn::ParseInt)),
        ("parseFloat", native(NativeFn::ParseFloat)),
        ("isNaN", native(NativeFn::IsNaN)),
        ("isFinite", native(NativeFn::IsFinite)),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        (
            "JSON",
            Value::object_from([
                ("stringify", native(NativeFn::JsonStringify)),
                ("parse", native(NativeFn::JsonParse)),
            ]),
        ),
        ("Math", Value::object_from(math)),
        ("console", Value::object_from(console)),
        ("Date", Value::object_from([("now", native(NativeFn::DateNow))])),
    ];
    for kind in [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
    ] {
        globals.push((kind.name(), native(NativeFn::ErrorCtor(kind))));
    }

    globals.into_iter().map(|(name, value)| (name.to_string(), value)).collect()
}

/// Static property of a built-in constructor
pub(crate) fn native_static(f: NativeFn, key: &str) -> Option<Value> {
    use NativeFn as N;
    let method = match (f, key) {
        (_, "name") => return Some(Value::string(f.name())),
        (N::ObjectCtor, "keys") => N::ObjectKeys,
        (N::ObjectCtor, "values") => N::ObjectValues,
        (N::ObjectCtor, "entries") => N::ObjectEntries,
        (N::ObjectCtor, "assign") => N::ObjectAssign,
        (N::ObjectCtor, "fromEntries") => N::ObjectFromEntries,
        (N::ObjectCtor, "freeze") => N::ObjectFreeze,
        (N::ArrayCtor, "isArray") => N::ArrayIsArray,
        (N::ArrayCtor, "from") => N::ArrayFrom,
        (N::ArrayCtor, "of") => N::ArrayOf,
        (N::PromiseCtor, "all") => N::PromiseAll,
        (N::PromiseCtor, "allSettled") => N::PromiseAllSettled,
        (N::PromiseCtor, "race") => N::PromiseRace,
        (N::PromiseCtor, "resolve") => N::PromiseResolve,
        (N::PromiseCtor, "reject") => N::PromiseReject,
        (N::NumberCtor, "isNaN") => N::NumberIsNaN,
        (N::NumberCtor, "isFinite") => N::NumberIsFinite,
        (N::NumberCtor, "isInteger" | "isSafeInteger") => N::NumberIsInteger,
        (N::NumberCtor, "parseFloat") => N::ParseFloat,
        (N::NumberCtor, "parseInt") => N::ParseInt,
        (N::NumberCtor, "MAX_SAFE_INTEGER") => return Some(Value::Number(9_007_199_254_740_991.0)),
        (N::NumberCtor, "MIN_SAFE_INTEGER") => return Some(Value::Number(-9_007_199_254_740_991.0)),
        (N::NumberCtor, "EPSILON") => return Some(Value::Number(f64::EPSILON)),
        (N::NumberCtor, "POSITIVE_INFINITY") => return Some(Value::Number(f64::INFINITY)),
        (N::NumberCtor, "NEGATIVE_INFINITY") => return Some(Value::Number(f64::NEG_INFINITY)),
        (N::NumberCtor, "NaN") => return Some(Value::Number(f64::NAN)),
        _ => return None,
    };
    Some(native(method))
}

/// Largest string `repeat` and `padStart` may build
const MAX_STRING_BYTES: usize = 1 << 28;

/// Largest array length a script may request in one step
pub(crate) const MAX_ARRAY_LEN: usize = 1 << 22;

const ARRAY_METHODS: &[&str] = &[
    "push", "pop", "shift", "unshift", "slice", "splice", "concat", "join", "indexOf",
    "lastIndexOf", "includes", "at", "reverse", "fill", "flat", "toString", "forEach", "map",
    "filter", "find", "findIndex", "findLast", "findLastIndex", "some", "every", "flatMap",
    "reduce", "reduceRight", "sort",
];

const STRING_METHODS: &[&str] = &[
    "toLowerCase", "toLocaleLowerCase", "toUpperCase", "toLocaleUpperCase", "trim", "trimStart",
    "trimEnd", "includes", "startsWith", "endsWith", "indexOf", "lastIndexOf", "slice", "substring",
    "charAt", "charCodeAt", "at", "split", "replace", "replaceAll", "padStart", "padEnd", "repeat",
    "concat", "localeCompare", "toString", "valueOf", "normalize",
];

/// Check if `receiver` has a built-in method called `name`
pub(crate) fn has_method(receiver: &Value, name: &str) -> bool {
    match receiver {
        Value::Array(_) => ARRAY_METHODS.contains(&name),
        Value::String(_) => STRING_METHODS.contains(&name),
        Value::Number(_) => matches!(name, "toFixed" | "toString" | "valueOf"),
        Value::Promise(_) => matches!(name, "then" | "catch" | "finally"),
        Value::Object(_) => matches!(name, "hasOwnProperty" | "toString"),
        _ => false,
    }
}

/// Values produced by `for...of` and spread
pub(crate) fn iterate(value: &Value) -> Eval<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.read().clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Object(_) => Err(Interrupt::type_error("object is not iterable")),
        other => Err(Interrupt::type_error(format!(
            "{} is not iterable",
            other.to_js_string()
        ))),
    }
}

fn index_keys(len: usize) -> Vec<Value> {
    (0..len).map(|i| Value::String(i.to_string())).collect()
}

/// Keys produced by `for...in`
pub(crate) fn keys_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Object(obj) => obj.read().keys().cloned().map(Value::String).collect(),
        Value::Array(items) => index_keys(items.read().len()),
        Value::String(s) => index_keys(s.chars().count()),
        _ => Vec::new(),
    }
}

fn to_integer(value: &Value) -> f64 {
    let n = value.to_number();
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// Resolve a possibly negative index against `len`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = to_integer(value);
    let len_f = len_to_number(len);
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}

fn slice_range(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let start = relative_index(start, len, 0);
    let end = relative_index(end, len, len);
    (start, end.max(start))
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

fn position(n: f64) -> Value {
    Value::Number(n)
}

fn char_index(s: &str, byte: usize) -> f64 {
    len_to_number(s[..byte].chars().count())
}

fn flatten(items: &[Value], depth: f64, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => {
                let inner = inner.read().clone();
                flatten(&inner, depth - 1.0, out);
            }
            other => out.push(other.clone()),
        }
    }
}

/// `parseInt(text, radix)`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_int(text: &str, radix: &Value) -> f64 {
    let s = text.trim_start();
    let (negative, mut s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let requested = to_integer(radix);
    let mut radix = if requested == 0.0 { 10 } else { requested as u32 };
    if requested == 0.0 || radix == 16 {
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = hex;
            radix = 16;
        }
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let mut value: Option<f64> = None;
    for c in s.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        value = Some(value.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
    }
    match value {
        Some(v) if negative => -v,
        Some(v) => v,
        None => f64::NAN,
    }
}

/// `parseFloat(text)`: longest numeric prefix
fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    if s.starts_with("Infinity") || s.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if s.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    let candidate_len = s
        .char_indices()
        .find(|(_, c)| !matches!(c, '0'..='9' | '+' | '-' | '.' | 'e' | 'E'))
        .map_or(s.len(), |(i, _)| i);
    let candidate = &s[..candidate_len];
    (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn json_stringify(value: &Value, indent: &Value) -> Eval<Value> {
    let json = match value.to_json() {
        Ok(Some(json)) => json,
        Ok(None) => return Ok(Value::Undefined),
        Err(e) => return Err(Interrupt::error(e.error_name(), e.to_string())),
    };
    let indent: String = match indent {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Value::Number(n) if *n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return Ok(Value::String(json.to_string()));
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut serializer)
        .map_err(|e| Interrupt::type_error(e.to_string()))?;
    Ok(Value::String(String::from_utf8_lossy(&buf).into_owned()))
}

fn json_parse(text: &str) -> Eval<Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from_json)
        .map_err(|e| Interrupt::error("SyntaxError", format!("Unexpected token in JSON: {e}")))
}

fn entries_of(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(obj) => obj.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Array(items) => items
            .read()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::String(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

async fn settle_value(value: Value) -> Eval<Value> {
    match value {
        Value::Promise(promise) => promise.settle().await,
        other => Ok(other),
    }
}

fn console(level: ConsoleLevel, args: &[Value]) {
    let line = args.iter().map(Value::inspect).collect::<Vec<_>>().join(" ");
    match level {
        ConsoleLevel::Log | ConsoleLevel::Info => {
            tracing::info!(target: "codemode::console", "{line}");
        }
        ConsoleLevel::Debug => tracing::debug!(target: "codemode::console", "{line}"),
        ConsoleLevel::Warn => tracing::warn!(target: "codemode::console", "{line}"),
        ConsoleLevel::Error => tracing::error!(target: "codemode::console", "{line}"),
    }
}

impl Interpreter {
    /// Call a built-in function
    pub(crate) async fn call_native(
        &self,
        f: NativeFn,
        args: Vec<Value>,
        depth: usize,
    ) -> Eval<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        Ok(match f {
            NativeFn::StringCtor => match args.first() {
                Some(value) => Value::String(value.to_js_string()),
                None => Value::string(""),
            },
            NativeFn::NumberCtor => Value::Number(args.first().map_or(0.0, Value::to_number)),
            NativeFn::BooleanCtor => Value::Bool(arg(0).truthy()),
            NativeFn::ArrayCtor => match args.as_slice() {
                [Value::Number(n)] => Value::array(vec![Value::Undefined; array_len(*n)?]),
                _ => Value::array(args),
            },
            NativeFn::ObjectCtor => match arg(0) {
                value @ (Value::Object(_) | Value::Array(_)) => value,
                _ => Value::object(IndexMap::new()),
            },
            NativeFn::PromiseCtor => {
                return Err(Interrupt::type_error(
                    "Promise constructor is not supported; use async functions",
                ))
            }
            NativeFn::ErrorCtor(kind) => {
                let message = match arg(0) {
                    Value::Undefined => String::new(),
                    value => value.to_js_string(),
                };
                Value::error(kind.name(), message)
            }
            NativeFn::ParseInt => Value::Number(parse_int(&arg(0).to_js_string(), &arg(1))),
            NativeFn::ParseFloat => Value::Number(parse_float(&arg(0).to_js_string())),
            NativeFn::IsNaN => Value::Bool(arg(0).to_number().is_nan()),
            NativeFn::IsFinite => Value::Bool(arg(0).to_number().is_finite()),
            NativeFn::NumberIsNaN => Value::Bool(matches!(arg(0), Value::Number(n) if n.is_nan())),
            NativeFn::NumberIsFinite => {
                Value::Bool(matches!(arg(0), Value::Number(n) if n.is_finite()))
            }
            NativeFn::NumberIsInteger => {
                Value::Bool(matches!(arg(0), Value::Number(n) if n.is_finite() && n.fract() == 0.0))
            }
            NativeFn::JsonStringify => json_stringify(&arg(0), &arg(2))?,
            NativeFn::JsonParse => json_parse(&arg(0).to_js_string())?,
            NativeFn::Math(f) => Value::Number(f.apply(&args)),
            NativeFn::ObjectKeys => Value::array(
                entries_of(&arg(0))
                    .into_iter()
                    .map(|(k, _)| Value::String(k))
                    .collect(),
            ),
            NativeFn::ObjectValues => {
                Value::array(entries_of(&arg(0)).into_iter().map(|(_, v)| v).collect())
            }
            NativeFn::ObjectEntries => Value::array(
                entries_of(&arg(0))
                    .into_iter()
                    .map(|(k, v)| Value::array(vec![Value::String(k), v]))
                    .collect(),
            ),
            NativeFn::ObjectAssign => {
                let target = arg(0);
                let Value::Object(obj) = &target else {
                    return Err(Interrupt::type_error("Cannot convert undefined or null to object"));
                };
                for source in args.iter().skip(1) {
                    let entries = entries_of(source);
                    obj.write().extend(entries);
                }
                target
            }
            NativeFn::ObjectFromEntries => {
                let mut props = IndexMap::new();
                for entry in iterate(&arg(0))? {
                    let pair = iterate(&entry)?;
                    let key = pair.first().map(Value::to_property_key).unwrap_or_default();
                    props.insert(key, pair.get(1).cloned().unwrap_or_default());
                }
                Value::object(props)
            }
            NativeFn::ObjectFreeze => arg(0),
            NativeFn::ArrayIsArray => Value::Bool(matches!(arg(0), Value::Array(_))),
            NativeFn::ArrayFrom => {
                let source = arg(0);
                let items = match &source {
                    Value::Object(_) => {
                        let len = array_len(to_integer(&get_member(&source, "length")?).max(0.0))?;
                        (0..len)
                            .map(|i| get_member(&source, &i.to_string()))
                            .collect::<Eval<Vec<_>>>()?
                    }
                    other => iterate(other)?,
                };
                let mapper = arg(1);
                if mapper.is_callable() {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.into_iter().enumerate() {
                        let index = Value::Number(len_to_number(i));
                        out.push(self.call_value(mapper.clone(), vec![item, index], depth).await?);
                    }
                    Value::array(out)
                } else {
                    Value::array(items)
                }
            }
            NativeFn::ArrayOf => Value::array(args),
            NativeFn::PromiseAll => {
                let items = iterate(&arg(0))?;
                Value::Promise(Promise::new(async move {
                    let values = try_join_all(items.into_iter().map(settle_value)).await?;
                    Ok(Value::array(values))
                }))
            }
            NativeFn::PromiseAllSettled => {
                let items = iterate(&arg(0))?;
                Value::Promise(Promise::new(async move {
                    let outcomes = join_all(items.into_iter().map(settle_value)).await;
                    let mut results = Vec::with_capacity(outcomes.len());
                    for outcome in outcomes {
                        results.push(match outcome {
                            Ok(value) => Value::object_from([
                                ("status", Value::string("fulfilled")),
                                ("value", value),
                            ]),
                            Err(Interrupt::Throw(reason)) => Value::object_from([
                                ("status", Value::string("rejected")),
                                ("reason", reason),
                            ]),
                            Err(Interrupt::Timeout) => return Err(Interrupt::Timeout),
                        });
                    }
                    Ok(Value::array(results))
                }))
            }
            NativeFn::PromiseRace => {
                let items = iterate(&arg(0))?;
                if items.is_empty() {
                    Value::Promise(Promise::new(futures::future::pending()))
                } else {
                    let racers: Vec<BoxFuture<'static, Eval<Value>>> =
                        items.into_iter().map(|item| settle_value(item).boxed()).collect();
                    Value::Promise(Promise::new(async move {
                        let (winner, _, _) = select_all(racers).await;
                        winner
                    }))
                }
            }
            NativeFn::PromiseResolve => match arg(0) {
                promise @ Value::Promise(_) => promise,
                value => Value::Promise(Promise::resolved(value)),
            },
            NativeFn::PromiseReject => Value::Promise(Promise::rejected(arg(0))),
            NativeFn::Console(level) => {
                console(level, &args);
                Value::Undefined
            }
            NativeFn::DateNow => {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0.0, |d| d.as_secs_f64() * 1000.0);
                Value::Number(millis.floor())
            }
        })
    }

    async fn callback(
        &self,
        f: &Value,
        item: &Value,
        index: usize,
        receiver: &Value,
        depth: usize,
    ) -> Eval<Value> {
        self.call_value(
            f.clone(),
            vec![item.clone(), Value::Number(len_to_number(index)), receiver.clone()],
            depth,
        )
        .await
    }

    /// Built-in array method; `None` when `name` is not one
    pub(crate) async fn array_method(
        &self,
        array: &ArrayRef,
        name: &str,
        args: Vec<Value>,
        depth: usize,
    ) -> Eval<Option<Value>> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        let receiver = Value::Array(Arc::clone(array));

        let value = match name {
            "push" => {
                let mut items = array.write();
                items.extend(args.iter().cloned());
                Value::Number(len_to_number(items.len()))
            }
            "pop" => array.write().pop().unwrap_or_default(),
            "shift" => {
                let mut items = array.write();
                if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                }
            }
            "unshift" => {
                let mut items = array.write();
                items.splice(0..0, args.iter().cloned());
                Value::Number(len_to_number(items.len()))
            }
            "slice" => {
                let items = array.read();
                let (start, end) = slice_range(items.len(), &arg(0), &arg(1));
                Value::array(items[start..end].to_vec())
            }
            "splice" => {
                let mut items = array.write();
                let len = items.len();
                let start = relative_index(&arg(0), len, 0);
                let count = if args.len() < 2 {
                    len - start
                } else {
                    relative_index(&Value::Number(to_integer(&arg(1)).max(0.0)), len - start, 0)
                };
                let removed: Vec<Value> = items
                    .splice(start..start + count, args.iter().skip(2).cloned())
                    .collect();
                Value::array(removed)
            }
            "concat" => {
                let mut out = array.read().clone();
                for other in &args {
                    match other {
                        Value::Array(more) => {
                            let more = more.read().clone();
                            out.extend(more);
                        }
                        value => out.push(value.clone()),
                    }
                }
                Value::array(out)
            }
            "join" => {
                let separator = match arg(0) {
                    Value::Undefined => ",".to_string(),
                    value => value.to_js_string(),
                };
                let items = array.read().clone();
                Value::String(
                    items
                        .iter()
                        .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                        .collect::<Vec<_>>()
                        .join(&separator),
                )
            }
            "toString" => Value::String(receiver.to_js_string()),
            "indexOf" | "lastIndexOf" | "includes" => {
                let needle = arg(0);
                let items = array.read().clone();
                let found = if name == "lastIndexOf" {
                    items.iter().rposition(|v| v.strict_equals(&needle))
                } else if name == "includes" {
                    items.iter().position(|v| same_value_zero(v, &needle))
                } else {
                    let from = relative_index(&arg(1), items.len(), 0);
                    items
                        .get(from..)
                        .and_then(|rest| rest.iter().position(|v| v.strict_equals(&needle)))
                        .map(|i| i + from)
                };
                if name == "includes" {
                    Value::Bool(found.is_some())
                } else {
                    position(found.map_or(-1.0, len_to_number))
                }
            }
            "at" => {
                let items = array.read();
                let n = to_integer(&arg(0));
                let index = if n < 0.0 { len_to_number(items.len()) + n } else { n };
                index_of(index).and_then(|i| items.get(i).cloned()).unwrap_or_default()
            }
            "reverse" => {
                array.write().reverse();
                receiver
            }
            "fill" => {
                let fill = arg(0);
                let mut items = array.write();
                let (start, end) = slice_range(items.len(), &arg(1), &arg(2));
                for slot in &mut items[start..end] {
                    *slot = fill.clone();
                }
                drop(items);
                receiver
            }
            "flat" => {
                let depth_limit = match arg(0) {
                    Value::Undefined => 1.0,
                    value => to_integer(&value),
                };
                let items = array.read().clone();
                let mut out = Vec::new();
                flatten(&items, depth_limit, &mut out);
                Value::array(out)
            }
            "forEach" | "map" | "filter" | "find" | "findIndex" | "findLast" | "findLastIndex"
            | "some" | "every" | "flatMap" => {
                let f = arg(0);
                ensure_callable(&f)?;
                let items = array.read().clone();
                self.iterate_with(&f, name, &items, &receiver, depth).await?
            }
            "reduce" | "reduceRight" => {
                let f = arg(0);
                ensure_callable(&f)?;
                let items = array.read().clone();
                let mut order: Vec<usize> = (0..items.len()).collect();
                if name == "reduceRight" {
                    order.reverse();
                }
                let mut order = order.into_iter();
                let mut acc = if args.len() >= 2 {
                    arg(1)
                } else {
                    match order.next() {
                        Some(first) => items[first].clone(),
                        None => {
                            return Err(Interrupt::type_error(
                                "Reduce of empty array with no initial value",
                            ))
                        }
                    }
                };
                for i in order {
                    let index = Value::Number(len_to_number(i));
                    let args = vec![acc, items[i].clone(), index, receiver.clone()];
                    acc = self.call_value(f.clone(), args, depth).await?;
                }
                acc
            }
            "sort" => {
                let comparator = match arg(0) {
                    Value::Undefined => None,
                    f => {
                        ensure_callable(&f)?;
                        Some(f)
                    }
                };
                let items = array.read().clone();
                let sorted = self.merge_sort(items, comparator.as_ref(), depth).await?;
                *array.write() = sorted;
                receiver
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    async fn iterate_with(
        &self,
        f: &Value,
        name: &str,
        items: &[Value],
        receiver: &Value,
        depth: usize,
    ) -> Eval<Value> {
        let mut mapped = Vec::new();
        let reversed = matches!(name, "findLast" | "findLastIndex");
        let order: Vec<usize> = if reversed {
            (0..items.len()).rev().collect()
        } else {
            (0..items.len()).collect()
        };

        for i in order {
            let item = &items[i];
            let result = self.callback(f, item, i, receiver, depth).await?;
            match name {
                "map" => mapped.push(result),
                "flatMap" => match result {
                    Value::Array(inner) => {
                        let inner = inner.read().clone();
                        mapped.extend(inner);
                    }
                    other => mapped.push(other),
                },
                "filter" => {
                    if result.truthy() {
                        mapped.push(item.clone());
                    }
                }
                "find" | "findLast" if result.truthy() => return Ok(item.clone()),
                "findIndex" | "findLastIndex" if result.truthy() => {
                    return Ok(position(len_to_number(i)));
                }
                "some" if result.truthy() => return Ok(Value::Bool(true)),
                "every" if !result.truthy() => return Ok(Value::Bool(false)),
                _ => {}
            }
        }

        Ok(match name {
            "map" | "flatMap" | "filter" => Value::array(mapped),
            "findIndex" | "findLastIndex" => position(-1.0),
            "some" => Value::Bool(false),
            "every" => Value::Bool(true),
            _ => Value::Undefined,
        })
    }

    /// Stable bottom-up merge sort with an optional script comparator
    async fn merge_sort(
        &self,
        mut items: Vec<Value>,
        comparator: Option<&Value>,
        depth: usize,
    ) -> Eval<Vec<Value>> {
        let n = items.len();
        let mut width = 1;
        while width < n {
            let mut merged = Vec::with_capacity(n);
            let mut start = 0;
            while start < n {
                let mid = (start + width).min(n);
                let end = (start + 2 * width).min(n);
                let (mut i, mut j) = (start, mid);
                while i < mid && j < end {
                    if self.compare(&items[j], &items[i], comparator, depth).await? < 0.0 {
                        merged.push(items[j].clone());
                        j += 1;
                    } else {
                        merged.push(items[i].clone());
                        i += 1;
                    }
                }
                merged.extend_from_slice(&items[i..mid]);
                merged.extend_from_slice(&items[j..end]);
                start = end;
            }
            items = merged;
            width *= 2;
        }
        Ok(items)
    }

    async fn compare(
        &self,
        a: &Value,
        b: &Value,
        comparator: Option<&Value>,
        depth: usize,
    ) -> Eval<f64> {
        match (a, b) {
            (Value::Undefined, Value::Undefined) => return Ok(0.0),
            (Value::Undefined, _) => return Ok(1.0),
            (_, Value::Undefined) => return Ok(-1.0),
            _ => {}
        }
        let Some(f) = comparator else {
            return Ok(match a.to_js_string().cmp(&b.to_js_string()) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            });
        };
        let result = self.call_value(f.clone(), vec![a.clone(), b.clone()], depth).await?;
        let n = result.to_number();
        Ok(if n.is_nan() { 0.0 } else { n })
    }

    /// `then`, `catch` and `finally`; `None` for other names
    pub(crate) fn promise_method(
        &self,
        promise: &Promise,
        name: &str,
        args: Vec<Value>,
    ) -> Option<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        let (on_fulfilled, on_rejected, on_finally) = match name {
            "then" => (Some(arg(0)), Some(arg(1)), None),
            "catch" => (None, Some(arg(0)), None),
            "finally" => (None, None, Some(arg(0))),
            _ => return None,
        };

        let this = self.clone();
        let source = promise.clone();
        let next = self.spawn(async move {
            let outcome = source.settle().await;
            if let Some(callback) = on_finally.filter(Value::is_callable) {
                let result = this.call_value(callback, Vec::new(), 0).await?;
                this.resolve(result).await?;
                return outcome;
            }
            let handler = match &outcome {
                Ok(_) => on_fulfilled,
                Err(Interrupt::Throw(_)) => on_rejected,
                Err(Interrupt::Timeout) => None,
            };
            match (handler.filter(Value::is_callable), outcome) {
                (Some(handler), Ok(value) | Err(Interrupt::Throw(value))) => {
                    let result = this.call_value(handler, vec![value], 0).await?;
                    this.resolve(result).await
                }
                (_, outcome) => outcome,
            }
        });
        Some(Value::Promise(next))
    }
}

/// Built-in string method; `None` when `name` is not one
pub(crate) fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Eval<Value>> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    let text = |i: usize| arg(i).to_js_string();
    let chars = || s.chars().collect::<Vec<char>>();

    let value = match name {
        "toLowerCase" | "toLocaleLowerCase" => Value::String(s.to_lowercase()),
        "toUpperCase" | "toLocaleUpperCase" => Value::String(s.to_uppercase()),
        "trim" => Value::string(s.trim()),
        "trimStart" => Value::string(s.trim_start()),
        "trimEnd" => Value::string(s.trim_end()),
        "toString" | "valueOf" | "normalize" => Value::string(s),
        "includes" => Value::Bool(s.contains(text(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text(0).as_str())),
        "indexOf" => position(s.find(text(0).as_str()).map_or(-1.0, |b| char_index(s, b))),
        "lastIndexOf" => position(s.rfind(text(0).as_str()).map_or(-1.0, |b| char_index(s, b))),
        "slice" => {
            let chars = chars();
            let (start, end) = slice_range(chars.len(), &arg(0), &arg(1));
            Value::String(chars[start..end].iter().collect())
        }
        "substring" => {
            let chars = chars();
            let len = chars.len();
            let clamp = |value: &Value, default: usize| -> usize {
                if matches!(value, Value::Undefined) {
                    default
                } else {
                    index_of(to_integer(value).clamp(0.0, len_to_number(len))).unwrap_or(0)
                }
            };
            let (a, b) = (clamp(&arg(0), 0), clamp(&arg(1), len));
            Value::String(chars[a.min(b)..a.max(b)].iter().collect())
        }
        "charAt" => Value::String(
            index_of(to_integer(&arg(0)))
                .and_then(|i| s.chars().nth(i))
                .map(String::from)
                .unwrap_or_default(),
        ),
        "charCodeAt" => position(
            index_of(to_integer(&arg(0)))
                .and_then(|i| s.encode_utf16().nth(i))
                .map_or(f64::NAN, f64::from),
        ),
        "at" => {
            let chars = chars();
            let n = to_integer(&arg(0));
            let index = if n < 0.0 { len_to_number(chars.len()) + n } else { n };
            index_of(index)
                .and_then(|i| chars.get(i))
                .map_or(Value::Undefined, |c| Value::String(c.to_string()))
        }
        "split" => {
            let mut parts: Vec<Value> = match arg(0) {
                Value::Undefined => vec![Value::string(s)],
                separator => {
                    let separator = separator.to_js_string();
                    if separator.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(Value::string).collect()
                    }
                }
            };
            if let Value::Number(limit) = arg(1) {
                parts.truncate(index_of(limit.max(0.0).trunc()).unwrap_or(parts.len()));
            }
            Value::array(parts)
        }
        "replace" | "replaceAll" => {
            if arg(1).is_callable() {
                return Some(Err(Interrupt::type_error(format!(
                    "{name} with a replacer function is not supported"
                ))));
            }
            let (pattern, replacement) = (text(0), text(1));
            if name == "replace" {
                Value::String(s.replacen(pattern.as_str(), &replacement, 1))
            } else {
                Value::String(s.replace(pattern.as_str(), &replacement))
            }
        }
        "padStart" | "padEnd" => {
            let target = index_of(to_integer(&arg(0)).max(0.0)).unwrap_or(0);
            let fill = match arg(1) {
                Value::Undefined => " ".to_string(),
                value => value.to_js_string(),
            };
            let current = s.chars().count();
            if target > MAX_STRING_BYTES {
                return Some(Err(Interrupt::range_error("Invalid string length")));
            }
            if target <= current || fill.is_empty() {
                Value::string(s)
            } else {
                let pad: String = fill.chars().cycle().take(target - current).collect();
                if name == "padStart" {
                    Value::String(pad + s)
                } else {
                    Value::String(s.to_string() + &pad)
                }
            }
        }
        "repeat" => {
            let count = to_integer(&arg(0));
            let Some(count) = index_of(count).filter(|_| count.is_finite()) else {
                return Some(Err(Interrupt::range_error(format!(
                    "Invalid count value: {}",
                    number_to_string(count)
                ))));
            };
            if s.len().saturating_mul(count) > MAX_STRING_BYTES {
                return Some(Err(Interrupt::range_error("Invalid string length")));
            }
            Value::String(s.repeat(count))
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                out.push_str(&value.to_js_string());
            }
            Value::String(out)
        }
        "localeCompare" => position(match s.cmp(text(0).as_str()) {
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Greater => 1.0,
        }),
        _ => return None,
    };
    Some(Ok(value))
}

/// Built-in number method; `None` when `name` is not one
pub(crate) fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Eval<Value>> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    Some(match name {
        "toFixed" => {
            let digits = to_integer(&arg(0));
            match index_of(digits).filter(|d| *d <= 100) {
                Some(_) if !n.is_finite() => Ok(Value::String(number_to_string(n))),
                Some(digits) => Ok(Value::String(format!("{n:.digits$}"))),
                None => Err(Interrupt::range_error(
                    "toFixed() digits argument must be between 0 and 100",
                )),
            }
        }
        "toString" => match arg(0) {
            Value::Undefined => Ok(Value::String(number_to_string(n))),
            radix => {
                let radix = to_integer(&radix);
                match index_of(radix).filter(|r| (2..=36).contains(r)) {
                    #[allow(clippy::cast_possible_truncation)]
                    Some(r) => Ok(Value::String(to_radix(n, r as u32))),
                    None => {
                        Err(Interrupt::range_error("toString() radix must be between 2 and 36"))
                    }
                }
            }
        },
        "valueOf" => Ok(Value::Number(n)),
        _ => return None,
    })
}

fn to_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 || n.abs() > 9_007_199_254_740_991.0 {
        return number_to_string(n);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut magnitude = n.abs() as u64;
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        #[allow(clippy::cast_possible_truncation)]
        let digit = (magnitude % u64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        magnitude /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_follows_javascript() {
        assert_eq!(parse_int("42px", &Value::Undefined), 42.0);
        assert_eq!(parse_int("  -17", &Value::Undefined), -17.0);
        assert_eq!(parse_int("0x1f", &Value::Undefined), 31.0);
        assert_eq!(parse_int("ff", &Value::Number(16.0)), 255.0);
        assert!(parse_int("abc", &Value::Undefined).is_nan());
    }

    #[test]
    fn parse_float_takes_numeric_prefix() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("1e3"), 1000.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert!(parse_float("x1").is_nan());
    }

    #[test]
    fn math_round_rounds_half_up() {
        assert_eq!(MathFn::Round.apply(&[Value::Number(2.5)]), 3.0);
        assert_eq!(MathFn::Round.apply(&[Value::Number(-2.5)]), -2.0);
        assert_eq!(MathFn::Round.apply(&[Value::Number(0.49999999999999994)]), 0.0);
    }

    #[test]
    fn math_max_of_nothing_is_negative_infinity() {
        assert_eq!(MathFn::Max.apply(&[]), f64::NEG_INFINITY);
        assert!(MathFn::Max.apply(&[Value::Number(1.0), Value::Undefined]).is_nan());
    }

    #[test]
    fn string_slicing_uses_characters() {
        let sliced = string_method("héllo", "slice", &[Value::Number(1.0), Value::Number(-1.0)]);
        assert_eq!(sliced.unwrap().unwrap().to_js_string(), "éll");

        let padded = string_method("7", "padStart", &[Value::Number(3.0), Value::string("0")]);
        assert_eq!(padded.unwrap().unwrap().to_js_string(), "007");

        assert!(string_method("x", "noSuchMethod", &[]).is_none());
    }

    #[test]
    fn number_formatting_methods() {
        let fixed = number_method(3.14159, "toFixed", &[Value::Number(2.0)]);
        assert_eq!(fixed.unwrap().unwrap().to_js_string(), "3.14");

        let hex = number_method(255.0, "toString", &[Value::Number(16.0)]);
        assert_eq!(hex.unwrap().unwrap().to_js_string(), "ff");

        assert!(number_method(1.0, "toFixed", &[Value::Number(-1.0)]).unwrap().is_err());
    }

    #[test]
    fn json_stringify_with_indent() {
        let value = Value::from_json(serde_json::json!({"a": [1]}));
        let pretty = json_stringify(&value, &Value::Number(2.0)).unwrap();
        assert_eq!(pretty.to_js_string(), "{\n  \"a\": [\n    1\n  ]\n}");

        let compact = json_stringify(&value, &Value::Undefined).unwrap();
        assert_eq!(compact.to_js_string(), "{\"a\":[1]}");

        let skipped = json_stringify(&Value::Undefined, &Value::Undefined);
        assert!(matches!(skipped, Ok(Value::Undefined)));
    }

    #[test]
    fn statics_resolve_on_constructors() {
        assert!(matches!(
            native_static(NativeFn::ObjectCtor, "keys"),
            Some(Value::Function(Function::Native(NativeFn::ObjectKeys)))
        ));
        assert!(native_static(NativeFn::ObjectCtor, "nope").is_none());
        assert!(has_method(&Value::array(vec![]), "map"));
        assert!(!has_method(&Value::Null, "map"));
    }
}
