//! Codemode orchestration script language
//!
//! A JavaScript subset for model-written orchestration code: variables,
//! destructuring, closures, arrow functions, `async`/`await`, loops,
//! `try`/`catch`, template literals, optional chaining and the common
//! `JSON`/`Math`/`Array`/`String`/`Promise` built-ins.
//!
//! # Architecture
//!
//! ```text
//! source ──→ parse (pest grammar) ──→ Program ──→ Interpreter::run ──→ Value
//!                                                      │
//!                                                      └── HostFunction calls ──→ embedder
//! ```
//!
//! Scripts only see the globals the embedder binds. Every host call returns
//! a promise; the interpreter enforces an optional deadline even for
//! CPU-bound loops.
//!
//! # Example
//!
//! ```rust,ignore
//! use codemode_script::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let program = parse("const r = await add(2, 3); return r;")?;
//! let add = Value::host_function("add", Arc::new(|args: Vec<serde_json::Value>| {
//!     let sum: f64 = args.iter().filter_map(serde_json::Value::as_f64).sum();
//!     Ok(serde_json::json!(sum))
//! }));
//! let result = Interpreter::builder().global("add", add).build().run(&program).await?;
//! assert_eq!(result.to_result_string(), "5");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod ast;
mod builtins;
pub mod error;
pub mod host;
mod interpreter;
mod parser;
pub mod scope;
pub mod value;

pub use ast::Program;
pub use builtins::{ConsoleLevel, ErrorKind, MathFn, NativeFn};
pub use error::{ConversionError, ParseError, ScriptError};
pub use host::HostFunction;
pub use interpreter::{Interpreter, InterpreterBuilder, InterpreterOptions};
pub use parser::parse;
pub use scope::Scope;
pub use value::Value;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the interpreter
    pub use crate::error::{ParseError, ScriptError};
    pub use crate::host::HostFunction;
    pub use crate::interpreter::{Interpreter, InterpreterBuilder};
    pub use crate::parser::parse;
    pub use crate::value::Value;
    pub use std::sync::Arc;
}
