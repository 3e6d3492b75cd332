//! # River: Value & Decoding Runtime
//!
//! River is a declarative configuration language describing a graph of
//! telemetry-processing components. This crate is the runtime underneath it:
//! it turns an already parsed syntax tree into strongly typed Rust values.
//!
//! ## Pipeline
//!
//! ```text
//! Syntax tree → Evaluator → Decode engine → Block decoder → host records
//! ```
//!
//! ### Values
//!
//! [`Value`] is an immutable handle over one of eight [`Type`]s. Host types opt
//! into the value model through [`HostValue`]; records use
//! `#[derive(River)]`, which generates the field accessors that the
//! [`tags`] resolver describes.
//!
//! ### Decoding
//!
//! The [`value::decode`] engine writes a [`Value`] into any [`HostValue`],
//! coercing between strings and numbers, allocating optional references and
//! calling capsule conversion hooks.
//!
//! ### Evaluation
//!
//! The [`eval`] module walks [`ast`] nodes. Expressions are evaluated against a
//! [`Scope`] chain with the [`stdlib`] as the last fallback; attribute and
//! block statements are decoded into records by the block decoder. Every error
//! is turned into a positioned [`Diagnostic`].
//!
//! ```
//! use river::{ast::{Expression, Statement}, Evaluator, River};
//!
//! #[derive(River, Debug, Clone, Default)]
//! struct Settings {
//!     #[river("age,attr")]
//!     age: i64,
//! }
//!
//! let body = vec![Statement::attribute("age", Expression::number(19))];
//! let mut settings = Settings::default();
//! Evaluator::new(body).evaluate(None, &mut settings)?;
//! assert_eq!(settings.age, 19);
//! # Ok::<(), river::Diagnostic>(())
//! ```

extern crate self as river;

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod secret;
pub mod stdlib;
pub mod tags;
pub mod value;

// Re-exports
pub use config::EvalConfig;
pub use error::*;
pub use eval::{Diagnostic, Evaluator, Node, Scope};
pub use river_derive::River;
pub use secret::{OptionalSecret, Secret};
pub use tags::{Field, Flags, RawTag};
pub use value::{
    Array, Capsule, CapsuleValue, ConvertError, Defaulter, Dynamic, Function, HookError, HostKind,
    HostType, HostValue, Number, NumberKind, Object, Record, Sequence, Type, Unmarshaler,
    Validator, Value, ValueError,
};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        // テスト全体で一度だけ tracing を初期化する
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
