//! # regdsl: device register schemas as s-expressions
//!
//! A small Lisp-style language for describing the binary layout of hardware
//! device registers and how their contents transcode to and from JSON. Schema
//! definitions are evaluated by an embedded interpreter; each definition form
//! builds a [`Device`], [`Structure`] or [`Field`] and binds it by name.
//!
//! ## Definition forms
//!
//! - `(def-device NAME struct-or-api...)`
//! - `(def-struct NAME field...)`
//! - `(def-field NAME TYPE modifier...)` where TYPE is `uint8`, `uint16`,
//!   `uint32`, `uint64`, `int8` ... `int64`, or a previously defined structure
//! - `(def-api STRUCT (read ...) (write ...))`
//!
//! ## Field modifiers
//!
//! - `(range LO HI)`, `(values V...)`: static constraints
//! - `(deferred-validation EXPR)`: evaluated later with `value` bound
//! - `(repeat N)`: array arity, at most [`MAX_REPEAT`]
//! - `(to-json EXPR)`, `(from-json EXPR)`: transforms run by the [`Codec`]
//!
//! ## Example
//!
//! ```text
//! (def-device fan
//!   (def-struct Status
//!     (def-field mode uint8 (range 0 3))
//!     (def-field rpm uint16 (deferred-validation (< value 9000)))
//!     (def-field name uint8 (repeat 16)
//!       (to-json (bytes-to-string value result))
//!       (from-json (string-to-bytes value result)))))
//!
//! (dump-expanded Status)
//! ```
//!
//! ## Usage
//!
//! Load definitions with [`Interpreter::load_str`] or
//! [`Interpreter::load_file`], then look up the results with
//! [`Interpreter::lookup_device`] / [`Interpreter::lookup_structure`]. See
//! `tests/schema.rs` and `tests/codec.rs` for full examples.

pub mod ast;
pub mod builder;
pub mod codec;
pub mod dump;
pub mod env;
pub mod error;
pub mod eval;
pub mod fixed;
pub mod parser;
pub mod schema;
pub mod validate;
pub mod value;

pub use ast::Form;
pub use builder::BuilderContext;
pub use codec::{Codec, CodecError, Endianness};
pub use env::{Env, Frame};
pub use error::{ErrorKind, SchemaError};
pub use eval::{Arity, Interpreter};
pub use fixed::{decode_fixed, encode_fixed, FIXED_LEN};
pub use parser::parse;
pub use schema::{
    ApiDescriptor, Deferred, Device, Field, PrimitiveType, Range, Structure, TypeRegistry,
    ValueSet, MAX_REPEAT, MAX_SIZE_BYTES,
};
pub use validate::{validate_candidate, ValidationError};
pub use value::{Value, ValueKind};
