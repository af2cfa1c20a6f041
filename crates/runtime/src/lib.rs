//! Runtime support for the planar zero-copy serialization format.
//!
//! The crate is organized around three cooperating pieces:
//!
//! - The [`Builder`] constructs a wire buffer *backwards*, emitting finished
//!   child objects before their parents so that every reference is a simple
//!   subtraction against an already-known address. Emission goes through the
//!   [`emit::EmitSink`] trait; the default [`emit::BufferSink`] collects the
//!   emitted chunks and coalesces them on finalization.
//! - The [`verify`] module validates untrusted byte slices in linear time,
//!   proving every offset, vtable, string, vector, table and union reachable
//!   from the root in-bounds and well-formed before any reader touches it.
//! - The [`schema`] descriptors stand in for generated bindings and drive
//!   both the descriptor-based verifier and the [`json`] printer; [`read`]
//!   provides the corresponding safe accessors over verified buffers.
//!
//! Schema compilation (IDL parsing and code generation) is a separate front
//! end; generated code talks to the same entry points the descriptors do.

#![deny(missing_docs)]

pub mod builder;
pub mod emit;
pub mod json;
pub mod read;
pub mod schema;
pub mod verify;

mod frame;
mod scratch;
mod vtable;

pub use crate::builder::{BuildError, BuildResult, BufferFlags, Builder, Ref};
pub use crate::emit::{AlignedBytes, BufferSink, EmitError, EmitSink, IoVec};
pub use crate::verify::{TableContext, VerifyError, VerifyResult};
pub use planar_format::FileIdentifier;
