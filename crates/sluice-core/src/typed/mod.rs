//! Typed - typed operations over the untyped `Operation` seam
//!
//! Operation names and argument shapes are tied together by type instead of
//! by string lookup.
//!
//! # Two layers
//! - **Typed**: `Call` trait, `Handler<C>` trait
//! - **Erased**: `TypedOperation<C, H>` implements `dyn Operation`

pub mod call;
pub mod handler;

pub use self::call::Call;
pub use self::handler::{Handler, TypedOperation, typed};
