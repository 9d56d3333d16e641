//! Ports - seams the dispatcher depends on instead of ambient globals.
//!
//! - **Clock**: record timestamps and archive expiry
//! - **IdGenerator**: task id allocation

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
