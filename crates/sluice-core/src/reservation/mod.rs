//! Resource reservations and conflict resolution.
//!
//! Not thread-safe on its own: the dispatcher keeps the table inside its
//! single critical section so acquire, release and re-evaluation never
//! interleave.

pub mod resolver;
mod table;

pub use resolver::Blocker;
pub use table::{Acquire, Release, ReservationTable};
