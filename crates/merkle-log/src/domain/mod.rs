//! Domain module for the log engine
//!
//! Contains core entities, value objects, errors, and invariants. No I/O.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use value_objects::*;
