pub mod time;

pub use time::{ManualTimeSource, SystemTimeSource};
