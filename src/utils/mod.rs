pub mod progress;

pub use progress::{PercentTracker, format_bytes};
