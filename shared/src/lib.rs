pub mod telemetry;
pub mod utils;

pub use utils::{generate_ulid, truncate_for_log};
