pub mod errors;
pub mod observability;
pub mod routes;
pub mod startup;

pub use startup::{run, run_with_config};
