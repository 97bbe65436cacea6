pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod logging;
pub mod pipeline;
pub mod store;

pub use error::{EtlError, Result};
