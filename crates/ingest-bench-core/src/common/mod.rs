pub mod error;
pub mod frame;
pub mod types;

pub use error::{Error, Result};
