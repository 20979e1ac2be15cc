pub mod config;
pub mod error;
pub mod filesystem;
pub mod storage;

pub use error::{Error, Result};
