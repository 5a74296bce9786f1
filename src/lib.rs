pub mod config;
pub mod error;
pub mod games;
pub mod import;
pub mod native;

pub use error::{ImportError, NativeError};
