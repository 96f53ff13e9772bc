#[macro_use]
extern crate log;
extern crate custom_error;

pub mod config;
pub mod error;
pub mod palette;
pub mod swap;

pub use config::SwapOptions;
pub use error::ColorSwapError;
