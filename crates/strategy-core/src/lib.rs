pub mod error;
pub mod result;
pub mod strategy;
pub mod timestamp;
pub mod types;

pub use error::*;
pub use result::*;
pub use strategy::*;
pub use types::*;
