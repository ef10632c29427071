//! Shared data models

mod directive;
mod flash;
mod frame;
mod metadata;

pub use directive::*;
pub use flash::*;
pub use frame::*;
pub use metadata::*;
