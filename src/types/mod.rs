//! Core types for Estuary.

pub mod chunk;
pub mod event;
pub mod result;
pub mod usage;

pub use chunk::*;
pub use event::*;
pub use result::*;
pub use usage::*;
