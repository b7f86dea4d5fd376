//! Data models
//!
//! Shared between surfaces, the relay and the wire format.
//! JSON field names are camelCase; ids are strings.

pub mod device;
pub mod product;
pub mod promotion;
pub mod super_offer;

// Re-exports
pub use device::*;
pub use product::*;
pub use promotion::*;
pub use super_offer::*;
