//! The three surfaces a node can run as
//!
//! Each wraps a [`SyncHandle`](crate::sync::SyncHandle). Which one is live
//! follows the node's [`Role`](shared::models::Role) and may change at
//! runtime through a SWITCH_MODE command.

pub mod companion;
pub mod display;
pub mod editor;

pub use companion::{Companion, PRICE_STEP};
pub use display::{DisplayOptions, DisplaySurface};
pub use editor::Editor;

#[cfg(test)]
mod tests;
