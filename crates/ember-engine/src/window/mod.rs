//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and hands the window to a setup
//! closure (typically the device bootstrap pipeline).

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
