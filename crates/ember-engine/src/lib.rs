//! Ember engine crate.
//!
//! This crate owns the staged device bootstrap: a generic build pipeline whose
//! steps communicate through a type-erased artifact store, and the Vulkan steps
//! (instance, surface, device, queues, swapchain, render pass) that plug into it.

pub mod device;
pub mod pipeline;
pub mod window;

pub mod logging;
