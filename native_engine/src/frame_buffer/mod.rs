//! Frame buffers, view slots and clear state
//!
//! Every frame buffer renders through one view slot of the graphics device.
//! The [`FrameBufferManager`] hands out slots, tracks the bound frame buffer
//! and the implicit back buffer, and lazily re-assigns slots after a device
//! reset. Clear parameters live in a [`ClearState`] that may be shared by
//! several frame buffers; each frame buffer applies it to its own slot through
//! a [`ViewClearState`].

mod clear_state;
mod frame_buffer_data;
mod frame_buffer_manager;

pub use clear_state::{ClearState, ViewClearState, SharedClearState, ClearSubscriptionKey};
pub use frame_buffer_data::{FrameBufferData, FrameBufferKey};
pub use frame_buffer_manager::FrameBufferManager;
