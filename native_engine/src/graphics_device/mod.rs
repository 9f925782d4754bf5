/// Graphics device module - the graphics abstraction consumed by the engine

// Module declarations
pub mod handle;
pub mod graphics_device;
pub mod vertex_layout;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use handle::*;
pub use vertex_layout::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
