/*!
# Native Engine

GPU resource lifetime, view-slot allocation and per-draw state caching for a
host scripting environment sitting on top of a retained-mode graphics layer.

Scripts create and dispose frame buffers, textures, buffers and programs at
arbitrary times. This crate keeps those objects consistent with the stricter
rules of the graphics layer: every native handle is destroyed exactly once,
every frame buffer owns a valid view slot before it is rendered to, and clear
and uniform state survive device resets.

## Architecture

- **GraphicsDevice**: the consumed graphics abstraction (handles, view slots)
- **ResourceTable**: generational registry owning engine resources
- **ClearState / ViewClearState**: shared clear parameters applied per view
- **FrameBufferManager**: view-slot allocator and bound frame buffer tracking
- **ProgramData**: program handle, uniform metadata and uniform value cache
- **NativeEngine**: render-state accumulator issuing draws
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod utils;
pub mod frame_buffer;
pub mod resource;

// Main namespace module
pub mod native {
    // Error types
    pub use crate::error::{Error, Result};

    // Render-state accumulator
    pub use crate::engine::{
        NativeEngine, EngineConfig, DepthTest, BlendMode, FillMode, WrapMode, SamplingMode,
        VertexAttributeDesc,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Graphics abstraction consumed by the engine
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Frame buffers and clear state
    pub mod frame_buffer {
        pub use crate::frame_buffer::*;
    }

    // Owned GPU resources
    pub mod resource {
        pub use crate::resource::*;
    }

    pub use crate::utils::ResourceTable;
}

// Re-export math library at crate root
pub use glam;
