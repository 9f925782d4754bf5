/// GraphicsDevice trait - the retained-mode graphics layer consumed by the engine
///
/// The device is handle based and single threaded: every call is issued from
/// the render thread and takes effect synchronously. Rendering goes through a
/// fixed number of view slots (`Caps::max_views`), each with its own frame
/// buffer attachment, clear parameters and viewport.
///
/// Per-draw state (render state, buffers, textures) is consumed by `submit`.
/// Uniform values persist per uniform handle until overwritten.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use bitflags::bitflags;
use crate::error::Result;
use crate::graphics_device::{
    FrameBufferHandle, TextureHandle, ProgramHandle, UniformHandle,
    IndexBufferHandle, VertexBufferHandle, VertexLayoutHandle, GpuHandle,
    VertexLayout,
};

/// View slot identifier
pub type ViewId = u16;

/// Device shared between the engine and every resource owning a native handle
pub type SharedDevice = Arc<Mutex<dyn GraphicsDevice>>;

/// Lock the shared device
///
/// A poisoned lock is recovered: resources still need the device to release
/// their handles after a panic elsewhere on the render thread.
pub fn lock_device(device: &SharedDevice) -> MutexGuard<'_, dyn GraphicsDevice + 'static> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Capabilities
// ============================================================================

/// Backend API behind the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererType {
    Noop,
    Direct3D11,
    Direct3D12,
    Metal,
    OpenGL,
    OpenGLES,
    Vulkan,
}

/// Device capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    /// Number of view slots; valid view ids are `0..max_views`
    pub max_views: u16,
    /// Whether texture coordinates start at the bottom left (OpenGL style)
    pub origin_bottom_left: bool,
    /// Backend API
    pub renderer: RendererType,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            max_views: 256,
            origin_bottom_left: false,
            renderer: RendererType::Noop,
        }
    }
}

// ============================================================================
// Flags
// ============================================================================

bitflags! {
    /// Which buffers a view clears at the start of its pass
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u16 {
        const COLOR = 0x0001;
        const DEPTH = 0x0002;
        const STENCIL = 0x0004;
    }
}

bitflags! {
    /// Fixed-function render state applied to the next submit
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderState: u64 {
        const WRITE_R = 1 << 0;
        const WRITE_G = 1 << 1;
        const WRITE_B = 1 << 2;
        const WRITE_A = 1 << 3;
        const WRITE_Z = 1 << 4;

        const DEPTH_TEST_LESS = 1 << 8;
        const DEPTH_TEST_LEQUAL = 1 << 9;
        const DEPTH_TEST_EQUAL = 1 << 10;
        const DEPTH_TEST_GEQUAL = 1 << 11;
        const DEPTH_TEST_GREATER = 1 << 12;
        const DEPTH_TEST_NOTEQUAL = 1 << 13;
        const DEPTH_TEST_NEVER = 1 << 14;
        const DEPTH_TEST_ALWAYS = 1 << 15;

        const CULL_CW = 1 << 16;
        const CULL_CCW = 1 << 17;

        const BLEND_ALPHA = 1 << 20;
        const BLEND_ADD = 1 << 21;
        const BLEND_MULTIPLY = 1 << 22;
        const BLEND_SCREEN = 1 << 23;
        const BLEND_SUBTRACT = 1 << 24;
        const BLEND_PREMULTIPLIED = 1 << 25;

        const PT_TRISTRIP = 1 << 28;
        const PT_LINES = 1 << 29;
        const PT_LINESTRIP = 1 << 30;
        const PT_POINTS = 1 << 31;

        const MSAA = 1 << 40;

        const WRITE_RGB = Self::WRITE_R.bits() | Self::WRITE_G.bits() | Self::WRITE_B.bits();
        const DEPTH_TEST_MASK = 0xff << 8;
        const CULL_MASK = Self::CULL_CW.bits() | Self::CULL_CCW.bits();
        const BLEND_MASK = 0x3f << 20;
        const PT_MASK = 0xf << 28;
    }
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState::WRITE_RGB
            | RenderState::WRITE_A
            | RenderState::WRITE_Z
            | RenderState::DEPTH_TEST_LESS
            | RenderState::CULL_CW
            | RenderState::MSAA
    }
}

bitflags! {
    /// Sampler flags attached to a texture binding
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SamplerFlags: u32 {
        const U_CLAMP = 1 << 0;
        const U_MIRROR = 1 << 1;
        const V_CLAMP = 1 << 2;
        const V_MIRROR = 1 << 3;
        const W_CLAMP = 1 << 4;
        const W_MIRROR = 1 << 5;
        const MIN_POINT = 1 << 8;
        const MIN_ANISOTROPIC = 1 << 9;
        const MAG_POINT = 1 << 10;
        const MAG_ANISOTROPIC = 1 << 11;
        const MIP_POINT = 1 << 12;

        const U_MASK = Self::U_CLAMP.bits() | Self::U_MIRROR.bits();
        const V_MASK = Self::V_CLAMP.bits() | Self::V_MIRROR.bits();
        const W_MASK = Self::W_CLAMP.bits() | Self::W_MIRROR.bits();
        const FILTER_MASK = 0x1f << 8;
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    RGBA8,
    RGBA16F,
    RGBA32F,
    D24S8,
    D32F,
}

impl TextureFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::RGBA8 | TextureFormat::D24S8 | TextureFormat::D32F => 4,
            TextureFormat::RGBA16F => 8,
            TextureFormat::RGBA32F => 16,
        }
    }
}

/// Texture descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u16,
    pub height: u16,
    pub has_mips: bool,
    pub format: TextureFormat,
    /// Usable as a frame buffer attachment
    pub render_target: bool,
    /// Six faces; data is face-major, each face followed by its mip chain
    pub cube: bool,
}

/// Frame buffer attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Existing texture, referenced (not owned) by the frame buffer
    Texture(TextureHandle),
    /// Depth buffer created and owned by the frame buffer
    Depth { stencil: bool },
}

/// Uniform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Sampler,
    Vec4,
    Mat3,
    Mat4,
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// Graphics abstraction layer
///
/// Implemented by a backend binding (Direct3D, Metal, Vulkan, OpenGL).
pub trait GraphicsDevice: Send {
    /// Device capabilities
    fn caps(&self) -> Caps;

    /// Current back buffer size in pixels
    fn back_buffer_size(&self) -> (u16, u16);

    /// Reset the device (surface resize, device lost). View state is lost.
    fn reset(&mut self, width: u16, height: u16);

    // ===== VIEWS =====

    /// Attach a frame buffer to a view (`INVALID` = back buffer)
    fn set_view_frame_buffer(&mut self, view: ViewId, frame_buffer: FrameBufferHandle);

    /// Set the clear parameters of a view
    fn set_view_clear(&mut self, view: ViewId, flags: ClearFlags, rgba: u32, depth: f32, stencil: u8);

    /// Set the viewport rectangle of a view
    fn set_view_rect(&mut self, view: ViewId, x: u16, y: u16, width: u16, height: u16);

    /// Discard all pending per-draw state
    fn discard(&mut self);

    /// Mark a view as used so it is cleared even without draws
    fn touch(&mut self, view: ViewId);

    // ===== RESOURCE CREATION =====

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureHandle>;

    fn create_frame_buffer(&mut self, width: u16, height: u16, attachments: &[Attachment]) -> Result<FrameBufferHandle>;

    /// Link a program from compiled vertex and fragment shader binaries
    fn create_program(&mut self, vertex_shader: &[u8], fragment_shader: &[u8]) -> Result<ProgramHandle>;

    fn create_uniform(&mut self, name: &str, uniform_type: UniformType, count: u16) -> Result<UniformHandle>;

    fn create_index_buffer(&mut self, data: &[u8], index32: bool) -> Result<IndexBufferHandle>;

    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<VertexBufferHandle>;

    fn create_vertex_layout(&mut self, layout: &VertexLayout) -> Result<VertexLayoutHandle>;

    /// Destroy a native handle
    fn destroy(&mut self, handle: GpuHandle);

    /// Read back the RGBA8 pixels of a frame buffer region (`INVALID` = back buffer)
    fn read_frame_buffer(&mut self, frame_buffer: FrameBufferHandle, x: u16, y: u16, width: u16, height: u16) -> Result<Vec<u8>>;

    // ===== DRAW STATE =====

    /// Upload `count` elements of uniform data
    fn set_uniform(&mut self, uniform: UniformHandle, data: &[f32], count: u16);

    fn set_texture(&mut self, stage: u8, sampler: UniformHandle, texture: TextureHandle, flags: SamplerFlags);

    fn set_state(&mut self, state: RenderState);

    fn set_index_buffer(&mut self, buffer: IndexBufferHandle, first_index: u32, count: u32);

    fn set_vertex_buffer(
        &mut self,
        stream: u8,
        buffer: VertexBufferHandle,
        start_vertex: u32,
        count: u32,
        layout: VertexLayoutHandle,
    );

    /// Submit the accumulated draw to a view
    fn submit(&mut self, view: ViewId, program: ProgramHandle);

    /// Advance to the next frame, returns the frame number
    fn frame(&mut self) -> u32;
}
