/// Opaque native handles handed out by the graphics device
///
/// Every handle is a 16-bit index. The all-ones index is the invalid
/// sentinel; for frame buffers it designates the implicit back buffer.

/// Index value of an invalid handle
pub const INVALID_HANDLE: u16 = u16::MAX;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            pub idx: u16,
        }

        impl $name {
            /// The invalid sentinel
            pub const INVALID: Self = Self { idx: INVALID_HANDLE };

            pub const fn new(idx: u16) -> Self {
                Self { idx }
            }

            pub const fn is_valid(self) -> bool {
                self.idx != INVALID_HANDLE
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

define_handle!(
    /// Frame buffer handle (`INVALID` = the implicit back buffer)
    FrameBufferHandle
);
define_handle!(
    /// Texture handle
    TextureHandle
);
define_handle!(
    /// Linked shader program handle
    ProgramHandle
);
define_handle!(
    /// Uniform handle (shared by name across programs)
    UniformHandle
);
define_handle!(IndexBufferHandle);
define_handle!(VertexBufferHandle);
define_handle!(VertexLayoutHandle);

/// Any destroyable handle, passed to `GraphicsDevice::destroy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuHandle {
    FrameBuffer(FrameBufferHandle),
    Texture(TextureHandle),
    Program(ProgramHandle),
    Uniform(UniformHandle),
    IndexBuffer(IndexBufferHandle),
    VertexBuffer(VertexBufferHandle),
    VertexLayout(VertexLayoutHandle),
}

impl GpuHandle {
    /// Whether the wrapped handle is not the invalid sentinel
    pub fn is_valid(self) -> bool {
        match self {
            GpuHandle::FrameBuffer(h) => h.is_valid(),
            GpuHandle::Texture(h) => h.is_valid(),
            GpuHandle::Program(h) => h.is_valid(),
            GpuHandle::Uniform(h) => h.is_valid(),
            GpuHandle::IndexBuffer(h) => h.is_valid(),
            GpuHandle::VertexBuffer(h) => h.is_valid(),
            GpuHandle::VertexLayout(h) => h.is_valid(),
        }
    }
}

macro_rules! impl_from_handle {
    ($($variant:ident => $handle:ty),* $(,)?) => {
        $(
            impl From<$handle> for GpuHandle {
                fn from(handle: $handle) -> Self {
                    GpuHandle::$variant(handle)
                }
            }
        )*
    };
}

impl_from_handle! {
    FrameBuffer => FrameBufferHandle,
    Texture => TextureHandle,
    Program => ProgramHandle,
    Uniform => UniformHandle,
    IndexBuffer => IndexBufferHandle,
    VertexBuffer => VertexBufferHandle,
    VertexLayout => VertexLayoutHandle,
}
