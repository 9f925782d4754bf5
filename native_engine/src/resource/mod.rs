//! Owned GPU resources
//!
//! Each wrapper owns its native handle exclusively and destroys it exactly
//! once when dropped. Resources are stored in [`ResourceTable`]s owned by the
//! engine; the scripting side only ever holds tickets.
//!
//! [`ResourceTable`]: crate::utils::ResourceTable

mod texture;
mod image;
mod buffer;
mod vertex_array;
mod program;

pub use texture::{TextureData, TextureKey};
pub use image::ImageData;
pub use buffer::{IndexBufferData, IndexBufferKey, VertexBufferData, VertexBufferKey, IndexData};
pub use vertex_array::{VertexArray, VertexArrayKey, VertexStream};
pub use program::{ProgramData, ProgramKey, ProgramDesc, UniformDesc, UniformInfo, UniformValue};
