/// Vertex array: which buffers to bind for a draw.
///
/// References (does not own) its index and vertex buffers through their
/// tickets; a buffer deleted while still recorded is skipped at draw time.
/// Owns the vertex layout handle created for each recorded vertex buffer.

use slotmap::new_key_type;
use crate::graphics_device::{SharedDevice, VertexLayoutHandle, lock_device};
use super::buffer::{IndexBufferKey, VertexBufferKey};

new_key_type! {
    /// Ticket of a vertex array in the engine's table
    pub struct VertexArrayKey;
}

/// One recorded vertex stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexStream {
    pub buffer: VertexBufferKey,
    pub start_vertex: u32,
    pub layout: VertexLayoutHandle,
}

pub struct VertexArray {
    index_buffer: Option<IndexBufferKey>,
    vertex_buffers: Vec<VertexStream>,
    device: SharedDevice,
}

impl VertexArray {
    pub fn new(device: SharedDevice) -> Self {
        Self {
            index_buffer: None,
            vertex_buffers: Vec::new(),
            device,
        }
    }

    pub fn record_index_buffer(&mut self, index_buffer: IndexBufferKey) {
        self.index_buffer = Some(index_buffer);
    }

    /// Record a vertex stream; the array takes ownership of `layout`
    pub fn record_vertex_buffer(&mut self, buffer: VertexBufferKey, start_vertex: u32, layout: VertexLayoutHandle) {
        self.vertex_buffers.push(VertexStream { buffer, start_vertex, layout });
    }

    pub fn index_buffer(&self) -> Option<IndexBufferKey> {
        self.index_buffer
    }

    pub fn vertex_buffers(&self) -> &[VertexStream] {
        &self.vertex_buffers
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        let mut device = lock_device(&self.device);
        for stream in self.vertex_buffers.drain(..) {
            if stream.layout.is_valid() {
                device.destroy(stream.layout.into());
            }
        }
    }
}

#[cfg(test)]
#[path = "vertex_array_tests.rs"]
mod tests;
