/// Index and vertex buffers owned by the engine

use slotmap::new_key_type;
use crate::graphics_device::{SharedDevice, IndexBufferHandle, VertexBufferHandle, lock_device};

new_key_type! {
    /// Ticket of an index buffer in the engine's table
    pub struct IndexBufferKey;
    /// Ticket of a vertex buffer in the engine's table
    pub struct VertexBufferKey;
}

/// Index data as received from the scripting side
#[derive(Debug, Clone, Copy)]
pub enum IndexData<'a> {
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl<'a> IndexData<'a> {
    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(indices) => indices.len(),
            IndexData::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_32bit(&self) -> bool {
        matches!(self, IndexData::U32(_))
    }

    /// Raw bytes in native endianness
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            IndexData::U16(indices) => bytemuck::cast_slice(indices),
            IndexData::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

pub struct IndexBufferData {
    handle: IndexBufferHandle,
    index_count: u32,
    index32: bool,
    device: SharedDevice,
}

impl IndexBufferData {
    pub fn new(device: SharedDevice, handle: IndexBufferHandle, index_count: u32, index32: bool) -> Self {
        Self { handle, index_count, index32, device }
    }

    pub fn handle(&self) -> IndexBufferHandle {
        self.handle
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_32bit(&self) -> bool {
        self.index32
    }
}

impl Drop for IndexBufferData {
    fn drop(&mut self) {
        if self.handle.is_valid() {
            lock_device(&self.device).destroy(self.handle.into());
        }
    }
}

pub struct VertexBufferData {
    handle: VertexBufferHandle,
    byte_size: u32,
    device: SharedDevice,
}

impl VertexBufferData {
    pub fn new(device: SharedDevice, handle: VertexBufferHandle, byte_size: u32) -> Self {
        Self { handle, byte_size, device }
    }

    pub fn handle(&self) -> VertexBufferHandle {
        self.handle
    }

    pub fn byte_size(&self) -> u32 {
        self.byte_size
    }
}

impl Drop for VertexBufferData {
    fn drop(&mut self) {
        if self.handle.is_valid() {
            lock_device(&self.device).destroy(self.handle.into());
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
