/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Records every call as a [`DeviceCall`] and tracks live handles so tests can
/// assert that each native handle is destroyed exactly once.

use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{
    GraphicsDevice, Caps, ViewId, ClearFlags, RenderState, SamplerFlags,
    TextureDesc, Attachment, UniformType, VertexLayout, SharedDevice,
    FrameBufferHandle, TextureHandle, ProgramHandle, UniformHandle,
    IndexBufferHandle, VertexBufferHandle, VertexLayoutHandle, GpuHandle,
};

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Reset { width: u16, height: u16 },
    SetViewFrameBuffer { view: ViewId, frame_buffer: FrameBufferHandle },
    SetViewClear { view: ViewId, flags: ClearFlags, rgba: u32, depth: f32, stencil: u8 },
    SetViewRect { view: ViewId, x: u16, y: u16, width: u16, height: u16 },
    Discard,
    Touch { view: ViewId },
    Destroy(GpuHandle),
    CreateTexture(TextureDesc),
    ReadFrameBuffer { frame_buffer: FrameBufferHandle, x: u16, y: u16, width: u16, height: u16 },
    SetUniform { uniform: UniformHandle, data: Vec<f32>, count: u16 },
    SetTexture { stage: u8, sampler: UniformHandle, texture: TextureHandle, flags: SamplerFlags },
    SetState(RenderState),
    SetIndexBuffer { buffer: IndexBufferHandle, first_index: u32, count: u32 },
    SetVertexBuffer { stream: u8, buffer: VertexBufferHandle, start_vertex: u32, count: u32, layout: VertexLayoutHandle },
    Submit { view: ViewId, program: ProgramHandle },
    Frame,
}

/// Recording graphics device
#[derive(Debug)]
pub struct MockGraphicsDevice {
    pub caps: Caps,
    pub width: u16,
    pub height: u16,
    pub calls: Vec<DeviceCall>,
    /// Handles created and not yet destroyed
    pub live: FxHashMap<GpuHandle, String>,
    /// Number of destroy calls per handle
    pub destroyed: FxHashMap<GpuHandle, u32>,
    /// When set, every creation call fails
    pub fail_creation: bool,
    /// Size in bytes of the data passed to each texture creation
    pub texture_uploads: Vec<usize>,
    next_index: u16,
    frame_number: u32,
}

impl MockGraphicsDevice {
    pub fn new(max_views: u16) -> Self {
        Self {
            caps: Caps {
                max_views,
                ..Caps::default()
            },
            width: 800,
            height: 600,
            calls: Vec::new(),
            live: FxHashMap::default(),
            destroyed: FxHashMap::default(),
            fail_creation: false,
            texture_uploads: Vec::new(),
            next_index: 0,
            frame_number: 0,
        }
    }

    /// Create a mock and the shared device view of it
    pub fn shared(max_views: u16) -> (Arc<Mutex<MockGraphicsDevice>>, SharedDevice) {
        let mock = Arc::new(Mutex::new(MockGraphicsDevice::new(max_views)));
        let device: SharedDevice = mock.clone();
        (mock, device)
    }

    /// Number of times `handle` was destroyed
    pub fn destroy_count(&self, handle: impl Into<GpuHandle>) -> u32 {
        self.destroyed.get(&handle.into()).copied().unwrap_or(0)
    }

    pub fn is_live(&self, handle: impl Into<GpuHandle>) -> bool {
        self.live.contains_key(&handle.into())
    }

    /// All `SetViewClear` calls issued for `view`
    pub fn view_clears(&self, view: ViewId) -> Vec<DeviceCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, DeviceCall::SetViewClear { view: v, .. } if *v == view))
            .cloned()
            .collect()
    }

    pub fn count_calls(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn allocate<H: Copy + Into<GpuHandle>>(&mut self, label: String, make: impl FnOnce(u16) -> H) -> Result<H> {
        if self.fail_creation {
            engine_bail!("native::mock", "{} creation failed", label);
        }
        let handle = make(self.next_index);
        self.next_index += 1;
        self.live.insert(handle.into(), label);
        Ok(handle)
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn caps(&self) -> Caps {
        self.caps
    }

    fn back_buffer_size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn reset(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.calls.push(DeviceCall::Reset { width, height });
    }

    fn set_view_frame_buffer(&mut self, view: ViewId, frame_buffer: FrameBufferHandle) {
        self.calls.push(DeviceCall::SetViewFrameBuffer { view, frame_buffer });
    }

    fn set_view_clear(&mut self, view: ViewId, flags: ClearFlags, rgba: u32, depth: f32, stencil: u8) {
        self.calls.push(DeviceCall::SetViewClear { view, flags, rgba, depth, stencil });
    }

    fn set_view_rect(&mut self, view: ViewId, x: u16, y: u16, width: u16, height: u16) {
        self.calls.push(DeviceCall::SetViewRect { view, x, y, width, height });
    }

    fn discard(&mut self) {
        self.calls.push(DeviceCall::Discard);
    }

    fn touch(&mut self, view: ViewId) {
        self.calls.push(DeviceCall::Touch { view });
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureHandle> {
        self.calls.push(DeviceCall::CreateTexture(*desc));
        self.texture_uploads.push(data.map_or(0, <[u8]>::len));
        let label = format!("texture_{}x{}", desc.width, desc.height);
        self.allocate(label, TextureHandle::new)
    }

    fn create_frame_buffer(&mut self, width: u16, height: u16, _attachments: &[Attachment]) -> Result<FrameBufferHandle> {
        let label = format!("frame_buffer_{}x{}", width, height);
        self.allocate(label, FrameBufferHandle::new)
    }

    fn create_program(&mut self, _vertex_shader: &[u8], _fragment_shader: &[u8]) -> Result<ProgramHandle> {
        self.allocate("program".to_string(), ProgramHandle::new)
    }

    fn create_uniform(&mut self, name: &str, _uniform_type: UniformType, _count: u16) -> Result<UniformHandle> {
        self.allocate(name.to_string(), UniformHandle::new)
    }

    fn create_index_buffer(&mut self, data: &[u8], _index32: bool) -> Result<IndexBufferHandle> {
        let label = format!("index_buffer_{}", data.len());
        self.allocate(label, IndexBufferHandle::new)
    }

    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<VertexBufferHandle> {
        let label = format!("vertex_buffer_{}", data.len());
        self.allocate(label, VertexBufferHandle::new)
    }

    fn create_vertex_layout(&mut self, layout: &VertexLayout) -> Result<VertexLayoutHandle> {
        let label = format!("vertex_layout_{}", layout.stride);
        self.allocate(label, VertexLayoutHandle::new)
    }

    fn destroy(&mut self, handle: GpuHandle) {
        self.live.remove(&handle);
        *self.destroyed.entry(handle).or_insert(0) += 1;
        self.calls.push(DeviceCall::Destroy(handle));
    }

    fn read_frame_buffer(&mut self, frame_buffer: FrameBufferHandle, x: u16, y: u16, width: u16, height: u16) -> Result<Vec<u8>> {
        self.calls.push(DeviceCall::ReadFrameBuffer { frame_buffer, x, y, width, height });
        Ok(vec![0xff; width as usize * height as usize * 4])
    }

    fn set_uniform(&mut self, uniform: UniformHandle, data: &[f32], count: u16) {
        self.calls.push(DeviceCall::SetUniform { uniform, data: data.to_vec(), count });
    }

    fn set_texture(&mut self, stage: u8, sampler: UniformHandle, texture: TextureHandle, flags: SamplerFlags) {
        self.calls.push(DeviceCall::SetTexture { stage, sampler, texture, flags });
    }

    fn set_state(&mut self, state: RenderState) {
        self.calls.push(DeviceCall::SetState(state));
    }

    fn set_index_buffer(&mut self, buffer: IndexBufferHandle, first_index: u32, count: u32) {
        self.calls.push(DeviceCall::SetIndexBuffer { buffer, first_index, count });
    }

    fn set_vertex_buffer(
        &mut self,
        stream: u8,
        buffer: VertexBufferHandle,
        start_vertex: u32,
        count: u32,
        layout: VertexLayoutHandle,
    ) {
        self.calls.push(DeviceCall::SetVertexBuffer { stream, buffer, start_vertex, count, layout });
    }

    fn submit(&mut self, view: ViewId, program: ProgramHandle) {
        self.calls.push(DeviceCall::Submit { view, program });
    }

    fn frame(&mut self) -> u32 {
        self.calls.push(DeviceCall::Frame);
        self.frame_number += 1;
        self.frame_number
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
