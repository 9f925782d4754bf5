/// NativeEngine - render-state accumulator driven by the scripting side
///
/// Scripts create resources and receive tickets, then issue WebGL-like calls
/// (bind, set state, set uniforms, draw) that are accumulated here and turned
/// into device submissions on the bound frame buffer's view slot.
///
/// All calls happen on the render thread. Stale tickets are reported as
/// `Error::InvalidResource` and never reach the device.

use glam::{Mat2, Mat3, Mat4};
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::{engine_debug, engine_info, engine_trace, engine_warn, invalid_resource};
use crate::log::{self, LogSeverity};
use crate::graphics_device::{
    SharedDevice, RenderState, RendererType, SamplerFlags, ClearFlags, TextureDesc, TextureFormat, Attachment,
    UniformHandle, VertexLayout, VertexAttribute, AttributeType, lock_device,
};
use crate::frame_buffer::{FrameBufferKey, FrameBufferManager};
use crate::resource::{
    TextureData, TextureKey, ImageData, IndexBufferData, IndexBufferKey, IndexData,
    VertexBufferData, VertexBufferKey, VertexArray, VertexArrayKey,
    ProgramData, ProgramKey, ProgramDesc, UniformInfo,
};
use crate::utils::ResourceTable;

const SOURCE: &str = "native::Engine";

// ============================================================================
// Configuration
// ============================================================================

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Frames are scheduled by the engine when scripts request them
    pub automatic_rendering: bool,
    /// Clear color given to every frame buffer the engine creates
    pub default_clear_color: [f32; 4],
    /// Minimum severity forwarded to the logger
    pub min_log_severity: LogSeverity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            automatic_rendering: true,
            default_clear_color: [68.0 / 255.0, 51.0 / 255.0, 85.0 / 255.0, 1.0],
            min_log_severity: LogSeverity::Info,
        }
    }
}

// ============================================================================
// State enums
// ============================================================================

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthTest {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl DepthTest {
    fn render_state(self) -> RenderState {
        match self {
            DepthTest::Never => RenderState::DEPTH_TEST_NEVER,
            DepthTest::Less => RenderState::DEPTH_TEST_LESS,
            DepthTest::Equal => RenderState::DEPTH_TEST_EQUAL,
            DepthTest::LessEqual => RenderState::DEPTH_TEST_LEQUAL,
            DepthTest::Greater => RenderState::DEPTH_TEST_GREATER,
            DepthTest::NotEqual => RenderState::DEPTH_TEST_NOTEQUAL,
            DepthTest::GreaterEqual => RenderState::DEPTH_TEST_GEQUAL,
            DepthTest::Always => RenderState::DEPTH_TEST_ALWAYS,
        }
    }
}

/// Color blending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Disabled,
    Alpha,
    Add,
    Multiply,
    Screen,
    Subtract,
    PremultipliedAlpha,
}

impl BlendMode {
    fn render_state(self) -> RenderState {
        match self {
            BlendMode::Disabled => RenderState::empty(),
            BlendMode::Alpha => RenderState::BLEND_ALPHA,
            BlendMode::Add => RenderState::BLEND_ADD,
            BlendMode::Multiply => RenderState::BLEND_MULTIPLY,
            BlendMode::Screen => RenderState::BLEND_SCREEN,
            BlendMode::Subtract => RenderState::BLEND_SUBTRACT,
            BlendMode::PremultipliedAlpha => RenderState::BLEND_PREMULTIPLIED,
        }
    }
}

/// Primitive topology of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

impl FillMode {
    fn render_state(self) -> RenderState {
        match self {
            FillMode::Triangles => RenderState::empty(),
            FillMode::TriangleStrip => RenderState::PT_TRISTRIP,
            FillMode::Lines => RenderState::PT_LINES,
            FillMode::LineStrip => RenderState::PT_LINESTRIP,
            FillMode::Points => RenderState::PT_POINTS,
        }
    }
}

/// Texture addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    Clamp,
    Mirror,
}

impl WrapMode {
    fn u_flags(self) -> SamplerFlags {
        match self {
            WrapMode::Repeat => SamplerFlags::empty(),
            WrapMode::Clamp => SamplerFlags::U_CLAMP,
            WrapMode::Mirror => SamplerFlags::U_MIRROR,
        }
    }

    fn v_flags(self) -> SamplerFlags {
        match self {
            WrapMode::Repeat => SamplerFlags::empty(),
            WrapMode::Clamp => SamplerFlags::V_CLAMP,
            WrapMode::Mirror => SamplerFlags::V_MIRROR,
        }
    }
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    Nearest,
    Bilinear,
    Trilinear,
}

impl SamplingMode {
    fn sampler_flags(self) -> SamplerFlags {
        match self {
            SamplingMode::Nearest => SamplerFlags::MIN_POINT | SamplerFlags::MAG_POINT | SamplerFlags::MIP_POINT,
            SamplingMode::Bilinear => SamplerFlags::MIP_POINT,
            SamplingMode::Trilinear => SamplerFlags::empty(),
        }
    }
}

/// Vertex attribute as described by a WebGL `vertexAttribPointer` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeDesc {
    pub location: u32,
    /// Offset of the attribute's first element in the buffer
    pub byte_offset: u32,
    pub byte_stride: u16,
    pub components: u8,
    pub attribute_type: AttributeType,
    pub normalized: bool,
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct TextureBinding {
    stage: u8,
    sampler: UniformHandle,
    texture: TextureKey,
}

#[derive(Debug, Clone, Copy)]
enum DrawRange {
    Indexed { first_index: u32, count: u32 },
    Vertices { start_vertex: u32, count: u32 },
}

pub struct NativeEngine {
    device: SharedDevice,
    config: EngineConfig,
    frame_buffers: FrameBufferManager,
    textures: ResourceTable<TextureKey, TextureData>,
    programs: ResourceTable<ProgramKey, ProgramData>,
    index_buffers: ResourceTable<IndexBufferKey, IndexBufferData>,
    vertex_buffers: ResourceTable<VertexBufferKey, VertexBufferData>,
    vertex_arrays: ResourceTable<VertexArrayKey, VertexArray>,
    current_program: Option<ProgramKey>,
    bound_vertex_array: Option<VertexArrayKey>,
    texture_bindings: Vec<TextureBinding>,
    render_state: RenderState,
    z_offset: f32,
    render_scheduled: bool,
    disposed: bool,
    /// Reused buffer for vec4 padding
    scratch: Vec<f32>,
}

impl NativeEngine {
    /// Create the engine on top of a device
    pub fn new(device: SharedDevice, config: EngineConfig) -> Self {
        log::set_min_severity(config.min_log_severity);

        let frame_buffers = FrameBufferManager::new(device.clone());
        let [r, g, b, a] = config.default_clear_color;
        frame_buffers.back_buffer().view_clear_state().update_color(r, g, b, a);

        let caps = lock_device(&device).caps();
        engine_info!(SOURCE, "Engine created ({:?}, {} views)", caps.renderer, caps.max_views);

        Self {
            device,
            config,
            frame_buffers,
            textures: ResourceTable::new(),
            programs: ResourceTable::new(),
            index_buffers: ResourceTable::new(),
            vertex_buffers: ResourceTable::new(),
            vertex_arrays: ResourceTable::new(),
            current_program: None,
            bound_vertex_array: None,
            texture_bindings: Vec::new(),
            render_state: RenderState::default(),
            z_offset: 0.0,
            render_scheduled: false,
            disposed: false,
            scratch: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn frame_buffers(&self) -> &FrameBufferManager {
        &self.frame_buffers
    }

    /// Backend API the device renders with
    pub fn render_api(&self) -> RendererType {
        lock_device(&self.device).caps().renderer
    }

    /// Release every resource the scripting side created
    ///
    /// Tickets handed out before the call are revoked. Calling it again is a
    /// no-op, and dropping the engine disposes it.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.current_program = None;
        self.bound_vertex_array = None;
        self.texture_bindings.clear();
        self.vertex_arrays.clear();
        self.programs.clear();
        self.textures.clear();
        self.index_buffers.clear();
        self.vertex_buffers.clear();
        self.frame_buffers.dispose_all();
        engine_info!(SOURCE, "Engine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ===== FRAME =====

    /// Ask for a frame; returns false when the host drives rendering itself
    pub fn request_animation_frame(&mut self) -> bool {
        if !self.config.automatic_rendering {
            return false;
        }
        self.render_scheduled = true;
        true
    }

    pub fn is_render_scheduled(&self) -> bool {
        self.render_scheduled
    }

    /// Submit the frame, returns the device frame number
    pub fn end_frame(&mut self) -> u32 {
        self.render_scheduled = false;
        let frame = lock_device(&self.device).frame();
        engine_trace!(SOURCE, "Frame {} submitted", frame);
        frame
    }

    /// Follow a surface resize: reset the device and reassign view slots lazily
    pub fn update_size(&mut self, width: u16, height: u16) {
        lock_device(&self.device).reset(width, height);
        self.frame_buffers.resize_back_buffer(width, height);
        self.frame_buffers.reset();
        engine_info!(SOURCE, "Surface resized to {}x{}", width, height);
    }

    // ===== FRAME BUFFERS =====

    /// Create a frame buffer rendering into `texture`
    ///
    /// # Errors
    ///
    /// Returns an error if the texture was deleted or the device fails.
    pub fn create_frame_buffer(
        &mut self,
        texture: Option<TextureKey>,
        width: u16,
        height: u16,
        generate_depth: bool,
        generate_stencil: bool,
    ) -> Result<FrameBufferKey> {
        let mut attachments = Vec::with_capacity(2);
        if let Some(texture) = texture {
            let data = self.textures.get(texture)
                .ok_or_else(|| invalid_resource!(SOURCE, "Texture {:?} was deleted", texture))?;
            attachments.push(Attachment::Texture(data.handle()));
        }
        if generate_depth || generate_stencil {
            attachments.push(Attachment::Depth { stencil: generate_stencil });
        }

        let handle = lock_device(&self.device).create_frame_buffer(width, height, &attachments)?;
        let ticket = self.frame_buffers.create_new(handle, width, height);
        if let Some(data) = self.frame_buffers.get(ticket) {
            let [r, g, b, a] = self.config.default_clear_color;
            data.view_clear_state().update_color(r, g, b, a);
        }
        Ok(ticket)
    }

    pub fn delete_frame_buffer(&mut self, frame_buffer: FrameBufferKey) -> bool {
        self.frame_buffers.dispose(frame_buffer)
    }

    pub fn bind_frame_buffer(&mut self, frame_buffer: FrameBufferKey) -> Result<()> {
        self.frame_buffers.bind(frame_buffer)
    }

    pub fn unbind_frame_buffer(&mut self, frame_buffer: FrameBufferKey) {
        self.frame_buffers.unbind(frame_buffer);
    }

    // ===== CLEAR =====

    /// Clear the bound frame buffer with `flags`
    ///
    /// Re-applies the clear to the view even when the flags did not change.
    pub fn clear(&mut self, flags: ClearFlags) {
        let view_clear_state = self.frame_buffers.bound().view_clear_state();
        if !view_clear_state.update_flags(flags) {
            view_clear_state.update();
        }
    }

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.frame_buffers.bound().view_clear_state().update_color(r, g, b, a);
    }

    pub fn clear_depth(&mut self, depth: f32) {
        self.frame_buffers.bound().view_clear_state().update_depth(depth);
    }

    pub fn clear_stencil(&mut self, stencil: u8) {
        self.frame_buffers.bound().view_clear_state().update_stencil(stencil);
    }

    // ===== VIEWPORT =====

    /// Set the viewport of the bound frame buffer in normalized coordinates
    ///
    /// Coordinates use a bottom-left origin and are flipped for backends
    /// whose origin is the top left.
    pub fn set_view_port(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let bound = self.frame_buffers.bound();
        let (target_width, target_height) = (bound.width() as f32, bound.height() as f32);
        let mut device = lock_device(&self.device);
        let y_origin = if device.caps().origin_bottom_left { y } else { 1.0 - y - height };
        device.set_view_rect(
            bound.view_id(),
            (x * target_width) as u16,
            (y_origin * target_height) as u16,
            (width * target_width) as u16,
            (height * target_height) as u16,
        );
    }

    /// Back buffer width in pixels
    pub fn render_width(&self) -> u16 {
        self.frame_buffers.back_buffer().width()
    }

    /// Back buffer height in pixels
    pub fn render_height(&self) -> u16 {
        self.frame_buffers.back_buffer().height()
    }

    /// Read back the RGBA8 pixels of a region of the bound frame buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the region does not fit in the bound frame buffer
    /// or the device cannot read it back.
    pub fn get_frame_buffer_data(&mut self, x: u16, y: u16, width: u16, height: u16) -> Result<Vec<u8>> {
        let bound = self.frame_buffers.bound();
        let fits_x = x.checked_add(width).is_some_and(|right| right <= bound.width());
        let fits_y = y.checked_add(height).is_some_and(|bottom| bottom <= bound.height());
        if !(fits_x && fits_y) {
            return Err(invalid_resource!(
                SOURCE, "Region {}x{} at ({}, {}) exceeds the bound {}x{} frame buffer",
                width, height, x, y, bound.width(), bound.height()
            ));
        }
        let frame_buffer = bound.frame_buffer();
        lock_device(&self.device).read_frame_buffer(frame_buffer, x, y, width, height)
    }

    // ===== TEXTURES =====

    /// Create an empty texture, filled later by `load_texture`
    pub fn create_texture(&mut self) -> TextureKey {
        self.textures.insert(TextureData::new(self.device.clone()))
    }

    /// Upload `image` into `texture`, replacing its previous content
    pub fn load_texture(&mut self, texture: TextureKey, image: &ImageData, generate_mips: bool) -> Result<()> {
        if !self.textures.contains(texture) {
            return Err(invalid_resource!(SOURCE, "Texture {:?} was deleted", texture));
        }
        let (width, height) = texture_size(image)?;
        let desc = TextureDesc {
            width,
            height,
            has_mips: generate_mips,
            format: image.format(),
            render_target: false,
            cube: false,
        };
        self.upload_texture(texture, &desc, image.pixels())
    }

    /// Upload the six faces of a cube texture (+X, -X, +Y, -Y, +Z, -Z)
    ///
    /// # Errors
    ///
    /// Returns an error if the texture was deleted or the faces are not
    /// square images sharing one size and format.
    pub fn load_cube_texture(&mut self, texture: TextureKey, faces: &[ImageData; 6], generate_mips: bool) -> Result<()> {
        if !self.textures.contains(texture) {
            return Err(invalid_resource!(SOURCE, "Texture {:?} was deleted", texture));
        }
        let (size, format) = cube_level_size(&faces[0])?;
        check_cube_faces(faces, size, format)?;

        let desc = TextureDesc {
            width: size,
            height: size,
            has_mips: generate_mips,
            format,
            render_target: false,
            cube: true,
        };
        let pixels: Vec<u8> = faces.iter().flat_map(|face| face.pixels().iter().copied()).collect();
        self.upload_texture(texture, &desc, &pixels)
    }

    /// Upload a cube texture with its full mip chain
    ///
    /// `levels[0]` holds the six base faces; every following level is half
    /// the size of the previous one, down to 1x1.
    ///
    /// # Errors
    ///
    /// Returns an error if the texture was deleted, `levels` is empty or a
    /// level does not have the expected size and format.
    pub fn load_cube_texture_with_mips(&mut self, texture: TextureKey, levels: &[[ImageData; 6]]) -> Result<()> {
        if !self.textures.contains(texture) {
            return Err(invalid_resource!(SOURCE, "Texture {:?} was deleted", texture));
        }
        let Some(base) = levels.first() else {
            return Err(invalid_resource!(SOURCE, "Cube texture {:?} needs at least one mip level", texture));
        };
        let (size, format) = cube_level_size(&base[0])?;
        for (level, faces) in levels.iter().enumerate() {
            let level_size = u32::try_from(level).ok().and_then(|level| size.checked_shr(level)).unwrap_or(0).max(1);
            check_cube_faces(faces, level_size, format)?;
        }

        let desc = TextureDesc {
            width: size,
            height: size,
            has_mips: levels.len() > 1,
            format,
            render_target: false,
            cube: true,
        };
        let mut pixels = Vec::new();
        for face in 0..6 {
            for faces in levels {
                pixels.extend_from_slice(faces[face].pixels());
            }
        }
        self.upload_texture(texture, &desc, &pixels)
    }

    /// Create a depth (and optionally stencil) texture for frame buffer attachment
    pub fn create_depth_texture(&mut self, width: u16, height: u16, stencil: bool) -> Result<TextureKey> {
        let desc = TextureDesc {
            width,
            height,
            has_mips: false,
            format: if stencil { TextureFormat::D24S8 } else { TextureFormat::D32F },
            render_target: true,
            cube: false,
        };
        let handle = lock_device(&self.device).create_texture(&desc, None)?;

        let mut data = TextureData::new(self.device.clone());
        data.set_handle(handle);
        data.width = u32::from(width);
        data.height = u32::from(height);
        let texture = self.textures.insert(data);
        engine_debug!(SOURCE, "Depth texture {:?} created ({}x{}, {:?})", texture, width, height, desc.format);
        Ok(texture)
    }

    fn upload_texture(&mut self, texture: TextureKey, desc: &TextureDesc, pixels: &[u8]) -> Result<()> {
        let handle = lock_device(&self.device).create_texture(desc, Some(pixels))?;

        let data = self.texture_mut(texture)?;
        data.set_handle(handle);
        data.width = u32::from(desc.width);
        data.height = u32::from(desc.height);
        engine_debug!(SOURCE, "Texture {:?} loaded ({}x{}, cube: {})", texture, desc.width, desc.height, desc.cube);
        Ok(())
    }

    pub fn texture_width(&self, texture: TextureKey) -> Result<u32> {
        Ok(self.texture(texture)?.width)
    }

    pub fn texture_height(&self, texture: TextureKey) -> Result<u32> {
        Ok(self.texture(texture)?.height)
    }

    pub fn set_texture_sampling(&mut self, texture: TextureKey, sampling: SamplingMode) -> Result<()> {
        let data = self.texture_mut(texture)?;
        data.flags = (data.flags - SamplerFlags::FILTER_MASK) | sampling.sampler_flags();
        Ok(())
    }

    pub fn set_texture_wrap_mode(&mut self, texture: TextureKey, wrap_u: WrapMode, wrap_v: WrapMode) -> Result<()> {
        let data = self.texture_mut(texture)?;
        data.flags = (data.flags - SamplerFlags::U_MASK - SamplerFlags::V_MASK) | wrap_u.u_flags() | wrap_v.v_flags();
        Ok(())
    }

    pub fn set_texture_anisotropic_level(&mut self, texture: TextureKey, level: u8) -> Result<()> {
        self.texture_mut(texture)?.anisotropic_level = level;
        Ok(())
    }

    /// Bind `texture` to a sampler uniform of the current program for the next draw
    pub fn set_texture(&mut self, sampler: UniformHandle, texture: TextureKey) -> Result<()> {
        if !self.textures.contains(texture) {
            return Err(invalid_resource!(SOURCE, "Texture {:?} was deleted", texture));
        }
        let stage = self.uniform_info(sampler)?.stage;
        self.texture_bindings.retain(|binding| binding.stage != stage);
        self.texture_bindings.push(TextureBinding { stage, sampler, texture });
        Ok(())
    }

    pub fn delete_texture(&mut self, texture: TextureKey) -> bool {
        self.textures.remove(texture).is_some()
    }

    fn texture(&self, texture: TextureKey) -> Result<&TextureData> {
        self.textures.get(texture)
            .ok_or_else(|| invalid_resource!(SOURCE, "Texture {:?} was deleted", texture))
    }

    fn texture_mut(&mut self, texture: TextureKey) -> Result<&mut TextureData> {
        self.textures.get_mut(texture)
            .ok_or_else(|| invalid_resource!(SOURCE, "Texture {:?} was deleted", texture))
    }

    // ===== BUFFERS =====

    pub fn create_index_buffer(&mut self, indices: IndexData<'_>) -> Result<IndexBufferKey> {
        let handle = lock_device(&self.device).create_index_buffer(indices.as_bytes(), indices.is_32bit())?;
        let data = IndexBufferData::new(self.device.clone(), handle, indices.len() as u32, indices.is_32bit());
        Ok(self.index_buffers.insert(data))
    }

    pub fn delete_index_buffer(&mut self, index_buffer: IndexBufferKey) -> bool {
        self.index_buffers.remove(index_buffer).is_some()
    }

    pub fn create_vertex_buffer(&mut self, bytes: &[u8]) -> Result<VertexBufferKey> {
        let handle = lock_device(&self.device).create_vertex_buffer(bytes)?;
        let data = VertexBufferData::new(self.device.clone(), handle, bytes.len() as u32);
        Ok(self.vertex_buffers.insert(data))
    }

    pub fn delete_vertex_buffer(&mut self, vertex_buffer: VertexBufferKey) -> bool {
        self.vertex_buffers.remove(vertex_buffer).is_some()
    }

    // ===== VERTEX ARRAYS =====

    pub fn create_vertex_array(&mut self) -> VertexArrayKey {
        self.vertex_arrays.insert(VertexArray::new(self.device.clone()))
    }

    pub fn record_index_buffer(&mut self, vertex_array: VertexArrayKey, index_buffer: IndexBufferKey) -> Result<()> {
        if !self.index_buffers.contains(index_buffer) {
            return Err(invalid_resource!(SOURCE, "Index buffer {:?} was deleted", index_buffer));
        }
        self.vertex_array_mut(vertex_array)?.record_index_buffer(index_buffer);
        Ok(())
    }

    /// Record one attribute stream of `vertex_buffer` into `vertex_array`
    ///
    /// The byte offset is split into a start vertex and an offset inside
    /// one vertex.
    pub fn record_vertex_buffer(
        &mut self,
        vertex_array: VertexArrayKey,
        vertex_buffer: VertexBufferKey,
        attribute: &VertexAttributeDesc,
    ) -> Result<()> {
        if !self.vertex_buffers.contains(vertex_buffer) {
            return Err(invalid_resource!(SOURCE, "Vertex buffer {:?} was deleted", vertex_buffer));
        }
        if !self.vertex_arrays.contains(vertex_array) {
            return Err(invalid_resource!(SOURCE, "Vertex array {:?} was deleted", vertex_array));
        }
        if attribute.byte_stride == 0 {
            return Err(invalid_resource!(SOURCE, "Attribute {} has a zero stride", attribute.location));
        }

        let stride = u32::from(attribute.byte_stride);
        let layout = VertexLayout::new(attribute.byte_stride).with_attribute(VertexAttribute {
            location: attribute.location,
            components: attribute.components,
            attribute_type: attribute.attribute_type,
            normalized: attribute.normalized,
            offset: (attribute.byte_offset % stride) as u16,
        });
        let layout = lock_device(&self.device).create_vertex_layout(&layout)?;
        self.vertex_array_mut(vertex_array)?
            .record_vertex_buffer(vertex_buffer, attribute.byte_offset / stride, layout);
        Ok(())
    }

    pub fn bind_vertex_array(&mut self, vertex_array: VertexArrayKey) -> Result<()> {
        if !self.vertex_arrays.contains(vertex_array) {
            return Err(invalid_resource!(SOURCE, "Vertex array {:?} was deleted", vertex_array));
        }
        self.bound_vertex_array = Some(vertex_array);
        Ok(())
    }

    pub fn delete_vertex_array(&mut self, vertex_array: VertexArrayKey) -> bool {
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
        self.vertex_arrays.remove(vertex_array).is_some()
    }

    fn vertex_array_mut(&mut self, vertex_array: VertexArrayKey) -> Result<&mut VertexArray> {
        self.vertex_arrays.get_mut(vertex_array)
            .ok_or_else(|| invalid_resource!(SOURCE, "Vertex array {:?} was deleted", vertex_array))
    }

    // ===== PROGRAMS =====

    /// Link a program and create its uniforms
    ///
    /// A uniform reflected by both stages gets a single handle.
    pub fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramKey> {
        let handle = lock_device(&self.device).create_program(&desc.vertex_shader, &desc.fragment_shader)?;
        let mut program = ProgramData::new(self.device.clone(), handle);

        for (name, location) in &desc.attributes {
            program.add_attribute(name, *location);
        }

        let mut created: FxHashMap<&str, UniformHandle> = FxHashMap::default();
        let stages = desc.vertex_uniforms.iter().map(|uniform| (uniform, false))
            .chain(desc.fragment_uniforms.iter().map(|uniform| (uniform, true)));
        for (uniform, fragment) in stages {
            let handle = match created.get(uniform.name.as_str()) {
                Some(&handle) => handle,
                None => {
                    let handle = lock_device(&self.device)
                        .create_uniform(&uniform.name, uniform.uniform_type, uniform.count)?;
                    created.insert(&uniform.name, handle);
                    handle
                }
            };
            let info = UniformInfo { stage: uniform.stage, handle, y_flip: uniform.y_flip };
            if fragment {
                program.add_fragment_uniform(&uniform.name, info);
            } else {
                program.add_vertex_uniform(&uniform.name, info);
            }
        }

        engine_debug!(SOURCE, "Program {:?} created with {} uniforms", handle, created.len());
        Ok(self.programs.insert(program))
    }

    /// Uniform handles by name, `None` for names the program does not use
    pub fn get_uniforms(&self, program: ProgramKey, names: &[&str]) -> Result<Vec<Option<UniformHandle>>> {
        let program = self.program(program)?;
        Ok(names.iter().map(|name| program.uniform_info(name).map(|info| info.handle)).collect())
    }

    /// Attribute locations by name, `None` for unknown attributes
    pub fn get_attributes(&self, program: ProgramKey, names: &[&str]) -> Result<Vec<Option<u32>>> {
        let program = self.program(program)?;
        Ok(names.iter().map(|name| program.attribute_location(name)).collect())
    }

    /// Select the program used by uniform setters and draws
    pub fn set_program(&mut self, program: ProgramKey) -> Result<()> {
        let data = self.programs.get_mut(program)
            .ok_or_else(|| invalid_resource!(SOURCE, "Program {:?} was deleted", program))?;
        if self.current_program != Some(program) {
            // Uniform slots are shared by name, another program may have overwritten them
            data.invalidate_uploads();
            self.current_program = Some(program);
        }
        Ok(())
    }

    pub fn delete_program(&mut self, program: ProgramKey) -> bool {
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.programs.remove(program).is_some()
    }

    /// Program reflection and cached uniform values
    pub fn program(&self, program: ProgramKey) -> Result<&ProgramData> {
        self.programs.get(program)
            .ok_or_else(|| invalid_resource!(SOURCE, "Program {:?} was deleted", program))
    }

    fn current_program_mut(&mut self) -> Result<&mut ProgramData> {
        let program = self.current_program
            .ok_or_else(|| invalid_resource!(SOURCE, "No program selected"))?;
        self.programs.get_mut(program)
            .ok_or_else(|| invalid_resource!(SOURCE, "Program {:?} was deleted", program))
    }

    fn uniform_info(&self, uniform: UniformHandle) -> Result<UniformInfo> {
        let program = self.current_program
            .ok_or_else(|| invalid_resource!(SOURCE, "No program selected"))?;
        self.program(program)?
            .uniform_info_by_handle(uniform)
            .copied()
            .ok_or_else(|| invalid_resource!(SOURCE, "Uniform {:?} is not used by program {:?}", uniform, program))
    }

    // ===== UNIFORMS =====

    fn set_uniform_data(&mut self, uniform: UniformHandle, data: &[f32], element_length: usize) -> Result<()> {
        let program = self.current_program_mut()?;
        let y_flip = program.uniform_info_by_handle(uniform).map_or(false, |info| info.y_flip);
        program.set_uniform(uniform, data, y_flip, element_length);
        Ok(())
    }

    /// Store `values` as `N`-component elements, each padded to a vec4 slot
    fn set_padded<const N: usize>(&mut self, uniform: UniformHandle, values: &[f32]) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        for element in values.chunks(N) {
            let mut slot = [0.0; 4];
            slot[..element.len()].copy_from_slice(element);
            scratch.extend_from_slice(&slot);
        }
        let result = self.set_uniform_data(uniform, &scratch, scratch.len() / 4);
        self.scratch = scratch;
        result
    }

    fn set_int_padded<const N: usize>(&mut self, uniform: UniformHandle, values: &[i32]) -> Result<()> {
        let values: Vec<f32> = values.iter().map(|&value| value as f32).collect();
        self.set_padded::<N>(uniform, &values)
    }

    pub fn set_int(&mut self, uniform: UniformHandle, value: i32) -> Result<()> {
        self.set_padded::<1>(uniform, &[value as f32])
    }

    pub fn set_int_array(&mut self, uniform: UniformHandle, values: &[i32]) -> Result<()> {
        self.set_int_padded::<1>(uniform, values)
    }

    pub fn set_int_array2(&mut self, uniform: UniformHandle, values: &[i32]) -> Result<()> {
        self.set_int_padded::<2>(uniform, values)
    }

    pub fn set_int_array3(&mut self, uniform: UniformHandle, values: &[i32]) -> Result<()> {
        self.set_int_padded::<3>(uniform, values)
    }

    pub fn set_int_array4(&mut self, uniform: UniformHandle, values: &[i32]) -> Result<()> {
        self.set_int_padded::<4>(uniform, values)
    }

    pub fn set_float(&mut self, uniform: UniformHandle, x: f32) -> Result<()> {
        self.set_padded::<1>(uniform, &[x])
    }

    pub fn set_float2(&mut self, uniform: UniformHandle, x: f32, y: f32) -> Result<()> {
        self.set_padded::<2>(uniform, &[x, y])
    }

    pub fn set_float3(&mut self, uniform: UniformHandle, x: f32, y: f32, z: f32) -> Result<()> {
        self.set_padded::<3>(uniform, &[x, y, z])
    }

    pub fn set_float4(&mut self, uniform: UniformHandle, x: f32, y: f32, z: f32, w: f32) -> Result<()> {
        self.set_padded::<4>(uniform, &[x, y, z, w])
    }

    pub fn set_float_array(&mut self, uniform: UniformHandle, values: &[f32]) -> Result<()> {
        self.set_padded::<1>(uniform, values)
    }

    pub fn set_float_array2(&mut self, uniform: UniformHandle, values: &[f32]) -> Result<()> {
        self.set_padded::<2>(uniform, values)
    }

    pub fn set_float_array3(&mut self, uniform: UniformHandle, values: &[f32]) -> Result<()> {
        self.set_padded::<3>(uniform, values)
    }

    pub fn set_float_array4(&mut self, uniform: UniformHandle, values: &[f32]) -> Result<()> {
        self.set_padded::<4>(uniform, values)
    }

    /// Column-major 4x4 matrix
    pub fn set_matrix(&mut self, uniform: UniformHandle, matrix: &[f32; 16]) -> Result<()> {
        self.set_uniform_data(uniform, matrix, 1)
    }

    /// Array of column-major 4x4 matrices
    pub fn set_matrices(&mut self, uniform: UniformHandle, matrices: &[f32]) -> Result<()> {
        if matrices.len() % 16 != 0 {
            return Err(invalid_resource!(SOURCE, "{} floats is not a whole number of 4x4 matrices", matrices.len()));
        }
        self.set_uniform_data(uniform, matrices, matrices.len() / 16)
    }

    /// Column-major 3x3 matrix, expanded to 4x4
    pub fn set_matrix3x3(&mut self, uniform: UniformHandle, matrix: &[f32; 9]) -> Result<()> {
        let expanded = Mat4::from_mat3(Mat3::from_cols_slice(matrix));
        self.set_uniform_data(uniform, &expanded.to_cols_array(), 1)
    }

    /// Column-major 2x2 matrix, expanded to 4x4
    pub fn set_matrix2x2(&mut self, uniform: UniformHandle, matrix: &[f32; 4]) -> Result<()> {
        let expanded = Mat4::from_mat3(Mat3::from_mat2(Mat2::from_cols_slice(matrix)));
        self.set_uniform_data(uniform, &expanded.to_cols_array(), 1)
    }

    // ===== RENDER STATE =====

    /// Face culling; `reverse_side` culls the other winding
    pub fn set_state(&mut self, culling: bool, reverse_side: bool) {
        self.render_state.remove(RenderState::CULL_MASK);
        if culling {
            self.render_state |= if reverse_side { RenderState::CULL_CCW } else { RenderState::CULL_CW };
        }
    }

    pub fn set_depth_test(&mut self, depth_test: DepthTest) {
        self.render_state.remove(RenderState::DEPTH_TEST_MASK);
        self.render_state |= depth_test.render_state();
    }

    pub fn set_depth_write(&mut self, enabled: bool) {
        self.render_state.set(RenderState::WRITE_Z, enabled);
    }

    pub fn depth_write(&self) -> bool {
        self.render_state.contains(RenderState::WRITE_Z)
    }

    pub fn set_color_write(&mut self, enabled: bool) {
        self.render_state.set(RenderState::WRITE_RGB | RenderState::WRITE_A, enabled);
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        self.render_state.remove(RenderState::BLEND_MASK);
        self.render_state |= blend_mode.render_state();
    }

    pub fn set_z_offset(&mut self, z_offset: f32) {
        self.z_offset = z_offset;
    }

    pub fn z_offset(&self) -> f32 {
        self.z_offset
    }

    /// Accumulated render state (without primitive topology)
    pub fn render_state(&self) -> RenderState {
        self.render_state
    }

    // ===== DRAW =====

    /// Draw `count` indices starting at `first_index` of the bound vertex array
    pub fn draw_indexed(&mut self, fill_mode: FillMode, first_index: u32, count: u32) -> Result<()> {
        self.submit(fill_mode, DrawRange::Indexed { first_index, count })
    }

    /// Draw `count` vertices starting at `start_vertex` of the bound vertex array
    pub fn draw(&mut self, fill_mode: FillMode, start_vertex: u32, count: u32) -> Result<()> {
        self.submit(fill_mode, DrawRange::Vertices { start_vertex, count })
    }

    fn submit(&mut self, fill_mode: FillMode, range: DrawRange) -> Result<()> {
        let program_key = self.current_program
            .ok_or_else(|| invalid_resource!(SOURCE, "Draw without a program"))?;
        let program = self.programs.get_mut(program_key)
            .ok_or_else(|| invalid_resource!(SOURCE, "Program {:?} was deleted", program_key))?;
        let view = self.frame_buffers.bound().view_id();
        let rendering_to_target = self.frame_buffers.is_rendering_to_target();

        if let DrawRange::Vertices { start_vertex, .. } = range {
            let vertex_array = self.bound_vertex_array.and_then(|key| self.vertex_arrays.get(key));
            let overflows = vertex_array.is_some_and(|vertex_array| {
                vertex_array
                    .vertex_buffers()
                    .iter()
                    .any(|recorded| recorded.start_vertex.checked_add(start_vertex).is_none())
            });
            if overflows {
                return Err(invalid_resource!(SOURCE, "Draw start vertex {} is out of range", start_vertex));
            }
        }

        let mut device = lock_device(&self.device);
        let flip_y = rendering_to_target && !device.caps().origin_bottom_left;

        if let Some(vertex_array) = self.bound_vertex_array.and_then(|key| self.vertex_arrays.get(key)) {
            if let DrawRange::Indexed { first_index, count } = range {
                match vertex_array.index_buffer().and_then(|key| self.index_buffers.get(key)) {
                    Some(index_buffer) => device.set_index_buffer(index_buffer.handle(), first_index, count),
                    None => engine_warn!(SOURCE, "Indexed draw without a live index buffer"),
                }
            }
            for (stream, recorded) in vertex_array.vertex_buffers().iter().enumerate() {
                let Some(vertex_buffer) = self.vertex_buffers.get(recorded.buffer) else {
                    engine_warn!(SOURCE, "Skipping deleted vertex buffer {:?}", recorded.buffer);
                    continue;
                };
                let (start_vertex, count) = match range {
                    DrawRange::Indexed { .. } => (recorded.start_vertex, u32::MAX),
                    DrawRange::Vertices { start_vertex, count } => (recorded.start_vertex.saturating_add(start_vertex), count),
                };
                device.set_vertex_buffer(stream as u8, vertex_buffer.handle(), start_vertex, count, recorded.layout);
            }
        }

        for binding in self.texture_bindings.drain(..) {
            match self.textures.get(binding.texture).filter(|texture| texture.handle().is_valid()) {
                Some(texture) => device.set_texture(binding.stage, binding.sampler, texture.handle(), texture.sampler_flags()),
                None => engine_warn!(SOURCE, "Skipping unloaded texture {:?} on stage {}", binding.texture, binding.stage),
            }
        }

        device.set_state(self.render_state | fill_mode.render_state());
        program.commit_uniforms(&mut *device, flip_y);
        device.submit(view, program.program());
        Ok(())
    }
}

fn texture_size(image: &ImageData) -> Result<(u16, u16)> {
    match (u16::try_from(image.width()), u16::try_from(image.height())) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(invalid_resource!(
            SOURCE, "Image {}x{} exceeds the texture size limit", image.width(), image.height()
        )),
    }
}

/// Edge length and format of a square cube face
fn cube_level_size(face: &ImageData) -> Result<(u16, TextureFormat)> {
    let (width, height) = texture_size(face)?;
    if width != height {
        return Err(invalid_resource!(SOURCE, "Cube face {}x{} is not square", width, height));
    }
    Ok((width, face.format()))
}

fn check_cube_faces(faces: &[ImageData; 6], size: u16, format: TextureFormat) -> Result<()> {
    let size = u32::from(size);
    for (index, face) in faces.iter().enumerate() {
        if face.width() != size || face.height() != size || face.format() != format {
            return Err(invalid_resource!(
                SOURCE, "Cube face {} is {}x{} {:?}, expected {}x{} {:?}",
                index, face.width(), face.height(), face.format(), size, size, format
            ));
        }
    }
    Ok(())
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
