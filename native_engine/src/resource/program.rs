/// Linked program, its uniform metadata and its uniform value cache.
///
/// Uniform setters only write into the cache. Before a draw the engine calls
/// [`ProgramData::commit_uniforms`], which uploads the entries that changed
/// since their last upload.
///
/// Some uniforms (projection-related matrices) need a vertical flip when
/// rendering into an intermediate target on a top-left-origin backend. The
/// flip is tracked per uniform: the same program may be used for targets with
/// different flip requirements within one frame, so an entry is re-uploaded
/// whenever the flip it was uploaded with no longer matches.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use slotmap::new_key_type;
use crate::engine_trace;
use crate::graphics_device::{GraphicsDevice, SharedDevice, ProgramHandle, UniformHandle, UniformType, lock_device};

new_key_type! {
    /// Ticket of a program in the engine's table
    pub struct ProgramKey;
}

/// Uniform metadata reflected from a shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformInfo {
    /// Texture stage for samplers
    pub stage: u8,
    pub handle: UniformHandle,
    /// Needs a vertical flip on intermediate targets
    pub y_flip: bool,
}

/// Uniform reflected by the shader compiler
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDesc {
    pub name: String,
    pub uniform_type: UniformType,
    /// Array size
    pub count: u16,
    /// Texture stage for samplers
    pub stage: u8,
    pub y_flip: bool,
}

/// Compiled shader binaries and their reflection
#[derive(Debug, Clone, Default)]
pub struct ProgramDesc {
    pub vertex_shader: Vec<u8>,
    pub fragment_shader: Vec<u8>,
    /// Attribute name and location
    pub attributes: Vec<(String, u32)>,
    pub vertex_uniforms: Vec<UniformDesc>,
    pub fragment_uniforms: Vec<UniformDesc>,
}

/// Last value set for a uniform
#[derive(Debug, Clone, PartialEq)]
pub struct UniformValue {
    pub data: Vec<f32>,
    pub element_length: u16,
    pub y_flip: bool,
    /// Flip applied at the last upload, `None` if not uploaded since last set
    uploaded_flip: Option<bool>,
}

pub struct ProgramData {
    program: ProgramHandle,
    vertex_attribute_locations: FxHashMap<String, u32>,
    vertex_uniform_infos: FxHashMap<String, UniformInfo>,
    fragment_uniform_infos: FxHashMap<String, UniformInfo>,
    uniforms: FxHashMap<u16, UniformValue>,
    device: SharedDevice,
}

impl ProgramData {
    pub fn new(device: SharedDevice, program: ProgramHandle) -> Self {
        Self {
            program,
            vertex_attribute_locations: FxHashMap::default(),
            vertex_uniform_infos: FxHashMap::default(),
            fragment_uniform_infos: FxHashMap::default(),
            uniforms: FxHashMap::default(),
            device,
        }
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    // ===== REFLECTION =====

    pub fn add_attribute(&mut self, name: &str, location: u32) {
        self.vertex_attribute_locations.insert(name.to_string(), location);
    }

    pub fn add_vertex_uniform(&mut self, name: &str, info: UniformInfo) {
        self.vertex_uniform_infos.insert(name.to_string(), info);
    }

    pub fn add_fragment_uniform(&mut self, name: &str, info: UniformInfo) {
        self.fragment_uniform_infos.insert(name.to_string(), info);
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.vertex_attribute_locations.get(name).copied()
    }

    /// Uniform info by name, vertex stage first
    pub fn uniform_info(&self, name: &str) -> Option<&UniformInfo> {
        self.vertex_uniform_infos
            .get(name)
            .or_else(|| self.fragment_uniform_infos.get(name))
    }

    /// Uniform info by handle, vertex stage first
    pub fn uniform_info_by_handle(&self, handle: UniformHandle) -> Option<&UniformInfo> {
        self.vertex_uniform_infos
            .values()
            .chain(self.fragment_uniform_infos.values())
            .find(|info| info.handle == handle)
    }

    // ===== UNIFORM CACHE =====

    /// Store the value of a uniform, replacing any previous value entirely
    pub fn set_uniform(&mut self, handle: UniformHandle, data: &[f32], y_flip: bool, element_length: usize) {
        let value = self.uniforms.entry(handle.idx).or_insert_with(|| UniformValue {
            data: Vec::new(),
            element_length: 0,
            y_flip: false,
            uploaded_flip: None,
        });
        value.data.clear();
        value.data.extend_from_slice(data);
        value.element_length = element_length as u16;
        value.y_flip = y_flip;
        value.uploaded_flip = None;
    }

    /// Cached value of a uniform
    pub fn uniform(&self, handle: UniformHandle) -> Option<&UniformValue> {
        self.uniforms.get(&handle.idx)
    }

    /// Number of cached uniform values
    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }

    /// Upload every cached value that changed since its last upload
    ///
    /// `flip_y` tells whether flip-flagged uniforms must be flipped for the
    /// current target. Returns the number of uploads.
    pub fn commit_uniforms(&mut self, device: &mut dyn GraphicsDevice, flip_y: bool) -> usize {
        let mut uploads = 0;
        for (idx, value) in self.uniforms.iter_mut() {
            let apply_flip = value.y_flip && flip_y;
            if value.uploaded_flip == Some(apply_flip) {
                continue;
            }
            let handle = UniformHandle::new(*idx);
            if apply_flip {
                device.set_uniform(handle, &flip_matrices(&value.data), value.element_length);
            } else {
                device.set_uniform(handle, &value.data, value.element_length);
            }
            value.uploaded_flip = Some(apply_flip);
            uploads += 1;
        }
        engine_trace!("native::ProgramData", "Committed {} uniforms for {:?}", uploads, self.program);
        uploads
    }

    /// Forget what was uploaded so the next commit uploads every value
    ///
    /// Uniform handles are shared by name between programs, so another
    /// program may have overwritten them since this one was last used.
    pub fn invalidate_uploads(&mut self) {
        for value in self.uniforms.values_mut() {
            value.uploaded_flip = None;
        }
    }
}

/// Negate the Y row of every 4x4 matrix in `data`
///
/// Data that is not a whole number of matrices is returned unchanged.
fn flip_matrices(data: &[f32]) -> Vec<f32> {
    if data.is_empty() || data.len() % 16 != 0 {
        return data.to_vec();
    }
    let flip = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
    data.chunks_exact(16)
        .flat_map(|matrix| (flip * Mat4::from_cols_slice(matrix)).to_cols_array())
        .collect()
}

impl Drop for ProgramData {
    fn drop(&mut self) {
        let program = std::mem::replace(&mut self.program, ProgramHandle::INVALID);
        let mut uniforms: Vec<UniformHandle> = self
            .vertex_uniform_infos
            .drain()
            .chain(self.fragment_uniform_infos.drain())
            .map(|(_, info)| info.handle)
            .filter(|handle| handle.is_valid())
            .collect();
        // A uniform used by both stages shares one handle
        uniforms.sort_by_key(|handle| handle.idx);
        uniforms.dedup();

        let mut device = lock_device(&self.device);
        if program.is_valid() {
            device.destroy(program.into());
        }
        for handle in uniforms {
            device.destroy(handle.into());
        }
    }
}

#[cfg(test)]
#[path = "program_tests.rs"]
mod tests;
