/// Tests for ProgramData
///
/// Covers the uniform cache (overwrite semantics, dirty tracking, per-uniform
/// Y-flip) and exactly-once destruction of the program and its uniforms.

use super::*;
use std::sync::{Arc, Mutex};
use crate::graphics_device::{GraphicsDevice, UniformType};
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, DeviceCall};

fn setup() -> (Arc<Mutex<MockGraphicsDevice>>, ProgramData) {
    let (mock, device) = MockGraphicsDevice::shared(16);
    let handle = mock.lock().unwrap().create_program(&[], &[]).unwrap();
    (mock, ProgramData::new(device, handle))
}

fn create_uniform(mock: &Arc<Mutex<MockGraphicsDevice>>, name: &str) -> UniformHandle {
    mock.lock().unwrap().create_uniform(name, UniformType::Mat4, 1).unwrap()
}

fn identity() -> Vec<f32> {
    Mat4::IDENTITY.to_cols_array().to_vec()
}

fn uploads(mock: &Arc<Mutex<MockGraphicsDevice>>) -> Vec<(UniformHandle, Vec<f32>)> {
    mock.lock()
        .unwrap()
        .calls
        .iter()
        .filter_map(|call| match call {
            DeviceCall::SetUniform { uniform, data, .. } => Some((*uniform, data.clone())),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Tests: Uniform cache
// ============================================================================

#[test]
fn test_set_uniform_overwrites_without_merge() {
    let (_mock, mut program) = setup();
    let handle = UniformHandle::new(7);

    program.set_uniform(handle, &[1.0, 2.0, 3.0, 4.0], false, 1);
    program.set_uniform(handle, &[5.0, 6.0, 7.0, 8.0], true, 1);

    let value = program.uniform(handle).unwrap();
    assert_eq!(value.data, vec![5.0, 6.0, 7.0, 8.0]);
    assert!(value.y_flip);
    assert_eq!(value.element_length, 1);
    assert_eq!(program.uniform_count(), 1);
}

#[test]
fn test_set_uniform_shorter_value_replaces_all_data() {
    let (_mock, mut program) = setup();
    let handle = UniformHandle::new(3);

    program.set_uniform(handle, &[1.0; 8], false, 2);
    program.set_uniform(handle, &[9.0; 4], false, 1);

    let value = program.uniform(handle).unwrap();
    assert_eq!(value.data, vec![9.0; 4]);
    assert_eq!(value.element_length, 1);
}

#[test]
fn test_unknown_uniform_has_no_value() {
    let (_mock, program) = setup();
    assert!(program.uniform(UniformHandle::new(1)).is_none());
}

// ============================================================================
// Tests: Commit
// ============================================================================

#[test]
fn test_commit_uploads_only_changed_values() {
    let (mock, mut program) = setup();
    let color = create_uniform(&mock, "u_color");
    let scale = create_uniform(&mock, "u_scale");

    program.set_uniform(color, &[1.0, 0.0, 0.0, 1.0], false, 1);
    program.set_uniform(scale, &[2.0, 0.0, 0.0, 0.0], false, 1);
    {
        let mut device = mock.lock().unwrap();
        assert_eq!(program.commit_uniforms(&mut *device, false), 2);
        device.clear_calls();
        assert_eq!(program.commit_uniforms(&mut *device, false), 0);
    }

    program.set_uniform(scale, &[3.0, 0.0, 0.0, 0.0], false, 1);
    {
        let mut device = mock.lock().unwrap();
        assert_eq!(program.commit_uniforms(&mut *device, false), 1);
    }
    assert_eq!(uploads(&mock), vec![(scale, vec![3.0, 0.0, 0.0, 0.0])]);
}

#[test]
fn test_commit_flips_flagged_matrices() {
    let (mock, mut program) = setup();
    let projection = create_uniform(&mock, "u_projection");
    program.set_uniform(projection, &identity(), true, 1);

    {
        let mut device = mock.lock().unwrap();
        program.commit_uniforms(&mut *device, true);
    }

    let (_, data) = uploads(&mock).remove(0);
    let flipped = Mat4::from_cols_slice(&data);
    assert_eq!(flipped, Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)));
}

#[test]
fn test_commit_ignores_flip_for_unflagged_uniform() {
    let (mock, mut program) = setup();
    let world = create_uniform(&mock, "u_world");
    program.set_uniform(world, &identity(), false, 1);

    {
        let mut device = mock.lock().unwrap();
        program.commit_uniforms(&mut *device, true);
    }

    assert_eq!(uploads(&mock), vec![(world, identity())]);
}

#[test]
fn test_commit_reuploads_when_target_flip_changes() {
    let (mock, mut program) = setup();
    let projection = create_uniform(&mock, "u_projection");
    let world = create_uniform(&mock, "u_world");
    program.set_uniform(projection, &identity(), true, 1);
    program.set_uniform(world, &identity(), false, 1);

    let mut device = mock.lock().unwrap();
    assert_eq!(program.commit_uniforms(&mut *device, false), 2);
    // Only the flagged uniform depends on the target
    assert_eq!(program.commit_uniforms(&mut *device, true), 1);
    assert_eq!(program.commit_uniforms(&mut *device, true), 0);
    assert_eq!(program.commit_uniforms(&mut *device, false), 1);
}

#[test]
fn test_flip_applies_to_every_matrix_of_an_array() {
    let (mock, mut program) = setup();
    let bones = create_uniform(&mock, "u_bones");
    let mut data = identity();
    data.extend(identity());
    program.set_uniform(bones, &data, true, 2);

    {
        let mut device = mock.lock().unwrap();
        program.commit_uniforms(&mut *device, true);
    }

    let (_, uploaded) = uploads(&mock).remove(0);
    assert_eq!(uploaded.len(), 32);
    assert_eq!(uploaded[5], -1.0);
    assert_eq!(uploaded[16 + 5], -1.0);
}

#[test]
fn test_flip_leaves_non_matrix_data_untouched() {
    let (mock, mut program) = setup();
    let offset = create_uniform(&mock, "u_offset");
    program.set_uniform(offset, &[1.0, 2.0, 3.0, 4.0], true, 1);

    {
        let mut device = mock.lock().unwrap();
        program.commit_uniforms(&mut *device, true);
    }

    assert_eq!(uploads(&mock), vec![(offset, vec![1.0, 2.0, 3.0, 4.0])]);
}

#[test]
fn test_invalidate_uploads_forces_full_commit() {
    let (mock, mut program) = setup();
    let a = create_uniform(&mock, "u_a");
    let b = create_uniform(&mock, "u_b");
    program.set_uniform(a, &[1.0; 4], false, 1);
    program.set_uniform(b, &[2.0; 4], false, 1);

    let mut device = mock.lock().unwrap();
    program.commit_uniforms(&mut *device, false);
    program.invalidate_uploads();
    assert_eq!(program.commit_uniforms(&mut *device, false), 2);
}

// ============================================================================
// Tests: Reflection
// ============================================================================

#[test]
fn test_uniform_info_lookup_prefers_vertex_stage() {
    let (_mock, mut program) = setup();
    let vertex = UniformInfo { stage: 0, handle: UniformHandle::new(1), y_flip: true };
    let fragment = UniformInfo { stage: 2, handle: UniformHandle::new(2), y_flip: false };
    program.add_vertex_uniform("u_shared", vertex);
    program.add_fragment_uniform("u_shared", fragment);
    program.add_fragment_uniform("u_sampler", fragment);

    assert_eq!(program.uniform_info("u_shared"), Some(&vertex));
    assert_eq!(program.uniform_info("u_sampler"), Some(&fragment));
    assert_eq!(program.uniform_info_by_handle(UniformHandle::new(2)), Some(&fragment));
    assert!(program.uniform_info("u_missing").is_none());
}

#[test]
fn test_attribute_location() {
    let (_mock, mut program) = setup();
    program.add_attribute("position", 0);
    program.add_attribute("uv", 3);

    assert_eq!(program.attribute_location("uv"), Some(3));
    assert_eq!(program.attribute_location("normal"), None);
}

// ============================================================================
// Tests: Destruction
// ============================================================================

#[test]
fn test_drop_destroys_program_and_uniforms_once() {
    let (mock, mut program) = setup();
    let handle = program.program();
    let shared = create_uniform(&mock, "u_shared");
    let vertex_only = create_uniform(&mock, "u_world");
    program.add_vertex_uniform("u_shared", UniformInfo { stage: 0, handle: shared, y_flip: false });
    program.add_fragment_uniform("u_shared", UniformInfo { stage: 0, handle: shared, y_flip: false });
    program.add_vertex_uniform("u_world", UniformInfo { stage: 0, handle: vertex_only, y_flip: false });

    drop(program);

    let mock = mock.lock().unwrap();
    assert_eq!(mock.destroy_count(handle), 1);
    assert_eq!(mock.destroy_count(shared), 1);
    assert_eq!(mock.destroy_count(vertex_only), 1);
    assert!(mock.live.is_empty());
}
