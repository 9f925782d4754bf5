/// Tests for ClearState and ViewClearState
///
/// Notifications are observed through the SetViewClear calls recorded by the
/// mock device: one notification = one SetViewClear per subscribed view.

use super::*;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, DeviceCall};

fn setup() -> (Arc<Mutex<MockGraphicsDevice>>, SharedDevice) {
    MockGraphicsDevice::shared(32)
}

fn clear_count(mock: &Arc<Mutex<MockGraphicsDevice>>, view: ViewId) -> usize {
    mock.lock().unwrap().view_clears(view).len()
}

// ============================================================================
// Tests: defaults and packing
// ============================================================================

#[test]
fn test_default_values() {
    let (_mock, device) = setup();
    let state = ClearState::new(device);

    assert_eq!(state.flags(), ClearFlags::COLOR | ClearFlags::DEPTH);
    assert_eq!(state.depth(), 1.0);
    assert_eq!(state.stencil(), 0);
    assert_eq!(state.color(), 0x443355ff);
}

#[test]
fn test_color_packs_rgba() {
    let (_mock, device) = setup();
    let mut state = ClearState::new(device);

    state.update_color(1.0, 0.0, 0.5, 1.0);
    // 0.5 * 255 = 127.5, truncated to 127
    assert_eq!(state.color(), 0xff007fff);
    assert_eq!(state.color_components(), [1.0, 0.0, 0.5, 1.0]);
}

#[test]
fn test_color_saturates_out_of_range_components() {
    let (_mock, device) = setup();
    let mut state = ClearState::new(device);

    state.update_color(2.0, -1.0, 0.0, 1.0);
    assert_eq!(state.color(), 0xff0000ff);
}

// ============================================================================
// Tests: change detection
// ============================================================================

#[test]
fn test_identical_color_notifies_once() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let view = ViewClearState::new(4, clear_state);

    assert!(view.update_color(0.1, 0.2, 0.3, 1.0));
    assert!(!view.update_color(0.1, 0.2, 0.3, 1.0));

    assert_eq!(clear_count(&mock, 4), 1);
}

#[test]
fn test_distinct_colors_notify_each_time() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let view = ViewClearState::new(4, clear_state);

    view.update_color(0.1, 0.2, 0.3, 1.0);
    view.update_color(0.4, 0.5, 0.6, 1.0);
    view.update_color(0.1, 0.2, 0.3, 1.0);

    assert_eq!(clear_count(&mock, 4), 3);
}

#[test]
fn test_unchanged_depth_stencil_flags_are_no_ops() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let view = ViewClearState::new(2, clear_state);

    assert!(!view.update_depth(1.0));
    assert!(!view.update_stencil(0));
    assert!(!view.update_flags(ClearFlags::COLOR | ClearFlags::DEPTH));
    assert_eq!(clear_count(&mock, 2), 0);

    assert!(view.update_depth(0.5));
    assert!(view.update_stencil(7));
    assert!(view.update_flags(ClearFlags::STENCIL));
    assert_eq!(clear_count(&mock, 2), 3);
}

#[test]
fn test_update_always_notifies() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let _view = ViewClearState::new(2, clear_state.clone());

    clear_state.lock().unwrap().update();
    clear_state.lock().unwrap().update();
    assert_eq!(clear_count(&mock, 2), 2);
}

// ============================================================================
// Tests: view application
// ============================================================================

#[test]
fn test_apply_sets_clear_discards_and_touches() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let view = ViewClearState::new(5, clear_state);

    view.update_stencil(3);

    let calls = mock.lock().unwrap().calls.clone();
    assert_eq!(
        calls,
        vec![
            DeviceCall::SetViewClear {
                view: 5,
                flags: ClearFlags::COLOR | ClearFlags::DEPTH,
                rgba: 0x443355ff,
                depth: 1.0,
                stencil: 3,
            },
            DeviceCall::Discard,
            DeviceCall::Touch { view: 5 },
        ]
    );
}

#[test]
fn test_shared_state_notifies_every_view() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let a = ViewClearState::new(1, clear_state.clone());
    let _b = ViewClearState::new(2, clear_state.clone());

    assert_eq!(clear_state.lock().unwrap().subscriber_count(), 2);

    a.update_depth(0.25);
    assert_eq!(clear_count(&mock, 1), 1);
    assert_eq!(clear_count(&mock, 2), 1);
}

#[test]
fn test_update_view_id_moves_subscription() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let mut view = ViewClearState::new(1, clear_state.clone());

    view.update_view_id(9);
    assert_eq!(view.view_id(), 9);
    assert_eq!(clear_count(&mock, 9), 1);

    mock.lock().unwrap().clear_calls();
    clear_state.lock().unwrap().update();
    assert_eq!(clear_count(&mock, 1), 0);
    assert_eq!(clear_count(&mock, 9), 1);
}

#[test]
fn test_suspended_view_skips_updates_until_moved() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let mut view = ViewClearState::new(3, clear_state.clone());
    let _other = ViewClearState::new(4, clear_state.clone());

    view.suspend();
    assert_eq!(clear_state.lock().unwrap().active_subscriber_count(), 1);
    mock.lock().unwrap().clear_calls();
    clear_state.lock().unwrap().update_stencil(7);
    assert_eq!(clear_count(&mock, 3), 0);
    assert_eq!(clear_count(&mock, 4), 1);

    view.update_view_id(5);
    assert_eq!(clear_state.lock().unwrap().active_subscriber_count(), 2);
    mock.lock().unwrap().clear_calls();
    clear_state.lock().unwrap().update_stencil(8);
    assert_eq!(clear_count(&mock, 3), 0);
    assert_eq!(clear_count(&mock, 5), 1);
}

#[test]
fn test_drop_unsubscribes() {
    let (mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let keep = ViewClearState::new(1, clear_state.clone());
    {
        let _dropped = ViewClearState::new(2, clear_state.clone());
        assert_eq!(clear_state.lock().unwrap().subscriber_count(), 2);
    }
    assert_eq!(clear_state.lock().unwrap().subscriber_count(), 1);

    keep.update_color(0.0, 0.0, 0.0, 0.0);
    assert_eq!(clear_count(&mock, 2), 0);
    assert_eq!(clear_count(&mock, 1), 1);
}

#[test]
fn test_view_keeps_shared_state_alive() {
    let (_mock, device) = setup();
    let clear_state = ClearState::shared(device);
    let view = ViewClearState::new(1, clear_state.clone());
    drop(clear_state);

    assert!(view.update_depth(0.0));
    assert_eq!(lock_clear_state(view.clear_state()).depth(), 0.0);
}
