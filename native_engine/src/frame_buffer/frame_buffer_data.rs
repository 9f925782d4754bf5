/// One frame buffer and the view slot it renders through.
///
/// Owned exclusively by the [`FrameBufferManager`](super::FrameBufferManager)
/// table; callers hold its [`FrameBufferKey`]. The native handle is destroyed
/// exactly once, whichever of explicit disposal or table teardown comes first.

use std::sync::atomic::{AtomicBool, Ordering};
use slotmap::new_key_type;
use crate::graphics_device::{SharedDevice, FrameBufferHandle, ViewId, lock_device};
use super::clear_state::{ViewClearState, SharedClearState};

new_key_type! {
    /// Ticket of a frame buffer in the manager's table
    pub struct FrameBufferKey;
}

pub struct FrameBufferData {
    frame_buffer: FrameBufferHandle,
    view_id: ViewId,
    view_clear_state: ViewClearState,
    width: u16,
    height: u16,
    /// Slot assignment must be recomputed before next use (set by a device reset)
    view_assignment_dirty: bool,
    /// Rendered to directly (swapchain, XR) rather than sampled afterwards.
    /// Such frame buffers do not get their projection flipped on
    /// top-left-origin backends.
    act_as_back_buffer: bool,
    manager_ticket: FrameBufferKey,
    disposed: AtomicBool,
    device: SharedDevice,
}

impl FrameBufferData {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: SharedDevice,
        frame_buffer: FrameBufferHandle,
        view_id: ViewId,
        clear_state: SharedClearState,
        width: u16,
        height: u16,
        act_as_back_buffer: bool,
        manager_ticket: FrameBufferKey,
    ) -> Self {
        let mut data = Self {
            frame_buffer,
            view_id,
            view_clear_state: ViewClearState::new(view_id, clear_state),
            width,
            height,
            view_assignment_dirty: false,
            act_as_back_buffer,
            manager_ticket,
            disposed: AtomicBool::new(false),
            device,
        };
        data.set_up_view(view_id);
        data
    }

    /// Move to a new slot without touching the slot's frame buffer attachment
    ///
    /// # Panics
    ///
    /// Panics if `view_id` is outside the device's view range.
    pub fn use_view_id(&mut self, view_id: ViewId) {
        let max_views = lock_device(&self.device).caps().max_views;
        assert!(view_id < max_views, "view id {} out of range (max_views = {})", view_id, max_views);

        self.view_assignment_dirty = false;
        self.view_id = view_id;
        self.view_clear_state.update_view_id(view_id);
    }

    /// Attach this frame buffer to a slot, then configure clear and viewport
    pub fn set_up_view(&mut self, view_id: ViewId) {
        lock_device(&self.device).set_view_frame_buffer(view_id, self.frame_buffer);
        self.use_view_id(view_id);
        lock_device(&self.device).set_view_rect(self.view_id, 0, 0, self.width, self.height);
    }

    /// Destroy the native handle
    ///
    /// Returns false if the frame buffer was already disposed. The implicit
    /// back buffer has no native handle and only flips the disposed flag.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if self.frame_buffer.is_valid() {
            lock_device(&self.device).destroy(self.frame_buffer.into());
        }
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn is_default_back_buffer(&self) -> bool {
        !self.frame_buffer.is_valid()
    }

    pub fn needs_view_id(&self) -> bool {
        self.view_assignment_dirty
    }

    /// Give up the current slot; clears stop reaching it until the next bind
    pub(crate) fn mark_view_assignment_dirty(&mut self) {
        self.view_assignment_dirty = true;
        self.view_clear_state.suspend();
    }

    /// Whether binding this frame buffer means rendering off-screen
    pub fn renders_to_target(&self) -> bool {
        !self.act_as_back_buffer
    }

    pub(crate) fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    pub fn frame_buffer(&self) -> FrameBufferHandle {
        self.frame_buffer
    }

    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    pub fn view_clear_state(&self) -> &ViewClearState {
        &self.view_clear_state
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn act_as_back_buffer(&self) -> bool {
        self.act_as_back_buffer
    }

    /// Ticket of this frame buffer in the manager's table
    pub fn ticket(&self) -> FrameBufferKey {
        self.manager_ticket
    }
}

impl Drop for FrameBufferData {
    fn drop(&mut self) {
        self.dispose();
    }
}
