/// View-slot allocator and bound frame buffer tracking.
///
/// View slots are handed out by a counter that restarts on every device
/// reset. A reset does not re-assign slots eagerly: it marks every frame
/// buffer dirty and each one receives a fresh slot the next time it is bound.
///
/// Exactly one implicit back buffer (invalid native handle) exists for the
/// manager's whole lifetime, and the bound frame buffer is always valid.

use crate::error::Result;
use crate::{engine_debug, engine_error, engine_info, engine_trace, engine_warn, invalid_resource};
use crate::graphics_device::{SharedDevice, FrameBufferHandle, ViewId, lock_device};
use crate::utils::ResourceTable;
use super::clear_state::{ClearState, SharedClearState};
use super::frame_buffer_data::{FrameBufferData, FrameBufferKey};

const SOURCE: &str = "native::FrameBufferManager";

pub struct FrameBufferManager {
    device: SharedDevice,
    frame_buffers: ResourceTable<FrameBufferKey, FrameBufferData>,
    bound: FrameBufferKey,
    back_buffer: FrameBufferKey,
    next_view_id: ViewId,
    rendering_to_target: bool,
}

impl FrameBufferManager {
    /// Create the manager and its implicit back buffer, sized like the device's
    pub fn new(device: SharedDevice) -> Self {
        let (width, height) = lock_device(&device).back_buffer_size();
        let mut manager = Self {
            device,
            frame_buffers: ResourceTable::new(),
            bound: FrameBufferKey::default(),
            back_buffer: FrameBufferKey::default(),
            next_view_id: 0,
            rendering_to_target: false,
        };
        let clear_state = ClearState::shared(manager.device.clone());
        let back_buffer = manager.create_new_with_clear_state(FrameBufferHandle::INVALID, clear_state, width, height, true);
        manager.back_buffer = back_buffer;
        manager.bound = back_buffer;
        manager
    }

    /// Register a frame buffer with its own clear state
    pub fn create_new(&mut self, frame_buffer: FrameBufferHandle, width: u16, height: u16) -> FrameBufferKey {
        let clear_state = ClearState::shared(self.device.clone());
        self.create_new_with_clear_state(frame_buffer, clear_state, width, height, false)
    }

    /// Register a frame buffer clearing through an externally shared clear state
    ///
    /// Used for swapchain and XR targets that must all clear identically.
    pub fn create_new_with_clear_state(
        &mut self,
        frame_buffer: FrameBufferHandle,
        clear_state: SharedClearState,
        width: u16,
        height: u16,
        act_as_back_buffer: bool,
    ) -> FrameBufferKey {
        let view_id = self.new_view_id();
        let device = self.device.clone();
        let ticket = self.frame_buffers.insert_with_ticket(|ticket| {
            FrameBufferData::new(device, frame_buffer, view_id, clear_state, width, height, act_as_back_buffer, ticket)
        });
        engine_debug!(SOURCE, "Frame buffer {:?} ({}x{}) registered on view {}", frame_buffer, width, height, view_id);
        ticket
    }

    /// Make a frame buffer the current render target
    ///
    /// A frame buffer whose slot went stale after a reset receives a fresh
    /// slot here. The back buffer only moves to the new slot; other frame
    /// buffers are re-attached and get their viewport reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the ticket was revoked.
    pub fn bind(&mut self, ticket: FrameBufferKey) -> Result<()> {
        if !self.frame_buffers.contains(ticket) {
            return Err(invalid_resource!(SOURCE, "Cannot bind disposed frame buffer {:?}", ticket));
        }
        self.bind_registered(ticket);
        Ok(())
    }

    fn bind_registered(&mut self, ticket: FrameBufferKey) {
        self.bound = ticket;

        if self.frame_buffers[ticket].needs_view_id() {
            let view_id = self.new_view_id();
            let is_back_buffer = ticket == self.back_buffer;
            let data = &mut self.frame_buffers[ticket];
            if is_back_buffer {
                data.use_view_id(view_id);
            } else {
                data.set_up_view(view_id);
            }
            engine_trace!(SOURCE, "Frame buffer {:?} reassigned to view {}", ticket, view_id);
        }

        self.rendering_to_target = self.frame_buffers[ticket].renders_to_target();
    }

    /// Restore the back buffer as the render target
    ///
    /// The argument is not checked against the bound frame buffer: overlapping
    /// render passes (XR) may unbind with a stale ticket. Callers must not rely
    /// on unbind being the inverse of bind for arbitrary frame buffers.
    pub fn unbind(&mut self, _ticket: FrameBufferKey) {
        self.bind_registered(self.back_buffer);
        self.rendering_to_target = false;
    }

    /// Next view slot
    ///
    /// # Panics
    ///
    /// Exceeding the device's view count is a fatal configuration error.
    pub fn new_view_id(&mut self) -> ViewId {
        let max_views = lock_device(&self.device).caps().max_views;
        self.next_view_id += 1;
        if self.next_view_id >= max_views {
            engine_error!(SOURCE, "View id {} exceeds the device limit of {} views", self.next_view_id, max_views);
        }
        assert!(
            self.next_view_id < max_views,
            "view id {} exceeds the device limit of {} views",
            self.next_view_id,
            max_views
        );
        self.next_view_id
    }

    /// React to a device reset: restart slot allocation and rebind the back buffer
    pub fn reset(&mut self) {
        self.next_view_id = 0;
        self.frame_buffers.apply_to_all(|data| data.mark_view_assignment_dirty());
        self.unbind(self.bound);
        engine_info!(SOURCE, "View slots reset, {} frame buffers pending reassignment", self.frame_buffers.len() - 1);
    }

    /// Dispose a frame buffer, destroying its native handle
    ///
    /// The back buffer cannot be disposed. Disposing the bound frame buffer
    /// rebinds the back buffer first. Returns false if nothing was disposed.
    pub fn dispose(&mut self, ticket: FrameBufferKey) -> bool {
        if ticket == self.back_buffer {
            engine_warn!(SOURCE, "Refusing to dispose the implicit back buffer");
            return false;
        }
        if ticket == self.bound {
            self.unbind(ticket);
        }
        self.frame_buffers.remove(ticket).is_some()
    }

    /// Dispose every frame buffer except the implicit back buffer
    pub fn dispose_all(&mut self) {
        self.unbind(self.bound);
        let back_buffer = self.back_buffer;
        self.frame_buffers.for_each_live(|table, ticket| {
            if ticket != back_buffer {
                table.remove(ticket);
            }
        });
        engine_debug!(SOURCE, "All off-screen frame buffers disposed");
    }

    /// Follow a surface resize
    pub fn resize_back_buffer(&mut self, width: u16, height: u16) {
        self.frame_buffers[self.back_buffer].set_size(width, height);
    }

    pub fn is_rendering_to_target(&self) -> bool {
        self.rendering_to_target
    }

    /// Currently bound frame buffer
    pub fn bound(&self) -> &FrameBufferData {
        &self.frame_buffers[self.bound]
    }

    pub fn bound_ticket(&self) -> FrameBufferKey {
        self.bound
    }

    pub fn back_buffer(&self) -> &FrameBufferData {
        &self.frame_buffers[self.back_buffer]
    }

    pub fn back_buffer_ticket(&self) -> FrameBufferKey {
        self.back_buffer
    }

    pub fn get(&self, ticket: FrameBufferKey) -> Option<&FrameBufferData> {
        self.frame_buffers.get(ticket)
    }

    /// Number of registered frame buffers, back buffer included
    pub fn len(&self) -> usize {
        self.frame_buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_buffers.is_empty()
    }
}

impl Drop for FrameBufferManager {
    fn drop(&mut self) {
        self.frame_buffers.clear();
    }
}

#[cfg(test)]
#[path = "frame_buffer_manager_tests.rs"]
mod tests;
