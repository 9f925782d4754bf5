/// Clear parameters shared between view slots.
///
/// A `ClearState` holds color, depth, stencil and flags. Each subscribed view
/// slot is re-configured whenever a value changes, so a frame buffer never
/// keeps a stale clear configuration on its slot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use slotmap::new_key_type;
use crate::graphics_device::{GraphicsDevice, SharedDevice, ClearFlags, ViewId, lock_device};
use crate::utils::ResourceTable;

new_key_type! {
    /// Subscription of one view slot to a ClearState
    pub struct ClearSubscriptionKey;
}

/// Clear state shared by every frame buffer that must clear identically
pub type SharedClearState = Arc<Mutex<ClearState>>;

pub(crate) fn lock_clear_state(clear_state: &SharedClearState) -> MutexGuard<'_, ClearState> {
    clear_state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ClearState {
    red: f32,
    green: f32,
    blue: f32,
    alpha: f32,
    depth: f32,
    flags: ClearFlags,
    stencil: u8,
    device: SharedDevice,
    /// View slot of every subscribed ViewClearState; `None` while the
    /// subscriber waits for a slot after a device reset
    subscribers: ResourceTable<ClearSubscriptionKey, Option<ViewId>>,
}

impl ClearState {
    pub fn new(device: SharedDevice) -> Self {
        Self {
            red: 68.0 / 255.0,
            green: 51.0 / 255.0,
            blue: 85.0 / 255.0,
            alpha: 1.0,
            depth: 1.0,
            flags: ClearFlags::COLOR | ClearFlags::DEPTH,
            stencil: 0,
            device,
            subscribers: ResourceTable::new(),
        }
    }

    /// Create a ClearState ready to be shared between frame buffers
    pub fn shared(device: SharedDevice) -> SharedClearState {
        Arc::new(Mutex::new(Self::new(device)))
    }

    /// Set the clear color (components in 0..1)
    ///
    /// Returns false, without notifying, when the color is unchanged.
    pub fn update_color(&mut self, r: f32, g: f32, b: f32, a: f32) -> bool {
        let changed = r != self.red || g != self.green || b != self.blue || a != self.alpha;
        if changed {
            self.red = r;
            self.green = g;
            self.blue = b;
            self.alpha = a;
            self.update();
        }
        changed
    }

    /// Set which buffers are cleared
    pub fn update_flags(&mut self, flags: ClearFlags) -> bool {
        let changed = flags != self.flags;
        if changed {
            self.flags = flags;
            self.update();
        }
        changed
    }

    pub fn update_depth(&mut self, depth: f32) -> bool {
        let changed = depth != self.depth;
        if changed {
            self.depth = depth;
            self.update();
        }
        changed
    }

    pub fn update_stencil(&mut self, stencil: u8) -> bool {
        let changed = stencil != self.stencil;
        if changed {
            self.stencil = stencil;
            self.update();
        }
        changed
    }

    /// Re-apply the clear parameters to every subscribed view slot
    pub fn update(&mut self) {
        let (flags, rgba, depth, stencil) = (self.flags, self.color(), self.depth, self.stencil);
        let device = self.device.clone();
        let mut device = lock_device(&device);
        self.subscribers.apply_to_all(|view_id| {
            if let Some(view_id) = *view_id {
                apply_clear(&mut *device, view_id, flags, rgba, depth, stencil);
            }
        });
    }

    /// Color packed as `0xRRGGBBAA`
    pub fn color(&self) -> u32 {
        let channel = |value: f32| (value * u8::MAX as f32) as u8 as u32;
        (channel(self.red) << 24)
            | (channel(self.green) << 16)
            | (channel(self.blue) << 8)
            | channel(self.alpha)
    }

    /// Color as normalized `[r, g, b, a]`
    pub fn color_components(&self) -> [f32; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn flags(&self) -> ClearFlags {
        self.flags
    }

    pub fn stencil(&self) -> u8 {
        self.stencil
    }

    /// Number of subscribed views, suspended ones included
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of subscribed views that currently own a slot
    pub fn active_subscriber_count(&self) -> usize {
        self.subscribers
            .tickets()
            .into_iter()
            .filter(|ticket| matches!(self.subscribers.get(*ticket), Some(Some(_))))
            .count()
    }

    pub(crate) fn subscribe(&mut self, view_id: ViewId) -> ClearSubscriptionKey {
        self.subscribers.insert(Some(view_id))
    }

    pub(crate) fn unsubscribe(&mut self, subscription: ClearSubscriptionKey) {
        self.subscribers.remove(subscription);
    }

    pub(crate) fn move_subscription(&mut self, subscription: ClearSubscriptionKey, view_id: ViewId) {
        if let Some(subscribed) = self.subscribers.get_mut(subscription) {
            *subscribed = Some(view_id);
        }
    }

    /// Stop applying clears for a subscription until it moves to a new slot
    pub(crate) fn suspend_subscription(&mut self, subscription: ClearSubscriptionKey) {
        if let Some(subscribed) = self.subscribers.get_mut(subscription) {
            *subscribed = None;
        }
    }

    /// Apply the clear parameters to a single view slot
    pub(crate) fn apply_to_view(&self, view_id: ViewId) {
        let mut device = lock_device(&self.device);
        apply_clear(&mut *device, view_id, self.flags, self.color(), self.depth, self.stencil);
    }
}

/// Configure a slot's clear and drop any state left pending on it
fn apply_clear(device: &mut dyn GraphicsDevice, view_id: ViewId, flags: ClearFlags, rgba: u32, depth: f32, stencil: u8) {
    device.set_view_clear(view_id, flags, rgba, depth, stencil);
    device.discard();
    device.touch(view_id);
}

/// Binds one ClearState to one view slot.
///
/// Subscribes on creation and unsubscribes on drop. The ClearState is kept
/// alive for as long as any view is subscribed to it.
pub struct ViewClearState {
    view_id: ViewId,
    clear_state: SharedClearState,
    subscription: ClearSubscriptionKey,
}

impl ViewClearState {
    pub fn new(view_id: ViewId, clear_state: SharedClearState) -> Self {
        let subscription = lock_clear_state(&clear_state).subscribe(view_id);
        Self {
            view_id,
            clear_state,
            subscription,
        }
    }

    pub fn update_color(&self, r: f32, g: f32, b: f32, a: f32) -> bool {
        lock_clear_state(&self.clear_state).update_color(r, g, b, a)
    }

    pub fn update_flags(&self, flags: ClearFlags) -> bool {
        lock_clear_state(&self.clear_state).update_flags(flags)
    }

    pub fn update_depth(&self, depth: f32) -> bool {
        lock_clear_state(&self.clear_state).update_depth(depth)
    }

    pub fn update_stencil(&self, stencil: u8) -> bool {
        lock_clear_state(&self.clear_state).update_stencil(stencil)
    }

    /// Move to another view slot and configure it
    pub fn update_view_id(&mut self, view_id: ViewId) {
        self.view_id = view_id;
        lock_clear_state(&self.clear_state).move_subscription(self.subscription, view_id);
        self.update();
    }

    /// Release the slot until `update_view_id` assigns a new one
    ///
    /// A suspended view ignores changes to the shared clear state, so the
    /// slot number it used to own can be handed to another frame buffer.
    pub fn suspend(&self) {
        lock_clear_state(&self.clear_state).suspend_subscription(self.subscription);
    }

    /// Apply the current clear parameters to this view slot
    pub fn update(&self) {
        lock_clear_state(&self.clear_state).apply_to_view(self.view_id);
    }

    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    pub fn clear_state(&self) -> &SharedClearState {
        &self.clear_state
    }
}

impl Drop for ViewClearState {
    fn drop(&mut self) {
        lock_clear_state(&self.clear_state).unsubscribe(self.subscription);
    }
}

#[cfg(test)]
#[path = "clear_state_tests.rs"]
mod tests;
