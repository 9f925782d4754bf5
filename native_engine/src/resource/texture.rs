/// Texture owned by the engine

use slotmap::new_key_type;
use crate::graphics_device::{SharedDevice, TextureHandle, SamplerFlags, lock_device};

new_key_type! {
    /// Ticket of a texture in the engine's table
    pub struct TextureKey;
}

pub struct TextureData {
    handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    /// Sampler flags used whenever the texture is bound
    pub flags: SamplerFlags,
    pub anisotropic_level: u8,
    device: SharedDevice,
}

impl TextureData {
    /// Create an empty texture (no native handle yet)
    pub fn new(device: SharedDevice) -> Self {
        Self {
            handle: TextureHandle::INVALID,
            width: 0,
            height: 0,
            flags: SamplerFlags::empty(),
            anisotropic_level: 0,
            device,
        }
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Sampler flags for binding, with anisotropic filtering when a level is set
    pub fn sampler_flags(&self) -> SamplerFlags {
        if self.anisotropic_level > 1 {
            (self.flags - SamplerFlags::FILTER_MASK) | SamplerFlags::MIN_ANISOTROPIC | SamplerFlags::MAG_ANISOTROPIC
        } else {
            self.flags
        }
    }

    /// Replace the native handle, destroying the previous one
    pub fn set_handle(&mut self, handle: TextureHandle) {
        self.dispose();
        self.handle = handle;
    }

    /// Destroy the native handle; returns false if there was none
    pub fn dispose(&mut self) -> bool {
        let handle = std::mem::replace(&mut self.handle, TextureHandle::INVALID);
        if !handle.is_valid() {
            return false;
        }
        lock_device(&self.device).destroy(handle.into());
        true
    }
}

impl Drop for TextureData {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
