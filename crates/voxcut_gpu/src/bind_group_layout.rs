//! Centralized registry for bind group layouts.

use rustc_hash::FxHashMap;
use parking_lot::RwLock;
use std::borrow::Cow;

/// A registry for bind group layouts that provides caching and reuse across
/// kernels that share the same binding shape.
#[derive(Debug)]
pub struct BindGroupLayoutRegistry {
    layouts: RwLock<FxHashMap<Cow<'static, str>, wgpu::BindGroupLayout>>,
}

impl BindGroupLayoutRegistry {
    /// Creates a new, empty bind group layout registry.
    pub fn new() -> Self {
        Self {
            layouts: RwLock::new(FxHashMap::default()),
        }
    }

    /// Gets or creates a bind group layout for the given ID, calling
    /// `create_fn` only if the layout doesn't already exist.
    pub fn get_or_create_layout<F>(&self, id: Cow<'static, str>, create_fn: F) -> wgpu::BindGroupLayout
    where
        F: FnOnce() -> wgpu::BindGroupLayout,
    {
        if let Some(layout) = self.layouts.read().get(&id) {
            return layout.clone();
        }

        let mut layouts = self.layouts.write();
        if let Some(layout) = layouts.get(&id) {
            return layout.clone();
        }

        let layout = create_fn();
        layouts.insert(id, layout.clone());
        layout
    }
}

impl Default for BindGroupLayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}
