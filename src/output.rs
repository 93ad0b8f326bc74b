use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::collections::HashMap;
use crate::common::config::GapSettings;
use crate::geometry::Rect;

/// Stable opaque output identifier supplied by the output provider.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OutputHandle(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub struct OutputInfo {
    pub handle: OutputHandle,
    /// Raw output geometry. Fullscreen views fill this.
    pub geometry: Rect,
    /// Usable rectangle after subtracting shell-reserved space (panel, dock).
    /// Maximized and tiled views live inside this.
    pub desktop_area: Rect,
    pub gaps: GapSettings,
}

impl OutputInfo {
    pub fn new(handle: OutputHandle, geometry: Rect, gaps: GapSettings) -> Self {
        Self {
            handle,
            geometry,
            desktop_area: geometry,
            gaps,
        }
    }
}

/// Known outputs, keyed by handle. A dynamic map rather than an id-indexed
/// array: handles are provider-owned and not guaranteed dense.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    map: HashMap<OutputHandle, OutputInfo>,
    /// Insertion order; the first registered output is the placement default.
    order: Vec<OutputHandle>,
}

impl OutputRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.order.len() }

    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    pub fn get(&self, handle: OutputHandle) -> Option<&OutputInfo> { self.map.get(&handle) }

    pub fn get_mut(&mut self, handle: OutputHandle) -> Option<&mut OutputInfo> {
        self.map.get_mut(&handle)
    }

    pub fn first(&self) -> Option<&OutputInfo> {
        self.order.first().and_then(|h| self.map.get(h))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputInfo> {
        self.order.iter().filter_map(|h| self.map.get(h))
    }

    pub fn add(&mut self, info: OutputInfo) -> bool {
        if self.map.contains_key(&info.handle) {
            warn!(handle = ?info.handle, "output registered twice, ignoring");
            return false;
        }
        self.order.push(info.handle);
        self.map.insert(info.handle, info);
        true
    }

    pub fn remove(&mut self, handle: OutputHandle) -> Option<OutputInfo> {
        self.order.retain(|&h| h != handle);
        self.map.remove(&handle)
    }

    /// Raw resolution change. The usable area is reset to the new geometry
    /// until the shell reserves space again.
    pub fn resize(&mut self, handle: OutputHandle, geometry: Rect) -> bool {
        match self.map.get_mut(&handle) {
            Some(info) => {
                info.geometry = geometry;
                info.desktop_area = geometry;
                true
            }
            None => false,
        }
    }

    /// Usable-area change (a panel appeared or vanished), distinct from a
    /// resolution change.
    pub fn set_desktop_area(&mut self, handle: OutputHandle, area: Rect) -> bool {
        match self.map.get_mut(&handle) {
            Some(info) => {
                info.desktop_area = info.geometry.intersection(&area);
                true
            }
            None => false,
        }
    }

    pub fn set_gaps(&mut self, handle: OutputHandle, gaps: GapSettings) -> bool {
        match self.map.get_mut(&handle) {
            Some(info) => {
                info.gaps = gaps;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(id: u32, w: i32, h: i32) -> OutputInfo {
        OutputInfo::new(OutputHandle(id), Rect::new(0, 0, w, h), GapSettings::default())
    }

    #[test]
    fn first_follows_insertion_order() {
        let mut reg = OutputRegistry::new();
        reg.add(output(2, 800, 600));
        reg.add(output(1, 1920, 1080));
        assert_eq!(reg.first().unwrap().handle, OutputHandle(2));

        reg.remove(OutputHandle(2));
        assert_eq!(reg.first().unwrap().handle, OutputHandle(1));
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut reg = OutputRegistry::new();
        assert!(reg.add(output(1, 800, 600)));
        assert!(!reg.add(output(1, 1024, 768)));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(OutputHandle(1)).unwrap().geometry.width, 800);
    }

    #[test]
    fn resize_resets_desktop_area() {
        let mut reg = OutputRegistry::new();
        reg.add(output(1, 800, 600));
        reg.set_desktop_area(OutputHandle(1), Rect::new(0, 30, 800, 570));
        assert_eq!(reg.get(OutputHandle(1)).unwrap().desktop_area.y, 30);

        reg.resize(OutputHandle(1), Rect::new(0, 0, 1024, 768));
        assert_eq!(
            reg.get(OutputHandle(1)).unwrap().desktop_area,
            Rect::new(0, 0, 1024, 768)
        );
    }

    #[test]
    fn desktop_area_clamps_to_geometry() {
        let mut reg = OutputRegistry::new();
        reg.add(output(1, 800, 600));
        reg.set_desktop_area(OutputHandle(1), Rect::new(-50, 0, 2000, 600));
        assert_eq!(
            reg.get(OutputHandle(1)).unwrap().desktop_area,
            Rect::new(0, 0, 800, 600)
        );
    }
}
