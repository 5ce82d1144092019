// ============================================================================
// HISTORY — whole-canvas snapshot stack for undo/redo
// ============================================================================
//
// Every discrete user action (stroke release, fill, layer add/remove/merge/
// duplicate, transform commit) ends with a push.  A snapshot is a full deep
// copy of every layer plus the active-layer pointer; no snapshot ever shares
// pixel memory with the live canvas or with another snapshot, which is what
// makes the undo/redo inverse law hold byte-for-byte.

use image::RgbaImage;

use crate::canvas::{BlendMode, CanvasState, Layer};

/// Deep copy of one layer at capture time.
#[derive(Clone)]
pub struct LayerSnapshot {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub pixels: RgbaImage,
}

/// Immutable deep copy of the whole canvas state.
pub struct Snapshot {
    pub layers: Vec<LayerSnapshot>,
    pub active_layer_index: usize,
}

impl Snapshot {
    pub fn capture(canvas: &CanvasState) -> Self {
        Self {
            active_layer_index: canvas.active_layer_index,
            layers: canvas
                .layers
                .iter()
                .map(|l| LayerSnapshot {
                    name: l.name.clone(),
                    visible: l.visible,
                    opacity: l.opacity,
                    blend_mode: l.blend_mode,
                    pixels: l.pixels.clone(),
                })
                .collect(),
        }
    }

    /// Replace the live layer set with fresh copies of this snapshot.
    /// Arbitrary layers may differ afterwards, so the whole canvas is
    /// marked dirty for a full recomposite.
    pub fn restore_into(&self, canvas: &mut CanvasState) {
        canvas.layers.clear();
        for snap in &self.layers {
            let mut layer = Layer::new(snap.name.clone(), 1, 1, image::Rgba([0, 0, 0, 0]));
            layer.pixels = snap.pixels.clone();
            layer.visible = snap.visible;
            layer.opacity = snap.opacity;
            layer.blend_mode = snap.blend_mode;
            layer.mark_pixels_changed();
            canvas.layers.push(layer);
        }
        canvas.active_layer_index = self
            .active_layer_index
            .min(canvas.layers.len().saturating_sub(1));
        canvas.mark_all_dirty();
    }

    fn memory_bytes(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.pixels.as_raw().len() + l.name.len())
            .sum()
    }
}

/// Snapshot stack with a current index.
///
/// `entries[current]` always matches the live canvas (once the initial state
/// has been pushed).  Undo/redo move the index and restore; a push after an
/// undo truncates the abandoned redo tail first.
pub struct HistoryManager {
    entries: Vec<Snapshot>,
    current: usize,
    max_entries: usize,
    /// Optional total byte budget across all entries.
    max_memory_bytes: Option<usize>,
    /// Running total, kept in sync so `memory_usage` is O(1).
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50, Some(256 * 1024 * 1024))
    }
}

impl HistoryManager {
    pub fn new(max_entries: usize, max_memory_bytes: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            current: 0,
            max_entries: max_entries.max(1),
            max_memory_bytes,
            total_memory: 0,
        }
    }

    /// Capture the canvas as a new entry.  Discards any redo entries, then
    /// evicts the oldest entries past the caps (decrementing the current
    /// index to keep it pointing at the same snapshot).
    pub fn push(&mut self, canvas: &CanvasState) {
        if !self.entries.is_empty() {
            for dropped in self.entries.drain(self.current + 1..) {
                self.total_memory = self.total_memory.saturating_sub(dropped.memory_bytes());
            }
        }

        let snapshot = Snapshot::capture(canvas);
        self.total_memory += snapshot.memory_bytes();
        self.entries.push(snapshot);
        self.current = self.entries.len() - 1;

        self.prune();
    }

    /// Step back one entry and restore it.  Returns false at the bottom of
    /// the stack.
    pub fn undo(&mut self, canvas: &mut CanvasState) -> bool {
        if self.entries.is_empty() || self.current == 0 {
            return false;
        }
        self.current -= 1;
        self.entries[self.current].restore_into(canvas);
        true
    }

    /// Step forward one entry and restore it.  Returns false at the top.
    pub fn redo(&mut self, canvas: &mut CanvasState) -> bool {
        if self.entries.is_empty() || self.current + 1 >= self.entries.len() {
            return false;
        }
        self.current += 1;
        self.entries[self.current].restore_into(canvas);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.current + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes held by all snapshots (O(1), cached).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = 0;
        self.total_memory = 0;
    }

    /// Evict oldest entries beyond the entry cap, then beyond the byte
    /// budget.  Entries at or ahead of the current index are never evicted:
    /// the snapshot matching the live canvas must survive.
    fn prune(&mut self) {
        while self.entries.len() > self.max_entries && self.current > 0 {
            let dropped = self.entries.remove(0);
            self.total_memory = self.total_memory.saturating_sub(dropped.memory_bytes());
            self.current -= 1;
        }
        if let Some(budget) = self.max_memory_bytes {
            while self.total_memory > budget && self.current > 0 {
                let dropped = self.entries.remove(0);
                self.total_memory = self.total_memory.saturating_sub(dropped.memory_bytes());
                self.current -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn canvas() -> CanvasState {
        CanvasState::new(16, 16, Rgba([255, 255, 255, 255]))
    }

    fn paint(canvas: &mut CanvasState, x: u32, y: u32, px: Rgba<u8>) {
        canvas.layers[canvas.active_layer_index].pixels.put_pixel(x, y, px);
    }

    #[test]
    fn undo_then_redo_is_pixel_exact() {
        let mut canvas = canvas();
        let mut history = HistoryManager::default();
        history.push(&canvas); // initial state

        let before = canvas.layers[0].pixels.clone();
        paint(&mut canvas, 3, 3, Rgba([0, 0, 0, 255]));
        let after = canvas.layers[0].pixels.clone();
        history.push(&canvas);

        assert!(history.undo(&mut canvas));
        assert_eq!(canvas.layers[0].pixels.as_raw(), before.as_raw());
        assert!(history.redo(&mut canvas));
        assert_eq!(canvas.layers[0].pixels.as_raw(), after.as_raw());
    }

    #[test]
    fn snapshots_do_not_alias_the_live_buffer() {
        let mut canvas = canvas();
        let mut history = HistoryManager::default();
        history.push(&canvas);

        // Mutating the live canvas after the push must not leak into the
        // stored snapshot.
        paint(&mut canvas, 0, 0, Rgba([1, 2, 3, 255]));
        let mut other = self::canvas();
        history.entries[0].restore_into(&mut other);
        assert_eq!(*other.layers[0].pixels.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn push_after_undo_discards_redo() {
        let mut canvas = canvas();
        let mut history = HistoryManager::default();
        history.push(&canvas);

        paint(&mut canvas, 1, 1, Rgba([10, 0, 0, 255]));
        history.push(&canvas);
        paint(&mut canvas, 2, 2, Rgba([20, 0, 0, 255]));
        history.push(&canvas);

        history.undo(&mut canvas);
        assert!(history.can_redo());

        paint(&mut canvas, 3, 3, Rgba([30, 0, 0, 255]));
        history.push(&canvas);
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn cap_evicts_oldest_and_decrements_index() {
        let mut canvas = canvas();
        let mut history = HistoryManager::new(50, None);
        for i in 0..51u32 {
            paint(&mut canvas, 0, 0, Rgba([i as u8, 0, 0, 255]));
            history.push(&canvas);
        }
        assert_eq!(history.len(), 50);
        assert!(history.can_undo());
        assert!(!history.can_redo());
        // The oldest surviving entry is push #1, not push #0.
        while history.undo(&mut canvas) {}
        assert_eq!(*canvas.layers[0].pixels.get_pixel(0, 0), Rgba([1, 0, 0, 255]));
    }

    #[test]
    fn byte_budget_evicts_oldest() {
        let mut canvas = canvas(); // 16×16×4 = 1024 bytes per layer snapshot
        let mut history = HistoryManager::new(50, Some(3000));
        for i in 0..5u32 {
            paint(&mut canvas, 0, 0, Rgba([i as u8, 0, 0, 255]));
            history.push(&canvas);
        }
        assert!(history.memory_usage() <= 3000);
        assert!(history.len() < 5);
    }

    #[test]
    fn restore_recovers_layer_structure_and_active_index() {
        let mut canvas = canvas();
        let mut history = HistoryManager::default();
        canvas.add_layer("Ink".to_string());
        canvas.layers[1].opacity = 0.5;
        canvas.layers[1].blend_mode = BlendMode::Multiply;
        history.push(&canvas);

        canvas.delete_active_layer().unwrap();
        history.push(&canvas);

        history.undo(&mut canvas);
        assert_eq!(canvas.layers.len(), 2);
        assert_eq!(canvas.active_layer_index, 1);
        assert_eq!(canvas.layers[1].name, "Ink");
        assert_eq!(canvas.layers[1].opacity, 0.5);
        assert_eq!(canvas.layers[1].blend_mode, BlendMode::Multiply);
    }
}
