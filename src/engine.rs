// ============================================================================
// ENGINE — tool state, pointer-event entry points, undo/redo, layer ops
// ============================================================================
//
// One `Engine` owns everything: the canvas, the view transform, the brush,
// and the history stack.  Hosts construct it with an `EngineConfig`, feed it
// pointer events in device coordinates, and once per animation tick call
// `composite_dirty()` to refresh their display — however many pointer
// samples arrived in between, every one was rasterized immediately and the
// expensive recomposite happens once.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::brush::Brush;
pub use crate::brush::StrokePoint;
use crate::canvas::{CanvasState, DirtyRect, LayerTransform};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fill;
use crate::history::HistoryManager;
use crate::log_info;
use crate::transform::ViewTransform;

/// The active tool.  Matched exhaustively at the rasterizer entry points —
/// adding a tool means the compiler walks you to every dispatch site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
    Bucket,
}

/// Notified whenever the layer set or the active layer changes, so the
/// host's layer panel can rebuild (names, visibility, thumbnails).
pub type LayersChangedCallback = Box<dyn FnMut(&CanvasState)>;

/// In-progress stroke: pointer capture is held from down to up, so samples
/// keep arriving (and keep being rasterized) even outside the view surface.
struct StrokeState {
    last: StrokePoint,
    /// Union of everything this stroke touched; decides whether release
    /// pushes a history entry.
    touched: DirtyRect,
}

pub struct Engine {
    pub canvas: CanvasState,
    pub view: ViewTransform,
    pub history: HistoryManager,
    brush: Brush,
    tool: Tool,
    fill_tolerance: f32,
    stroke: Option<StrokeState>,
    layers_changed: Option<LayersChangedCallback>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let canvas = CanvasState::new(config.width, config.height, Rgba(config.background));
        let mut history = HistoryManager::new(config.history_limit, config.history_memory_budget);
        history.push(&canvas); // undo floor: the blank document

        let mut brush = Brush::new(16.0, Rgba([0, 0, 0, 255]));
        brush.pressure = config.pressure;

        log_info!(
            "engine: new {}×{} canvas, history limit {}",
            config.width,
            config.height,
            config.history_limit
        );

        Self {
            canvas,
            view: ViewTransform::default(),
            history,
            brush,
            tool: Tool::default(),
            fill_tolerance: fill::DEFAULT_TOLERANCE,
            stroke: None,
            layers_changed: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // TOOL STATE
    // ========================================================================

    pub fn set_current_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn current_tool(&self) -> Tool {
        self.tool
    }

    pub fn set_current_color(&mut self, color: Rgba<u8>) {
        self.brush.color = color;
    }

    pub fn current_color(&self) -> Rgba<u8> {
        self.brush.color
    }

    /// Brush diameter in canvas pixels.
    pub fn set_current_size(&mut self, size: f32) {
        if size.is_finite() {
            self.brush.size = size.clamp(1.0, 512.0);
        }
    }

    pub fn current_size(&self) -> f32 {
        self.brush.size
    }

    pub fn set_fill_tolerance(&mut self, tolerance: f32) {
        if tolerance.is_finite() {
            self.fill_tolerance = tolerance.max(0.0);
        }
    }

    /// Register the layer-panel notification hook.
    pub fn on_layers_changed(&mut self, callback: LayersChangedCallback) {
        self.layers_changed = Some(callback);
    }

    fn notify_layers_changed(&mut self) {
        if let Some(mut cb) = self.layers_changed.take() {
            cb(&self.canvas);
            self.layers_changed = Some(cb);
        }
    }

    // ========================================================================
    // POINTER EVENTS (device/view coordinates)
    // ========================================================================

    /// Begin a stroke (or perform a fill).  Coordinates are raw device/view
    /// coordinates; the view transform maps them into canvas space.  A
    /// non-finite sample is ignored outright.
    pub fn pointer_down(&mut self, x: f32, y: f32, pressure: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        let (cx, cy) = self
            .view
            .inverse((x, y), self.canvas.width, self.canvas.height);

        match self.tool {
            Tool::Pen | Tool::Eraser => {
                let point = StrokePoint::new(cx, cy, pressure);
                // The down event itself stamps, so a tap with zero movement
                // still leaves a dot.
                let dirty = self.rasterize_stamp(point);
                self.stroke = Some(StrokeState {
                    last: point,
                    touched: dirty,
                });
            }
            Tool::Bucket => {
                let dirty = self.fill_at(cx, cy);
                if !dirty.is_empty() {
                    self.save_state();
                }
            }
        }
    }

    /// Continue a stroke.  Every sample is rasterized immediately — samples
    /// arriving faster than the display tick are never dropped, their
    /// recomposite is merely coalesced.
    pub fn pointer_move(&mut self, x: f32, y: f32, pressure: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        let Some(stroke) = &self.stroke else {
            return;
        };
        let last = stroke.last;
        let (cx, cy) = self
            .view
            .inverse((x, y), self.canvas.width, self.canvas.height);
        let point = StrokePoint::new(cx, cy, pressure);

        let dirty = self.rasterize_segment(last, point);
        if let Some(stroke) = &mut self.stroke {
            stroke.last = point;
            stroke.touched.union(&dirty);
        }
    }

    /// End the stroke.  A completed stroke that touched any pixel becomes
    /// one history entry.
    pub fn pointer_up(&mut self) {
        if let Some(stroke) = self.stroke.take()
            && !stroke.touched.is_empty()
        {
            self.save_state();
        }
    }

    fn active_brush(&self) -> Brush {
        let mut brush = self.brush;
        brush.is_eraser = matches!(self.tool, Tool::Eraser);
        brush
    }

    fn rasterize_stamp(&mut self, point: StrokePoint) -> DirtyRect {
        let brush = self.active_brush();
        let Some(layer) = self.canvas.active_layer_mut() else {
            return DirtyRect::EMPTY;
        };
        let dirty = brush.stamp(&mut layer.pixels, point.x, point.y, point.pressure);
        if !dirty.is_empty() {
            layer.mark_pixels_changed();
            self.canvas.mark_dirty(dirty);
        }
        dirty
    }

    fn rasterize_segment(&mut self, from: StrokePoint, to: StrokePoint) -> DirtyRect {
        let brush = self.active_brush();
        let Some(layer) = self.canvas.active_layer_mut() else {
            return DirtyRect::EMPTY;
        };
        let dirty = brush.line(&mut layer.pixels, from, to);
        if !dirty.is_empty() {
            layer.mark_pixels_changed();
            self.canvas.mark_dirty(dirty);
        }
        dirty
    }

    fn fill_at(&mut self, cx: f32, cy: f32) -> DirtyRect {
        if !cx.is_finite() || !cy.is_finite() {
            return DirtyRect::EMPTY;
        }
        let color = self.brush.color;
        let tolerance = self.fill_tolerance;
        let Some(layer) = self.canvas.active_layer_mut() else {
            return DirtyRect::EMPTY;
        };
        let dirty = fill::flood_fill(
            &mut layer.pixels,
            cx.floor() as i32,
            cy.floor() as i32,
            color,
            tolerance,
        );
        if !dirty.is_empty() {
            layer.mark_pixels_changed();
            self.canvas.mark_dirty(dirty);
        }
        dirty
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Capture the canvas after a discrete action.  Called automatically at
    /// stroke release, fill, clear, and layer operations; hosts normally
    /// never need it directly.
    pub fn save_state(&mut self) {
        self.history.push(&self.canvas);
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo(&mut self.canvas);
        if moved {
            self.stroke = None;
            self.notify_layers_changed();
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo(&mut self.canvas);
        if moved {
            self.stroke = None;
            self.notify_layers_changed();
        }
        moved
    }

    // ========================================================================
    // LAYER OPERATIONS
    // ========================================================================

    /// Add a transparent layer above the active one ("Layer N").
    pub fn add_layer(&mut self) -> usize {
        let name = format!("Layer {}", self.canvas.layers.len() + 1);
        let index = self.canvas.add_layer(name);
        self.save_state();
        self.notify_layers_changed();
        index
    }

    pub fn delete_active_layer(&mut self) -> Result<(), EngineError> {
        self.canvas.delete_active_layer()?;
        self.save_state();
        self.notify_layers_changed();
        Ok(())
    }

    pub fn duplicate_active_layer(&mut self) -> Result<usize, EngineError> {
        let index = self.canvas.duplicate_active_layer()?;
        self.save_state();
        self.notify_layers_changed();
        Ok(index)
    }

    pub fn merge_down(&mut self) -> Result<(), EngineError> {
        self.canvas.merge_down()?;
        self.save_state();
        self.notify_layers_changed();
        Ok(())
    }

    pub fn switch_layer(&mut self, index: usize) -> Result<(), EngineError> {
        self.canvas.switch_layer(index)?;
        self.notify_layers_changed();
        Ok(())
    }

    /// Clear the active layer: the background layer is refilled with the
    /// configured background color, any other layer becomes transparent.
    pub fn clear_active_layer(&mut self) {
        let fill = if self.canvas.active_layer_index == 0 {
            Rgba(self.config.background)
        } else {
            Rgba([0, 0, 0, 0])
        };
        if let Some(layer) = self.canvas.active_layer_mut() {
            for px in layer.pixels.pixels_mut() {
                *px = fill;
            }
            layer.mark_pixels_changed();
            self.canvas.mark_all_dirty();
            self.save_state();
        }
    }

    // ---- interactive layer transform ----------------------------------

    /// Update the active layer's interactive move/rotate/scale preview.
    pub fn set_layer_transform(&mut self, transform: LayerTransform) {
        if let Some(layer) = self.canvas.active_layer_mut() {
            layer.transform = Some(transform);
            self.canvas.mark_all_dirty();
        }
    }

    /// Bake the interactive transform into the pixels and snapshot.
    pub fn commit_layer_transform(&mut self) {
        if let Some(layer) = self.canvas.active_layer_mut() {
            if layer.transform.is_none() {
                return;
            }
            layer.commit_transform();
            self.canvas.mark_all_dirty();
            self.save_state();
        }
    }

    /// Abandon the interactive transform without touching pixels.
    pub fn cancel_layer_transform(&mut self) {
        if let Some(layer) = self.canvas.active_layer_mut()
            && layer.transform.take().is_some()
        {
            self.canvas.mark_all_dirty();
        }
    }

    // ========================================================================
    // OUTPUT
    // ========================================================================

    /// The pending dirty region (consumed).  The host calls this at most
    /// once per animation tick.
    pub fn take_dirty(&mut self) -> DirtyRect {
        self.canvas.take_dirty()
    }

    /// Recomposite just the pending dirty region and consume it.  Returns
    /// the region image and its origin, or `None` when nothing changed
    /// since the last tick.
    pub fn composite_dirty(&mut self) -> Option<(RgbaImage, (u32, u32))> {
        let dirty = self.canvas.take_dirty();
        self.canvas.composite_partial(dirty)
    }

    /// Full flattened composite, independent of the dirty rect.  This is
    /// the export collaborator's entry point.
    pub fn flatten(&self) -> RgbaImage {
        self.canvas.composite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BlendMode;

    fn engine(width: u32, height: u32) -> Engine {
        Engine::new(EngineConfig {
            width,
            height,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn tap_paints_a_dot_and_release_snapshots() {
        let mut engine = engine(200, 200);
        engine.set_current_color(Rgba([255, 0, 0, 255]));
        engine.set_current_size(10.0);

        // Default view is identity around the canvas center: feed forward-
        // mapped device coordinates for canvas point (100, 100).
        let device = engine.view.forward((100.0, 100.0), 200, 200);
        engine.pointer_down(device.0, device.1, 1.0);
        engine.pointer_up();

        let px = engine.canvas.layers[0].pixels.get_pixel(100, 100);
        assert_eq!(px[0], 255);
        assert!(engine.history.can_undo());
        assert!(engine.undo());
        let px = engine.canvas.layers[0].pixels.get_pixel(100, 100);
        assert_eq!(*px, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn strokes_draw_through_the_view_transform() {
        let mut engine = engine(100, 100);
        engine.view.zoom_by(2.0);
        engine.view.rotate_by(90.0);
        engine.view.pan_by(13.0, -8.0);
        engine.set_current_color(Rgba([0, 0, 255, 255]));
        engine.set_current_size(6.0);

        let target = (30.0, 70.0);
        let device = engine.view.forward(target, 100, 100);
        engine.pointer_down(device.0, device.1, 1.0);
        engine.pointer_up();

        assert_eq!(engine.canvas.layers[0].pixels.get_pixel(30, 70)[2], 255);
    }

    #[test]
    fn move_samples_accumulate_into_one_dirty_rect() {
        let mut engine = engine(120, 60);
        engine.take_dirty(); // drop the initial full-canvas dirt
        engine.pointer_down(-50.0, 0.0, 1.0);
        engine.pointer_move(-20.0, 5.0, 1.0);
        engine.pointer_move(10.0, -5.0, 1.0);
        engine.pointer_move(40.0, 0.0, 1.0);

        let dirty = engine.take_dirty();
        assert!(!dirty.is_empty());
        // Everything coalesced: nothing pending afterwards.
        assert!(engine.take_dirty().is_empty());
        assert!(engine.composite_dirty().is_none());
    }

    #[test]
    fn stroke_without_release_is_one_history_entry_after_release() {
        let mut engine = engine(80, 80);
        let len_before = engine.history.len();
        engine.pointer_down(0.0, 0.0, 1.0);
        for i in 0..20 {
            engine.pointer_move(i as f32, i as f32, 1.0);
        }
        assert_eq!(engine.history.len(), len_before);
        engine.pointer_up();
        assert_eq!(engine.history.len(), len_before + 1);
    }

    #[test]
    fn bucket_fill_is_undoable() {
        let mut engine = engine(50, 50);
        engine.set_current_tool(Tool::Bucket);
        engine.set_current_color(Rgba([0, 0, 0, 255]));
        engine.pointer_down(0.0, 0.0, 1.0); // canvas center, white region
        assert!(engine
            .canvas
            .layers[0]
            .pixels
            .pixels()
            .all(|p| *p == Rgba([0, 0, 0, 255])));
        assert!(engine.undo());
        assert!(engine
            .canvas
            .layers[0]
            .pixels
            .pixels()
            .all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn eraser_removes_paint_without_recoloring() {
        let mut engine = engine(60, 60);
        engine.add_layer();
        engine.set_current_color(Rgba([255, 0, 0, 255]));
        engine.set_current_size(12.0);
        let device = engine.view.forward((30.0, 30.0), 60, 60);
        engine.pointer_down(device.0, device.1, 1.0);
        engine.pointer_up();
        assert_eq!(engine.canvas.layers[1].pixels.get_pixel(30, 30)[3], 255);

        engine.set_current_tool(Tool::Eraser);
        engine.pointer_down(device.0, device.1, 1.0);
        engine.pointer_up();
        assert_eq!(engine.canvas.layers[1].pixels.get_pixel(30, 30)[3], 0);
        // The composite shows the white background again.
        assert_eq!(*engine.flatten().get_pixel(30, 30), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn layer_lifecycle_round_trips_through_undo() {
        let mut engine = engine(32, 32);
        engine.add_layer();
        assert_eq!(engine.canvas.layers.len(), 2);
        engine.canvas.layers[1].blend_mode = BlendMode::Screen;
        engine.merge_down().unwrap();
        assert_eq!(engine.canvas.layers.len(), 1);
        assert!(engine.undo()); // un-merge
        assert_eq!(engine.canvas.layers.len(), 2);
        assert_eq!(engine.canvas.layers[1].blend_mode, BlendMode::Screen);
        assert!(engine.undo()); // un-add
        assert_eq!(engine.canvas.layers.len(), 1);
    }

    #[test]
    fn structural_errors_surface_instead_of_panicking() {
        let mut engine = engine(16, 16);
        assert!(matches!(
            engine.delete_active_layer(),
            Err(EngineError::BackgroundLayer)
        ));
        assert!(matches!(
            engine.merge_down(),
            Err(EngineError::BackgroundLayer)
        ));
        assert!(engine.switch_layer(7).is_err());
    }

    #[test]
    fn layers_changed_callback_fires_on_structure_changes() {
        use std::cell::Cell;
        use std::rc::Rc;
        let count = Rc::new(Cell::new(0usize));
        let seen = count.clone();
        let mut engine = engine(16, 16);
        engine.on_layers_changed(Box::new(move |_| seen.set(seen.get() + 1)));
        engine.add_layer();
        engine.delete_active_layer().unwrap();
        engine.undo();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn garbage_pointer_events_are_ignored() {
        let mut engine = engine(40, 40);
        engine.take_dirty();
        engine.pointer_down(f32::NAN, 0.0, 1.0);
        engine.pointer_move(f32::INFINITY, 3.0, 1.0);
        engine.pointer_up();
        assert!(engine.take_dirty().is_empty());
        assert!(!engine.history.can_undo());
    }

    #[test]
    fn transform_commit_is_a_discrete_action() {
        let mut engine = engine(32, 32);
        engine.add_layer();
        engine.canvas.layers[1]
            .pixels
            .put_pixel(10, 10, Rgba([9, 9, 9, 255]));
        let len = engine.history.len();
        engine.set_layer_transform(LayerTransform {
            translate_x: 5.0,
            ..LayerTransform::default()
        });
        assert_eq!(engine.history.len(), len); // preview is not an action
        engine.commit_layer_transform();
        assert_eq!(engine.history.len(), len + 1);
        assert_eq!(engine.canvas.layers[1].pixels.get_pixel(15, 10)[0], 9);
    }
}
