//! Impasto — a layered raster painting engine.
//!
//! The engine owns a stack of RGBA pixel-buffer layers, rasterizes brush
//! strokes and flood fills into them, composites the visible layers into a
//! single displayable image under a pan/zoom/rotate/flip view transform, and
//! keeps a snapshot-based undo/redo history of the whole canvas.
//!
//! The UI shell (toolbars, color pickers, the layer panel, shortcut
//! dispatch, file import/export) is the host application's job: it feeds
//! [`Engine`] raw pointer events in view coordinates and presents whatever
//! [`Engine::composite_dirty`] / [`Engine::flatten`] hand back.

#![allow(clippy::too_many_arguments)]

pub mod brush;
pub mod canvas;
pub mod config;
pub mod engine;
pub mod error;
pub mod fill;
pub mod gpu;
pub mod history;
pub mod logger;
pub mod transform;

pub use canvas::{BlendMode, CanvasState, DirtyRect, Layer, LayerTransform};
pub use config::{EngineConfig, PressureCurve};
pub use engine::{Engine, StrokePoint, Tool};
pub use error::EngineError;
pub use history::HistoryManager;
pub use transform::{Mat2D, ViewTransform};
