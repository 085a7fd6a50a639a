//! Real-time height-field sculpting.
//!
//! A square grid of heights is mutated by several independent sculptors:
//! random-walking radial brushes, a self-steering path carver, a mountain
//! grow-and-flatten cycle under an area budget, and a mask-stroke mountain
//! builder. `scheduler::SculptEngine` paces them over one shared field.

pub mod brush;
pub mod config;
pub mod error;
pub mod export;
pub mod heightfield;
pub mod masks;
pub mod mountains;
pub mod roads;
pub mod scheduler;
pub mod strokes;
pub mod tilemap;
pub mod walker;
