//! # Aspis
//!
//! **An immediate-mode 2D rendering backend for GUI toolkits.**
//!
//! Aspis translates a toolkit's draw calls — filled rectangles, textured
//! rectangles, scissor clips — into a minimal stream of GPU draw
//! submissions. Vertices accumulate into a shared client-side batch and
//! are flushed only when the draw state changes, the batch fills, or the
//! frame ends, so hundreds of widget draws amortize into a handful of GPU
//! submissions while draw order is preserved exactly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use aspis::{Color, Rect, Renderer};
//!
//! # fn demo(window: Arc<winit::window::Window>) {
//! let mut renderer = Renderer::new();
//! renderer.initialize_context(&window);
//! renderer.init(800, 600);
//!
//! // Per frame:
//! renderer.begin_context();
//! renderer.begin();
//! renderer.set_draw_color(Color::rgb(200, 60, 60));
//! renderer.draw_filled_rect(Rect::new(10, 10, 120, 40));
//! renderer.end();
//! renderer.end_context();
//! renderer.present_context();
//! # }
//! ```
//!
//! ## Design
//!
//! - **One shader, one pipeline** — solid and textured quads share a
//!   single shader that mixes vertex color with a sampled texture by a
//!   per-bind-group blend factor.
//! - **Degrade, don't crash** — failed shaders render nothing, missing
//!   textures render a placeholder checker, lost contexts report `false`
//!   from lifecycle calls. A UI layer never takes the process down.
//! - **Single-threaded by contract** — one renderer owns its GPU context
//!   for its whole lifetime; every call runs to completion.

mod batch;
mod capability;
mod clip;
mod context;
mod pipeline;
mod renderer;
mod state;
mod texture;
mod types;
mod vertex;

pub use batch::{Batcher, DrawSink, MAX_VERTICES};
pub use capability::{GpuCapabilities, GpuCapability, Support};
pub use clip::{Scissor, device_scissor, framebuffer_scissor};
pub use context::{ContextError, GpuContext};
pub use pipeline::Pipeline;
pub use renderer::{Renderer, RendererConfig, WindowProvider};
pub use state::{DrawState, TextureId};
pub use texture::{TextureDesc, TextureError, Textures, decode_bytes, decode_file};
pub use types::{Color, Rect};
pub use vertex::{VERTEX_Z, Vertex};

// Re-export glam math types for convenience
pub use glam::Vec2;
