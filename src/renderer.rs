pub mod cpu_renderer;

pub use cpu_renderer::{Canvas, CpuRenderer, GlyphCache};
