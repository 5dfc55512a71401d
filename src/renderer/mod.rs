//! wgpu rendering module
//!
//! Two passes per frame: scene depth from the light into a shadow map, then
//! the lit scene into the window surface sampling that map.

pub mod camera;
pub mod drawable;
pub mod light;
pub mod model;
pub mod pipeline;
pub mod shader;
pub mod shadow;
pub mod shapes;
pub mod vertex;

pub use camera::Camera;
pub use drawable::{Drawable, PlayerAppearance};
pub use pipeline::{RenderError, RenderState};
pub use shader::ShaderError;
