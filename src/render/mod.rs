mod errors;
mod gpu;
mod renderer;
mod shaders;
mod shadow;

pub use renderer::Renderer;
