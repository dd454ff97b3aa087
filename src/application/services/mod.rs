pub mod email;
pub mod messenger;
pub mod renderer;
