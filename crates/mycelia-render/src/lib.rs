pub mod agents;
pub mod frame;
pub mod shade;

pub use agents::RenderAgent;
pub use frame::{render_debug_gradient, render_frame, RenderParams};
pub use shade::Rgba8;
