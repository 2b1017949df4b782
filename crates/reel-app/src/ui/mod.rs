pub mod hud;
pub mod overlay;

pub use overlay::EguiOverlay;
