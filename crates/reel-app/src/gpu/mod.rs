pub mod blit;
pub mod context;

pub use blit::FrameBlit;
pub use context::GpuContext;
