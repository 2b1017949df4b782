pub mod frame;
pub mod probe;
pub mod source;

pub use frame::{FrameRead, FrameReader};
pub use probe::MediaDescriptor;
