pub mod output;

pub use output::AudioOutput;
