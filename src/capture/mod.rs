pub mod session;
pub mod synth;
pub mod task;
pub mod types;
