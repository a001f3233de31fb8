pub mod btle;
pub mod constants;
pub mod coordinator;
pub mod decode;
pub mod link;
pub mod types;
