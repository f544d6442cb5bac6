pub mod config;
pub mod gpu;
pub mod serve;
pub mod status;
