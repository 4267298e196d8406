//! OnAir Core - real-time routing, effects and capture for a broadcast console

pub mod audio;
pub mod capture;
pub mod config;
pub mod console;
pub mod effect;
pub mod engine;
pub mod loader;
pub mod types;

pub use console::Console;
pub use types::*;
