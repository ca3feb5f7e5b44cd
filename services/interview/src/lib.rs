pub mod config;
pub mod console;
pub mod elevenlabs;
pub mod playback;
pub mod prompt_loader;
pub mod report;
pub mod simulated;
