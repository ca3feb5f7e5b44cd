pub mod audio;
#[cfg(feature = "playback")]
pub mod device;
#[cfg(feature = "playback")]
pub mod player;
