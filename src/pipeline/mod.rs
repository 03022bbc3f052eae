pub mod encoder;
pub mod ffmpeg;
pub mod ladder;
pub mod manifest;
pub mod progress;
pub mod thumbnails;
