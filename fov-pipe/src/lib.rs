/// Registers FFmpeg components (formats, codecs). Call once at startup
/// before opening inputs.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod gaze;
pub mod input;
pub mod packet;
pub mod pipeline;
pub mod queue;
pub mod sink;
