use anyhow::Result;

use crate::gaze::FoveationDescriptor;

/// Codec selections supported by the re-encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecKind {
    H264,
    H265,
}

impl CodecKind {
    pub fn encoder_name(self) -> &'static str {
        match self {
            CodecKind::H264 => "libx264",
            CodecKind::H265 => "libx265",
        }
    }

    pub fn codec_id(self) -> ffmpeg_next::codec::Id {
        match self {
            CodecKind::H264 => ffmpeg_next::codec::Id::H264,
            CodecKind::H265 => ffmpeg_next::codec::Id::HEVC,
        }
    }

    /// Low-latency option profile for the foveated re-encode.
    pub fn options(self) -> ffmpeg_next::Dictionary<'static> {
        let mut opts = ffmpeg_next::Dictionary::new();
        opts.set("preset", "ultrafast");
        opts.set("tune", "zerolatency");
        // forward unregistered SEI so attached side data survives into the
        // bitstream
        opts.set("udu_sei", "1");
        match self {
            CodecKind::H264 => opts.set("aq-mode", "autovariance"),
            CodecKind::H265 => opts.set("x265-params", "aq-mode=2"),
        }
        opts
    }
}

/// Result of a non-blocking receive call on a codec.
pub enum CodecPoll<T> {
    /// An output unit is ready.
    Ready(T),
    /// The codec wants another input before it can produce output.
    NeedInput,
    /// Drain is complete, no further output will appear.
    Eos,
}

/// Decoding half of the codec facade: interleaved submit/receive calls with
/// explicit drain semantics. Fatal codec statuses surface as `Err`.
pub trait Decode: Send + 'static {
    type Packet: Send + 'static;
    type Frame: Send + 'static;

    /// Feed one compressed packet. `None` switches the codec into drain mode.
    fn submit_packet(&mut self, packet: Option<Self::Packet>) -> Result<()>;

    /// Fetch the next decoded frame if one is buffered.
    fn receive_frame(&mut self) -> Result<CodecPoll<Self::Frame>>;
}

/// Encoding half of the codec facade.
pub trait Encode: Send + 'static {
    type Frame: Foveate + Send + 'static;
    type Packet: Send + 'static;

    /// Feed one raw frame. `None` switches the codec into drain mode.
    fn submit_frame(&mut self, frame: Option<Self::Frame>) -> Result<()>;

    /// Fetch the next encoded packet if one is buffered.
    fn receive_packet(&mut self) -> Result<CodecPoll<Self::Packet>>;
}

/// Frames that can carry a foveation descriptor into the encoder as side
/// data. The descriptor is attached immediately before submission, so every
/// frame an encoder sees has one.
pub trait Foveate {
    fn attach_descriptor(&mut self, descriptor: FoveationDescriptor) -> Result<()>;
}
