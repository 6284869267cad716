use anyhow::{anyhow, Context as _, Result};
use ffmpeg_next::{codec, Rational};

use crate::codec::{CodecKind, CodecPoll, Decode};
use crate::frame::RawFrame;
use crate::input::SourceStream;
use crate::packet::RawPacket;
use crate::queue::{Cmd, Queue};

/// Geometry and timing a decoder hands to the re-encoder.
#[derive(Clone, Copy, Debug)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    pub format: ffmpeg_next::format::Pixel,
    pub time_base: Rational,
    pub frame_rate: Rational,
}

/// FFmpeg-backed video decoder, used both for the demuxed source stream and
/// for the re-encoded foveated stream.
pub struct Decoder {
    inner: codec::decoder::Video,
    time_base: Rational,
    frame_rate: Rational,
}

impl Decoder {
    /// Decoder for the demuxed source stream, configured from its parameters.
    pub fn from_stream(stream: &SourceStream) -> Result<Self> {
        let mut ctx = codec::Context::new();
        unsafe {
            (*ctx.as_mut_ptr()).time_base = stream.time_base().into();
        }
        ctx.set_parameters(stream.parameters().clone())
            .context("avcodec_parameters_to_context failed")?;

        let inner = ctx.decoder().video().context("open source decoder")?;
        if inner.format() == ffmpeg_next::format::Pixel::None
            || inner.width() == 0
            || inner.height() == 0
        {
            return Err(anyhow!("missing codec parameters"));
        }

        Ok(Self {
            inner,
            time_base: stream.time_base(),
            frame_rate: stream.rate(),
        })
    }

    /// Decoder for the re-encoded stream. No stream parameters exist here,
    /// only the codec id; geometry comes with the bitstream.
    pub fn for_playback(kind: CodecKind) -> Result<Self> {
        let codec = ffmpeg_next::decoder::find(kind.codec_id())
            .ok_or_else(|| anyhow!("decoder not found for {:?}", kind))?;
        let inner = codec::Context::new_with_codec(codec)
            .decoder()
            .video()
            .context("open playback decoder")?;
        Ok(Self {
            inner,
            time_base: Rational(0, 1),
            frame_rate: Rational(0, 1),
        })
    }

    pub fn params(&self) -> VideoParams {
        VideoParams {
            width: self.inner.width(),
            height: self.inner.height(),
            format: self.inner.format(),
            time_base: self.time_base,
            frame_rate: self.frame_rate,
        }
    }
}

impl Decode for Decoder {
    type Packet = RawPacket;
    type Frame = RawFrame;

    fn submit_packet(&mut self, packet: Option<RawPacket>) -> Result<()> {
        match packet {
            Some(packet) => self
                .inner
                .send_packet(packet.get())
                .context("avcodec_send_packet failed"),
            None => self.inner.send_eof().context("decoder send_eof failed"),
        }
    }

    fn receive_frame(&mut self) -> Result<CodecPoll<RawFrame>> {
        let mut frame = ffmpeg_next::frame::Video::empty();
        match self.inner.receive_frame(&mut frame) {
            Ok(()) => Ok(CodecPoll::Ready(RawFrame::from(frame))),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(CodecPoll::NeedInput)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(CodecPoll::Eos),
            Err(e) => Err(e).context("avcodec_receive_frame failed"),
        }
    }
}

/// Decoder stage: receive-first loop per the codec contract. Receiving before
/// feeding matters because one packet can yield several frames, and the feed
/// step is where the stage parks on an empty upstream queue.
pub fn decoder_loop<D: Decode>(
    mut codec: D,
    packets: &Queue<Cmd<D::Packet>>,
    frames: &Queue<Cmd<D::Frame>>,
) -> Result<u64> {
    let mut count = 0;
    let mut draining = false;
    loop {
        match codec.receive_frame()? {
            CodecPoll::Ready(frame) => {
                frames.push(Cmd::Data(frame));
                count += 1;
            }
            CodecPoll::NeedInput => {
                if draining {
                    return Err(anyhow!("decoder demanded input while draining"));
                }
                match packets.pop() {
                    Cmd::Data(packet) => codec.submit_packet(Some(packet))?,
                    Cmd::Eof => {
                        codec.submit_packet(None)?;
                        draining = true;
                    }
                }
            }
            CodecPoll::Eos => break,
        }
    }
    frames.push(Cmd::Eof);
    Ok(count)
}
