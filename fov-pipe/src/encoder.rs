use std::time::Instant;

use anyhow::{anyhow, Context as _, Result};
use ffmpeg_next::{codec, picture};
use log::trace;

use crate::codec::{CodecKind, CodecPoll, Encode, Foveate as _};
use crate::decoder::VideoParams;
use crate::frame::RawFrame;
use crate::gaze::GazeSource;
use crate::packet::RawPacket;
use crate::queue::{Cmd, Queue};

/// Keyframe interval of the re-encode, short so quality reacts to gaze
/// movement within a few frames.
const GOP_SIZE: u32 = 3;

/// FFmpeg-backed foveated re-encoder. Width, height and time base are
/// inherited from the source decoder; the pixel format is the first one the
/// selected codec advertises.
pub struct Encoder {
    inner: codec::encoder::Video,
    frame_index: i64,
}

impl Encoder {
    pub fn new(kind: CodecKind, src: &VideoParams) -> Result<Self> {
        let codec = ffmpeg_next::encoder::find_by_name(kind.encoder_name())
            .ok_or_else(|| anyhow!("encoder {} not found", kind.encoder_name()))?;

        let mut builder = codec::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("allocate encoder context")?;

        let pix_fmt = codec
            .video()
            .ok()
            .and_then(|v| v.formats().and_then(|mut f| f.next()))
            .unwrap_or(src.format);

        builder.set_width(src.width);
        builder.set_height(src.height);
        builder.set_format(pix_fmt);
        builder.set_time_base(src.time_base);
        if src.frame_rate.0 > 0 {
            builder.set_frame_rate(Some(src.frame_rate));
        }
        builder.set_gop(GOP_SIZE);

        let inner = builder
            .open_with(kind.options())
            .context("avcodec_open2 failed")?;

        Ok(Self {
            inner,
            frame_index: 0,
        })
    }
}

impl Encode for Encoder {
    type Frame = RawFrame;
    type Packet = RawPacket;

    fn submit_frame(&mut self, frame: Option<RawFrame>) -> Result<()> {
        match frame {
            Some(mut frame) => {
                let inner = frame.get_mut();
                // leave the picture type to the rate control
                inner.set_kind(picture::Type::None);
                if inner.pts().is_none() {
                    inner.set_pts(Some(self.frame_index));
                }
                self.frame_index += 1;
                self.inner
                    .send_frame(frame.get())
                    .context("avcodec_send_frame failed")
            }
            None => self.inner.send_eof().context("encoder send_eof failed"),
        }
    }

    fn receive_packet(&mut self) -> Result<CodecPoll<RawPacket>> {
        let mut packet = codec::packet::Packet::empty();
        match self.inner.receive_packet(&mut packet) {
            Ok(()) => {
                let packet = RawPacket::from(packet);
                trace!(
                    "encoded {} bytes, pts {:?}, key {}",
                    packet.size(),
                    packet.pts(),
                    packet.is_key()
                );
                Ok(CodecPoll::Ready(packet))
            }
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(CodecPoll::NeedInput)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(CodecPoll::Eos),
            Err(e) => Err(e).context("avcodec_receive_packet failed"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EncoderStats {
    pub frames_in: u64,
    pub packets_out: u64,
}

/// Encoder stage: attach the current gaze descriptor to every frame, stamp
/// the submission time onto the lag queue, and hand re-encoded packets
/// downstream. The frame sentinel switches the codec into drain mode so
/// buffered frames still come out before the packet sentinel is emitted.
pub fn encoder_loop<E: Encode>(
    mut codec: E,
    mut gaze: impl GazeSource,
    frames: &Queue<Cmd<E::Frame>>,
    packets: &Queue<Cmd<E::Packet>>,
    lag: &Queue<Cmd<Instant>>,
) -> Result<EncoderStats> {
    let mut stats = EncoderStats::default();
    let mut draining = false;
    loop {
        match codec.receive_packet()? {
            CodecPoll::Ready(packet) => {
                packets.push(Cmd::Data(packet));
                stats.packets_out += 1;
            }
            CodecPoll::NeedInput => {
                if draining {
                    return Err(anyhow!("encoder demanded input while draining"));
                }
                match frames.pop() {
                    Cmd::Data(mut frame) => {
                        frame.attach_descriptor(gaze.descriptor())?;
                        codec.submit_frame(Some(frame))?;
                        lag.push(Cmd::Data(Instant::now()));
                        stats.frames_in += 1;
                    }
                    Cmd::Eof => {
                        codec.submit_frame(None)?;
                        draining = true;
                    }
                }
            }
            CodecPoll::Eos => break,
        }
    }
    packets.push(Cmd::Eof);
    lag.push(Cmd::Eof);
    Ok(stats)
}
