use anyhow::{anyhow, Context as _, Result};
use ffmpeg_next::{codec, ffi, media, Rational};
use tokio_util::sync::CancellationToken;

use crate::packet::RawPacket;
use crate::queue::{Cmd, Queue};

/// Parameters of the selected video stream, detached from the demuxer so the
/// source decoder can be built before the reader worker takes the input.
pub struct SourceStream {
    index: usize,
    parameters: codec::Parameters,
    time_base: Rational,
    rate: Rational,
}

unsafe impl Send for SourceStream {}
unsafe impl Sync for SourceStream {}

impl SourceStream {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parameters(&self) -> &codec::Parameters {
        &self.parameters
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn rate(&self) -> Rational {
        self.rate
    }
}

/// Supplies demuxed video packets to the pipeline. `None` marks end of
/// stream; read failures are fatal and surface as `Err`.
pub trait PacketSource: Send + 'static {
    type Packet: Send + 'static;

    fn read_packet(&mut self) -> Result<Option<Self::Packet>>;
}

/// Container demuxer for one input file: probes, picks the best video stream
/// and discards everything else at the demuxer level.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    video: SourceStream,
}

impl AvInput {
    pub fn open(path: &str) -> Result<Self> {
        let mut inner =
            ffmpeg_next::format::input(&path).with_context(|| format!("open input {path}"))?;

        let video = {
            let stream = inner
                .streams()
                .best(media::Type::Video)
                .ok_or_else(|| anyhow!("no video stream in {path}"))?;
            SourceStream {
                index: stream.index(),
                parameters: stream.parameters(),
                time_base: stream.time_base(),
                rate: stream.avg_frame_rate(),
            }
        };

        // audio, subtitles etc. never reach the packet queue
        unsafe {
            let fmt = inner.as_mut_ptr();
            for i in 0..(*fmt).nb_streams as usize {
                if i != video.index {
                    (*(*(*fmt).streams.add(i))).discard = ffi::AVDiscard::AVDISCARD_ALL;
                }
            }
        }

        Ok(Self { inner, video })
    }

    pub fn video_stream(&self) -> &SourceStream {
        &self.video
    }
}

impl PacketSource for AvInput {
    type Packet = RawPacket;

    fn read_packet(&mut self) -> Result<Option<RawPacket>> {
        loop {
            let mut packet = codec::packet::Packet::empty();
            match packet.read(&mut self.inner) {
                Ok(()) => {
                    // skip bufferless units and strays from discarded streams
                    if packet.data().is_none() || packet.stream() != self.video.index {
                        continue;
                    }
                    return Ok(Some(RawPacket::from(packet)));
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(e) => return Err(e).context("av_read_frame failed"),
            }
        }
    }
}

/// Reader stage: pump packets from the source into the packet queue in file
/// order, then terminate it with the sentinel. Cancellation ends the stream
/// early but still in-band, so downstream stages drain normally.
pub fn reader_loop<S: PacketSource>(
    mut source: S,
    packets: &Queue<Cmd<S::Packet>>,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut count = 0;
    while !cancel.is_cancelled() {
        match source.read_packet()? {
            Some(packet) => {
                packets.push(Cmd::Data(packet));
                count += 1;
            }
            None => break,
        }
    }
    packets.push(Cmd::Eof);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSource {
        next: u64,
        total: u64,
    }

    impl PacketSource for CountingSource {
        type Packet = u64;

        fn read_packet(&mut self) -> Result<Option<u64>> {
            if self.next == self.total {
                return Ok(None);
            }
            let seq = self.next;
            self.next += 1;
            Ok(Some(seq))
        }
    }

    #[test]
    fn reader_emits_packets_then_sentinel() {
        let packets = Queue::new(16);
        let source = CountingSource { next: 0, total: 5 };
        let count = reader_loop(source, &packets, &CancellationToken::new()).unwrap();
        assert_eq!(count, 5);

        for expected in 0..5 {
            match packets.pop() {
                Cmd::Data(seq) => assert_eq!(seq, expected),
                Cmd::Eof => panic!("sentinel arrived early"),
            }
        }
        assert!(packets.pop().is_eof());
        assert!(packets.is_empty());
    }

    #[test]
    fn cancelled_reader_still_terminates_the_queue() {
        let packets: Queue<Cmd<u64>> = Queue::new(4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let source = CountingSource { next: 0, total: 100 };
        let count = reader_loop(source, &packets, &cancel).unwrap();
        assert_eq!(count, 0);
        assert!(packets.pop().is_eof());
    }

    struct FailingSource;

    impl PacketSource for FailingSource {
        type Packet = u64;

        fn read_packet(&mut self) -> Result<Option<u64>> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[test]
    fn read_failure_is_fatal() {
        let packets: Queue<Cmd<u64>> = Queue::new(4);
        let err = reader_loop(FailingSource, &packets, &CancellationToken::new());
        assert!(err.is_err());
    }
}
