use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use log::{error, trace};
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::codec::CodecKind;
use crate::decoder::{decoder_loop, Decoder};
use crate::encoder::{encoder_loop, Encoder, EncoderStats};
use crate::frame::RawFrame;
use crate::gaze::GazeSource;
use crate::input::{reader_loop, AvInput};
use crate::packet::RawPacket;
use crate::queue::{Cmd, Queue};
use crate::sink::{sink_loop, LagReport};

/// Default capacity of the demuxed packet and raw frame queues.
pub const INPUT_QUEUE_CAPACITY: usize = 32;

/// Everything downstream of the encoder runs at capacity 1: an encoder that
/// outruns the playback decoder parks immediately, which is the pacing
/// mechanism of the whole pipeline. Do not widen these queues.
const OUTPUT_QUEUE_CAPACITY: usize = 1;

#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    pub codec: CodecKind,
    pub packet_capacity: usize,
    pub frame_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            codec: CodecKind::H264,
            packet_capacity: INPUT_QUEUE_CAPACITY,
            frame_capacity: INPUT_QUEUE_CAPACITY,
        }
    }
}

/// Per-stage counts and the lag summary of one finished run.
#[derive(Clone, Copy, Debug)]
pub struct PipelineReport {
    pub packets_read: u64,
    pub frames_decoded: u64,
    pub encoder: EncoderStats,
    pub frames_shown: u64,
    pub lag: LagReport,
}

/// Run the four-stage pipeline over one input file until its stream drains.
///
/// Configuration errors (unopenable input, missing video stream, codec
/// setup) are returned before any worker is spawned. Fatal errors inside a
/// running stage terminate the process after reporting; there is no partial
/// recovery, a failed run is simply rerun.
pub async fn run_file(
    path: &str,
    config: PipelineConfig,
    gaze: impl GazeSource,
    cancel: CancellationToken,
) -> Result<PipelineReport> {
    let input = AvInput::open(path)?;
    let src_decoder = Decoder::from_stream(input.video_stream())?;
    let encoder = Encoder::new(config.codec, &src_decoder.params())
        .with_context(|| format!("configure {} encoder", config.codec.encoder_name()))?;
    let fov_decoder = Decoder::for_playback(config.codec)?;

    let packet_q = Arc::new(Queue::new(config.packet_capacity));
    let frame_q = Arc::new(Queue::new(config.frame_capacity));
    let encoded_q: Arc<Queue<Cmd<RawPacket>>> = Arc::new(Queue::new(OUTPUT_QUEUE_CAPACITY));
    let lag_q: Arc<Queue<Cmd<Instant>>> = Arc::new(Queue::new(OUTPUT_QUEUE_CAPACITY));
    let display_q: Arc<Queue<Cmd<RawFrame>>> = Arc::new(Queue::new(OUTPUT_QUEUE_CAPACITY));

    let reader = stage("reader", {
        let packet_q = packet_q.clone();
        move || reader_loop(input, &packet_q, &cancel)
    });
    let source = stage("source decoder", {
        let packet_q = packet_q.clone();
        let frame_q = frame_q.clone();
        move || decoder_loop(src_decoder, &packet_q, &frame_q)
    });
    let encode = stage("encoder", {
        let frame_q = frame_q.clone();
        let encoded_q = encoded_q.clone();
        let lag_q = lag_q.clone();
        move || encoder_loop(encoder, gaze, &frame_q, &encoded_q, &lag_q)
    });
    let playback = stage("foveation decoder", {
        let encoded_q = encoded_q.clone();
        let display_q = display_q.clone();
        move || decoder_loop(fov_decoder, &encoded_q, &display_q)
    });
    let sink = stage("sink", {
        let display_q = display_q.clone();
        let lag_q = lag_q.clone();
        // headless presenter; a windowing integration renders here instead
        move || {
            sink_loop(&display_q, &lag_q, |frame| {
                trace!(
                    "display frame pts {:?} ({}x{})",
                    frame.pts(),
                    frame.width(),
                    frame.height()
                );
            })
        }
    });

    let (packets_read, frames_decoded, encoder, frames_shown, lag) =
        tokio::try_join!(reader, source, encode, playback, sink)?;

    Ok(PipelineReport {
        packets_read,
        frames_decoded,
        encoder,
        frames_shown,
        lag,
    })
}

/// Spawn one stage worker on its own OS thread. A fatal error inside a stage
/// would leave its neighbors parked on the connecting queues forever, so it
/// exits the process after reporting.
fn stage<T, F>(name: &'static str, body: F) -> JoinHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    task::spawn_blocking(move || match body() {
        Ok(value) => value,
        Err(e) => {
            error!("{name}: {e:#}");
            std::process::exit(1);
        }
    })
}
