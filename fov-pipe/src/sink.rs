use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use log::debug;

use crate::queue::{Cmd, Queue};

/// Encoder-to-display latency summary for one finished run.
#[derive(Clone, Copy, Debug, Default)]
pub struct LagReport {
    pub frames: u64,
    pub total: Duration,
    pub worst: Duration,
}

impl LagReport {
    pub fn mean(&self) -> Duration {
        if self.frames == 0 {
            Duration::ZERO
        } else {
            self.total / self.frames as u32
        }
    }
}

/// Display sink: consumes the playback decoder's frames in order, handing
/// each to `present` (the rendering integration), pairing the i-th frame
/// with the i-th lag timestamp (the instant that frame entered the encoder),
/// and aggregating the end-to-end pipeline lag.
pub fn sink_loop<F>(
    frames: &Queue<Cmd<F>>,
    lag: &Queue<Cmd<Instant>>,
    mut present: impl FnMut(&F),
) -> Result<LagReport> {
    let mut report = LagReport::default();
    loop {
        match frames.pop() {
            Cmd::Data(frame) => {
                let encoded_at = match lag.pop() {
                    Cmd::Data(t) => t,
                    Cmd::Eof => return Err(anyhow!("lag queue ended before the frame queue")),
                };
                present(&frame);
                let delta = encoded_at.elapsed();
                debug!("frame {} lag {:?}", report.frames, delta);
                report.frames += 1;
                report.total += delta;
                report.worst = report.worst.max(delta);
            }
            Cmd::Eof => break,
        }
    }
    match lag.pop() {
        Cmd::Eof => Ok(report),
        Cmd::Data(_) => Err(anyhow!("lag entry without a matching frame")),
    }
}
