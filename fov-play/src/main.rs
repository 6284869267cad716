use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use fov_pipe::gaze::FoveationDescriptor;
#[cfg(not(feature = "et"))]
use fov_pipe::gaze::{FixedGaze, GazeSource};
use fov_pipe::pipeline::{run_file, PipelineConfig};

mod playlist;
#[cfg(feature = "et")]
mod tracker;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let Some(playlist_path) = std::env::args().nth(1) else {
        eprintln!("usage: fov-play <playlist>");
        std::process::exit(2);
    };

    if let Err(e) = run(&playlist_path).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(playlist_path: &str) -> Result<()> {
    fov_pipe::init()?;

    let entries = playlist::load(Path::new(playlist_path))?;
    if entries.is_empty() {
        info!("playlist {} is empty, nothing to play", playlist_path);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let gaze = gaze_source()?;
    let config = PipelineConfig::default();
    for entry in &entries {
        if cancel.is_cancelled() {
            break;
        }
        info!("playing {}", entry);
        let report = run_file(entry, config, gaze.clone(), cancel.clone()).await?;
        info!(
            "{}: {} packets read, {} frames shown, mean lag {:?}, worst {:?}",
            entry,
            report.packets_read,
            report.frames_shown,
            report.lag.mean(),
            report.lag.worst,
        );
    }
    Ok(())
}

/// First Ctrl-C drains the running pipeline through the in-band sentinel; a
/// second one stops waiting and exits.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt: draining pipeline");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

/// Without a tracker the descriptor is pinned for the whole run:
/// `FOV_PLAY_GAZE=fx,fy,sigma,offset` overrides the frame-center default.
/// The pointer fallback lives with whichever windowing integration embeds
/// the pipeline; a headless player has no pointer to probe.
#[cfg(not(feature = "et"))]
fn gaze_source() -> Result<impl GazeSource + Clone> {
    let descriptor = match std::env::var("FOV_PLAY_GAZE") {
        Ok(raw) => parse_descriptor(&raw)?,
        Err(_) => FoveationDescriptor::centered(),
    };
    Ok(FixedGaze::new(descriptor))
}

#[cfg(feature = "et")]
fn gaze_source() -> Result<fov_pipe::gaze::SharedGaze> {
    tracker::spawn_listener()
}

fn parse_descriptor(raw: &str) -> Result<FoveationDescriptor> {
    let parts: Vec<f32> = raw
        .split(',')
        .map(|part| part.trim().parse())
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid FOV_PLAY_GAZE value {raw:?}"))?;
    let &[fx, fy, sigma, offset] = parts.as_slice() else {
        return Err(anyhow!(
            "FOV_PLAY_GAZE wants four comma-separated floats, got {raw:?}"
        ));
    };
    Ok(FoveationDescriptor::new(fx, fy, sigma, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_descriptor_overrides() {
        let d = parse_descriptor("0.25, 0.75, 0.3, 20").unwrap();
        assert_eq!(d, FoveationDescriptor::new(0.25, 0.75, 0.3, 20.0));
    }

    #[test]
    fn rejects_malformed_overrides() {
        assert!(parse_descriptor("0.5,0.5,0.3").is_err());
        assert!(parse_descriptor("0.5,0.5,0.3,zero").is_err());
    }
}
