//! Network feed from an external eye tracker.
//!
//! The tracker process streams whitespace-separated `fx fy sigma offset`
//! float lines over UDP; calibration and the vendor SDK stay outside this
//! process, only valid floats are required here.

use anyhow::{Context as _, Result};
use log::warn;
use tokio::net::UdpSocket;

use fov_pipe::gaze::{FoveationDescriptor, SharedGaze};

const BIND_ADDR: &str = "127.0.0.1:4444";

/// Bind the tracker port and keep a shared descriptor updated from incoming
/// samples. The returned handle starts at the frame center until the first
/// sample lands.
pub fn spawn_listener() -> Result<SharedGaze> {
    let gaze = SharedGaze::new(FoveationDescriptor::centered());
    let updater = gaze.clone();
    tokio::spawn(async move {
        if let Err(e) = listen(updater).await {
            warn!("tracker feed stopped: {e:#}");
        }
    });
    Ok(gaze)
}

async fn listen(gaze: SharedGaze) -> Result<()> {
    let socket = UdpSocket::bind(BIND_ADDR)
        .await
        .with_context(|| format!("bind tracker socket {BIND_ADDR}"))?;
    let mut buf = [0u8; 256];
    loop {
        let n = socket.recv(&mut buf).await.context("tracker recv")?;
        match parse_sample(&buf[..n]) {
            Some(descriptor) => gaze.update(descriptor),
            None => warn!("ignoring malformed tracker sample"),
        }
    }
}

fn parse_sample(datagram: &[u8]) -> Option<FoveationDescriptor> {
    let text = std::str::from_utf8(datagram).ok()?;
    let mut fields = text.split_whitespace().map(str::parse::<f32>);
    let fx = fields.next()?.ok()?;
    let fy = fields.next()?.ok()?;
    let sigma = fields.next()?.ok()?;
    let offset = fields.next()?.ok()?;
    if [fx, fy, sigma, offset].iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(FoveationDescriptor::new(fx, fy, sigma, offset))
}
