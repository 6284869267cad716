use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context as _, Result};

/// Angular spread of the high-quality region used by the pointer fallback.
pub const DEFAULT_SIGMA: f32 = 0.3;
/// Peripheral quality bias used by the pointer fallback.
pub const DEFAULT_QP_OFFSET: f32 = 20.0;

/// Per-frame gaze state handed to the encoder: normalized gaze coordinates,
/// the spread of the foveal region and a peripheral quality offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FoveationDescriptor {
    pub fx: f32,
    pub fy: f32,
    pub sigma: f32,
    pub offset: f32,
}

impl FoveationDescriptor {
    /// Wire size of a descriptor attached as frame side data.
    pub const SIZE: usize = 16;

    pub fn new(fx: f32, fy: f32, sigma: f32, offset: f32) -> Self {
        Self {
            fx,
            fy,
            sigma,
            offset,
        }
    }

    /// Center of the frame with the default spread and offset.
    pub fn centered() -> Self {
        Self::new(0.5, 0.5, DEFAULT_SIGMA, DEFAULT_QP_OFFSET)
    }

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.fx.to_le_bytes());
        buf[4..8].copy_from_slice(&self.fy.to_le_bytes());
        buf[8..12].copy_from_slice(&self.sigma.to_le_bytes());
        buf[12..16].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        let f = |i: usize| f32::from_le_bytes(buf[i..i + 4].try_into().unwrap());
        Self::new(f(0), f(4), f(8), f(12))
    }
}

/// Source of foveation descriptors, one per encoded frame.
///
/// Injectable so the encoder does not care whether gaze comes from a pointer,
/// a recorded trace or a live eye tracker.
pub trait GazeSource: Send + 'static {
    fn descriptor(&mut self) -> FoveationDescriptor;
}

/// Pointer and surface geometry behind the fallback gaze source, implemented
/// by whichever windowing integration hosts the display.
pub trait PointerProbe: Send + 'static {
    /// Current pointer position in surface coordinates.
    fn pointer(&mut self) -> (i32, i32);
    /// Current surface size in pixels.
    fn surface_size(&mut self) -> (u32, u32);
}

/// Fallback mode without an eye tracker: the pointer position stands in for
/// the gaze point.
pub struct PointerGaze<P> {
    probe: P,
    sigma: f32,
    offset: f32,
}

impl<P: PointerProbe> PointerGaze<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            sigma: DEFAULT_SIGMA,
            offset: DEFAULT_QP_OFFSET,
        }
    }
}

impl<P: PointerProbe> GazeSource for PointerGaze<P> {
    fn descriptor(&mut self) -> FoveationDescriptor {
        let (mx, my) = self.probe.pointer();
        let (w, h) = self.probe.surface_size();
        FoveationDescriptor::new(
            mx as f32 / w.max(1) as f32,
            my as f32 / h.max(1) as f32,
            self.sigma,
            self.offset,
        )
    }
}

/// Deterministic gaze, pinned at construction. Two runs over the same input
/// with the same fixed descriptor produce identical encoded output.
#[derive(Clone, Copy, Debug)]
pub struct FixedGaze(FoveationDescriptor);

impl FixedGaze {
    pub fn new(descriptor: FoveationDescriptor) -> Self {
        Self(descriptor)
    }

    pub fn centered() -> Self {
        Self(FoveationDescriptor::centered())
    }
}

impl GazeSource for FixedGaze {
    fn descriptor(&mut self) -> FoveationDescriptor {
        self.0
    }
}

/// Handle an external tracker updates; the encoder reads the latest sample.
/// This is the eye-tracking seam: whatever produces the samples only has to
/// hand over valid floats.
#[derive(Clone)]
pub struct SharedGaze {
    current: Arc<Mutex<FoveationDescriptor>>,
}

impl SharedGaze {
    pub fn new(initial: FoveationDescriptor) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn update(&self, descriptor: FoveationDescriptor) {
        *self.current.lock().unwrap() = descriptor;
    }
}

impl GazeSource for SharedGaze {
    fn descriptor(&mut self) -> FoveationDescriptor {
        *self.current.lock().unwrap()
    }
}

/// Replays a recorded gaze trace, one descriptor per frame, holding the last
/// sample once the trace runs out.
pub struct ReplayGaze {
    samples: Vec<FoveationDescriptor>,
    next: usize,
}

impl ReplayGaze {
    pub fn new(samples: Vec<FoveationDescriptor>) -> Result<Self> {
        if samples.is_empty() {
            return Err(anyhow!("gaze trace is empty"));
        }
        Ok(Self { samples, next: 0 })
    }

    /// Load a trace recorded as four column files (x, y, sigma, offset), one
    /// float per line, all of equal length.
    pub fn from_files(x: &Path, y: &Path, sigma: &Path, offset: &Path) -> Result<Self> {
        let fx = read_column(x)?;
        let fy = read_column(y)?;
        let sigmas = read_column(sigma)?;
        let offsets = read_column(offset)?;

        if fx.len() != fy.len() || fx.len() != sigmas.len() || fx.len() != offsets.len() {
            return Err(anyhow!(
                "gaze trace columns disagree in length: {} / {} / {} / {}",
                fx.len(),
                fy.len(),
                sigmas.len(),
                offsets.len()
            ));
        }

        let samples = (0..fx.len())
            .map(|i| FoveationDescriptor::new(fx[i], fy[i], sigmas[i], offsets[i]))
            .collect();
        Self::new(samples)
    }
}

fn read_column(path: &Path) -> Result<Vec<f32>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read gaze trace {}", path.display()))?;
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<f32>()
                .with_context(|| format!("bad value {:?} in {}", line, path.display()))
        })
        .collect()
}

impl GazeSource for ReplayGaze {
    fn descriptor(&mut self) -> FoveationDescriptor {
        let i = self.next.min(self.samples.len() - 1);
        self.next = self.next.saturating_add(1);
        self.samples[i]
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn descriptor_bytes_are_sixteen_le_floats() {
        let d = FoveationDescriptor::new(0.25, 0.75, 0.3, 20.0);
        let bytes = d.to_bytes();
        assert_eq!(bytes.len(), FoveationDescriptor::SIZE);
        assert_eq!(&bytes[0..4], &0.25f32.to_le_bytes());
        assert_eq!(FoveationDescriptor::from_bytes(&bytes), d);
    }

    struct StubProbe {
        pointer: (i32, i32),
        size: (u32, u32),
    }

    impl PointerProbe for StubProbe {
        fn pointer(&mut self) -> (i32, i32) {
            self.pointer
        }
        fn surface_size(&mut self) -> (u32, u32) {
            self.size
        }
    }

    #[test]
    fn pointer_fallback_normalizes_into_unit_range() {
        for (mx, my) in [(0, 0), (640, 360), (1279, 719)] {
            let mut gaze = PointerGaze::new(StubProbe {
                pointer: (mx, my),
                size: (1280, 720),
            });
            let d = gaze.descriptor();
            assert!((0.0..=1.0).contains(&d.fx), "fx out of range: {}", d.fx);
            assert!((0.0..=1.0).contains(&d.fy), "fy out of range: {}", d.fy);
            assert_eq!(d.sigma, DEFAULT_SIGMA);
            assert_eq!(d.offset, DEFAULT_QP_OFFSET);
        }
    }

    #[test]
    fn shared_gaze_sees_updates() {
        let mut gaze = SharedGaze::new(FoveationDescriptor::centered());
        let handle = gaze.clone();
        handle.update(FoveationDescriptor::new(0.1, 0.2, 0.3, 4.0));
        assert_eq!(gaze.descriptor(), FoveationDescriptor::new(0.1, 0.2, 0.3, 4.0));
    }

    #[test]
    fn replay_holds_last_sample() {
        let mut gaze = ReplayGaze::new(vec![
            FoveationDescriptor::new(0.1, 0.1, 0.3, 20.0),
            FoveationDescriptor::new(0.9, 0.9, 0.3, 20.0),
        ])
        .unwrap();
        assert_eq!(gaze.descriptor().fx, 0.1);
        assert_eq!(gaze.descriptor().fx, 0.9);
        assert_eq!(gaze.descriptor().fx, 0.9);
    }

    #[test]
    fn replay_loads_column_files() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(body.as_bytes()).unwrap();
            path
        };
        let x = write("x", "0.1\n0.2\n");
        let y = write("y", "0.5\n0.6\n");
        let s = write("s", "0.3\n0.3\n");
        let o = write("o", "20\n25\n");

        let mut gaze = ReplayGaze::from_files(&x, &y, &s, &o).unwrap();
        assert_eq!(gaze.descriptor(), FoveationDescriptor::new(0.1, 0.5, 0.3, 20.0));
        assert_eq!(gaze.descriptor(), FoveationDescriptor::new(0.2, 0.6, 0.3, 25.0));

        let short = write("short", "0.1\n");
        assert!(ReplayGaze::from_files(&short, &y, &s, &o).is_err());
    }
}
