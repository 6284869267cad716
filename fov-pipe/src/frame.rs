use anyhow::{bail, Result};
use ffmpeg_next::ffi;

use crate::codec::Foveate;
use crate::gaze::FoveationDescriptor;

/// Side data slot the foveation descriptor rides in. Unregistered SEI user
/// data is the one per-frame payload the stock encoders forward into the
/// bitstream (enabled through the `udu_sei` encoder option).
pub const DESCRIPTOR_SIDE_DATA: ffi::AVFrameSideDataType =
    ffi::AVFrameSideDataType::AV_FRAME_DATA_SEI_UNREGISTERED;

/// One raw video frame moving between stages. Side data is allocated inside
/// the frame and freed with it.
pub struct RawFrame {
    inner: ffmpeg_next::frame::Video,
}

impl RawFrame {
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn pts(&self) -> Option<i64> {
        self.inner.pts()
    }

    /// Read the descriptor back out of the side data, if one is attached.
    pub fn descriptor(&self) -> Option<FoveationDescriptor> {
        unsafe {
            let sd = ffi::av_frame_get_side_data(self.inner.as_ptr(), DESCRIPTOR_SIDE_DATA);
            if sd.is_null() || (*sd).size != FoveationDescriptor::SIZE {
                return None;
            }
            let mut buf = [0u8; FoveationDescriptor::SIZE];
            std::ptr::copy_nonoverlapping((*sd).data, buf.as_mut_ptr(), buf.len());
            Some(FoveationDescriptor::from_bytes(&buf))
        }
    }

    pub fn get(&self) -> &ffmpeg_next::frame::Video {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut ffmpeg_next::frame::Video {
        &mut self.inner
    }
}

impl From<ffmpeg_next::frame::Video> for RawFrame {
    fn from(inner: ffmpeg_next::frame::Video) -> Self {
        Self { inner }
    }
}

impl Foveate for RawFrame {
    fn attach_descriptor(&mut self, descriptor: FoveationDescriptor) -> Result<()> {
        let bytes = descriptor.to_bytes();
        unsafe {
            let sd = ffi::av_frame_new_side_data(
                self.inner.as_mut_ptr(),
                DESCRIPTOR_SIDE_DATA,
                bytes.len(),
            );
            if sd.is_null() {
                bail!("av_frame_new_side_data failed");
            }
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), (*sd).data, bytes.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // av_frame_alloc and the side data calls need no codec registration, so
    // this runs without any fixture.
    #[test]
    fn descriptor_round_trips_through_side_data() {
        let mut frame = RawFrame::from(ffmpeg_next::frame::Video::empty());
        assert!(frame.descriptor().is_none());

        let descriptor = FoveationDescriptor::new(0.25, 0.75, 0.3, 20.0);
        frame.attach_descriptor(descriptor).unwrap();
        assert_eq!(frame.descriptor(), Some(descriptor));
    }

    #[test]
    fn attached_payload_is_sixteen_bytes() {
        let mut frame = RawFrame::from(ffmpeg_next::frame::Video::empty());
        frame
            .attach_descriptor(FoveationDescriptor::centered())
            .unwrap();

        unsafe {
            let sd = ffi::av_frame_get_side_data(frame.get().as_ptr(), DESCRIPTOR_SIDE_DATA);
            assert!(!sd.is_null());
            assert_eq!((*sd).size, FoveationDescriptor::SIZE);
        }
    }
}
