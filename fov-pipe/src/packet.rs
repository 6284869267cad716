/// One compressed video unit moving between stages. Owned by exactly one
/// stage at a time; the connecting queues transfer ownership.
pub struct RawPacket {
    inner: ffmpeg_next::codec::packet::Packet,
}

impl RawPacket {
    pub fn pts(&self) -> Option<i64> {
        self.inner.pts()
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub fn is_key(&self) -> bool {
        self.inner.is_key()
    }

    pub fn get(&self) -> &ffmpeg_next::codec::packet::Packet {
        &self.inner
    }
}

impl From<ffmpeg_next::codec::packet::Packet> for RawPacket {
    fn from(inner: ffmpeg_next::codec::packet::Packet) -> Self {
        Self { inner }
    }
}
