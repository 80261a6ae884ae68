use chrono::{DateTime, Utc};

use crate::driver::FrameInfo;

/// Timing of a frame as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTimingInfo {
    /// Frames acquired by this session so far, counting this one.
    pub fno: usize,
    /// When the driver returned the frame.
    pub datetime: DateTime<Utc>,
}

/// Storage for one frame, sized when the region is configured.
///
/// The allocation is never smaller than the driver's reported transfer
/// length, which can exceed the frame itself. Until a frame has been
/// acquired the buffer is zeroed and reports 16 bits per sample.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    bit_depth: u32,
    channels: u32,
    data: Vec<u8>,
    host_timing: Option<HostTimingInfo>,
}

impl ImageBuffer {
    pub(crate) fn new(width: u32, height: u32, mem_length: usize) -> Self {
        let frame_len = width as usize * height as usize * 2;
        Self {
            width,
            height,
            bit_depth: 16,
            channels: 1,
            data: vec![0; frame_len.max(mem_length)],
            host_timing: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height as usize, self.width as usize)
    }

    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn bytes_per_sample(&self) -> usize {
        if self.bit_depth <= 8 { 1 } else { 2 }
    }

    /// Bytes allocated for the driver to write into.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The bytes of the current frame, in native byte order.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.width as usize
            * self.height as usize
            * self.channels as usize
            * self.bytes_per_sample();
        &self.data[..len.min(self.data.len())]
    }

    /// Every sample of the current frame widened to `u16`.
    pub fn samples(&self) -> Vec<u16> {
        let bytes = self.as_bytes();
        if self.bytes_per_sample() == 1 {
            bytes.iter().map(|b| u16::from(*b)).collect()
        } else {
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]))
                .collect()
        }
    }

    pub fn host_timing(&self) -> Option<&HostTimingInfo> {
        self.host_timing.as_ref()
    }

    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        self.host_timing.map(|t| t.datetime)
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn record(&mut self, info: &FrameInfo, host_timing: HostTimingInfo) {
        self.bit_depth = info.bpp;
        self.channels = info.channels.max(1);
        self.host_timing = Some(host_timing);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocation_covers_driver_length() {
        let buf = ImageBuffer::new(4, 3, 100);
        assert_eq!(buf.shape(), (3, 4));
        assert_eq!(buf.capacity(), 100);
        assert_eq!(buf.as_bytes().len(), 24);
        assert!(buf.samples().iter().all(|s| *s == 0));
        assert_eq!(buf.acquired_at(), None);

        let buf = ImageBuffer::new(4, 3, 0);
        assert_eq!(buf.capacity(), 24);
    }

    #[test]
    fn eight_bit_frame() {
        let mut buf = ImageBuffer::new(2, 2, 0);
        buf.raw_mut()[..4].copy_from_slice(&[1, 2, 3, 250]);
        let info = FrameInfo {
            width: 2,
            height: 2,
            bpp: 8,
            channels: 1,
        };
        let datetime = Utc::now();
        buf.record(&info, HostTimingInfo { fno: 1, datetime });
        assert_eq!(buf.bytes_per_sample(), 1);
        assert_eq!(buf.samples(), vec![1, 2, 3, 250]);
        assert_eq!(buf.acquired_at(), Some(datetime));
    }
}
