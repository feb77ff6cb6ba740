//! Fixed-capacity PCM frame buffer
//!
//! A frame is allocated once per lane at startup and reused for every
//! iteration. Samples are 16-bit signed mono, little-endian on the wire.

use crate::cipher::padded_len;
use crate::constants::BYTES_PER_SAMPLE;

/// Reusable byte buffer holding one frame of PCM audio
#[derive(Clone)]
pub struct AudioFrame {
    buf: Box<[u8]>,
    len: usize,
}

impl AudioFrame {
    /// Create a zeroed frame. Only a `capacity` that is a multiple of the
    /// cipher block size guarantees any filled prefix pads to a whole block.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Filled portion of the frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// Whole backing buffer, for devices and sockets to read into.
    /// Follow with [`AudioFrame::set_len`].
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.buf.len());
    }

    /// Zero the whole buffer and mark it full
    pub fn fill_silence(&mut self) {
        self.buf.fill(0);
        self.len = self.buf.len();
    }

    /// Zero-extend the filled portion to the next cipher block boundary
    pub fn pad_to_block(&mut self) {
        let padded = padded_len(self.len).min(self.buf.len());
        self.buf[self.len..padded].fill(0);
        self.len = padded;
    }
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("len", &self.len)
            .field("capacity", &self.buf.len())
            .finish()
    }
}

/// Rewrite every whole sample of a little-endian PCM buffer in place.
/// A trailing odd byte is left untouched.
#[inline]
pub fn map_samples_in_place(pcm: &mut [u8], mut f: impl FnMut(i16) -> i16) {
    for chunk in pcm.chunks_exact_mut(BYTES_PER_SAMPLE) {
        let out = f(i16::from_le_bytes([chunk[0], chunk[1]]));
        chunk.copy_from_slice(&out.to_le_bytes());
    }
}

pub fn samples_from_pcm(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(BYTES_PER_SAMPLE)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

pub fn pcm_from_samples(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_lifecycle() {
        let mut frame = AudioFrame::new(64);
        assert_eq!(frame.capacity(), 64);
        assert!(frame.is_empty());

        frame.storage_mut()[..4].copy_from_slice(&[1, 0, 0xff, 0xff]);
        frame.set_len(4);
        assert_eq!(samples_from_pcm(frame.as_bytes()), vec![1, -1]);

        frame.pad_to_block();
        assert_eq!(frame.len(), 16);
        assert_eq!(&frame.as_bytes()[4..], &[0u8; 12]);

        frame.fill_silence();
        assert_eq!(frame.len(), 64);
        assert!(frame.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pad_clears_stale_bytes() {
        let mut frame = AudioFrame::new(32);
        frame.storage_mut().fill(7);
        frame.set_len(2);
        frame.pad_to_block();
        assert_eq!(frame.as_bytes(), &[7, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_set_len_clamps() {
        let mut frame = AudioFrame::new(16);
        frame.set_len(100);
        assert_eq!(frame.len(), 16);
    }

    #[test]
    fn test_pcm_helpers() {
        let pcm = pcm_from_samples(&[i16::MIN, 0, i16::MAX]);
        assert_eq!(pcm, vec![0x00, 0x80, 0x00, 0x00, 0xff, 0x7f]);
        assert_eq!(samples_from_pcm(&pcm), vec![i16::MIN, 0, i16::MAX]);
    }
}
