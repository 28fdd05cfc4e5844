//! Fixed-layout 44-byte WAV header reader.

use std::io::{self, Read};
use std::path::Path;

use crate::error::{ConfigError, WavError};
use crate::format::PcmFormat;

pub const HEADER_LEN: usize = 44;
pub const FORMAT_PCM: u16 = 1;

/// Fields of a canonical RIFF/WAVE header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavHeader {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Session format described by this header.
    pub fn pcm_format(&self) -> Result<PcmFormat, ConfigError> {
        PcmFormat::new(self.channels, self.sample_rate, self.bits_per_sample)
    }
}

/// Read the 44-byte header, leaving `reader` at the first sample byte.
pub fn read_header<R: Read>(reader: &mut R) -> Result<WavHeader, WavError> {
    let mut buf = [0u8; HEADER_LEN];
    let mut read = 0;
    while read < HEADER_LEN {
        match reader.read(&mut buf[read..]) {
            Ok(0) => {
                return Err(WavError::ShortHeader {
                    read,
                    expected: HEADER_LEN,
                });
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let riff = tag(&buf, 0);
    let wave = tag(&buf, 8);
    if !riff.eq_ignore_ascii_case(b"RIFF") || !wave.eq_ignore_ascii_case(b"WAVE") {
        return Err(WavError::BadMagic { riff, wave });
    }

    let header = WavHeader {
        format_tag: u16_at(&buf, 20),
        channels: u16_at(&buf, 22),
        sample_rate: u32_at(&buf, 24),
        byte_rate: u32_at(&buf, 28),
        block_align: u16_at(&buf, 32),
        bits_per_sample: u16_at(&buf, 34),
        data_len: u32_at(&buf, 40),
    };
    if header.format_tag != FORMAT_PCM {
        return Err(WavError::NotPcm(header.format_tag));
    }

    tracing::debug!(?header, "wav header");
    Ok(header)
}

/// Whether `path` names a WAV file (by `.wav` extension, any case).
pub fn is_wav_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

fn tag(buf: &[u8; HEADER_LEN], at: usize) -> [u8; 4] {
    [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]
}

fn u16_at(buf: &[u8; HEADER_LEN], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn u32_at(buf: &[u8; HEADER_LEN], at: usize) -> u32 {
    u32::from_le_bytes(tag(buf, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(riff: &[u8; 4], wave: &[u8; 4], format_tag: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
        let block_align = channels * bits / 8;
        let mut v = Vec::with_capacity(HEADER_LEN);
        v.extend_from_slice(riff);
        v.extend_from_slice(&36u32.to_le_bytes());
        v.extend_from_slice(wave);
        v.extend_from_slice(b"fmt ");
        v.extend_from_slice(&16u32.to_le_bytes());
        v.extend_from_slice(&format_tag.to_le_bytes());
        v.extend_from_slice(&channels.to_le_bytes());
        v.extend_from_slice(&rate.to_le_bytes());
        v.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
        v.extend_from_slice(&block_align.to_le_bytes());
        v.extend_from_slice(&bits.to_le_bytes());
        v.extend_from_slice(b"data");
        v.extend_from_slice(&8u32.to_le_bytes());
        v
    }

    #[test]
    fn reads_canonical_pcm_header() {
        let bytes = header_bytes(b"RIFF", b"WAVE", 1, 1, 22_050, 16);
        let header = read_header(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.channels, 1);
        assert_eq!(header.sample_rate, 22_050);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.block_align, 2);
        assert_eq!(header.data_len, 8);

        let format = header.pcm_format().unwrap();
        assert_eq!(format.frame_size(), 2);
    }

    #[test]
    fn magic_is_case_insensitive() {
        let bytes = header_bytes(b"riff", b"wave", 1, 2, 44_100, 16);
        assert!(read_header(&mut Cursor::new(bytes)).is_ok());
    }

    #[test]
    fn leaves_reader_at_first_sample() {
        let mut bytes = header_bytes(b"RIFF", b"WAVE", 1, 2, 8_000, 8);
        bytes.extend_from_slice(&[9, 8, 7, 6]);
        let mut cursor = Cursor::new(bytes);
        read_header(&mut cursor).unwrap();
        assert_eq!(cursor.position(), HEADER_LEN as u64);
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![9, 8, 7, 6]);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = read_header(&mut Cursor::new(header_bytes(b"RIFX", b"WAVE", 1, 2, 44_100, 16))).unwrap_err();
        assert!(matches!(err, WavError::BadMagic { .. }));
        assert_eq!(err.code(), -2);

        let err = read_header(&mut Cursor::new(header_bytes(b"RIFF", b"AVI ", 1, 2, 44_100, 16))).unwrap_err();
        assert_eq!(err.code(), -2);
        assert_eq!(err.to_string(), "invalid fcc RIFF AVI ");
    }

    #[test]
    fn rejects_non_pcm_format() {
        let err = read_header(&mut Cursor::new(header_bytes(b"RIFF", b"WAVE", 3, 2, 48_000, 32))).unwrap_err();
        assert!(matches!(err, WavError::NotPcm(3)));
        assert_eq!(err.code(), -3);
    }

    #[test]
    fn rejects_short_header() {
        let bytes = header_bytes(b"RIFF", b"WAVE", 1, 2, 44_100, 16);
        let err = read_header(&mut Cursor::new(&bytes[..20])).unwrap_err();
        assert!(matches!(err, WavError::ShortHeader { read: 20, expected: 44 }));
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn header_with_unsupported_bits_fails_format_resolution() {
        let bytes = header_bytes(b"RIFF", b"WAVE", 1, 2, 44_100, 24);
        let header = read_header(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.pcm_format(), Err(ConfigError::UnsupportedBits(24)));
    }

    #[test]
    fn wav_extension_detection() {
        assert!(is_wav_path(Path::new("take1.wav")));
        assert!(is_wav_path(Path::new("/tmp/TAKE1.WAV")));
        assert!(!is_wav_path(Path::new("take1.pcm")));
        assert!(!is_wav_path(Path::new("wav")));
    }
}
