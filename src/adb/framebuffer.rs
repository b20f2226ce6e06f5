use crate::error::{AdbError, Result};
use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

pub const HEADER_LENGTH: usize = 52;

const OLD_STYLE_VERSION: u32 = 16;
const CHUNK_SIZE: usize = 8192;

/// Header sent in front of `framebuffer:` pixel data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FramebufferMeta {
    pub version: u32,
    pub bpp: u32,
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub red_offset: u32,
    pub red_length: u32,
    pub blue_offset: u32,
    pub blue_length: u32,
    pub green_offset: u32,
    pub green_length: u32,
    pub alpha_offset: u32,
    pub alpha_length: u32,
    /// `rgb`, `bgr`, `rgba` or `bgra`.
    pub format: String,
}

impl FramebufferMeta {
    pub fn parse(header: &[u8]) -> Result<Self> {
        if header.len() < HEADER_LENGTH {
            return Err(AdbError::PrematureEof {
                missing_bytes: HEADER_LENGTH - header.len(),
            });
        }
        let field = |index: usize| {
            let at = index * 4;
            u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
        };

        let version = field(0);
        if version == OLD_STYLE_VERSION {
            return Err(AdbError::Command(
                "Old-style raw images are not supported".to_string(),
            ));
        }

        let bpp = field(1);
        let blue_offset = field(7);
        let alpha_length = field(12);
        let mut format = if blue_offset == 0 { "bgr" } else { "rgb" }.to_string();
        if bpp == 32 || alpha_length != 0 {
            format.push('a');
        }

        Ok(Self {
            version,
            bpp,
            size: field(2),
            width: field(3),
            height: field(4),
            red_offset: field(5),
            red_length: field(6),
            blue_offset,
            blue_length: field(8),
            green_offset: field(9),
            green_length: field(10),
            alpha_offset: field(11),
            alpha_length,
            format,
        })
    }
}

/// Repacks framebuffer pixels of any channel layout into 24-bit RGB, dropping alpha.
///
/// Channel offsets are bit offsets into a little-endian pixel. A pixel split
/// across reads is held back until the rest of it arrives.
pub struct RgbTransform<R> {
    inner: R,
    red: usize,
    green: usize,
    blue: usize,
    pixel_bytes: usize,
    input: BytesMut,
    output: BytesMut,
    eof: bool,
}

impl<R> RgbTransform<R> {
    pub fn new(meta: &FramebufferMeta, inner: R) -> Result<Self> {
        let pixel_bytes = (meta.bpp / 8) as usize;
        let red = (meta.red_offset / 8) as usize;
        let green = (meta.green_offset / 8) as usize;
        let blue = (meta.blue_offset / 8) as usize;
        let fits = [red, green, blue].iter().all(|&at| at < pixel_bytes);
        if meta.bpp % 8 != 0 || pixel_bytes < 3 || !fits {
            return Err(AdbError::Command(format!(
                "Cannot convert {} bpp '{}' pixels to RGB",
                meta.bpp, meta.format
            )));
        }
        Ok(Self {
            inner,
            red,
            green,
            blue,
            pixel_bytes,
            input: BytesMut::new(),
            output: BytesMut::new(),
            eof: false,
        })
    }

    fn feed(&mut self, data: &[u8]) {
        self.input.extend_from_slice(data);
        let whole = self.input.len() / self.pixel_bytes * self.pixel_bytes;
        self.output.reserve(whole / self.pixel_bytes * 3);
        for pixel in self.input[..whole].chunks_exact(self.pixel_bytes) {
            self.output.put_u8(pixel[self.red]);
            self.output.put_u8(pixel[self.green]);
            self.output.put_u8(pixel[self.blue]);
        }
        self.input.advance(whole);
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for RgbTransform<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.output.is_empty() {
                let count = this.output.len().min(buf.remaining());
                buf.put_slice(&this.output[..count]);
                this.output.advance(count);
                return Poll::Ready(Ok(()));
            }
            if this.eof {
                return Poll::Ready(Ok(()));
            }

            let mut chunk = [0u8; CHUNK_SIZE];
            let mut read = ReadBuf::new(&mut chunk);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut read))?;
            if read.filled().is_empty() {
                // A trailing partial pixel is dropped
                this.eof = true;
            } else {
                this.feed(read.filled());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn header(fields: [u32; 13]) -> Vec<u8> {
        fields.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    #[test]
    fn test_parse_rgba() {
        let meta = FramebufferMeta::parse(&header([
            1, 32, 1080 * 1920 * 4, 1080, 1920, 0, 8, 16, 8, 8, 8, 24, 8,
        ]))
        .unwrap();
        assert_eq!(meta.width, 1080);
        assert_eq!(meta.height, 1920);
        assert_eq!(meta.red_offset, 0);
        assert_eq!(meta.blue_offset, 16);
        assert_eq!(meta.green_offset, 8);
        assert_eq!(meta.alpha_offset, 24);
        assert_eq!(meta.format, "rgba");
    }

    #[test]
    fn test_parse_bgr() {
        let meta =
            FramebufferMeta::parse(&header([1, 24, 12, 2, 2, 16, 8, 0, 8, 8, 8, 0, 0])).unwrap();
        assert_eq!(meta.format, "bgr");
    }

    #[test]
    fn test_rejects_old_style() {
        let err = FramebufferMeta::parse(&header([16, 16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]))
            .unwrap_err();
        assert!(err.to_string().contains("Old-style"));
    }

    fn meta(fields: [u32; 13]) -> FramebufferMeta {
        FramebufferMeta::parse(&header(fields)).unwrap()
    }

    #[tokio::test]
    async fn test_rgb_from_bgra_split_reads() {
        let bgra = meta([1, 32, 8, 2, 1, 16, 8, 0, 8, 8, 8, 24, 8]);
        let (mut device, stream) = duplex(64);
        let mut rgb = RgbTransform::new(&bgra, stream).unwrap();
        // Second pixel arrives in two pieces
        device.write_all(&[0x01, 0x02, 0x03, 0xff, 0x11]).await.unwrap();
        device.write_all(&[0x12, 0x13, 0xff]).await.unwrap();
        drop(device);

        let mut out = Vec::new();
        rgb.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![0x03, 0x02, 0x01, 0x13, 0x12, 0x11]);
    }

    #[tokio::test]
    async fn test_rgb_input_is_unchanged() {
        let rgb24 = meta([1, 24, 6, 2, 1, 0, 8, 16, 8, 8, 8, 0, 0]);
        let mut rgb = RgbTransform::new(&rgb24, &[1u8, 2, 3, 4, 5, 6, 7][..]).unwrap();
        let mut out = Vec::new();
        rgb.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_rgb_rejects_16_bpp() {
        let rgb565 = meta([1, 16, 4, 1, 1, 11, 5, 0, 5, 5, 6, 0, 0]);
        assert!(RgbTransform::new(&rgb565, tokio::io::empty()).is_err());
    }

    #[test]
    fn test_short_header() {
        assert!(FramebufferMeta::parse(&[0u8; 10])
            .unwrap_err()
            .is_premature_eof());
    }
}
