//! Screen frames and the conversions applied before encoding

use crate::domain::error::FrameError;

/// One raw screenshot, 4 bytes per pixel in B, G, R, A order, rows top-down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RawFrame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        check_geometry(width, height, data.len(), Self::BYTES_PER_PIXEL)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Drop the alpha channel
    pub fn to_bgr(&self) -> BgrFrame {
        let mut out = Vec::with_capacity(self.data.len() / 4 * 3);
        for px in self.data.chunks_exact(4) {
            out.extend_from_slice(&px[..3]);
        }
        BgrFrame {
            width: self.width,
            height: self.height,
            data: out,
        }
    }
}

/// 3 bytes per pixel in B, G, R order: what the video sink consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BgrFrame {
    pub const BYTES_PER_PIXEL: usize = 3;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        check_geometry(width, height, data.len(), Self::BYTES_PER_PIXEL)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Nearest-neighbour resize. Returns `self` untouched when the size
    /// already matches, which is the normal case for a full-screen capture.
    pub fn resize(self, width: u32, height: u32) -> Result<Self, FrameError> {
        if (width, height) == self.size() {
            return Ok(self);
        }
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyGeometry { width, height });
        }

        let bpp = Self::BYTES_PER_PIXEL;
        let src_w = self.width as usize;
        let src_h = self.height as usize;
        let (dst_w, dst_h) = (width as usize, height as usize);
        let mut out = vec![0u8; dst_w * dst_h * bpp];

        for y in 0..dst_h {
            let sy = y * src_h / dst_h;
            let src_row = &self.data[sy * src_w * bpp..(sy + 1) * src_w * bpp];
            let dst_row = &mut out[y * dst_w * bpp..(y + 1) * dst_w * bpp];
            for x in 0..dst_w {
                let sx = x * src_w / dst_w;
                dst_row[x * bpp..x * bpp + bpp].copy_from_slice(&src_row[sx * bpp..sx * bpp + bpp]);
            }
        }

        Ok(Self {
            width,
            height,
            data: out,
        })
    }
}

fn check_geometry(width: u32, height: u32, len: usize, bpp: usize) -> Result<(), FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::EmptyGeometry { width, height });
    }
    let expected = width as usize * height as usize * bpp;
    if len != expected {
        return Err(FrameError::SizeMismatch {
            width,
            height,
            expected,
            actual: len,
        });
    }
    Ok(())
}
