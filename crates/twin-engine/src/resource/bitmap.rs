/// Texel layout of a decoded bitmap. Always 8 bits per channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PixelFormat {
    R8,
    Rg8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::Rg8 => 2,
            Self::Rgba8 => 4,
        }
    }

    /// Maps a channel count to a format. Three-channel data has no GPU
    /// format and must be expanded to RGBA first.
    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(Self::R8),
            2 => Some(Self::Rg8),
            4 => Some(Self::Rgba8),
            _ => None,
        }
    }
}

/// Decoded, tightly packed pixel data ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() == self.expected_len()
    }

    /// Expands packed RGB to RGBA with opaque alpha.
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Self {
        let mut pixels = Vec::with_capacity(rgb.len() / 3 * 4);
        for px in rgb.chunks_exact(3) {
            pixels.extend_from_slice(px);
            pixels.push(u8::MAX);
        }
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            pixels,
        }
    }

    /// Two-colour checkerboard with `cells` squares per side.
    pub fn checker(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let c = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&c);
            }
        }
        Self {
            width: size,
            height: size,
            format: PixelFormat::Rgba8,
            pixels,
        }
    }
}
