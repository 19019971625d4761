//! Display frame encoding.
//!
//! A frame is a 16 byte header, 496 bytes of constant filler, then
//! 320x240 pixels in row-major order from the upper left corner. Each pixel is
//! little-endian 16 bit highcolor (5-6-5).

use crate::abi::{FRAME_FILLER_LEN, FRAME_HEADER};
use crate::types::FrameSizeError;

/// Display width in pixels
pub const DISPLAY_WIDTH: u32 = 320;
/// Display height in pixels
pub const DISPLAY_HEIGHT: u32 = 240;
/// Length of the pixel payload in bytes
pub const PIXEL_DATA_LEN: usize = (DISPLAY_WIDTH * DISPLAY_HEIGHT * 2) as usize;
/// Length of a complete frame on the wire
pub const FRAME_LEN: usize = FRAME_HEADER.len() + FRAME_FILLER_LEN + PIXEL_DATA_LEN;

/// 24 bit color
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_565(self) -> u16 {
        rgb_to_565(self.r.into(), self.g.into(), self.b.into())
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// Scale a channel to `bits` bits, saturating at the maximum value
#[inline(always)]
fn scale_channel(value: u32, bits: u32) -> u16 {
    let max = (1u32 << bits) - 1;
    (value.saturating_mul(1 << bits) / 255).min(max) as u16
}

/// Convert a RGB value to 16 bit highcolor (5-6-5).
///
/// Channels are scaled linearly from 0..=255; anything past the target range
/// saturates. The device expects the result little-endian.
pub fn rgb_to_565(r: u32, g: u32, b: u32) -> u16 {
    (scale_channel(r, 5) << 11) | (scale_channel(g, 6) << 5) | scale_channel(b, 5)
}

fn frame_with_capacity() -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_LEN);
    frame.extend_from_slice(&FRAME_HEADER);
    // filler: 16..=255 followed by 0..=255
    frame.extend(16..=255u8);
    frame.extend(0..=255u8);
    frame
}

/// Wrap a pre-encoded pixel payload into a frame
pub fn wrap_pixel_data(data: &[u8]) -> Result<Vec<u8>, FrameSizeError> {
    if data.len() != PIXEL_DATA_LEN {
        return Err(FrameSizeError::Length {
            actual: data.len(),
            expected: PIXEL_DATA_LEN,
            unit: "bytes",
        });
    }
    let mut frame = frame_with_capacity();
    frame.extend_from_slice(data);
    Ok(frame)
}

/// Encode a full screen of pixels in row-major order
pub fn encode_frame(pixels: &[Rgb], width: u32, height: u32) -> Result<Vec<u8>, FrameSizeError> {
    if (width, height) != (DISPLAY_WIDTH, DISPLAY_HEIGHT) {
        return Err(FrameSizeError::Dimensions {
            width,
            height,
            expected_width: DISPLAY_WIDTH,
            expected_height: DISPLAY_HEIGHT,
        });
    }
    let expected = (width * height) as usize;
    if pixels.len() != expected {
        return Err(FrameSizeError::Length {
            actual: pixels.len(),
            expected,
            unit: "pixels",
        });
    }

    Ok(frame_from_pixels(pixels.iter().copied()))
}

/// Caller guarantees exactly one full screen of pixels
fn frame_from_pixels(pixels: impl Iterator<Item = Rgb>) -> Vec<u8> {
    let mut frame = frame_with_capacity();
    frame.extend(pixels.flat_map(|p| p.to_565().to_le_bytes()));
    debug_assert_eq!(frame.len(), FRAME_LEN);
    frame
}

/// Encode a frame filling the whole display with one color
pub fn encode_solid_color(r: u32, g: u32, b: u32) -> Vec<u8> {
    let pixel = rgb_to_565(r, g, b).to_le_bytes();
    let mut frame = frame_with_capacity();
    for _ in 0..PIXEL_DATA_LEN / 2 {
        frame.extend_from_slice(&pixel);
    }
    frame
}

/// Test pattern: green to red from left to right, black to blue from top to bottom
pub fn gradient_frame() -> Vec<u8> {
    let (w, h) = (DISPLAY_WIDTH, DISPLAY_HEIGHT);
    frame_from_pixels((0..h).flat_map(|y| {
        (0..w).map(move |x| {
            Rgb::new(
                (255 * x / w) as u8,
                (255 * (w - x) / w) as u8,
                (255 * y / h) as u8,
            )
        })
    }))
}
