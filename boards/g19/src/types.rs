use std::ops::BitOr;

use g19_core::{InEndpoint, TransportError};

pub type Result<T> = std::result::Result<T, G19Error>;

#[derive(Debug, thiserror::Error)]
pub enum G19Error {
    #[error("g19 {0} not found on usb bus")]
    DeviceNotFound(&'static str),
    #[error("display brightness must be within 0..=100, got {0}")]
    InvalidBrightness(u8),
    #[error(transparent)]
    PacketDecode(#[from] PacketDecodeError),
    #[error(transparent)]
    FrameSize(#[from] FrameSizeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusb::Error> for G19Error {
    fn from(e: rusb::Error) -> Self {
        Self::Transport(e.into())
    }
}

/// A raw key packet that does not describe a known key combination
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketDecodeError {
    #[error("{endpoint:?} packet has length {len}, expected {expected}: {packet:02x?}")]
    Length {
        endpoint: InEndpoint,
        len: usize,
        expected: usize,
        packet: Vec<u8>,
    },
    #[error("{endpoint:?} packet has unknown report id {id:#04x}: {packet:02x?}")]
    ReportId {
        endpoint: InEndpoint,
        id: u8,
        packet: Vec<u8>,
    },
    #[error("{endpoint:?} packet has unclassified bits {residual:#08x}: {packet:02x?}")]
    UnknownBits {
        endpoint: InEndpoint,
        residual: u32,
        packet: Vec<u8>,
    },
}

/// Pixel buffer rejected before any transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameSizeError {
    #[error("illegal frame size {width}x{height}, display is {expected_width}x{expected_height}")]
    Dimensions {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("illegal frame size: {actual} {unit}, should be {expected}")]
    Length {
        actual: usize,
        expected: usize,
        unit: &'static str,
    },
}

/// Illuminated M-key leds, an OR-combination of `M1`, `M2`, `M3` and `MR`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MKeyLeds(pub u8);

impl MKeyLeds {
    pub const NONE: MKeyLeds = MKeyLeds(0);
    pub const M1: MKeyLeds = MKeyLeds(0x80);
    pub const M2: MKeyLeds = MKeyLeds(0x40);
    pub const M3: MKeyLeds = MKeyLeds(0x20);
    pub const MR: MKeyLeds = MKeyLeds(0x10);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: MKeyLeds) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MKeyLeds {
    type Output = MKeyLeds;

    fn bitor(self, rhs: Self) -> Self::Output {
        MKeyLeds(self.0 | rhs.0)
    }
}
