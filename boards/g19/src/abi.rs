//! Control and bulk payloads understood by the G19.

use g19_core::{ControlRequest, OutEndpoint};

use crate::types::MKeyLeds;

/// Fixed header of every display frame
pub const FRAME_HEADER: [u8; 16] = [
    0x10, 0x0F, 0x00, 0x58, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x3F, 0x01, 0xEF, 0x00, 0x0F,
];

/// Length of the constant filler between header and pixels
pub const FRAME_FILLER_LEN: usize = 240 + 256;

/// Opcode of the backlight color command
pub const COLOR_OPCODE: u8 = 0x07;
/// Opcode of the M-key led command
pub const M_KEYS_OPCODE: u8 = 0x05;

/// Highest accepted display brightness
pub const MAX_BRIGHTNESS: u8 = 100;

/// bmRequestType: host to device, class, interface
const CLASS_INTERFACE_OUT: u8 = 0x21;
/// bmRequestType: host to device, vendor, interface
const VENDOR_INTERFACE_OUT: u8 = 0x41;

/// HID SET_REPORT
const SET_REPORT: u8 = 0x09;

macro_rules! impl_control_requests {
    [$(
        $( #[doc = $( $doc:tt )* ] )*
        const $name:ident = ($rtype:expr, $request:expr, $value:expr, $index:expr);
    )+] => {
        $(
            $(#[doc = concat!("Control request ", $($doc)*)])*
            pub const $name: OutEndpoint = OutEndpoint::Control(ControlRequest {
                request_type: $rtype,
                request: $request,
                value: $value,
                index: $index,
            });
        )*
    };
}

impl_control_requests![
    /// setting the current backlight color
    const SET_BG_COLOR = (CLASS_INTERFACE_OUT, SET_REPORT, 0x307, 0x01);

    /// storing the backlight color used after a reset
    const SAVE_BG_COLOR = (CLASS_INTERFACE_OUT, SET_REPORT, 0x308, 0x01);

    /// setting the illuminated M-keys
    const SET_M_KEYS = (CLASS_INTERFACE_OUT, SET_REPORT, 0x305, 0x01);

    /// setting the display brightness
    const SET_BRIGHTNESS = (VENDOR_INTERFACE_OUT, 0x0a, 0x0, 0x0);
];

/// Construct a payload for setting or saving the backlight color
pub const fn color(r: u8, g: u8, b: u8) -> [u8; 4] {
    [COLOR_OPCODE, r, g, b]
}

/// Construct a payload for illuminating M-keys
pub const fn m_keys(leds: MKeyLeds) -> [u8; 2] {
    [M_KEYS_OPCODE, leds.bits()]
}

/// Construct a payload for the display brightness, `level` in 0..=100
pub const fn brightness(level: u8) -> [u8; 9] {
    [level, 0xe2, 0x12, 0x00, 0x8c, 0x11, 0x00, 0x10, 0x00]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_command() {
        assert_eq!(color(1, 2, 3), [0x07, 1, 2, 3]);
    }

    #[test]
    fn control_requests() {
        let OutEndpoint::Control(req) = SET_BG_COLOR else {
            panic!("expected control endpoint");
        };
        assert_eq!(req.request_type, 0x21);
        assert_eq!(req.request, 0x09);
        assert_eq!(req.value, 0x307);
        assert_eq!(req.index, 1);

        let OutEndpoint::Control(req) = SET_BRIGHTNESS else {
            panic!("expected control endpoint");
        };
        assert_eq!((req.request_type, req.request, req.value, req.index), (0x41, 0x0a, 0, 0));
    }

    #[test]
    fn payloads() {
        assert_eq!(m_keys(MKeyLeds::M1 | MKeyLeds::M3), [0x05, 0xa0]);
        assert_eq!(brightness(42)[0], 42);
        assert_eq!(brightness(0).len(), 9);
    }
}
