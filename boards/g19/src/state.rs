//! Held-key tracking and edge detection for the three key endpoints.

use g19_core::InEndpoint;

use crate::keys::{
    KeyBitmap, KeySet, DISPLAY_MENU_KEYS, G_AND_M_KEYS, G_AND_M_REPORT, MULTIMEDIA_KEYS,
    MULTIMEDIA_REPORT, WINKEY_KEYS, WINKEY_REPORT,
};
use crate::types::PacketDecodeError;

/// Keys pressed and released by one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub pressed: KeySet,
    pub released: KeySet,
}

/// Event created by a key press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Endpoint that reported the change
    pub endpoint: InEndpoint,
    /// Held keys before the packet
    pub old_state: KeySet,
    /// Held keys after the packet
    pub new_state: KeySet,
    /// Keys newly pressed
    pub keys_down: KeySet,
    /// Keys released
    pub keys_up: KeySet,
}

impl InputEvent {
    pub fn new(endpoint: InEndpoint, old_state: KeySet, new_state: KeySet, step: Transition) -> Self {
        Self {
            endpoint,
            old_state,
            new_state,
            keys_down: step.pressed,
            keys_up: step.released,
        }
    }
}

/// Keys reported by one packet, scoped to the keys that packet can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Keys whose state the packet reports
    pub universe: KeySet,
    /// Keys of `universe` currently held
    pub held: KeySet,
}

/// Decode a raw packet without touching any state
pub fn decode_packet(endpoint: InEndpoint, packet: &[u8]) -> Result<Decoded, PacketDecodeError> {
    match endpoint {
        InEndpoint::GAndMKeys => {
            expect_len(endpoint, packet, 4)?;
            if packet[0] != G_AND_M_REPORT {
                return Err(report_id(endpoint, packet));
            }
            let value = (packet[3] as u32) << 16 | (packet[2] as u32) << 8 | packet[1] as u32;
            decode_bitmap(endpoint, packet, &G_AND_M_KEYS, value)
        },
        InEndpoint::MultimediaKeys => {
            expect_len(endpoint, packet, 2)?;
            match packet {
                [MULTIMEDIA_REPORT, mask] => {
                    decode_bitmap(endpoint, packet, &MULTIMEDIA_KEYS, *mask as u32)
                },
                [WINKEY_REPORT, state @ (0 | 1)] => Ok(Decoded {
                    universe: WINKEY_KEYS,
                    held: if *state == 1 { WINKEY_KEYS } else { KeySet::EMPTY },
                }),
                [WINKEY_REPORT, state] => Err(PacketDecodeError::UnknownBits {
                    endpoint,
                    residual: *state as u32,
                    packet: packet.to_vec(),
                }),
                _ => Err(report_id(endpoint, packet)),
            }
        },
        InEndpoint::DisplayMenuKeys => {
            // status byte followed by a constant 0x80
            expect_len(endpoint, packet, 2)?;
            decode_bitmap(endpoint, packet, &DISPLAY_MENU_KEYS, packet[0] as u32)
        },
    }
}

fn expect_len(endpoint: InEndpoint, packet: &[u8], expected: usize) -> Result<(), PacketDecodeError> {
    if packet.len() == expected {
        Ok(())
    } else {
        Err(PacketDecodeError::Length {
            endpoint,
            len: packet.len(),
            expected,
            packet: packet.to_vec(),
        })
    }
}

fn report_id(endpoint: InEndpoint, packet: &[u8]) -> PacketDecodeError {
    PacketDecodeError::ReportId {
        endpoint,
        id: packet[0],
        packet: packet.to_vec(),
    }
}

fn decode_bitmap(
    endpoint: InEndpoint,
    packet: &[u8],
    bitmap: &KeyBitmap,
    value: u32,
) -> Result<Decoded, PacketDecodeError> {
    let held = bitmap
        .decode(value)
        .map_err(|residual| PacketDecodeError::UnknownBits {
            endpoint,
            residual,
            packet: packet.to_vec(),
        })?;
    Ok(Decoded {
        universe: bitmap.universe(),
        held,
    })
}

/// Current state of the special keys
#[derive(Debug, Clone, Default)]
pub struct KeyState {
    keys_down: KeySet,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently considered held
    pub fn held(&self) -> KeySet {
        self.keys_down
    }

    /// Mutate the state by a received packet.
    ///
    /// Returns `None` if the packet changed nothing. On error the state is
    /// left untouched.
    pub fn apply(
        &mut self,
        endpoint: InEndpoint,
        packet: &[u8],
    ) -> Result<Option<Transition>, PacketDecodeError> {
        let decoded = decode_packet(endpoint, packet)?;
        Ok(self.update(decoded))
    }

    /// Like [`KeyState::apply`], wrapping the transition into an event
    pub fn process(
        &mut self,
        endpoint: InEndpoint,
        packet: &[u8],
    ) -> Result<Option<InputEvent>, PacketDecodeError> {
        let old_state = self.keys_down;
        Ok(self
            .apply(endpoint, packet)?
            .map(|step| InputEvent::new(endpoint, old_state, self.keys_down, step)))
    }

    /// Replace the state of every key in `decoded.universe`, leaving others as is
    fn update(&mut self, decoded: Decoded) -> Option<Transition> {
        let Decoded { universe, held } = decoded;
        let held = held.intersection(universe);
        let before = self.keys_down.intersection(universe);

        let pressed = held.difference(before);
        let released = before.difference(held);
        self.keys_down = self.keys_down.difference(universe).union(held);

        (!pressed.is_empty() || !released.is_empty()).then_some(Transition { pressed, released })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Key;

    fn keys(keys: &[Key]) -> KeySet {
        KeySet::of(keys)
    }

    #[test]
    fn g3_press_and_release() {
        let mut state = KeyState::new();
        let step = state
            .apply(InEndpoint::GAndMKeys, &[0x02, 0x04, 0x00, 0x40])
            .unwrap()
            .unwrap();
        assert_eq!(step.pressed, keys(&[Key::G03]));
        assert_eq!(step.released, KeySet::EMPTY);

        let step = state
            .apply(InEndpoint::GAndMKeys, &[0x02, 0x00, 0x00, 0x40])
            .unwrap()
            .unwrap();
        assert_eq!(step.pressed, KeySet::EMPTY);
        assert_eq!(step.released, keys(&[Key::G03]));
        assert!(state.held().is_empty());
    }

    #[test]
    fn m_keys_and_light_switch() {
        let mut state = KeyState::new();
        let step = state
            .apply(InEndpoint::GAndMKeys, &[0x02, 0x03, 0x14, 0x48])
            .unwrap()
            .unwrap();
        assert_eq!(
            step.pressed,
            keys(&[Key::G01, Key::G02, Key::G11, Key::M1, Key::Light])
        );
    }

    #[test]
    fn repeated_packet_is_silent() {
        let mut state = KeyState::new();
        let packet = [0x02, 0x00, 0x20, 0x40];
        assert!(state.apply(InEndpoint::GAndMKeys, &packet).unwrap().is_some());
        assert_eq!(state.apply(InEndpoint::GAndMKeys, &packet).unwrap(), None);
        assert_eq!(state.held(), keys(&[Key::M2]));
    }

    #[test]
    fn idle_packet_from_empty_state_is_silent() {
        let mut state = KeyState::new();
        assert_eq!(state.apply(InEndpoint::GAndMKeys, &[0x02, 0x00, 0x00, 0x40]).unwrap(), None);
        assert_eq!(state.apply(InEndpoint::MultimediaKeys, &[0x01, 0x00]).unwrap(), None);
        assert_eq!(state.apply(InEndpoint::DisplayMenuKeys, &[0x00, 0x80]).unwrap(), None);
    }

    #[test]
    fn media_scroll_sequence() {
        let mut state = KeyState::new();
        let step = state.apply(InEndpoint::MultimediaKeys, &[0x01, 0x21]).unwrap().unwrap();
        assert_eq!(step.pressed, keys(&[Key::Next, Key::ScrollUp]));
        assert_eq!(step.released, KeySet::EMPTY);

        let step = state.apply(InEndpoint::MultimediaKeys, &[0x01, 0x01]).unwrap().unwrap();
        assert_eq!(step.pressed, KeySet::EMPTY);
        assert_eq!(step.released, keys(&[Key::ScrollUp]));

        let step = state.apply(InEndpoint::MultimediaKeys, &[0x01, 0x00]).unwrap().unwrap();
        assert_eq!(step.released, keys(&[Key::Next]));
    }

    #[test]
    fn winkey_does_not_clear_media_keys() {
        let mut state = KeyState::new();
        state.apply(InEndpoint::MultimediaKeys, &[0x01, 0x08]).unwrap();

        let step = state.apply(InEndpoint::MultimediaKeys, &[0x03, 0x01]).unwrap().unwrap();
        assert_eq!(step.pressed, keys(&[Key::WinkeySwitch]));
        assert_eq!(state.held(), keys(&[Key::Play, Key::WinkeySwitch]));

        // media release leaves the winkey switch held
        let step = state.apply(InEndpoint::MultimediaKeys, &[0x01, 0x00]).unwrap().unwrap();
        assert_eq!(step.released, keys(&[Key::Play]));
        assert_eq!(state.held(), keys(&[Key::WinkeySwitch]));

        let step = state.apply(InEndpoint::MultimediaKeys, &[0x03, 0x00]).unwrap().unwrap();
        assert_eq!(step.released, keys(&[Key::WinkeySwitch]));
    }

    #[test]
    fn domains_are_independent() {
        let mut state = KeyState::new();
        state.apply(InEndpoint::GAndMKeys, &[0x02, 0x01, 0x00, 0x40]).unwrap();
        state.apply(InEndpoint::DisplayMenuKeys, &[0x04, 0x80]).unwrap();
        assert_eq!(state.apply(InEndpoint::MultimediaKeys, &[0x01, 0x00]).unwrap(), None);
        assert_eq!(state.held(), keys(&[Key::G01, Key::Menu]));
    }

    #[test]
    fn display_menu_combination() {
        let mut state = KeyState::new();
        let step = state.apply(InEndpoint::DisplayMenuKeys, &[0x88, 0x80]).unwrap().unwrap();
        assert_eq!(step.pressed, keys(&[Key::Ok, Key::Up]));
        let step = state.apply(InEndpoint::DisplayMenuKeys, &[0x08, 0x80]).unwrap().unwrap();
        assert_eq!(step.released, keys(&[Key::Up]));
    }

    #[test]
    fn decode_errors_leave_state_unchanged() {
        let mut state = KeyState::new();
        state.apply(InEndpoint::GAndMKeys, &[0x02, 0x04, 0x00, 0x40]).unwrap();
        state.apply(InEndpoint::MultimediaKeys, &[0x01, 0x10]).unwrap();
        let before = state.held();

        let bad: [(InEndpoint, &[u8]); 7] = [
            // unknown bit in the flags byte
            (InEndpoint::GAndMKeys, &[0x02, 0x00, 0x00, 0x41]),
            // sentinel missing
            (InEndpoint::GAndMKeys, &[0x02, 0x04, 0x00, 0x00]),
            (InEndpoint::GAndMKeys, &[0x03, 0x04, 0x00, 0x40]),
            (InEndpoint::GAndMKeys, &[0x02, 0x04, 0x00]),
            (InEndpoint::MultimediaKeys, &[0x01, 0x80]),
            (InEndpoint::MultimediaKeys, &[0x03, 0x02]),
            (InEndpoint::MultimediaKeys, &[0x05, 0x00]),
        ];
        for (endpoint, packet) in bad {
            assert!(state.apply(endpoint, packet).is_err(), "{packet:02x?} should fail");
            assert_eq!(state.held(), before);
        }
    }

    #[test]
    fn decode_error_kinds() {
        assert!(matches!(
            decode_packet(InEndpoint::GAndMKeys, &[0x02, 0x00, 0x00, 0x41]),
            Err(PacketDecodeError::UnknownBits { residual: 0x01_0000, .. })
        ));
        assert!(matches!(
            decode_packet(InEndpoint::MultimediaKeys, &[0x07, 0x00]),
            Err(PacketDecodeError::ReportId { id: 0x07, .. })
        ));
        assert!(matches!(
            decode_packet(InEndpoint::DisplayMenuKeys, &[0x04]),
            Err(PacketDecodeError::Length { len: 1, expected: 2, .. })
        ));
    }

    #[test]
    fn g_and_m_round_trip() {
        let mut state = KeyState::new();
        for lo in [0x00u8, 0x01, 0x5a, 0xff] {
            for hi in [0x00u8, 0x0f, 0xa0, 0xff] {
                for flags in [0x40u8, 0x48] {
                    let value = (flags as u32) << 16 | (hi as u32) << 8 | lo as u32;
                    state.apply(InEndpoint::GAndMKeys, &[0x02, lo, hi, flags]).unwrap();
                    let held = state.held().intersection(G_AND_M_KEYS.universe());
                    assert_eq!(G_AND_M_KEYS.encode(held), value);
                }
            }
        }
    }

    #[test]
    fn process_builds_event_snapshots() {
        let mut state = KeyState::new();
        state.apply(InEndpoint::MultimediaKeys, &[0x03, 0x01]).unwrap();
        let event = state
            .process(InEndpoint::GAndMKeys, &[0x02, 0x00, 0x80, 0x40])
            .unwrap()
            .unwrap();
        assert_eq!(event.endpoint, InEndpoint::GAndMKeys);
        assert_eq!(event.old_state, keys(&[Key::WinkeySwitch]));
        assert_eq!(event.new_state, keys(&[Key::WinkeySwitch, Key::Mr]));
        assert_eq!(event.keys_down, keys(&[Key::Mr]));
        assert!(event.keys_up.is_empty());
    }
}
