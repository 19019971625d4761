//! Logical keys and the raw bit patterns reporting them.

use std::fmt;

/// Every special key the G19 reports outside of the regular keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Key {
    /// Backlight switch
    Light,
    M1,
    M2,
    M3,
    /// Macro record
    Mr,
    G01,
    G02,
    G03,
    G04,
    G05,
    G06,
    G07,
    G08,
    G09,
    G10,
    G11,
    G12,

    // keys around the display
    Back,
    Down,
    Left,
    Menu,
    Ok,
    Right,
    Settings,
    Up,

    /// Winkey lock switch, held while winkey is disabled
    WinkeySwitch,

    // multimedia keys
    Next,
    Prev,
    Stop,
    Play,
    Mute,
    ScrollUp,
    ScrollDown,
}

impl Key {
    pub const ALL: [Key; 33] = [
        Key::Light,
        Key::M1,
        Key::M2,
        Key::M3,
        Key::Mr,
        Key::G01,
        Key::G02,
        Key::G03,
        Key::G04,
        Key::G05,
        Key::G06,
        Key::G07,
        Key::G08,
        Key::G09,
        Key::G10,
        Key::G11,
        Key::G12,
        Key::Back,
        Key::Down,
        Key::Left,
        Key::Menu,
        Key::Ok,
        Key::Right,
        Key::Settings,
        Key::Up,
        Key::WinkeySwitch,
        Key::Next,
        Key::Prev,
        Key::Stop,
        Key::Play,
        Key::Mute,
        Key::ScrollUp,
        Key::ScrollDown,
    ];

    #[inline(always)]
    const fn bit(self) -> u64 {
        1 << self as u8
    }
}

/// A compact set of keys
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeySet(u64);

impl KeySet {
    pub const EMPTY: KeySet = KeySet(0);

    pub const fn of(keys: &[Key]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < keys.len() {
            bits |= keys[i].bit();
            i += 1;
        }
        Self(bits)
    }

    pub const fn contains(&self, key: Key) -> bool {
        self.0 & key.bit() != 0
    }

    /// Insert a key, returning whether it was newly added
    pub fn insert(&mut self, key: Key) -> bool {
        let added = !self.contains(key);
        self.0 |= key.bit();
        added
    }

    /// Remove a key, returning whether it was present
    pub fn remove(&mut self, key: Key) -> bool {
        let present = self.contains(key);
        self.0 &= !key.bit();
        present
    }

    pub const fn union(self, other: KeySet) -> KeySet {
        KeySet(self.0 | other.0)
    }

    pub const fn intersection(self, other: KeySet) -> KeySet {
        KeySet(self.0 & other.0)
    }

    pub const fn difference(self, other: KeySet) -> KeySet {
        KeySet(self.0 & !other.0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        Key::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl FromIterator<Key> for KeySet {
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        let mut set = KeySet::EMPTY;
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Mapping between addition masks and keys for one packet family.
///
/// Patterns within one bitmap never overlap. `empty` is the accumulator value
/// reported while none of the keys are held.
#[derive(Debug)]
pub struct KeyBitmap {
    entries: &'static [(u32, Key)],
    empty: u32,
}

impl KeyBitmap {
    /// Reduce an accumulator to the keys it reports.
    ///
    /// Fails with the unclassified bits if the value does not reduce to the
    /// idle sentinel.
    pub fn decode(&self, value: u32) -> Result<KeySet, u32> {
        let mut acc = value;
        let mut keys = KeySet::EMPTY;
        for &(pattern, key) in self.entries {
            if acc & pattern == pattern {
                acc &= !pattern;
                keys.insert(key);
            }
        }
        if acc == self.empty {
            Ok(keys)
        } else {
            Err(acc ^ self.empty)
        }
    }

    /// Build the accumulator that would report `keys`
    pub fn encode(&self, keys: KeySet) -> u32 {
        self.entries
            .iter()
            .filter(|(_, key)| keys.contains(*key))
            .fold(self.empty, |acc, (pattern, _)| acc | pattern)
    }

    pub fn pattern(&self, key: Key) -> Option<u32> {
        self.entries.iter().find(|(_, k)| *k == key).map(|(p, _)| *p)
    }

    pub fn key(&self, pattern: u32) -> Option<Key> {
        self.entries.iter().find(|(p, _)| *p == pattern).map(|(_, k)| *k)
    }

    /// All keys this bitmap can report
    pub fn universe(&self) -> KeySet {
        self.entries.iter().map(|(_, key)| *key).collect()
    }

    pub const fn empty(&self) -> u32 {
        self.empty
    }
}

/// G-keys, M-keys and light switch.
///
/// Received as `[0x02, lo, hi, flags]` and reassembled as
/// `flags << 16 | hi << 8 | lo`. The flags byte always carries 0x40.
pub static G_AND_M_KEYS: KeyBitmap = KeyBitmap {
    entries: &[
        (0x00_0001, Key::G01),
        (0x00_0002, Key::G02),
        (0x00_0004, Key::G03),
        (0x00_0008, Key::G04),
        (0x00_0010, Key::G05),
        (0x00_0020, Key::G06),
        (0x00_0040, Key::G07),
        (0x00_0080, Key::G08),
        (0x00_0100, Key::G09),
        (0x00_0200, Key::G10),
        (0x00_0400, Key::G11),
        (0x00_0800, Key::G12),
        (0x00_1000, Key::M1),
        (0x00_2000, Key::M2),
        (0x00_4000, Key::M3),
        (0x00_8000, Key::Mr),
        (0x08_0000, Key::Light),
    ],
    empty: 0x40_0000,
};

/// Multimedia keys, received as `[0x01, mask]`.
///
/// NEXT+SCROLL_UP: `[0x01, 0x21]`, after scroll stopped: `[0x01, 0x01]`,
/// after release: `[0x01, 0x00]`.
pub static MULTIMEDIA_KEYS: KeyBitmap = KeyBitmap {
    entries: &[
        (0x01, Key::Next),
        (0x02, Key::Prev),
        (0x04, Key::Stop),
        (0x08, Key::Play),
        (0x10, Key::Mute),
        (0x20, Key::ScrollUp),
        (0x40, Key::ScrollDown),
    ],
    empty: 0,
};

/// Display keys, received as `[mask, 0x80]`.
///
/// Pressing and holding UP and OK at the same time reports `[0x88, 0x80]`.
pub static DISPLAY_MENU_KEYS: KeyBitmap = KeyBitmap {
    entries: &[
        (0x01, Key::Settings),
        (0x02, Key::Back),
        (0x04, Key::Menu),
        (0x08, Key::Ok),
        (0x10, Key::Right),
        (0x20, Key::Left),
        (0x40, Key::Down),
        (0x80, Key::Up),
    ],
    empty: 0,
};

/// Report id of a multimedia key packet
pub const MULTIMEDIA_REPORT: u8 = 0x01;
/// Report id of a winkey switch packet, `[0x03, 0x01]` when winkey is off
pub const WINKEY_REPORT: u8 = 0x03;
/// Report id of a G/M key packet
pub const G_AND_M_REPORT: u8 = 0x02;

pub const WINKEY_KEYS: KeySet = KeySet::of(&[Key::WinkeySwitch]);
