//! Musical keys and circle-of-fifths compatibility.
//!
//! A key is compatible with itself, with its relative major/minor (same pitch
//! collection) and with its dominant and subdominant in the same mode. The table is
//! precomputed once; every relation is inserted in both directions, so it is
//! reflexive and symmetric by construction.

use std::fmt;

/// Number of distinct keys: 12 pitch classes in two modes.
pub const KEY_COUNT: usize = 24;

const PITCH_NAMES: [&str; 12] = [
    "C", "D\u{266d}", "D", "E\u{266d}", "E", "F", "F\u{266f}", "G", "A\u{266d}", "A", "B\u{266d}", "B",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    Minor,
}

/// One of the 24 keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pitch_class: u8,
    mode: Mode,
}

impl Key {
    /// Builds a key from a pitch class (0 = C, 1 = C♯/D♭, ..., 11 = B).
    #[must_use]
    pub fn new(pitch_class: u8, mode: Mode) -> Option<Self> {
        (pitch_class < 12).then_some(Self { pitch_class, mode })
    }

    /// Converts catalog notation: `key` -1 means "not detected", `mode` 1 is major.
    #[must_use]
    pub fn from_spotify_notation(key: i32, mode: i32) -> Option<Self> {
        let pitch_class = u8::try_from(key).ok()?;
        let mode = if mode == 1 { Mode::Major } else { Mode::Minor };
        Self::new(pitch_class, mode)
    }

    /// Dense index in `0..KEY_COUNT`.
    #[must_use]
    pub const fn index(self) -> usize {
        let mode = match self.mode {
            Mode::Major => 0,
            Mode::Minor => 1,
        };
        self.pitch_class as usize * 2 + mode
    }

    /// Inverse of [`Key::index`].
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        let pitch_class = u8::try_from(index / 2).ok()?;
        let mode = if index % 2 == 0 { Mode::Major } else { Mode::Minor };
        Self::new(pitch_class, mode)
    }

    #[must_use]
    pub const fn pitch_class(self) -> u8 {
        self.pitch_class
    }

    #[must_use]
    pub const fn mode(self) -> Mode {
        self.mode
    }

    /// Relative major of a minor key and vice versa.
    #[must_use]
    pub const fn relative(self) -> Self {
        match self.mode {
            Mode::Major => Self { pitch_class: (self.pitch_class + 9) % 12, mode: Mode::Minor },
            Mode::Minor => Self { pitch_class: (self.pitch_class + 3) % 12, mode: Mode::Major },
        }
    }

    /// A perfect fifth up, same mode.
    #[must_use]
    pub const fn dominant(self) -> Self {
        Self { pitch_class: (self.pitch_class + 7) % 12, mode: self.mode }
    }

    /// A perfect fifth down, same mode.
    #[must_use]
    pub const fn subdominant(self) -> Self {
        Self { pitch_class: (self.pitch_class + 5) % 12, mode: self.mode }
    }

    /// Whether a transition between `self` and `other` is harmonically smooth.
    #[must_use]
    pub fn is_compatible(self, other: Key) -> bool {
        KEY_COMPATIBILITY[self.index()][other.index()]
    }

    /// All 24 keys in index order.
    pub fn all() -> impl Iterator<Item = Key> {
        (0..KEY_COUNT).filter_map(Key::from_index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = PITCH_NAMES[usize::from(self.pitch_class)];
        match self.mode {
            Mode::Major => write!(f, "{name}"),
            Mode::Minor => write!(f, "{}", name.to_lowercase()),
        }
    }
}

fn build_compatibility_table() -> [[bool; KEY_COUNT]; KEY_COUNT] {
    let mut table = [[false; KEY_COUNT]; KEY_COUNT];
    let mut relate = |a: Key, b: Key| {
        table[a.index()][b.index()] = true;
        table[b.index()][a.index()] = true;
    };

    for key in Key::all() {
        relate(key, key);
        relate(key, key.relative());
        relate(key, key.dominant());
        relate(key, key.subdominant());
    }

    table
}

lazy_static::lazy_static! {
    /// Precomputed compatibility relation, indexed by [`Key::index`].
    static ref KEY_COMPATIBILITY: [[bool; KEY_COUNT]; KEY_COUNT] = build_compatibility_table();
}
