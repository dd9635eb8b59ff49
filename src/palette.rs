use image::Rgb;

use crate::error::{FaceError, Result};

/// Colors handed out to the first ten faces of a session, in order.
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#a6cee3", "#1f78b4", "#b2df8a", "#33a02c", "#fb9a99", "#e31a1c", "#fdbf6f", "#ff7f00",
    "#cab2d6", "#6a3d9a",
];

/// Fixed, ordered color table. `assign` cycles through it by ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
    keys: Vec<String>,
}

impl Palette {
    /// Builds a palette from parallel color / key lists.
    pub fn new(colors: Vec<Rgb<u8>>, keys: Vec<String>) -> Result<Self> {
        if colors.is_empty() {
            return Err(FaceError::InvalidPalette("palette is empty".into()));
        }
        if colors.len() != keys.len() {
            return Err(FaceError::InvalidPalette(format!(
                "{} colors but {} color keys",
                colors.len(),
                keys.len()
            )));
        }
        Ok(Self { colors, keys })
    }

    /// Builds a palette from `#rrggbb` strings, using each string as its own key.
    pub fn from_hex<S: AsRef<str>>(hex: &[S]) -> Result<Self> {
        let colors = hex
            .iter()
            .map(|h| parse_hex(h.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let keys = hex.iter().map(|h| h.as_ref().to_string()).collect();
        Self::new(colors, keys)
    }

    /// Color for the `ordinal`-th identity of a session.
    pub fn assign(&self, ordinal: usize) -> (Rgb<u8>, String) {
        let idx = ordinal % self.colors.len();
        (self.colors[idx], self.keys[idx].clone())
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        let colors = DEFAULT_PALETTE
            .iter()
            .filter_map(|h| parse_hex(h).ok())
            .collect();
        let keys = DEFAULT_PALETTE.iter().map(|h| h.to_string()).collect();
        Self { colors, keys }
    }
}

/// Parses `#rrggbb` (leading `#` optional).
pub fn parse_hex(hex: &str) -> Result<Rgb<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(FaceError::InvalidPalette(format!("bad color {hex:?}")));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| FaceError::InvalidPalette(format!("bad color {hex:?}")))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}
