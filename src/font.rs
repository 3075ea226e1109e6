//! Font style and variant codes.
//!
//! Styles are typed by users as free-form strings ("Semi-Bold Italic", "700",
//! "bold-italic"). Everything past the command line works with the canonical
//! [`StyleCode`] and [`Variant`] values defined here.

use std::{fmt, str::FromStr};

/// A font weight, indicating how dark it appears.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weight {
    Thin,
    ExtraLight,
    Light,
    Regular,
    Medium,
    SemiBold,
    Bold,
    ExtraBold,
    Black,
}

impl Default for Weight {
    fn default() -> Self {
        Self::Regular
    }
}

impl Weight {
    pub const ALL: [Weight; 9] = [
        Weight::Thin,
        Weight::ExtraLight,
        Weight::Light,
        Weight::Regular,
        Weight::Medium,
        Weight::SemiBold,
        Weight::Bold,
        Weight::ExtraBold,
        Weight::Black,
    ];

    /// The CSS / OS/2 number of this weight.
    pub fn to_number(self) -> u16 {
        match self {
            Weight::Thin => 100,
            Weight::ExtraLight => 200,
            Weight::Light => 300,
            Weight::Regular => 400,
            Weight::Medium => 500,
            Weight::SemiBold => 600,
            Weight::Bold => 700,
            Weight::ExtraBold => 800,
            Weight::Black => 900,
        }
    }

    /// Buckets an arbitrary numeric weight to the nearest named weight.
    pub fn from_number(number: u16) -> Self {
        match number {
            0..=149 => Weight::Thin,
            150..=249 => Weight::ExtraLight,
            250..=349 => Weight::Light,
            350..=449 => Weight::Regular,
            450..=549 => Weight::Medium,
            550..=649 => Weight::SemiBold,
            650..=749 => Weight::Bold,
            750..=849 => Weight::ExtraBold,
            _ => Weight::Black,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Weight::Thin => "thin",
            Weight::ExtraLight => "extra-light",
            Weight::Light => "light",
            Weight::Regular => "regular",
            Weight::Medium => "medium",
            Weight::SemiBold => "semi-bold",
            Weight::Bold => "bold",
            Weight::ExtraBold => "extra-bold",
            Weight::Black => "black",
        }
    }

    fn from_alias(alias: &str) -> Option<Self> {
        let weight = match alias {
            "thin" | "100" => Weight::Thin,
            "extra-light" | "extralight" | "200" => Weight::ExtraLight,
            "light" | "300" => Weight::Light,
            "regular" | "" | "400" | "0" => Weight::Regular,
            "medium" | "500" => Weight::Medium,
            "semi-bold" | "semibold" | "600" => Weight::SemiBold,
            "bold" | "700" => Weight::Bold,
            "extra-bold" | "extrabold" | "800" => Weight::ExtraBold,
            "black" | "900" => Weight::Black,
            _ => return None,
        };
        Some(weight)
    }
}

/// A canonical font style: one weight plus an
/// independent italic flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct StyleCode {
    pub weight: Weight,
    pub italic: bool,
}

impl StyleCode {
    pub const REGULAR: StyleCode = StyleCode::new(Weight::Regular, false);

    pub const fn new(weight: Weight, italic: bool) -> Self {
        Self { weight, italic }
    }

    pub fn weight(mut self, weight: Weight) -> Self {
        self.weight = weight;
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    /// Builds a style from a numeric weight as stored in font tables.
    pub fn from_numeric(weight: u16, italic: bool) -> Self {
        Self::new(Weight::from_number(weight), italic)
    }

    /// How far this style is from `other` when picking
    /// the closest available face. Slant dominates weight.
    pub fn distance(&self, other: &StyleCode) -> u32 {
        let slant = if self.italic == other.italic { 0 } else { 1000 };
        let weight = (i32::from(self.weight.to_number()) - i32::from(other.weight.to_number()))
            .unsigned_abs();
        slant + weight
    }
}

impl fmt::Display for StyleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.weight.name())?;
        if self.italic {
            f.write_str(" italic")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid font style {0:?}")]
pub struct InvalidStyle(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid font variant {0:?}")]
pub struct InvalidVariant(pub String);

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '-' || c == '_'
}

/// Removes every standalone `italic` word from `s`.
/// Returns the remaining text and whether anything was removed.
fn strip_italic(s: &str) -> (String, bool) {
    const WORD: &str = "italic";

    let mut rest = String::with_capacity(s.len());
    let mut found = false;
    let mut cursor = 0;
    while let Some(pos) = s[cursor..].find(WORD) {
        let start = cursor + pos;
        let end = start + WORD.len();
        let before = s[..start].chars().next_back().map_or(true, is_separator);
        let after = s[end..].chars().next().map_or(true, is_separator);
        if before && after {
            rest.push_str(&s[cursor..start]);
            rest.push(' ');
            found = true;
        } else {
            rest.push_str(&s[cursor..end]);
        }
        cursor = end;
    }
    rest.push_str(&s[cursor..]);
    (rest, found)
}

/// Collapses whitespace and underscores into single hyphens
/// and strips separators from both ends.
fn normalize_weight(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending = false;
    for c in s.chars() {
        if c.is_whitespace() || c == '_' {
            pending = true;
        } else {
            if pending && !out.is_empty() && !out.ends_with('-') && c != '-' {
                out.push('-');
            }
            pending = false;
            out.push(c);
        }
    }
    out.trim_matches('-').to_owned()
}

impl FromStr for StyleCode {
    type Err = InvalidStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (rest, italic) = strip_italic(&lower);
        let weight =
            Weight::from_alias(&normalize_weight(&rest)).ok_or_else(|| InvalidStyle(s.to_owned()))?;
        Ok(StyleCode::new(weight, italic))
    }
}

/// A typographic variant. Variants do not compose.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Variant {
    Normal,
    Subscript,
    Superscript,
    SmallCaps,
}

impl Default for Variant {
    fn default() -> Self {
        Self::Normal
    }
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Variant::Normal => "normal",
            Variant::Subscript => "subscript",
            Variant::Superscript => "superscript",
            Variant::SmallCaps => "small-caps",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = InvalidVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Variant::Normal),
            "subscript" => Ok(Variant::Subscript),
            "superscript" => Ok(Variant::Superscript),
            "small-caps" | "smallcaps" => Ok(Variant::SmallCaps),
            _ => Err(InvalidVariant(s.to_owned())),
        }
    }
}
