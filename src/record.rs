//! Font records: candidate faces produced by matching.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use once_cell::sync::OnceCell;
use ttf_parser::name_id;

use crate::{catalog::FontMetadata, font::StyleCode};

/// Names and style bits read from a face's own tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceNames {
    pub family: String,
    pub style_name: String,
    pub sample_text: Option<String>,
    pub style: StyleCode,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {} as font data: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// A font face selected for rendering.
///
/// Records start out with whatever is known without opening the file:
/// the catalog's family and style key, or a family guessed from the
/// file name. The face's own names are read on the first successful
/// [`load`](FontRecord::load) and never change afterwards.
#[derive(Debug)]
pub struct FontRecord {
    path: PathBuf,
    index: u32,
    family: String,
    style_key: Option<String>,
    names: OnceCell<FaceNames>,
}

impl FontRecord {
    pub fn from_metadata(metadata: &FontMetadata) -> Self {
        let family = if metadata.family.is_empty() {
            family_from_path(&metadata.path)
        } else {
            metadata.family.clone()
        };
        Self {
            path: metadata.path.clone(),
            index: metadata.index,
            family,
            style_key: Some(metadata.style_key()),
            names: OnceCell::new(),
        }
    }

    /// A record for a font file given directly by path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            family: family_from_path(&path),
            path,
            index: 0,
            style_key: None,
            names: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// The family known before loading.
    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn style_key(&self) -> Option<&str> {
        self.style_key.as_deref()
    }

    /// The face's own names, if it has been loaded.
    pub fn names(&self) -> Option<&FaceNames> {
        self.names.get()
    }

    /// The best name available: the loaded family name, else the provisional one.
    pub fn display_name(&self) -> &str {
        self.names()
            .map(|names| names.family.as_str())
            .filter(|family| !family.is_empty())
            .unwrap_or(&self.family)
    }

    /// The loaded style name, else the catalog style key.
    pub fn style_label(&self) -> Option<&str> {
        self.names()
            .map(|names| names.style_name.as_str())
            .filter(|style| !style.is_empty())
            .or_else(|| self.style_key())
    }

    /// Reads and parses the font file.
    ///
    /// The file handle is closed before this returns. The first successful
    /// call also records the face's names.
    pub fn load(&self) -> Result<LoadedFace, LoadError> {
        let data = fs::read(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let face = ttf_parser::Face::parse(&data, self.index).map_err(|err| {
            LoadError::Malformed {
                path: self.path.clone(),
                reason: err.to_string(),
            }
        })?;

        let names = self.names.get_or_init(|| {
            let names = read_names(&face);
            log::info!("Loaded font '{}' ({})", names.family, self.path.display());
            names
        });
        Ok(LoadedFace {
            style: names.style,
            index: self.index,
            data,
        })
    }
}

/// `"<name> (<style>)": <path>`, or without the style when none is known.
impl fmt::Display for FontRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.style_label() {
            Some(style) => format!("{} ({})", self.display_name(), style),
            None => self.display_name().to_owned(),
        };
        write!(f, "{:?}: {}", name, self.path.display())
    }
}

/// The bytes of a loaded face, ready for rasterization.
#[derive(Debug)]
pub struct LoadedFace {
    pub data: Vec<u8>,
    pub index: u32,
    /// The style the face actually has.
    pub style: StyleCode,
}

fn read_names(face: &ttf_parser::Face) -> FaceNames {
    let family = find_name(face, &[name_id::TYPOGRAPHIC_FAMILY, name_id::FAMILY]);
    let style_name = find_name(face, &[name_id::TYPOGRAPHIC_SUBFAMILY, name_id::SUBFAMILY]);
    let sample_text = find_name(face, &[name_id::SAMPLE_TEXT]);
    FaceNames {
        family: family.unwrap_or_default(),
        style_name: style_name.unwrap_or_default(),
        sample_text,
        style: StyleCode::from_numeric(face.weight().to_number(), face.is_italic()),
    }
}

/// Returns the first decodable name for the given IDs, preferring English.
fn find_name(face: &ttf_parser::Face, ids: &[u16]) -> Option<String> {
    const ENGLISH_US: u16 = 0x0409;

    ids.iter().find_map(|&id| {
        let candidates: Vec<_> = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == id && name.is_unicode())
            .collect();
        candidates
            .iter()
            .find(|name| name.language_id == ENGLISH_US)
            .and_then(|name| name.to_string())
            .or_else(|| candidates.iter().find_map(|name| name.to_string()))
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    })
}

/// Guesses a family name from a font file name.
pub fn family_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    title_case(&stem)
}

/// Splits a file-name-like string into words:
/// `DejaVuSans-Bold` becomes `Deja Vu Sans Bold`.
pub fn title_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 8);
    let mut prev: Option<char> = None;

    for (i, &c) in chars.iter().enumerate() {
        let mut c = c;
        let prev_lower = prev.map_or(false, char::is_lowercase);
        let prev_upper = prev.map_or(false, char::is_uppercase);

        if prev_lower && c.is_uppercase() {
            out.push(' ');
        } else if !c.is_alphabetic() {
            c = ' ';
        }
        let next_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
        if prev_upper && c.is_uppercase() && next_lower {
            out.push(' ');
        }

        out.push(c);
        prev = Some(c);
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use crate::font::Weight;

    use super::*;

    #[test]
    fn title_casing() {
        assert_eq!(title_case("DejaVuSans-Bold"), "Deja Vu Sans Bold");
        assert_eq!(title_case("OpenSans_Regular"), "Open Sans Regular");
        assert_eq!(title_case("HTMLFont"), "HTML Font");
        assert_eq!(title_case("Roboto2"), "Roboto");
        assert_eq!(title_case("noto--sans  mono"), "noto sans mono");
        assert_eq!(title_case("ABC"), "ABC");
        assert_eq!(title_case("123"), "");
    }

    #[test]
    fn provisional_family() {
        let record = FontRecord::from_path("/tmp/fonts/SourceCodePro-Medium.otf");
        assert_eq!(record.family(), "Source Code Pro Medium");
        assert_eq!(record.display_name(), "Source Code Pro Medium");
        assert_eq!(record.style_label(), None);
        assert!(record.names().is_none());
        assert_eq!(
            record.to_string(),
            "\"Source Code Pro Medium\": /tmp/fonts/SourceCodePro-Medium.otf"
        );
    }

    #[test]
    fn catalog_record() {
        let md = FontMetadata::new(
            "/usr/share/fonts/Inter-BoldItalic.otf",
            "Inter",
            StyleCode::new(Weight::Bold, true),
        );
        let record = FontRecord::from_metadata(&md);
        assert_eq!(record.style_label(), Some("bold italic"));
        assert_eq!(
            record.to_string(),
            "\"Inter (bold italic)\": /usr/share/fonts/Inter-BoldItalic.otf"
        );
    }

    #[test]
    fn missing_file() {
        let record = FontRecord::from_path("/nonexistent/fv/Missing.ttf");
        assert!(matches!(record.load(), Err(LoadError::Io { .. })));
        assert!(record.names().is_none());
    }

    #[test]
    fn garbage_file() {
        let path = std::env::temp_dir().join(format!("fv-garbage-{}.ttf", fastrand::u64(..)));
        fs::write(&path, b"definitely not a font").unwrap();
        let record = FontRecord::from_path(&path);
        let result = record.load();
        fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(LoadError::Malformed { .. })));
        assert!(record.names().is_none());
    }
}
