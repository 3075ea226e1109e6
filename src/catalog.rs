//! The catalog of installed fonts.
//!
//! Discovery is delegated to `fontdb`, which knows the platform font
//! directories. The catalog groups the discovered faces by family and
//! canonical style key and is read-only once built.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::font::StyleCode;

/// Metadata for one installed face, as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontMetadata {
    pub path: PathBuf,
    /// Face index inside a collection file.
    pub index: u32,
    pub family: String,
    pub style: StyleCode,
}

impl FontMetadata {
    pub fn new(path: impl Into<PathBuf>, family: impl Into<String>, style: StyleCode) -> Self {
        Self {
            path: path.into(),
            index: 0,
            family: family.into(),
            style,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// The key this face is stored under within its family.
    pub fn style_key(&self) -> String {
        self.style.to_string()
    }
}

/// Styles of one family, keyed by canonical style string.
pub type Styles = BTreeMap<String, FontMetadata>;

/// Installed fonts: `family -> style key -> metadata`.
///
/// Both levels iterate in ascending byte order of their keys.
#[derive(Debug, Clone, Default)]
pub struct FontCatalog {
    families: BTreeMap<String, Styles>,
}

impl FontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans the platform font directories.
    pub fn discover() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let catalog = Self::from_database(&db);
        log::info!(
            "Discovered {} font families ({} faces)",
            catalog.families.len(),
            catalog.len()
        );
        catalog
    }

    pub fn from_database(db: &fontdb::Database) -> Self {
        let mut catalog = Self::new();
        for face in db.faces() {
            let path = match &face.source {
                fontdb::Source::File(path) => path.clone(),
                _ => continue,
            };
            let family = match face.families.first() {
                Some((family, _)) => family.clone(),
                None => {
                    log::debug!("Skipping face without a family name: {}", path.display());
                    continue;
                }
            };
            let italic = !matches!(face.style, fontdb::Style::Normal);
            let style = StyleCode::from_numeric(face.weight.0, italic);
            catalog.insert(FontMetadata::new(path, family, style).with_index(face.index));
        }
        catalog
    }

    /// Adds a face. When the family already has a face under the same
    /// style key, the one with the smaller `(path, index)` is kept.
    pub fn insert(&mut self, metadata: FontMetadata) {
        let styles = self.families.entry(metadata.family.clone()).or_default();
        let key = metadata.style_key();
        match styles.get(&key) {
            Some(existing) if (&existing.path, existing.index) <= (&metadata.path, metadata.index) => {}
            _ => {
                styles.insert(key, metadata);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Number of faces in the catalog.
    pub fn len(&self) -> usize {
        self.families.values().map(BTreeMap::len).sum()
    }

    /// Families in ascending order.
    pub fn families(&self) -> impl Iterator<Item = (&str, &Styles)> {
        self.families.iter().map(|(family, styles)| (family.as_str(), styles))
    }

    pub fn styles(&self, family: &str) -> Option<&Styles> {
        self.families.get(family)
    }

    /// Finds the face best matching a family or face name.
    ///
    /// Families are tried by exact name, then by prefix, then by substring
    /// (all ignoring case and punctuation). If none match, trailing words
    /// that spell a style ("Open Sans Bold Italic") are split off and used
    /// instead of `style`.
    pub fn find(&self, name: &str, style: StyleCode) -> Option<&FontMetadata> {
        if let Some(styles) = self.find_family(name) {
            return closest_style(styles, style);
        }

        let words: Vec<&str> = name.split_whitespace().collect();
        for split in 1..words.len() {
            let suffix = words[split..].join(" ");
            if let Ok(parsed) = suffix.parse::<StyleCode>() {
                if let Some(styles) = self.find_family(&words[..split].join(" ")) {
                    return closest_style(styles, parsed);
                }
            }
        }
        None
    }

    fn find_family(&self, name: &str) -> Option<&Styles> {
        let query = normalize(name);
        if query.is_empty() {
            return None;
        }

        let normalized: Vec<(String, &Styles)> = self
            .families
            .iter()
            .map(|(family, styles)| (normalize(family), styles))
            .collect();

        if let Some((_, styles)) = normalized.iter().find(|(family, _)| *family == query) {
            return Some(*styles);
        }

        shortest(
            normalized
                .iter()
                .filter(|(family, _)| family.starts_with(&query)),
        )
        .or_else(|| {
            shortest(
                normalized
                    .iter()
                    .filter(|(family, _)| family.contains(&query)),
            )
        })
    }
}

// `min_by_key` keeps the first minimum, so ties go to the
// alphabetically first family.
fn shortest<'v, 's: 'v>(
    candidates: impl Iterator<Item = &'v (String, &'s Styles)>,
) -> Option<&'s Styles> {
    candidates
        .min_by_key(|(family, _)| family.len())
        .map(|(_, styles)| *styles)
}

fn closest_style(styles: &Styles, style: StyleCode) -> Option<&FontMetadata> {
    styles
        .get(&style.to_string())
        .or_else(|| styles.values().min_by_key(|md| md.style.distance(&style)))
}

/// Lower-cases and drops everything but letters and digits.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromIterator<FontMetadata> for FontCatalog {
    fn from_iter<I: IntoIterator<Item = FontMetadata>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for metadata in iter {
            catalog.insert(metadata);
        }
        catalog
    }
}

/// Whether a file name carries one of the font extensions we can open.
pub fn has_font_extension(path: &Path) -> bool {
    const EXTENSIONS: [&str; 6] = ["ttf", "ttc", "otf", "woff", "woff2", "sfnt"];

    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
        })
}
