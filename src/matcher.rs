//! Resolving user queries to font records.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{
    catalog::{has_font_extension, FontCatalog},
    font::StyleCode,
    record::FontRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("unable to locate font {0:?}")]
    NotFound(String),
    #[error("no font files in directory {}", .0.display())]
    EmptyDirectory(PathBuf),
    #[error("unable to open directory {}: {source}", path.display())]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves one query to the fonts it names.
///
/// A query is a path to a font file, a directory of font files, or a
/// family/face name looked up in `catalog` with the requested `style`.
pub fn resolve(
    query: &str,
    style: StyleCode,
    catalog: &FontCatalog,
) -> Result<Vec<FontRecord>, LookupError> {
    let path = expand_home(query);
    match fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => scan_directory(&path),
        Ok(_) => Ok(vec![FontRecord::from_path(path)]),
        Err(_) => match_name(query, style, catalog)
            .map(|record| vec![record])
            .ok_or_else(|| LookupError::NotFound(query.to_owned())),
    }
}

/// Looks a family or face name up in the catalog.
pub fn match_name(name: &str, style: StyleCode, catalog: &FontCatalog) -> Option<FontRecord> {
    catalog.find(name, style).map(FontRecord::from_metadata)
}

/// Every face in the catalog, by family and then style key.
pub fn render_all(catalog: &FontCatalog) -> Vec<FontRecord> {
    catalog
        .families()
        .flat_map(|(_, styles)| styles.values())
        .map(FontRecord::from_metadata)
        .collect()
}

/// Font files directly inside `dir`, ordered by case-insensitive family name.
fn scan_directory(dir: &Path) -> Result<Vec<FontRecord>, LookupError> {
    let unreadable = |source| LookupError::UnreadableDirectory {
        path: dir.to_owned(),
        source,
    };

    let mut records = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if entry.file_type().map_or(true, |ty| ty.is_dir()) || !has_font_extension(&path) {
            continue;
        }
        records.push(FontRecord::from_path(path));
    }

    if records.is_empty() {
        return Err(LookupError::EmptyDirectory(dir.to_owned()));
    }

    records.sort_by_cached_key(|record| (record.family().to_lowercase(), record.path().to_owned()));
    Ok(records)
}

fn expand_home(query: &str) -> PathBuf {
    match (query.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(query),
    }
}
