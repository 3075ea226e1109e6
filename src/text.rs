//! Specimen text: templates and the sized lines they produce.

use crate::{font::StyleCode, record::FontRecord};

pub mod template;

pub use template::{Context, ExecError, Template, TemplateSyntaxError, DEFAULT_TEMPLATE};

/// Delimits a per-line size override in template output: `\0<points>\0`.
pub const SIZE_MARKER: char = '\0';

/// One line of specimen text and the point size to set it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLine {
    pub text: String,
    pub size: u32,
}

/// Splits template output into lines, applying leading size markers.
///
/// A marker whose number does not fit is still removed; the line
/// keeps `default_size`.
pub fn split_lines(output: &str, default_size: u32) -> Vec<TemplateLine> {
    output
        .split('\n')
        .map(|line| {
            let (size, text) = match strip_marker(line) {
                Some((digits, rest)) => (
                    digits
                        .parse::<u32>()
                        .ok()
                        .filter(|size| *size > 0)
                        .unwrap_or(default_size),
                    rest,
                ),
                None => (default_size, line),
            };
            TemplateLine {
                text: text.trim().to_owned(),
                size,
            }
        })
        .collect()
}

fn strip_marker(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(SIZE_MARKER)?;
    let end = rest.find(SIZE_MARKER)?;
    let digits = &rest[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits, &rest[end + SIZE_MARKER.len_utf8()..]))
}

impl Context {
    /// The values a template sees for `record`.
    ///
    /// Names come from the loaded face when available. The style falls back
    /// to `requested` for faces that carry no style name.
    pub fn for_font(record: &FontRecord, requested: StyleCode, size: u32) -> Self {
        Self {
            name: record.display_name().to_owned(),
            style: record
                .names()
                .map(|names| names.style_name.clone())
                .filter(|style| !style.is_empty())
                .unwrap_or_else(|| requested.to_string()),
            sample: record
                .names()
                .and_then(|names| names.sample_text.clone())
                .unwrap_or_default(),
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::font::Weight;

    use super::*;

    fn line(text: &str, size: u32) -> TemplateLine {
        TemplateLine {
            text: text.to_owned(),
            size,
        }
    }

    #[test]
    fn size_override() {
        assert_eq!(
            split_lines("a\n\u{0}72\u{0}b", 48),
            [line("a", 48), line("b", 72)]
        );
    }

    #[test]
    fn size_override_from_template() {
        let template = Template::compile("first\n{{ size 72 }}second\n  third  ").unwrap();
        let context = Context {
            name: String::new(),
            style: String::new(),
            sample: String::new(),
            size: 48,
        };
        assert_eq!(
            template.execute(&context, 48).unwrap(),
            [line("first", 48), line("second", 72), line("third", 48)]
        );
    }

    #[test]
    fn malformed_markers() {
        assert_eq!(
            split_lines("\u{0}99999999999\u{0}huge", 48),
            [line("huge", 48)]
        );
        assert_eq!(split_lines("\u{0}0\u{0}zero", 48), [line("zero", 48)]);
        // Not a marker: left in place.
        assert_eq!(split_lines("\u{0}x\u{0}y", 48)[0].size, 48);
        assert_eq!(split_lines("mid \u{0}72\u{0}", 48)[0].size, 48);
    }

    #[test]
    fn empty_lines_are_kept() {
        assert_eq!(
            split_lines("a\n\nb\n", 12),
            [line("a", 12), line("", 12), line("b", 12), line("", 12)]
        );
    }

    #[test]
    fn context_before_load() {
        let record = FontRecord::from_path("/fonts/SourceSerif-Bold.otf");
        let context = Context::for_font(&record, StyleCode::new(Weight::Bold, true), 36);
        assert_eq!(context.name, "Source Serif Bold");
        assert_eq!(context.style, "bold italic");
        assert_eq!(context.sample, "");
        assert_eq!(context.size, 36);
    }
}
