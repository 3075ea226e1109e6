//! Rasterization of specimen lines into a trimmed, padded image.

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use glam::{IVec2, UVec2};
use image::{Rgba, RgbaImage};
use palette::Srgba;

use crate::{
    font::{StyleCode, Variant},
    record::LoadedFace,
    specimen::RenderParams,
    text::TemplateLine,
};

/// Scale applied to subscript and superscript runs.
pub const SCRIPT_SCALE: f32 = 0.583;
/// Scale applied to lower-case letters in small-caps runs.
pub const SMALL_CAPS_SCALE: f32 = 0.8;
/// Horizontal shift per pixel of height for synthesized italics.
pub const FAUX_ITALIC_SHEAR: f32 = 0.2;

const SUBSCRIPT_SHIFT: f32 = 0.14;
const SUPERSCRIPT_SHIFT: f32 = -0.33;

/// Largest line height, margin or image side, in pixels.
pub const MAX_DIMENSION: u32 = 1 << 14;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("unable to rasterize font: {0}")]
    Font(String),
    #[error("no glyphs to render")]
    NoGlyphs,
    #[error("specimen would exceed {} pixels on a side", MAX_DIMENSION)]
    TooLarge,
}

/// Converts a point size to pixels at `dpi`.
pub fn points_to_pixels(points: u32, dpi: u32) -> f32 {
    points as f32 * dpi as f32 / 72.0
}

/// Converts a margin in millimetres to whole pixels at `dpi`.
pub fn margin_to_pixels(millimetres: u32, dpi: u32) -> u32 {
    (millimetres as f32 * dpi as f32 / 25.4).round() as u32
}

/// A rasterized glyph placed on the page.
struct Placed {
    pos: IVec2,
    size: UVec2,
    coverage: Vec<u8>,
    baseline: f32,
}

/// Synthesized styling for faces that lack the requested style.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Faux {
    shear: f32,
    embolden: u32,
}

impl Faux {
    fn new(requested: StyleCode, actual: StyleCode, px: f32) -> Self {
        let shear = if requested.italic && !actual.italic {
            FAUX_ITALIC_SHEAR
        } else {
            0.0
        };
        let lighter_by = requested
            .weight
            .to_number()
            .saturating_sub(actual.weight.to_number());
        let embolden = if lighter_by == 0 {
            0
        } else {
            ((px * f32::from(lighter_by) / 1000.0 * 0.1).round() as u32).max(1)
        };
        Self { shear, embolden }
    }

    fn offset(&self, baseline: f32, y: i32) -> i32 {
        (self.shear * (baseline - y as f32)).round() as i32
    }
}

/// Renders `lines` set in `face` onto a background-filled image.
///
/// Runs are stacked top to bottom; empty lines take no space. The result
/// is cropped to the ink and padded by the configured margin.
pub fn rasterize(
    face: &LoadedFace,
    lines: &[TemplateLine],
    params: &RenderParams,
) -> Result<RgbaImage, RenderError> {
    let font = fontdue::Font::from_bytes(
        &face.data[..],
        fontdue::FontSettings {
            collection_index: face.index,
            ..Default::default()
        },
    )
    .map_err(|e| RenderError::Font(e.to_owned()))?;

    let largest = lines.iter().map(|line| line.size).max().unwrap_or(params.size);
    let largest_px = points_to_pixels(largest, params.dpi);
    let margin = margin_to_pixels(params.margin, params.dpi);
    if largest_px > MAX_DIMENSION as f32 || margin > MAX_DIMENSION {
        return Err(RenderError::TooLarge);
    }
    let faux = Faux::new(params.style, face.style, largest_px);

    let mut layout: Layout = Layout::new(CoordinateSystem::PositiveYDown);
    let mut placed = Vec::new();
    let mut cursor = 0.0f32;
    for line in lines.iter().filter(|line| !line.text.is_empty()) {
        let px = points_to_pixels(line.size, params.dpi);
        let metrics = font
            .horizontal_line_metrics(px)
            .ok_or_else(|| RenderError::Font("missing horizontal metrics".to_owned()))?;

        let runs = variant_runs(&line.text, params.variant, px);
        layout.reset(&LayoutSettings::default());
        for (text, run_px) in &runs {
            layout.append(&[&font], &TextStyle::new(text, *run_px, 0));
        }
        let layout_baseline = match layout.lines().and_then(|lines| lines.first()) {
            Some(line) => line.baseline_y,
            None => continue,
        };

        let shift = match params.variant {
            Variant::Subscript => SUBSCRIPT_SHIFT * px,
            Variant::Superscript => SUPERSCRIPT_SHIFT * px,
            Variant::Normal | Variant::SmallCaps => 0.0,
        };
        let baseline = cursor + metrics.ascent + shift;

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (glyph_metrics, coverage) = font.rasterize_config(glyph.key);
            let top = baseline + (glyph.y - layout_baseline);
            placed.push(Placed {
                pos: position(glyph.x, top)?,
                size: UVec2::new(glyph_metrics.width as u32, glyph_metrics.height as u32),
                coverage,
                baseline,
            });
        }

        cursor += metrics.new_line_size;
    }

    let coverage = compose(&placed, faux)?;
    paint(&coverage, margin, params)
}

/// Rounds a glyph origin, rejecting ones too far out to offset safely.
fn position(x: f32, y: f32) -> Result<IVec2, RenderError> {
    const LIMIT: f32 = (1 << 28) as f32;
    if x.abs() > LIMIT || y.abs() > LIMIT {
        return Err(RenderError::TooLarge);
    }
    Ok(IVec2::new(x.round() as i32, y.round() as i32))
}

/// Splits a line into `(text, px)` runs for `variant`.
fn variant_runs(text: &str, variant: Variant, px: f32) -> Vec<(String, f32)> {
    match variant {
        Variant::Normal => vec![(text.to_owned(), px)],
        Variant::Subscript | Variant::Superscript => vec![(text.to_owned(), px * SCRIPT_SCALE)],
        Variant::SmallCaps => {
            let mut runs: Vec<(String, f32, bool)> = Vec::new();
            for c in text.chars() {
                let lower = c.is_lowercase();
                match runs.last_mut() {
                    Some((run, _, run_lower)) if *run_lower == lower => run.extend(c.to_uppercase()),
                    _ => {
                        let run_px = if lower { px * SMALL_CAPS_SCALE } else { px };
                        runs.push((c.to_uppercase().collect(), run_px, lower));
                    }
                }
            }
            runs.into_iter().map(|(run, px, _)| (run, px)).collect()
        }
    }
}

/// A single-channel coverage buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Coverage {
    size: UVec2,
    data: Vec<u8>,
}

impl Coverage {
    fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.size.x + x) as usize]
    }
}

/// Blits placed glyphs into one coverage buffer cropped to the ink.
fn compose(placed: &[Placed], faux: Faux) -> Result<Coverage, RenderError> {
    let mut min = IVec2::splat(i32::MAX);
    let mut max = IVec2::splat(i32::MIN);
    for glyph in placed {
        let bottom = glyph.pos.y + glyph.size.y as i32;
        let top_offset = faux.offset(glyph.baseline, glyph.pos.y);
        let bottom_offset = faux.offset(glyph.baseline, bottom);
        min = min.min(IVec2::new(glyph.pos.x + top_offset.min(bottom_offset), glyph.pos.y));
        max = max.max(IVec2::new(
            glyph.pos.x + glyph.size.x as i32 + top_offset.max(bottom_offset) + faux.embolden as i32,
            bottom,
        ));
    }
    if placed.is_empty() || max.x <= min.x || max.y <= min.y {
        return Err(RenderError::NoGlyphs);
    }

    let size = UVec2::new(span(min.x, max.x)?, span(min.y, max.y)?);
    let mut data = vec![0u8; (size.x * size.y) as usize];
    for glyph in placed {
        for gy in 0..glyph.size.y {
            let y = glyph.pos.y + gy as i32;
            let row_x = glyph.pos.x + faux.offset(glyph.baseline, y) - min.x;
            let row = ((y - min.y) as u32 * size.x) as usize;
            for gx in 0..glyph.size.x {
                let value = glyph.coverage[(gy * glyph.size.x + gx) as usize];
                if value == 0 {
                    continue;
                }
                let x = (row_x + gx as i32) as u32;
                for dx in 0..=faux.embolden {
                    let cell = &mut data[row + (x + dx) as usize];
                    *cell = (*cell).max(value);
                }
            }
        }
    }

    crop(&Coverage { size, data }).ok_or(RenderError::NoGlyphs)
}

/// `max - min` as a side length no larger than [`MAX_DIMENSION`].
fn span(min: i32, max: i32) -> Result<u32, RenderError> {
    u32::try_from(i64::from(max) - i64::from(min))
        .ok()
        .filter(|&side| side <= MAX_DIMENSION)
        .ok_or(RenderError::TooLarge)
}

fn crop(coverage: &Coverage) -> Option<Coverage> {
    let mut min = UVec2::splat(u32::MAX);
    let mut max = UVec2::ZERO;
    for y in 0..coverage.size.y {
        for x in 0..coverage.size.x {
            if coverage.get(x, y) > 0 {
                min = min.min(UVec2::new(x, y));
                max = max.max(UVec2::new(x + 1, y + 1));
            }
        }
    }
    if max.x <= min.x || max.y <= min.y {
        return None;
    }

    let size = max - min;
    let mut data = Vec::with_capacity((size.x * size.y) as usize);
    for y in min.y..max.y {
        for x in min.x..max.x {
            data.push(coverage.get(x, y));
        }
    }
    Some(Coverage { size, data })
}

/// Fills the background, then composites the foreground through `coverage`.
fn paint(
    coverage: &Coverage,
    margin: u32,
    params: &RenderParams,
) -> Result<RgbaImage, RenderError> {
    let size = coverage.size + UVec2::splat(margin * 2);
    if size.max_element() > MAX_DIMENSION {
        return Err(RenderError::TooLarge);
    }
    let mut image = RgbaImage::from_pixel(size.x, size.y, to_pixel(params.bg));
    for y in 0..coverage.size.y {
        for x in 0..coverage.size.x {
            let value = coverage.get(x, y);
            if value == 0 {
                continue;
            }
            let pixel = image.get_pixel_mut(x + margin, y + margin);
            *pixel = blend(params.fg, *pixel, value);
        }
    }
    Ok(image)
}

fn to_pixel(color: Srgba<u8>) -> Rgba<u8> {
    Rgba([color.red, color.green, color.blue, color.alpha])
}

/// Straight-alpha "over" of `fg` scaled by `coverage` onto `bg`.
fn blend(fg: Srgba<u8>, bg: Rgba<u8>, coverage: u8) -> Rgba<u8> {
    let fa = f32::from(coverage) / 255.0 * f32::from(fg.alpha) / 255.0;
    let ba = f32::from(bg[3]) / 255.0;
    let out_a = fa + ba * (1.0 - fa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |f: u8, b: u8| {
        let c = (f32::from(f) * fa + f32::from(b) * ba * (1.0 - fa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(fg.red, bg[0]),
        channel(fg.green, bg[1]),
        channel(fg.blue, bg[2]),
        (out_a * 255.0).round() as u8,
    ])
}
