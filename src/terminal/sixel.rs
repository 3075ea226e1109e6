//! DEC sixel graphics.
//!
//! Images are reduced to a fixed 240-color palette (a 6x6x6 cube plus a
//! 24-step grey ramp) with Floyd-Steinberg dithering. Pixels that are
//! mostly transparent are left unpainted.

use std::fmt::Write as _;

use image::{
    imageops::{self, ColorMap},
    GrayImage, Rgb, RgbImage, RgbaImage,
};

use super::{Encode, EncodeError};

const CUBE_LEVELS: u8 = 6;
const CUBE_STEP: u8 = 51;
const CUBE_SIZE: usize = 216;
const GREY_LEVELS: usize = 24;

/// Bands are six pixels tall.
const BAND: u32 = 6;

/// The fixed sixel palette.
#[derive(Debug, Default, Copy, Clone)]
pub struct Palette;

impl Palette {
    pub const LEN: usize = CUBE_SIZE + GREY_LEVELS;

    pub fn color(index: usize) -> Rgb<u8> {
        if index < CUBE_SIZE {
            let level = |n: usize| (n % CUBE_LEVELS as usize) as u8 * CUBE_STEP;
            Rgb([level(index / 36), level(index / 6), level(index)])
        } else {
            let grey = grey_level(index - CUBE_SIZE);
            Rgb([grey, grey, grey])
        }
    }

    fn nearest(color: &Rgb<u8>) -> usize {
        let [r, g, b] = color.0.map(|c| ((u16::from(c) + u16::from(CUBE_STEP) / 2) / u16::from(CUBE_STEP)) as usize);
        let cube = r * 36 + g * 6 + b;

        let mean = color.0.iter().map(|&c| u32::from(c)).sum::<u32>() / 3;
        let grey = (0..GREY_LEVELS)
            .min_by_key(|&i| (i64::from(grey_level(i)) - i64::from(mean)).abs())
            .unwrap_or(0)
            + CUBE_SIZE;

        if distance(color, &Self::color(grey)) < distance(color, &Self::color(cube)) {
            grey
        } else {
            cube
        }
    }
}

fn grey_level(i: usize) -> u8 {
    (8 + 10 * i) as u8
}

fn distance(a: &Rgb<u8>, b: &Rgb<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

impl ColorMap for Palette {
    type Color = Rgb<u8>;

    fn index_of(&self, color: &Rgb<u8>) -> usize {
        Self::nearest(color)
    }

    fn lookup(&self, index: usize) -> Option<Rgb<u8>> {
        (index < Self::LEN).then(|| Self::color(index))
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Rgb<u8>) {
        *color = Self::color(Self::nearest(color));
    }
}

#[derive(Debug, Default)]
pub struct SixelEncoder;

impl Encode for SixelEncoder {
    fn encode(&self, image: &RgbaImage, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EncodeError::Empty);
        }

        let mut rgb = RgbImage::from_fn(width, height, |x, y| {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            Rgb([r, g, b])
        });
        imageops::dither(&mut rgb, &Palette);
        let indices = imageops::index_colors(&rgb, &Palette);
        let painted = |x: u32, y: u32| image.get_pixel(x, y)[3] >= 128;

        let mut used = [false; Palette::LEN];
        for (x, y, index) in indices.enumerate_pixels() {
            if painted(x, y) {
                used[usize::from(index[0])] = true;
            }
        }

        // fmt::Write into a String cannot fail.
        let mut s = String::new();
        let _ = write!(s, "\x1bP0;1;0q\"1;1;{};{}", width, height);
        for (index, _) in used.iter().enumerate().filter(|(_, used)| **used) {
            let Rgb([r, g, b]) = Palette::color(index);
            let _ = write!(s, "#{};2;{};{};{}", index, percent(r), percent(g), percent(b));
        }

        for band in (0..height).step_by(BAND as usize) {
            if band > 0 {
                s.push('-');
            }
            write_band(&mut s, &indices, band, &painted);
        }
        s.push_str("\x1b\\");

        out.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

fn percent(channel: u8) -> u32 {
    (u32::from(channel) * 100 + 127) / 255
}

/// Writes one six-pixel band, one pass per color present in it.
fn write_band(s: &mut String, indices: &GrayImage, top: u32, painted: &dyn Fn(u32, u32) -> bool) {
    let (width, height) = indices.dimensions();
    let rows = top..(top + BAND).min(height);

    let mut colors: Vec<u8> = Vec::new();
    for y in rows.clone() {
        for x in 0..width {
            let index = indices.get_pixel(x, y)[0];
            if painted(x, y) && !colors.contains(&index) {
                colors.push(index);
            }
        }
    }
    colors.sort_unstable();

    for (pass, &color) in colors.iter().enumerate() {
        if pass > 0 {
            s.push('$');
        }
        let _ = write!(s, "#{}", color);

        let mut run: Option<(char, usize)> = None;
        for x in 0..width {
            let bits = rows
                .clone()
                .filter(|&y| painted(x, y) && indices.get_pixel(x, y)[0] == color)
                .fold(0u8, |bits, y| bits | 1 << (y - top));
            let sixel = char::from(63 + bits);
            run = match run {
                Some((c, n)) if c == sixel => Some((c, n + 1)),
                Some((c, n)) => {
                    push_run(s, c, n);
                    Some((sixel, 1))
                }
                None => Some((sixel, 1)),
            };
        }
        if let Some((c, n)) = run {
            push_run(s, c, n);
        }
    }
}

fn push_run(s: &mut String, c: char, n: usize) {
    if n > 3 {
        let _ = write!(s, "!{}{}", n, c);
    } else {
        s.extend(std::iter::repeat(c).take(n));
    }
}
