//! iTerm2 inline images (also understood by WezTerm).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;

use super::{encode_png, Encode, EncodeError};

#[derive(Debug, Default)]
pub struct ItermEncoder;

impl Encode for ItermEncoder {
    fn encode(&self, image: &RgbaImage, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let png = encode_png(image)?;
        let header = format!(
            "\x1b]1337;File=inline=1;size={};width={}px;height={}px:",
            png.len(),
            image.width(),
            image.height()
        );
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(STANDARD.encode(&png).as_bytes());
        out.push(0x07);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn framing() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255]));
        let mut out = Vec::new();
        ItermEncoder.encode(&image, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        let body = out
            .strip_prefix("\x1b]1337;File=inline=1;size=")
            .and_then(|rest| rest.strip_suffix('\u{7}'))
            .unwrap();
        let (args, payload) = body.split_once(':').unwrap();
        let png = STANDARD.decode(payload).unwrap();
        assert_eq!(args, format!("{};width=3px;height=2px", png.len()));
        assert_eq!(image::load_from_memory(&png).unwrap().to_rgba8(), image);
    }
}
