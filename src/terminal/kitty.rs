//! Kitty graphics protocol: base64 PNG in chunked APC escapes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;

use super::{encode_png, Encode, EncodeError};

/// Maximum base64 payload per escape sequence.
pub const CHUNK_SIZE: usize = 4096;

#[derive(Debug, Default)]
pub struct KittyEncoder;

impl Encode for KittyEncoder {
    fn encode(&self, image: &RgbaImage, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let payload = STANDARD.encode(encode_png(image)?);
        let chunks: Vec<&[u8]> = payload.as_bytes().chunks(CHUNK_SIZE).collect();
        let last = chunks.len() - 1;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let more = u8::from(i != last);
            // Only the first chunk carries the transmission keys.
            if i == 0 {
                out.extend_from_slice(format!("\x1b_Ga=T,f=100,m={};", more).as_bytes());
            } else {
                out.extend_from_slice(format!("\x1b_Gm={};", more).as_bytes());
            }
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\x1b\\");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn encode(image: &RgbaImage) -> String {
        let mut out = Vec::new();
        KittyEncoder.encode(image, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Splits output into `(keys, payload)` per escape.
    fn escapes(output: &str) -> Vec<(&str, &str)> {
        output
            .split_terminator("\x1b\\")
            .map(|escape| {
                let body = escape.strip_prefix("\x1b_G").unwrap();
                body.split_once(';').unwrap()
            })
            .collect()
    }

    #[test]
    fn single_chunk() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let output = encode(&image);
        let escapes = escapes(&output);
        assert_eq!(escapes.len(), 1);
        assert_eq!(escapes[0].0, "a=T,f=100,m=0");

        let png = STANDARD.decode(escapes[0].1).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn chunked() {
        let mut rng = fastrand::Rng::with_seed(7);
        let image = RgbaImage::from_fn(96, 96, |_, _| {
            Rgba([rng.u8(..), rng.u8(..), rng.u8(..), 255])
        });
        let output = encode(&image);
        let escapes = escapes(&output);
        assert!(escapes.len() > 2);

        assert_eq!(escapes[0].0, "a=T,f=100,m=1");
        for (keys, _) in &escapes[1..escapes.len() - 1] {
            assert_eq!(*keys, "m=1");
        }
        assert_eq!(escapes[escapes.len() - 1].0, "m=0");
        assert!(escapes.iter().all(|(_, chunk)| chunk.len() <= CHUNK_SIZE));

        let payload: String = escapes.iter().map(|(_, chunk)| *chunk).collect();
        let png = STANDARD.decode(payload).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }
}
