//! Inline graphics support in the hosting terminal.
//!
//! [`negotiate`] picks one [`Protocol`] per run from environment signals;
//! from then on images go through the protocol's [`Encode`] implementation.

use std::fmt;

use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, RgbaImage};

pub mod iterm;
pub mod kitty;
pub mod sixel;

/// An inline image protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    Kitty,
    Iterm,
    Sixel,
}

impl Protocol {
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Kitty => "kitty",
            Protocol::Iterm => "iterm",
            Protocol::Sixel => "sixel",
        }
    }

    /// The encoder used for every image once this protocol is selected.
    pub fn encoder(self) -> Box<dyn Encode> {
        match self {
            Protocol::Kitty => Box::new(kitty::KittyEncoder),
            Protocol::Iterm => Box::new(iterm::ItermEncoder),
            Protocol::Sixel => Box::new(sixel::SixelEncoder),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("terminal does not support graphics")]
pub struct CapabilityError;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("image is empty")]
    Empty,
}

/// Frames a pixel buffer for a terminal.
pub trait Encode {
    fn encode(&self, image: &RgbaImage, out: &mut Vec<u8>) -> Result<(), EncodeError>;
}

/// The signals terminal detection looks at.
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;

    /// Whether the terminal answers a device attributes query with sixel support.
    fn supports_sixel(&self) -> bool;
}

/// The real process environment and controlling terminal.
#[derive(Debug, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn supports_sixel(&self) -> bool {
        match query::device_attributes() {
            Ok(reply) => {
                log::debug!("Device attributes reply: {:?}", String::from_utf8_lossy(&reply));
                has_sixel_attribute(&reply)
            }
            Err(e) => {
                log::debug!("Device attributes query failed: {}", e);
                false
            }
        }
    }
}

/// Picks the protocol to use, or `None` if inline images are unavailable.
pub fn negotiate(env: &dyn Environment) -> Option<Protocol> {
    let var = |name: &str| env.var(name).filter(|value| !value.is_empty());
    let term = var("TERM").unwrap_or_default();
    let term_program = var("TERM_PROGRAM").unwrap_or_default();

    let protocol = if term.starts_with("screen") || term.starts_with("tmux") || var("TMUX").is_some() {
        None
    } else if term == "xterm-kitty"
        || var("KITTY_WINDOW_ID").is_some()
        || term_program.eq_ignore_ascii_case("ghostty")
    {
        Some(Protocol::Kitty)
    } else if term_program.eq_ignore_ascii_case("iTerm.app")
        || term_program.eq_ignore_ascii_case("WezTerm")
        || var("LC_TERMINAL").as_deref() == Some("iTerm2")
    {
        Some(Protocol::Iterm)
    } else if env.supports_sixel() {
        Some(Protocol::Sixel)
    } else {
        None
    };

    match protocol {
        Some(protocol) => log::info!("Using {} graphics protocol", protocol),
        None => log::info!("No graphics protocol available (TERM={:?})", term),
    }
    protocol
}

/// Whether a primary device attributes reply (`ESC [ ? 62 ; 4 ; ... c`)
/// lists attribute 4.
pub fn has_sixel_attribute(reply: &[u8]) -> bool {
    let reply = String::from_utf8_lossy(reply);
    let start = match reply.find("\x1b[?") {
        Some(start) => start + 3,
        None => return false,
    };
    let attributes = match reply[start..].find('c') {
        Some(end) => &reply[start..start + end],
        None => return false,
    };
    attributes.split(';').any(|attribute| attribute == "4")
}

pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(EncodeError::Empty);
    }
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(png)
}

#[cfg(unix)]
mod query {
    use std::{
        fs::{File, OpenOptions},
        io::{self, Read, Write},
        process::{Command, Stdio},
    };

    const MAX_REPLY: usize = 256;

    /// Sends `ESC [ c` to the controlling terminal and returns the reply.
    ///
    /// The terminal mode is saved first and restored before returning,
    /// whether or not the query succeeded.
    pub fn device_attributes() -> io::Result<Vec<u8>> {
        let mut tty = OpenOptions::new().read(true).write(true).open("/dev/tty")?;
        let saved = stty(&tty, &["-g"])?;
        stty(&tty, &["raw", "-echo", "min", "0", "time", "5"])?;

        let reply = read_reply(&mut tty);
        let restored = stty(&tty, &[saved.trim()]);
        let reply = reply?;
        restored?;
        Ok(reply)
    }

    fn read_reply(tty: &mut File) -> io::Result<Vec<u8>> {
        tty.write_all(b"\x1b[c")?;
        tty.flush()?;

        let mut reply = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            // Reads time out after half a second and return 0.
            let n = tty.read(&mut buf)?;
            if n == 0 {
                break;
            }
            reply.extend_from_slice(&buf[..n]);
            let terminated = reply
                .windows(3)
                .position(|w| w == b"\x1b[?")
                .map_or(false, |start| reply[start..].contains(&b'c'));
            if terminated || reply.len() >= MAX_REPLY {
                break;
            }
        }
        Ok(reply)
    }

    fn stty(tty: &File, args: &[&str]) -> io::Result<String> {
        let output = Command::new("stty")
            .args(args)
            .stdin(Stdio::from(tty.try_clone()?))
            .stderr(Stdio::null())
            .output()?;
        if !output.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("stty {} failed: {}", args.join(" "), output.status),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(not(unix))]
mod query {
    use std::io;

    pub fn device_attributes() -> io::Result<Vec<u8>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "terminal queries are not supported on this platform",
        ))
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;

    use super::*;

    #[derive(Default)]
    struct MockEnvironment {
        vars: AHashMap<&'static str, &'static str>,
        sixel: bool,
    }

    impl MockEnvironment {
        fn with(vars: &[(&'static str, &'static str)]) -> Self {
            Self {
                vars: vars.iter().copied().collect(),
                sixel: false,
            }
        }

        fn sixel(mut self) -> Self {
            self.sixel = true;
            self
        }
    }

    impl Environment for MockEnvironment {
        fn var(&self, name: &str) -> Option<String> {
            self.vars.get(name).map(|value| value.to_string())
        }

        fn supports_sixel(&self) -> bool {
            self.sixel
        }
    }

    #[test]
    fn no_signals() {
        assert_eq!(negotiate(&MockEnvironment::default()), None);
        assert_eq!(
            negotiate(&MockEnvironment::with(&[("TERM", "xterm-256color")])),
            None
        );
    }

    #[test]
    fn kitty() {
        assert_eq!(
            negotiate(&MockEnvironment::with(&[("TERM", "xterm-kitty")])),
            Some(Protocol::Kitty)
        );
        assert_eq!(
            negotiate(&MockEnvironment::with(&[("KITTY_WINDOW_ID", "3")])),
            Some(Protocol::Kitty)
        );
        assert_eq!(
            negotiate(&MockEnvironment::with(&[("TERM_PROGRAM", "ghostty")])),
            Some(Protocol::Kitty)
        );
    }

    #[test]
    fn iterm() {
        for (name, value) in [
            ("TERM_PROGRAM", "iTerm.app"),
            ("TERM_PROGRAM", "WezTerm"),
            ("TERM_PROGRAM", "wezterm"),
            ("LC_TERMINAL", "iTerm2"),
        ] {
            assert_eq!(
                negotiate(&MockEnvironment::with(&[(name, value)])),
                Some(Protocol::Iterm),
                "{}={}",
                name,
                value
            );
        }
    }

    #[test]
    fn sixel_is_last() {
        assert_eq!(
            negotiate(&MockEnvironment::default().sixel()),
            Some(Protocol::Sixel)
        );
        assert_eq!(
            negotiate(&MockEnvironment::with(&[("LC_TERMINAL", "iTerm2")]).sixel()),
            Some(Protocol::Iterm)
        );
    }

    #[test]
    fn precedence() {
        // Kitty beats iTerm signals.
        assert_eq!(
            negotiate(&MockEnvironment::with(&[
                ("TERM", "xterm-kitty"),
                ("TERM_PROGRAM", "WezTerm"),
            ])),
            Some(Protocol::Kitty)
        );
        // Multiplexers beat everything.
        for vars in [
            &[("TERM", "screen-256color"), ("KITTY_WINDOW_ID", "1")][..],
            &[("TERM", "tmux-256color"), ("TERM_PROGRAM", "iTerm.app")][..],
            &[("TMUX", "/tmp/tmux-1000/default,1,0"), ("TERM", "xterm-kitty")][..],
        ] {
            assert_eq!(negotiate(&MockEnvironment::with(vars).sixel()), None);
        }
        // Empty values are unset.
        assert_eq!(
            negotiate(&MockEnvironment::with(&[("TMUX", ""), ("KITTY_WINDOW_ID", "1")])),
            Some(Protocol::Kitty)
        );
    }

    #[test]
    fn device_attributes() {
        assert!(has_sixel_attribute(b"\x1b[?62;4;6;22c"));
        assert!(has_sixel_attribute(b"\x1b[?4c"));
        assert!(has_sixel_attribute(b"noise\x1b[?63;1;4c"));
        assert!(!has_sixel_attribute(b"\x1b[?62;6;22c"));
        assert!(!has_sixel_attribute(b"\x1b[?1;2c"));
        assert!(!has_sixel_attribute(b"\x1b[?62;44c"));
        assert!(!has_sixel_attribute(b"\x1b[?62;4"));
        assert!(!has_sixel_attribute(b""));
    }

    #[test]
    fn empty_image() {
        assert!(matches!(
            encode_png(&RgbaImage::new(0, 0)),
            Err(EncodeError::Empty)
        ));
    }
}
