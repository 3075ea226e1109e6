use clap::Parser;
use fv::{parse_color, ArgumentError, Mode, RenderParams, StyleCode, Variant};
use palette::Srgba;

/// fv, a font viewer tool
#[derive(Parser, Debug)]
#[command(
    name = "fv",
    version,
    override_usage = "fv [OPTIONS] <FONT>..."
)]
pub struct Cli {
    /// Show all system fonts
    #[arg(long)]
    pub all: bool,

    /// List system fonts
    #[arg(long)]
    pub list: bool,

    /// Match system fonts
    #[arg(long = "match")]
    pub matching: bool,

    /// Foreground color
    #[arg(long, default_value = "black", value_parser = parse_color)]
    pub fg: Srgba<u8>,

    /// Background color
    #[arg(long, default_value = "white", value_parser = parse_color)]
    pub bg: Srgba<u8>,

    /// Font size, in points
    #[arg(long, default_value_t = 48, value_parser = clap::value_parser!(u32).range(1..))]
    pub size: u32,

    /// Margin, in millimetres
    #[arg(long, default_value_t = 5)]
    pub margin: u32,

    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    pub dpi: u32,

    /// Font style, e.g. "bold", "semi-bold italic" or "700"
    #[arg(long, default_value = "regular")]
    pub style: StyleCode,

    /// Font variant: normal, subscript, superscript or small-caps
    #[arg(long, default_value = "normal")]
    pub variant: Variant,

    /// Specimen text template
    #[arg(long)]
    pub text: Option<String>,

    /// Font names, files or directories
    #[arg(value_name = "FONT")]
    pub fonts: Vec<String>,
}

impl Cli {
    pub fn mode(&self) -> Result<Mode, ArgumentError> {
        Mode::from_flags(self.all, self.list, self.matching, self.fonts.clone())
    }

    pub fn params(&self) -> RenderParams {
        RenderParams {
            size: self.size,
            dpi: self.dpi,
            margin: self.margin,
            fg: self.fg,
            bg: self.bg,
            style: self.style,
            variant: self.variant,
            text: self.text.clone(),
        }
    }
}
