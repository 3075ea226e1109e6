//! A font viewer for the terminal.
//!
//! Fonts are looked up by family name, file or directory, a line-based
//! specimen template is laid out in each one, and the rasterized result
//! is written inline using the kitty, iTerm or sixel graphics protocol.

pub mod catalog;
pub mod color;
pub mod font;
pub mod matcher;
pub mod raster;
pub mod record;
pub mod specimen;
pub mod terminal;
pub mod text;

pub use catalog::{FontCatalog, FontMetadata};
pub use color::{parse_color, ColorParseError};
pub use font::{InvalidStyle, InvalidVariant, StyleCode, Variant, Weight};
pub use matcher::LookupError;
pub use record::{FontRecord, LoadError};
pub use specimen::{run, ArgumentError, Mode, Outcome, RenderParams, Renderer, RunError};
pub use terminal::{negotiate, Environment, Protocol, SystemEnvironment};
pub use text::{Template, TemplateLine};
