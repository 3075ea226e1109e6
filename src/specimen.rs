//! Rendering specimens and the run modes built on it.
//!
//! Every font is rendered independently: a font that fails to load,
//! lay out or encode becomes an error entry in the output and the
//! remaining fonts are still processed.

use std::io::{self, Write};

use image::RgbaImage;
use palette::Srgba;

use crate::{
    catalog::FontCatalog,
    font::{StyleCode, Variant},
    matcher::{self, LookupError},
    raster::{self, RenderError},
    record::{FontRecord, LoadError},
    terminal::{negotiate, CapabilityError, Encode, EncodeError, Environment, Protocol},
    text::{Context, ExecError, Template, TemplateSyntaxError},
};

/// Immutable settings shared by every render in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    /// Default point size.
    pub size: u32,
    pub dpi: u32,
    /// Margin around the ink, in millimetres.
    pub margin: u32,
    pub fg: Srgba<u8>,
    pub bg: Srgba<u8>,
    pub style: StyleCode,
    pub variant: Variant,
    /// Template source; `None` or empty selects the default template.
    pub text: Option<String>,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            size: 48,
            dpi: 100,
            margin: 5,
            fg: Srgba::new(0, 0, 0, u8::MAX),
            bg: Srgba::new(u8::MAX, u8::MAX, u8::MAX, u8::MAX),
            style: StyleCode::REGULAR,
            variant: Variant::Normal,
            text: None,
        }
    }
}

/// Why one font could not be rendered.
#[derive(Debug, thiserror::Error)]
pub enum SpecimenError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// The result for one output item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rendered { ident: String, payload: Vec<u8> },
    Failed { ident: String, message: String },
}

impl Outcome {
    pub fn ident(&self) -> &str {
        match self {
            Outcome::Rendered { ident, .. } | Outcome::Failed { ident, .. } => ident,
        }
    }

    /// A failed lookup of the `index`th argument.
    pub fn lookup_failed(index: usize, query: &str, error: &LookupError) -> Self {
        Outcome::Failed {
            ident: format!("arg {} {:?}", index, query),
            message: error.to_string(),
        }
    }
}

/// Writes one item. Items after the first are preceded by a blank line.
pub fn write_outcome(out: &mut dyn Write, outcome: &Outcome, first: bool) -> io::Result<()> {
    if !first {
        out.write_all(b"\n")?;
    }
    match outcome {
        Outcome::Rendered { ident, payload } => {
            writeln!(out, "{}", ident)?;
            out.write_all(payload)?;
            out.write_all(b"\n")?;
        }
        Outcome::Failed { ident, message } => {
            writeln!(out, "{} -- error: {}", ident, message)?;
        }
    }
    out.flush()
}

/// Renders fonts with one compiled template and one encoder.
pub struct Renderer<'a> {
    params: &'a RenderParams,
    template: Template,
    encoder: Box<dyn Encode>,
}

impl<'a> Renderer<'a> {
    pub fn new(params: &'a RenderParams, protocol: Protocol) -> Result<Self, TemplateSyntaxError> {
        Ok(Self {
            params,
            template: Template::compile(params.text.as_deref().unwrap_or_default())?,
            encoder: protocol.encoder(),
        })
    }

    /// Loads `record` and rasterizes its specimen.
    pub fn render(&self, record: &FontRecord) -> Result<RgbaImage, SpecimenError> {
        let face = record.load()?;
        let context = Context::for_font(record, self.params.style, self.params.size);
        let lines = self.template.execute(&context, self.params.size)?;
        Ok(raster::rasterize(&face, &lines, self.params)?)
    }

    /// Renders and encodes `record`, capturing any failure.
    pub fn outcome(&self, record: &FontRecord) -> Outcome {
        let result = self.render(record).and_then(|image| {
            let mut payload = Vec::new();
            self.encoder.encode(&image, &mut payload)?;
            Ok(payload)
        });

        // After loading, so the face's own names are used when available.
        let ident = record.to_string();
        match result {
            Ok(payload) => Outcome::Rendered { ident, payload },
            Err(e) => {
                log::debug!("Failed to render {}: {:?}", ident, e);
                Outcome::Failed {
                    ident,
                    message: e.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("--all, --list, and --match must be exclusive")]
    Exclusive,
    #[error("requires --all or one or more args, or --list, or --match and one or more args")]
    Arguments,
}

/// What a run does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Render each query in order.
    Render(Vec<String>),
    /// Render every catalog font.
    All,
    /// Print the catalog.
    List,
    /// Print the catalog entry each query resolves to.
    Match(Vec<String>),
}

impl Mode {
    /// Builds the mode from command-line switches and positional queries.
    pub fn from_flags(
        all: bool,
        list: bool,
        matching: bool,
        queries: Vec<String>,
    ) -> Result<Self, ArgumentError> {
        let has_queries = !queries.is_empty();
        match (all, list, matching) {
            (false, false, false) if has_queries => Ok(Mode::Render(queries)),
            (true, false, false) if !has_queries => Ok(Mode::All),
            (false, true, false) if !has_queries => Ok(Mode::List),
            (false, false, true) if has_queries => Ok(Mode::Match(queries)),
            (false, false, false) | (true, false, false) | (false, true, false) | (false, false, true) => {
                Err(ArgumentError::Arguments)
            }
            _ => Err(ArgumentError::Exclusive),
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Template(#[from] TemplateSyntaxError),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Executes `mode`, writing to `out`.
pub fn run(
    mode: &Mode,
    catalog: &FontCatalog,
    params: &RenderParams,
    env: &dyn Environment,
    out: &mut dyn Write,
) -> Result<(), RunError> {
    match mode {
        Mode::Render(queries) => {
            let renderer = setup(params, env)?;
            let mut first = true;
            for (i, query) in queries.iter().enumerate() {
                match matcher::resolve(query, params.style, catalog) {
                    Ok(records) => {
                        for record in &records {
                            write_outcome(out, &renderer.outcome(record), first)?;
                            first = false;
                        }
                    }
                    Err(e) => {
                        log::warn!("Unable to open arg {}: {}", i, e);
                        write_outcome(out, &Outcome::lookup_failed(i, query, &e), first)?;
                        first = false;
                    }
                }
            }
        }
        Mode::All => {
            let renderer = setup(params, env)?;
            for (i, record) in matcher::render_all(catalog).iter().enumerate() {
                write_outcome(out, &renderer.outcome(record), i == 0)?;
            }
        }
        Mode::List => list(catalog, out)?,
        Mode::Match(queries) => {
            for query in queries {
                match matcher::match_name(query, params.style, catalog) {
                    Some(record) => {
                        writeln!(out, "---")?;
                        writeln!(out, "path: {}", record.path().display())?;
                        writeln!(out, "family: {:?}", record.family())?;
                        writeln!(out, "style: {:?}", record.style_key().unwrap_or_default())?;
                    }
                    None => log::warn!("No installed font matches {:?}", query),
                }
            }
            out.flush()?;
        }
    }
    Ok(())
}

fn setup<'a>(params: &'a RenderParams, env: &dyn Environment) -> Result<Renderer<'a>, RunError> {
    let protocol = negotiate(env).ok_or(CapabilityError)?;
    Ok(Renderer::new(params, protocol)?)
}

fn list(catalog: &FontCatalog, out: &mut dyn Write) -> io::Result<()> {
    for (family, styles) in catalog.families() {
        writeln!(out, "---")?;
        writeln!(out, "family: {:?}", family)?;
        writeln!(out, "styles:")?;
        for (key, metadata) in styles {
            writeln!(out, "  {}: {}", key, metadata.path.display())?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use crate::{catalog::FontMetadata, font::Weight};

    use super::*;

    fn written(outcomes: &[Outcome]) -> String {
        let mut out = Vec::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            write_outcome(&mut out, outcome, i == 0).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn outcome_layout() {
        let outcomes = [
            Outcome::Rendered {
                ident: "\"A (bold)\": /a.ttf".to_owned(),
                payload: b"<image>".to_vec(),
            },
            Outcome::Failed {
                ident: "arg 1 \"b\"".to_owned(),
                message: "unable to locate font \"b\"".to_owned(),
            },
            Outcome::Rendered {
                ident: "\"C\": /c.ttf".to_owned(),
                payload: b"<image>".to_vec(),
            },
        ];
        assert_eq!(
            written(&outcomes),
            "\"A (bold)\": /a.ttf\n<image>\n\
             \n\
             arg 1 \"b\" -- error: unable to locate font \"b\"\n\
             \n\
             \"C\": /c.ttf\n<image>\n"
        );
    }

    #[test]
    fn lookup_failure_ident() {
        let error = LookupError::NotFound("Nope".to_owned());
        let outcome = Outcome::lookup_failed(2, "Nope", &error);
        assert_eq!(outcome.ident(), "arg 2 \"Nope\"");
        assert_eq!(
            outcome,
            Outcome::Failed {
                ident: "arg 2 \"Nope\"".to_owned(),
                message: "unable to locate font \"Nope\"".to_owned(),
            }
        );
    }

    #[test]
    fn modes_from_flags() {
        assert_eq!(
            Mode::from_flags(false, false, false, strings(&["a", "b"])),
            Ok(Mode::Render(strings(&["a", "b"])))
        );
        assert_eq!(Mode::from_flags(true, false, false, vec![]), Ok(Mode::All));
        assert_eq!(Mode::from_flags(false, true, false, vec![]), Ok(Mode::List));
        assert_eq!(
            Mode::from_flags(false, false, true, strings(&["a"])),
            Ok(Mode::Match(strings(&["a"])))
        );

        assert_eq!(
            Mode::from_flags(false, false, false, vec![]),
            Err(ArgumentError::Arguments)
        );
        assert_eq!(
            Mode::from_flags(true, false, false, strings(&["a"])),
            Err(ArgumentError::Arguments)
        );
        assert_eq!(
            Mode::from_flags(false, true, false, strings(&["a"])),
            Err(ArgumentError::Arguments)
        );
        assert_eq!(
            Mode::from_flags(false, false, true, vec![]),
            Err(ArgumentError::Arguments)
        );
        assert_eq!(
            Mode::from_flags(true, true, false, vec![]),
            Err(ArgumentError::Exclusive)
        );
        assert_eq!(
            Mode::from_flags(true, false, true, strings(&["a"])),
            Err(ArgumentError::Exclusive)
        );
    }

    #[test]
    fn list_output() {
        let catalog: FontCatalog = [
            FontMetadata::new("/f/Zed.ttf", "Zed", StyleCode::REGULAR),
            FontMetadata::new("/f/Ab-Bold.ttf", "Ab", StyleCode::new(Weight::Bold, false)),
            FontMetadata::new("/f/Ab.ttf", "Ab", StyleCode::REGULAR),
        ]
        .into_iter()
        .collect();
        let mut out = Vec::new();
        list(&catalog, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "---\nfamily: \"Ab\"\nstyles:\n  bold: /f/Ab-Bold.ttf\n  regular: /f/Ab.ttf\n\
             ---\nfamily: \"Zed\"\nstyles:\n  regular: /f/Zed.ttf\n"
        );
    }

    #[test]
    fn template_errors_are_reported_at_setup() {
        let params = RenderParams {
            text: Some("{{ .Nope }}".to_owned()),
            ..RenderParams::default()
        };
        assert!(Renderer::new(&params, Protocol::Kitty).is_err());
        assert!(Renderer::new(&RenderParams::default(), Protocol::Sixel).is_ok());
    }

    #[test]
    fn unloadable_font_is_an_outcome() {
        let params = RenderParams::default();
        let renderer = Renderer::new(&params, Protocol::Kitty).unwrap();
        let record = FontRecord::from_path("/nonexistent/fv/Ghost-Regular.ttf");
        match renderer.outcome(&record) {
            Outcome::Failed { ident, message } => {
                assert_eq!(ident, "\"Ghost Regular\": /nonexistent/fv/Ghost-Regular.ttf");
                assert!(message.starts_with("unable to read /nonexistent/fv/Ghost-Regular.ttf"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    const TUFFY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fonts/Tuffy.ttf");

    fn with_text(text: &str) -> RenderParams {
        RenderParams {
            text: Some(text.to_owned()),
            margin: 0,
            ..RenderParams::default()
        }
    }

    #[test]
    fn renders_a_font_file() {
        let params = RenderParams::default();
        let renderer = Renderer::new(&params, Protocol::Kitty).unwrap();
        let record = FontRecord::from_path(TUFFY);
        match renderer.outcome(&record) {
            Outcome::Rendered { ident, payload } => {
                assert!(ident.starts_with("\"Tuffy"), "{}", ident);
                assert!(ident.ends_with(TUFFY), "{}", ident);
                assert!(payload.starts_with(b"\x1b_Ga=T,f=100,"));
            }
            other => panic!("expected a rendered specimen, got {:?}", other),
        }
        assert_eq!(record.names().map(|names| names.family.as_str()), Some("Tuffy"));
    }

    #[test]
    fn template_sizes_reach_the_image() {
        let record = FontRecord::from_path(TUFFY);
        let render = |text: &str| {
            let params = with_text(text);
            Renderer::new(&params, Protocol::Kitty)
                .unwrap()
                .render(&record)
                .unwrap()
        };

        let one = render("Hello");
        let two = render("Hello\nHello");
        let large = render("{{ size 96 }}Hello");
        assert!(two.height() > one.height() * 3 / 2);
        assert!(large.height() > one.height() * 3 / 2);
        assert!(large.width() > one.width() * 3 / 2);
    }

    #[test]
    fn oversized_margin_is_an_outcome() {
        let params = RenderParams {
            margin: 1_000_000_000,
            ..RenderParams::default()
        };
        let renderer = Renderer::new(&params, Protocol::Kitty).unwrap();
        match renderer.outcome(&FontRecord::from_path(TUFFY)) {
            Outcome::Failed { message, .. } => {
                assert_eq!(message, RenderError::TooLarge.to_string());
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
