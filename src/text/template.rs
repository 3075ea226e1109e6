//! Specimen text templates.
//!
//! # Syntax
//! Text is copied verbatim; actions are enclosed in double braces:
//!
//! `{{ .Name }}` prints a field of the current font.
//!
//! `{{ size 72 }}The quick brown fox` sets the size of the line it starts.
//!
//! `{{ size (inc .Size 12) }}` nests calls in parentheses.
//!
//! `{{ if .Sample }}{{ .Sample }}{{ else }}Hamburgefonstiv{{ end }}`
//! branches on a value; empty strings and zero are false.
//!
//! `{{- ` and ` -}}` trim whitespace before and after an action.
//!
//! Available fields are `.Name`, `.Family`, `.Style`, `.Sample` and `.Size`.
//! Functions are `inc a b` (addition) and `size n`.

use std::fmt;

use ahash::AHashMap;
use logos::Logos;
use once_cell::sync::Lazy;

use super::{split_lines, TemplateLine, SIZE_MARKER};

/// The template used when no `--text` is given.
pub const DEFAULT_TEMPLATE: &str = include_str!("default.tpl");

const FIELDS: [&str; 5] = ["Name", "Family", "Style", "Sample", "Size"];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Helper {
    Inc,
    Size,
}

impl Helper {
    fn arity(self) -> usize {
        match self {
            Helper::Inc => 2,
            Helper::Size => 1,
        }
    }
}

static HELPERS: Lazy<AHashMap<&'static str, Helper>> =
    Lazy::new(|| [("inc", Helper::Inc), ("size", Helper::Size)].into_iter().collect());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("template syntax error at offset {offset}: {message}")]
pub struct TemplateSyntaxError {
    pub offset: usize,
    pub message: String,
}

impl TemplateSyntaxError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("template: {0}")]
pub struct ExecError(String);

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[regex(r"\.[A-Za-z_][A-Za-z0-9_]*")]
    Field,
    #[regex(r"-?[0-9]+")]
    Int,
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[error]
    #[regex(r"[ \t\r\n]+", logos::skip)]
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Field(&'static str),
    Int(i64),
    Str(String),
    Call(Helper, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Output(Expr),
    If {
        condition: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// A value computed while executing a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// The per-font values a template can refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub name: String,
    pub style: String,
    pub sample: String,
    pub size: u32,
}

impl Context {
    fn field(&self, field: &str) -> Value {
        match field {
            "Name" | "Family" => Value::Str(self.name.clone()),
            "Style" => Value::Str(self.style.clone()),
            "Sample" => Value::Str(self.sample.clone()),
            _ => Value::Int(i64::from(self.size)),
        }
    }
}

/// A compiled template. Compile once, execute once per font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Compiles `source`, or the default template when `source` is empty.
    pub fn compile(source: &str) -> Result<Self, TemplateSyntaxError> {
        let source = if source.is_empty() {
            DEFAULT_TEMPLATE
        } else {
            source
        };

        let segments = split_actions(source)?;
        let mut parser = Parser {
            segments: segments.into_iter().rev().collect(),
        };
        let (nodes, end) = parser.parse_list()?;
        match end {
            None => Ok(Self { nodes }),
            Some((offset, keyword)) => Err(TemplateSyntaxError::new(
                offset,
                format!("unexpected {{{{ {} }}}}", keyword),
            )),
        }
    }

    /// Runs the template, returning the raw output text.
    pub fn render(&self, context: &Context) -> Result<String, ExecError> {
        let mut out = String::new();
        execute_nodes(&self.nodes, context, &mut out)?;
        Ok(out)
    }

    /// Runs the template and splits the output into sized lines.
    pub fn execute(
        &self,
        context: &Context,
        default_size: u32,
    ) -> Result<Vec<TemplateLine>, ExecError> {
        Ok(split_lines(&self.render(context)?, default_size))
    }
}

enum Segment {
    Text(String),
    Action { offset: usize, body: String },
}

/// Splits the source into literal text and action bodies,
/// applying `{{-` / `-}}` whitespace trimming.
fn split_actions(source: &str) -> Result<Vec<Segment>, TemplateSyntaxError> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut trim_next = false;

    while let Some(open) = source[cursor..].find("{{") {
        let open = cursor + open;
        let close = find_close(source, open + 2)
            .ok_or_else(|| TemplateSyntaxError::new(open, "unclosed action"))?;

        let mut body = &source[open + 2..close];
        let mut text = &source[cursor..open];
        if trim_next {
            text = text.trim_start();
        }
        if let Some(rest) = body.strip_prefix("- ") {
            text = text.trim_end();
            body = rest;
        }
        trim_next = false;
        if let Some(rest) = body.strip_suffix(" -") {
            trim_next = true;
            body = rest;
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text.to_owned()));
        }
        segments.push(Segment::Action {
            offset: open,
            body: body.to_owned(),
        });
        cursor = close + 2;
    }

    let mut text = &source[cursor..];
    if trim_next {
        text = text.trim_start();
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_owned()));
    }
    Ok(segments)
}

/// Byte offset of the `}}` closing an action body that starts at `from`.
/// Braces inside string literals do not count.
fn find_close(source: &str, from: usize) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in source[from..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if source[from + i..].starts_with("}}") {
            return Some(from + i);
        }
    }
    None
}

/// Recursive descent parser over template segments.
struct Parser {
    /// Reversed so we can pop() when consuming segments.
    segments: Vec<Segment>,
}

type Terminator = Option<(usize, &'static str)>;

impl Parser {
    /// Parses nodes until the end of input or an `else` / `end` action,
    /// which is returned.
    fn parse_list(&mut self) -> Result<(Vec<Node>, Terminator), TemplateSyntaxError> {
        let mut nodes = Vec::new();
        while let Some(segment) = self.segments.pop() {
            let (offset, body) = match segment {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Segment::Action { offset, body } => (offset, body),
            };

            let mut tokens = lex(&body, offset)?;
            let keyword = match tokens.first() {
                None => return Err(TemplateSyntaxError::new(offset, "empty action")),
                Some((Token::Ident, word, _)) => match word.as_str() {
                    "if" => Some("if"),
                    "else" => Some("else"),
                    "end" => Some("end"),
                    _ => None,
                },
                Some(_) => None,
            };

            match keyword {
                Some("if") => {
                    tokens.remove(0);
                    nodes.push(self.parse_if(offset, tokens)?);
                }
                Some(keyword) => {
                    if let Some((_, text, offset)) = tokens.get(1) {
                        return Err(TemplateSyntaxError::new(
                            *offset,
                            format!("unexpected {:?} after {}", text, keyword),
                        ));
                    }
                    return Ok((nodes, Some((offset, keyword))));
                }
                None => nodes.push(Node::Output(parse_pipeline(tokens, offset)?)),
            }
        }
        Ok((nodes, None))
    }

    fn parse_if(
        &mut self,
        offset: usize,
        tokens: Vec<Lexeme>,
    ) -> Result<Node, TemplateSyntaxError> {
        if tokens.is_empty() {
            return Err(TemplateSyntaxError::new(offset, "missing condition for if"));
        }
        let condition = parse_pipeline(tokens, offset)?;

        let (then, end) = self.parse_list()?;
        let otherwise = match end {
            Some((_, "end")) => Vec::new(),
            Some((_, _)) => match self.parse_list()? {
                (otherwise, Some((_, "end"))) => otherwise,
                (_, Some((offset, keyword))) => {
                    return Err(TemplateSyntaxError::new(
                        offset,
                        format!("unexpected {{{{ {} }}}}", keyword),
                    ))
                }
                (_, None) => return Err(TemplateSyntaxError::new(offset, "unterminated if")),
            },
            None => return Err(TemplateSyntaxError::new(offset, "unterminated if")),
        };

        Ok(Node::If {
            condition,
            then,
            otherwise,
        })
    }
}

/// A token, its source text, and its offset in the template.
type Lexeme = (Token, String, usize);

fn lex(body: &str, base: usize) -> Result<Vec<Lexeme>, TemplateSyntaxError> {
    // +2 skips the opening braces.
    let base = base + 2;
    let mut lexer = Token::lexer(body);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        let offset = base + lexer.span().start;
        if token == Token::Error {
            return Err(TemplateSyntaxError::new(
                offset,
                format!("unexpected {:?}", lexer.slice()),
            ));
        }
        tokens.push((token, lexer.slice().to_owned(), offset));
    }
    Ok(tokens)
}

/// Parses a complete action body.
fn parse_pipeline(tokens: Vec<Lexeme>, offset: usize) -> Result<Expr, TemplateSyntaxError> {
    let mut tokens: Vec<Lexeme> = tokens.into_iter().rev().collect();
    let expr = parse_command(&mut tokens, offset)?;
    match tokens.pop() {
        None => Ok(expr),
        Some((_, text, offset)) => Err(TemplateSyntaxError::new(
            offset,
            format!("unexpected {:?}", text),
        )),
    }
}

/// `command := operand | ident operand*`
fn parse_command(tokens: &mut Vec<Lexeme>, offset: usize) -> Result<Expr, TemplateSyntaxError> {
    match tokens.pop() {
        Some((Token::Ident, name, name_offset)) => {
            let helper = *HELPERS.get(name.as_str()).ok_or_else(|| {
                TemplateSyntaxError::new(name_offset, format!("function {:?} not defined", name))
            })?;

            let mut args = Vec::new();
            while !matches!(tokens.last(), None | Some((Token::RParen, _, _))) {
                args.push(parse_operand(tokens, offset)?);
            }
            if args.len() != helper.arity() {
                return Err(TemplateSyntaxError::new(
                    name_offset,
                    format!(
                        "wrong number of args for {}: want {} got {}",
                        name,
                        helper.arity(),
                        args.len()
                    ),
                ));
            }
            Ok(Expr::Call(helper, args))
        }
        Some(token) => {
            tokens.push(token);
            parse_operand(tokens, offset)
        }
        None => Err(TemplateSyntaxError::new(offset, "missing value")),
    }
}

fn parse_operand(tokens: &mut Vec<Lexeme>, offset: usize) -> Result<Expr, TemplateSyntaxError> {
    let (token, text, offset) = tokens
        .pop()
        .ok_or_else(|| TemplateSyntaxError::new(offset, "missing value"))?;
    match token {
        Token::Field => {
            let name = &text[1..];
            FIELDS
                .iter()
                .find(|field| **field == name)
                .map(|field| Expr::Field(*field))
                .ok_or_else(|| {
                    TemplateSyntaxError::new(offset, format!("can't evaluate field {}", name))
                })
        }
        Token::Int => text
            .parse()
            .map(Expr::Int)
            .map_err(|_| TemplateSyntaxError::new(offset, format!("bad number {:?}", text))),
        Token::Str => Ok(Expr::Str(unquote(&text))),
        Token::LParen => {
            let expr = parse_command(tokens, offset)?;
            match tokens.pop() {
                Some((Token::RParen, _, _)) => Ok(expr),
                _ => Err(TemplateSyntaxError::new(offset, "unclosed left paren")),
            }
        }
        Token::Ident => Err(TemplateSyntaxError::new(
            offset,
            format!("function {:?} must be called in parentheses", text),
        )),
        Token::RParen | Token::Error => Err(TemplateSyntaxError::new(
            offset,
            format!("unexpected {:?}", text),
        )),
    }
}

fn unquote(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn execute_nodes(nodes: &[Node], context: &Context, out: &mut String) -> Result<(), ExecError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(expr) => out.push_str(&evaluate(expr, context)?.to_string()),
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                let branch = if evaluate(condition, context)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                execute_nodes(branch, context, out)?;
            }
        }
    }
    Ok(())
}

fn evaluate(expr: &Expr, context: &Context) -> Result<Value, ExecError> {
    match expr {
        Expr::Field(field) => Ok(context.field(field)),
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Call(helper, args) => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, context))
                .collect::<Result<Vec<_>, _>>()?;
            call(*helper, &args)
        }
    }
}

fn call(helper: Helper, args: &[Value]) -> Result<Value, ExecError> {
    let int = |value: &Value| match value {
        Value::Int(i) => Ok(*i),
        Value::Str(s) => Err(ExecError(format!("expected integer, found {:?}", s))),
    };
    match helper {
        Helper::Inc => int(&args[0])?
            .checked_add(int(&args[1])?)
            .map(Value::Int)
            .ok_or_else(|| ExecError("inc: integer overflow".to_owned())),
        Helper::Size => match int(&args[0])? {
            size if size > 0 => Ok(Value::Str(format!("{0}{1}{0}", SIZE_MARKER, size))),
            size => Err(ExecError(format!("size: {} is not a positive size", size))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context {
            name: "Inter".to_owned(),
            style: "Bold".to_owned(),
            sample: String::new(),
            size: 48,
        }
    }

    fn render(source: &str) -> String {
        Template::compile(source)
            .unwrap()
            .render(&context())
            .unwrap()
    }

    fn syntax_error(source: &str) -> TemplateSyntaxError {
        Template::compile(source).unwrap_err()
    }

    #[test]
    fn plain_text() {
        assert_eq!(render("no actions here\n"), "no actions here\n");
    }

    #[test]
    fn fields() {
        assert_eq!(
            render("{{ .Name }} ({{.Style}}) {{ .Size }}pt [{{ .Sample }}] {{ .Family }}"),
            "Inter (Bold) 48pt [] Inter"
        );
    }

    #[test]
    fn helpers() {
        assert_eq!(render("{{ inc 2 3 }}"), "5");
        assert_eq!(render("{{ inc .Size -12 }}"), "36");
        assert_eq!(render("{{ size 72 }}big"), "\u{0}72\u{0}big");
        assert_eq!(render("{{ size (inc .Size 24) }}"), "\u{0}72\u{0}");
        assert_eq!(render(r#"{{ "a \"quoted\" string" }}"#), "a \"quoted\" string");
    }

    #[test]
    fn conditionals() {
        let source = "{{ if .Sample }}{{ .Sample }}{{ else }}fallback{{ end }}";
        assert_eq!(render(source), "fallback");

        let template = Template::compile(source).unwrap();
        let context = Context {
            sample: "Sample!".to_owned(),
            ..context()
        };
        assert_eq!(template.render(&context).unwrap(), "Sample!");

        assert_eq!(render("{{ if 0 }}no{{ end }}yes"), "yes");
        assert_eq!(
            render("{{ if .Size }}a{{ if \"\" }}b{{ else }}c{{ end }}{{ end }}"),
            "ac"
        );
    }

    #[test]
    fn trim_markers() {
        assert_eq!(render("a   {{- .Name -}}   b"), "aInterb");
        assert_eq!(render("line\n{{- \"\" }}"), "line");
        assert_eq!(render("{{ inc 1 -1 }}"), "0");
    }

    #[test]
    fn default_template_compiles() {
        let template = Template::compile("").unwrap();
        assert_eq!(template, Template::compile(DEFAULT_TEMPLATE).unwrap());
        let lines = template.execute(&context(), 48).unwrap();
        assert!(lines.iter().any(|line| line.text == "Inter"));
        assert!(lines.iter().all(|line| !line.text.contains(SIZE_MARKER)));
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(syntax_error("abc {{ .Name").offset, 4);
        assert_eq!(syntax_error("{{ }}").message, "empty action");
        assert_eq!(
            syntax_error("{{ .Nope }}").message,
            "can't evaluate field Nope"
        );
        assert_eq!(
            syntax_error("{{ frobnicate 1 }}").message,
            "function \"frobnicate\" not defined"
        );
        assert_eq!(
            syntax_error("{{ inc 1 }}").message,
            "wrong number of args for inc: want 2 got 1"
        );
        assert_eq!(syntax_error("xx{{ end }}").offset, 2);
        assert_eq!(syntax_error("{{ if 1 }}open").message, "unterminated if");
        assert_eq!(syntax_error("{{ size (inc 1 2 }}").message, "unclosed left paren");
        assert_eq!(syntax_error("{{ .Name ] }}").offset, 9);
        assert_eq!(syntax_error("a {{ \"}} b").message, "unclosed action");
    }

    #[test]
    fn braces_in_strings() {
        assert_eq!(render("{{ \"}}\" }}x"), "}}x");
        assert_eq!(render("{{ \"a\\\"}}\" }}"), "a\"}}");
        assert_eq!(render("{{ if \"}}\" }}yes{{ end }}"), "yes");
    }

    #[test]
    fn exec_errors() {
        let template = Template::compile("{{ inc .Name 1 }}").unwrap();
        assert!(template.render(&context()).is_err());
        let template = Template::compile("{{ size 0 }}").unwrap();
        assert!(template.render(&context()).is_err());
    }
}
