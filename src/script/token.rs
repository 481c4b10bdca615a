/// Source position of a token (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A piece of a template literal
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Literal text with escapes already resolved
    Text(String),
    /// Raw source of a `${...}` substitution and where it starts
    Expr { source: String, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Template(Vec<TemplatePart>),
    /// Identifiers and keywords; the parser decides which is which
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line break separates this token from the previous one
    pub newline_before: bool,
}

impl Token {
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(n) => format!("number {}", super::format_number(*n)),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Template(_) => "template literal".to_string(),
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Punct(p) => format!("'{}'", p),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Punctuators, longest first so the lexer can take the first prefix match
pub(crate) const PUNCTUATORS: &[&str] = &[
    "===", "!==", "**=", "...", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--",
    "+=", "-=", "*=", "/=", "%=", "**", "(", ")", "{", "}", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "!", "=", ".", ":", "?", "|", "&",
];
