use super::token::PUNCTUATORS;
use super::{Span, SyntaxError, TemplatePart, Token, TokenKind};

/// Turn source text into tokens, ending with a single `Eof` token
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source, Span::new(1, 1)).run()
}

/// Tokenize a fragment that starts at `origin` in some enclosing source
pub(crate) fn tokenize_at(source: &str, origin: Span) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source, origin).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str, origin: Span) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: origin.line,
            column: origin.column,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();

        loop {
            let newline_before = self.skip_trivia()?;
            let span = self.span();

            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span,
                    newline_before: true,
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                self.number()?
            } else if c == '"' || c == '\'' {
                TokenKind::Str(self.string(c)?)
            } else if c == '`' {
                TokenKind::Template(self.template()?)
            } else if is_ident_start(c) {
                TokenKind::Ident(self.identifier())
            } else {
                TokenKind::Punct(self.punctuator()?)
            };

            tokens.push(Token {
                kind,
                span,
                newline_before: newline_before || tokens.is_empty(),
            });
        }
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.span())
    }

    /// Skip whitespace and comments, reporting whether a line break was crossed
    fn skip_trivia(&mut self) -> Result<bool, SyntaxError> {
        let mut newline = false;

        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    newline = true;
                    self.bump();
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    let start = self.span();
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some('\n') => newline = true,
                            Some(_) => {}
                            None => {
                                return Err(SyntaxError::new("unterminated comment", start));
                            }
                        }
                    }
                }
                _ => break,
            }
        }

        Ok(newline)
    }

    fn number(&mut self) -> Result<TokenKind, SyntaxError> {
        let start = self.span();

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    self.bump();
                } else if c == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
            return u64::from_str_radix(&digits, 16)
                .map(|n| TokenKind::Number(n as f64))
                .map_err(|_| SyntaxError::new("invalid hexadecimal literal", start));
        }

        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '_' {
                // numeric separator
            } else if c == '.' && !seen_dot && !seen_exp {
                seen_dot = true;
                text.push(c);
            } else if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                text.push(c);
                if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                    self.bump();
                    text.push(sign);
                }
            } else {
                break;
            }
            self.bump();
        }

        if self.peek().is_some_and(is_ident_start) {
            return Err(self.error("identifier starts immediately after numeric literal"));
        }

        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| SyntaxError::new(format!("invalid number '{}'", text), start))
    }

    fn string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.span();
        self.bump();
        let mut out = String::new();

        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some('\n') | None => {
                    return Err(SyntaxError::new("unterminated string literal", start));
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn template(&mut self) -> Result<Vec<TemplatePart>, SyntaxError> {
        let start = self.span();
        self.bump();
        let mut parts = Vec::new();
        let mut text = String::new();

        loop {
            match self.peek() {
                None => return Err(SyntaxError::new("unterminated template literal", start)),
                Some('`') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    self.escape(&mut text)?;
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    let span = self.span();
                    let source = self.substitution(start)?;
                    parts.push(TemplatePart::Expr { source, span });
                }
                Some(_) => {
                    if let Some(c) = self.bump() {
                        text.push(c);
                    }
                }
            }
        }

        if !text.is_empty() || parts.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(parts)
    }

    /// Collect the raw source of a `${...}` body up to its closing brace
    fn substitution(&mut self, template_start: Span) -> Result<String, SyntaxError> {
        let mut source = String::new();
        let mut depth = 1usize;
        let mut quote: Option<char> = None;

        loop {
            let Some(c) = self.bump() else {
                return Err(SyntaxError::new("unterminated template literal", template_start));
            };

            match quote {
                Some(q) => {
                    if c == '\\' {
                        source.push(c);
                        if let Some(next) = self.bump() {
                            source.push(next);
                        }
                        continue;
                    }
                    if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '"' | '\'' | '`' => quote = Some(c),
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(source);
                        }
                    }
                    _ => {}
                },
            }
            source.push(c);
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        let span = self.span();
        let Some(c) = self.bump() else {
            return Err(SyntaxError::new("unterminated escape sequence", span));
        };

        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => {
                let code = self.hex_digits(2, span)?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            'u' => {
                let code = if self.peek() == Some('{') {
                    self.bump();
                    let mut digits = String::new();
                    while let Some(d) = self.bump() {
                        if d == '}' {
                            break;
                        }
                        digits.push(d);
                    }
                    u32::from_str_radix(&digits, 16)
                        .map_err(|_| SyntaxError::new("invalid unicode escape", span))?
                } else {
                    self.hex_digits(4, span)?
                };
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize, span: Span) -> Result<u32, SyntaxError> {
        let mut digits = String::with_capacity(count);
        for _ in 0..count {
            match self.bump() {
                Some(d) if d.is_ascii_hexdigit() => digits.push(d),
                _ => return Err(SyntaxError::new("invalid escape sequence", span)),
            }
        }
        u32::from_str_radix(&digits, 16).map_err(|_| SyntaxError::new("invalid escape sequence", span))
    }

    fn identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    fn punctuator(&mut self) -> Result<&'static str, SyntaxError> {
        for &p in PUNCTUATORS {
            let matches = p
                .chars()
                .enumerate()
                .all(|(i, pc)| self.peek_at(i) == Some(pc));
            if matches {
                for _ in 0..p.chars().count() {
                    self.bump();
                }
                return Ok(p);
            }
        }

        let c = self.peek().unwrap_or('\0');
        Err(self.error(format!("unexpected character '{}'", c)))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
