//! The snippet language: a small JavaScript-like script with an optional
//! TypeScript-style typed dialect.

pub mod ast;
mod error;
mod lexer;
mod parser;
mod printer;
mod token;

#[cfg(test)]
mod tests;

pub use error::SyntaxError;
pub use lexer::tokenize;
pub use parser::Parser;
pub use printer::print_program;
pub use token::{Span, TemplatePart, Token, TokenKind};

use ast::Program;

/// Which flavour of source a parser accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Type annotations, interfaces and aliases are accepted and discarded
    Typed,
    /// Plain script; any type syntax is a syntax error
    Plain,
}

/// Parse a whole program
pub fn parse(source: &str, dialect: Dialect) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens, dialect).parse_program()
}

/// Number formatting shared by the printer and the runtime's string conversion
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{:.0}", n);
    }
    let abs = n.abs();
    if !(1e-7..1e21).contains(&abs) {
        // exponent form, e.g. 1e+21 / 1.5e-8
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    format!("{}", n)
}
