use super::ast::*;
use super::lexer::tokenize_at;
use super::{Dialect, Span, SyntaxError, TemplatePart, Token, TokenKind};
use std::rc::Rc;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "default", "do", "else", "enum",
    "export", "false", "finally", "for", "function", "if", "import", "in", "let", "new", "null",
    "return", "switch", "throw", "true", "try", "typeof", "var", "void", "while",
];

/// Deepest recursion the parser descends into: blocks, statements, operands
/// and chained operators all count
const MAX_NESTING: usize = 256;

/// Deepest statement or expression tree handed on to the printer and the
/// interpreter, which both recurse over it
const MAX_TREE_DEPTH: usize = 512;

const TOO_DEEP: &str = "expression nested too deeply";

/// Recursive-descent parser shared by both dialects.
///
/// The typed dialect accepts type annotations, `interface`/`type` declarations,
/// generic parameter lists, `as` casts and non-null assertions, and drops them
/// while building the tree. The plain dialect rejects them as syntax errors.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    dialect: Dialect,
    imports: usize,
    depth: usize,
}

type PResult<T> = Result<T, SyntaxError>;

impl Parser {
    pub fn new(tokens: Vec<Token>, dialect: Dialect) -> Self {
        Self {
            tokens,
            pos: 0,
            dialect,
            imports: 0,
            depth: 0,
        }
    }

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut body = Vec::new();

        while !self.at_eof() {
            let span = self.peek().span;
            let start = body.len();
            if self.is_ident("import") && !self.next_is_punct("(") {
                self.parse_import(&mut body)?;
            } else if self.is_ident("export") {
                self.parse_export(&mut body)?;
            } else {
                body.push(self.parse_statement()?);
            }
            // operator and member chains are built in loops, so they can
            // outgrow the recursion guard
            if body[start..].iter().any(|stmt| stmt_fits(stmt, MAX_TREE_DEPTH).is_err()) {
                return Err(SyntaxError::new(TOO_DEEP, span));
            }
        }

        Ok(Program { body })
    }

    // ---------------------------------------------------------------------
    // token helpers
    // ---------------------------------------------------------------------

    fn typed(&self) -> bool {
        self.dialect == Dialect::Typed
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Punct(q) if q == p)
    }

    fn next_is_punct(&self, p: &str) -> bool {
        matches!(self.peek_at(1).kind, TokenKind::Punct(q) if q == p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<Span> {
        if self.is_punct(p) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(&format!("'{}'", p)))
        }
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(n) if n == name)
    }

    fn next_is_ident(&self) -> bool {
        matches!(self.peek_at(1).kind, TokenKind::Ident(_))
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.is_ident(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, name: &str) -> PResult<()> {
        if self.eat_ident(name) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", name)))
        }
    }

    /// A binding name: any identifier that is not a reserved word
    fn expect_binding(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// A property name after `.`: reserved words are allowed here
    fn expect_property_name(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a property name")),
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let token = self.peek();
        SyntaxError::new(
            format!("expected {} but found {}", expected, token.describe()),
            token.span,
        )
    }

    fn type_syntax_error(&self, what: &str) -> SyntaxError {
        SyntaxError::new(
            format!("{} are only allowed in typed sources", what),
            self.peek().span,
        )
    }

    /// Run `parse` one level deeper, restoring the level afterwards
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let depth = self.depth;
        let result = self.deepen().and_then(|()| parse(self));
        self.depth = depth;
        result
    }

    fn deepen(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(SyntaxError::new(TOO_DEEP, self.peek().span));
        }
        Ok(())
    }

    fn consume_semicolon(&mut self) -> PResult<()> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before {
            Ok(())
        } else {
            Err(self.unexpected("';'"))
        }
    }

    // ---------------------------------------------------------------------
    // modules (lowered to CommonJS)
    // ---------------------------------------------------------------------

    fn parse_import(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        self.expect_keyword("import")?;

        if self.typed() && self.is_ident("type") && !self.next_is_ident_named("from") {
            self.skip_until_statement_end()?;
            return Ok(());
        }

        if let TokenKind::Str(module) = &self.peek().kind {
            let module = module.clone();
            self.advance();
            self.consume_semicolon()?;
            out.push(Stmt::Expr(require(&module)));
            return Ok(());
        }

        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();

        if !self.is_punct("{") && !self.is_punct("*") {
            default = Some(self.expect_binding()?);
            self.eat_punct(",");
        }
        if self.eat_punct("*") {
            self.expect_keyword("as")?;
            namespace = Some(self.expect_binding()?);
        } else if self.eat_punct("{") {
            while !self.eat_punct("}") {
                if self.typed() && self.is_ident("type") && self.next_is_ident() {
                    self.advance();
                }
                let imported = self.expect_property_name()?;
                let local = if self.eat_ident("as") {
                    self.expect_binding()?
                } else {
                    imported.clone()
                };
                named.push((imported, local));
                if !self.eat_punct(",") {
                    self.expect_punct("}")?;
                    break;
                }
            }
        }

        self.expect_keyword("from")?;
        let module = match &self.peek().kind {
            TokenKind::Str(m) => m.clone(),
            _ => return Err(self.unexpected("a module specifier")),
        };
        self.advance();
        self.consume_semicolon()?;

        let binding = match &namespace {
            Some(ns) => ns.clone(),
            None => {
                let name = format!("__import{}", self.imports);
                self.imports += 1;
                name
            }
        };
        out.push(const_decl(&binding, require(&module)));

        if let Some(local) = default {
            out.push(const_decl(&local, Expr::member(Expr::ident(&binding), "default")));
        }
        for (imported, local) in named {
            out.push(const_decl(&local, Expr::member(Expr::ident(&binding), imported)));
        }
        Ok(())
    }

    fn next_is_ident_named(&self, name: &str) -> bool {
        matches!(&self.peek_at(1).kind, TokenKind::Ident(n) if n == name)
    }

    fn parse_export(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        self.expect_keyword("export")?;

        if self.eat_ident("default") {
            let value = self.parse_assignment()?;
            self.consume_semicolon()?;
            out.push(Stmt::Expr(Expr::assign(
                Expr::member(Expr::ident("exports"), "default"),
                value,
            )));
            return Ok(());
        }

        if self.eat_punct("{") {
            let mut pairs = Vec::new();
            while !self.eat_punct("}") {
                let local = self.expect_binding()?;
                let exported = if self.eat_ident("as") {
                    self.expect_property_name()?
                } else {
                    local.clone()
                };
                pairs.push((local, exported));
                if !self.eat_punct(",") {
                    self.expect_punct("}")?;
                    break;
                }
            }
            self.consume_semicolon()?;
            for (local, exported) in pairs {
                out.push(export_assignment(&exported, &local));
            }
            return Ok(());
        }

        let stmt = self.parse_statement()?;
        let names: Vec<String> = match &stmt {
            Stmt::Function(decl) => decl.name.iter().cloned().collect(),
            Stmt::VarDecl { decls, .. } => decls.iter().map(|d| d.name.clone()).collect(),
            // type-only declarations vanish along with their export
            Stmt::Empty => Vec::new(),
            _ => return Err(SyntaxError::new("only declarations can be exported", self.peek().span)),
        };
        out.push(stmt);
        for name in names {
            out.push(export_assignment(&name, &name));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // statements
    // ---------------------------------------------------------------------

    fn parse_statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> PResult<Stmt> {
        let span = self.peek().span;

        if self.is_punct("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }

        let keyword = match &self.peek().kind {
            TokenKind::Ident(name) => name.clone(),
            _ => String::new(),
        };

        match keyword.as_str() {
            "const" if self.next_is_ident_named("enum") => Err(SyntaxError::new(
                "'enum' declarations are not supported",
                span,
            )),
            "let" | "const" | "var" => {
                let stmt = self.parse_var_decl()?;
                self.consume_semicolon()?;
                Ok(stmt)
            }
            "function" => {
                self.advance();
                let decl = self.parse_function_rest(true)?;
                Ok(Stmt::Function(Rc::new(decl)))
            }
            "if" => self.parse_if(),
            "while" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body })
            }
            "do" => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect_keyword("while")?;
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                self.eat_punct(";");
                Ok(Stmt::DoWhile { body, test })
            }
            "for" => self.parse_for(),
            "switch" => self.parse_switch(),
            "return" => {
                self.advance();
                let value = if self.is_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(value))
            }
            "break" => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Break)
            }
            "continue" => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Continue)
            }
            "throw" => {
                self.advance();
                if self.peek().newline_before {
                    return Err(SyntaxError::new("illegal newline after throw", span));
                }
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(value))
            }
            "try" => self.parse_try(),
            "interface" if self.next_is_ident() => {
                if !self.typed() {
                    return Err(self.type_syntax_error("interface declarations"));
                }
                self.advance();
                while !self.is_punct("{") {
                    if self.at_eof() {
                        return Err(self.unexpected("'{'"));
                    }
                    self.advance();
                }
                self.skip_balanced("{", "}")?;
                Ok(Stmt::Empty)
            }
            "type" if self.next_is_ident() => {
                if !self.typed() {
                    return Err(self.type_syntax_error("type aliases"));
                }
                self.advance();
                self.expect_binding()?;
                if self.is_punct("<") {
                    self.skip_balanced("<", ">")?;
                }
                self.expect_punct("=")?;
                self.skip_type()?;
                self.consume_semicolon()?;
                Ok(Stmt::Empty)
            }
            "declare" if self.typed() && self.next_is_ident() => {
                self.skip_until_statement_end()?;
                Ok(Stmt::Empty)
            }
            "class" | "enum" | "namespace" | "module" | "abstract" if self.next_is_ident() => Err(
                SyntaxError::new(format!("'{}' declarations are not supported", keyword), span),
            ),
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.eat_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_var_decl(&mut self) -> PResult<Stmt> {
        let kind = match self.advance().kind {
            TokenKind::Ident(ref k) if k == "const" => DeclKind::Const,
            TokenKind::Ident(ref k) if k == "var" => DeclKind::Var,
            _ => DeclKind::Let,
        };

        let mut decls = Vec::new();
        loop {
            let name = self.expect_binding()?;
            if self.typed() {
                self.eat_punct("!");
            }
            self.skip_annotation()?;
            let init = if self.eat_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const && init.is_none() && !self.is_ident("of") && !self.is_ident("in") {
                return Err(SyntaxError::new(
                    format!("missing initializer in const declaration '{}'", name),
                    self.peek().span,
                ));
            }
            decls.push(Declarator { name, init });
            if !self.eat_punct(",") {
                break;
            }
        }

        Ok(Stmt::VarDecl { kind, decls })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.expect_keyword("if")?;
        self.expect_punct("(")?;
        let test = self.parse_expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat_ident("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.expect_keyword("for")?;
        self.expect_punct("(")?;

        let is_decl = self.is_ident("let") || self.is_ident("const") || self.is_ident("var");
        if is_decl && self.next_is_ident() {
            let is_each = matches!(&self.peek_at(2).kind, TokenKind::Ident(k) if k == "of" || k == "in");
            if is_each {
                let kind = match self.advance().kind {
                    TokenKind::Ident(ref k) if k == "const" => DeclKind::Const,
                    TokenKind::Ident(ref k) if k == "var" => DeclKind::Var,
                    _ => DeclKind::Let,
                };
                let name = self.expect_binding()?;
                let of = self.eat_ident("of");
                if !of {
                    self.expect_keyword("in")?;
                }
                let iterable = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::ForEach {
                    kind,
                    name,
                    of,
                    iterable,
                    body,
                });
            }
        }

        let init = if self.is_punct(";") {
            None
        } else if is_decl {
            Some(Box::new(self.parse_var_decl()?))
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expression()?)))
        };
        self.expect_punct(";")?;
        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        self.expect_keyword("switch")?;
        self.expect_punct("(")?;
        let discriminant = self.parse_expression()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;

        let mut cases = Vec::new();
        while !self.eat_punct("}") {
            let test = if self.eat_ident("case") {
                Some(self.parse_expression()?)
            } else if self.eat_ident("default") {
                None
            } else {
                return Err(self.unexpected("'case' or 'default'"));
            };
            self.expect_punct(":")?;

            let mut body = Vec::new();
            while !self.is_ident("case") && !self.is_ident("default") && !self.is_punct("}") {
                if self.at_eof() {
                    return Err(self.unexpected("'}'"));
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }

        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let span = self.peek().span;
        self.expect_keyword("try")?;
        let block = self.parse_block()?;

        let handler = if self.eat_ident("catch") {
            let param = if self.eat_punct("(") {
                let name = self.expect_binding()?;
                self.skip_annotation()?;
                self.expect_punct(")")?;
                Some(name)
            } else {
                None
            };
            Some(CatchClause {
                param,
                body: self.parse_block()?,
            })
        } else {
            None
        };

        let finalizer = if self.eat_ident("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(SyntaxError::new("missing catch or finally after try", span));
        }

        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    /// Parse what follows the `function` keyword
    fn parse_function_rest(&mut self, require_name: bool) -> PResult<FunctionDecl> {
        let name = if require_name {
            Some(self.expect_binding()?)
        } else if matches!(self.peek().kind, TokenKind::Ident(_)) {
            Some(self.expect_binding()?)
        } else {
            None
        };

        self.skip_type_parameters()?;
        let params = self.parse_params()?;
        self.skip_annotation()?;
        let body = FunctionBody::Block(self.parse_block()?);

        Ok(FunctionDecl {
            name,
            params,
            body,
            arrow: false,
        })
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();

        while !self.eat_punct(")") {
            let rest = self.eat_punct("...");
            let name = self.expect_binding()?;
            if self.typed() {
                self.eat_punct("?");
            }
            self.skip_annotation()?;
            let default = if self.eat_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param { name, default, rest });

            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
            if rest {
                return Err(SyntaxError::new(
                    "rest parameter must be last",
                    self.peek().span,
                ));
            }
        }

        Ok(params)
    }

    // ---------------------------------------------------------------------
    // expressions
    // ---------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> PResult<Expr> {
        if let Some(arrow) = self.try_arrow()? {
            return Ok(arrow);
        }

        let span = self.peek().span;
        let left = self.parse_conditional()?;

        let op = match self.peek().kind {
            TokenKind::Punct("=") => AssignOp::Assign,
            TokenKind::Punct("+=") => AssignOp::Add,
            TokenKind::Punct("-=") => AssignOp::Sub,
            TokenKind::Punct("*=") => AssignOp::Mul,
            TokenKind::Punct("/=") => AssignOp::Div,
            TokenKind::Punct("%=") => AssignOp::Rem,
            TokenKind::Punct("**=") => AssignOp::Pow,
            _ => return Ok(left),
        };

        if !matches!(left, Expr::Ident(_) | Expr::Member { optional: false, .. } | Expr::Index { optional: false, .. }) {
            return Err(SyntaxError::new("invalid assignment target", span));
        }
        self.advance();
        let value = self.parse_assignment()?;

        Ok(Expr::Assign {
            op,
            target: Box::new(left),
            value: Box::new(value),
        })
    }

    /// Speculatively parse an arrow function, rewinding when the tokens turn
    /// out to be something else
    fn try_arrow(&mut self) -> PResult<Option<Expr>> {
        // x => ...
        if matches!(self.peek().kind, TokenKind::Ident(ref n) if !RESERVED.contains(&n.as_str()))
            && self.next_is_punct("=>")
        {
            let name = self.expect_binding()?;
            self.advance();
            let body = self.parse_arrow_body()?;
            return Ok(Some(arrow(vec![Param { name, default: None, rest: false }], body)));
        }

        let generic = self.typed() && self.is_punct("<");
        if !self.is_punct("(") && !generic {
            return Ok(None);
        }

        let start = self.pos;
        let attempt = (|| -> PResult<Option<Vec<Param>>> {
            if generic {
                self.skip_balanced("<", ">")?;
            }
            let params = self.parse_params()?;
            if self.typed() && self.is_punct(":") {
                self.skip_annotation()?;
            }
            if self.is_punct("=>") && !self.peek().newline_before {
                Ok(Some(params))
            } else {
                Ok(None)
            }
        })();

        match attempt {
            Ok(Some(params)) => {
                self.advance();
                let body = self.parse_arrow_body()?;
                Ok(Some(arrow(params, body)))
            }
            _ => {
                self.pos = start;
                Ok(None)
            }
        }
    }

    fn parse_arrow_body(&mut self) -> PResult<FunctionBody> {
        if self.is_punct("{") {
            Ok(FunctionBody::Block(self.parse_block()?))
        } else {
            Ok(FunctionBody::Expr(Box::new(self.parse_assignment()?)))
        }
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let test = self.parse_binary(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        self.nested(|p| p.binary(min_prec))
    }

    fn binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            if self.typed() && self.is_ident("as") && 11 >= min_prec {
                self.advance();
                if !self.eat_ident("const") {
                    self.skip_type()?;
                }
                continue;
            }

            let Some(op) = self.peek_operator() else {
                break;
            };
            let (prec, right_assoc) = match op {
                Operator::Binary(b) => (b.precedence(), b == BinaryOp::Pow),
                Operator::Logical(l) => (l.precedence(), false),
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            self.deepen()?;

            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;

            left = match op {
                Operator::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Operator::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    fn peek_operator(&self) -> Option<Operator> {
        let op = match &self.peek().kind {
            TokenKind::Punct(p) => match *p {
                "+" => Operator::Binary(BinaryOp::Add),
                "-" => Operator::Binary(BinaryOp::Sub),
                "*" => Operator::Binary(BinaryOp::Mul),
                "/" => Operator::Binary(BinaryOp::Div),
                "%" => Operator::Binary(BinaryOp::Rem),
                "**" => Operator::Binary(BinaryOp::Pow),
                "==" => Operator::Binary(BinaryOp::Eq),
                "!=" => Operator::Binary(BinaryOp::NotEq),
                "===" => Operator::Binary(BinaryOp::StrictEq),
                "!==" => Operator::Binary(BinaryOp::StrictNotEq),
                "<" => Operator::Binary(BinaryOp::Lt),
                "<=" => Operator::Binary(BinaryOp::LtEq),
                ">" => Operator::Binary(BinaryOp::Gt),
                ">=" => Operator::Binary(BinaryOp::GtEq),
                "&&" => Operator::Logical(LogicalOp::And),
                "||" => Operator::Logical(LogicalOp::Or),
                "??" => Operator::Logical(LogicalOp::Nullish),
                _ => return None,
            },
            TokenKind::Ident(name) if name == "in" => Operator::Binary(BinaryOp::In),
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        self.nested(Self::unary)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match &self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Ident(k) if k == "typeof" => Some(UnaryOp::Typeof),
            TokenKind::Ident(k) if k == "void" => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                arg: Box::new(arg),
            });
        }

        if self.is_punct("++") || self.is_punct("--") {
            let increment = self.is_punct("++");
            let span = self.advance().span;
            let target = self.parse_unary()?;
            check_update_target(&target, span)?;
            return Ok(Expr::Update {
                increment,
                prefix: true,
                target: Box::new(target),
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let expr = self.parse_call_member()?;

        if (self.is_punct("++") || self.is_punct("--")) && !self.peek().newline_before {
            let increment = self.is_punct("++");
            let span = self.advance().span;
            check_update_target(&expr, span)?;
            return Ok(Expr::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
            });
        }

        Ok(expr)
    }

    fn parse_call_member(&mut self) -> PResult<Expr> {
        self.nested(Self::call_member)
    }

    fn call_member(&mut self) -> PResult<Expr> {
        let mut expr = if self.is_ident("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            if self.is_punct(".") || self.is_punct("?.") || self.is_punct("[") || self.is_punct("(") {
                self.deepen()?;
            }
            if self.eat_punct(".") {
                let property = self.expect_property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    optional: false,
                };
            } else if self.eat_punct("?.") {
                if self.is_punct("(") {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: true,
                    };
                } else if self.eat_punct("[") {
                    let index = self.parse_expression()?;
                    self.expect_punct("]")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                    };
                } else {
                    let property = self.expect_property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: true,
                    };
                }
            } else if self.eat_punct("[") {
                let index = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: false,
                };
            } else if self.is_punct("(") {
                let args = self.parse_arguments()?;
                expr = Expr::call(expr, args);
            } else if self.typed() && self.is_punct("!") && !self.peek().newline_before {
                // non-null assertion
                self.advance();
            } else if self.typed() && self.is_punct("<") && self.skip_call_type_arguments() {
                // explicit type arguments: `id<number>(4)`
                self.deepen()?;
                let args = self.parse_arguments()?;
                expr = Expr::call(expr, args);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_new(&mut self) -> PResult<Expr> {
        self.expect_keyword("new")?;
        let mut callee = self.parse_primary()?;
        while self.eat_punct(".") {
            let property = self.expect_property_name()?;
            callee = Expr::member(callee, property);
        }
        if self.typed() && self.is_punct("<") {
            self.skip_balanced("<", ">")?;
        }
        let args = if self.is_punct("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            if self.eat_punct("...") {
                args.push(Expr::Spread(Box::new(self.parse_assignment()?)));
            } else {
                args.push(self.parse_assignment()?);
            }
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.advance();

        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Template(parts) => self.parse_template(parts),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "undefined" => Ok(Expr::Undefined),
                "function" => {
                    let decl = self.parse_function_rest(false)?;
                    Ok(Expr::Function(Rc::new(decl)))
                }
                "class" => Err(SyntaxError::new("classes are not supported", token.span)),
                n if RESERVED.contains(&n) => Err(SyntaxError::new(
                    format!("unexpected keyword '{}'", n),
                    token.span,
                )),
                _ => Ok(Expr::Ident(name)),
            },
            TokenKind::Punct("(") => {
                let expr = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    if self.eat_punct("...") {
                        items.push(Expr::Spread(Box::new(self.parse_assignment()?)));
                    } else {
                        items.push(self.parse_assignment()?);
                    }
                    if !self.eat_punct(",") {
                        self.expect_punct("]")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            TokenKind::Punct("{") => self.parse_object(),
            _ => {
                self.pos -= 1;
                Err(self.unexpected("an expression"))
            }
        }
    }

    fn parse_object(&mut self) -> PResult<Expr> {
        let mut props = Vec::new();

        while !self.eat_punct("}") {
            if self.eat_punct("...") {
                props.push(Property::Spread(self.parse_assignment()?));
            } else {
                let key_token = self.advance();
                let key = match key_token.kind {
                    TokenKind::Ident(name) => name,
                    TokenKind::Str(s) => s,
                    TokenKind::Number(n) => super::format_number(n),
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("a property name"));
                    }
                };

                let value = if self.eat_punct(":") {
                    self.parse_assignment()?
                } else if self.is_punct("(") || (self.typed() && self.is_punct("<")) {
                    self.skip_type_parameters()?;
                    let params = self.parse_params()?;
                    self.skip_annotation()?;
                    let body = FunctionBody::Block(self.parse_block()?);
                    Expr::Function(Rc::new(FunctionDecl {
                        name: Some(key.clone()),
                        params,
                        body,
                        arrow: false,
                    }))
                } else if RESERVED.contains(&key.as_str()) {
                    return Err(SyntaxError::new(
                        format!("unexpected keyword '{}'", key),
                        key_token.span,
                    ));
                } else {
                    Expr::Ident(key.clone())
                };
                props.push(Property::KeyValue { key, value });
            }

            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }

        Ok(Expr::Object(props))
    }

    fn parse_template(&mut self, parts: Vec<TemplatePart>) -> PResult<Expr> {
        let mut chunks = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Text(text) => chunks.push(TemplateChunk::Text(text)),
                TemplatePart::Expr { source, span } => {
                    let tokens = tokenize_at(&source, span)?;
                    let mut inner = Parser::new(tokens, self.dialect);
                    inner.depth = self.depth;
                    let expr = inner.parse_expression()?;
                    if !inner.at_eof() {
                        return Err(inner.unexpected("'}'"));
                    }
                    chunks.push(TemplateChunk::Expr(expr));
                }
            }
        }
        Ok(Expr::Template(chunks))
    }

    // ---------------------------------------------------------------------
    // type syntax (typed dialect only, discarded)
    // ---------------------------------------------------------------------

    /// Skip `: Type` if present
    fn skip_annotation(&mut self) -> PResult<()> {
        if !self.is_punct(":") {
            return Ok(());
        }
        if !self.typed() {
            return Err(self.type_syntax_error("type annotations"));
        }
        self.advance();
        // type predicates: `x is string`
        if matches!(self.peek().kind, TokenKind::Ident(_)) && matches!(&self.peek_at(1).kind, TokenKind::Ident(n) if n == "is") {
            self.advance();
            self.advance();
        }
        self.skip_type()
    }

    fn skip_type_parameters(&mut self) -> PResult<()> {
        if !self.is_punct("<") {
            return Ok(());
        }
        if !self.typed() {
            return Err(self.type_syntax_error("type parameters"));
        }
        self.skip_balanced("<", ">")
    }

    fn skip_type(&mut self) -> PResult<()> {
        self.nested(Self::type_union)
    }

    fn type_union(&mut self) -> PResult<()> {
        self.eat_punct("|");
        self.eat_punct("&");
        loop {
            self.skip_type_operand()?;
            if self.eat_punct("|") || self.eat_punct("&") {
                continue;
            }
            break;
        }
        Ok(())
    }

    fn skip_type_operand(&mut self) -> PResult<()> {
        while self.eat_ident("keyof") || self.eat_ident("readonly") || self.eat_ident("unique") {}

        if self.eat_ident("typeof") {
            self.expect_property_name()?;
            while self.eat_punct(".") {
                self.expect_property_name()?;
            }
        } else {
            match self.peek().kind.clone() {
                TokenKind::Ident(_) => {
                    self.advance();
                    while self.eat_punct(".") {
                        self.expect_property_name()?;
                    }
                    if self.is_punct("<") && !self.peek().newline_before {
                        self.skip_balanced("<", ">")?;
                    }
                }
                TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::Template(_) => {
                    self.advance();
                }
                TokenKind::Punct("-") => {
                    self.advance();
                    match self.peek().kind {
                        TokenKind::Number(_) => {
                            self.advance();
                        }
                        _ => return Err(self.unexpected("a number")),
                    }
                }
                TokenKind::Punct("{") => self.skip_balanced("{", "}")?,
                TokenKind::Punct("[") => self.skip_balanced("[", "]")?,
                TokenKind::Punct("(") => {
                    self.skip_balanced("(", ")")?;
                    if self.eat_punct("=>") {
                        self.skip_type()?;
                    }
                }
                TokenKind::Punct("<") => {
                    self.skip_balanced("<", ">")?;
                    self.skip_balanced("(", ")")?;
                    self.expect_punct("=>")?;
                    self.skip_type()?;
                }
                _ => return Err(self.unexpected("a type")),
            }
        }

        // array suffixes and indexed access
        while self.is_punct("[") && !self.peek().newline_before {
            self.advance();
            if self.eat_punct("]") {
                continue;
            }
            self.skip_type()?;
            self.expect_punct("]")?;
        }
        Ok(())
    }

    /// Skip `<...>` when it is a type argument list directly followed by a
    /// call's `(`; otherwise leave the position alone so `<` parses as a
    /// comparison
    fn skip_call_type_arguments(&mut self) -> bool {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match &self.peek().kind {
                TokenKind::Punct("<") => depth += 1,
                TokenKind::Punct(">") => depth -= 1,
                TokenKind::Punct("," | "." | "[" | "]" | "{" | "}" | "|" | "&" | ":" | "?")
                | TokenKind::Ident(_)
                | TokenKind::Str(_)
                | TokenKind::Number(_) => {}
                _ => break,
            }
            self.advance();
            if depth == 0 {
                if self.is_punct("(") {
                    return true;
                }
                break;
            }
        }
        self.pos = start;
        false
    }

    fn skip_balanced(&mut self, open: &str, close: &str) -> PResult<()> {
        let start = self.expect_punct(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            if self.at_eof() {
                return Err(SyntaxError::new(format!("unbalanced '{}'", open), start));
            }
            if self.is_punct(open) {
                depth += 1;
            } else if self.is_punct(close) {
                depth -= 1;
            }
            self.advance();
        }
        Ok(())
    }

    /// Skip an ambient statement up to its terminating `;` or braced body
    fn skip_until_statement_end(&mut self) -> PResult<()> {
        loop {
            if self.at_eof() || self.eat_punct(";") {
                return Ok(());
            }
            if self.is_punct("{") {
                return self.skip_balanced("{", "}");
            }
            self.advance();
            if self.peek().newline_before {
                return Ok(());
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn check_update_target(target: &Expr, span: Span) -> PResult<()> {
    match target {
        Expr::Ident(_) | Expr::Member { optional: false, .. } | Expr::Index { optional: false, .. } => Ok(()),
        _ => Err(SyntaxError::new(
            "invalid left-hand side expression in update operation",
            span,
        )),
    }
}

fn arrow(params: Vec<Param>, body: FunctionBody) -> Expr {
    Expr::Function(Rc::new(FunctionDecl {
        name: None,
        params,
        body,
        arrow: true,
    }))
}

fn require(module: &str) -> Expr {
    Expr::call(Expr::ident("require"), vec![Expr::Str(module.to_string())])
}

fn const_decl(name: &str, init: Expr) -> Stmt {
    Stmt::VarDecl {
        kind: DeclKind::Const,
        decls: vec![Declarator {
            name: name.to_string(),
            init: Some(init),
        }],
    }
}

fn export_assignment(exported: &str, local: &str) -> Stmt {
    Stmt::Expr(Expr::assign(
        Expr::member(Expr::ident("exports"), exported),
        Expr::ident(local),
    ))
}

/// Marks a tree deeper than the budget it was checked against
struct TooDeep;

type Fits = Result<(), TooDeep>;

fn stmt_fits(stmt: &Stmt, budget: usize) -> Fits {
    let budget = budget.checked_sub(1).ok_or(TooDeep)?;
    match stmt {
        Stmt::Empty | Stmt::Break | Stmt::Continue | Stmt::Return(None) => Ok(()),
        Stmt::Expr(expr) | Stmt::Throw(expr) | Stmt::Return(Some(expr)) => expr_fits(expr, budget),
        Stmt::VarDecl { decls, .. } => decls
            .iter()
            .filter_map(|decl| decl.init.as_ref())
            .try_for_each(|init| expr_fits(init, budget)),
        Stmt::Function(decl) => function_fits(decl, budget),
        Stmt::Block(body) => block_fits(body, budget),
        Stmt::If { test, consequent, alternate } => {
            expr_fits(test, budget)?;
            stmt_fits(consequent, budget)?;
            alternate.as_deref().map_or(Ok(()), |alt| stmt_fits(alt, budget))
        }
        Stmt::While { test, body } | Stmt::DoWhile { body, test } => {
            expr_fits(test, budget)?;
            stmt_fits(body, budget)
        }
        Stmt::For { init, test, update, body } => {
            if let Some(init) = init {
                stmt_fits(init, budget)?;
            }
            test.iter().chain(update).try_for_each(|expr| expr_fits(expr, budget))?;
            stmt_fits(body, budget)
        }
        Stmt::ForEach { iterable, body, .. } => {
            expr_fits(iterable, budget)?;
            stmt_fits(body, budget)
        }
        Stmt::Switch { discriminant, cases } => {
            expr_fits(discriminant, budget)?;
            cases.iter().try_for_each(|case| {
                case.test.as_ref().map_or(Ok(()), |test| expr_fits(test, budget))?;
                block_fits(&case.body, budget)
            })
        }
        Stmt::Try { block, handler, finalizer } => {
            block_fits(block, budget)?;
            if let Some(handler) = handler {
                block_fits(&handler.body, budget)?;
            }
            finalizer.as_deref().map_or(Ok(()), |body| block_fits(body, budget))
        }
    }
}

fn block_fits(body: &[Stmt], budget: usize) -> Fits {
    body.iter().try_for_each(|stmt| stmt_fits(stmt, budget))
}

fn function_fits(decl: &FunctionDecl, budget: usize) -> Fits {
    decl.params
        .iter()
        .filter_map(|param| param.default.as_ref())
        .try_for_each(|default| expr_fits(default, budget))?;
    match &decl.body {
        FunctionBody::Block(body) => block_fits(body, budget),
        FunctionBody::Expr(expr) => expr_fits(expr, budget),
    }
}

fn expr_fits(expr: &Expr, budget: usize) -> Fits {
    let budget = budget.checked_sub(1).ok_or(TooDeep)?;
    match expr {
        Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Null | Expr::Undefined | Expr::Ident(_) => Ok(()),
        Expr::Template(chunks) => chunks.iter().try_for_each(|chunk| match chunk {
            TemplateChunk::Text(_) => Ok(()),
            TemplateChunk::Expr(expr) => expr_fits(expr, budget),
        }),
        Expr::Array(items) => items.iter().try_for_each(|item| expr_fits(item, budget)),
        Expr::Object(props) => props.iter().try_for_each(|prop| match prop {
            Property::KeyValue { value, .. } | Property::Spread(value) => expr_fits(value, budget),
        }),
        Expr::Function(decl) => function_fits(decl, budget),
        Expr::Spread(arg) | Expr::Unary { arg, .. } | Expr::Update { target: arg, .. } | Expr::Member { object: arg, .. } => {
            expr_fits(arg, budget)
        }
        Expr::Binary { left, right, .. }
        | Expr::Logical { left, right, .. }
        | Expr::Assign { target: left, value: right, .. }
        | Expr::Index { object: left, index: right, .. } => {
            expr_fits(left, budget)?;
            expr_fits(right, budget)
        }
        Expr::Conditional { test, consequent, alternate } => {
            expr_fits(test, budget)?;
            expr_fits(consequent, budget)?;
            expr_fits(alternate, budget)
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args } => {
            expr_fits(callee, budget)?;
            args.iter().try_for_each(|arg| expr_fits(arg, budget))
        }
    }
}
