use super::ast::*;
use super::format_number;

const INDENT: &str = "    ";

/// Render a program as plain script text
pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::default();
    for stmt in &program.body {
        printer.stmt(stmt);
    }
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block_lines(&mut self, body: &[Stmt]) {
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty => {}
            Stmt::Expr(expr) => {
                let text = expr_text(expr);
                if needs_statement_parens(expr) {
                    self.line(&format!("({});", text));
                } else {
                    self.line(&format!("{};", text));
                }
            }
            Stmt::VarDecl { .. } => {
                let text = var_decl_text(stmt);
                self.line(&format!("{};", text));
            }
            Stmt::Function(decl) => {
                let name = decl.name.as_deref().unwrap_or_default();
                self.line(&format!("function {}({}) {{", name, params_text(&decl.params)));
                self.function_body(&decl.body);
                self.line("}");
            }
            Stmt::Block(body) => {
                self.line("{");
                self.block_lines(body);
                self.line("}");
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.line(&format!("if ({}) {{", expr_text(test)));
                self.nested(consequent);
                let mut alternate = alternate.as_deref();
                while let Some(alt) = alternate {
                    match alt {
                        Stmt::If {
                            test,
                            consequent,
                            alternate: next,
                        } => {
                            self.line(&format!("}} else if ({}) {{", expr_text(test)));
                            self.nested(consequent);
                            alternate = next.as_deref();
                        }
                        other => {
                            self.line("} else {");
                            self.nested(other);
                            alternate = None;
                        }
                    }
                }
                self.line("}");
            }
            Stmt::While { test, body } => {
                self.line(&format!("while ({}) {{", expr_text(test)));
                self.nested(body);
                self.line("}");
            }
            Stmt::DoWhile { body, test } => {
                self.line("do {");
                self.nested(body);
                self.line(&format!("}} while ({});", expr_text(test)));
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let init = match init.as_deref() {
                    Some(Stmt::Expr(expr)) => expr_text(expr),
                    Some(decl @ Stmt::VarDecl { .. }) => var_decl_text(decl),
                    _ => String::new(),
                };
                let test = test.as_ref().map(expr_text).unwrap_or_default();
                let update = update.as_ref().map(expr_text).unwrap_or_default();
                self.line(&format!("for ({}; {}; {}) {{", init, test, update));
                self.nested(body);
                self.line("}");
            }
            Stmt::ForEach {
                kind,
                name,
                of,
                iterable,
                body,
            } => {
                let word = if *of { "of" } else { "in" };
                self.line(&format!(
                    "for ({} {} {} {}) {{",
                    kind.keyword(),
                    name,
                    word,
                    expr_text(iterable)
                ));
                self.nested(body);
                self.line("}");
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                self.line(&format!("switch ({}) {{", expr_text(discriminant)));
                self.depth += 1;
                for case in cases {
                    match &case.test {
                        Some(test) => self.line(&format!("case {}:", expr_text(test))),
                        None => self.line("default:"),
                    }
                    self.block_lines(&case.body);
                }
                self.depth -= 1;
                self.line("}");
            }
            Stmt::Return(value) => match value {
                Some(value) => self.line(&format!("return {};", expr_text(value))),
                None => self.line("return;"),
            },
            Stmt::Break => self.line("break;"),
            Stmt::Continue => self.line("continue;"),
            Stmt::Throw(value) => self.line(&format!("throw {};", expr_text(value))),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                self.line("try {");
                self.block_lines(block);
                if let Some(handler) = handler {
                    match &handler.param {
                        Some(param) => self.line(&format!("}} catch ({}) {{", param)),
                        None => self.line("} catch {"),
                    }
                    self.block_lines(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.line("} finally {");
                    self.block_lines(finalizer);
                }
                self.line("}");
            }
        }
    }

    /// Print the body of a braced construct, flattening a block statement
    fn nested(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(body) => self.block_lines(body),
            other => {
                self.depth += 1;
                self.stmt(other);
                self.depth -= 1;
            }
        }
    }

    fn function_body(&mut self, body: &FunctionBody) {
        match body {
            FunctionBody::Block(stmts) => self.block_lines(stmts),
            FunctionBody::Expr(expr) => {
                self.depth += 1;
                self.line(&format!("return {};", expr_text(expr)));
                self.depth -= 1;
            }
        }
    }
}

fn var_decl_text(stmt: &Stmt) -> String {
    let Stmt::VarDecl { kind, decls } = stmt else {
        return String::new();
    };
    let decls: Vec<String> = decls
        .iter()
        .map(|d| match &d.init {
            Some(init) => format!("{} = {}", d.name, wrap(init, 2)),
            None => d.name.clone(),
        })
        .collect();
    format!("{} {}", kind.keyword(), decls.join(", "))
}

fn params_text(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| {
            let mut text = String::new();
            if p.rest {
                text.push_str("...");
            }
            text.push_str(&p.name);
            if let Some(default) = &p.default {
                text.push_str(" = ");
                text.push_str(&wrap(default, 2));
            }
            text
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// An expression statement that would otherwise parse as a block or declaration
fn needs_statement_parens(expr: &Expr) -> bool {
    let mut current = expr;
    loop {
        current = match current {
            Expr::Object(_) => return true,
            Expr::Function(decl) => return !decl.arrow,
            Expr::Member { object, .. }
            | Expr::Index { object, .. }
            | Expr::Call { callee: object, .. } => {
                // member_object already parenthesizes these
                if matches!(object.as_ref(), Expr::Object(_) | Expr::Function(_)) {
                    return false;
                }
                object
            }
            Expr::Binary { left, .. } | Expr::Logical { left, .. } => left,
            Expr::Assign { target, .. } => target,
            Expr::Conditional { test, .. } => test,
            Expr::Update {
                prefix: false,
                target,
                ..
            } => target,
            _ => return false,
        };
    }
}

/// Print `expr`, parenthesized when it binds looser than `min_prec`
fn wrap(expr: &Expr, min_prec: u8) -> String {
    let text = expr_text(expr);
    if expr.precedence() < min_prec {
        format!("({})", text)
    } else {
        text
    }
}

pub(crate) fn expr_text(expr: &Expr) -> String {
    match expr {
        Expr::Number(n) => {
            if *n < 0.0 || (*n == 0.0 && n.is_sign_negative()) {
                format!("({})", format_number(*n))
            } else {
                format_number(*n)
            }
        }
        Expr::Str(s) => quote(s),
        Expr::Template(chunks) => {
            let mut out = String::from("`");
            for chunk in chunks {
                match chunk {
                    TemplateChunk::Text(text) => {
                        for c in text.chars() {
                            match c {
                                '`' => out.push_str("\\`"),
                                '\\' => out.push_str("\\\\"),
                                '$' => out.push_str("\\$"),
                                c => out.push(c),
                            }
                        }
                    }
                    TemplateChunk::Expr(expr) => {
                        out.push_str("${");
                        out.push_str(&expr_text(expr));
                        out.push('}');
                    }
                }
            }
            out.push('`');
            out
        }
        Expr::Bool(b) => b.to_string(),
        Expr::Null => "null".to_string(),
        Expr::Undefined => "undefined".to_string(),
        Expr::Ident(name) => name.clone(),
        Expr::Array(items) => {
            let items: Vec<String> = items.iter().map(|i| wrap(i, 1)).collect();
            format!("[{}]", items.join(", "))
        }
        Expr::Object(props) => {
            if props.is_empty() {
                return "{}".to_string();
            }
            let props: Vec<String> = props
                .iter()
                .map(|p| match p {
                    Property::KeyValue { key, value } => {
                        let key = if is_identifier_name(key) {
                            key.clone()
                        } else {
                            quote(key)
                        };
                        format!("{}: {}", key, wrap(value, 2))
                    }
                    Property::Spread(value) => format!("...{}", wrap(value, 2)),
                })
                .collect();
            format!("{{ {} }}", props.join(", "))
        }
        Expr::Function(decl) => function_text(decl),
        Expr::Spread(arg) => format!("...{}", wrap(arg, 2)),
        Expr::Unary { op, arg } => {
            let arg = wrap(arg, 16);
            match op {
                UnaryOp::Not => format!("!{}", arg),
                UnaryOp::Neg if arg.starts_with('-') => format!("-({})", arg),
                UnaryOp::Neg => format!("-{}", arg),
                UnaryOp::Plus if arg.starts_with('+') => format!("+({})", arg),
                UnaryOp::Plus => format!("+{}", arg),
                UnaryOp::Typeof => format!("typeof {}", arg),
                UnaryOp::Void => format!("void {}", arg),
            }
        }
        Expr::Update {
            increment,
            prefix,
            target,
        } => {
            let op = if *increment { "++" } else { "--" };
            let target = wrap(target, 18);
            if *prefix {
                format!("{}{}", op, target)
            } else {
                format!("{}{}", target, op)
            }
        }
        Expr::Binary { op, left, right } => {
            let prec = op.precedence();
            let (left_min, right_min) = if *op == BinaryOp::Pow {
                (prec + 2, prec)
            } else {
                (prec, prec + 1)
            };
            format!("{} {} {}", wrap(left, left_min), op.symbol(), wrap(right, right_min))
        }
        Expr::Logical { op, left, right } => {
            // mixing ?? with && or || requires explicit grouping
            let strict = |e: &Expr| matches!(e, Expr::Logical { op: inner, .. } if (*inner == LogicalOp::Nullish) != (*op == LogicalOp::Nullish));
            let prec = op.precedence();
            let left = if strict(left) { format!("({})", expr_text(left)) } else { wrap(left, prec) };
            let right = if strict(right) { format!("({})", expr_text(right)) } else { wrap(right, prec + 1) };
            format!("{} {} {}", left, op.symbol(), right)
        }
        Expr::Assign { op, target, value } => {
            format!("{} {} {}", wrap(target, 18), op.symbol(), wrap(value, 2))
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => format!(
            "{} ? {} : {}",
            wrap(test, 4),
            wrap(consequent, 2),
            wrap(alternate, 2)
        ),
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let dot = if *optional { "?." } else { "." };
            format!("{}{}{}", member_object(object), dot, property)
        }
        Expr::Index {
            object,
            index,
            optional,
        } => {
            let open = if *optional { "?.[" } else { "[" };
            format!("{}{}{}]", member_object(object), open, expr_text(index))
        }
        Expr::Call {
            callee,
            args,
            optional,
        } => {
            let open = if *optional { "?.(" } else { "(" };
            format!("{}{}{})", member_object(callee), open, args_text(args))
        }
        Expr::New { callee, args } => {
            format!("new {}({})", member_object(callee), args_text(args))
        }
    }
}

fn member_object(object: &Expr) -> String {
    match object {
        // `1.toString()` would lex the dot as a fraction
        Expr::Number(_) => format!("({})", expr_text(object)),
        Expr::Function(_) | Expr::Object(_) => format!("({})", expr_text(object)),
        other => wrap(other, 18),
    }
}

fn args_text(args: &[Expr]) -> String {
    args.iter().map(|a| wrap(a, 1)).collect::<Vec<_>>().join(", ")
}

fn function_text(decl: &FunctionDecl) -> String {
    let params = params_text(&decl.params);
    let mut nested = Printer {
        out: String::new(),
        depth: 1,
    };

    if decl.arrow {
        match &decl.body {
            FunctionBody::Expr(expr) => {
                let body = match expr.as_ref() {
                    Expr::Object(_) => format!("({})", expr_text(expr)),
                    other => wrap(other, 2),
                };
                return format!("({}) => {}", params, body);
            }
            FunctionBody::Block(stmts) => {
                for stmt in stmts {
                    nested.stmt(stmt);
                }
                return format!("({}) => {{\n{}}}", params, nested.out);
            }
        }
    }

    nested.function_body(&decl.body);
    // the nested printer indents one level too deep for the body; shift it back
    let body: String = nested
        .out
        .lines()
        .map(|l| format!("{}\n", l.strip_prefix(INDENT).unwrap_or(l)))
        .collect();
    let name = decl.name.as_deref().unwrap_or_default();
    let sep = if name.is_empty() { "" } else { " " };
    format!("function{}{}({}) {{\n{}}}", sep, name, params, body)
}

fn is_identifier_name(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

/// Quote a string as a double-quoted literal
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
