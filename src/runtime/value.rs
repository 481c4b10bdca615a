use super::interpreter::{Env, Interpreter};
use super::RuntimeError;
use crate::script::ast::FunctionDecl;
use crate::script::format_number;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Host function signature: interpreter, bound receiver, arguments
pub type NativeFn = fn(&mut Interpreter, &Value, Vec<Value>) -> Result<Value, RuntimeError>;

/// Nesting depth past which string conversion renders an empty string
const MAX_DISPLAY_DEPTH: usize = 32;

/// Arrays and error objects currently being converted, innermost last
type Open = Vec<*const ()>;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Function>),
}

#[derive(Default)]
pub struct Object {
    pub props: IndexMap<String, Value>,
    /// Created by an `Error` constructor; affects string conversion
    pub is_error: bool,
}

pub enum Function {
    Closure { decl: Rc<FunctionDecl>, env: Env },
    Native {
        name: &'static str,
        this: Value,
        func: NativeFn,
    },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Closure { decl, .. } => decl.name.as_deref().unwrap_or(""),
            Function::Native { name, .. } => name,
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(Object {
            props,
            is_error: false,
        })))
    }

    pub fn native(name: &'static str, func: NativeFn) -> Self {
        Value::Function(Rc::new(Function::Native {
            name,
            this: Value::Undefined,
            func,
        }))
    }

    /// An `Error`-like object with `name` and `message`
    pub fn error(name: &str, message: &str) -> Self {
        let mut props = IndexMap::new();
        props.insert("name".to_string(), Value::str(name));
        props.insert("message".to_string(), Value::str(message));
        Value::Object(Rc::new(RefCell::new(Object {
            props,
            is_error: true,
        })))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => parse_numeric(s),
            Value::Array(_) => parse_numeric(&self.to_display()),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// String conversion as performed by concatenation and `String(x)`
    pub fn to_display(&self) -> String {
        self.display_in(&mut Open::new())
    }

    fn display_in(&self, open: &mut Open) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(items) => join_in(items, ",", open),
            Value::Object(object) => {
                if !object.borrow().is_error {
                    return "[object Object]".to_string();
                }
                let ptr = Rc::as_ptr(object) as *const ();
                if open.len() > MAX_DISPLAY_DEPTH || open.contains(&ptr) {
                    return String::new();
                }
                open.push(ptr);
                let object = object.borrow();
                let name = object
                    .props
                    .get("name")
                    .map(|v| v.display_in(open))
                    .unwrap_or_else(|| "Error".to_string());
                let message = object
                    .props
                    .get("message")
                    .map(|v| v.display_in(open))
                    .unwrap_or_default();
                open.pop();
                if message.is_empty() {
                    name
                } else {
                    format!("{}: {}", name, message)
                }
            }
            Value::Function(f) => format!("function {}() {{ [code] }}", f.name()),
        }
    }

    /// The text reported when this value escapes as an uncaught exception
    pub fn error_message(&self) -> String {
        if let Value::Object(object) = self {
            if let Some(message) = object.borrow().props.get("message") {
                return message.to_display();
            }
        }
        self.to_display()
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::Str(_))
            | (Value::Str(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_) | Value::Object(_), Value::Str(_) | Value::Number(_)) => {
                Value::str(&self.to_display()).loose_equals(other)
            }
            (Value::Str(_) | Value::Number(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_equals(&Value::str(&other.to_display()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Property key for indexing (`obj[key]`)
    pub fn to_property_key(&self) -> String {
        self.to_display()
    }
}

/// `Array.prototype.join`: nullish elements become empty, and an array
/// that is already being joined further out renders as empty
pub fn join_array(items: &Rc<RefCell<Vec<Value>>>, separator: &str) -> String {
    join_in(items, separator, &mut Open::new())
}

fn join_in(items: &Rc<RefCell<Vec<Value>>>, separator: &str, open: &mut Open) -> String {
    let ptr = Rc::as_ptr(items) as *const ();
    if open.len() > MAX_DISPLAY_DEPTH || open.contains(&ptr) {
        return String::new();
    }
    open.push(ptr);
    let parts: Vec<String> = items
        .borrow()
        .iter()
        .map(|item| {
            if item.is_nullish() {
                String::new()
            } else {
                item.display_in(open)
            }
        })
        .collect();
    open.pop();
    parts.join(separator)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other.to_display()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

/// Numeric conversion of string contents: blank is zero, junk is NaN
pub fn parse_numeric(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts spellings like "inf" and "nan" that scripts do not
        t if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        t => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}
