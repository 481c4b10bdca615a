//! Global bindings and the methods of primitive and array values.
//!
//! Everything here is pure except `console`, which writes to the run's
//! channel, and `Math.random`.

use super::interpreter::{compare, Env, Interpreter};
use super::value::{join_array, NativeFn, Value};
use super::RuntimeError;
use crate::script::format_number;
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::rc::Rc;

type NativeResult = Result<Value, RuntimeError>;

/// Deepest nesting JSON conversion and `flat` descend into
const MAX_JSON_DEPTH: usize = 64;

pub fn install(global: &Env) {
    let console = namespace(
        &[
            ("log", console_log as NativeFn),
            ("info", console_log),
            ("warn", console_log),
            ("error", console_log),
            ("debug", console_log),
        ],
        &[],
    );
    global.declare("console", console, true);

    let math = namespace(
        &[
            ("abs", math_abs as NativeFn),
            ("floor", math_floor),
            ("ceil", math_ceil),
            ("round", math_round),
            ("trunc", math_trunc),
            ("sign", math_sign),
            ("sqrt", math_sqrt),
            ("cbrt", math_cbrt),
            ("exp", math_exp),
            ("log", math_log),
            ("log2", math_log2),
            ("log10", math_log10),
            ("sin", math_sin),
            ("cos", math_cos),
            ("tan", math_tan),
            ("pow", math_pow),
            ("min", math_min),
            ("max", math_max),
            ("random", math_random),
        ],
        &[
            ("PI", Value::Number(std::f64::consts::PI)),
            ("E", Value::Number(std::f64::consts::E)),
        ],
    );
    global.declare("Math", math, false);

    let json = namespace(
        &[("stringify", json_stringify as NativeFn), ("parse", json_parse)],
        &[],
    );
    global.declare("JSON", json, false);

    let array = namespace(
        &[("isArray", array_is_array as NativeFn), ("from", array_from)],
        &[],
    );
    global.declare("Array", array, false);

    let object = namespace(
        &[
            ("keys", object_keys as NativeFn),
            ("values", object_values),
            ("entries", object_entries),
            ("assign", object_assign),
        ],
        &[],
    );
    global.declare("Object", object, false);

    let functions: [(&'static str, NativeFn); 10] = [
        ("String", string_ctor),
        ("Number", number_ctor),
        ("Boolean", boolean_ctor),
        ("parseInt", parse_int),
        ("parseFloat", parse_float),
        ("isNaN", is_nan),
        ("isFinite", is_finite),
        ("Error", error_ctor),
        ("TypeError", type_error_ctor),
        ("RangeError", range_error_ctor),
    ];
    for (name, func) in functions {
        global.declare(name, Value::native(name, func), false);
    }
    global.declare("NaN", Value::Number(f64::NAN), false);
    global.declare("Infinity", Value::Number(f64::INFINITY), false);
}

fn namespace(functions: &[(&'static str, NativeFn)], constants: &[(&str, Value)]) -> Value {
    let mut props = IndexMap::new();
    for (name, func) in functions {
        props.insert(name.to_string(), Value::native(*name, *func));
    }
    for (name, value) in constants {
        props.insert(name.to_string(), value.clone());
    }
    Value::object(props)
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn callback_arg(args: &[Value]) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(f @ Value::Function(_)) => Ok(f.clone()),
        Some(other) => Err(RuntimeError::type_error(format!(
            "{} is not a function",
            other.to_display()
        ))),
        None => Err(RuntimeError::type_error("undefined is not a function")),
    }
}

/// Resolve a relative index argument against `len` (negative counts from the end)
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

// console

fn console_log(interp: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let line = args
        .iter()
        .map(Value::to_display)
        .collect::<Vec<_>>()
        .join(" ");
    interp.emit(line)?;
    Ok(Value::Undefined)
}

// Math

macro_rules! math_unary {
    ($name:ident, $f:expr) => {
        fn $name(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
            let f: fn(f64) -> f64 = $f;
            Ok(Value::Number(f(arg(&args, 0).to_number())))
        }
    };
}

math_unary!(math_abs, f64::abs);
math_unary!(math_floor, f64::floor);
math_unary!(math_ceil, f64::ceil);
math_unary!(math_round, |x| (x + 0.5).floor());
math_unary!(math_trunc, f64::trunc);
math_unary!(math_sign, |x| if x > 0.0 {
    1.0
} else if x < 0.0 {
    -1.0
} else {
    x
});
math_unary!(math_sqrt, f64::sqrt);
math_unary!(math_cbrt, f64::cbrt);
math_unary!(math_exp, f64::exp);
math_unary!(math_log, f64::ln);
math_unary!(math_log2, f64::log2);
math_unary!(math_log10, f64::log10);
math_unary!(math_sin, f64::sin);
math_unary!(math_cos, f64::cos);
math_unary!(math_tan, f64::tan);

fn math_pow(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Number(
        arg(&args, 0).to_number().powf(arg(&args, 1).to_number()),
    ))
}

fn math_min(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let mut result = f64::INFINITY;
    for value in &args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        result = result.min(n);
    }
    Ok(Value::Number(result))
}

fn math_max(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let mut result = f64::NEG_INFINITY;
    for value in &args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        result = result.max(n);
    }
    Ok(Value::Number(result))
}

fn math_random(interp: &mut Interpreter, _: &Value, _: Vec<Value>) -> NativeResult {
    Ok(Value::Number(interp.next_random()))
}

// JSON

fn json_stringify(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let Some(json) = to_json(&arg(&args, 0), &mut Vec::new())? else {
        return Ok(Value::Undefined);
    };
    let indent = match arg(&args, 2) {
        Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Value::Str(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return Ok(Value::from(json.to_string()));
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut serializer)
        .map_err(|e| RuntimeError::type_error(e.to_string()))?;
    Ok(Value::from(String::from_utf8_lossy(&buf).into_owned()))
}

/// `open` holds the arrays and objects being serialised, innermost last
fn to_json(
    value: &Value,
    open: &mut Vec<*const ()>,
) -> Result<Option<serde_json::Value>, RuntimeError> {
    let ptr = match value {
        Value::Array(items) => Some(Rc::as_ptr(items) as *const ()),
        Value::Object(object) => Some(Rc::as_ptr(object) as *const ()),
        _ => None,
    };
    let Some(ptr) = ptr else {
        return Ok(scalar_to_json(value));
    };
    if open.contains(&ptr) {
        return Err(RuntimeError::type_error(
            "Converting circular structure to JSON",
        ));
    }
    if open.len() >= MAX_JSON_DEPTH {
        return Err(RuntimeError::Range(
            "Maximum call stack size exceeded".to_string(),
        ));
    }
    open.push(ptr);
    let json = match value {
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items.borrow().iter() {
                out.push(to_json(item, open)?.unwrap_or(serde_json::Value::Null));
            }
            serde_json::Value::Array(out)
        }
        Value::Object(object) => {
            let mut map = serde_json::Map::new();
            for (key, item) in object.borrow().props.iter() {
                if let Some(json) = to_json(item, open)? {
                    map.insert(key.clone(), json);
                }
            }
            serde_json::Value::Object(map)
        }
        _ => serde_json::Value::Null,
    };
    open.pop();
    Ok(Some(json))
}

fn scalar_to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Null => Some(serde_json::Value::Null),
        Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
        Value::Number(n) => Some(number_to_json(*n)),
        Value::Str(s) => Some(serde_json::Value::String(s.to_string())),
        Value::Undefined | Value::Function(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    // whole numbers print without a trailing ".0"
    if n.fract() == 0.0 && n.abs() < 9e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::object(
            map.into_iter()
                .map(|(key, value)| (key, from_json(value)))
                .collect(),
        ),
    }
}

fn json_parse(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let text = arg(&args, 0).to_display();
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Ok(from_json(json)),
        Err(e) => Err(RuntimeError::Thrown(Value::error(
            "SyntaxError",
            &format!("Unexpected token in JSON: {}", e),
        ))),
    }
}

// Array and Object statics

fn array_is_array(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_))))
}

fn array_from(interp: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let items = interp.iterate(&arg(&args, 0))?;
    match args.get(1) {
        Some(mapper @ Value::Function(_)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                out.push(interp.call(mapper, vec![item, Value::Number(i as f64)])?);
            }
            Ok(Value::array(out))
        }
        _ => Ok(Value::array(items)),
    }
}

fn entries_of(value: &Value) -> Result<Vec<(String, Value)>, RuntimeError> {
    match value {
        Value::Undefined | Value::Null => Err(RuntimeError::type_error(
            "Cannot convert undefined or null to object",
        )),
        Value::Object(object) => Ok(object
            .borrow()
            .props
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        Value::Array(items) => Ok(items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect()),
        Value::Str(s) => Ok(s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::from(c.to_string())))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

fn object_keys(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let entries = entries_of(&arg(&args, 0))?;
    Ok(Value::array(
        entries.into_iter().map(|(k, _)| Value::from(k)).collect(),
    ))
}

fn object_values(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let entries = entries_of(&arg(&args, 0))?;
    Ok(Value::array(entries.into_iter().map(|(_, v)| v).collect()))
}

fn object_entries(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let entries = entries_of(&arg(&args, 0))?;
    Ok(Value::array(
        entries
            .into_iter()
            .map(|(k, v)| Value::array(vec![Value::from(k), v]))
            .collect(),
    ))
}

fn object_assign(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let target = arg(&args, 0);
    let Value::Object(object) = &target else {
        return Err(RuntimeError::type_error(
            "Object.assign target must be an object",
        ));
    };
    for source in args.iter().skip(1) {
        if source.is_nullish() {
            continue;
        }
        for (key, value) in entries_of(source)? {
            object.borrow_mut().props.insert(key, value);
        }
    }
    Ok(target)
}

// conversions

fn string_ctor(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(match args.first() {
        Some(value) => Value::from(value.to_display()),
        None => Value::str(""),
    })
}

fn number_ctor(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
}

fn boolean_ctor(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(arg(&args, 0).truthy()))
}

fn parse_int(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let text = arg(&args, 0).to_display();
    let mut rest = text.trim_start();
    let negative = rest.starts_with('-');
    if negative || rest.starts_with('+') {
        rest = &rest[1..];
    }
    let mut radix = match arg(&args, 1) {
        Value::Undefined => 10,
        value => value.to_number() as u32,
    };
    if (radix == 10 && matches!(arg(&args, 1), Value::Undefined)) || radix == 16 {
        if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            rest = hex;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let digits: String = rest.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * radix as f64 + d as f64);
    Ok(Value::Number(if negative { -value } else { value }))
}

fn parse_float(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    let text = arg(&args, 0).to_display();
    let text = text.trim_start();
    let body = text.trim_start_matches(['+', '-']);
    if body.starts_with("Infinity") {
        let sign = if text.starts_with('-') { -1.0 } else { 1.0 };
        return Ok(Value::Number(sign * f64::INFINITY));
    }
    // longest prefix that reads as a decimal literal
    let chars: Vec<char> = text.chars().collect();
    let mut end = 0;
    let mut best = None;
    if matches!(chars.first(), Some('+' | '-')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < chars.len() {
        let c = chars[end];
        if c.is_ascii_digit() {
            end += 1;
            let candidate: String = chars[..end].iter().collect();
            if candidate.parse::<f64>().is_ok() {
                best = Some(candidate);
            }
            continue;
        }
        if c == '.' && !seen_dot && !seen_exp {
            seen_dot = true;
        } else if (c == 'e' || c == 'E') && !seen_exp && best.is_some() {
            seen_exp = true;
            if matches!(chars.get(end + 1), Some('+' | '-')) {
                end += 1;
            }
        } else {
            break;
        }
        end += 1;
    }
    Ok(Value::Number(
        best.and_then(|s| s.parse::<f64>().ok()).unwrap_or(f64::NAN),
    ))
}

fn is_nan(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(arg(&args, 0).to_number().is_nan()))
}

fn is_finite(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(arg(&args, 0).to_number().is_finite()))
}

fn make_error(name: &str, args: &[Value]) -> Value {
    let message = match args.first() {
        None | Some(Value::Undefined) => String::new(),
        Some(value) => value.to_display(),
    };
    Value::error(name, &message)
}

fn error_ctor(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(make_error("Error", &args))
}

fn type_error_ctor(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(make_error("TypeError", &args))
}

fn range_error_ctor(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> NativeResult {
    Ok(make_error("RangeError", &args))
}

pub(crate) fn to_string(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    Ok(Value::from(this.to_display()))
}

// number methods

pub fn number_method(name: &str) -> Option<(&'static str, NativeFn)> {
    Some(match name {
        "toString" => ("toString", number_to_string as NativeFn),
        "toFixed" => ("toFixed", number_to_fixed),
        _ => return None,
    })
}

fn number_to_string(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let n = this.to_number();
    let radix = match arg(&args, 0) {
        Value::Undefined => 10,
        value => value.to_number() as u32,
    };
    if !(2..=36).contains(&radix) {
        return Err(RuntimeError::Range(
            "toString() radix must be between 2 and 36".to_string(),
        ));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(Value::from(format_number(n)));
    }
    let mut magnitude = n.abs() as u128;
    let mut digits = Vec::new();
    loop {
        let digit = (magnitude % radix as u128) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        magnitude /= radix as u128;
        if magnitude == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(Value::from(digits.into_iter().rev().collect::<String>()))
}

fn number_to_fixed(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let digits = arg(&args, 0).to_number();
    let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
    if !(0.0..=100.0).contains(&digits) {
        return Err(RuntimeError::Range(
            "toFixed() digits argument must be between 0 and 100".to_string(),
        ));
    }
    let n = this.to_number();
    if !n.is_finite() {
        return Ok(Value::from(format_number(n)));
    }
    Ok(Value::from(format!("{:.*}", digits as usize, n)))
}

// string methods

pub fn string_method(name: &str) -> Option<(&'static str, NativeFn)> {
    Some(match name {
        "toUpperCase" => ("toUpperCase", str_to_upper as NativeFn),
        "toLowerCase" => ("toLowerCase", str_to_lower),
        "trim" => ("trim", str_trim),
        "trimStart" => ("trimStart", str_trim_start),
        "trimEnd" => ("trimEnd", str_trim_end),
        "split" => ("split", str_split),
        "includes" => ("includes", str_includes),
        "startsWith" => ("startsWith", str_starts_with),
        "endsWith" => ("endsWith", str_ends_with),
        "indexOf" => ("indexOf", str_index_of),
        "slice" => ("slice", str_slice),
        "substring" => ("substring", str_substring),
        "charAt" => ("charAt", str_char_at),
        "at" => ("at", str_at),
        "repeat" => ("repeat", str_repeat),
        "replace" => ("replace", str_replace),
        "replaceAll" => ("replaceAll", str_replace_all),
        "padStart" => ("padStart", str_pad_start),
        "padEnd" => ("padEnd", str_pad_end),
        "concat" => ("concat", str_concat),
        "toString" => ("toString", to_string),
        _ => return None,
    })
}

fn this_str(this: &Value) -> String {
    this.to_display()
}

fn str_to_upper(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    Ok(Value::from(this_str(this).to_uppercase()))
}

fn str_to_lower(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    Ok(Value::from(this_str(this).to_lowercase()))
}

fn str_trim(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    Ok(Value::str(this_str(this).trim()))
}

fn str_trim_start(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    Ok(Value::str(this_str(this).trim_start()))
}

fn str_trim_end(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    Ok(Value::str(this_str(this).trim_end()))
}

fn str_split(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let text = this_str(this);
    let parts: Vec<Value> = match arg(&args, 0) {
        Value::Undefined => vec![Value::from(text)],
        separator => {
            let separator = separator.to_display();
            if separator.is_empty() {
                text.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                text.split(separator.as_str()).map(Value::str).collect()
            }
        }
    };
    Ok(Value::array(parts))
}

fn str_includes(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(
        this_str(this).contains(arg(&args, 0).to_display().as_str()),
    ))
}

fn str_starts_with(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(
        this_str(this).starts_with(arg(&args, 0).to_display().as_str()),
    ))
}

fn str_ends_with(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(
        this_str(this).ends_with(arg(&args, 0).to_display().as_str()),
    ))
}

fn str_index_of(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let text = this_str(this);
    let needle = arg(&args, 0).to_display();
    Ok(Value::Number(match text.find(needle.as_str()) {
        Some(byte) => text[..byte].chars().count() as f64,
        None => -1.0,
    }))
}

fn char_range(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

fn str_slice(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let text = this_str(this);
    let len = text.chars().count();
    let start = relative_index(&arg(&args, 0), len, 0);
    let end = relative_index(&arg(&args, 1), len, len);
    Ok(Value::from(char_range(&text, start, end)))
}

fn str_substring(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let text = this_str(this);
    let len = text.chars().count();
    let clamp = |value: Value, default: usize| match value {
        Value::Undefined => default,
        value => {
            let n = value.to_number();
            if n.is_nan() {
                0
            } else {
                n.trunc().clamp(0.0, len as f64) as usize
            }
        }
    };
    let a = clamp(arg(&args, 0), 0);
    let b = clamp(arg(&args, 1), len);
    Ok(Value::from(char_range(&text, a.min(b), a.max(b))))
}

fn str_char_at(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let index = arg(&args, 0).to_number();
    let index = if index.is_nan() { 0.0 } else { index.trunc() };
    if index < 0.0 {
        return Ok(Value::str(""));
    }
    Ok(this_str(this)
        .chars()
        .nth(index as usize)
        .map_or(Value::str(""), |c| Value::from(c.to_string())))
}

fn str_at(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let chars: Vec<char> = this_str(this).chars().collect();
    Ok(match at_index(&arg(&args, 0), chars.len()) {
        Some(i) => Value::from(chars[i].to_string()),
        None => Value::Undefined,
    })
}

fn at_index(value: &Value, len: usize) -> Option<usize> {
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let index = if n < 0.0 { len as f64 + n } else { n };
    (index >= 0.0 && index < len as f64).then_some(index as usize)
}

fn str_repeat(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let count = arg(&args, 0).to_number();
    let count = if count.is_nan() { 0.0 } else { count.trunc() };
    let text = this_str(this);
    if count < 0.0 || count.is_infinite() || (text.len() as f64 * count) > 1e8 {
        return Err(RuntimeError::Range(format!(
            "Invalid count value: {}",
            format_number(count)
        )));
    }
    Ok(Value::from(text.repeat(count as usize)))
}

fn str_replace(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let pattern = arg(&args, 0).to_display();
    let replacement = arg(&args, 1).to_display();
    Ok(Value::from(
        this_str(this).replacen(pattern.as_str(), &replacement, 1),
    ))
}

fn str_replace_all(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let pattern = arg(&args, 0).to_display();
    let replacement = arg(&args, 1).to_display();
    Ok(Value::from(
        this_str(this).replace(pattern.as_str(), &replacement),
    ))
}

fn pad(this: &Value, args: &[Value], at_start: bool) -> NativeResult {
    let text = this_str(this);
    let target = arg(args, 0).to_number();
    let filler = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        value => value.to_display(),
    };
    let len = text.chars().count();
    if target.is_nan() || target <= len as f64 || filler.is_empty() || target > 1e8 {
        return Ok(Value::from(text));
    }
    let padding: String = filler.chars().cycle().take(target as usize - len).collect();
    Ok(Value::from(if at_start {
        padding + &text
    } else {
        text + &padding
    }))
}

fn str_pad_start(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    pad(this, &args, true)
}

fn str_pad_end(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    pad(this, &args, false)
}

fn str_concat(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let mut text = this_str(this);
    for value in &args {
        text.push_str(&value.to_display());
    }
    Ok(Value::from(text))
}

// array methods

pub fn array_method(name: &str) -> Option<(&'static str, NativeFn)> {
    Some(match name {
        "push" => ("push", array_push as NativeFn),
        "pop" => ("pop", array_pop),
        "shift" => ("shift", array_shift),
        "unshift" => ("unshift", array_unshift),
        "slice" => ("slice", array_slice),
        "splice" => ("splice", array_splice),
        "concat" => ("concat", array_concat),
        "join" => ("join", array_join),
        "reverse" => ("reverse", array_reverse),
        "indexOf" => ("indexOf", array_index_of),
        "includes" => ("includes", array_includes),
        "find" => ("find", array_find),
        "findIndex" => ("findIndex", array_find_index),
        "filter" => ("filter", array_filter),
        "map" => ("map", array_map),
        "forEach" => ("forEach", array_for_each),
        "reduce" => ("reduce", array_reduce),
        "some" => ("some", array_some),
        "every" => ("every", array_every),
        "sort" => ("sort", array_sort),
        "flat" => ("flat", array_flat),
        "fill" => ("fill", array_fill),
        "at" => ("at", array_at),
        "toString" => ("toString", to_string),
        _ => return None,
    })
}

fn items_of(this: &Value) -> Vec<Value> {
    match this {
        Value::Array(items) => items.borrow().clone(),
        _ => Vec::new(),
    }
}

fn with_items<R>(this: &Value, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
    match this {
        Value::Array(items) => Some(f(&mut items.borrow_mut())),
        _ => None,
    }
}

fn array_push(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let len = with_items(this, |items| {
        items.extend(args);
        items.len()
    })
    .unwrap_or(0);
    Ok(Value::Number(len as f64))
}

fn array_pop(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    Ok(with_items(this, |items| items.pop())
        .flatten()
        .unwrap_or(Value::Undefined))
}

fn array_shift(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    Ok(with_items(this, |items| {
        (!items.is_empty()).then(|| items.remove(0))
    })
    .flatten()
    .unwrap_or(Value::Undefined))
}

fn array_unshift(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let len = with_items(this, |items| {
        items.splice(0..0, args);
        items.len()
    })
    .unwrap_or(0);
    Ok(Value::Number(len as f64))
}

fn array_slice(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let items = items_of(this);
    let len = items.len();
    let start = relative_index(&arg(&args, 0), len, 0);
    let end = relative_index(&arg(&args, 1), len, len);
    Ok(Value::array(if start < end {
        items[start..end].to_vec()
    } else {
        Vec::new()
    }))
}

fn array_splice(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let removed = with_items(this, |items| {
        let len = items.len();
        let start = relative_index(&arg(&args, 0), len, 0);
        let count = match args.get(1) {
            None => len - start,
            Some(value) => {
                let n = value.to_number();
                if n.is_nan() {
                    0
                } else {
                    n.trunc().clamp(0.0, (len - start) as f64) as usize
                }
            }
        };
        let inserted: Vec<Value> = args.iter().skip(2).cloned().collect();
        items.splice(start..start + count, inserted).collect::<Vec<_>>()
    })
    .unwrap_or_default();
    Ok(Value::array(removed))
}

fn array_concat(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let mut items = items_of(this);
    for value in args {
        match &value {
            Value::Array(other) => items.extend(other.borrow().iter().cloned()),
            _ => items.push(value),
        }
    }
    Ok(Value::array(items))
}

fn array_join(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let separator = match arg(&args, 0) {
        Value::Undefined => ",".to_string(),
        value => value.to_display(),
    };
    Ok(match this {
        Value::Array(items) => Value::from(join_array(items, &separator)),
        _ => Value::from(""),
    })
}

fn array_reverse(_: &mut Interpreter, this: &Value, _: Vec<Value>) -> NativeResult {
    with_items(this, |items| items.reverse());
    Ok(this.clone())
}

fn array_index_of(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let needle = arg(&args, 0);
    Ok(Value::Number(
        items_of(this)
            .iter()
            .position(|item| item.strict_equals(&needle))
            .map_or(-1.0, |i| i as f64),
    ))
}

fn array_includes(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let needle = arg(&args, 0);
    let nan = matches!(needle, Value::Number(n) if n.is_nan());
    Ok(Value::Bool(items_of(this).iter().any(|item| {
        item.strict_equals(&needle) || (nan && matches!(item, Value::Number(n) if n.is_nan()))
    })))
}

/// Call `callback(item, index, array)` for each element until `visit` says stop
fn each(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    mut visit: impl FnMut(usize, Value, Value) -> bool,
) -> Result<(), RuntimeError> {
    let callback = callback_arg(args)?;
    for (i, item) in items_of(this).into_iter().enumerate() {
        let result = interp.call(
            &callback,
            vec![item.clone(), Value::Number(i as f64), this.clone()],
        )?;
        if !visit(i, item, result) {
            break;
        }
    }
    Ok(())
}

fn array_find(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let mut found = Value::Undefined;
    each(interp, this, &args, |_, item, result| {
        if result.truthy() {
            found = item;
            return false;
        }
        true
    })?;
    Ok(found)
}

fn array_find_index(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let mut found = -1.0;
    each(interp, this, &args, |i, _, result| {
        if result.truthy() {
            found = i as f64;
            return false;
        }
        true
    })?;
    Ok(Value::Number(found))
}

fn array_filter(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let mut kept = Vec::new();
    each(interp, this, &args, |_, item, result| {
        if result.truthy() {
            kept.push(item);
        }
        true
    })?;
    Ok(Value::array(kept))
}

fn array_map(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let mut mapped = Vec::new();
    each(interp, this, &args, |_, _, result| {
        mapped.push(result);
        true
    })?;
    Ok(Value::array(mapped))
}

fn array_for_each(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    each(interp, this, &args, |_, _, _| true)?;
    Ok(Value::Undefined)
}

fn array_some(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let mut any = false;
    each(interp, this, &args, |_, _, result| {
        any = result.truthy();
        !any
    })?;
    Ok(Value::Bool(any))
}

fn array_every(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let mut all = true;
    each(interp, this, &args, |_, _, result| {
        all = result.truthy();
        all
    })?;
    Ok(Value::Bool(all))
}

fn array_reduce(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let callback = callback_arg(&args)?;
    let mut items = items_of(this).into_iter().enumerate();
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match items.next() {
            Some((_, first)) => first,
            None => {
                return Err(RuntimeError::type_error(
                    "Reduce of empty array with no initial value",
                ))
            }
        },
    };
    for (i, item) in items {
        accumulator = interp.call(
            &callback,
            vec![accumulator, item, Value::Number(i as f64), this.clone()],
        )?;
    }
    Ok(accumulator)
}

fn array_sort(interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let comparator = match args.first() {
        Some(Value::Undefined) | None => None,
        Some(_) => Some(callback_arg(&args)?),
    };
    let items = items_of(this);
    let sorted = merge_sort(items, &mut |a, b| match &comparator {
        Some(compare_fn) => {
            let result = interp.call(compare_fn, vec![a.clone(), b.clone()])?;
            let n = result.to_number();
            Ok(if n < 0.0 {
                Ordering::Less
            } else if n > 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            })
        }
        None => Ok(default_order(a, b)),
    })?;
    with_items(this, |items| *items = sorted);
    Ok(this.clone())
}

/// String order with `undefined` last
fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        _ => compare(&Value::from(a.to_display()), &Value::from(b.to_display()))
            .unwrap_or(Ordering::Equal),
    }
}

/// Stable sort with a fallible comparator; never panics on inconsistent orderings
fn merge_sort(
    mut items: Vec<Value>,
    cmp: &mut dyn FnMut(&Value, &Value) -> Result<Ordering, RuntimeError>,
) -> Result<Vec<Value>, RuntimeError> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, cmp)?;
    let right = merge_sort(right, cmp)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        if cmp(a, b)? == Ordering::Greater {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

/// Elements `flat` may visit before giving up; arrays that contain themselves
/// would otherwise multiply on every level
const MAX_FLAT_VISITS: usize = 1_000_000;

fn flatten_into(
    out: &mut Vec<Value>,
    items: Vec<Value>,
    depth: f64,
    visits: &mut usize,
) -> Result<(), RuntimeError> {
    for item in items {
        *visits += 1;
        if *visits > MAX_FLAT_VISITS {
            return Err(RuntimeError::Range("Invalid array length".to_string()));
        }
        match &item {
            Value::Array(inner) if depth >= 1.0 => {
                let inner = inner.borrow().clone();
                flatten_into(out, inner, depth - 1.0, visits)?;
            }
            _ => out.push(item),
        }
    }
    Ok(())
}

fn array_flat(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let depth = match arg(&args, 0) {
        Value::Undefined => 1.0,
        value => value.to_number(),
    };
    let mut out = Vec::new();
    flatten_into(&mut out, items_of(this), depth.min(MAX_JSON_DEPTH as f64), &mut 0)?;
    Ok(Value::array(out))
}

fn array_fill(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let value = arg(&args, 0);
    with_items(this, |items| {
        let len = items.len();
        let start = relative_index(&arg(&args, 1), len, 0);
        let end = relative_index(&arg(&args, 2), len, len);
        for item in items.iter_mut().take(end).skip(start) {
            *item = value.clone();
        }
    });
    Ok(this.clone())
}

fn array_at(_: &mut Interpreter, this: &Value, args: Vec<Value>) -> NativeResult {
    let items = items_of(this);
    Ok(at_index(&arg(&args, 0), items.len())
        .map_or(Value::Undefined, |i| items[i].clone()))
}
