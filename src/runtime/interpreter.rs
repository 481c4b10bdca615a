use super::builtins;
use super::console::Channel;
use super::value::{Function, Value};
use super::{Limits, RuntimeError};
use crate::script::ast::{
    BinaryOp, DeclKind, Expr, FunctionBody, FunctionDecl, LogicalOp, Program, Property, Stmt,
    TemplateChunk, UnaryOp,
};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Largest gap an index assignment may open at the end of an array
const MAX_ARRAY_GROWTH: usize = 1_000_000;

/// Nested expression evaluations allowed across all active calls; keeps
/// deep expressions inside deep recursion within the worker's stack
const MAX_EVAL_NESTING: usize = 1024;

struct Binding {
    value: Value,
    mutable: bool,
}

pub struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<Env>,
}

/// A lexical scope chain
#[derive(Clone)]
pub struct Env(Rc<RefCell<Scope>>);

impl Env {
    pub fn root() -> Self {
        Env(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
        })))
    }

    pub fn child(&self) -> Self {
        Env(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.0
            .borrow_mut()
            .vars
            .insert(name.to_string(), Binding { value, mutable });
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let parent = {
                let scope = current.0.borrow();
                if let Some(binding) = scope.vars.get(name) {
                    return Some(binding.value.clone());
                }
                scope.parent.clone()
            };
            current = parent?;
        }
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut current = self.clone();
        loop {
            let parent = {
                let mut scope = current.0.borrow_mut();
                if let Some(binding) = scope.vars.get_mut(name) {
                    if !binding.mutable {
                        return Err(RuntimeError::type_error("Assignment to constant variable."));
                    }
                    binding.value = value;
                    return Ok(());
                }
                scope.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => {
                    return Err(RuntimeError::reference_error(format!(
                        "{} is not defined",
                        name
                    )))
                }
            }
        }
    }
}

/// Statement completion
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    global: Env,
    console: Channel,
    limits: Limits,
    cancel: Arc<AtomicBool>,
    steps: u64,
    depth: usize,
    nesting: usize,
    rng: u64,
    /// Scopes captured by closures; cleared on drop so Rc cycles are freed
    closure_scopes: Vec<Weak<RefCell<Scope>>>,
}

impl Interpreter {
    pub fn new(console: Channel, limits: Limits, cancel: Arc<AtomicBool>) -> Self {
        let global = Env::root();
        builtins::install(&global);
        // xorshift must not start at zero
        let rng = (uuid::Uuid::new_v4().as_u128() as u64) | 1;
        Self {
            global,
            console,
            limits,
            cancel,
            steps: 0,
            depth: 0,
            nesting: 0,
            rng,
            closure_scopes: Vec::new(),
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        let global = self.global.clone();
        // a top-level `return` simply ends the program
        self.exec_block(&program.body, &global).map(|_| ())
    }

    pub(crate) fn emit(&mut self, line: String) -> Result<(), RuntimeError> {
        self.console
            .emit(line)
            .map_err(|e| RuntimeError::OutputLimit { limit: e.limit })
    }

    pub(crate) fn next_random(&mut self) -> f64 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    fn tick(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(RuntimeError::StepLimit {
                limit: self.limits.max_steps,
            });
        }
        if self.cancel.load(Ordering::Relaxed) {
            return Err(RuntimeError::Interrupted);
        }
        Ok(())
    }

    fn closure(&mut self, decl: &Rc<FunctionDecl>, env: &Env) -> Value {
        let ptr = Rc::as_ptr(&env.0);
        if self.closure_scopes.last().map(Weak::as_ptr) != Some(ptr) {
            self.closure_scopes.push(Rc::downgrade(&env.0));
        }
        Value::Function(Rc::new(Function::Closure {
            decl: decl.clone(),
            env: env.clone(),
        }))
    }

    fn hoist(&mut self, stmts: &[Stmt], env: &Env) {
        for stmt in stmts {
            if let Stmt::Function(decl) = stmt {
                if let Some(name) = &decl.name {
                    let value = self.closure(decl, env);
                    env.declare(name, value, true);
                }
            }
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> Result<Flow, RuntimeError> {
        self.hoist(stmts, env);
        for stmt in stmts {
            match self.exec(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow, RuntimeError> {
        self.tick()?;
        match stmt {
            Stmt::Empty | Stmt::Function(_) => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::VarDecl { kind, decls } => {
                for decl in decls {
                    let value = match &decl.init {
                        Some(init) => self.eval(init, env)?,
                        None => Value::Undefined,
                    };
                    env.declare(&decl.name, value, *kind != DeclKind::Const);
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(body) => self.exec_block(body, &env.child()),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.exec(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { test, body } => {
                loop {
                    self.tick()?;
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, test } => {
                loop {
                    self.tick()?;
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = env.child();
                if let Some(init) = init {
                    self.exec(init, &scope)?;
                }
                loop {
                    self.tick()?;
                    if let Some(test) = test {
                        if !self.eval(test, &scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForEach {
                kind,
                name,
                of,
                iterable,
                body,
            } => {
                let source = self.eval(iterable, env)?;
                let items = if *of {
                    self.iterate(&source)?
                } else {
                    keys_of(&source)
                };
                for item in items {
                    self.tick()?;
                    let scope = env.child();
                    scope.declare(name, item, *kind != DeclKind::Const);
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                let value = self.eval(discriminant, env)?;
                let scope = env.child();
                let mut start = None;
                for (i, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        if self.eval(test, &scope)?.strict_equals(&value) {
                            start = Some(i);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
                let Some(start) = start else {
                    return Ok(Flow::Normal);
                };
                for case in &cases[start..] {
                    match self.exec_block(&case.body, &scope)? {
                        Flow::Normal => {}
                        Flow::Break => return Ok(Flow::Normal),
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(expr) => Err(RuntimeError::Thrown(self.eval(expr, env)?)),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(block, &env.child());
                if let Some(handler) = handler {
                    if matches!(&result, Err(e) if e.is_catchable()) {
                        let scope = env.child();
                        if let (Some(param), Err(err)) = (&handler.param, result) {
                            scope.declare(param, err.into_value(), true);
                        }
                        result = self.exec_block(&handler.body, &scope);
                    }
                }
                if let Some(finalizer) = finalizer {
                    if matches!(&result, Err(e) if !e.is_catchable()) {
                        return result;
                    }
                    match self.exec_block(finalizer, &env.child())? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                result
            }
        }
    }

    fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        if self.nesting >= MAX_EVAL_NESTING {
            return Err(RuntimeError::Range(
                "Maximum call stack size exceeded".to_string(),
            ));
        }
        self.nesting += 1;
        let result = self.eval_expr(expr, env);
        self.nesting -= 1;
        result
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s)),
            Expr::Template(chunks) => {
                let mut out = String::new();
                for chunk in chunks {
                    match chunk {
                        TemplateChunk::Text(text) => out.push_str(text),
                        TemplateChunk::Expr(expr) => {
                            out.push_str(&self.eval(expr, env)?.to_display())
                        }
                    }
                }
                Ok(Value::from(out))
            }
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| RuntimeError::reference_error(format!("{} is not defined", name))),
            Expr::Array(items) => Ok(Value::array(self.eval_list(items, env)?)),
            Expr::Object(props) => {
                let mut map = IndexMap::new();
                for prop in props {
                    match prop {
                        Property::KeyValue { key, value } => {
                            let value = self.eval(value, env)?;
                            map.insert(key.clone(), value);
                        }
                        Property::Spread(expr) => {
                            let source = self.eval(expr, env)?;
                            spread_into(&source, &mut map);
                        }
                    }
                }
                Ok(Value::object(map))
            }
            Expr::Function(decl) => Ok(self.closure(decl, env)),
            Expr::Spread(_) => Err(RuntimeError::type_error(
                "spread syntax is only allowed in array literals and argument lists",
            )),
            Expr::Unary { op, arg } => {
                if let (UnaryOp::Typeof, Expr::Ident(name)) = (op, arg.as_ref()) {
                    // typeof on an undeclared name is not an error
                    let kind = env.lookup(name).map_or("undefined", |v| v.type_of());
                    return Ok(Value::str(kind));
                }
                let value = self.eval(arg, env)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Typeof => Value::str(value.type_of()),
                    UnaryOp::Void => Value::Undefined,
                })
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = self.eval(target, env)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_to(target, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op.binary() {
                    None => self.eval(value, env)?,
                    Some(bin) => {
                        let current = self.eval(target, env)?;
                        let rhs = self.eval(value, env)?;
                        binary(bin, &current, &rhs)?
                    }
                };
                self.assign_to(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr, env)?.unwrap_or(Value::Undefined))
            }
            Expr::New { callee, args } => {
                let constructor = self.eval(callee, env)?;
                let args = self.eval_list(args, env)?;
                match &constructor {
                    Value::Function(f) if matches!(f.as_ref(), Function::Native { .. }) => {
                        self.call(&constructor, args)
                    }
                    _ => Err(RuntimeError::type_error(format!(
                        "{} is not a constructor",
                        describe(callee)
                    ))),
                }
            }
        }
    }

    /// Member access and calls; `None` when an optional link short-circuits the chain
    fn eval_chain(&mut self, expr: &Expr, env: &Env) -> Result<Option<Value>, RuntimeError> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                self.get_property(&object, property).map(Some)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let Some(object) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index, env)?;
                self.get_indexed(&object, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let Some(function) = self.eval_chain(callee, env)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_list(args, env)?;
                if !matches!(function, Value::Function(_)) {
                    return Err(RuntimeError::type_error(format!(
                        "{} is not a function",
                        describe(callee)
                    )));
                }
                self.call(&function, args).map(Some)
            }
            other => self.eval(other, env).map(Some),
        }
    }

    fn eval_list(&mut self, items: &[Expr], env: &Env) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            if let Expr::Spread(inner) = item {
                let source = self.eval(inner, env)?;
                values.extend(self.iterate(&source)?);
            } else {
                values.push(self.eval(item, env)?);
            }
        }
        Ok(values)
    }

    fn assign_to(&mut self, target: &Expr, value: Value, env: &Env) -> Result<(), RuntimeError> {
        match target {
            Expr::Ident(name) => env.assign(name, value),
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object, env)?;
                set_property(&object, property, value)
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                set_indexed(&object, &key, value)
            }
            _ => Err(RuntimeError::reference_error(
                "Invalid left-hand side in assignment",
            )),
        }
    }

    /// Call any function value with the given arguments
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let Value::Function(function) = callee else {
            return Err(RuntimeError::type_error(format!(
                "{} is not a function",
                callee.to_display()
            )));
        };
        self.tick()?;
        match function.as_ref() {
            Function::Native { this, func, .. } => func(self, this, args),
            Function::Closure { decl, env } => {
                if self.depth >= self.limits.max_call_depth {
                    return Err(RuntimeError::Range(
                        "Maximum call stack size exceeded".to_string(),
                    ));
                }
                self.depth += 1;
                let result = self.invoke(function, decl, env, args);
                self.depth -= 1;
                result
            }
        }
    }

    fn invoke(
        &mut self,
        function: &Rc<Function>,
        decl: &FunctionDecl,
        env: &Env,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let scope = env.child();
        if !decl.arrow {
            if let Some(name) = &decl.name {
                scope.declare(name, Value::Function(function.clone()), true);
            }
        }
        let mut args = args.into_iter();
        for param in &decl.params {
            let value = if param.rest {
                Value::array(args.by_ref().collect())
            } else {
                args.next().unwrap_or(Value::Undefined)
            };
            let value = match (&param.default, value) {
                (Some(default), Value::Undefined) => self.eval(default, &scope)?,
                (_, value) => value,
            };
            scope.declare(&param.name, value, true);
        }
        match &decl.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(body) => match self.exec_block(body, &scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    /// Elements produced by `for...of` and spread
    pub(crate) fn iterate(&mut self, value: &Value) -> Result<Vec<Value>, RuntimeError> {
        match value {
            Value::Array(items) => Ok(items.borrow().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            other => Err(RuntimeError::type_error(format!(
                "{} is not iterable",
                other.to_display()
            ))),
        }
    }

    pub fn get_property(&mut self, object: &Value, key: &str) -> Result<Value, RuntimeError> {
        match object {
            Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                object.to_display(),
                key
            ))),
            Value::Str(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map_or(Value::Undefined, |c| Value::from(c.to_string())));
                }
                Ok(bound(object, builtins::string_method(key)))
            }
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
                }
                Ok(bound(object, builtins::array_method(key)))
            }
            Value::Object(props) => Ok(props
                .borrow()
                .props
                .get(key)
                .cloned()
                .unwrap_or(Value::Undefined)),
            Value::Number(_) => Ok(bound(object, builtins::number_method(key))),
            Value::Bool(_) => Ok(bound(
                object,
                (key == "toString").then_some(("toString", builtins::to_string as _)),
            )),
            Value::Function(function) => Ok(match key {
                "name" => Value::str(function.name()),
                "length" => match function.as_ref() {
                    Function::Closure { decl, .. } => Value::Number(
                        decl.params.iter().filter(|p| !p.rest && p.default.is_none()).count()
                            as f64,
                    ),
                    Function::Native { .. } => Value::Number(0.0),
                },
                _ => Value::Undefined,
            }),
        }
    }

    fn get_indexed(&mut self, object: &Value, key: &Value) -> Result<Value, RuntimeError> {
        if let (Value::Array(items), Value::Number(n)) = (object, key) {
            if let Some(index) = number_index(*n) {
                return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
            }
        }
        self.get_property(object, &key.to_property_key())
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        for scope in self.closure_scopes.drain(..) {
            if let Some(scope) = scope.upgrade() {
                let vars = std::mem::take(&mut scope.borrow_mut().vars);
                drop(vars);
            }
        }
        let vars = std::mem::take(&mut self.global.0.borrow_mut().vars);
        drop(vars);
    }
}

fn bound(object: &Value, method: Option<(&'static str, super::value::NativeFn)>) -> Value {
    match method {
        Some((name, func)) => Value::Function(Rc::new(Function::Native {
            name,
            this: object.clone(),
            func,
        })),
        None => Value::Undefined,
    }
}

/// Canonical array index spelling ("0", "17"; not "01" or "+1")
fn array_index(key: &str) -> Option<usize> {
    let index = key.parse::<usize>().ok()?;
    (index.to_string() == key).then_some(index)
}

fn number_index(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0 && n <= usize::MAX as f64).then_some(n as usize)
}

fn keys_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Object(object) => object
            .borrow()
            .props
            .keys()
            .map(|k| Value::str(k))
            .collect(),
        Value::Array(items) => (0..items.borrow().len())
            .map(|i| Value::from(i.to_string()))
            .collect(),
        Value::Str(s) => (0..s.chars().count())
            .map(|i| Value::from(i.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn spread_into(source: &Value, map: &mut IndexMap<String, Value>) {
    match source {
        Value::Object(object) => {
            for (key, value) in object.borrow().props.iter() {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Array(items) => {
            for (i, value) in items.borrow().iter().enumerate() {
                map.insert(i.to_string(), value.clone());
            }
        }
        Value::Str(s) => {
            for (i, c) in s.chars().enumerate() {
                map.insert(i.to_string(), Value::from(c.to_string()));
            }
        }
        _ => {}
    }
}

fn set_property(object: &Value, key: &str, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            object.to_display(),
            key
        ))),
        Value::Object(props) => {
            props.borrow_mut().props.insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if key == "length" {
                let len = number_index(value.to_number())
                    .ok_or_else(|| RuntimeError::Range("Invalid array length".to_string()))?;
                let mut items = items.borrow_mut();
                if len > items.len() + MAX_ARRAY_GROWTH {
                    return Err(RuntimeError::Range("Invalid array length".to_string()));
                }
                items.resize(len, Value::Undefined);
                return Ok(());
            }
            match array_index(key) {
                Some(index) => store_index(items, index, value),
                // named properties on arrays are not kept
                None => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

fn set_indexed(object: &Value, key: &Value, value: Value) -> Result<(), RuntimeError> {
    if let (Value::Array(items), Value::Number(n)) = (object, key) {
        if let Some(index) = number_index(*n) {
            return store_index(items, index, value);
        }
    }
    set_property(object, &key.to_property_key(), value)
}

fn store_index(items: &RefCell<Vec<Value>>, index: usize, value: Value) -> Result<(), RuntimeError> {
    let mut items = items.borrow_mut();
    if index < items.len() {
        items[index] = value;
        return Ok(());
    }
    if index > items.len() + MAX_ARRAY_GROWTH {
        return Err(RuntimeError::Range("Invalid array length".to_string()));
    }
    items.resize(index, Value::Undefined);
    items.push(value);
    Ok(())
}

/// Source-ish rendering of a callee for error messages
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{}", describe(object), property),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        Expr::Function(_) => "function".to_string(),
        _ => "expression".to_string(),
    }
}

fn is_stringish(value: &Value) -> bool {
    matches!(
        value,
        Value::Str(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
    )
}

pub(crate) fn compare(left: &Value, right: &Value) -> Option<CmpOrdering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
    Ok(match op {
        BinaryOp::Add => {
            if is_stringish(left) || is_stringish(right) {
                Value::from(format!("{}{}", left.to_display(), right.to_display()))
            } else {
                num(|a, b| a + b)
            }
        }
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Pow => num(f64::powf),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(CmpOrdering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(left, right),
            Some(CmpOrdering::Less | CmpOrdering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(CmpOrdering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(left, right),
            Some(CmpOrdering::Greater | CmpOrdering::Equal)
        )),
        BinaryOp::In => {
            let key = left.to_property_key();
            match right {
                Value::Object(object) => Value::Bool(object.borrow().props.contains_key(&key)),
                Value::Array(items) => Value::Bool(
                    key == "length"
                        || array_index(&key).is_some_and(|i| i < items.borrow().len()),
                ),
                other => {
                    return Err(RuntimeError::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        other.to_display()
                    )))
                }
            }
        }
    })
}
