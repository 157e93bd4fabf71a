//! Tree-walking evaluation of a module script body.

use std::collections::HashMap;

use super::ast::{DeclKind, Expr, Program, Stmt};
use crate::compiler::{ModuleBody, ModuleScope};
use crate::value::{JsObject, Value};

type Completion = Result<Value, Value>;

fn reference_error(message: String) -> Value {
    Value::error("ReferenceError", message)
}

fn type_error(message: String) -> Value {
    Value::error("TypeError", message)
}

fn uninitialized(name: &str) -> Value {
    reference_error(format!("Cannot access '{}' before initialization", name))
}

impl ModuleBody for Program {
    fn evaluate(&self, scope: &ModuleScope) -> Completion {
        let mut frame = Frame {
            scope,
            program: self,
            locals: HashMap::new(),
        };

        let mut completion = Value::Undefined;
        for stmt in &self.body {
            match stmt {
                Stmt::Declare { name, init } => {
                    let value = match init {
                        Some(expr) => frame.eval(expr)?,
                        None => Value::Undefined,
                    };
                    frame.initialize(name, value);
                }
                Stmt::Assign { name, value } => {
                    let value = frame.eval(value)?;
                    frame.assign(name, value)?;
                }
                Stmt::Throw(expr) => return Err(frame.eval(expr)?),
                Stmt::Expr(expr) => completion = frame.eval(expr)?,
            }
        }
        Ok(completion)
    }
}

struct Frame<'a> {
    scope: &'a ModuleScope,
    program: &'a Program,
    /// Initialized top-level declarations that are not exported
    locals: HashMap<String, Value>,
}

impl Frame<'_> {
    fn is_declared(&self, name: &str) -> bool {
        self.program.declarations.contains_key(name) || self.scope.import(name).is_some()
    }

    fn read(&self, name: &str) -> Completion {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        if let Some(slot) = self.scope.export(name).or_else(|| self.scope.import(name)) {
            return slot.get().ok_or_else(|| uninitialized(name));
        }
        if self.program.declarations.contains_key(name) {
            return Err(uninitialized(name));
        }
        Err(reference_error(format!("{} is not defined", name)))
    }

    fn initialize(&mut self, name: &str, value: Value) {
        match self.scope.export(name) {
            Some(slot) => slot.set(value),
            None => {
                self.locals.insert(name.to_string(), value);
            }
        }
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), Value> {
        if self.scope.import(name).is_some() {
            return Err(type_error("Assignment to constant variable.".into()));
        }
        match self.program.declarations.get(name) {
            Some(DeclKind::Const) => Err(type_error("Assignment to constant variable.".into())),
            Some(DeclKind::Let) => {
                self.read(name)?;
                self.initialize(name, value);
                Ok(())
            }
            None => Err(reference_error(format!("{} is not defined", name))),
        }
    }

    fn eval(&self, expr: &Expr) -> Completion {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.read(name),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(values))
            }
            Expr::Object(properties) => {
                let object = JsObject::new();
                for (key, value) in properties {
                    object.set(key.as_str(), self.eval(value)?);
                }
                Ok(Value::Object(object))
            }
            Expr::Member(object, property) => {
                let object = self.eval(object)?;
                get_property(&object, property)
            }
            Expr::Index(object, index) => {
                let object = self.eval(object)?;
                let key = self.eval(index)?.to_string();
                get_property(&object, &key)
            }
            Expr::Call(callee, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                match callee.as_ref() {
                    Expr::Member(object, method) => {
                        let this = self.eval(object)?;
                        call_method(&this, method, &args)
                    }
                    other => {
                        let function = self.eval(other)?;
                        call(&function, &describe(other), &args)
                    }
                }
            }
            Expr::Add(left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(add(&left, &right))
            }
            Expr::New(constructor, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                construct(constructor, &args)
            }
            Expr::TypeOf(inner) => {
                if let Expr::Ident(name) = inner.as_ref() {
                    if !self.is_declared(name) {
                        return Ok(Value::from("undefined"));
                    }
                }
                Ok(Value::from(self.eval(inner)?.type_of()))
            }
            Expr::ImportMeta => Ok(self.scope.import_meta()),
        }
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member(object, property) => format!("{}.{}", describe(object), property),
        _ => "expression".to_string(),
    }
}

fn get_property(object: &Value, key: &str) -> Completion {
    match object {
        Value::Undefined | Value::Null => Err(type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            object, key
        ))),
        _ => Ok(object.get_property(key)),
    }
}

fn call(function: &Value, name: &str, args: &[Value]) -> Completion {
    match function {
        Value::Function(f) => f.call(args),
        _ => Err(type_error(format!("{} is not a function", name))),
    }
}

fn join(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Undefined | Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn call_method(this: &Value, method: &str, args: &[Value]) -> Completion {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    match (this, method) {
        (Value::Array(items), "join") => {
            let separator = match arg(0) {
                Value::Undefined => ",".to_string(),
                other => other.to_string(),
            };
            Ok(Value::from(join(items, &separator)))
        }
        (Value::Array(items), "concat") => {
            let mut out = items.to_vec();
            for value in args {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::array(out))
        }
        (Value::Array(items), "includes") => {
            let needle = arg(0);
            Ok(Value::Bool(items.iter().any(|item| item.strict_equals(&needle))))
        }
        (Value::String(s), "toUpperCase") => Ok(Value::from(s.to_uppercase())),
        (Value::String(s), "toLowerCase") => Ok(Value::from(s.to_lowercase())),
        (Value::String(s), "trim") => Ok(Value::from(s.trim())),
        (Value::String(s), "includes") => Ok(Value::Bool(s.contains(arg(0).to_string().as_str()))),
        _ => {
            let function = get_property(this, method)?;
            call(&function, method, args)
        }
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        _ => f64::NAN,
    }
}

fn is_primitive_numeric(value: &Value) -> bool {
    matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

fn add(left: &Value, right: &Value) -> Value {
    if is_primitive_numeric(left) && is_primitive_numeric(right) {
        Value::Number(to_number(left) + to_number(right))
    } else {
        Value::from(format!("{}{}", left, right))
    }
}

fn construct(constructor: &str, args: &[Value]) -> Completion {
    match constructor {
        "Error" | "TypeError" | "RangeError" | "ReferenceError" | "SyntaxError" => {
            let message = match args.first() {
                None | Some(Value::Undefined) => String::new(),
                Some(value) => value.to_string(),
            };
            Ok(Value::error(constructor, message))
        }
        "Object" => Ok(Value::Object(JsObject::new())),
        _ => Err(type_error(format!("{} is not a constructor", constructor))),
    }
}
