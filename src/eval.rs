//! Runtime values, environments and the tree-walking evaluator.

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{Block, Expr, Ident, InfixOp, PrefixOp, Program, Stmt};
use crate::builtins;
use crate::ctx::Symbol;
use crate::diag::Position;

/// A runtime value.
///
/// Arrays and functions are held behind `Rc`: cloning a value shares the
/// underlying object, so the `==`/`!=` operators can compare them by
/// identity and closures can share captured environments.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Str(Rc<str>),
    Null,
    Array(Rc<Vec<Value>>),
    Function(Rc<Function>),
    Builtin(Builtin),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Boolean(_) => "BOOLEAN",
            Value::Str(_) => "STRING",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Function(_) => "FUNCTION",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }
}

/// Display arrays in full up to this many elements, then elide the rest.
const ARRAY_DISPLAY_LIMIT: usize = 6;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                write!(f, "[")?;
                let truncated = elements.len() > ARRAY_DISPLAY_LIMIT;
                let shown = if truncated {
                    &elements[..ARRAY_DISPLAY_LIMIT]
                } else {
                    &elements[..]
                };
                for (i, element) in shown.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                if truncated {
                    write!(f, ", ...")?;
                }
                write!(f, "]")
            }
            Value::Function(func) => {
                write!(f, "fn(")?;
                for (i, param) in func.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")
            }
            Value::Builtin(_) => write!(f, "builtin function"),
        }
    }
}

/// A user-defined function together with the environment it closed over.
pub struct Function {
    parameters: Vec<Ident>,
    body: Block,
    env: Rc<Env>,
}

// Hand-written: the captured environment may (indirectly) contain this very
// function, so a derived impl would recurse forever.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A native function exposed to the language.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub(crate) name: &'static str,
    pub(crate) func: BuiltinFn,
}

pub(crate) type BuiltinFn = fn(&mut dyn Write, &[Value]) -> Result<Value, RuntimeError>;

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish_non_exhaustive()
    }
}

/// One scope frame. Lookup walks outward through `outer`; writes always land
/// in this frame.
#[derive(Debug)]
pub struct Env {
    outer: Option<Rc<Env>>,
    bindings: RefCell<HashMap<Symbol, Value>>,
}

impl Env {
    fn new() -> Rc<Env> {
        Rc::new(Env {
            outer: None,
            bindings: RefCell::new(HashMap::new()),
        })
    }

    fn enclosed(outer: Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            outer: Some(outer),
            bindings: RefCell::new(HashMap::new()),
        })
    }

    fn get(&self, name: &Symbol) -> Option<Value> {
        match self.bindings.borrow().get(name) {
            Some(value) => Some(value.clone()),
            None => self.outer.as_ref().and_then(|outer| outer.get(name)),
        }
    }

    fn set(&self, name: Symbol, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }
}

#[derive(Debug)]
pub enum RuntimeError {
    UnknownIdentifier {
        name: String,
        pos: Position,
    },
    TypeMismatch {
        left: &'static str,
        right: &'static str,
        pos: Position,
    },
    InvalidOperator {
        left: &'static str,
        operator: InfixOp,
        right: &'static str,
        pos: Position,
    },
    InvalidPrefix {
        operator: PrefixOp,
        operand: &'static str,
        pos: Position,
    },
    NotCallable {
        type_name: &'static str,
        pos: Position,
    },
    UnsupportedIndex {
        type_name: &'static str,
        pos: Position,
    },
    DivisionByZero {
        pos: Position,
    },
    BadArity {
        got: usize,
        want: usize,
        pos: Position,
    },
    WrongArgCount {
        name: &'static str,
        got: usize,
        want: usize,
    },
    UnsupportedArg {
        name: &'static str,
        type_name: &'static str,
    },
    Io(io::Error),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnknownIdentifier { name, pos } => {
                write!(f, "identifier not found: {} ({})", name, pos)
            }
            RuntimeError::TypeMismatch { left, right, pos } => {
                write!(f, "mismatched types: {} and {} ({})", left, right, pos)
            }
            RuntimeError::InvalidOperator {
                left,
                operator,
                right,
                pos,
            } => {
                write!(f, "invalid operator: {} {} {} ({})", left, operator, right, pos)
            }
            RuntimeError::InvalidPrefix {
                operator,
                operand,
                pos,
            } => write!(f, "invalid operator: {}{} ({})", operator, operand, pos),
            RuntimeError::NotCallable { type_name, pos } => {
                write!(f, "not a function: {} ({})", type_name, pos)
            }
            RuntimeError::UnsupportedIndex { type_name, pos } => {
                write!(f, "index operator not supported: {} ({})", type_name, pos)
            }
            RuntimeError::DivisionByZero { pos } => write!(f, "division by zero ({})", pos),
            RuntimeError::BadArity { got, want, pos } => {
                write!(f, "wrong number of arguments: got {}, want {} ({})", got, want, pos)
            }
            RuntimeError::WrongArgCount { name, got, want } => {
                write!(f, "wrong number of arguments to {}(): got {}, want {}", name, got, want)
            }
            RuntimeError::UnsupportedArg { name, type_name } => {
                write!(f, "argument to {}() not supported, got {}", name, type_name)
            }
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> RuntimeError {
        RuntimeError::Io(e)
    }
}

/// Non-local exits, threaded through the `Result` error channel so `?`
/// propagates them out of every enclosing expression, statement and block.
/// `Return` is consumed once at the nearest function-call boundary (or at
/// the program top level); `Fail` travels all the way to the driver.
#[derive(Debug)]
enum Flow {
    Return(Value),
    Fail(RuntimeError),
}

impl From<RuntimeError> for Flow {
    fn from(e: RuntimeError) -> Flow {
        Flow::Fail(e)
    }
}

/// Tree-walk evaluator with one persistent top-level environment.
#[derive(Debug)]
pub struct Evaluator<'t, W: Write> {
    output: &'t mut W,
    globals: Rc<Env>,
}

impl<'t, W: Write> Evaluator<'t, W> {
    pub fn new(output: &'t mut W) -> Evaluator<'t, W> {
        Evaluator {
            output,
            globals: Env::new(),
        }
    }

    /// Evaluates `program` in the top-level environment and returns the value
    /// of its last statement. A `return` at top level yields its operand.
    pub fn eval_program(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let env = self.globals.clone();
        let mut result = Value::Null;
        for stmt in &program.statements {
            match self.eval_stmt(stmt, &env) {
                Ok(value) => result = value,
                Err(Flow::Return(value)) => return Ok(value),
                Err(Flow::Fail(e)) => return Err(e),
            }
        }
        Ok(result)
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: &Rc<Env>) -> Result<Value, Flow> {
        match stmt {
            Stmt::Expression(expr) => self.eval_expr(expr, env),
            Stmt::Let { name, value, .. } => {
                let value = self.eval_expr(value, env)?;
                env.set(name.name.clone(), value.clone());
                Ok(value)
            }
            Stmt::Return { value, .. } => {
                let value = self.eval_expr(value, env)?;
                Err(Flow::Return(value))
            }
        }
    }

    /// Unlike a function body, a block does not consume `Return`: it unwinds
    /// further so the enclosing call (or the top level) can.
    fn eval_block(&mut self, block: &Block, env: &Rc<Env>) -> Result<Value, Flow> {
        let mut result = Value::Null;
        for stmt in &block.statements {
            result = self.eval_stmt(stmt, env)?;
        }
        Ok(result)
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value, Flow> {
        match expr {
            Expr::Identifier(ident) => self.eval_identifier(ident, env),
            Expr::Integer { value, .. } => Ok(Value::Integer(*value)),
            Expr::Float { value, .. } => Ok(Value::Float(*value)),
            Expr::Boolean { value, .. } => Ok(Value::Boolean(*value)),
            Expr::Str { value, .. } => Ok(Value::Str(Rc::from(value.as_str()))),
            Expr::Array { elements, .. } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element, env)?);
                }
                Ok(Value::Array(Rc::new(values)))
            }
            Expr::Prefix {
                token,
                operator,
                right,
            } => {
                let operand = self.eval_expr(right, env)?;
                eval_prefix(*operator, operand, token.pos).map_err(Flow::from)
            }
            Expr::Infix {
                token,
                operator,
                left,
                right,
            } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                eval_infix(*operator, left, right, token.pos).map_err(Flow::from)
            }
            Expr::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                let condition = self.eval_expr(condition, env)?;
                if condition.is_truthy() {
                    self.eval_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, env)
                } else {
                    Ok(Value::Null)
                }
            }
            Expr::Function {
                parameters, body, ..
            } => Ok(Value::Function(Rc::new(Function {
                parameters: parameters.clone(),
                body: body.clone(),
                env: env.clone(),
            }))),
            Expr::Call {
                token,
                function,
                arguments,
            } => {
                let callee = self.eval_expr(function, env)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.eval_expr(argument, env)?);
                }
                self.apply_function(callee, args, token.pos)
            }
            Expr::Index { token, left, index } => {
                let left = self.eval_expr(left, env)?;
                let index = self.eval_expr(index, env)?;
                match (&left, &index) {
                    (Value::Array(elements), Value::Integer(i)) => Ok(usize::try_from(*i)
                        .ok()
                        .and_then(|i| elements.get(i))
                        .cloned()
                        .unwrap_or(Value::Null)),
                    _ => Err(Flow::from(RuntimeError::UnsupportedIndex {
                        type_name: left.type_name(),
                        pos: token.pos,
                    })),
                }
            }
        }
    }

    fn eval_identifier(&mut self, ident: &Ident, env: &Rc<Env>) -> Result<Value, Flow> {
        if let Some(value) = env.get(&ident.name) {
            return Ok(value);
        }
        if let Some(builtin) = builtins::lookup(ident.name.name()) {
            return Ok(Value::Builtin(builtin));
        }
        Err(Flow::from(RuntimeError::UnknownIdentifier {
            name: ident.name.name().to_string(),
            pos: ident.token.pos,
        }))
    }

    fn apply_function(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        pos: Position,
    ) -> Result<Value, Flow> {
        match callee {
            Value::Function(func) => {
                if args.len() != func.parameters.len() {
                    return Err(Flow::from(RuntimeError::BadArity {
                        got: args.len(),
                        want: func.parameters.len(),
                        pos,
                    }));
                }
                let call_env = Env::enclosed(func.env.clone());
                for (param, arg) in func.parameters.iter().zip(args) {
                    call_env.set(param.name.clone(), arg);
                }
                match self.eval_block(&func.body, &call_env) {
                    Err(Flow::Return(value)) => Ok(value),
                    other => other,
                }
            }
            Value::Builtin(builtin) => {
                (builtin.func)(&mut *self.output, &args).map_err(Flow::from)
            }
            other => Err(Flow::from(RuntimeError::NotCallable {
                type_name: other.type_name(),
                pos,
            })),
        }
    }
}

fn eval_prefix(operator: PrefixOp, operand: Value, pos: Position) -> Result<Value, RuntimeError> {
    match operator {
        PrefixOp::Bang => Ok(Value::Boolean(!operand.is_truthy())),
        PrefixOp::Minus => match operand {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(RuntimeError::InvalidPrefix {
                operator,
                operand: other.type_name(),
                pos,
            }),
        },
    }
}

fn eval_infix(
    operator: InfixOp,
    left: Value,
    right: Value,
    pos: Position,
) -> Result<Value, RuntimeError> {
    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => eval_integer_infix(operator, *l, *r, pos),
        (Value::Float(l), Value::Float(r)) => Ok(eval_float_infix(operator, *l, *r)),
        (Value::Str(l), Value::Str(r)) => match operator {
            InfixOp::Plus => Ok(Value::Str(Rc::from(format!("{}{}", l, r)))),
            _ => Err(RuntimeError::InvalidOperator {
                left: "STRING",
                operator,
                right: "STRING",
                pos,
            }),
        },
        _ => match operator {
            // Equality across the remaining combinations is identity over
            // shared objects and plain value equality over primitives;
            // mismatched concrete types simply compare unequal.
            InfixOp::Eq => Ok(Value::Boolean(values_identical(&left, &right))),
            InfixOp::NotEq => Ok(Value::Boolean(!values_identical(&left, &right))),
            _ if left.type_name() != right.type_name() => Err(RuntimeError::TypeMismatch {
                left: left.type_name(),
                right: right.type_name(),
                pos,
            }),
            _ => Err(RuntimeError::InvalidOperator {
                left: left.type_name(),
                operator,
                right: right.type_name(),
                pos,
            }),
        },
    }
}

fn eval_integer_infix(
    operator: InfixOp,
    left: i64,
    right: i64,
    pos: Position,
) -> Result<Value, RuntimeError> {
    let value = match operator {
        InfixOp::Plus => Value::Integer(left.wrapping_add(right)),
        InfixOp::Minus => Value::Integer(left.wrapping_sub(right)),
        InfixOp::Asterisk => Value::Integer(left.wrapping_mul(right)),
        InfixOp::Slash => {
            if right == 0 {
                return Err(RuntimeError::DivisionByZero { pos });
            }
            Value::Integer(left.wrapping_div(right))
        }
        InfixOp::Lt => Value::Boolean(left < right),
        InfixOp::LtEq => Value::Boolean(left <= right),
        InfixOp::Gt => Value::Boolean(left > right),
        InfixOp::GtEq => Value::Boolean(left >= right),
        InfixOp::Eq => Value::Boolean(left == right),
        InfixOp::NotEq => Value::Boolean(left != right),
    };
    Ok(value)
}

fn eval_float_infix(operator: InfixOp, left: f64, right: f64) -> Value {
    match operator {
        InfixOp::Plus => Value::Float(left + right),
        InfixOp::Minus => Value::Float(left - right),
        InfixOp::Asterisk => Value::Float(left * right),
        InfixOp::Slash => Value::Float(left / right),
        InfixOp::Lt => Value::Boolean(left < right),
        InfixOp::LtEq => Value::Boolean(left <= right),
        InfixOp::Gt => Value::Boolean(left > right),
        InfixOp::GtEq => Value::Boolean(left >= right),
        InfixOp::Eq => Value::Boolean(left == right),
        InfixOp::NotEq => Value::Boolean(left != right),
    }
}

fn values_identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::Integer(l), Value::Integer(r)) => l == r,
        (Value::Float(l), Value::Float(r)) => l == r,
        (Value::Str(l), Value::Str(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => Rc::ptr_eq(l, r),
        (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
        (Value::Builtin(l), Value::Builtin(r)) => l.name == r.name,
        _ => false,
    }
}
