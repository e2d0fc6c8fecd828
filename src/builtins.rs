//! Native built-in functions.
//!
//! The table is consulted only after identifier lookup has missed every
//! environment scope, so user bindings can shadow any builtin. All builtins
//! check their arity explicitly; `push` returns a fresh array rather than
//! mutating its argument, which keeps arrays append-by-copy throughout.

use std::io::Write;
use std::rc::Rc;

use crate::eval::{Builtin, RuntimeError, Value};

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name).copied()
}

const BUILTINS: &[Builtin] = &[
    Builtin { name: "len", func: len },
    Builtin { name: "first", func: first },
    Builtin { name: "last", func: last },
    Builtin { name: "rest", func: rest },
    Builtin { name: "push", func: push },
    Builtin { name: "puts", func: puts },
    Builtin { name: "range_array", func: range_array },
];

fn len(_out: &mut dyn Write, args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("len", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(Value::Integer(elements.len() as i64)),
        Value::Str(s) => Ok(Value::Integer(s.len() as i64)),
        other => Err(unsupported("len", other)),
    }
}

fn first(_out: &mut dyn Write, args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("first", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(elements.first().cloned().unwrap_or(Value::Null)),
        other => Err(unsupported("first", other)),
    }
}

fn last(_out: &mut dyn Write, args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("last", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(elements.last().cloned().unwrap_or(Value::Null)),
        other => Err(unsupported("last", other)),
    }
}

/// All elements but the first, as a new array; `null` when empty.
fn rest(_out: &mut dyn Write, args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("rest", args, 1)?;
    match &args[0] {
        Value::Array(elements) => {
            if elements.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Array(Rc::new(elements[1..].to_vec())))
            }
        }
        other => Err(unsupported("rest", other)),
    }
}

fn push(_out: &mut dyn Write, args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("push", args, 2)?;
    match &args[0] {
        Value::Array(elements) => {
            let mut extended = elements.as_ref().clone();
            extended.push(args[1].clone());
            Ok(Value::Array(Rc::new(extended)))
        }
        other => Err(unsupported("push", other)),
    }
}

/// Prints each argument's display form on its own line. Variadic.
fn puts(out: &mut dyn Write, args: &[Value]) -> Result<Value, RuntimeError> {
    for arg in args {
        writeln!(out, "{}", arg)?;
    }
    Ok(Value::Null)
}

/// `range_array(a, b)` is the inclusive integer range `[a, a+1, …, b]`,
/// empty when `a > b`.
fn range_array(_out: &mut dyn Write, args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("range_array", args, 2)?;
    match (&args[0], &args[1]) {
        (Value::Integer(start), Value::Integer(stop)) => {
            let elements: Vec<Value> = (*start..=*stop).map(Value::Integer).collect();
            Ok(Value::Array(Rc::new(elements)))
        }
        (Value::Integer(_), other) | (other, _) => Err(unsupported("range_array", other)),
    }
}

fn check_arity(name: &'static str, args: &[Value], want: usize) -> Result<(), RuntimeError> {
    if args.len() == want {
        Ok(())
    } else {
        Err(RuntimeError::WrongArgCount {
            name,
            got: args.len(),
            want,
        })
    }
}

fn unsupported(name: &'static str, arg: &Value) -> RuntimeError {
    RuntimeError::UnsupportedArg {
        name,
        type_name: arg.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(values: &[i64]) -> Value {
        Value::Array(Rc::new(values.iter().copied().map(Value::Integer).collect()))
    }

    fn call(func: fn(&mut dyn Write, &[Value]) -> Result<Value, RuntimeError>, args: &[Value]) -> Result<Value, RuntimeError> {
        let mut out: Vec<u8> = Vec::new();
        func(&mut out, args)
    }

    #[test]
    fn lookup_finds_every_builtin() {
        for name in ["len", "first", "last", "rest", "push", "puts", "range_array"] {
            assert!(lookup(name).is_some(), "missing builtin: {}", name);
        }
        assert!(lookup("map").is_none());
    }

    #[test]
    fn len_of_arrays_and_strings() {
        assert_eq!(call(len, &[array(&[1, 2, 3])]).unwrap().to_string(), "3");
        assert_eq!(call(len, &[Value::Str("hello".into())]).unwrap().to_string(), "5");
    }

    #[test]
    fn len_rejects_other_types() {
        match call(len, &[Value::Integer(1)]) {
            Err(RuntimeError::UnsupportedArg { name: "len", type_name: "INTEGER" }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn arity_is_checked() {
        match call(len, &[]) {
            Err(RuntimeError::WrongArgCount { name: "len", got: 0, want: 1 }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
        match call(push, &[array(&[])]) {
            Err(RuntimeError::WrongArgCount { name: "push", got: 1, want: 2 }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn first_and_last() {
        let arr = array(&[1, 2, 3]);
        assert_eq!(call(first, &[arr.clone()]).unwrap().to_string(), "1");
        assert_eq!(call(last, &[arr]).unwrap().to_string(), "3");
        assert_eq!(call(first, &[array(&[])]).unwrap().to_string(), "null");
        assert_eq!(call(last, &[array(&[])]).unwrap().to_string(), "null");
    }

    #[test]
    fn rest_drops_the_head() {
        assert_eq!(call(rest, &[array(&[1, 2, 3])]).unwrap().to_string(), "[2, 3]");
        assert_eq!(call(rest, &[array(&[1])]).unwrap().to_string(), "[]");
        assert_eq!(call(rest, &[array(&[])]).unwrap().to_string(), "null");
    }

    #[test]
    fn push_copies_instead_of_mutating() {
        let arr = array(&[1]);
        let pushed = call(push, &[arr.clone(), Value::Integer(2)]).unwrap();
        assert_eq!(pushed.to_string(), "[1, 2]");
        assert_eq!(arr.to_string(), "[1]");
    }

    #[test]
    fn range_array_is_inclusive() {
        assert_eq!(
            call(range_array, &[Value::Integer(1), Value::Integer(5)]).unwrap().to_string(),
            "[1, 2, 3, 4, 5]"
        );
        assert_eq!(
            call(range_array, &[Value::Integer(3), Value::Integer(1)]).unwrap().to_string(),
            "[]"
        );
    }

    #[test]
    fn range_array_rejects_non_integers() {
        match call(range_array, &[Value::Integer(1), Value::Float(2.0)]) {
            Err(RuntimeError::UnsupportedArg { name: "range_array", type_name: "FLOAT" }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
        match call(range_array, &[Value::Boolean(true), Value::Integer(2)]) {
            Err(RuntimeError::UnsupportedArg { name: "range_array", type_name: "BOOLEAN" }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn puts_returns_null_and_writes_lines() {
        let mut out: Vec<u8> = Vec::new();
        let result = puts(&mut out, &[Value::Integer(1), Value::Str("x".into())]).unwrap();
        assert!(matches!(result, Value::Null));
        assert_eq!(String::from_utf8(out).unwrap(), "1\nx\n");
    }
}
