//! API to control the interpreter.

use std::error::Error;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::ctx::Context;
use crate::eval::Evaluator;
use crate::parser::Parser;

pub use crate::diag::{FullParseError, ParseError, Position};
pub use crate::eval::{RuntimeError, Value};
pub use crate::token::TokenKind;

/// Source fragments evaluated into the top-level environment at startup.
/// They bootstrap the list library in the language itself, on top of the
/// native `len`/`first`/`rest`/`push` builtins.
const PRELUDE: [&str; 3] = [
    "let map = fn(arr, f) {
        let iter = fn(arr, acc) {
            if (len(arr) == 0) {
                acc
            } else {
                iter(rest(arr), push(acc, f(first(arr))))
            }
        };
        iter(arr, [])
    };",
    "let filter = fn(arr, f) {
        let iter = fn(arr, acc) {
            if (len(arr) == 0) {
                acc
            } else {
                let head = first(arr);
                iter(rest(arr), if (f(head)) { push(acc, head) } else { acc })
            }
        };
        iter(arr, [])
    };",
    "let reduce = fn(arr, initial, f) {
        let iter = fn(arr, result) {
            if (len(arr) == 0) {
                result
            } else {
                iter(rest(arr), f(result, first(arr)))
            }
        };
        iter(arr, initial)
    };",
];

/// Tree-walk interpreter for Tamarin.
///
/// Each call to [`eval`](Interpreter::eval) runs one source fragment (a line
/// of input or a whole file) through the lexer, parser and evaluator and
/// returns the value of its last statement. The top-level environment
/// persists across calls, including calls that end in an error.
///
/// # Example
///
/// Define a function in one invocation, then call it in later ones:
///
/// ```
/// # use tamarin::interpreter::Interpreter;
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// interp.eval("let max = fn(x, y) { if (x > y) { x } else { y } };")
///     .expect("interpreter error");
///
/// let value = interp.eval("max(10, 20)").expect("interpreter error");
/// assert_eq!(value.to_string(), "20");
/// ```
#[derive(Debug)]
pub struct Interpreter<'t, W: Write> {
    ctx: Rc<Context>,
    evaluator: Evaluator<'t, W>,
}

/// Errors the interpreter can raise.
#[derive(Debug)]
pub enum TamarinError {
    /// Diagnostics accumulated during parsing. When any are present the
    /// fragment is not evaluated.
    Parse(Vec<FullParseError>),

    /// Error raised during evaluation.
    Runtime(RuntimeError),
}

impl fmt::Display for TamarinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TamarinError::Parse(errors) => {
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", error)?;
                }
                Ok(())
            }
            TamarinError::Runtime(e) => write!(f, "Error: {}", e),
        }
    }
}

impl Error for TamarinError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TamarinError::Parse(_) => None,
            TamarinError::Runtime(e) => Some(e),
        }
    }
}

impl From<RuntimeError> for TamarinError {
    fn from(e: RuntimeError) -> TamarinError {
        TamarinError::Runtime(e)
    }
}

impl<'t, W: Write> Interpreter<'t, W> {
    pub fn new(output: &'t mut W) -> Interpreter<'t, W> {
        let ctx = Context::new();
        let mut interp = Interpreter {
            ctx,
            evaluator: Evaluator::new(output),
        };
        for fragment in PRELUDE {
            interp
                .eval(fragment)
                .expect("prelude fragment must evaluate");
        }
        interp
    }

    /// Runs one source fragment and returns the value of its last statement.
    pub fn eval(&mut self, source: &str) -> Result<Value, TamarinError> {
        let mut parser = Parser::new(source, self.ctx.clone());
        let program = parser.parse_program();
        let errors = parser.into_errors();
        if !errors.is_empty() {
            return Err(TamarinError::Parse(errors));
        }
        Ok(self.evaluator.eval_program(&program)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(input: &str) -> Result<String, TamarinError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        let value = interp.eval(input)?;
        Ok(value.to_string())
    }

    fn interpret_with_output(input: &str) -> (String, Result<String, TamarinError>) {
        let mut out: Vec<u8> = Vec::new();
        let result = {
            let mut interp = Interpreter::new(&mut out);
            interp.eval(input).map(|v| v.to_string())
        };
        (String::from_utf8(out).expect("output is not UTF-8"), result)
    }

    #[test]
    fn arithmetic_over_bindings() -> Result<(), TamarinError> {
        assert_eq!(interpret("let a = 5; let b = 10; a + b * 2")?, "25");
        Ok(())
    }

    #[test]
    fn recursive_factorial() -> Result<(), TamarinError> {
        assert_eq!(
            interpret("let fact = fn(n){ if (n < 2) { 1 } else { n * fact(n - 1) } }; fact(5)")?,
            "120"
        );
        Ok(())
    }

    #[test]
    fn closures_over_call_environments() -> Result<(), TamarinError> {
        assert_eq!(
            interpret("let adder = fn(x){ fn(y){ x + y } }; let add5 = adder(5); add5(7)")?,
            "12"
        );
        Ok(())
    }

    #[test]
    fn map_applies_a_function_to_each_element() -> Result<(), TamarinError> {
        assert_eq!(interpret("map([1,2,3,4], fn(x){ x * x })")?, "[1, 4, 9, 16]");
        Ok(())
    }

    #[test]
    fn reduce_folds_from_an_initial_value() -> Result<(), TamarinError> {
        assert_eq!(interpret("reduce([1,2,3,4], 0, fn(acc, x){ acc + x })")?, "10");
        Ok(())
    }

    #[test]
    fn filter_over_range_array() -> Result<(), TamarinError> {
        assert_eq!(
            interpret("filter(range_array(1,10), fn(x){ x > 5 })")?,
            "[6, 7, 8, 9, 10]"
        );
        Ok(())
    }

    #[test]
    fn string_concatenation() -> Result<(), TamarinError> {
        assert_eq!(interpret("\"foo\" + \"bar\"")?, "foobar");
        Ok(())
    }

    #[test]
    fn type_mismatch_reaches_the_driver() {
        match interpret("1 + \"x\"") {
            Err(e @ TamarinError::Runtime(RuntimeError::TypeMismatch { .. })) => {
                let message = e.to_string();
                assert!(message.starts_with("Error: mismatched types"), "message: {}", message);
            }
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn unknown_identifier_names_the_culprit() {
        match interpret("xyz") {
            Err(e @ TamarinError::Runtime(RuntimeError::UnknownIdentifier { .. })) => {
                let message = e.to_string();
                assert!(message.contains("xyz"), "message: {}", message);
                assert!(message.contains("line 1, column 1"), "message: {}", message);
            }
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn parse_errors_suppress_evaluation() {
        let (output, result) = interpret_with_output("puts(1); let = 2;");
        assert_eq!(output, "", "nothing may run when parsing failed");
        match result {
            Err(TamarinError::Parse(errors)) => assert!(!errors.is_empty()),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn environment_persists_across_invocations() -> Result<(), TamarinError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        interp.eval("let counter = fn(x) { x + 1 };")?;
        interp.eval("let a = counter(0);")?;
        assert_eq!(interp.eval("counter(a)")?.to_string(), "2");
        Ok(())
    }

    #[test]
    fn environment_survives_errors() -> Result<(), TamarinError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        interp.eval("let a = 1;")?;
        assert!(interp.eval("a + missing").is_err());
        assert_eq!(interp.eval("a")?.to_string(), "1");
        Ok(())
    }

    #[test]
    fn prelude_functions_can_be_shadowed() -> Result<(), TamarinError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        interp.eval("let map = 1;")?;
        assert_eq!(interp.eval("map")?.to_string(), "1");
        Ok(())
    }

    #[test]
    fn map_matches_a_direct_recursive_formulation() -> Result<(), TamarinError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        // Equivalence is observational: same display for the same inputs.
        let via_prelude = interp.eval("map(range_array(1, 5), fn(x) { x * 2 })")?.to_string();
        assert_eq!(via_prelude, "[2, 4, 6, 8, 10]");
        let direct = interp
            .eval(
                "let walk = fn(arr, f) {
                    let iter = fn(arr, acc) {
                        if (len(arr) == 0) { acc }
                        else { iter(rest(arr), push(acc, f(first(arr)))) }
                    };
                    iter(arr, [])
                };
                walk(range_array(1, 5), fn(x) { x * 2 })",
            )?
            .to_string();
        assert_eq!(via_prelude, direct);
        Ok(())
    }

    #[test]
    fn multi_statement_fragments_evaluate_to_the_last_value() -> Result<(), TamarinError> {
        assert_eq!(interpret("let a = 1; let b = 2; a; b; a + b")?, "3");
        Ok(())
    }

    #[test]
    fn puts_writes_through_the_injected_sink() {
        let (output, result) = interpret_with_output("puts(\"hello\", 42)");
        assert_eq!(output, "hello\n42\n");
        assert_eq!(result.expect("puts failed"), "null");
    }
}
