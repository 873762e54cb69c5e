//! Host embedding: feed top-level forms one at a time.

use crate::Error;
use crate::ast::Value;
use crate::evaluator::{self, Bindings};
use tracing::debug;

/// Evaluates top-level forms against long-lived bindings.
///
/// Each form is all-or-nothing: if it fails, the bindings are exactly as they were before
/// it started. Forms that completed earlier stay committed.
#[derive(Debug, Clone)]
pub struct Interpreter {
    bindings: Bindings,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new(Bindings::pure())
    }
}

impl Interpreter {
    pub fn new(bindings: Bindings) -> Self {
        Interpreter { bindings }
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    pub fn into_bindings(self) -> Bindings {
        self.bindings
    }

    /// Evaluate one top-level form
    pub fn eval(&mut self, form: &Value) -> Result<Value, Error> {
        let mut scratch = self.bindings.clone();
        match evaluator::eval(&mut scratch, form) {
            Ok(value) => {
                debug!(form = %form, result = %value, "top-level form evaluated");
                self.bindings = scratch;
                Ok(value)
            }
            Err(e) => {
                debug!(form = %form, error = %e, "top-level form failed");
                Err(e)
            }
        }
    }

    /// Parse `source` and evaluate its forms in order, returning the last value
    /// (`Null` for a program without forms). Stops at the first failing form; forms
    /// before it stay committed.
    #[cfg(feature = "parser")]
    pub fn eval_str(&mut self, source: &str) -> Result<Value, Error> {
        let forms = crate::parser::parse_program(source)?;
        let mut result = Value::Null;
        for form in &forms {
            result = self.eval(form)?;
        }
        Ok(result)
    }
}

#[cfg(all(test, feature = "parser"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::ast::val;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failed_form_rolls_back() {
        let mut interp = Interpreter::default();
        interp.eval_str("(def r (ref 1)) (def x 1)").unwrap();

        // Both definitions and the ref write happen before the throw
        let err = interp
            .eval_str("(do (def x 2) (def y 3) (write-ref r 9) (throw 'stop x))")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Thrown);

        assert_eq!(interp.eval_str("x").unwrap(), val(1));
        assert_eq!(interp.eval_str("(read-ref r)").unwrap(), val(1));
        assert_eq!(
            interp.eval_str("y").unwrap_err(),
            Error::UnknownIdentifier("y".into())
        );
    }

    #[test]
    fn test_earlier_forms_stay_committed() {
        let mut interp = Interpreter::default();
        let err = interp.eval_str("(def a 1) (def b (nope)) (def c 3)").unwrap_err();
        assert_eq!(err, Error::UnknownIdentifier("nope".into()));

        assert_eq!(interp.eval_str("a").unwrap(), val(1));
        assert!(interp.eval_str("b").is_err());
        assert!(interp.eval_str("c").is_err());
    }

    #[test]
    fn test_parse_errors_evaluate_nothing() {
        let mut interp = Interpreter::default();
        let err = interp.eval_str("(def a 1) (def b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(interp.bindings().env().is_empty());
    }

    #[test]
    fn test_empty_program() {
        let mut interp = Interpreter::default();
        assert_eq!(interp.eval_str(" ;; nothing\n").unwrap(), Value::Null);
    }
}
