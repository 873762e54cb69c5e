#![cfg(feature = "parser")]
#![expect(clippy::unwrap_used)] // test code OK

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use statelisp::ast::{Value, val};
use statelisp::builtinops::PrimitiveTable;
use statelisp::evaluator::SPECIAL_FORMS;
use statelisp::{Bindings, Error, ErrorKind, Interpreter};

#[test]
fn nested_evaluation_returns_result_and_state() {
    let mut interp = Interpreter::default();
    let pair = interp.eval_str("(base-eval '(do (def n 4) (+ n 1)) (pure-state))").unwrap();
    let Value::Vector(items) = &pair else {
        panic!("expected [result state], got {pair}");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], val(5));
    let Value::State(state) = &items[1] else {
        panic!("expected a state, got {}", items[1]);
    };
    assert_eq!(state.env.get("n"), Some(&val(4)));
}

#[test]
fn state_threads_through_repeated_nested_evaluation() {
    let mut interp = Interpreter::default();
    interp
        .eval_str(
            "(def step (fn [st form] (nth 1 (base-eval form st))))
             (def st (step (pure-state) '(def counter (ref 0))))
             (def st (step st '(write-ref counter (+ 1 (read-ref counter)))))
             (def st (step st '(write-ref counter (+ 1 (read-ref counter)))))",
        )
        .unwrap();
    assert_eq!(
        interp.eval_str("(first (base-eval '(read-ref counter) st))").unwrap(),
        val(2)
    );
    // The outer store was never touched
    assert!(interp.bindings().refs().is_empty());
}

#[test]
fn narrowed_table_limits_nested_evaluation() {
    let table = PrimitiveTable::pure().without(["write-ref"]);
    let mut interp = Interpreter::new(Bindings::with_table(table));

    let err = interp
        .eval_str("(base-eval '(write-ref (ref 0) 1) (pure-state))")
        .unwrap_err();
    assert_eq!(err, Error::UnknownIdentifier("write-ref".into()));
    assert_eq!(
        interp.eval_str("(first (base-eval '(read-ref (ref 3)) (pure-state)))").unwrap(),
        val(3)
    );
}

proptest! {
    #[test]
    fn prop_outer_bindings_are_invisible_to_pure_state(name in "[a-z][a-z0-9-]{0,8}") {
        let table = PrimitiveTable::pure();
        prop_assume!(!table.contains(&name));
        prop_assume!(!SPECIAL_FORMS.contains(&name.as_str()));

        let mut bindings = Bindings::pure();
        bindings.define(&name, val(1));
        let mut interp = Interpreter::new(bindings);

        prop_assert_eq!(interp.eval_str(&name).unwrap(), val(1));
        let err = interp.eval_str(&format!("(base-eval '{name} (pure-state))")).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::UnknownIdentifier);
    }
}
