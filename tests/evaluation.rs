#![cfg(feature = "parser")]
#![expect(clippy::unwrap_used)] // test code OK

use pretty_assertions::assert_eq;
use statelisp::ast::{Value, atom, kw, nil, val, vector};
use statelisp::{Bindings, Error, ErrorKind, Interpreter, eval, parser::parse};

fn run(source: &str) -> Result<Value, Error> {
    Interpreter::default().eval_str(source)
}

#[test]
fn definitions_are_visible_to_later_forms() {
    assert_eq!(run("(do (def x 3) x)").unwrap(), val(3));
    assert_eq!(run("(def x 3) (def y (+ x 1)) y").unwrap(), val(4));
}

#[test]
fn only_false_is_falsy() {
    assert_eq!(run(r#"(if 0 "a" "b")"#).unwrap(), val("a"));
    assert_eq!(run(r#"(if '() "a" "b")"#).unwrap(), val("a"));
    assert_eq!(run(r#"(if "" "a" "b")"#).unwrap(), val("a"));
    assert_eq!(run(r#"(if #f "a" "b")"#).unwrap(), val("b"));
}

#[test]
fn unmatched_cond_is_null() {
    assert_eq!(run("(cond #f 1 #f 2)").unwrap(), Value::Null);
}

#[test]
fn lambda_arity_mismatch() {
    assert_eq!(
        run("((fn [a b] a) 1)").unwrap_err(),
        Error::WrongNumberArgs {
            op: "lambda".into(),
            expected: 2,
            actual: 1,
        }
    );
}

#[test]
fn empty_application() {
    assert_eq!(
        run("()").unwrap_err(),
        Error::WrongNumberArgs {
            op: "application".into(),
            expected: 2,
            actual: 0,
        }
    );
}

#[test]
fn reference_cells() {
    assert_eq!(
        run("(do (def r (ref 3)) (write-ref r 4) (read-ref r))").unwrap(),
        val(4)
    );

    let mut bindings = Bindings::pure();
    bindings.define("dangling", Value::Ref(5));
    let err = eval(&mut bindings, &parse("(read-ref dangling)").unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Impossible);
}

#[test]
fn church_numerals_through_def_rec() {
    let mut interp = Interpreter::default();
    interp
        .eval_str(
            "(def s (fn [n] (fn [f x] (f (n f x)))))
             (def z (fn [f x] x))
             (def add1 (fn [x] (+ x 1)))
             (def-rec church (fn [n] (if (eq? n 0) z (s (church (- n 1))))))",
        )
        .unwrap();

    for n in 0..5 {
        let result = interp.eval_str(&format!("((church {n}) add1 0)")).unwrap();
        assert_eq!(result, val(n), "church numeral {n}");
    }
}

#[test]
fn dict_literals_evaluate_keys_and_values() {
    let result = run("(do (def atom1 :k1) (def atom2 5) {atom1 3 :key [4 atom2]})").unwrap();
    assert_eq!(
        result,
        statelisp::ast::dict([(kw("k1"), val(3)), (kw("key"), vector([4, 5]))])
    );
}

#[test]
fn sequences_share_one_interface() {
    let cases = [
        ("(length \"héllo\")", val(5)),
        ("(take 2 [1 2 3])", vector([1, 2])),
        ("(drop 2 '(1 2 3))", val([3])),
        ("(nth 1 \"abc\")", val("b")),
        ("(first (rest [1 2 3]))", val(2)),
        ("(cons 0 '(1))", val([0, 1])),
        ("(add-right [1] 2)", vector([1, 2])),
        ("(rest '(1))", nil()),
    ];
    for (source, expected) in cases {
        assert_eq!(run(source).unwrap(), expected, "{source}");
    }
}

#[test]
fn dicts_as_data() {
    let mut interp = Interpreter::default();
    interp.eval_str("(def d (dict :a 1 :b 2))").unwrap();
    assert_eq!(interp.eval_str("(lookup :b d)").unwrap(), val(2));
    assert_eq!(
        interp.eval_str("(lookup :c (insert :c 3 d))").unwrap(),
        val(3)
    );
    // insert leaves its argument untouched
    assert_eq!(
        interp.eval_str("(lookup :c d)").unwrap_err().kind(),
        ErrorKind::Other
    );
    assert_eq!(
        interp.eval_str("(eq? d {:b 2 :a 1})").unwrap(),
        val(true)
    );
}

#[test]
fn thrown_errors_carry_label_and_payload() {
    let err = run("(throw 'not-found [:user 7])").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Thrown);
    assert_eq!(err.label(), Some("not-found"));
    let Error::Thrown { payload, .. } = err else {
        panic!("expected a thrown error");
    };
    assert_eq!(payload, vector([kw("user"), val(7)]));
}

#[test]
fn errors_abort_the_rest_of_the_form() {
    let mut interp = Interpreter::default();
    interp.eval_str("(def r (ref 0))").unwrap();
    let err = interp
        .eval_str("(do (write-ref r 1) (first '()) (write-ref r 2))")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert_eq!(interp.eval_str("(read-ref r)").unwrap(), val(0));
}

#[test]
fn quoted_code_is_data() {
    assert_eq!(
        run("'(fn [x] x)").unwrap(),
        val(vec![atom("fn"), vector([atom("x")]), atom("x")])
    );
    assert_eq!(run("(eval-me)").unwrap_err().kind(), ErrorKind::UnknownIdentifier);
}
