//! Text reader producing [`Value`] trees.
//!
//! ```text
//! atom         foo  add-right  eq?  +
//! keyword      :doc
//! string       "a \"quoted\" line\n"
//! boolean      #t  #f
//! number       42  -7  +36
//! quote        'x          => (quote x)
//! list         (f a b)
//! vector       [a b]
//! dict         {:k v ...}  (even number of forms)
//! comments     ;; to end of line    #| block |#
//! ```

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, one_of, satisfy},
    combinator::{cut, opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::pair,
};

use crate::ast::{Dict, List, NumberType, Value};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};
use std::rc::Rc;

/// Characters allowed in atoms besides ASCII letters (and digits past the first char)
pub const ATOM_SPECIAL_CHARS: &str = "!$%&*+-./<=>?@^_~";

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Accept `;` line comments and `#| |#` block comments
    pub handle_comments: bool,
    /// Deepest allowed nesting of lists, vectors, dicts and quotes
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

fn is_atom_start(c: char) -> bool {
    c.is_ascii_alphabetic() || ATOM_SPECIAL_CHARS.contains(c)
}

fn is_atom_char(c: char) -> bool {
    is_atom_start(c) || c.is_ascii_digit() || c == ':'
}

type ParseResult<'a> = IResult<&'a str, Value>;

fn error(input: &str, code: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, code))
}

fn failure(input: &str, code: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, code))
}

/// Whitespace and, if enabled, comments
fn skip_ws<'a>(input: &'a str, config: &ParseConfig) -> IResult<&'a str, ()> {
    if !config.handle_comments {
        return value((), multispace0).parse(input);
    }
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(char(';'), take_while(|c: char| c != '\n'))),
            value((), (tag("#|"), take_until("|#"), tag("|#"))),
        ))),
    )
    .parse(input)
}

/// Fails unless the token ends at a delimiter; `1abc` is not a number followed by an atom
fn delimited_token(input: &str) -> Result<(), nom::Err<nom::error::Error<&str>>> {
    match input.chars().next() {
        Some(c) if is_atom_char(c) || c == '#' => Err(error(input, ErrorKind::Verify)),
        _ => Ok(()),
    }
}

/// Parse a signed decimal integer
fn parse_number(input: &str) -> ParseResult<'_> {
    let (remaining, number_str) = recognize(pair(opt(one_of("+-")), digit1)).parse(input)?;
    delimited_token(remaining)?;

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((remaining, Value::Number(n))),
        // Overflow; no other alternative accepts a digit run either
        Err(_) => Err(failure(input, ErrorKind::Digit)),
    }
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> ParseResult<'_> {
    let (remaining, b) = alt((
        value(Value::Bool(true), tag("#t")),
        value(Value::Bool(false), tag("#f")),
    ))
    .parse(input)?;
    delimited_token(remaining)?;
    Ok((remaining, b))
}

fn parse_atom(input: &str) -> ParseResult<'_> {
    let (remaining, name) =
        recognize(pair(satisfy(is_atom_start), take_while(is_atom_char))).parse(input)?;
    Ok((remaining, Value::Atom(name.to_owned())))
}

/// Parse `:name`; the colon is not part of the keyword's text
fn parse_keyword(input: &str) -> ParseResult<'_> {
    let (remaining, _) = char(':').parse(input)?;
    let (remaining, name) = cut(take_while1(is_atom_char)).parse(remaining)?;
    Ok((remaining, Value::Keyword(name.to_owned())))
}

/// Parse a string literal
fn parse_string(input: &str) -> ParseResult<'_> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => {
                return Ok((char_iter.as_str(), Value::String(chars)));
            }
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    Some(_) => return Err(failure(remaining, ErrorKind::Escaped)),
                    // Backslash at end of input
                    None => return Err(failure(char_iter.as_str(), ErrorKind::Char)),
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            None => return Err(failure(remaining, ErrorKind::Char)),
        }
    }
}

/// Parse forms up to the `close` delimiter. Once the opening delimiter has been seen,
/// every failure is final.
fn parse_delimited<'a>(
    input: &'a str,
    open: char,
    close: char,
    config: &ParseConfig,
    depth: usize,
) -> IResult<&'a str, Vec<Value>> {
    let (mut remaining, _) = char(open).parse(input)?;
    let mut elements = Vec::new();

    loop {
        let (rest, ()) = skip_ws(remaining, config)?;
        if let Some(rest) = rest.strip_prefix(close) {
            return Ok((rest, elements));
        }
        if rest.is_empty() {
            return Err(failure(rest, ErrorKind::Char));
        }
        let (rest, element) = parse_sexpr(rest, config, depth + 1).map_err(|e| match e {
            nom::Err::Error(e) => nom::Err::Failure(e),
            other => other,
        })?;
        elements.push(element);
        remaining = rest;
    }
}

fn parse_list<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> ParseResult<'a> {
    let (remaining, elements) = parse_delimited(input, '(', ')', config, depth)?;
    Ok((remaining, Value::List(elements.into_iter().collect::<List>())))
}

fn parse_vector<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> ParseResult<'a> {
    let (remaining, elements) = parse_delimited(input, '[', ']', config, depth)?;
    Ok((remaining, Value::Vector(Rc::new(elements))))
}

fn parse_dict<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> ParseResult<'a> {
    let (remaining, elements) = parse_delimited(input, '{', '}', config, depth)?;
    if elements.len() % 2 != 0 {
        return Err(failure(input, ErrorKind::Count));
    }
    let mut dict = Dict::with_capacity(elements.len() / 2);
    let mut iter = elements.into_iter();
    while let (Some(key), Some(item)) = (iter.next(), iter.next()) {
        dict.insert(key, item);
    }
    Ok((remaining, Value::Dict(Rc::new(dict))))
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> ParseResult<'a> {
    let (remaining, _) = char('\'').parse(input)?;
    let (remaining, ()) = skip_ws(remaining, config)?;
    let (remaining, expr) = cut(|i| parse_sexpr(i, config, depth + 1)).parse(remaining)?;
    let quoted: List = [Value::Atom("quote".to_owned()), expr].into_iter().collect();
    Ok((remaining, Value::List(quoted)))
}

/// Parse one form; leading whitespace must already be consumed
fn parse_sexpr<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> ParseResult<'a> {
    if depth >= config.max_depth {
        return Err(failure(input, ErrorKind::TooLarge));
    }
    alt((
        |i| parse_quote(i, config, depth),
        |i| parse_list(i, config, depth),
        |i| parse_vector(i, config, depth),
        |i| parse_dict(i, config, depth),
        parse_string,
        parse_bool,
        parse_keyword,
        parse_number,
        parse_atom,
    ))
    .parse(input)
}

/// Convert nom parsing errors to structured parse errors
fn to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            let error = match e.code {
                ErrorKind::TooLarge => ParseError::new(
                    ParseErrorKind::TooDeeplyNested,
                    "Expression too deeply nested",
                ),
                _ if e.input.is_empty() => {
                    ParseError::new(ParseErrorKind::Incomplete, "Unexpected end of input")
                }
                ErrorKind::Count => ParseError::new(
                    ParseErrorKind::InvalidSyntax,
                    "Dict literal needs an even number of forms",
                ),
                ErrorKind::Escaped => {
                    ParseError::new(ParseErrorKind::InvalidSyntax, "Unknown escape sequence")
                }
                ErrorKind::Digit => {
                    ParseError::new(ParseErrorKind::InvalidSyntax, "Number out of range")
                }
                _ => ParseError::new(ParseErrorKind::InvalidSyntax, "Invalid syntax"),
            };
            error.with_context(input, position)
        }
        nom::Err::Incomplete(_) => {
            ParseError::new(ParseErrorKind::Incomplete, "Unexpected end of input")
        }
    }
}

/// Parse exactly one form with the default configuration
pub fn parse(input: &str) -> Result<Value, Error> {
    parse_with_config(input, &ParseConfig::default())
}

/// Parse exactly one form; anything but whitespace or comments after it is an error
pub fn parse_with_config(input: &str, config: &ParseConfig) -> Result<Value, Error> {
    let (remaining, ()) = skip_ws(input, config).map_err(|e| to_parse_error(input, e))?;
    if remaining.is_empty() {
        return Err(ParseError::new(ParseErrorKind::Incomplete, "Empty input").into());
    }
    let (remaining, form) =
        parse_sexpr(remaining, config, 0).map_err(|e| to_parse_error(input, e))?;
    let (remaining, ()) = skip_ws(remaining, config).map_err(|e| to_parse_error(input, e))?;
    if !remaining.is_empty() {
        let position = input.len() - remaining.len();
        return Err(ParseError::new(
            ParseErrorKind::TrailingContent,
            "Unexpected remaining input",
        )
        .with_context(input, position)
        .into());
    }
    Ok(form)
}

/// Parse a sequence of top-level forms with the default configuration
pub fn parse_program(input: &str) -> Result<Vec<Value>, Error> {
    parse_program_with_config(input, &ParseConfig::default())
}

pub fn parse_program_with_config(input: &str, config: &ParseConfig) -> Result<Vec<Value>, Error> {
    let mut forms = Vec::new();
    let mut remaining = input;
    loop {
        let (rest, ()) = skip_ws(remaining, config).map_err(|e| to_parse_error(input, e))?;
        if rest.is_empty() {
            return Ok(forms);
        }
        let (rest, form) = parse_sexpr(rest, config, 0).map_err(|e| to_parse_error(input, e))?;
        forms.push(form);
        remaining = rest;
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{atom, dict, kw, nil, val, vector};
    use pretty_assertions::assert_eq;

    /// Test result variants for parser tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),          // Parsing should succeed with this value
        Fails(ParseErrorKind),   // Parsing should fail with this kind
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(val(value))
    }

    fn run_parser_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("#{}", i + 1);
            match (parse(input), expected) {
                (Ok(actual), Success(expected)) => {
                    assert_eq!(actual, expected, "{test_id}: {input:?}");
                }
                (Err(Error::Parse(e)), Fails(kind)) => {
                    assert_eq!(e.kind, kind, "{test_id}: {input:?} gave {e}");
                }
                (result, expected) => {
                    panic!("{test_id}: {input:?}: expected {expected:?}, got {result:?}");
                }
            }
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // one table of cases
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // Numbers
            ("42", success(42)),
            ("-9986", success(-9986)),
            ("+36", success(36)),
            ("0", success(0)),
            ("9223372036854775807", success(NumberType::MAX)),
            ("9223372036854775808", Fails(ParseErrorKind::InvalidSyntax)),
            ("12abc", Fails(ParseErrorKind::InvalidSyntax)),
            // Atoms
            ("foo", Success(atom("foo"))),
            ("add-right", Success(atom("add-right"))),
            ("eq?", Success(atom("eq?"))),
            ("+", Success(atom("+"))),
            ("-", Success(atom("-"))),
            ("-x", Success(atom("-x"))),
            ("x1:y", Success(atom("x1:y"))),
            ("<=>", Success(atom("<=>"))),
            // Keywords
            (":doc", Success(kw("doc"))),
            (":00123", Success(kw("00123"))),
            (":", Fails(ParseErrorKind::Incomplete)),
            // Booleans
            ("#t", success(true)),
            ("#f", success(false)),
            ("#true", Fails(ParseErrorKind::InvalidSyntax)),
            // Strings
            ("\"hello\"", success("hello")),
            ("\"\"", success("")),
            (r#""a \"b\" c""#, success("a \"b\" c")),
            (r#""tab\tnew\nline\\""#, success("tab\tnew\nline\\")),
            (r#""bad \q""#, Fails(ParseErrorKind::InvalidSyntax)),
            ("\"open", Fails(ParseErrorKind::Incomplete)),
            // Lists
            ("()", Success(nil())),
            ("(1 2 3)", success([1, 2, 3])),
            ("( f  a\n b )", Success(val(vec![atom("f"), atom("a"), atom("b")]))),
            ("((1) (2))", Success(val(vec![val([1]), val([2])]))),
            ("(1 2", Fails(ParseErrorKind::Incomplete)),
            ("(1 2))", Fails(ParseErrorKind::TrailingContent)),
            (")", Fails(ParseErrorKind::InvalidSyntax)),
            // Vectors
            ("[]", Success(vector(Vec::<Value>::new()))),
            ("[a 1 :k]", Success(vector([atom("a"), val(1), kw("k")]))),
            ("[(1) [2]]", Success(vector([val([1]), vector([2])]))),
            ("[1 2", Fails(ParseErrorKind::Incomplete)),
            ("[1 2)", Fails(ParseErrorKind::InvalidSyntax)),
            // Dicts
            ("{}", Success(dict([]))),
            ("{:a 1 b [2]}", Success(dict([(kw("a"), val(1)), (atom("b"), vector([2]))]))),
            ("{:a}", Fails(ParseErrorKind::InvalidSyntax)),
            ("{:a 1", Fails(ParseErrorKind::Incomplete)),
            // Quote sugar
            ("'x", Success(val(vec![atom("quote"), atom("x")]))),
            ("'(1 2)", Success(val(vec![atom("quote"), val([1, 2])]))),
            ("''x", Success(val(vec![atom("quote"), val(vec![atom("quote"), atom("x")])]))),
            ("'", Fails(ParseErrorKind::Incomplete)),
            // Comments
            (";; leading\n42", success(42)),
            ("(1 ;; inline\n 2)", success([1, 2])),
            ("#| block |# 7", success(7)),
            ("(a #| in\nside |# b)", Success(val(vec![atom("a"), atom("b")]))),
            ("42 ;; trailing", success(42)),
            // Whitespace and emptiness
            ("  \n 5 \t", success(5)),
            ("", Fails(ParseErrorKind::Incomplete)),
            (";; only a comment", Fails(ParseErrorKind::Incomplete)),
            // Multiple forms
            ("1 2", Fails(ParseErrorKind::TrailingContent)),
        ];

        run_parser_tests(test_cases);
    }

    #[test]
    fn test_parser_depth_limits() {
        let nested = |depth: usize| format!("{}{}", "(".repeat(depth), ")".repeat(depth));

        assert!(parse(&nested(MAX_PARSE_DEPTH)).is_ok());
        let Err(Error::Parse(e)) = parse(&nested(MAX_PARSE_DEPTH + 1)) else {
            panic!("nesting past the limit should fail");
        };
        assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested);

        let mixed = format!("{}1{}", "[{:k ".repeat(10), "}]".repeat(10));
        assert!(parse(&mixed).is_ok());

        let shallow = ParseConfig {
            max_depth: 3,
            ..ParseConfig::default()
        };
        assert!(parse_with_config("((()))", &shallow).is_ok());
        assert!(parse_with_config("(((())))", &shallow).is_err());
        // Quote sugar nests like the list it expands to
        assert!(parse_with_config("''x", &shallow).is_ok());
        assert!(parse_with_config("'''x", &shallow).is_err());
    }

    #[test]
    fn test_comments_can_be_disabled() {
        let config = ParseConfig {
            handle_comments: false,
            ..ParseConfig::default()
        };
        assert!(parse_with_config(";; note\n1", &config).is_err());
        assert_eq!(parse_with_config(" 1 ", &config).unwrap(), val(1));
        // `;` is not an atom character, so it is rejected rather than read as a comment
        assert!(parse_with_config("(a ;; b\n)", &config).is_err());
    }

    #[test]
    fn test_parse_program() {
        let forms = parse_program(
            r#"
            ;; define and use
            (def x 1)
            #| skipped |#
            (+ x 2) :done
            "#,
        )
        .unwrap();
        assert_eq!(
            forms,
            vec![
                val(vec![atom("def"), atom("x"), val(1)]),
                val(vec![atom("+"), atom("x"), val(2)]),
                kw("done"),
            ]
        );
        assert_eq!(parse_program("  ").unwrap(), vec![]);
        assert!(parse_program("(ok) (broken").is_err());
    }

    #[test]
    fn test_parse_error_context() {
        let Err(Error::Parse(e)) = parse("(1 2) extra") else {
            panic!("expected trailing content error");
        };
        assert_eq!(e.context.as_deref(), Some("extra"));
        assert_eq!(
            format!("{}", Error::Parse(e)),
            "ParseError: Unexpected remaining input near 'extra'"
        );
    }

    #[test]
    fn test_display_reads_back() {
        for text in [
            "(def f (fn [x] (+ x 1)))",
            "{:a [1 2] :b \"s\\\"q\"}",
            "(quote (a :b #t #f -3))",
        ] {
            let value = parse(text).unwrap();
            assert_eq!(parse(&value.to_string()).unwrap(), value, "{text}");
        }
    }
}
