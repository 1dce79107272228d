use std::collections::VecDeque;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while1},
    character::complete::char,
    combinator::{map, value},
    error::{ErrorKind, ParseError as NomParseError},
    multi::many0_count,
    sequence::pair,
};

use crate::ast::{Node, NodeKind};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Reader settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Maximum list nesting depth before the reader gives up
    pub max_depth: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Failure {
    Syntax,
    UnclosedList,
    UnclosedString,
    UnbalancedClose,
    TooDeep,
}

/// nom error carrying the reader-level reason for the failure
#[derive(Debug)]
struct ReadError<'a> {
    input: &'a str,
    failure: Failure,
}

impl<'a> NomParseError<&'a str> for ReadError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        ReadError {
            input,
            failure: Failure::Syntax,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type ReadResult<'a, T> = IResult<&'a str, T, ReadError<'a>>;

fn fail<T>(input: &str, failure: Failure) -> ReadResult<'_, T> {
    Err(nom::Err::Failure(ReadError { input, failure }))
}

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | ';')
}

/// Skip whitespace and `;` line comments
fn skip_trivia(input: &str) -> ReadResult<'_, ()> {
    value(
        (),
        many0_count(alt((
            value((), take_while1(|c: char| c.is_whitespace())),
            value((), pair(char(';'), take_till(|c: char| c == '\n'))),
        ))),
    )
    .parse(input)
}

fn parse_atom(input: &str) -> ReadResult<'_, Node> {
    map(take_while1(is_atom_char), |text: &str| Node::atom(text)).parse(input)
}

/// String literal: everything up to the next `"`, kept verbatim
fn parse_string(input: &str) -> ReadResult<'_, Node> {
    let (rest, _) = char('"').parse(input)?;
    let (rest, text) = take_till(|c: char| c == '"').parse(rest)?;
    match rest.strip_prefix('"') {
        Some(rest) => Ok((rest, Node::string(text))),
        None => fail(input, Failure::UnclosedString),
    }
}

fn parse_list(input: &str, depth: usize, max_depth: usize) -> ReadResult<'_, Node> {
    let (mut rest, _) = char('(').parse(input)?;
    if depth >= max_depth {
        return fail(input, Failure::TooDeep);
    }

    let mut children = VecDeque::new();
    loop {
        (rest, _) = skip_trivia(rest)?;
        if rest.is_empty() {
            return fail(input, Failure::UnclosedList);
        }
        if let Some(after) = rest.strip_prefix(')') {
            return Ok((after, Node::new(NodeKind::List(children))));
        }
        let (after, child) = parse_datum(rest, depth + 1, max_depth)?;
        children.push_back(child);
        rest = after;
    }
}

/// `'datum` reads as `(quote datum)`; a `'` not followed by a datum is an ordinary atom
fn parse_quoted(input: &str, depth: usize, max_depth: usize) -> ReadResult<'_, Node> {
    let (rest, _) = char('\'').parse(input)?;
    if depth >= max_depth {
        return fail(input, Failure::TooDeep);
    }
    map(
        |input| parse_datum(input, depth + 1, max_depth),
        |datum| Node::list([Node::atom("quote"), datum]),
    )
    .parse(rest)
}

fn parse_datum(input: &str, depth: usize, max_depth: usize) -> ReadResult<'_, Node> {
    alt((
        |input| parse_quoted(input, depth, max_depth),
        |input| parse_list(input, depth, max_depth),
        parse_string,
        parse_atom,
    ))
    .parse(input)
}

fn parse_program(input: &str, max_depth: usize) -> ReadResult<'_, VecDeque<Node>> {
    let mut forms = VecDeque::new();
    let mut rest = input;
    loop {
        (rest, _) = skip_trivia(rest)?;
        if rest.is_empty() {
            return Ok((rest, forms));
        }
        if rest.starts_with(')') {
            return fail(rest, Failure::UnbalancedClose);
        }
        let (after, form) = parse_datum(rest, 0, max_depth)?;
        forms.push_back(form);
        rest = after;
    }
}

fn to_error(source: &str, error: nom::Err<ReadError<'_>>, max_depth: usize) -> Error {
    let e = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return Error::SyntaxError(ParseError::new(
                ParseErrorKind::Incomplete,
                "Incomplete input",
                None,
                None,
            ));
        }
    };

    let offset = source.len().saturating_sub(e.input.len());
    let found = e.input.chars().next().map(String::from);
    let (kind, message) = match e.failure {
        Failure::UnclosedList => (
            ParseErrorKind::Incomplete,
            "Unterminated list: missing ')'".to_owned(),
        ),
        Failure::UnclosedString => (
            ParseErrorKind::Incomplete,
            "Unterminated string literal".to_owned(),
        ),
        Failure::UnbalancedClose => (
            ParseErrorKind::UnbalancedClose,
            format!("Unexpected ')' at position {offset}"),
        ),
        Failure::TooDeep => (
            ParseErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {max_depth})"),
        ),
        Failure::Syntax => (
            ParseErrorKind::InvalidSyntax,
            format!("Invalid syntax at position {offset}"),
        ),
    };

    Error::SyntaxError(ParseError::with_context(
        kind, message, source, offset, found,
    ))
}

/// Read a whole source text into the outermost program list.
///
/// Each child of the returned list is one top-level form. Every node in the
/// result has a fresh identity, so reading the same text twice yields two
/// structurally equal but unrelated trees.
pub fn parse(source: &str) -> Result<Node, Error> {
    parse_with_config(source, &ReaderConfig::default())
}

pub fn parse_with_config(source: &str, config: &ReaderConfig) -> Result<Node, Error> {
    let (_, forms) =
        parse_program(source, config.max_depth).map_err(|e| to_error(source, e, config.max_depth))?;
    log::trace!("read {} top-level form(s)", forms.len());
    Ok(Node::new(NodeKind::List(forms)))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn a(text: &str) -> Node {
        Node::atom(text)
    }

    fn s(text: &str) -> Node {
        Node::string(text)
    }

    fn l<const N: usize>(children: [Node; N]) -> Node {
        Node::list(children)
    }

    enum Expect {
        Forms(Vec<Node>),
        Fails(ParseErrorKind),
    }
    use Expect::*;

    fn run_reader_tests(test_cases: Vec<(&str, Expect)>) {
        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("Reader test #{} ({input:?})", i + 1);
            match (parse(input), expected) {
                (Ok(program), Forms(forms)) => {
                    assert_eq!(program, Node::list(forms), "{test_id}: tree mismatch");
                }
                (Err(Error::SyntaxError(e)), Fails(kind)) => {
                    assert_eq!(e.kind, kind, "{test_id}: wrong error kind: {}", e.message);
                }
                (Ok(program), Fails(kind)) => {
                    panic!("{test_id}: expected {kind:?}, parsed {program}")
                }
                (Err(e), Forms(_)) => panic!("{test_id}: unexpected error {e}"),
                (Err(e), Fails(_)) => panic!("{test_id}: non-syntax error {e}"),
            }
        }
    }

    #[test]
    fn test_reader_forms() {
        run_reader_tests(vec![
            ("", Forms(vec![])),
            ("   \n\t ", Forms(vec![])),
            ("; nothing but a comment", Forms(vec![])),
            ("42", Forms(vec![a("42")])),
            (
                "(+ 1 (* 2 3))",
                Forms(vec![l([a("+"), a("1"), l([a("*"), a("2"), a("3")])])]),
            ),
            ("()", Forms(vec![l([])])),
            (
                "(setq x 1) (setq y 2)",
                Forms(vec![
                    l([a("setq"), a("x"), a("1")]),
                    l([a("setq"), a("y"), a("2")]),
                ]),
            ),
            // Whitespace runs of any kind separate tokens
            (
                "(  a\n\n\tb\r\n  )",
                Forms(vec![l([a("a"), a("b")])]),
            ),
            // Comments run to end of line
            (
                "; header\n(a ; trailing\n b) ; end",
                Forms(vec![l([a("a"), a("b")])]),
            ),
            ("(a;c\nb)", Forms(vec![l([a("a"), a("b")])])),
            // String contents are verbatim
            (
                "(concat \"a  ; b\" x)",
                Forms(vec![l([a("concat"), s("a  ; b"), a("x")])]),
            ),
            ("\"\"", Forms(vec![s("")])),
            (
                "(print \"line1\nline2\")",
                Forms(vec![l([a("print"), s("line1\nline2")])]),
            ),
            // Delimiters need no surrounding whitespace
            (
                "(a\"b\"(c)d)",
                Forms(vec![l([a("a"), s("b"), l([a("c")]), a("d")])]),
            ),
            ("((a)(b))", Forms(vec![l([l([a("a")]), l([a("b")])])])),
            // Quote shorthand
            ("'x", Forms(vec![l([a("quote"), a("x")])])),
            (
                "'(1 2)",
                Forms(vec![l([a("quote"), l([a("1"), a("2")])])]),
            ),
            ("(' x)", Forms(vec![l([a("'"), a("x")])])),
            ("(')", Forms(vec![l([a("'")])])),
            // Non-ASCII text
            (
                "(concat \"héllo\" wörld)",
                Forms(vec![l([a("concat"), s("héllo"), a("wörld")])]),
            ),
            ("-5", Forms(vec![a("-5")])),
        ]);
    }

    #[test]
    fn test_reader_errors() {
        run_reader_tests(vec![
            ("(", Fails(ParseErrorKind::Incomplete)),
            ("(a (b c)", Fails(ParseErrorKind::Incomplete)),
            ("(a ; )", Fails(ParseErrorKind::Incomplete)),
            ("\"abc", Fails(ParseErrorKind::Incomplete)),
            ("(concat \"abc)", Fails(ParseErrorKind::Incomplete)),
            ("'(a", Fails(ParseErrorKind::Incomplete)),
            (")", Fails(ParseErrorKind::UnbalancedClose)),
            ("(a))", Fails(ParseErrorKind::UnbalancedClose)),
            ("(a) (b)) (c)", Fails(ParseErrorKind::UnbalancedClose)),
        ]);
    }

    #[test]
    fn test_nesting_limit() {
        let config = ReaderConfig { max_depth: 3 };
        assert!(parse_with_config("(((x)))", &config).is_ok());

        let err = parse_with_config("((((x))))", &config).unwrap_err();
        let Error::SyntaxError(e) = err else {
            panic!("expected syntax error, got {err:?}");
        };
        assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested);
        assert!(e.message.contains("max depth: 3"));

        let deep = format!("{}x{}", "(".repeat(MAX_PARSE_DEPTH + 1), ")".repeat(MAX_PARSE_DEPTH + 1));
        assert!(parse(&deep).is_err());
        let ok = format!("{}x{}", "(".repeat(MAX_PARSE_DEPTH), ")".repeat(MAX_PARSE_DEPTH));
        assert!(parse(&ok).is_ok());

        // Quote shorthand nests like a list
        assert!(parse_with_config("'''x", &config).is_ok());
        assert!(parse_with_config("'('x)", &config).is_ok());
        for source in ["''''x", "''(('x))", "('''x)"] {
            match parse_with_config(source, &config) {
                Err(Error::SyntaxError(e)) => {
                    assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested, "{source}")
                }
                other => panic!("{source}: expected nesting error, got {other:?}"),
            }
        }
        assert!(parse(&format!("{}x", "'".repeat(100_000))).is_err());
    }

    #[test]
    fn test_error_context() {
        let err = parse("(setq x 1)\n(setq y (+ 1 2)))").unwrap_err();
        let Error::SyntaxError(e) = err else {
            panic!("expected syntax error");
        };
        assert_eq!(e.kind, ParseErrorKind::UnbalancedClose);
        assert_eq!(e.found.as_deref(), Some(")"));
        let context = e.context.unwrap();
        assert!(context.contains("\\n"), "newlines are escaped: {context}");
        assert!(!context.contains('\n'));
    }

    #[test]
    fn test_parse_is_pure() {
        let source = "(defun f (x) (concat \"x=\" x)) (f 'y)";
        let first = parse(source).unwrap();
        let second = parse(source).unwrap();
        assert_eq!(first, second);
        assert!(!first.same_node(&second));
        assert_eq!(first.to_string(), second.to_string());
    }
}
