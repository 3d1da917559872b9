//! Grammar combinators and the grammar-notation compiler
//!
//! Grammars are declared as Rust values (see [`ast`]) and compiled into the
//! BNF-like notation understood by constrained-decoding engines, one
//! `name ::= body` production per line. Existing grammar files can be parsed
//! back into a [`Grammar`] with [`parse`], e.g. to re-emit them under a name
//! prefix and concatenate them with other grammars.
//!
//! # Example
//!
//! ```
//! # use gramtok::{choice, seq, grammar::{ast::{Grammar, range, char_set}, compiler::CompilerOptions}};
//! let grammar = Grammar::new()
//!     .rule_with("root", |refs| seq![refs.get("int"), choice!["", seq![".", refs.get("int")]]])
//!     .rule_with("int", |_| seq![char_set(['-', '+']).optional(), range('0', '9').repeat1()]);
//!
//! let options = CompilerOptions {
//!     name_prefix: Some("number".to_owned()),
//!     ..Default::default()
//! };
//!
//! assert_eq!(
//!     grammar.compile(&options).unwrap(),
//!     "number-root ::= number-int (\"\" | \".\" number-int)\nnumber-int ::= [-+]? [0-9]+",
//! );
//! ```

pub mod ast;
pub mod compiler;
mod parser;

use std::{
    collections::HashSet,
    path::Path,
    sync::Arc,
};

pub use self::{
    ast::{
        Grammar,
        Name,
        Rule,
    },
    compiler::{
        stringify,
        CompilerOptions,
        Refs,
    },
};
use self::ast::Definition;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("production '{0}' is undefined")]
    Undefined(String),

    #[error("production '{0}' references itself and can't be inlined")]
    Recursive(String),

    #[error("parse error:\n{0}")]
    Parse(String),
}

/// Parses grammar notation into a [`Grammar`].
///
/// References between the parsed productions are resolved through [`Refs`],
/// so they follow the compiler's name prefix and inline mode. References to
/// names the file doesn't define are kept verbatim.
pub fn parse(input: &str) -> Result<Grammar, Error> {
    let productions = match parser::parse_grammar_complete(input) {
        Ok((_, productions)) => productions,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(Error::Parse(nom::error::convert_error(input, e)));
        }
        _ => unreachable!(),
    };

    let names = Arc::new(
        productions
            .iter()
            .map(|(name, _)| name.as_str().to_owned())
            .collect::<HashSet<_>>(),
    );

    let mut grammar = Grammar::new();
    for (name, rule) in productions {
        let names = names.clone();
        grammar.insert(
            name,
            Definition::builder(move |refs| {
                rule.clone().substitute_named(&mut |name| {
                    names
                        .contains(name.as_str())
                        .then(|| refs.get(name.as_str()))
                })
            }),
        );
    }

    tracing::debug!(productions = grammar.len(), "parsed grammar");

    Ok(grammar)
}

pub fn compile_from_source(
    path: impl AsRef<Path>,
    options: &CompilerOptions,
) -> Result<String, crate::Error> {
    let source = std::fs::read_to_string(path)?;
    let grammar = parse(&source)?;
    let output = grammar.compile(options)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reemits_parsed_grammars_with_prefix() {
        let grammar = parse(
            r#"
root ::= "[" item ("," item)* "]"
item ::= [a-z]+ | ws
        "#,
        )
        .unwrap();

        let options = CompilerOptions {
            name_prefix: Some("list".to_owned()),
            ..Default::default()
        };

        assert_eq!(
            grammar.compile(&options).unwrap(),
            "list-root ::= \"[\" list-item (\",\" list-item)* \"]\"\nlist-item ::= ([a-z]+ | ws)"
        );
    }

    const TIMESTAMP: &str = r#"
# timestamps like 2023-11-05, 2023-11-05T09:30 or 2023-11-05T09:30:15.250Z
root ::= date ("T" time zone?)?
date ::= [0-9]{4} "-" [0-9]{2} "-" [0-9]{2}
time ::= [0-9]{2} ":" [0-9]{2} (":" [0-9]{2,})? ("." [0-9]{1,3})?
zone ::= "Z" | [-+] [0-9]{2} (":"? [0-9]{2})?
"#;

    #[test]
    fn it_compiles_parsed_qualifiers_and_groups() {
        let options = CompilerOptions {
            name_prefix: Some("ts".to_owned()),
            ..Default::default()
        };

        let compiled = parse(TIMESTAMP).unwrap().compile(&options).unwrap();
        assert_eq!(
            compiled.lines().collect::<Vec<_>>(),
            [
                "ts-root ::= ts-date (\"T\" ts-time ts-zone?)?",
                "ts-date ::= [0-9]{4,4} \"-\" [0-9]{2,2} \"-\" [0-9]{2,2}",
                "ts-time ::= [0-9]{2,2} \":\" [0-9]{2,2} (\":\" [0-9]{2,2} [0-9]*)? (\".\" [0-9]{1,3})?",
                "ts-zone ::= (\"Z\" | [-+] [0-9]{2,2} (\":\"? [0-9]{2,2})?)",
            ]
        );
    }

    #[test]
    fn it_roundtrips_compiled_grammars() {
        let options = CompilerOptions {
            escape_literals: true,
            ..Default::default()
        };

        let compiled = parse(TIMESTAMP).unwrap().compile(&options).unwrap();
        let recompiled = parse(&compiled).unwrap().compile(&options).unwrap();
        assert_eq!(compiled, recompiled);
        assert_eq!(compiled.lines().count(), 4);
    }

    #[test]
    fn it_reports_parse_errors() {
        assert!(matches!(parse("root ::= [a-z"), Err(Error::Parse(_))));
        assert!(matches!(parse("root ::= "), Err(Error::Parse(_))));
    }

    #[test]
    fn it_checks_parsed_grammars() {
        parse("root ::= a\na ::= \"a\"").unwrap().check().unwrap();
        // unknown names are external references
        parse("root ::= other-grammar-root").unwrap().check().unwrap();
    }

    #[test]
    fn it_checks_with_the_compiler_options() {
        let grammar = parse("root ::= ws \"x\"\nws ::= ([ \\t\\n] ws)?").unwrap();
        grammar.check().unwrap();

        let inline = CompilerOptions {
            inline: true,
            ..Default::default()
        };
        assert!(matches!(
            grammar.check_with(&inline),
            Err(Error::Recursive(name)) if name == "ws"
        ));
        assert!(matches!(grammar.compile(&inline), Err(Error::Recursive(_))));

        let prefixed = CompilerOptions {
            name_prefix: Some("lexer".to_owned()),
            ..Default::default()
        };
        grammar.check_with(&prefixed).unwrap();
    }
}
