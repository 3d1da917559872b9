use std::{
    cell::RefCell,
    collections::{
        HashMap,
        HashSet,
    },
};

use itertools::Itertools;

use super::{
    ast::{
        CharRange,
        Grammar,
        Literal,
        Name,
        Range,
        Rule,
    },
    Error,
};
use crate::utils::IsLast;

#[derive(Clone, Debug, Default)]
pub struct CompilerOptions {
    /// Substitute the body of referenced productions instead of emitting
    /// their names.
    pub inline: bool,

    /// Prefix every production name (and every reference to it) with
    /// `<prefix>-`.
    pub name_prefix: Option<String>,

    /// Backslash-escape quotes, backslashes and control characters in
    /// literals and character sets. Off by default, in which case literals are
    /// emitted verbatim.
    pub escape_literals: bool,
}

impl CompilerOptions {
    pub fn prefixed(&self, name: &str) -> Name {
        match &self.name_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{name}").into(),
            _ => name.into(),
        }
    }
}

/// Stringifies a single rule with default options.
pub fn stringify(rule: &Rule) -> String {
    let mut buffer = Buffer::default();
    rule.compile(&mut buffer);
    buffer.text
}

/// Hands out references to the productions of a grammar.
///
/// Builder closures of a [`Grammar`] receive this. In reference mode
/// [`Refs::get`] returns a [`Rule::Named`] for the (prefixed) production
/// name, which is what makes recursive grammars possible. In inline mode it
/// returns the referenced production's body instead.
pub struct Refs<'g> {
    grammar: &'g Grammar,
    options: &'g CompilerOptions,
    state: RefCell<RefsState>,
}

#[derive(Default)]
struct RefsState {
    inlined: HashMap<String, Rule>,
    in_progress: HashSet<String>,
    undefined: Vec<Name>,
    error: Option<Error>,
}

impl<'g> Refs<'g> {
    fn new(grammar: &'g Grammar, options: &'g CompilerOptions) -> Self {
        Self {
            grammar,
            options,
            state: Default::default(),
        }
    }

    pub fn get(&self, name: &str) -> Rule {
        if !self.grammar.contains(name) {
            self.state.borrow_mut().undefined.push(name.into());
            return Rule::Named(self.options.prefixed(name));
        }

        if self.options.inline {
            self.inline(name)
        }
        else {
            Rule::Named(self.options.prefixed(name))
        }
    }

    fn inline(&self, name: &str) -> Rule {
        {
            let mut state = self.state.borrow_mut();
            if let Some(rule) = state.inlined.get(name) {
                return rule.clone();
            }
            if !state.in_progress.insert(name.to_owned()) {
                tracing::warn!(name, "recursive reference can't be inlined");
                state
                    .error
                    .get_or_insert_with(|| Error::Recursive(name.to_owned()));
                return Rule::Named(self.options.prefixed(name));
            }
        }

        // the borrow must be released here, since the builder calls back into us.
        let rule = self.build(name);

        let mut state = self.state.borrow_mut();
        state.in_progress.remove(name);
        state.inlined.insert(name.to_owned(), rule.clone());
        rule
    }

    fn build(&self, name: &str) -> Rule {
        self.grammar
            .get(name)
            .map(|definition| definition.build(self))
            .unwrap_or_else(|| unreachable!("production '{name}' vanished"))
    }

    fn take_error(&self) -> Option<Error> {
        self.state.borrow_mut().error.take()
    }

    fn take_undefined(&self) -> Vec<Name> {
        std::mem::take(&mut self.state.borrow_mut().undefined)
    }
}

pub struct Compiler<'g> {
    grammar: &'g Grammar,
    options: &'g CompilerOptions,
}

impl<'g> Compiler<'g> {
    pub fn new(grammar: &'g Grammar, options: &'g CompilerOptions) -> Self {
        Self { grammar, options }
    }

    /// Builds the body of every production, in order.
    pub fn productions(&self) -> Result<Vec<(Name, Rule)>, Error> {
        let refs = Refs::new(self.grammar, self.options);

        let productions = self
            .grammar
            .productions()
            .iter()
            .map(|production| {
                let rule = if self.options.inline {
                    refs.inline(production.name.as_str())
                }
                else {
                    production.definition.build(&refs)
                };
                (self.options.prefixed(production.name.as_str()), rule)
            })
            .collect();

        if let Some(error) = refs.take_error() {
            return Err(error);
        }

        for name in refs.take_undefined() {
            tracing::debug!(%name, "reference to undefined production");
        }

        Ok(productions)
    }

    pub fn compile(&self) -> Result<String, Error> {
        let productions = self.productions()?;

        let output = productions
            .iter()
            .map(|(name, rule)| {
                tracing::trace!(%name, "compiling production");
                let mut buffer = Buffer::new(self.options.escape_literals);
                buffer.push_str(name.as_str());
                buffer.push_str(" ::= ");
                rule.compile(&mut buffer);
                buffer.text
            })
            .join("\n");

        Ok(output)
    }

    /// Checks that every reference handed out through [`Refs`] names a
    /// production of the grammar.
    pub fn check(&self) -> Result<(), Error> {
        let refs = Refs::new(self.grammar, self.options);

        for production in self.grammar.productions() {
            if self.options.inline {
                refs.inline(production.name.as_str());
            }
            else {
                production.definition.build(&refs);
            }
        }

        if let Some(error) = refs.take_error() {
            return Err(error);
        }

        match refs.take_undefined().into_iter().next() {
            Some(name) => Err(Error::Undefined(name.to_string())),
            None => Ok(()),
        }
    }
}

impl Grammar {
    /// Compiles the grammar into grammar notation, one production per line.
    pub fn compile(&self, options: &CompilerOptions) -> Result<String, Error> {
        Compiler::new(self, options).compile()
    }

    /// Checks references with default options. See [`Grammar::check_with`].
    pub fn check(&self) -> Result<(), Error> {
        self.check_with(&CompilerOptions::default())
    }

    /// Checks that every reference resolves, and in inline mode that no
    /// production refers to itself.
    pub fn check_with(&self, options: &CompilerOptions) -> Result<(), Error> {
        Compiler::new(self, options).check()
    }
}

#[derive(Debug, Default)]
struct Buffer {
    text: String,
    escape: bool,
}

impl Buffer {
    fn new(escape: bool) -> Self {
        Self {
            text: String::new(),
            escape,
        }
    }

    fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    fn literal(&mut self, s: &str) {
        self.text.push('"');
        if self.escape {
            for c in s.chars() {
                match c {
                    '"' => self.text.push_str("\\\""),
                    '\\' => self.text.push_str("\\\\"),
                    _ => self.control_char(c),
                }
            }
        }
        else {
            self.text.push_str(s);
        }
        self.text.push('"');
    }

    fn class_char(&mut self, c: char) {
        if self.escape {
            match c {
                ']' => self.text.push_str("\\]"),
                '\\' => self.text.push_str("\\\\"),
                _ => self.control_char(c),
            }
        }
        else {
            self.text.push(c);
        }
    }

    fn control_char(&mut self, c: char) {
        match c {
            '\n' => self.text.push_str("\\n"),
            '\r' => self.text.push_str("\\r"),
            '\t' => self.text.push_str("\\t"),
            c if c.is_control() && (c as u32) <= 0xff => {
                self.text.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => self.text.push(c),
        }
    }
}

trait Compile {
    fn compile(&self, buffer: &mut Buffer);
}

impl Compile for Rule {
    fn compile(&self, buffer: &mut Buffer) {
        match self {
            Rule::Literal(literal) => literal.compile(buffer),
            Rule::Sequence(items) => {
                for (item, is_last) in IsLast::new(items.iter()) {
                    item.compile(buffer);
                    if !is_last {
                        buffer.push_str(" ");
                    }
                }
            }
            Rule::Choice(items) => {
                buffer.push_str("(");
                for (item, is_last) in IsLast::new(items.iter()) {
                    item.compile(buffer);
                    if !is_last {
                        buffer.push_str(" | ");
                    }
                }
                buffer.push_str(")");
            }
            Rule::Repeat { inner, min, max } => {
                inner.compile(buffer);
                buffer.push_str(&format!("{{{min},{max}}}"));
            }
            Rule::Repeat0(inner) => {
                inner.compile(buffer);
                buffer.push_str("*");
            }
            Rule::Repeat1(inner) => {
                inner.compile(buffer);
                buffer.push_str("+");
            }
            Rule::Optional(inner) => {
                inner.compile(buffer);
                buffer.push_str("?");
            }
            Rule::Range(range) => range.compile(buffer),
            Rule::Named(name) => name.compile(buffer),
        }
    }
}

impl Compile for Literal {
    fn compile(&self, buffer: &mut Buffer) {
        buffer.literal(&self.0);
    }
}

impl Compile for Name {
    fn compile(&self, buffer: &mut Buffer) {
        buffer.push_str(self.as_str());
    }
}

impl Compile for Range {
    fn compile(&self, buffer: &mut Buffer) {
        buffer.push_str("[");
        match self {
            Range::Between { min, max } => {
                buffer.class_char(*min);
                buffer.push_str("-");
                buffer.class_char(*max);
            }
            Range::Set(chars) => {
                for c in chars {
                    buffer.class_char(*c);
                }
            }
            Range::Class { items, negated } => {
                if *negated {
                    buffer.push_str("^");
                }
                for item in items {
                    match item {
                        CharRange::Single(c) => buffer.class_char(*c),
                        CharRange::Range { start, end } => {
                            buffer.class_char(*start);
                            buffer.push_str("-");
                            buffer.class_char(*end);
                        }
                    }
                }
            }
        }
        buffer.push_str("]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        choice,
        grammar::ast::{
            char_set,
            literal,
            named,
            optional,
            range,
            repeat,
            repeat0,
            repeat1,
            seq,
            Definition,
        },
        seq,
    };

    #[test]
    fn it_stringifies_empty_sequences_and_choices() {
        assert_eq!(stringify(&Rule::Sequence(vec![])), "");
        assert_eq!(stringify(&Rule::Choice(vec![])), "()");
    }

    #[test]
    fn it_stringifies_literals_verbatim() {
        assert_eq!(stringify(&literal("hello")), "\"hello\"");
        assert_eq!(stringify(&literal("say \"hi\"")), "\"say \"hi\"\"");
    }

    #[test]
    fn it_stringifies_sequences_and_choices() {
        assert_eq!(stringify(&seq!["a", named("b"), 'c']), "\"a\" b \"c\"");
        assert_eq!(
            stringify(&choice!["a", named("b"), range('0', '9')]),
            "(\"a\" | b | [0-9])"
        );
        assert_eq!(
            stringify(&seq(["x", "y"]).repeat1()),
            "\"x\" \"y\"+",
        );
    }

    #[test]
    fn it_stringifies_repetitions() {
        let inner = choice!["a", "b"];
        let expected = stringify(&inner);

        assert_eq!(stringify(&repeat(inner.clone(), 2, 5)), format!("{expected}{{2,5}}"));
        assert_eq!(stringify(&repeat(inner.clone(), 3, 3)), format!("{expected}{{3,3}}"));
        assert_eq!(stringify(&optional(inner.clone())), format!("{expected}?"));
        assert_eq!(stringify(&repeat0(inner.clone())), format!("{expected}*"));
        assert_eq!(stringify(&repeat1(inner)), format!("{expected}+"));
    }

    #[test]
    fn it_stringifies_ranges() {
        assert_eq!(stringify(&range('a', 'z')), "[a-z]");
        assert_eq!(stringify(&char_set("+#+".chars())), "[+#+]");
        assert_eq!(
            stringify(&Rule::Range(Range::Class {
                items: vec![
                    CharRange::Range {
                        start: 'a',
                        end: 'z'
                    },
                    CharRange::Single('_'),
                ],
                negated: true,
            })),
            "[^a-z_]"
        );
    }

    #[test]
    fn it_escapes_literals_when_asked_to() {
        let mut buffer = Buffer::new(true);
        seq!["say \"hi\"\n", char_set(['"', ']', '\\'])].compile(&mut buffer);
        assert_eq!(buffer.text, r#""say \"hi\"\n" ["\]\\]"#);
    }

    #[test]
    fn it_compiles_recursive_grammars() {
        let grammar = Grammar::new()
            .rule_with("value", |refs| {
                choice![refs.get("list"), range('0', '9').repeat1()]
            })
            .rule_with("list", |refs| {
                seq![
                    "[",
                    optional(seq![
                        refs.get("value"),
                        repeat0(seq![",", refs.get("value")])
                    ]),
                    "]"
                ]
            });

        let output = grammar.compile(&CompilerOptions::default()).unwrap();
        assert_eq!(
            output,
            "value ::= (list | [0-9]+)\nlist ::= \"[\" value \",\" value*? \"]\""
        );
        grammar.check().unwrap();
    }

    #[test]
    fn it_references_other_productions_by_bare_name() {
        let grammar = Grammar::new()
            .rule_with("r1", |refs| seq!["x", refs.get("r2")])
            .rule("r2", "y");

        let output = grammar.compile(&Default::default()).unwrap();
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines, ["r1 ::= \"x\" r2", "r2 ::= \"y\""]);
    }

    #[test]
    fn it_prefixes_names_and_references() {
        let grammar = Grammar::new()
            .rule_with("root", |refs| seq![refs.get("item"), named("ws")])
            .rule("item", "x");

        let options = CompilerOptions {
            name_prefix: Some("json".to_owned()),
            ..Default::default()
        };

        assert_eq!(
            grammar.compile(&options).unwrap(),
            "json-root ::= json-item ws\njson-item ::= \"x\""
        );
    }

    #[test]
    fn it_inlines_references() {
        let grammar = Grammar::new()
            .rule_with("root", |refs| seq![refs.get("digit"), refs.get("digit")])
            .rule("digit", range('0', '9'));

        let options = CompilerOptions {
            inline: true,
            ..Default::default()
        };

        assert_eq!(
            grammar.compile(&options).unwrap(),
            "root ::= [0-9] [0-9]\ndigit ::= [0-9]"
        );
    }

    #[test]
    fn it_fails_to_inline_cycles() {
        let grammar = Grammar::new().rule_with("a", |refs| optional(seq!["(", refs.get("a"), ")"]));

        let options = CompilerOptions {
            inline: true,
            ..Default::default()
        };

        assert!(matches!(
            grammar.compile(&options),
            Err(Error::Recursive(name)) if name == "a"
        ));
    }

    #[test]
    fn it_checks_for_undefined_references() {
        let mut grammar = Grammar::new().rule_with("root", |refs| refs.get("missing"));

        // compiling doesn't validate references
        assert_eq!(
            grammar.compile(&Default::default()).unwrap(),
            "root ::= missing"
        );
        assert!(matches!(grammar.check(), Err(Error::Undefined(name)) if name == "missing"));

        grammar.insert("missing", Definition::Rule("!".into()));
        grammar.check().unwrap();
    }

    #[test]
    fn it_compiles_empty_grammars() {
        assert_eq!(Grammar::new().compile(&Default::default()).unwrap(), "");
    }
}
