//! Rule algebra
//!
//! A [`Rule`] is a closed tree of grammar combinators. Rules are built once,
//! either with the free functions in this module or with the [`seq!`] and
//! [`choice!`] macros, and are then turned into grammar text by the
//! [`compiler`](super::compiler).
//!
//! A [`Grammar`] is an ordered list of named productions. A production is
//! either a plain rule value, or a builder closure that receives the
//! grammar's [`Refs`] and can therefore refer to any other production
//! (including itself) by name.

use std::{
    fmt,
    sync::Arc,
};

use derivative::Derivative;

use super::compiler::Refs;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    Literal(Literal),
    Sequence(Vec<Rule>),
    Choice(Vec<Rule>),
    Repeat {
        inner: Box<Rule>,
        min: u32,
        max: u32,
    },
    Repeat0(Box<Rule>),
    Repeat1(Box<Rule>),
    Optional(Box<Rule>),
    Range(Range),
    Named(Name),
}

impl Rule {
    pub fn optional(self) -> Rule {
        optional(self)
    }

    pub fn repeat(self, min: u32, max: u32) -> Rule {
        repeat(self, min, max)
    }

    pub fn repeat0(self) -> Rule {
        repeat0(self)
    }

    pub fn repeat1(self) -> Rule {
        repeat1(self)
    }

    /// Calls `f` on this rule and every rule nested in it, parents first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Rule)) {
        f(self);
        match self {
            Rule::Sequence(items) | Rule::Choice(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            Rule::Repeat { inner, .. }
            | Rule::Repeat0(inner)
            | Rule::Repeat1(inner)
            | Rule::Optional(inner) => inner.walk(f),
            Rule::Literal(_) | Rule::Range(_) | Rule::Named(_) => {}
        }
    }

    /// Replaces every [`Rule::Named`] for which `f` returns a rule.
    pub fn substitute_named(self, f: &mut impl FnMut(&Name) -> Option<Rule>) -> Rule {
        match self {
            Rule::Sequence(items) => Rule::Sequence(substitute_all(items, f)),
            Rule::Choice(items) => Rule::Choice(substitute_all(items, f)),
            Rule::Repeat { inner, min, max } => {
                Rule::Repeat {
                    inner: Box::new(inner.substitute_named(f)),
                    min,
                    max,
                }
            }
            Rule::Repeat0(inner) => Rule::Repeat0(Box::new(inner.substitute_named(f))),
            Rule::Repeat1(inner) => Rule::Repeat1(Box::new(inner.substitute_named(f))),
            Rule::Optional(inner) => Rule::Optional(Box::new(inner.substitute_named(f))),
            Rule::Named(name) => f(&name).unwrap_or(Rule::Named(name)),
            rule @ (Rule::Literal(_) | Rule::Range(_)) => rule,
        }
    }
}

fn substitute_all(items: Vec<Rule>, f: &mut impl FnMut(&Name) -> Option<Rule>) -> Vec<Rule> {
    items
        .into_iter()
        .map(|item| item.substitute_named(f))
        .collect()
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::compiler::stringify(self))
    }
}

impl From<Literal> for Rule {
    fn from(value: Literal) -> Self {
        Rule::Literal(value)
    }
}

impl From<String> for Rule {
    fn from(value: String) -> Self {
        Rule::Literal(value.into())
    }
}

impl<'a> From<&'a str> for Rule {
    fn from(value: &'a str) -> Self {
        Rule::Literal(value.into())
    }
}

impl From<char> for Rule {
    fn from(value: char) -> Self {
        Rule::Literal(value.to_string().into())
    }
}

impl From<Range> for Rule {
    fn from(value: Range) -> Self {
        Rule::Range(value)
    }
}

impl From<Name> for Rule {
    fn from(value: Name) -> Self {
        Rule::Named(value)
    }
}

/// Name of a production.
#[derive(
    Clone,
    Debug,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    derive_more::Display,
    derive_more::From,
    derive_more::AsRef,
)]
pub struct Name(pub(super) String);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for Name {
    fn from(value: &'a str) -> Self {
        Name(value.to_owned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal(pub String);

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal(value)
    }
}

impl<'a> From<&'a str> for Literal {
    fn from(value: &'a str) -> Self {
        value.to_owned().into()
    }
}

/// Matches a single character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Range {
    /// All characters from `min` to `max`, inclusive.
    Between { min: char, max: char },

    /// Any one of the listed characters. Rendered in the given order.
    Set(Vec<char>),

    /// A general character class, as found in hand-written grammar files.
    Class {
        items: Vec<CharRange>,
        negated: bool,
    },
}

impl Range {
    /// Picks the simplest representation for a parsed character class.
    pub fn from_class(items: Vec<CharRange>, negated: bool) -> Self {
        match items.as_slice() {
            [CharRange::Range { start, end }] if !negated => {
                Range::Between {
                    min: *start,
                    max: *end,
                }
            }
            _ if !negated && items.iter().all(|item| matches!(item, CharRange::Single(_))) => {
                Range::Set(
                    items
                        .into_iter()
                        .filter_map(|item| {
                            match item {
                                CharRange::Single(c) => Some(c),
                                CharRange::Range { .. } => None,
                            }
                        })
                        .collect(),
                )
            }
            _ => Range::Class { items, negated },
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CharRange {
    Single(char),
    Range { start: char, end: char },
}

/// Definition of a production.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub enum Definition {
    Rule(Rule),
    Builder(#[derivative(Debug = "ignore")] Arc<dyn Fn(&Refs) -> Rule + Send + Sync>),
}

impl Definition {
    pub fn builder(f: impl Fn(&Refs) -> Rule + Send + Sync + 'static) -> Self {
        Definition::Builder(Arc::new(f))
    }

    pub(super) fn build(&self, refs: &Refs) -> Rule {
        match self {
            Definition::Rule(rule) => rule.clone(),
            Definition::Builder(f) => f(refs),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Production {
    pub name: Name,
    pub definition: Definition,
}

/// Ordered set of named productions.
///
/// # Example
///
/// ```
/// # use gramtok::grammar::{ast::{Grammar, range}, compiler::CompilerOptions};
/// # use gramtok::seq;
/// let grammar = Grammar::new()
///     .rule_with("root", |refs| seq!["(", refs.get("digits"), ")"])
///     .rule("digits", range('0', '9').repeat1());
///
/// assert_eq!(
///     grammar.compile(&CompilerOptions::default()).unwrap(),
///     "root ::= \"(\" digits \")\"\ndigits ::= [0-9]+",
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct Grammar {
    productions: Vec<Production>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a production. Redefining a name replaces the definition but
    /// keeps the original position.
    pub fn insert(&mut self, name: impl Into<Name>, definition: Definition) {
        let name = name.into();

        if let Some(production) = self
            .productions
            .iter_mut()
            .find(|production| production.name == name)
        {
            tracing::debug!(%name, "redefining production");
            production.definition = definition;
        }
        else {
            self.productions.push(Production { name, definition });
        }
    }

    pub fn rule(mut self, name: impl Into<Name>, rule: impl Into<Rule>) -> Self {
        self.insert(name, Definition::Rule(rule.into()));
        self
    }

    pub fn rule_with(
        mut self,
        name: impl Into<Name>,
        f: impl Fn(&Refs) -> Rule + Send + Sync + 'static,
    ) -> Self {
        self.insert(name, Definition::builder(f));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.productions
            .iter()
            .find(|production| production.name.as_str() == name)
            .map(|production| &production.definition)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }
}

pub fn literal(text: impl Into<String>) -> Rule {
    Rule::Literal(Literal(text.into()))
}

pub fn seq<R: Into<Rule>>(items: impl IntoIterator<Item = R>) -> Rule {
    Rule::Sequence(items.into_iter().map(Into::into).collect())
}

pub fn choice<R: Into<Rule>>(items: impl IntoIterator<Item = R>) -> Rule {
    Rule::Choice(items.into_iter().map(Into::into).collect())
}

/// Repeats `inner` between `min` and `max` times.
///
/// # Panics
///
/// Panics if `min > max`.
pub fn repeat(inner: impl Into<Rule>, min: u32, max: u32) -> Rule {
    assert!(min <= max, "invalid repetition bounds: {{{min},{max}}}");
    Rule::Repeat {
        inner: Box::new(inner.into()),
        min,
        max,
    }
}

pub fn repeat0(inner: impl Into<Rule>) -> Rule {
    Rule::Repeat0(Box::new(inner.into()))
}

pub fn repeat1(inner: impl Into<Rule>) -> Rule {
    Rule::Repeat1(Box::new(inner.into()))
}

pub fn optional(inner: impl Into<Rule>) -> Rule {
    Rule::Optional(Box::new(inner.into()))
}

pub fn range(min: char, max: char) -> Rule {
    Rule::Range(Range::Between { min, max })
}

pub fn char_set(chars: impl IntoIterator<Item = char>) -> Rule {
    Rule::Range(Range::Set(chars.into_iter().collect()))
}

/// A reference to a production by its literal name.
///
/// Unlike the references handed out by [`Refs`], this name is used verbatim,
/// so it can point into another grammar that gets concatenated with this one.
pub fn named(name: impl Into<Name>) -> Rule {
    Rule::Named(name.into())
}

/// Builds a [`Rule::Sequence`] from items of mixed types.
///
/// ```
/// # use gramtok::{seq, grammar::ast::range};
/// assert_eq!(seq!["x", range('0', '9'), 'y'].to_string(), "\"x\" [0-9] \"y\"");
/// ```
#[macro_export]
macro_rules! seq {
    ($($item:expr),* $(,)?) => {
        $crate::grammar::ast::Rule::Sequence(vec![$($crate::grammar::ast::Rule::from($item)),*])
    };
}

/// Builds a [`Rule::Choice`] from items of mixed types.
#[macro_export]
macro_rules! choice {
    ($($item:expr),* $(,)?) => {
        $crate::grammar::ast::Rule::Choice(vec![$($crate::grammar::ast::Rule::from($item)),*])
    };
}
