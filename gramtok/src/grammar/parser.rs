use nom::{
    branch::alt,
    bytes::complete::{
        escaped_transform,
        is_not,
        tag,
        take,
        take_while1,
    },
    character::complete::{
        char,
        multispace0,
        multispace1,
        none_of,
        one_of,
        u32 as decimal,
    },
    combinator::{
        all_consuming,
        cut,
        map,
        map_opt,
        not,
        opt,
        peek,
        value,
    },
    error::{
        context,
        ErrorKind,
        FromExternalError,
        ParseError,
        VerboseError,
    },
    multi::{
        many0,
        many0_count,
        separated_list1,
    },
    sequence::{
        delimited,
        pair,
        preceded,
        terminated,
        tuple,
    },
    IResult,
    Parser,
};

use super::ast::{
    CharRange,
    Name,
    Range,
    Rule,
};

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Qualifier {
    Optional,
    Many0,
    Many1,
    Repeat { min: u32, max: u32 },
    AtLeast(u32),
}

impl Qualifier {
    fn apply(self, term: Rule) -> Rule {
        match self {
            Qualifier::Optional => term.optional(),
            Qualifier::Many0 | Qualifier::AtLeast(0) => term.repeat0(),
            Qualifier::Many1 | Qualifier::AtLeast(1) => term.repeat1(),
            Qualifier::Repeat { min, max } => term.repeat(min, max),
            // S{m,} --> S{m,m} S*
            Qualifier::AtLeast(min) => {
                Rule::Sequence(vec![term.clone().repeat(min, min), term.repeat0()])
            }
        }
    }
}

/// consumes a single comment
fn consume_comment(input: &str) -> Res<()> {
    value((), pair(char('#'), is_not("\r\n")))(input)
}

/// consumes whitespace and comments
fn consume_wsc(input: &str) -> Res<()> {
    value(
        (),
        terminated(
            many0_count(preceded(multispace0, consume_comment)),
            multispace0,
        ),
    )(input)
}

/// consumes whitespace and comments, but at least one whitespace
fn consume1_wsc(input: &str) -> Res<()> {
    value(
        (),
        terminated(
            many0_count(preceded(multispace0, consume_comment)),
            multispace1,
        ),
    )(input)
}

/// consumes all whitespace and comments before calling the parser `f`
fn wsc<'a, U>(f: impl FnMut(&'a str) -> Res<'a, U>) -> impl FnMut(&'a str) -> Res<'a, U> {
    preceded(consume_wsc, f)
}

pub(super) fn parse_grammar_complete(input: &str) -> Res<Vec<(Name, Rule)>> {
    all_consuming(terminated(parse_grammar, consume_wsc))(input)
}

fn parse_grammar(input: &str) -> Res<Vec<(Name, Rule)>> {
    // productions don't need a separator, since a rule reference is never
    // followed by `::=`.
    context("grammar", many0(parse_production))(input)
}

fn parse_production(input: &str) -> Res<(Name, Rule)> {
    context(
        "production",
        map(
            tuple((parse_id, wsc(tag("::=")), cut(parse_alternatives))),
            |(name, _, rule)| (name, rule),
        ),
    )(input)
}

fn parse_id(input: &str) -> Res<Name> {
    context(
        "id",
        map(
            wsc(take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')),
            Name::from,
        ),
    )(input)
}

fn parse_alternatives(input: &str) -> Res<Rule> {
    context(
        "alternatives",
        map(
            separated_list1(wsc(char('|')), parse_sequence),
            |mut sequences| {
                if sequences.len() == 1 {
                    sequences.remove(0)
                }
                else {
                    Rule::Choice(sequences)
                }
            },
        ),
    )(input)
}

fn parse_sequence(input: &str) -> Res<Rule> {
    context(
        "sequence",
        map(
            separated_list1(consume1_wsc, parse_qualified),
            |mut items| {
                if items.len() == 1 {
                    items.remove(0)
                }
                else {
                    Rule::Sequence(items)
                }
            },
        ),
    )(input)
}

fn parse_qualified(input: &str) -> Res<Rule> {
    context(
        "qualified",
        map(
            tuple((parse_term, opt(parse_qualifier))),
            |(term, qualifier)| {
                match qualifier {
                    Some(qualifier) => qualifier.apply(term),
                    None => term,
                }
            },
        ),
    )(input)
}

fn parse_qualifier(input: &str) -> Res<Qualifier> {
    context(
        "qualifier",
        alt((
            map(wsc(one_of("?*+")), |q| {
                match q {
                    '?' => Qualifier::Optional,
                    '*' => Qualifier::Many0,
                    '+' => Qualifier::Many1,
                    _ => unreachable!(),
                }
            }),
            parse_repetition,
        )),
    )(input)
}

fn parse_repetition(input: &str) -> Res<Qualifier> {
    context(
        "repetition",
        preceded(
            wsc(char('{')),
            cut(map_opt(
                terminated(
                    pair(
                        opt(wsc(decimal)),
                        opt(preceded(wsc(char(',')), opt(wsc(decimal)))),
                    ),
                    wsc(char('}')),
                ),
                |bounds| {
                    match bounds {
                        // {m}
                        (Some(n), None) => Some(Qualifier::Repeat { min: n, max: n }),
                        // {m,n} and {,n}
                        (min, Some(Some(max))) => {
                            let min = min.unwrap_or_default();
                            (min <= max).then_some(Qualifier::Repeat { min, max })
                        }
                        // {m,} and {,}
                        (min, Some(None)) => Some(Qualifier::AtLeast(min.unwrap_or_default())),
                        (None, None) => None,
                    }
                },
            )),
        ),
    )(input)
}

fn parse_term(input: &str) -> Res<Rule> {
    context(
        "term",
        alt((
            map(parse_literal, Rule::from),
            map(parse_char_class, Rule::Range),
            parse_parenthesis,
            map(parse_rule_ref, Rule::Named),
        )),
    )(input)
}

fn parse_rule_ref(input: &str) -> Res<Name> {
    terminated(parse_id, peek(not(wsc(tag("::=")))))(input)
}

fn parse_literal(input: &str) -> Res<String> {
    context(
        "literal",
        wsc(delimited(
            char('\"'),
            map(
                opt(escaped_transform(
                    none_of("\"\r\n\\"),
                    '\\',
                    parse_literal_escape,
                )),
                Option::unwrap_or_default,
            ),
            char('\"'),
        )),
    )(input)
}

fn parse_escaped_unicode(input: &str) -> Res<char> {
    let (input, code_point) = alt((
        preceded(char('x'), take(2usize).and_then(hex_u32)),
        preceded(char('u'), take(4usize).and_then(hex_u32)),
        preceded(char('U'), take(8usize).and_then(hex_u32)),
    ))(input)?;
    let code_point = char::from_u32(code_point).ok_or_else(|| {
        nom::Err::Error(VerboseError::from_error_kind(
            input,
            ErrorKind::EscapedTransform,
        ))
    })?;
    Ok((input, code_point))
}

fn hex_u32(input: &str) -> Res<u32> {
    let x = u32::from_str_radix(input, 16).map_err(|e| {
        nom::Err::Error(VerboseError::from_external_error(
            input,
            ErrorKind::HexDigit,
            e,
        ))
    })?;
    Ok((input, x))
}

fn parse_literal_escape(input: &str) -> Res<char> {
    context(
        "literal escape",
        alt((
            char('\\'),
            char('"'),
            value('\n', char('n')),
            value('\r', char('r')),
            value('\t', char('t')),
            parse_escaped_unicode,
        )),
    )(input)
}

fn parse_char_class_escape(input: &str) -> Res<char> {
    context(
        "char class escape",
        alt((parse_literal_escape, char('-'), char('['), char(']'))),
    )(input)
}

fn parse_char_class(input: &str) -> Res<Range> {
    context(
        "char class",
        wsc(delimited(
            char('['),
            cut(|input| {
                // a caret as first character negates the class, a dash is meant literally.
                let (input, caret) = opt(char('^'))(input)?;
                let (input, dash) = opt(char('-'))(input)?;
                let negated = caret.is_some();
                let (input, mut char_ranges) = many0(parse_char_range)(input)?;

                if dash.is_some() {
                    char_ranges.insert(0, CharRange::Single('-'));
                }

                Ok((input, Range::from_class(char_ranges, negated)))
            }),
            cut(char(']')),
        )),
    )(input)
}

fn parse_char_class_char(input: &str) -> Res<char> {
    let (mut input, c) = none_of("]-\r\n")(input)?;

    let c = match c {
        '\\' => {
            let c;
            (input, c) = parse_char_class_escape(input)?;
            c
        }
        _ => c,
    };

    Ok((input, c))
}

fn parse_char_range(input: &str) -> Res<CharRange> {
    let (input, first) = parse_char_class_char(input)?;
    let (mut input, dash) = opt(char('-'))(input)?;
    let char_range = if dash.is_some() {
        let second;
        (input, second) = parse_char_class_char(input)?;
        CharRange::Range {
            start: first,
            end: second,
        }
    }
    else {
        CharRange::Single(first)
    };

    Ok((input, char_range))
}

fn parse_parenthesis(input: &str) -> Res<Rule> {
    map(
        delimited(wsc(char('(')), cut(parse_alternatives), cut(wsc(char(')')))),
        |rule| {
            match rule {
                // sequences render without parentheses, so a single-alternative choice keeps them.
                Rule::Sequence(_) => Rule::Choice(vec![rule]),
                rule => rule,
            }
        },
    )(input)
}
