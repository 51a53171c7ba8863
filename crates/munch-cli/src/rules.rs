use munch::{BuildError, CompiledTable, Label, Rule, State, Transition};

use crate::prelude::*;

/// Token kinds of the built-in demo grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Kind {
    Keyword = 1,
    Ident,
    Integer,
    Whitespace,
    Punct,
}

impl Kind {
    const ALL: [Self; 5] = [
        Self::Keyword,
        Self::Ident,
        Self::Integer,
        Self::Whitespace,
        Self::Punct,
    ];

    #[inline]
    pub fn label(self) -> Label { self as Label }

    pub fn from_label(label: Label) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyword => "keyword",
            Self::Ident => "ident",
            Self::Integer => "integer",
            Self::Whitespace => "space",
            Self::Punct => "punct",
        })
    }
}

const KEYWORDS: &[&[u8]] = &[b"fn", b"if", b"else", b"let", b"return", b"while"];
const PUNCT: &[u8] = b"(){}[];:,.+-*/%=<>!&|^~?";

fn ident_start() -> impl Iterator<Item = u8> + Clone {
    (b'a'..=b'z').chain(b'A'..=b'Z').chain([b'_'])
}

fn digits() -> impl Iterator<Item = u8> + Clone { b'0'..=b'9' }

/// Accepts one or more of `class`
fn plus(label: Kind, class: impl Iterator<Item = u8> + Clone) -> Result<Rule, BuildError> {
    Rule::from_transitions(
        label.label(),
        class
            .clone()
            .map(|c| Transition::new(0, c, 1))
            .chain(class.map(|c| Transition::new(1, c, 1))),
        0,
        [State::index(1)],
    )
}

/// Accepts any of `words`, sharing common prefixes
fn words(label: Kind, words: &[&[u8]]) -> Result<Rule, BuildError> {
    let mut transitions: Vec<Transition> = Vec::new();
    let mut accept = Vec::new();
    let mut next = 1;

    for word in words {
        let mut state = 0;
        for &c in *word {
            let from = State::index(state);
            let known = transitions
                .iter()
                .find(|t| t.from == from && t.symbol == c)
                .map(|t| t.to.signature()[0]);

            state = match known {
                Some(to) => to,
                None => {
                    transitions.push(Transition::new(state, c, next));
                    next += 1;
                    next - 1
                },
            };
        }
        accept.push(State::index(state));
    }

    Rule::from_transitions(label.label(), transitions, 0, accept)
}

/// Rules of the demo grammar, keywords first so they win over identifiers
pub fn demo_rules() -> Result<Vec<Rule>, BuildError> {
    Ok(vec![
        words(Kind::Keyword, KEYWORDS)?,
        Rule::from_transitions(
            Kind::Ident.label(),
            ident_start()
                .map(|c| Transition::new(0, c, 1))
                .chain(ident_start().chain(digits()).map(|c| Transition::new(1, c, 1))),
            0,
            [State::index(1)],
        )?,
        plus(Kind::Integer, digits())?,
        plus(Kind::Whitespace, [b' ', b'\t', b'\r', b'\n'].into_iter())?,
        Rule::from_transitions(
            Kind::Punct.label(),
            PUNCT.iter().map(|&c| Transition::new(0, c, 1)),
            0,
            [State::index(1)],
        )?,
    ])
}

pub fn demo() -> Result<CompiledTable> {
    let rules = demo_rules().context("Error defining demo rules")?;
    let table = munch::build(&rules).context("Error building demo lexer")?;
    debug!(
        states = table.state_count(),
        classes = table.class_count(),
        "Demo lexer ready"
    );
    Ok(table)
}
