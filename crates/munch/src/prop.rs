//! Proptest strategies and small hand-built automata

use proptest::prelude::*;

use crate::dfa::{Dfa, State, Symbol, Tag, Transition};

pub fn symbol(alphabet: &'static [Symbol]) -> impl Strategy<Value = Symbol> + Clone {
    proptest::sample::select(alphabet)
}

fn assemble(states: u32, alphabet: &[Symbol], edges: &[Option<u32>], tags: &[Option<Tag>]) -> Dfa {
    let mut transitions = Vec::with_capacity(edges.len());
    let mut edges = edges.iter();

    for from in 0..states {
        for &sym in alphabet {
            let to = edges
                .next()
                .copied()
                .flatten()
                .map_or_else(State::null, State::index);
            transitions.push(Transition::new(from, sym, to));
        }
    }

    let accept = tags
        .iter()
        .zip(0..states)
        .filter_map(|(t, s)| t.map(|t| (State::index(s), t)));

    Dfa::from_transitions(transitions, 0, accept)
        .unwrap_or_else(|e| panic!("Generated an invalid automaton: {e}"))
}

fn edges(states: u32, alphabet: &'static [Symbol]) -> impl Strategy<Value = Vec<Option<u32>>> {
    let len = usize::try_from(states).unwrap_or(0) * alphabet.len();
    prop::collection::vec(prop::option::weighted(0.8, 0..states), len)
}

/// A complete automaton over `alphabet` with states `0..states`, initial
/// state 0, and a random subset of accepting states all tagged `tag`
///
/// Missing transitions are listed explicitly as dead.
pub fn dfa(states: u32, alphabet: &'static [Symbol], tag: Tag) -> impl Strategy<Value = Dfa> {
    assert!(states > 0 && tag != 0);
    let n = usize::try_from(states).unwrap_or(0);

    (edges(states, alphabet), prop::collection::vec(any::<bool>(), n)).prop_map(
        move |(edges, accept)| {
            let tags: Vec<_> = accept.into_iter().map(|a| a.then_some(tag)).collect();
            assemble(states, alphabet, &edges, &tags)
        },
    )
}

/// Like [`dfa`], with each accepting state tagged somewhere in `1..=max_tag`
pub fn tagged_dfa(
    states: u32,
    alphabet: &'static [Symbol],
    max_tag: Tag,
) -> impl Strategy<Value = Dfa> {
    assert!(states > 0 && max_tag != 0);
    let n = usize::try_from(states).unwrap_or(0);

    (
        edges(states, alphabet),
        prop::collection::vec(prop::option::of(1..=max_tag), n),
    )
        .prop_map(move |(edges, tags)| assemble(states, alphabet, &edges, &tags))
}

/// Recognizes exactly `word`
#[must_use]
pub fn literal(word: &[Symbol], tag: Tag) -> Dfa {
    let transitions = word
        .iter()
        .zip(0_u32..)
        .map(|(&c, i)| Transition::new(i, c, i + 1));
    let last = u32::try_from(word.len()).unwrap_or_else(|_| unreachable!());

    Dfa::from_transitions(transitions, 0, [(State::index(last), tag)])
        .unwrap_or_else(|e| panic!("Invalid literal automaton: {e}"))
}

/// Recognizes `head tail*`
#[must_use]
pub fn prefix_star(head: Symbol, tail: Symbol, tag: Tag) -> Dfa {
    Dfa::from_transitions(
        [Transition::new(0, head, 1), Transition::new(1, tail, 1)],
        0,
        [(State::index(1), tag)],
    )
    .unwrap_or_else(|e| panic!("Invalid automaton: {e}"))
}

/// Recognizes one or more symbols from `class`
#[must_use]
pub fn plus(class: &[Symbol], tag: Tag) -> Dfa {
    let transitions = class
        .iter()
        .flat_map(|&c| [Transition::new(0, c, 1), Transition::new(1, c, 1)]);

    Dfa::from_transitions(transitions, 0, [(State::index(1), tag)])
        .unwrap_or_else(|e| panic!("Invalid automaton: {e}"))
}
