//! Product construction over two automata

use super::{Dfa, State, Transition, TransitionTable};

/// Combine two automata into one recognizing the union of their languages
///
/// Both operands are re-indexed onto disjoint signatures first.  Every pair of
/// states (including pairs where one side has already died) becomes a state
/// of the result, and an accepting pair carries the bitwise OR of both sides'
/// tags.  The result usually contains unreachable pairs; compact it before
/// minimizing.
///
/// Since either side may be dead, at most
/// `|accept(lhs)| * (|states(rhs)| + 1) + (|states(lhs)| + 1) * |accept(rhs)|`
/// pairs accept.
///
/// # Panics
/// Panics if the two automata together have more than `u32::MAX` states.
#[must_use]
#[tracing::instrument(level = "debug", skip_all, fields(
    lhs = lhs.states().len(),
    rhs = rhs.states().len(),
))]
pub fn union(lhs: &Dfa, rhs: &Dfa) -> Dfa {
    let offset = u32::try_from(lhs.states().len()).expect("Too many states in union");
    let a = lhs.reindexed(0);
    let b = rhs.reindexed(offset);

    let alphabet = a.alphabet().union(b.alphabet());
    let a_states: Vec<_> = [State::null()]
        .into_iter()
        .chain(a.states().iter().cloned())
        .collect();
    let b_states: Vec<_> = [State::null()]
        .into_iter()
        .chain(b.states().iter().cloned())
        .collect();

    let pairs = || {
        a_states
            .iter()
            .flat_map(|x| b_states.iter().map(move |y| (x, y)))
            .filter(|(x, y)| !(x.is_null() && y.is_null()))
    };

    let mut transitions = Vec::with_capacity(a_states.len() * b_states.len() * alphabet.len());
    for &sym in &alphabet {
        for (x, y) in pairs() {
            transitions.push(Transition {
                from: State::pair(x, y),
                symbol: sym,
                to: State::pair(&a.trans(x, sym), &b.trans(y, sym)),
            });
        }
    }

    let table = TransitionTable::from_unique(transitions);
    let initial = State::pair(a.initial(), b.initial());

    // Without any symbols, only the initial pair exists
    let accept: Vec<_> = pairs()
        .filter_map(|(x, y)| {
            let tag = a.tag(x).unwrap_or(0) | b.tag(y).unwrap_or(0);
            let pair = State::pair(x, y);
            (tag != 0 && (pair == initial || table.states().has(&pair))).then_some((pair, tag))
        })
        .collect();

    let out = Dfa::assemble(table, initial, accept);

    tracing::debug!(
        states = out.states().len(),
        accepting = out.accepting().len(),
        "Built union product"
    );

    out
}
