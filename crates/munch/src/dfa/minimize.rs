use std::collections::BTreeMap;

use hashbrown::HashMap;

use super::{Dfa, State, Symbol, Tag, Transition, TransitionTable};
use crate::ordered_set::OrderedSet;

pub type Block = OrderedSet<State>;

/// Disjoint blocks of states covering every state of an automaton, plus the
/// null state
///
/// Blocks are kept sorted by their first element so that two divisions with
/// the same blocks compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division(Vec<Block>);

impl Division {
    fn canonical(mut blocks: Vec<Block>) -> Self {
        blocks.retain(|b| !b.is_empty());
        blocks.sort_by(|l, r| l.first().cmp(&r.first()));
        Self(blocks)
    }

    #[must_use]
    #[inline]
    pub fn blocks(&self) -> &[Block] { &self.0 }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize { self.0.len() }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// The first block containing `state`
    #[must_use]
    pub fn block_of(&self, state: &State) -> Option<&Block> {
        self.0.iter().find(|b| b.has(state))
    }

    fn index(&self) -> HashMap<&State, usize> {
        self.0
            .iter()
            .enumerate()
            .flat_map(|(i, b)| b.iter().map(move |s| (s, i)))
            .collect()
    }
}

/// A minimized automaton along with the partition it was built from
#[derive(Debug, Clone)]
pub struct Minimized {
    pub dfa: Dfa,
    pub division: Division,
    pub rounds: usize,
}

/// Merge behaviorally equivalent states
#[must_use]
#[inline]
pub fn minimize(dfa: &Dfa) -> Dfa { minimize_traced(dfa).dfa }

/// Merge behaviorally equivalent states by partition refinement, keeping the
/// final division around
///
/// The null state takes part as an ordinary non-accepting state that loops to
/// itself, so dead ends and explicit sink states fall into its block and are
/// replaced by dead transitions.
#[tracing::instrument(level = "debug", skip_all, fields(states = dfa.states().len()))]
pub fn minimize_traced(dfa: &Dfa) -> Minimized {
    let alphabet: Vec<Symbol> = dfa.alphabet().iter().copied().collect();

    let mut by_tag: BTreeMap<Tag, Block> = BTreeMap::new();
    for (state, tag) in dfa.accepting_tags() {
        by_tag.entry(tag).or_default().insert(state.clone());
    }

    let mut division = Division::canonical(
        [dfa.normal_states().inserted(State::null())]
            .into_iter()
            .chain(by_tag.into_values())
            .collect(),
    );
    let mut rounds = 0;

    loop {
        rounds += 1;
        let next = refine(dfa, &alphabet, &division);
        tracing::trace!(rounds, blocks = next.len(), "Refined division");

        if next == division {
            break;
        }

        division = next;
    }

    let out = rebuild(dfa, &alphabet, &division);
    tracing::debug!(rounds, states = out.states().len(), "Minimized automaton");

    Minimized {
        dfa: out,
        division,
        rounds,
    }
}

fn refine(dfa: &Dfa, alphabet: &[Symbol], division: &Division) -> Division {
    let index = division.index();
    let mut blocks = Vec::with_capacity(division.len());

    for block in division.blocks() {
        let mut sigs: Vec<(Vec<usize>, &State)> = block
            .iter()
            .map(|s| {
                let sig = alphabet
                    .iter()
                    .map(|&c| index[&*dfa.trans(s, c)])
                    .collect();
                (sig, s)
            })
            .collect();

        // Stable, so each run stays in state order
        sigs.sort_by(|(l, _), (r, _)| l.cmp(r));

        let mut run: Option<(&[usize], Block)> = None;
        for (sig, state) in &sigs {
            match run {
                Some((prev, ref mut b)) if prev == &sig[..] => b.concat([(*state).clone()]),
                _ => {
                    blocks.extend(run.take().map(|(_, b)| b));
                    run = Some((&sig[..], Block::singleton((*state).clone())));
                },
            }
        }
        blocks.extend(run.map(|(_, b)| b));
    }

    Division::canonical(blocks)
}

fn rebuild(dfa: &Dfa, alphabet: &[Symbol], division: &Division) -> Dfa {
    let index = division.index();
    // The null state sorts first, so its block is represented by it
    let rep = |s: &State| -> State {
        division.blocks()[index[s]]
            .first()
            .unwrap_or_else(|| unreachable!())
            .clone()
    };

    let reps = division
        .blocks()
        .iter()
        .filter_map(|b| b.first())
        .filter(|s| !s.is_null());

    // Representatives are ascending, so the rows come out in key order
    let table = TransitionTable::from_ordered(reps.flat_map(|r| {
        alphabet.iter().map(move |&c| Transition {
            from: r.clone(),
            symbol: c,
            to: rep(&dfa.trans(r, c)),
        })
    }));

    let mut initial = rep(dfa.initial());
    if initial.is_null() {
        // Empty language; keep a lone initial state with no way out
        initial = dfa.initial().clone();
    }

    let accept = division.blocks().iter().filter_map(|b| {
        let first = b.first()?;
        dfa.tag(first).map(|t| (first.clone(), t))
    });

    Dfa::assemble(table, initial, accept)
}
