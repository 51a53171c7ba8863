use std::{collections::VecDeque, hash::Hash};

use hashbrown::HashMap;

use super::{Dfa, State, Transition, TransitionTable};

/// Hands out dense indices to keys in first-seen order
#[derive(Debug)]
pub struct Atomizer<K> {
    next: u32,
    used: HashMap<K, u32>,
}

impl<K> Atomizer<K> {
    #[must_use]
    pub fn new(first: u32) -> Self {
        Self {
            next: first,
            used: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> Atomizer<K> {
    /// Returns the index for `key` and whether it was freshly assigned
    pub fn get(&mut self, key: K) -> (u32, bool) {
        use hashbrown::hash_map::Entry;

        match self.used.entry(key) {
            Entry::Occupied(o) => (*o.get(), false),
            Entry::Vacant(v) => {
                let idx = self.next;
                self.next = idx.checked_add(1).unwrap_or_else(|| unreachable!());
                v.insert(idx);
                (idx, true)
            },
        }
    }

    #[must_use]
    pub fn peek(&self, key: &K) -> Option<u32> { self.used.get(key).copied() }
}

impl Dfa {
    /// Replace every state with a single-index state numbered by its position
    /// in the state set, starting at `offset`
    ///
    /// State order is preserved, so the transition order is too.
    ///
    /// # Panics
    /// Panics if the automaton has more than `u32::MAX - offset` states.
    #[must_use]
    pub fn reindexed(&self, offset: u32) -> Dfa {
        let map = |s: &State| {
            if s.is_null() {
                return State::null();
            }

            let pos = self.states().position(s).unwrap_or_else(|| unreachable!());
            State::index(
                u32::try_from(pos)
                    .ok()
                    .and_then(|p| p.checked_add(offset))
                    .expect("Too many states to re-index"),
            )
        };

        Dfa::assemble(
            TransitionTable::from_ordered(self.table().iter().map(|t| Transition {
                from: map(&t.from),
                symbol: t.symbol,
                to: map(&t.to),
            })),
            map(self.initial()),
            self.accepting_tags().map(|(s, t)| (map(s), t)),
        )
    }

    /// Drop states unreachable from the initial state and number the rest
    /// densely from 0 in breadth-first order
    #[must_use]
    pub fn compacted(&self) -> Dfa {
        let mut atoms = Atomizer::new(0);
        let mut q = VecDeque::new();
        let mut transitions = Vec::new();

        atoms.get(self.initial());
        q.push_back(self.initial());

        while let Some(state) = q.pop_front() {
            let (from, _) = atoms.get(state);

            for t in self.table().row(state) {
                let to = if t.to.is_null() {
                    State::null()
                } else {
                    let (idx, fresh) = atoms.get(&t.to);
                    if fresh {
                        q.push_back(&t.to);
                    }
                    State::index(idx)
                };

                transitions.push(Transition {
                    from: State::index(from),
                    symbol: t.symbol,
                    to,
                });
            }
        }

        let accept: Vec<_> = self
            .accepting_tags()
            .filter_map(|(s, t)| atoms.peek(&s).map(|i| (State::index(i), t)))
            .collect();

        Dfa::assemble(
            TransitionTable::from_ordered(transitions),
            State::index(0),
            accept,
        )
    }
}
