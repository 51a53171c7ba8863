use std::{borrow::Cow, cmp::Ordering, fmt, sync::Arc};

use crate::{
    dot,
    ordered_set::{Comparator, Natural, OrderedSet},
};

pub mod atomize;
pub mod minimize;
pub mod union;

pub use minimize::{Division, Minimized, minimize, minimize_traced};
pub use union::union;

/// An input symbol.  The alphabet is the 256 byte values.
pub type Symbol = u8;

/// Accept tag of an accepting state.  Always non-zero.
pub type Tag = u64;

/// A state identified by an ascending integer signature
///
/// Equality and ordering are structural (lexicographic) over the signature.
/// The empty signature is the null state, which stands for "no transition" and
/// sorts before every other state.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct State(Arc<[u32]>);

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("∅");
        }

        f.write_str("{")?;
        for (i, n) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(",")?;
            }
            write!(f, "{n}")?;
        }
        f.write_str("}")
    }
}

impl State {
    /// Build a state from its signature, sorting and deduplicating it
    #[must_use]
    pub fn new(signature: impl IntoIterator<Item = u32>) -> Self {
        let mut sig: Vec<_> = signature.into_iter().collect();
        sig.sort_unstable();
        sig.dedup();
        Self(sig.into())
    }

    #[must_use]
    #[inline]
    pub fn null() -> Self { Self(Arc::new([])) }

    #[must_use]
    #[inline]
    pub fn index(idx: u32) -> Self { Self(Arc::new([idx])) }

    /// Concatenate two signatures.  Pairing with the null state yields the
    /// other state unchanged.
    #[must_use]
    pub fn pair(lhs: &Self, rhs: &Self) -> Self {
        match (lhs.is_null(), rhs.is_null()) {
            (_, true) => lhs.clone(),
            (true, false) => rhs.clone(),
            (false, false) => Self::new(lhs.0.iter().chain(rhs.0.iter()).copied()),
        }
    }

    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool { self.0.is_empty() }

    #[must_use]
    #[inline]
    pub fn signature(&self) -> &[u32] { &self.0 }
}

impl From<u32> for State {
    #[inline]
    fn from(idx: u32) -> Self { Self::index(idx) }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    pub from: State,
    pub symbol: Symbol,
    pub to: State,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { from, symbol, to } = self;
        write!(f, "{from:?} -{}-> {to:?}", fmt_symbol(*symbol))
    }
}

impl Transition {
    #[must_use]
    #[inline]
    pub fn new(from: impl Into<State>, symbol: Symbol, to: impl Into<State>) -> Self {
        Self {
            from: from.into(),
            symbol,
            to: to.into(),
        }
    }

    #[inline]
    fn key(&self) -> (&State, Symbol) { (&self.from, self.symbol) }
}

/// Orders transitions by `(from, symbol)`, ignoring the destination
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByKey;

impl Comparator<Transition> for ByKey {
    #[inline]
    fn compare(&self, lhs: &Transition, rhs: &Transition) -> Ordering { lhs.key().cmp(&rhs.key()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    #[error(
        "Conflicting transitions from {from:?} on {}: {first:?} and {second:?}",
        fmt_symbol(*symbol)
    )]
    Conflict {
        from: State,
        symbol: Symbol,
        first: State,
        second: State,
    },
    #[error("State {0:?} is not referenced by any transition")]
    UndeclaredState(State),
    #[error("The null state cannot be used as {0}")]
    NullState(&'static str),
    #[error("Accepting state {0:?} has a zero tag")]
    ZeroTag(State),
}

/// Transitions ordered by `(from, symbol)`, along with the states and symbols
/// they reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    transitions: OrderedSet<Transition, ByKey>,
    states: OrderedSet<State>,
    charset: OrderedSet<Symbol>,
}

impl Default for TransitionTable {
    fn default() -> Self { Self::from_set(OrderedSet::new()) }
}

impl TransitionTable {
    fn from_set(transitions: OrderedSet<Transition, ByKey>) -> Self {
        // A state whose only transitions are dead still counts
        let mut states: Vec<State> = transitions
            .iter()
            .flat_map(|t| [&t.from, &t.to])
            .filter(|s| !s.is_null())
            .cloned()
            .collect();
        states.sort_unstable();
        states.dedup();

        let mut charset: Vec<Symbol> = transitions.iter().map(|t| t.symbol).collect();
        charset.sort_unstable();
        charset.dedup();

        Self {
            transitions,
            states: OrderedSet::from_sorted(states, Natural).unwrap_or_else(|| unreachable!()),
            charset: OrderedSet::from_sorted(charset, Natural).unwrap_or_else(|| unreachable!()),
        }
    }

    /// Build a table from a flat list of transitions
    ///
    /// # Errors
    /// Returns an error if two transitions share a source and symbol but lead
    /// to different states, or if a transition leaves the null state.
    pub fn from_transitions<I: IntoIterator<Item = Transition>>(
        it: I,
    ) -> Result<Self, ConstructionError> {
        let mut set = OrderedSet::<Transition, ByKey>::new();

        for t in it {
            if t.from.is_null() {
                return Err(ConstructionError::NullState("a transition source"));
            }

            if let Some(prev) = set.find(&t) {
                if prev.to != t.to {
                    return Err(ConstructionError::Conflict {
                        from: t.from,
                        symbol: t.symbol,
                        first: prev.to.clone(),
                        second: t.to,
                    });
                }
                continue;
            }

            set.insert(t);
        }

        Ok(Self::from_set(set))
    }

    /// Build a table from transitions known to have distinct keys
    pub(crate) fn from_unique<I: IntoIterator<Item = Transition>>(it: I) -> Self {
        let mut v: Vec<_> = it.into_iter().collect();
        v.sort_unstable_by(|l, r| l.key().cmp(&r.key()));
        debug_assert!(v.windows(2).all(|w| w[0].key() != w[1].key()), "Duplicate transition key");
        Self::from_ordered(v)
    }

    /// Build a table from transitions already ordered by `(from, symbol)`
    pub(crate) fn from_ordered<I: IntoIterator<Item = Transition>>(it: I) -> Self {
        Self::from_set(OrderedSet::<Transition, ByKey>::new().concatenated(it))
    }

    fn lower_bound(&self, from: &State, symbol: Symbol) -> usize {
        self.transitions.partition_point(|t| t.key() < (from, symbol))
    }

    /// Look up the destination of a listed transition.  Explicit dead
    /// transitions yield the null state.
    #[must_use]
    pub fn get(&self, from: &State, symbol: Symbol) -> Option<&State> {
        let at = self.lower_bound(from, symbol);
        self.transitions
            .as_slice()
            .get(at)
            .filter(|t| t.key() == (from, symbol))
            .map(|t| &t.to)
    }

    /// All transitions leaving `from`, ordered by symbol
    #[must_use]
    pub fn row(&self, from: &State) -> &[Transition] {
        let start = self.lower_bound(from, Symbol::MIN);
        let end = self.transitions.partition_point(|t| &t.from <= from);
        &self.transitions.as_slice()[start..end.max(start)]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Transition> { self.transitions.iter() }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize { self.transitions.len() }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool { self.transitions.is_empty() }

    #[must_use]
    #[inline]
    pub fn states(&self) -> &OrderedSet<State> { &self.states }

    #[must_use]
    #[inline]
    pub fn charset(&self) -> &OrderedSet<Symbol> { &self.charset }
}

impl<'a> IntoIterator for &'a TransitionTable {
    type IntoIter = std::slice::Iter<'a, Transition>;
    type Item = &'a Transition;

    #[inline]
    fn into_iter(self) -> Self::IntoIter { self.iter() }
}

/// A deterministic finite automaton with tagged accepting states
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa {
    table: TransitionTable,
    initial: State,
    accept: OrderedSet<State>,
    // parallel to `accept`
    tags: Vec<Tag>,
    states: OrderedSet<State>,
}

impl Dfa {
    /// Validate and assemble an automaton.  Accepting states listed more than
    /// once have their tags combined with bitwise OR.
    ///
    /// # Errors
    /// Returns an error if the initial or an accepting state is the null
    /// state, if an accepting state (or the initial state of a non-empty
    /// table) appears in no transition, or if an accept tag is zero.
    pub fn new<A: IntoIterator<Item = (State, Tag)>>(
        table: TransitionTable,
        initial: State,
        accept: A,
    ) -> Result<Self, ConstructionError> {
        if initial.is_null() {
            return Err(ConstructionError::NullState("the initial state"));
        }

        if !table.is_empty() && !table.states().has(&initial) {
            return Err(ConstructionError::UndeclaredState(initial));
        }

        let mut tagged: Vec<(State, Tag)> = Vec::new();
        for (state, tag) in accept {
            if state.is_null() {
                return Err(ConstructionError::NullState("an accepting state"));
            }

            if tag == 0 {
                return Err(ConstructionError::ZeroTag(state));
            }

            if state != initial && !table.states().has(&state) {
                return Err(ConstructionError::UndeclaredState(state));
            }

            tagged.push((state, tag));
        }

        Ok(Self::assemble(table, initial, tagged))
    }

    /// Convenience for [`Dfa::new`] over a flat transition list
    ///
    /// # Errors
    /// See [`TransitionTable::from_transitions`] and [`Dfa::new`].
    pub fn from_transitions<
        T: IntoIterator<Item = Transition>,
        A: IntoIterator<Item = (State, Tag)>,
    >(
        transitions: T,
        initial: impl Into<State>,
        accept: A,
    ) -> Result<Self, ConstructionError> {
        Self::new(
            TransitionTable::from_transitions(transitions)?,
            initial.into(),
            accept,
        )
    }

    /// Assemble an automaton whose parts are valid by construction
    pub(crate) fn assemble(
        table: TransitionTable,
        initial: State,
        tagged: impl IntoIterator<Item = (State, Tag)>,
    ) -> Self {
        let mut tagged: Vec<_> = tagged.into_iter().collect();
        tagged.sort_by(|(l, _), (r, _)| l.cmp(r));

        let mut accept = OrderedSet::<State>::new();
        let mut tags: Vec<Tag> = Vec::with_capacity(tagged.len());
        for (state, tag) in tagged {
            debug_assert!(!state.is_null() && tag != 0);
            if accept.last() == Some(&state) {
                *tags.last_mut().unwrap_or_else(|| unreachable!()) |= tag;
            } else {
                accept.concat([state]);
                tags.push(tag);
            }
        }

        let states = table.states().clone().inserted(initial.clone());
        debug_assert!(accept.iter().all(|s| states.has(s)));

        Self {
            table,
            initial,
            accept,
            tags,
            states,
        }
    }

    #[must_use]
    #[inline]
    pub fn table(&self) -> &TransitionTable { &self.table }

    #[must_use]
    #[inline]
    pub fn initial(&self) -> &State { &self.initial }

    #[must_use]
    #[inline]
    pub fn states(&self) -> &OrderedSet<State> { &self.states }

    #[must_use]
    #[inline]
    pub fn alphabet(&self) -> &OrderedSet<Symbol> { self.table.charset() }

    #[must_use]
    #[inline]
    pub fn accepting(&self) -> &OrderedSet<State> { &self.accept }

    /// States that are not accepting
    #[must_use]
    pub fn normal_states(&self) -> OrderedSet<State> { self.states.diff(&self.accept) }

    /// Accepting states paired with their tags, in state order
    pub fn accepting_tags(&self) -> impl Iterator<Item = (&State, Tag)> {
        self.accept.iter().zip(self.tags.iter().copied())
    }

    #[must_use]
    pub fn tag(&self, state: &State) -> Option<Tag> {
        self.accept.position(state).map(|i| self.tags[i])
    }

    #[must_use]
    #[inline]
    pub fn is_accepting(&self, state: &State) -> bool { self.accept.has(state) }

    /// Destination of a transition, or the null state if there is none
    #[must_use]
    pub fn trans<'a>(&'a self, from: &State, symbol: Symbol) -> Cow<'a, State> {
        self.table
            .get(from, symbol)
            .map_or_else(|| Cow::Owned(State::null()), Cow::Borrowed)
    }

    /// Run the automaton over an entire input, returning the tag of the state
    /// it stops in if that state is accepting
    #[must_use]
    pub fn run(&self, input: &[Symbol]) -> Option<Tag> {
        let mut state = &self.initial;

        for &sym in input {
            state = self.table.get(state, sym).filter(|s| !s.is_null())?;
        }

        self.tag(state)
    }

    /// Replace every accept tag
    ///
    /// # Panics
    /// Panics if `f` maps a tag to zero.
    #[must_use]
    pub fn retag(mut self, mut f: impl FnMut(&State, Tag) -> Tag) -> Self {
        for (state, tag) in self.accept.iter().zip(self.tags.iter_mut()) {
            *tag = f(state, *tag);
            assert!(*tag != 0, "Accept tags must be non-zero");
        }
        self
    }

    /// Render the automaton as a Graphviz graph
    #[must_use]
    pub fn dot(&self) -> dot::Graph<'static> {
        let ids: hashbrown::HashMap<_, _> = self
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), u32::try_from(i).unwrap_or(u32::MAX)))
            .collect();

        dot::Graph::state_machine(
            self.states.iter().map(|s| {
                (
                    s,
                    self.table
                        .row(s)
                        .iter()
                        .filter(|t| !t.to.is_null())
                        .map(|t| (t.symbol, &t.to)),
                    self.tag(s),
                )
            }),
            &&self.initial,
            |s| ids[*s],
            |i| fmt_symbol(i).into(),
            |s| format!("{s:?}").into(),
            |t| Some(format!("{t:#x}").into()),
        )
    }
}

pub(crate) fn fmt_symbol(sym: Symbol) -> String {
    format!("{:?}", char::from(sym))
}
