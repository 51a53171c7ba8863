//! Dense runtime form of a minimized automaton

use hashbrown::HashMap;

use crate::{
    dfa::{Dfa, State, Symbol, Tag, fmt_symbol},
    dot,
};

/// Token kind reported for a lexeme.  Zero is reserved for "not accepting".
pub type Label = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Accept tag {0:#x} does not resolve to a non-zero label")]
    UnresolvedTag(Tag),
    #[error("Automaton has too many states to compile ({0})")]
    TooManyStates(usize),
}

/// A transition table indexed by dense state and symbol-class numbers
///
/// State 0 is the dead state and class 0 stands for every symbol the automaton
/// never reads, so row 0 and column 0 are all zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTable {
    // (states + 1) rows of `cols` entries
    table: Box<[u32]>,
    accept: Box<[Label]>,
    encoder: [u16; 256],
    // class - 1 -> symbol
    symbols: Box<[Symbol]>,
    cols: usize,
    initial: u32,
}

/// Compile `dfa`, mapping each accept tag to a label with `resolve`
///
/// States are numbered from 1 in state order and symbols are numbered from 1
/// in byte order.
///
/// # Errors
/// Returns an error if `resolve` yields no label (or a zero label) for some
/// accept tag, or if the automaton has more states than fit in a `u32`.
#[tracing::instrument(level = "debug", skip_all, fields(states = dfa.states().len()))]
pub fn compile(
    dfa: &Dfa,
    resolve: impl Fn(Tag) -> Option<Label>,
) -> Result<CompiledTable, CompileError> {
    let n_states = dfa.states().len();
    let rows = n_states
        .checked_add(1)
        .filter(|&r| u32::try_from(r).is_ok())
        .ok_or(CompileError::TooManyStates(n_states))?;

    let ids: HashMap<&State, u32> = dfa.states().iter().zip(1..).collect();
    let id = |s: &State| if s.is_null() { 0 } else { ids[s] };

    let symbols: Box<[Symbol]> = dfa.alphabet().iter().copied().collect();
    let mut encoder = [0_u16; 256];
    for (&sym, class) in symbols.iter().zip(1..) {
        encoder[usize::from(sym)] = class;
    }
    let cols = symbols.len() + 1;

    let mut table = vec![0; rows * cols].into_boxed_slice();
    for t in dfa.table() {
        let at = usize::try_from(id(&t.from)).unwrap_or_else(|_| unreachable!()) * cols
            + usize::from(encoder[usize::from(t.symbol)]);
        table[at] = id(&t.to);
    }

    let mut accept = vec![0; rows].into_boxed_slice();
    for (state, tag) in dfa.accepting_tags() {
        let label = resolve(tag)
            .filter(|&l| l != 0)
            .ok_or(CompileError::UnresolvedTag(tag))?;
        accept[usize::try_from(id(state)).unwrap_or_else(|_| unreachable!())] = label;
    }

    let out = CompiledTable {
        table,
        accept,
        encoder,
        symbols,
        cols,
        initial: id(dfa.initial()),
    };

    tracing::debug!(
        states = out.state_count(),
        classes = out.class_count(),
        "Compiled transition table"
    );

    Ok(out)
}

impl CompiledTable {
    /// Compile `dfa`, using each accept tag directly as its label
    ///
    /// # Errors
    /// See [`compile`].  Tags wider than a [`Label`] are unresolved.
    #[inline]
    pub fn from_dfa(dfa: &Dfa) -> Result<Self, CompileError> {
        compile(dfa, |t| Label::try_from(t).ok())
    }

    /// The symbol class of `symbol`, or 0 if the automaton never reads it
    #[must_use]
    #[inline]
    pub fn encode(&self, symbol: Symbol) -> u16 { self.encoder[usize::from(symbol)] }

    /// Destination of `state` on `symbol`, 0 meaning dead.  Out-of-range
    /// states behave like the dead state.
    #[must_use]
    #[inline]
    pub fn trans(&self, state: u32, symbol: Symbol) -> u32 {
        self.trans_class(state, usize::from(self.encode(symbol)))
    }

    fn trans_class(&self, state: u32, class: usize) -> u32 {
        usize::try_from(state)
            .ok()
            .and_then(|s| self.table.get(s * self.cols + class))
            .copied()
            .unwrap_or(0)
    }

    /// Label of `state`, 0 if it is not accepting
    #[must_use]
    pub fn label(&self, state: u32) -> Label {
        usize::try_from(state)
            .ok()
            .and_then(|s| self.accept.get(s))
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    #[inline]
    pub fn initial(&self) -> u32 { self.initial }

    /// Number of live states, not counting the dead state
    #[must_use]
    #[inline]
    pub fn state_count(&self) -> usize { self.accept.len() - 1 }

    /// Number of symbol classes, not counting class 0
    #[must_use]
    #[inline]
    pub fn class_count(&self) -> usize { self.cols - 1 }

    /// Run the table over an entire input, returning the label of the state
    /// it stops in if that state is accepting
    #[must_use]
    pub fn run(&self, input: &[Symbol]) -> Option<Label> {
        let mut state = self.initial;
        for &sym in input {
            state = self.trans(state, sym);
            if state == 0 {
                return None;
            }
        }

        Some(self.label(state)).filter(|&l| l != 0)
    }

    /// Render the table as a Graphviz graph
    #[must_use]
    pub fn dot(&self) -> dot::Graph<'static> {
        let live = u32::try_from(self.state_count()).unwrap_or_else(|_| unreachable!());

        dot::Graph::state_machine(
            (1..=live).map(|s| {
                let edges = self
                    .symbols
                    .iter()
                    .zip(1..)
                    .filter_map(move |(&sym, class)| {
                        let to = self.trans_class(s, class);
                        (to != 0).then_some((sym, to))
                    });
                let label = self.label(s);
                (s, edges, (label != 0).then_some(label))
            }),
            &self.initial,
            |s| *s,
            |i| fmt_symbol(i).into(),
            |s| s.to_string().into(),
            |l| Some(l.to_string().into()),
        )
    }
}
