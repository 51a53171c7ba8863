//! Combining per-token automata into a single scanner table

use crate::{
    dfa::{ConstructionError, Dfa, State, Tag, Transition, minimize, union},
    table::{CompileError, CompiledTable, Label, compile},
};

/// Most rules a single table can distinguish, one accept-tag bit each
pub const MAX_RULES: usize = Tag::BITS as usize;

/// One token definition: an automaton recognizing the token's spelling and the
/// label to report for it
#[derive(Debug, Clone)]
pub struct Rule {
    pub label: Label,
    pub dfa: Dfa,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No rules to build a lexer from")]
    NoRules,
    #[error("Too many rules ({0}), at most {MAX_RULES} are supported")]
    TooManyRules(usize),
    #[error("Rule {0} has a zero label")]
    ZeroLabel(usize),
    #[error("Invalid rule automaton")]
    Construction(#[from] ConstructionError),
    #[error("Error compiling lexer table")]
    Compile(#[from] CompileError),
}

impl Rule {
    #[must_use]
    #[inline]
    pub fn new(label: Label, dfa: Dfa) -> Self { Self { label, dfa } }

    /// Build a rule from a flat transition list and a set of accepting states
    ///
    /// # Errors
    /// Returns an error if the automaton is malformed.
    pub fn from_transitions<T: IntoIterator<Item = Transition>, A: IntoIterator<Item = State>>(
        label: Label,
        transitions: T,
        initial: impl Into<State>,
        accepting: A,
    ) -> Result<Self, BuildError> {
        let dfa = Dfa::from_transitions(transitions, initial, accepting.into_iter().map(|s| (s, 1)))?;
        Ok(Self::new(label, dfa))
    }
}

/// Build a maximal-munch scanner table from a list of rules
///
/// When more than one rule accepts the same input, the one listed first wins.
///
/// # Errors
/// Returns an error if `rules` is empty or longer than [`MAX_RULES`], if a
/// label is zero, or if the combined automaton cannot be compiled.
#[tracing::instrument(level = "debug", skip_all, fields(rules = rules.len()))]
pub fn build(rules: &[Rule]) -> Result<CompiledTable, BuildError> {
    if rules.is_empty() {
        return Err(BuildError::NoRules);
    }

    if rules.len() > MAX_RULES {
        return Err(BuildError::TooManyRules(rules.len()));
    }

    if let Some(i) = rules.iter().position(|r| r.label == 0) {
        return Err(BuildError::ZeroLabel(i));
    }

    let mut merged: Option<Dfa> = None;
    for (i, rule) in rules.iter().enumerate() {
        let bit: Tag = 1 << i;
        let dfa = rule.dfa.clone().retag(|_, _| bit);

        merged = Some(match merged {
            None => dfa.compacted(),
            Some(prev) => union(&prev, &dfa).compacted(),
        });
    }
    let merged = merged.unwrap_or_else(|| unreachable!());
    tracing::trace!(states = merged.states().len(), "Merged rules");

    let min = minimize(&merged);

    // The lowest set bit is the first rule accepting here
    let table = compile(&min, |tag| {
        usize::try_from(tag.trailing_zeros())
            .ok()
            .and_then(|i| rules.get(i))
            .map(|r| r.label)
    })?;

    tracing::debug!(
        states = table.state_count(),
        classes = table.class_count(),
        "Built lexer table"
    );

    Ok(table)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::prop;

    #[test]
    fn rejects_bad_rule_sets() {
        assert!(matches!(build(&[]), Err(BuildError::NoRules)));

        let rule = Rule::new(1, prop::literal(b"a", 1));
        assert!(matches!(
            build(&vec![rule.clone(); MAX_RULES + 1]),
            Err(BuildError::TooManyRules(65))
        ));
        assert!(build(&vec![rule.clone(); MAX_RULES]).is_ok());

        assert!(matches!(
            build(&[rule, Rule::new(0, prop::literal(b"b", 1))]),
            Err(BuildError::ZeroLabel(1))
        ));
    }

    #[test]
    fn malformed_rule_automaton() {
        let err = Rule::from_transitions(
            1,
            [Transition::new(0, b'a', 1), Transition::new(0, b'a', 2)],
            0,
            [State::index(1)],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            BuildError::Construction(ConstructionError::Conflict { .. })
        ));
    }

    #[test]
    fn first_rule_wins_ties() {
        let keyword = Rule::new(10, prop::literal(b"if", 1));
        let ident = Rule::new(20, prop::plus(b"fi", 1));

        let t = build(&[keyword.clone(), ident.clone()]).unwrap();
        assert_eq!(t.run(b"if"), Some(10));
        assert_eq!(t.run(b"fi"), Some(20));
        assert_eq!(t.run(b"iff"), Some(20));
        assert_eq!(t.run(b""), None);

        let t = build(&[ident, keyword]).unwrap();
        assert_eq!(t.run(b"if"), Some(20));
    }

    #[test]
    fn single_rule_is_minimized() {
        // Two equivalent accepting states
        let rule = Rule::from_transitions(
            7,
            [
                Transition::new(0, b'a', 1),
                Transition::new(0, b'b', 2),
                Transition::new(1, b'a', 1),
                Transition::new(2, b'a', 2),
            ],
            0,
            [State::index(1), State::index(2)],
        )
        .unwrap();

        let t = build(&[rule]).unwrap();
        assert_eq!(t.state_count(), 2);
        assert_eq!(t.run(b"baaa"), Some(7));
        assert_eq!(t.run(b"ab"), None);
    }

    proptest! {
        #[test]
        fn table_accepts_union_of_rules(
            a in prop::dfa(4, b"abc", 1),
            b in prop::dfa(4, b"abc", 1),
            c in prop::dfa(3, b"ab", 1),
            inputs in proptest::collection::vec(proptest::collection::vec(prop::symbol(b"abcd"), 0..8), 32),
        ) {
            let rules = [Rule::new(1, a), Rule::new(2, b), Rule::new(3, c)];
            let t = build(&rules).unwrap();

            for input in &inputs {
                let expect = rules.iter().find(|r| r.dfa.run(input).is_some()).map(|r| r.label);
                prop_assert_eq!(t.run(input), expect, "input = {:?}", input);
            }
        }
    }
}
