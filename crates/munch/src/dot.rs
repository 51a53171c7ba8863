//! Minimal Graphviz writer for automata and compiled tables

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::{self, Display},
};

use indexmap::IndexMap;

macro_rules! attr {
    ($id:ident, $name:literal) => {
        pub fn $id<S: Into<Cow<'a, str>>>(&mut self, $id: S) -> &mut Self {
            self.attrs.insert($name, $id.into());
            self
        }
    };
}

/// A directed graph
#[derive(Debug, Default)]
pub struct Graph<'a> {
    attrs: BTreeMap<&'static str, Cow<'a, str>>,
    nodes: IndexMap<Cow<'a, str>, Node<'a>>,
    edges: IndexMap<(Cow<'a, str>, Cow<'a, str>), Vec<Edge<'a>>>,
}

impl<'a> Graph<'a> {
    attr!(label, "label");

    attr!(rankdir, "rankdir");

    #[must_use]
    #[inline]
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn node<S: Into<Cow<'a, str>>>(&mut self, id: S) -> &mut Node<'a> {
        self.nodes.entry(id.into()).or_default()
    }

    #[inline]
    pub fn edge<L: Into<Cow<'a, str>>, R: Into<Cow<'a, str>>>(
        &mut self,
        l: L,
        r: R,
    ) -> &mut Edge<'a> {
        let l = l.into();
        let r = r.into();
        self.node(l.clone());
        self.node(r.clone());
        let edges = self.edges.entry((l, r)).or_default();
        edges.push(Edge::default());
        edges.last_mut().unwrap_or_else(|| unreachable!())
    }

    #[must_use]
    #[inline]
    pub fn node_count(&self) -> usize { self.nodes.len() }

    #[must_use]
    pub fn edge_count(&self) -> usize { self.edges.values().map(Vec::len).sum() }

    /// Lay out a state machine.  Parallel edges between the same pair of
    /// states are merged into one edge listing every input.
    pub(crate) fn state_machine<
        I,
        S,
        T,
        IN: IntoIterator<Item = (S, IE, Option<T>)>,
        IE: IntoIterator<Item = (I, S)>,
        G: FnMut(&S) -> u32,
        FI: Fn(I) -> Cow<'a, str>,
        FS: Fn(S) -> Cow<'a, str>,
        FT: Fn(T) -> Option<Cow<'a, str>>,
    >(
        nodes: IN,
        start: &S,
        mut get_id: G,
        fmt_input: FI,
        fmt_state: FS,
        fmt_tok: FT,
    ) -> Self {
        let mut graph = Self::new();
        graph.rankdir("LR");

        for (state, edges, accept) in nodes {
            let id = Cow::from(get_id(&state).to_string());

            let mut merged: IndexMap<String, Vec<Cow<'a, str>>> = IndexMap::new();
            for (input, next) in edges {
                merged
                    .entry(get_id(&next).to_string())
                    .or_default()
                    .push(fmt_input(input));
            }

            let node = graph.node(id.clone());
            let mut label = fmt_state(state);
            if let Some(tok) = accept {
                if let Some(tok) = fmt_tok(tok) {
                    label = format!("{label}:{tok}").into();
                }

                node.border_count("2");
            }
            node.label(label);

            for (to, inputs) in merged {
                graph.edge(id.clone(), to).label(inputs.join(","));
            }
        }

        let start_id = Cow::from("_start");
        graph
            .node(start_id.clone())
            .style("invis")
            .shape("point")
            .label("");
        graph.edge(start_id, get_id(start).to_string());

        graph
    }
}

#[derive(Default)]
struct AttrState {
    any: bool,
}

impl AttrState {
    fn write_all<'r, 'c: 'r>(
        f: &mut fmt::Formatter,
        attrs: impl IntoIterator<Item = (&'r &'static str, &'r Cow<'c, str>)>,
    ) -> fmt::Result {
        let mut state = Self::default();
        for (key, val) in attrs {
            f.write_str(if state.any {
                ","
            } else {
                state.any = true;
                "["
            })?;
            write!(f, "{key}={val:?}")?;
        }

        if state.any { f.write_str("]") } else { Ok(()) }
    }
}

impl Display for Graph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Self {
            attrs,
            nodes,
            edges,
        } = self;

        f.write_str("digraph {")?;

        for (key, val) in attrs {
            write!(f, "{key}={val:?};")?;
        }

        for (id, Node { attrs }) in nodes {
            write!(f, "{id:?}")?;
            AttrState::write_all(f, attrs)?;
            f.write_str(";")?;
        }

        for ((l, r), edges) in edges {
            for Edge { attrs } in edges {
                write!(f, "{l:?}->{r:?}")?;
                AttrState::write_all(f, attrs)?;
                f.write_str(";")?;
            }
        }

        f.write_str("}")
    }
}

#[derive(Debug, Default)]
pub struct Node<'a> {
    attrs: BTreeMap<&'static str, Cow<'a, str>>,
}

impl<'a> Node<'a> {
    attr!(style, "style");

    attr!(shape, "shape");

    attr!(label, "label");

    attr!(border_count, "peripheries");
}

#[derive(Debug, Default)]
pub struct Edge<'a> {
    attrs: BTreeMap<&'static str, Cow<'a, str>>,
}

impl<'a> Edge<'a> {
    attr!(label, "label");
}
