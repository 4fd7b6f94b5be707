use ahash::AHashMap;

/// One outgoing connection of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Successor<'a> {
    pub target: &'a str,
    pub label: Option<&'a str>,
    /// Position of the edge in the source edge list.
    pub edge_index: usize,
}

/// Immutable node id to outgoing-edges lookup, built once per run.
///
/// Successors keep edge-list order, which is what positional branch
/// resolution relies on.
#[derive(Debug, Clone, Default)]
pub struct SuccessorIndex<'a> {
    successors: AHashMap<&'a str, Vec<Successor<'a>>>,
}

impl<'a> SuccessorIndex<'a> {
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (usize, &'a str, &'a str, Option<&'a str>)>,
    {
        let mut successors: AHashMap<&'a str, Vec<Successor<'a>>> = AHashMap::new();
        for (edge_index, from, to, label) in edges {
            successors.entry(from).or_default().push(Successor {
                target: to,
                label,
                edge_index,
            });
        }
        Self { successors }
    }

    pub fn of(&self, node_id: &str) -> &[Successor<'a>] {
        self.successors
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
