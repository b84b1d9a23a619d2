use crate::{
    graph::{EntityGraph, GraphSemantic, SubGraph},
    model::{Fetchable, FetchTiming, FetchableContainer},
};

///
/// GraphContext
///
/// Opaque snapshot of the traversal position, handed back to `backtrack`.
///

#[derive(Clone, Copy, Debug)]
pub struct GraphContext<'g>(Option<&'g SubGraph>);

impl GraphContext<'_> {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

///
/// FetchStrategy
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FetchStrategy {
    pub timing: FetchTiming,
    pub joined: bool,
}

///
/// TraversalResult
///
/// `strategy` is `None` when the graph does not apply to the fetchable and
/// the mapped timing should be used instead.
///

#[derive(Clone, Copy, Debug)]
pub struct TraversalResult<'g> {
    pub previous_context: GraphContext<'g>,
    pub strategy: Option<FetchStrategy>,
}

///
/// EntityGraphTraversalState
///
/// Cursor over an entity graph during a single-threaded plan walk. Every
/// `traverse` must be paired with exactly one `backtrack` once the subtree
/// below the fetchable has been generated.
///

#[derive(Debug)]
pub struct EntityGraphTraversalState<'g> {
    semantic: GraphSemantic,
    current: Option<&'g SubGraph>,
    open: usize,
}

impl<'g> EntityGraphTraversalState<'g> {
    #[must_use]
    pub const fn new(graph: &'g EntityGraph) -> Self {
        Self {
            semantic: graph.semantic,
            current: Some(&graph.root),
            open: 0,
        }
    }

    /// Descend into the graph node matching `fetchable` under `parent`.
    pub fn traverse(
        &mut self,
        parent: &dyn FetchableContainer,
        fetchable: &dyn Fetchable,
        explore_key_subgraph: bool,
    ) -> TraversalResult<'g> {
        let previous = self.current;
        self.open += 1;

        let node = previous
            .filter(|graph| applies_to(graph, parent))
            .and_then(|graph| graph.find(fetchable.fetchable_name()));

        self.current = None;
        let mut strategy = None;

        if let Some(node) = node {
            strategy = Some(FetchStrategy {
                timing: FetchTiming::Immediate,
                joined: true,
            });
            self.current = if explore_key_subgraph {
                node.key_subgraph.as_ref()
            } else {
                node.subgraph.as_ref()
            };
        } else if self.semantic == GraphSemantic::Fetch {
            strategy = Some(FetchStrategy {
                timing: FetchTiming::Delayed,
                joined: false,
            });
        }

        TraversalResult {
            previous_context: GraphContext(previous),
            strategy,
        }
    }

    /// Restore the context captured by the matching `traverse`.
    pub fn backtrack(&mut self, previous: GraphContext<'g>) {
        self.current = previous.0;
        self.open = self.open.saturating_sub(1);
    }

    #[must_use]
    pub const fn current_context(&self) -> GraphContext<'g> {
        GraphContext(self.current)
    }

    /// True when every `traverse` has been matched by a `backtrack`.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.open == 0
    }
}

fn applies_to(graph: &SubGraph, parent: &dyn FetchableContainer) -> bool {
    graph
        .type_name
        .as_deref()
        .is_none_or(|type_name| type_name == parent.container_name())
}
