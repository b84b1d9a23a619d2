//! Plan-creation state with scoped push/pop.
//!
//! Every piece of context that the depth-first walk pushes (association
//! keys, fetch depth, entity-graph position, the circular-resolution flag)
//! is pushed through a `StateScope` whose `Drop` restores the previous value,
//! so an early `?` return still leaves the state balanced.

use crate::{
    error::PlanError,
    graph::{EntityGraph, EntityGraphTraversalState, FetchStrategy, GraphContext},
    model::{
        AssociationKey, FetchProfile, FetchStyle, Fetchable, FetchableContainer, MappingModel,
    },
    path::NavigablePath,
    plan::{TableAlias, selection::SelectionListBuilder},
};
use std::ops::{Deref, DerefMut};

///
/// AssociationSide
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AssociationSide {
    ToOne,
    Collection,
}

///
/// AssociationFrame
///
/// One open association on the build stack. `referenced_path` is the node
/// a circular fetch over the same key aliases: the joined target for a
/// to-one, the owning entity for a collection.
///

#[derive(Clone, Debug)]
pub(crate) struct AssociationFrame {
    pub(crate) key: AssociationKey,
    pub(crate) referenced_path: NavigablePath,
    pub(crate) side: AssociationSide,
}

///
/// CreationState
///

pub(crate) struct CreationState<'m> {
    pub(crate) model: &'m MappingModel,
    pub(crate) selections: SelectionListBuilder,
    pub(crate) aliases: Vec<(NavigablePath, TableAlias)>,
    pub(crate) joined_bag: Option<NavigablePath>,
    pub(crate) joined_collection: bool,
    pub(crate) circular_fetches: usize,
    graph: Option<EntityGraphTraversalState<'m>>,
    profiles: Vec<&'m FetchProfile>,
    max_fetch_depth: Option<u32>,
    association_keys: Vec<AssociationFrame>,
    fetch_depth: u32,
    resolving_circular_fetch: bool,
    next_alias: usize,
}

impl<'m> CreationState<'m> {
    pub(crate) fn new(
        model: &'m MappingModel,
        graph: Option<&'m EntityGraph>,
        profiles: Vec<&'m FetchProfile>,
        max_fetch_depth: Option<u32>,
    ) -> Self {
        Self {
            model,
            selections: SelectionListBuilder::default(),
            aliases: Vec::new(),
            joined_bag: None,
            joined_collection: false,
            circular_fetches: 0,
            graph: graph.map(EntityGraphTraversalState::new),
            profiles,
            max_fetch_depth,
            association_keys: Vec::new(),
            fetch_depth: 0,
            resolving_circular_fetch: false,
            next_alias: 0,
        }
    }

    /// Allocate the next table alias and bind it to `path`.
    pub(crate) fn next_alias(&mut self, path: &NavigablePath) -> TableAlias {
        let alias = TableAlias::numbered(self.next_alias);
        self.next_alias += 1;
        self.bind_alias(path, &alias);

        alias
    }

    pub(crate) fn bind_alias(&mut self, path: &NavigablePath, alias: &TableAlias) {
        self.aliases.push((path.clone(), alias.clone()));
    }

    // ------------------------------------------------------------------
    // Association keys
    // ------------------------------------------------------------------

    /// Innermost open frame over `key`, unless a circular fetch is
    /// currently being resolved.
    pub(crate) fn visited_association(&self, key: &AssociationKey) -> Option<&AssociationFrame> {
        if self.is_resolving_circular_fetch() {
            return None;
        }

        self.association_keys.iter().rev().find(|frame| frame.key == *key)
    }

    /// True when `key` is already being expanded from its collection side.
    pub(crate) fn visited_as_collection(&self, key: &AssociationKey) -> bool {
        self.association_keys
            .iter()
            .any(|frame| frame.key == *key && frame.side == AssociationSide::Collection)
    }

    pub(crate) fn push_association(&mut self, frame: AssociationFrame) -> StateScope<'_, 'm> {
        self.association_keys.push(frame);

        StateScope::new(self, Restore::AssociationKey)
    }

    // ------------------------------------------------------------------
    // Fetch depth
    // ------------------------------------------------------------------

    /// False when entering one more association would exceed the maximum
    /// fetch depth; such fetches are not joined.
    pub(crate) fn within_fetch_depth(&self, fetchable: &dyn Fetchable) -> bool {
        if !fetchable.increments_fetch_depth() {
            return true;
        }

        self.max_fetch_depth
            .is_none_or(|max| self.fetch_depth.saturating_add(1) <= max)
    }

    pub(crate) fn enter_fetch_depth(&mut self) -> StateScope<'_, 'm> {
        let previous = self.fetch_depth;
        self.fetch_depth = self.fetch_depth.saturating_add(1);

        StateScope::new(self, Restore::FetchDepth(previous))
    }

    // ------------------------------------------------------------------
    // Entity graph and fetch profiles
    // ------------------------------------------------------------------

    /// Apply the entity graph to `fetchable`. The returned scope backtracks
    /// on drop; it must be held until the subtree has been generated.
    pub(crate) fn traverse_graph(
        &mut self,
        parent: &dyn FetchableContainer,
        fetchable: &dyn Fetchable,
    ) -> (StateScope<'_, 'm>, Option<FetchStrategy>) {
        match self.graph.as_mut() {
            Some(graph) => {
                let result = graph.traverse(parent, fetchable, false);

                (
                    StateScope::new(self, Restore::Graph(result.previous_context)),
                    result.strategy,
                )
            }
            None => (StateScope::inert(self), None),
        }
    }

    pub(crate) const fn has_entity_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub(crate) fn graph_is_balanced(&self) -> bool {
        self.graph
            .as_ref()
            .is_none_or(EntityGraphTraversalState::is_balanced)
    }

    /// Style requested for `entity.attribute` by the first enabled profile
    /// that names it.
    pub(crate) fn profile_style(&self, entity: &str, attribute: &str) -> Option<FetchStyle> {
        self.profiles
            .iter()
            .find_map(|profile| profile.style_for(entity, attribute))
    }

    // ------------------------------------------------------------------
    // Circular fetch resolution
    // ------------------------------------------------------------------

    pub(crate) const fn is_resolving_circular_fetch(&self) -> bool {
        self.resolving_circular_fetch
    }

    /// Enter circular-fetch resolution for the foreign key part at `path`.
    /// Association-key detection is suspended until the scope drops; a
    /// nested request means the walk re-entered the same resolution.
    pub(crate) fn resolve_circular_fetch(
        &mut self,
        path: &NavigablePath,
    ) -> Result<StateScope<'_, 'm>, PlanError> {
        if self.is_resolving_circular_fetch() {
            return Err(PlanError::CircularResolutionReentry {
                path: path.full_path(),
            });
        }
        self.resolving_circular_fetch = true;

        Ok(StateScope::new(self, Restore::CircularFetch(false)))
    }
}

///
/// Restore
///

#[derive(Clone, Copy, Debug)]
enum Restore<'m> {
    AssociationKey,
    FetchDepth(u32),
    Graph(GraphContext<'m>),
    CircularFetch(bool),
}

///
/// StateScope
///
/// Guard over `CreationState`; derefs to it and undoes one push on drop.
///

pub(crate) struct StateScope<'s, 'm> {
    state: &'s mut CreationState<'m>,
    restore: Option<Restore<'m>>,
}

impl<'s, 'm> StateScope<'s, 'm> {
    const fn new(state: &'s mut CreationState<'m>, restore: Restore<'m>) -> Self {
        Self {
            state,
            restore: Some(restore),
        }
    }

    const fn inert(state: &'s mut CreationState<'m>) -> Self {
        Self {
            state,
            restore: None,
        }
    }
}

impl<'m> Deref for StateScope<'_, 'm> {
    type Target = CreationState<'m>;

    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl DerefMut for StateScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
    }
}

impl Drop for StateScope<'_, '_> {
    fn drop(&mut self) {
        match self.restore.take() {
            Some(Restore::AssociationKey) => {
                self.state.association_keys.pop();
            }
            Some(Restore::FetchDepth(previous)) => {
                self.state.fetch_depth = previous;
            }
            Some(Restore::Graph(previous)) => {
                if let Some(graph) = self.state.graph.as_mut() {
                    graph.backtrack(previous);
                }
            }
            Some(Restore::CircularFetch(previous)) => {
                self.state.resolving_circular_fetch = previous;
            }
            None => {}
        }
    }
}
