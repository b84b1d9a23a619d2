//! Module: plan
//! Responsibility: the immutable DomainResult / Fetch plan built once per
//! query compilation, plus its selection layout, explain projection,
//! fingerprint and cache.
//! Does not own: per-execution mutable state (exec) or SQL rendering.
//! Boundary: a finished `QueryPlan` is read-only and shared across threads.

mod builder;
mod cache;
mod explain;
mod fetch;
mod fingerprint;
mod selection;
mod state;

#[cfg(test)]
mod tests;

use crate::{model::EntityModel, path::NavigablePath};
use derive_more::Deref;
use std::{fmt, sync::Arc};

// re-exports
pub use builder::QueryPlanBuilder;
pub use cache::{CacheStats, PlanCache, PlanCacheKey};
pub use explain::{ExplainFetch, ExplainFetchKind, ExplainPlan, ExplainResult, ExplainStyle};
pub use fetch::{
    AnyFetch, BasicElement, BasicFetch, CircularFetch, CollectionFetch, CollectionFetchKind,
    ElementFetch, EmbeddableElement, EmbeddableFetch, EntityFetch, EntityFetchKind, Fetch,
    FetchList, JoinedCollection,
};
pub use fingerprint::PlanFingerprint;
pub use selection::{SelectionList, SqlSelection};

///
/// TableAlias
///
/// SQL table alias (`t0`, `t1`, ...) under which a node's columns are
/// selected.
///

#[derive(Clone, Debug, Deref, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TableAlias(String);

impl TableAlias {
    pub(crate) fn numbered(n: usize) -> Self {
        Self(format!("t{n}"))
    }
}

impl fmt::Display for TableAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

///
/// FetchParent
///
/// A plan node that owns an ordered list of child fetches.
///

pub trait FetchParent {
    fn navigable_path(&self) -> &NavigablePath;

    fn fetches(&self) -> &FetchList;

    fn find_fetch(&self, name: &str) -> Option<&Fetch> {
        self.fetches().find(name)
    }
}

///
/// EntityNode
///
/// Entity whose columns are present in the row: a root result, a joined
/// to-one target, or a joined collection element.
///

#[derive(Clone, Debug)]
pub struct EntityNode {
    pub path: NavigablePath,
    pub entity: Arc<EntityModel>,
    pub alias: TableAlias,
    pub identifier: Vec<usize>,
    pub version: Option<usize>,
    pub fetches: FetchList,
}

impl FetchParent for EntityNode {
    fn navigable_path(&self) -> &NavigablePath {
        &self.path
    }

    fn fetches(&self) -> &FetchList {
        &self.fetches
    }
}

///
/// DomainResult
///
/// One top-level value of each result row.
///

#[derive(Clone, Debug)]
pub enum DomainResult {
    Entity(EntityResult),
    Basic(BasicResult),
}

impl DomainResult {
    #[must_use]
    pub const fn navigable_path(&self) -> &NavigablePath {
        match self {
            Self::Entity(result) => &result.node.path,
            Self::Basic(result) => &result.path,
        }
    }

    #[must_use]
    pub fn result_variable(&self) -> Option<&str> {
        match self {
            Self::Entity(result) => result.result_variable.as_deref(),
            Self::Basic(result) => result.result_variable.as_deref(),
        }
    }
}

///
/// EntityResult
///

#[derive(Clone, Debug)]
pub struct EntityResult {
    pub node: EntityNode,
    pub result_variable: Option<String>,
}

///
/// BasicResult
///
/// Scalar projection of a root attribute.
///

#[derive(Clone, Debug)]
pub struct BasicResult {
    pub path: NavigablePath,
    pub column: String,
    pub position: usize,
    pub nullable: bool,
    pub result_variable: Option<String>,
}

///
/// QueryPlan
///
/// Immutable plan tree for one compiled query.
///

#[derive(Debug)]
pub struct QueryPlan {
    root: NavigablePath,
    results: Vec<DomainResult>,
    selections: SelectionList,
    aliases: Vec<(NavigablePath, TableAlias)>,
    joined_collection: bool,
    circular_fetches: usize,
    fingerprint: PlanFingerprint,
}

impl QueryPlan {
    pub(crate) fn new(
        root: NavigablePath,
        results: Vec<DomainResult>,
        selections: SelectionList,
        aliases: Vec<(NavigablePath, TableAlias)>,
        joined_collection: bool,
        circular_fetches: usize,
    ) -> Self {
        let mut plan = Self {
            root,
            results,
            selections,
            aliases,
            joined_collection,
            circular_fetches,
            fingerprint: PlanFingerprint::from_bytes([0; 32]),
        };
        plan.fingerprint = plan.compute_fingerprint();

        plan
    }

    #[must_use]
    pub const fn root_path(&self) -> &NavigablePath {
        &self.root
    }

    #[must_use]
    pub fn results(&self) -> &[DomainResult] {
        &self.results
    }

    #[must_use]
    pub const fn selections(&self) -> &SelectionList {
        &self.selections
    }

    #[must_use]
    pub const fn fingerprint(&self) -> PlanFingerprint {
        self.fingerprint
    }

    /// True when at least one collection is join-fetched, so owner rows
    /// repeat once per element.
    #[must_use]
    pub const fn has_joined_collection(&self) -> bool {
        self.joined_collection
    }

    #[must_use]
    pub const fn circular_fetch_count(&self) -> usize {
        self.circular_fetches
    }

    /// Table alias of a joined node, addressed by its rendered path.
    #[must_use]
    pub fn alias_of(&self, path: &str) -> Option<&TableAlias> {
        self.aliases
            .iter()
            .find(|(p, _)| p.full_path() == path)
            .map(|(_, alias)| alias)
    }

    /// Row position of `column` selected for the joined node at `path`.
    #[must_use]
    pub fn position_of(&self, path: &str, column: &str) -> Option<usize> {
        let alias = self.alias_of(path)?;

        self.selections.position(alias, column)
    }

    /// Entity node (root, joined to-one target or joined element) at `path`.
    #[must_use]
    pub fn entity_node(&self, path: &NavigablePath) -> Option<&EntityNode> {
        for result in &self.results {
            if let DomainResult::Entity(result) = result
                && let Some(node) = find_entity_node(&result.node, path)
            {
                return Some(node);
            }
        }

        None
    }

    /// Fetch parent at `path`, following the same lookup as `entity_node`
    /// but also accepting embeddables.
    #[must_use]
    pub fn fetch_parent(&self, path: &NavigablePath) -> Option<&dyn FetchParent> {
        for result in &self.results {
            if let DomainResult::Entity(result) = result {
                if result.node.path == *path {
                    return Some(&result.node);
                }
                if let Some(fetch) = find_fetch_in(&result.node.fetches, path) {
                    return fetch.as_fetch_parent();
                }
            }
        }

        None
    }

    /// Fetch node at `path`.
    #[must_use]
    pub fn find_fetch(&self, path: &NavigablePath) -> Option<&Fetch> {
        self.results.iter().find_map(|result| match result {
            DomainResult::Entity(result) => find_fetch_in(&result.node.fetches, path),
            DomainResult::Basic(_) => None,
        })
    }

    /// Visit every fetch in pre-order.
    pub fn walk(&self, mut visit: impl FnMut(&Fetch)) {
        for result in &self.results {
            if let DomainResult::Entity(result) = result {
                walk_fetches(&result.node.fetches, &mut visit);
            }
        }
    }
}

fn walk_fetches(fetches: &FetchList, visit: &mut impl FnMut(&Fetch)) {
    for fetch in fetches {
        visit(fetch);
        if let Some(parent) = fetch.as_fetch_parent() {
            walk_fetches(parent.fetches(), visit);
        }
    }
}

fn find_fetch_in<'p>(fetches: &'p FetchList, path: &NavigablePath) -> Option<&'p Fetch> {
    for fetch in fetches {
        let fetch_path = fetch.navigable_path();
        if fetch_path == path {
            return Some(fetch);
        }
        if fetch_path.is_ancestor_of(path)
            && let Some(parent) = fetch.as_fetch_parent()
        {
            if parent.navigable_path() == path {
                return Some(fetch);
            }
            if let Some(found) = find_fetch_in(parent.fetches(), path) {
                return Some(found);
            }
        }
    }

    None
}

fn find_entity_node<'p>(node: &'p EntityNode, path: &NavigablePath) -> Option<&'p EntityNode> {
    if node.path == *path {
        return Some(node);
    }

    node.fetches.iter().find_map(|fetch| entity_in_fetch(fetch, path))
}

fn entity_in_fetch<'p>(fetch: &'p Fetch, path: &NavigablePath) -> Option<&'p EntityNode> {
    let fetch_path = fetch.navigable_path();
    if fetch_path != path && !fetch_path.is_ancestor_of(path) {
        return None;
    }

    match fetch {
        Fetch::Entity(EntityFetch {
            kind: EntityFetchKind::Joined(child),
            ..
        }) => find_entity_node(child, path),
        Fetch::Collection(CollectionFetch {
            kind: CollectionFetchKind::Joined(joined),
            ..
        }) => match &joined.element {
            ElementFetch::Entity(child) => find_entity_node(child, path),
            ElementFetch::Embeddable(element) => element
                .fetches
                .iter()
                .find_map(|f| entity_in_fetch(f, path)),
            ElementFetch::Basic(_) => None,
        },
        Fetch::Embeddable(embeddable) => embeddable
            .fetches
            .iter()
            .find_map(|f| entity_in_fetch(f, path)),
        _ => None,
    }
}
