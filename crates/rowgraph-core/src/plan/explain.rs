//! Deterministic, read-only explanation of query plans; must not execute or validate.

use crate::{
    model::FetchTiming,
    plan::{
        DomainResult, EntityNode, QueryPlan,
        fetch::{CollectionFetchKind, ElementFetch, EntityFetchKind, Fetch, FetchList},
    },
};
use serde::Serialize;

///
/// ExplainPlan
///
/// Stable, serializable projection of a `QueryPlan` for observability and
/// fingerprinting.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExplainPlan {
    pub root: String,
    pub width: usize,
    pub results: Vec<ExplainResult>,
}

///
/// ExplainResult
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExplainResult {
    Entity {
        path: String,
        alias: String,
        fetches: Vec<ExplainFetch>,
    },
    Basic {
        path: String,
        position: usize,
    },
}

///
/// ExplainFetchKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainFetchKind {
    Basic,
    Embeddable,
    Entity,
    Collection,
    Any,
    Circular,
}

///
/// ExplainStyle
///
/// How the fetched data reaches the object graph.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainStyle {
    Column,
    Unfetched,
    Join,
    Select,
    Batch,
    Delayed,
    Alias,
}

///
/// ExplainFetch
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExplainFetch {
    pub path: String,
    pub kind: ExplainFetchKind,
    pub timing: FetchTiming,
    pub style: ExplainStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fetches: Vec<Self>,
}

impl QueryPlan {
    /// Produce the explain projection of this plan.
    #[must_use]
    pub fn explain(&self) -> ExplainPlan {
        ExplainPlan {
            root: self.root_path().full_path(),
            width: self.selections().width(),
            results: self.results().iter().map(explain_result).collect(),
        }
    }
}

fn explain_result(result: &DomainResult) -> ExplainResult {
    match result {
        DomainResult::Entity(result) => ExplainResult::Entity {
            path: result.node.path.full_path(),
            alias: result.node.alias.to_string(),
            fetches: explain_fetches(&result.node.fetches),
        },
        DomainResult::Basic(result) => ExplainResult::Basic {
            path: result.path.full_path(),
            position: result.position,
        },
    }
}

fn explain_fetches(fetches: &FetchList) -> Vec<ExplainFetch> {
    fetches.iter().map(explain_fetch).collect()
}

fn explain_node(node: &EntityNode) -> (Option<String>, Vec<ExplainFetch>) {
    (Some(node.alias.to_string()), explain_fetches(&node.fetches))
}

fn explain_fetch(fetch: &Fetch) -> ExplainFetch {
    let mut alias = None;
    let mut referenced_path = None;
    let mut fetches = Vec::new();

    let (kind, style) = match fetch {
        Fetch::Basic(basic) => {
            let style = if basic.position.is_some() {
                ExplainStyle::Column
            } else {
                ExplainStyle::Unfetched
            };
            (ExplainFetchKind::Basic, style)
        }
        Fetch::Embeddable(embeddable) => {
            fetches = explain_fetches(&embeddable.fetches);
            let style = match embeddable.timing {
                FetchTiming::Immediate => ExplainStyle::Column,
                FetchTiming::Delayed => ExplainStyle::Unfetched,
            };
            (ExplainFetchKind::Embeddable, style)
        }
        Fetch::Entity(entity) => {
            let style = match &entity.kind {
                EntityFetchKind::Joined(node) => {
                    (alias, fetches) = explain_node(node);
                    ExplainStyle::Join
                }
                EntityFetchKind::Select { batched } => select_style(*batched),
                EntityFetchKind::Delayed => ExplainStyle::Delayed,
            };
            (ExplainFetchKind::Entity, style)
        }
        Fetch::Collection(collection) => {
            let style = match &collection.kind {
                CollectionFetchKind::Joined(joined) => {
                    alias = Some(joined.alias.to_string());
                    fetches = match &joined.element {
                        ElementFetch::Entity(node) => explain_fetches(&node.fetches),
                        ElementFetch::Embeddable(element) => explain_fetches(&element.fetches),
                        ElementFetch::Basic(_) => Vec::new(),
                    };
                    ExplainStyle::Join
                }
                CollectionFetchKind::Select { batched } => select_style(*batched),
                CollectionFetchKind::Delayed => ExplainStyle::Delayed,
            };
            (ExplainFetchKind::Collection, style)
        }
        Fetch::Any(any) => {
            let style = match any.timing {
                FetchTiming::Immediate => ExplainStyle::Select,
                FetchTiming::Delayed => ExplainStyle::Delayed,
            };
            (ExplainFetchKind::Any, style)
        }
        Fetch::Circular(circular) => {
            referenced_path = Some(circular.referenced_path.full_path());
            (ExplainFetchKind::Circular, ExplainStyle::Alias)
        }
    };

    ExplainFetch {
        path: fetch.navigable_path().full_path(),
        kind,
        timing: fetch.timing(),
        style,
        alias,
        referenced_path,
        fetches,
    }
}

const fn select_style(batched: bool) -> ExplainStyle {
    if batched {
        ExplainStyle::Batch
    } else {
        ExplainStyle::Select
    }
}
