//! Module: graph
//! Responsibility: caller-supplied entity graphs and the traversal state that
//! applies them to fetch timing while a plan is being built.
//! Does not own: fetch generation itself (plan builder).
//! Boundary: `EntityGraphTraversalState::{traverse, backtrack}` is the only
//! surface through which a graph changes fetch timing.

mod parse;
mod traversal;


use crate::{
    error::PlanError,
    model::{AttributeKind, CollectionElement, FetchableContainer, MappingModel},
};
use std::{collections::BTreeMap, fmt};

// re-exports
pub use traversal::{EntityGraphTraversalState, FetchStrategy, GraphContext, TraversalResult};

///
/// GraphSemantic
///
/// `Fetch`: associations absent from the graph are delayed.
/// `Load`: associations absent from the graph keep their mapped timing.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GraphSemantic {
    Fetch,
    Load,
}

impl GraphSemantic {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Load => "load",
        }
    }
}

///
/// EntityGraph
///

#[derive(Clone, Debug)]
pub struct EntityGraph {
    pub root_entity: String,
    pub semantic: GraphSemantic,
    pub root: SubGraph,
}

impl EntityGraph {
    #[must_use]
    pub fn new(root_entity: impl Into<String>, semantic: GraphSemantic, root: SubGraph) -> Self {
        Self {
            root_entity: root_entity.into(),
            semantic,
            root,
        }
    }

    /// Parse the textual form, e.g. `customer(orders), lineItems`.
    pub fn parse(
        root_entity: impl Into<String>,
        semantic: GraphSemantic,
        text: &str,
    ) -> Result<Self, PlanError> {
        let root = parse::parse_subgraph(text)?;

        Ok(Self::new(root_entity, semantic, root))
    }

    /// Check that every attribute the graph names exists on its container.
    pub fn validate(&self, model: &MappingModel) -> Result<(), PlanError> {
        let root = model.require_entity(&self.root_entity)?;

        validate_subgraph(model, root.as_ref(), &self.root)
    }
}

impl fmt::Display for EntityGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}[{}]",
            self.semantic.label(),
            self.root_entity,
            self.root
        )
    }
}

fn validate_subgraph(
    model: &MappingModel,
    container: &dyn FetchableContainer,
    graph: &SubGraph,
) -> Result<(), PlanError> {
    if let Some(type_name) = &graph.type_name {
        let typed = model.require_entity(type_name)?;
        if typed.name != container.container_name() {
            return Err(PlanError::GraphRootMismatch {
                graph_root: type_name.clone(),
                entity: container.container_name().to_string(),
            });
        }
    }

    for node in graph.attributes.values() {
        let attribute = container.find_fetchable(&node.name).ok_or_else(|| {
            PlanError::GraphAttributeNotFound {
                container: container.container_name().to_string(),
                attribute: node.name.clone(),
            }
        })?;

        for subgraph in [&node.subgraph, &node.key_subgraph].into_iter().flatten() {
            match &attribute.kind {
                AttributeKind::ToOne(to_one) => {
                    let target = model.require_entity(&to_one.target)?;
                    validate_subgraph(model, target.as_ref(), subgraph)?;
                }
                AttributeKind::Embedded(embeddable) => {
                    validate_subgraph(model, embeddable, subgraph)?;
                }
                AttributeKind::Collection(collection) => match &collection.element {
                    CollectionElement::Entity { target } => {
                        let target = model.require_entity(target)?;
                        validate_subgraph(model, target.as_ref(), subgraph)?;
                    }
                    CollectionElement::Embeddable(embeddable) => {
                        validate_subgraph(model, embeddable, subgraph)?;
                    }
                    CollectionElement::Basic { .. } => {
                        return Err(PlanError::GraphAttributeNotFound {
                            container: node.name.clone(),
                            attribute: subgraph.render_names(),
                        });
                    }
                },
                AttributeKind::Any(_) | AttributeKind::Basic { .. } => {
                    return Err(PlanError::GraphAttributeNotFound {
                        container: node.name.clone(),
                        attribute: subgraph.render_names(),
                    });
                }
            }
        }
    }

    Ok(())
}

///
/// SubGraph
///
/// Attribute nodes requested for one container, optionally restricted to a
/// specific entity type.
///

#[derive(Clone, Debug, Default)]
pub struct SubGraph {
    pub type_name: Option<String>,
    pub attributes: BTreeMap<String, AttributeNode>,
}

impl SubGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.node_mut(name.into());
        self
    }

    #[must_use]
    pub fn subgraph(mut self, name: impl Into<String>, subgraph: Self) -> Self {
        self.node_mut(name.into()).subgraph = Some(subgraph);
        self
    }

    #[must_use]
    pub fn key_subgraph(mut self, name: impl Into<String>, subgraph: Self) -> Self {
        self.node_mut(name.into()).key_subgraph = Some(subgraph);
        self
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&AttributeNode> {
        self.attributes.get(name)
    }

    fn node_mut(&mut self, name: String) -> &mut AttributeNode {
        self.attributes
            .entry(name.clone())
            .or_insert_with(|| AttributeNode::new(name))
    }

    fn render_names(&self) -> String {
        self.attributes.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for SubGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.attributes.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{node}")?;
        }

        Ok(())
    }
}

///
/// AttributeNode
///

#[derive(Clone, Debug)]
pub struct AttributeNode {
    pub name: String,
    pub subgraph: Option<SubGraph>,
    pub key_subgraph: Option<SubGraph>,
}

impl AttributeNode {
    #[must_use]
    pub const fn new(name: String) -> Self {
        Self {
            name,
            subgraph: None,
            key_subgraph: None,
        }
    }
}

impl fmt::Display for AttributeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(subgraph) = &self.subgraph {
            if let Some(type_name) = &subgraph.type_name {
                write!(f, ":{type_name}")?;
            }
            write!(f, "({subgraph})")?;
        }
        if let Some(key) = &self.key_subgraph {
            write!(f, ".key({key})")?;
        }

        Ok(())
    }
}
