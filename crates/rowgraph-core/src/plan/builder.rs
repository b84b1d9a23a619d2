//! Depth-first DomainResult / Fetch plan construction.
//!
//! The walk visits every fetchable of every fetch parent in mapping order.
//! Per attribute it first applies the entity graph (or, without a graph,
//! the enabled fetch profiles), then decides between a fresh subtree, a
//! non-joined fetch, and a circular alias of a node already open on the
//! association stack.

use crate::{
    config::MaterializeConfig,
    error::{InternalError, PlanError},
    graph::{EntityGraph, FetchStrategy},
    model::{
        AnyModel, AttributeKind, AttributeModel, CollectionElement, CollectionModel,
        CollectionSemantics, EntityModel, FetchOptions, FetchStyle, FetchTiming, Fetchable,
        FetchableContainer, MappingModel, ToOneModel,
    },
    obs::sink::{self, MetricsEvent},
    path::NavigablePath,
    plan::{
        BasicResult, DomainResult, EntityNode, EntityResult, QueryPlan, TableAlias,
        cache::PlanCacheKey,
        fetch::{
            AnyFetch, BasicElement, BasicFetch, CircularFetch, CollectionFetch,
            CollectionFetchKind, ElementFetch, EmbeddableElement, EmbeddableFetch, EntityFetch,
            EntityFetchKind, Fetch, FetchList, JoinedCollection,
        },
        state::{AssociationFrame, AssociationSide, CreationState},
    },
};
use std::sync::Arc;

///
/// ResultSpec
///

#[derive(Clone, Debug)]
enum ResultSpec {
    Entity {
        result_variable: Option<String>,
    },
    Attribute {
        attribute: String,
        result_variable: Option<String>,
    },
}

impl ResultSpec {
    fn render(&self) -> String {
        match self {
            Self::Entity { result_variable } => {
                format!("entity:{}", result_variable.as_deref().unwrap_or(""))
            }
            Self::Attribute {
                attribute,
                result_variable,
            } => format!(
                "attribute:{attribute}:{}",
                result_variable.as_deref().unwrap_or("")
            ),
        }
    }
}

///
/// QueryPlanBuilder
///
/// Compiles one query shape against a mapping model. Without any explicit
/// selection the root entity itself is the single result.
///

#[derive(Clone, Debug)]
pub struct QueryPlanBuilder<'m> {
    model: &'m MappingModel,
    root: String,
    results: Vec<ResultSpec>,
    graph: Option<&'m EntityGraph>,
    profiles: Vec<String>,
    max_fetch_depth: Option<u32>,
    metrics: bool,
}

impl<'m> QueryPlanBuilder<'m> {
    #[must_use]
    pub fn new(model: &'m MappingModel, root: impl Into<String>) -> Self {
        Self {
            model,
            root: root.into(),
            results: Vec::new(),
            graph: None,
            profiles: Vec::new(),
            max_fetch_depth: None,
            metrics: true,
        }
    }

    /// Select the root entity as a result.
    #[must_use]
    pub fn select_entity(mut self, result_variable: Option<&str>) -> Self {
        self.results.push(ResultSpec::Entity {
            result_variable: result_variable.map(str::to_string),
        });
        self
    }

    /// Select one basic attribute of the root as a scalar result.
    #[must_use]
    pub fn select_attribute(
        mut self,
        attribute: impl Into<String>,
        result_variable: Option<&str>,
    ) -> Self {
        self.results.push(ResultSpec::Attribute {
            attribute: attribute.into(),
            result_variable: result_variable.map(str::to_string),
        });
        self
    }

    #[must_use]
    pub const fn entity_graph(mut self, graph: &'m EntityGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Enable a named fetch profile. Ignored for paths an entity graph decides.
    #[must_use]
    pub fn enable_profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    #[must_use]
    pub const fn max_fetch_depth(mut self, depth: Option<u32>) -> Self {
        self.max_fetch_depth = depth;
        self
    }

    /// Apply the plan-relevant parts of a materialization config.
    #[must_use]
    pub const fn with_config(mut self, config: &MaterializeConfig) -> Self {
        self.max_fetch_depth = config.max_fetch_depth;
        self.metrics = config.metrics;
        self
    }

    pub(crate) const fn metrics_enabled(&self) -> bool {
        self.metrics
    }

    /// Identity of the plan this builder would produce.
    #[must_use]
    pub fn cache_key(&self) -> PlanCacheKey {
        PlanCacheKey {
            root: self.root.clone(),
            results: self.result_specs().iter().map(ResultSpec::render).collect(),
            graph: self.graph.map(ToString::to_string),
            profiles: self.profiles.clone(),
            max_fetch_depth: self.max_fetch_depth,
        }
    }

    fn result_specs(&self) -> Vec<ResultSpec> {
        if self.results.is_empty() {
            vec![ResultSpec::Entity {
                result_variable: None,
            }]
        } else {
            self.results.clone()
        }
    }

    /// Build the plan. Any failure discards the partial plan.
    pub fn build(&self) -> Result<QueryPlan, InternalError> {
        let entity = Arc::clone(self.model.require_entity(&self.root)?);

        if let Some(graph) = self.graph {
            if graph.root_entity != entity.name {
                return Err(PlanError::GraphRootMismatch {
                    graph_root: graph.root_entity.clone(),
                    entity: entity.name.clone(),
                }
                .into());
            }
            graph.validate(self.model)?;
        }

        let profiles = self
            .profiles
            .iter()
            .map(|name| {
                self.model
                    .profile(name)
                    .ok_or_else(|| PlanError::UnknownFetchProfile {
                        profile: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = CreationState::new(self.model, self.graph, profiles, self.max_fetch_depth);
        let root_path = NavigablePath::root(&entity.name);
        let root_alias = state.next_alias(&root_path);

        let mut results = Vec::new();
        let mut entity_selected = false;
        for spec in self.result_specs() {
            match spec {
                ResultSpec::Entity { result_variable } => {
                    if entity_selected {
                        return Err(PlanError::UnsupportedResult {
                            attribute: entity.name.clone(),
                            reason: "the root entity is already selected".to_string(),
                        }
                        .into());
                    }
                    entity_selected = true;

                    let node =
                        entity_node(&mut state, root_path.clone(), &entity, root_alias.clone())?;
                    results.push(DomainResult::Entity(EntityResult {
                        node,
                        result_variable,
                    }));
                }
                ResultSpec::Attribute {
                    attribute,
                    result_variable,
                } => {
                    let result = basic_result(
                        &mut state,
                        &entity,
                        &root_path,
                        &root_alias,
                        &attribute,
                        result_variable,
                    )?;
                    results.push(DomainResult::Basic(result));
                }
            }
        }

        if !state.graph_is_balanced() {
            return Err(InternalError::graph_invariant(
                "entity graph traversal left unbalanced after plan construction",
            ));
        }

        let CreationState {
            selections,
            aliases,
            joined_collection,
            circular_fetches,
            ..
        } = state;
        let plan = QueryPlan::new(
            root_path,
            results,
            selections.finish(),
            aliases,
            joined_collection,
            circular_fetches,
        );

        let mut fetches = 0;
        plan.walk(|_| fetches += 1);

        if self.metrics {
            sink::record(MetricsEvent::PlanBuilt {
                root: entity.name.clone(),
                fetches,
                circular: plan.circular_fetch_count(),
            });
        }
        tracing::debug!(
            root = %plan.root_path(),
            fingerprint = %plan.fingerprint(),
            width = plan.selections().width(),
            fetches,
            circular = plan.circular_fetch_count(),
            "query plan built"
        );

        Ok(plan)
    }
}

///
/// ParentContext
///
/// Fetch parent whose fetchables are being generated. `alias` and
/// `owner_table` locate the columns of the parent's own attributes;
/// `entity_path` is the nearest enclosing entity node.
///

struct ParentContext<'p> {
    path: &'p NavigablePath,
    container: &'p dyn FetchableContainer,
    owner_table: &'p str,
    alias: &'p TableAlias,
    entity_path: &'p NavigablePath,
    role_prefix: &'p str,
}

fn basic_result(
    state: &mut CreationState<'_>,
    entity: &EntityModel,
    root_path: &NavigablePath,
    root_alias: &TableAlias,
    attribute: &str,
    result_variable: Option<String>,
) -> Result<BasicResult, InternalError> {
    let model = entity
        .find_fetchable(attribute)
        .ok_or_else(|| PlanError::UnknownAttribute {
            entity: entity.name.clone(),
            attribute: attribute.to_string(),
        })?;

    let AttributeKind::Basic { column } = &model.kind else {
        return Err(PlanError::UnsupportedResult {
            attribute: attribute.to_string(),
            reason: "only basic attributes can be selected as scalars".to_string(),
        }
        .into());
    };

    let path = root_path.append(attribute);
    let position = state.selections.select(root_alias, column, &path);

    Ok(BasicResult {
        path,
        column: column.clone(),
        position,
        nullable: model.nullable,
        result_variable,
    })
}

fn entity_node(
    state: &mut CreationState<'_>,
    path: NavigablePath,
    entity: &Arc<EntityModel>,
    alias: TableAlias,
) -> Result<EntityNode, InternalError> {
    let identifier =
        state
            .selections
            .select_all(&alias, &entity.identifier.columns, &path.identifier());
    let version = entity.version.as_ref().map(|version| {
        state
            .selections
            .select(&alias, &version.column, &path.append(&version.attribute))
    });

    let parent = ParentContext {
        path: &path,
        container: entity.as_ref(),
        owner_table: &entity.table,
        alias: &alias,
        entity_path: &path,
        role_prefix: &entity.name,
    };
    let fetches = generate_fetches(state, &parent)?;

    Ok(EntityNode {
        path,
        entity: Arc::clone(entity),
        alias,
        identifier,
        version,
        fetches,
    })
}

fn generate_fetches(
    state: &mut CreationState<'_>,
    parent: &ParentContext<'_>,
) -> Result<FetchList, InternalError> {
    let mut fetches = Vec::with_capacity(parent.container.fetchable_count());
    for (slot, attribute) in parent.container.fetchables().iter().enumerate() {
        fetches.push(generate_fetch(state, parent, slot, attribute)?);
    }

    Ok(FetchList::new(fetches))
}

/// Produce the fetch for one fetchable of `parent`.
///
/// The entity graph is applied before anything is generated for the path
/// and backtracked when the returned scope drops, so siblings always see
/// the parent's graph context.
fn generate_fetch(
    state: &mut CreationState<'_>,
    parent: &ParentContext<'_>,
    slot: usize,
    attribute: &AttributeModel,
) -> Result<Fetch, InternalError> {
    let path = parent.path.append(&attribute.name);
    let (mut scope, strategy) = state.traverse_graph(parent.container, attribute);
    let options = effective_options(&scope, parent, attribute, strategy);

    match &attribute.kind {
        AttributeKind::Basic { column } => Ok(Fetch::Basic(BasicFetch {
            position: (options.timing == FetchTiming::Immediate)
                .then(|| scope.selections.select(parent.alias, column, &path)),
            path,
            name: attribute.name.clone(),
            slot,
            column: column.clone(),
            nullable: attribute.nullable,
        })),
        AttributeKind::Embedded(embeddable) => {
            let fetches = if options.timing == FetchTiming::Immediate {
                let role_prefix = format!("{}.{}", parent.role_prefix, attribute.name);
                let child = ParentContext {
                    path: &path,
                    container: embeddable,
                    owner_table: parent.owner_table,
                    alias: parent.alias,
                    entity_path: parent.entity_path,
                    role_prefix: &role_prefix,
                };
                generate_fetches(&mut scope, &child)?
            } else {
                FetchList::default()
            };

            Ok(Fetch::Embeddable(EmbeddableFetch {
                path,
                name: attribute.name.clone(),
                slot,
                embeddable: embeddable.name.clone(),
                timing: options.timing,
                fetches,
            }))
        }
        AttributeKind::ToOne(to_one) => {
            to_one_fetch(&mut scope, parent, path, slot, attribute, to_one, options)
        }
        AttributeKind::Collection(collection) => {
            collection_fetch(&mut scope, parent, path, slot, attribute, collection, options)
        }
        AttributeKind::Any(any) => any_fetch(&mut scope, parent, path, slot, attribute, any, options),
    }
}

// Graph strategy first; profiles only when no graph is applied; then the
// mapping. Graph strategies on values only apply when they ask for data.
fn effective_options(
    state: &CreationState<'_>,
    parent: &ParentContext<'_>,
    attribute: &AttributeModel,
    strategy: Option<FetchStrategy>,
) -> FetchOptions {
    let mapped = attribute.mapped_fetch_options();

    if let Some(strategy) = strategy {
        if !attribute.is_association() && strategy.timing == FetchTiming::Delayed {
            return mapped;
        }

        let style = if strategy.joined {
            FetchStyle::Join
        } else if mapped.style == FetchStyle::Join {
            FetchStyle::Select
        } else {
            mapped.style
        };

        return FetchOptions {
            timing: strategy.timing,
            style,
        };
    }

    if !state.has_entity_graph()
        && let Some(style) = state.profile_style(parent.role_prefix, &attribute.name)
    {
        return FetchOptions {
            timing: FetchTiming::Immediate,
            style,
        };
    }

    mapped
}

fn to_one_fetch(
    state: &mut CreationState<'_>,
    parent: &ParentContext<'_>,
    path: NavigablePath,
    slot: usize,
    attribute: &AttributeModel,
    to_one: &ToOneModel,
    options: FetchOptions,
) -> Result<Fetch, InternalError> {
    let target = Arc::clone(state.model.require_entity(&to_one.target)?);
    if to_one.foreign_key.len() != target.identifier.columns.len() {
        return Err(PlanError::InconsistentIdentifier {
            path: path.full_path(),
            expected: target.identifier.columns.len(),
            found: to_one.foreign_key.len(),
        }
        .into());
    }

    let key = attribute
        .association_key(parent.owner_table)
        .ok_or_else(|| InternalError::plan_invariant(format!("to-one '{path}' has no key")))?;

    if let Some(frame) = state.visited_association(&key) {
        let referenced_path = frame.referenced_path.clone();
        let mut resolving = state.resolve_circular_fetch(&path)?;
        let foreign_key =
            resolving
                .selections
                .select_all(parent.alias, &to_one.foreign_key, &path);
        resolving.circular_fetches += 1;

        tracing::debug!(
            path = %path,
            referenced = %referenced_path,
            key = %key,
            "circular fetch"
        );

        return Ok(Fetch::Circular(CircularFetch {
            path,
            name: attribute.name.clone(),
            slot,
            timing: options.timing,
            referenced_path,
            target,
            foreign_key,
            foreign_key_columns: to_one.foreign_key.clone(),
        }));
    }

    let foreign_key = state
        .selections
        .select_all(parent.alias, &to_one.foreign_key, &path);

    let kind = if options.is_joined() && state.within_fetch_depth(attribute) {
        let mut frame = state.push_association(AssociationFrame {
            key,
            referenced_path: path.clone(),
            side: AssociationSide::ToOne,
        });
        let mut depth = frame.enter_fetch_depth();
        let alias = depth.next_alias(&path);

        EntityFetchKind::Joined(entity_node(&mut depth, path.clone(), &target, alias)?)
    } else if options.timing == FetchTiming::Immediate {
        EntityFetchKind::Select {
            batched: options.style == FetchStyle::Batch,
        }
    } else {
        EntityFetchKind::Delayed
    };

    Ok(Fetch::Entity(EntityFetch {
        path,
        name: attribute.name.clone(),
        slot,
        target,
        timing: options.timing,
        foreign_key,
        foreign_key_columns: to_one.foreign_key.clone(),
        not_found: to_one.not_found,
        kind,
    }))
}

fn collection_fetch(
    state: &mut CreationState<'_>,
    parent: &ParentContext<'_>,
    path: NavigablePath,
    slot: usize,
    attribute: &AttributeModel,
    collection: &CollectionModel,
    options: FetchOptions,
) -> Result<Fetch, InternalError> {
    let role = format!("{}.{}", parent.role_prefix, attribute.name);
    let key = attribute
        .association_key(parent.owner_table)
        .ok_or_else(|| InternalError::plan_invariant(format!("collection '{path}' has no key")))?;

    let mut joined = options.is_joined()
        && state.within_fetch_depth(attribute)
        && !state.visited_as_collection(&key);

    if joined
        && collection.semantics.is_bag()
        && let Some(existing) = &state.joined_bag
    {
        tracing::debug!(
            path = %path,
            joined_bag = %existing,
            "bag not joined: another bag is already join-fetched"
        );
        joined = false;
    }

    if !joined {
        let kind = if options.timing == FetchTiming::Immediate {
            CollectionFetchKind::Select {
                batched: options.style == FetchStyle::Batch,
            }
        } else {
            CollectionFetchKind::Delayed
        };

        return Ok(Fetch::Collection(CollectionFetch {
            path,
            name: attribute.name.clone(),
            slot,
            role,
            semantics: collection.semantics.clone(),
            timing: options.timing,
            kind,
        }));
    }

    if collection.semantics.is_bag() {
        state.joined_bag = Some(path.clone());
    }
    state.joined_collection = true;

    let mut frame = state.push_association(AssociationFrame {
        key,
        referenced_path: parent.entity_path.clone(),
        side: AssociationSide::Collection,
    });
    let mut depth = frame.enter_fetch_depth();

    let alias = depth.next_alias(&path);
    let key_positions = depth
        .selections
        .select_all(&alias, &collection.key_columns, &path);
    let index = match &collection.semantics {
        CollectionSemantics::List { index_column } => {
            Some(depth.selections.select(&alias, index_column, &path))
        }
        _ => None,
    };

    let element_path = path.element();
    let element = match &collection.element {
        CollectionElement::Entity { target } => {
            let target = Arc::clone(depth.model.require_entity(target)?);
            // a one-to-many keeps its elements in the collection table itself
            let element_alias = if target.table == collection.table {
                depth.bind_alias(&element_path, &alias);
                alias.clone()
            } else {
                depth.next_alias(&element_path)
            };

            ElementFetch::Entity(entity_node(
                &mut depth,
                element_path,
                &target,
                element_alias,
            )?)
        }
        CollectionElement::Basic { column } => {
            depth.bind_alias(&element_path, &alias);
            let position = depth.selections.select(&alias, column, &element_path);

            ElementFetch::Basic(BasicElement {
                path: element_path,
                column: column.clone(),
                position,
            })
        }
        CollectionElement::Embeddable(embeddable) => {
            depth.bind_alias(&element_path, &alias);
            let child = ParentContext {
                path: &element_path,
                container: embeddable,
                owner_table: &collection.table,
                alias: &alias,
                entity_path: parent.entity_path,
                role_prefix: &role,
            };
            let fetches = generate_fetches(&mut depth, &child)?;

            ElementFetch::Embeddable(EmbeddableElement {
                path: element_path,
                embeddable: embeddable.name.clone(),
                fetches,
            })
        }
    };

    Ok(Fetch::Collection(CollectionFetch {
        path,
        name: attribute.name.clone(),
        slot,
        role,
        semantics: collection.semantics.clone(),
        timing: options.timing,
        kind: CollectionFetchKind::Joined(JoinedCollection {
            alias,
            key: key_positions,
            key_columns: collection.key_columns.clone(),
            index,
            element,
        }),
    }))
}

fn any_fetch(
    state: &mut CreationState<'_>,
    parent: &ParentContext<'_>,
    path: NavigablePath,
    slot: usize,
    attribute: &AttributeModel,
    any: &AnyModel,
    options: FetchOptions,
) -> Result<Fetch, InternalError> {
    let targets = any
        .targets
        .iter()
        .map(|(value, entity)| {
            state
                .model
                .require_entity(entity)
                .map(|model| (value.clone(), Arc::clone(model)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let discriminator = state
        .selections
        .select(parent.alias, &any.discriminator_column, &path);
    let key = state.selections.select(parent.alias, &any.key_column, &path);

    Ok(Fetch::Any(AnyFetch {
        path,
        name: attribute.name.clone(),
        slot,
        timing: options.timing,
        discriminator,
        key,
        key_column: any.key_column.clone(),
        targets,
    }))
}
