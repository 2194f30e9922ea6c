// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeSet, HashMap};

use log::{debug, error, warn};

use crate::common::{EntityId, Error, ErrorCode, NodeId, PortId, Result};
use crate::datamodel::element::{ExpandState, NodeContent, PortSlot, TableState};
use crate::datamodel::{IndicatorInfo, TableInfo, WhereInfo};
use crate::expand_err;
use crate::fetch::{FetchedEntity, MetadataFetcher};
use crate::layout::{self, LayoutConfig};
use crate::registry::{GraphRegistry, PortExtend};
use crate::window;

/// What one expand gesture changed, for callers that animate the delta.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpandOutcome {
    pub created: Vec<NodeId>,
    pub merged: Vec<NodeId>,
}

impl ExpandOutcome {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.merged.is_empty()
    }
}

/// One resolved upstream reference of a requesting node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamRef {
    Indicator(EntityId),
    /// An empty field list is a whole-table reference and binds to the
    /// table's header port.
    Table { id: EntityId, fields: Vec<EntityId> },
}

impl UpstreamRef {
    pub fn id(&self) -> &EntityId {
        match self {
            UpstreamRef::Indicator(id) => id,
            UpstreamRef::Table { id, .. } => id,
        }
    }
}

/// The upstream reference set a node's expansion must resolve, fully
/// determined by its cached metadata record.
pub fn upstream_refs(content: &NodeContent) -> Vec<UpstreamRef> {
    match content {
        NodeContent::Atomic(info) => match &info.refer_view_id {
            Some(view) => vec![UpstreamRef::Table {
                id: view.clone(),
                fields: vec![],
            }],
            None => vec![],
        },
        NodeContent::Derived(info) => {
            let mut refs = vec![];
            if let Some(atomic_id) = &info.atomic_indicator_id {
                refs.push(UpstreamRef::Indicator(atomic_id.clone()));
            }
            refs.extend(restriction_table_refs(info));
            refs
        }
        NodeContent::Composite(info) => info
            .expression_dependencies()
            .into_iter()
            .map(UpstreamRef::Indicator)
            .collect(),
        NodeContent::Table(_) => vec![],
    }
}

fn restriction_table_refs(info: &IndicatorInfo) -> Vec<UpstreamRef> {
    match &info.where_info {
        None => vec![],
        // SQL text is opaque: exactly one table reference with an
        // unresolved field set
        Some(WhereInfo::Sql(_)) => match &info.refer_view_id {
            Some(view) => vec![UpstreamRef::Table {
                id: view.clone(),
                fields: vec![],
            }],
            None => vec![],
        },
        Some(WhereInfo::Structured { time, business }) => {
            let mut tables: Vec<(EntityId, Vec<EntityId>)> = vec![];
            for restriction in time.iter().chain(business.iter()) {
                let Some(table_id) = &restriction.table_id else {
                    continue;
                };
                let entry = match tables.iter_mut().find(|(id, _)| id == table_id) {
                    Some(entry) => entry,
                    None => {
                        tables.push((table_id.clone(), vec![]));
                        tables.last_mut().unwrap()
                    }
                };
                if let Some(field_id) = &restriction.field_id {
                    if !entry.1.contains(field_id) {
                        entry.1.push(field_id.clone());
                    }
                }
            }
            tables
                .into_iter()
                .map(|(id, fields)| UpstreamRef::Table { id, fields })
                .collect()
        }
    }
}

struct Requester {
    node: NodeId,
    entity: EntityId,
    level: u32,
    main_port: PortId,
    is_table: bool,
}

/// Orchestrates one expand gesture over an explicitly injected registry,
/// fetcher, and layout config.
pub struct Expander<'a, F: MetadataFetcher> {
    registry: &'a mut GraphRegistry,
    fetcher: &'a F,
    config: &'a LayoutConfig,
}

impl<'a, F: MetadataFetcher> Expander<'a, F> {
    pub fn new(registry: &'a mut GraphRegistry, fetcher: &'a F, config: &'a LayoutConfig) -> Self {
        Expander {
            registry,
            fetcher,
            config,
        }
    }

    /// Expands a node's immediate upstream dependencies.  Expanding an
    /// already-expanded (or in-flight) node is a no-op.  All metadata is
    /// fetched before any mutation, and the mutation itself runs on a
    /// staged copy of the registry committed wholesale, so a failed
    /// gesture leaves the graph exactly as it was.
    pub async fn expand(&mut self, node_id: NodeId) -> Result<ExpandOutcome> {
        let (state, refs, requester) = {
            let Some(node) = self.registry.node(&node_id) else {
                return expand_err!(NodeNotFound, node_id.to_string());
            };
            let requester = Requester {
                node: node_id,
                entity: node.entity_id.clone(),
                level: node.level,
                main_port: PortSlot::Main.port_id(node_id),
                is_table: node.is_table(),
            };
            (node.expand, upstream_refs(&node.content), requester)
        };
        match state {
            ExpandState::Expanded | ExpandState::Expanding => {
                debug!("expand {node_id}: already {state:?}");
                return Ok(ExpandOutcome::default());
            }
            ExpandState::Collapsed => {}
        }

        if let Some(node) = self.registry.node_mut(&node_id) {
            node.expand = ExpandState::Expanding;
        }
        debug!(
            "expand {node_id} ({}): {} upstream refs",
            requester.entity,
            refs.len()
        );

        match self.run_gesture(&requester, &refs).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if let Some(node) = self.registry.node_mut(&node_id) {
                    node.expand = ExpandState::Collapsed;
                }
                if matches!(err.code, ErrorCode::DuplicatePort | ErrorCode::DuplicateEdge) {
                    note_defect(&err);
                } else {
                    warn!("expand {node_id} aborted: {err}");
                }
                Err(err)
            }
        }
    }

    async fn run_gesture(
        &mut self,
        requester: &Requester,
        refs: &[UpstreamRef],
    ) -> Result<ExpandOutcome> {
        let fetched = self.prefetch(refs).await?;

        let mut staged = self.registry.clone();
        let mut outcome = ExpandOutcome::default();
        let mut affected: BTreeSet<u32> = BTreeSet::new();
        affected.insert(requester.level + 1);

        if !requester.is_table {
            window::ensure_port(&mut staged, requester.node, PortSlot::Main)?;
            extend_port_ids(&mut staged, &requester.main_port, &requester.entity);
        }

        for r in refs {
            apply_ref(
                &mut staged,
                self.config,
                requester,
                r,
                &fetched,
                &mut outcome,
                &mut affected,
            )?;
        }

        if let Some(node) = staged.node_mut(&requester.node) {
            node.expand = ExpandState::Expanded;
        }
        layout::relayout_levels(&mut staged, self.config, &affected);

        *self.registry = staged;
        Ok(outcome)
    }

    async fn prefetch(&self, refs: &[UpstreamRef]) -> Result<HashMap<EntityId, FetchedEntity>> {
        let mut fetched = HashMap::new();
        for r in refs {
            let id = r.id();
            if self.registry.node_id_by_entity(id).is_some() || fetched.contains_key(id) {
                continue;
            }
            let record = match r {
                UpstreamRef::Indicator(id) => self
                    .fetcher
                    .fetch_indicator(id)
                    .await
                    .map(FetchedEntity::Indicator),
                UpstreamRef::Table { id, .. } => {
                    self.fetcher.fetch_table(id).await.map(FetchedEntity::Table)
                }
            };
            match record {
                Ok(entity) => {
                    fetched.insert(id.clone(), entity);
                }
                Err(err) => {
                    return expand_err!(FetchFailure, format!("{id}: {err}"));
                }
            }
        }
        Ok(fetched)
    }
}

fn note_defect(err: &Error) {
    error!("expansion logic defect: {err}");
    debug_assert!(false, "expansion logic defect: {err}");
}

fn extend_port_ids(registry: &mut GraphRegistry, port: &PortId, id: &EntityId) {
    let already = registry
        .port(port)
        .is_some_and(|p| p.represents(id));
    if !already {
        registry.update_port_info(Some(port), PortExtend::ids(vec![id.clone()]));
    }
}

fn extend_port_correlations(registry: &mut GraphRegistry, port: &PortId, id: &EntityId) {
    let already = registry
        .port(port)
        .is_some_and(|p| p.correlation_ids.contains(id));
    if !already {
        registry.update_port_info(Some(port), PortExtend::correlations(vec![id.clone()]));
    }
}

fn create_indicator_node(
    registry: &mut GraphRegistry,
    config: &LayoutConfig,
    info: IndicatorInfo,
    level: u32,
    father: NodeId,
) -> Result<NodeId> {
    let entity = info.id.clone();
    let id = registry.add_node(NodeContent::from_indicator(info), level, Some(father));
    layout::refresh_node_height(registry, config, &id);
    let main = window::ensure_port(registry, id, PortSlot::Main)?;
    extend_port_ids(registry, &main, &entity);
    Ok(id)
}

fn create_table_node(
    registry: &mut GraphRegistry,
    config: &LayoutConfig,
    info: TableInfo,
    level: u32,
    father: NodeId,
) -> NodeId {
    let id = registry.add_node(
        NodeContent::Table(TableState {
            info,
            page_offset: 0,
        }),
        level,
        Some(father),
    );
    layout::refresh_node_height(registry, config, &id);
    id
}

fn apply_ref(
    staged: &mut GraphRegistry,
    config: &LayoutConfig,
    requester: &Requester,
    r: &UpstreamRef,
    fetched: &HashMap<EntityId, FetchedEntity>,
    outcome: &mut ExpandOutcome,
    affected: &mut BTreeSet<u32>,
) -> Result<()> {
    let target_level = requester.level + 1;
    match r {
        UpstreamRef::Indicator(id) => {
            let target = match staged.node_id_by_entity(id) {
                Some(existing) => {
                    if !outcome.merged.contains(&existing) {
                        outcome.merged.push(existing);
                    }
                    existing
                }
                None => {
                    let Some(FetchedEntity::Indicator(info)) = fetched.get(id) else {
                        return expand_err!(Generic, format!("no indicator record for {id}"));
                    };
                    let created =
                        create_indicator_node(staged, config, info.clone(), target_level, requester.node)?;
                    outcome.created.push(created);
                    created
                }
            };
            let target_main = window::ensure_port(staged, target, PortSlot::Main)?;
            extend_port_ids(staged, &target_main, id);
            extend_port_correlations(staged, &target_main, &requester.entity);
            extend_port_correlations(staged, &requester.main_port, id);
            if staged
                .edge_between(&target_main, &requester.main_port)
                .is_none()
            {
                staged.add_edge(&target_main, &requester.main_port)?;
            }
            shift_to_level(staged, config, target, target_level, affected, 0);
        }
        UpstreamRef::Table { id, fields } => {
            let target = match staged.node_id_by_entity(id) {
                Some(existing) => {
                    if !outcome.merged.contains(&existing) {
                        outcome.merged.push(existing);
                    }
                    existing
                }
                None => {
                    let Some(FetchedEntity::Table(info)) = fetched.get(id) else {
                        return expand_err!(Generic, format!("no table record for {id}"));
                    };
                    let created =
                        create_table_node(staged, config, info.clone(), target_level, requester.node);
                    outcome.created.push(created);
                    created
                }
            };
            if fields.is_empty() {
                window::attach_table_correlation(
                    staged,
                    config,
                    target,
                    None,
                    &requester.main_port,
                    &requester.entity,
                )?;
            } else {
                for field in fields {
                    window::attach_table_correlation(
                        staged,
                        config,
                        target,
                        Some(field),
                        &requester.main_port,
                        &requester.entity,
                    )?;
                }
            }
            shift_to_level(staged, config, target, target_level, affected, 0);
        }
    }
    Ok(())
}

/// Deepens `node_id` to at least `min_level`, then requires everything
/// upstream of it to sit strictly deeper, recursively.  Already-deep
/// nodes stop the walk; a depth guard turns a reference cycle into a
/// warning instead of an unbounded climb.
fn shift_to_level(
    staged: &mut GraphRegistry,
    config: &LayoutConfig,
    node_id: NodeId,
    min_level: u32,
    affected: &mut BTreeSet<u32>,
    depth: usize,
) {
    if depth > staged.node_count() {
        warn!("level-shift cycle detected at {node_id}");
        return;
    }
    let Some(node) = staged.node(&node_id) else {
        return;
    };
    if node.level >= min_level {
        return;
    }
    let old_level = node.level;
    affected.insert(old_level);
    affected.insert(min_level);
    let column = staged.nodes_on_level(min_level).count() as u32;
    if let Some(node) = staged.node_mut(&node_id) {
        node.level = min_level;
        node.column = column;
        node.x = config.level_x(min_level);
    }
    debug!("shift {node_id}: level {old_level} -> {min_level}");
    for upstream in staged.upstream_neighbors(&node_id) {
        shift_to_level(staged, config, upstream, min_level + 1, affected, depth + 1);
    }
}
