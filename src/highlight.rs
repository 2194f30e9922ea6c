// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;

use log::debug;

use crate::common::{EdgeId, EntityId, Error, ErrorKind, NodeId, Result};
use crate::datamodel::element::ExpandState;
use crate::registry::GraphRegistry;

/// Walks the registry to mark the edges and node selections implied by a
/// click on a field or a dependency link.  Selection is singular and
/// total: every call starts from a clean slate, so the highlighted set
/// after a call is exactly the clicked entity's upstream path across
/// already-expanded ancestors.
pub struct Highlighter<'a> {
    registry: &'a mut GraphRegistry,
}

impl<'a> Highlighter<'a> {
    pub fn new(registry: &'a mut GraphRegistry) -> Self {
        Highlighter { registry }
    }

    /// Selects one field or entity id.  Unknown ids abort the walk with
    /// `NodeNotFound`.
    pub fn select_field(&mut self, id: &EntityId) -> Result<()> {
        self.reset();
        debug!("select field {id}");
        let mut visited = BTreeSet::new();
        self.walk(id, &mut visited)
    }

    /// Selects one dependency link between a downstream indicator and
    /// one of its upstream references: the edges joining the two are
    /// marked, the upstream id is recorded on the downstream node, and
    /// the walk continues upstream from the far end.
    pub fn select_link(&mut self, downstream_id: &EntityId, upstream_id: &EntityId) -> Result<()> {
        self.reset();
        debug!("select link {downstream_id} <- {upstream_id}");
        let downstream = self.resolve(downstream_id)?;

        let joining: Vec<EdgeId> = self
            .registry
            .edges_by_upstream_id(upstream_id)
            .into_iter()
            .filter(|edge_id| {
                self.registry
                    .edge(edge_id)
                    .is_some_and(|edge| edge.target_node == downstream)
            })
            .collect();
        for edge_id in &joining {
            if let Some(edge) = self.registry.edge_mut(edge_id) {
                edge.highlighted = true;
            }
        }
        if let Some(node) = self.registry.node_mut(&downstream) {
            node.selected_ids.insert(upstream_id.clone());
        }

        let mut visited = BTreeSet::new();
        visited.insert(downstream_id.clone());
        self.walk(upstream_id, &mut visited)
    }

    fn reset(&mut self) {
        self.registry.reset_highlights();
        self.registry.clear_node_selected();
    }

    /// A dangling id mid-walk is a registry consistency violation; it is
    /// reported under the gesture's own kind.
    fn resolve(&self, id: &EntityId) -> Result<NodeId> {
        match self.registry.node_by_data_id(id) {
            Ok(node) => Ok(node.id),
            Err(err) => Err(Error::new(ErrorKind::Selection, err.code, err.details)),
        }
    }

    /// One propagation step: select the id on its owning node, and if
    /// that node is expanded, mark its inbound edges and continue from
    /// the ids on their far ends.
    fn walk(&mut self, id: &EntityId, visited: &mut BTreeSet<EntityId>) -> Result<()> {
        if !visited.insert(id.clone()) {
            return Ok(());
        }
        let node_id = self.resolve(id)?;
        let expanded = self
            .registry
            .node(&node_id)
            .is_some_and(|node| node.expand == ExpandState::Expanded);
        if let Some(node) = self.registry.node_mut(&node_id) {
            node.selected_ids.insert(id.clone());
        }
        if !expanded {
            return Ok(());
        }

        let mut inbound: Vec<EdgeId> = vec![];
        let mut upstream: Vec<EntityId> = vec![];
        for port in self.registry.ports_by_node(&node_id) {
            if port.correlation_ids.is_empty() {
                continue;
            }
            for edge_id in &port.edge_ids {
                let Some(edge) = self.registry.edge(edge_id) else {
                    continue;
                };
                if edge.target_port != port.id {
                    continue;
                }
                inbound.push(*edge_id);
                if let Some(source) = self.registry.port(&edge.source_port) {
                    for far_id in &source.ids {
                        if !upstream.contains(far_id) {
                            upstream.push(far_id.clone());
                        }
                    }
                }
            }
        }
        for edge_id in &inbound {
            if let Some(edge) = self.registry.edge_mut(edge_id) {
                edge.highlighted = true;
            }
        }
        for far_id in &upstream {
            self.walk(far_id, visited)?;
        }
        Ok(())
    }
}
