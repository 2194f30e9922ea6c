// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeMap, HashMap};

use log::{error, warn};
use smallvec::SmallVec;

use crate::common::{EdgeId, EntityId, NodeId, PortId, Result};
use crate::datamodel::element::{Edge, ExpandState, Node, NodeContent, Port};
use crate::registry_err;

/// Partial port update; every list is appended (never replaced) onto the
/// target port.
#[derive(Clone, Debug, Default)]
pub struct PortExtend {
    pub ids: Vec<EntityId>,
    pub correlation_ids: Vec<EntityId>,
    pub edge_ids: Vec<EdgeId>,
}

impl PortExtend {
    pub fn ids(ids: Vec<EntityId>) -> Self {
        PortExtend {
            ids,
            ..Default::default()
        }
    }

    pub fn correlations(correlation_ids: Vec<EntityId>) -> Self {
        PortExtend {
            correlation_ids,
            ..Default::default()
        }
    }
}

/// Single source of truth for nodes, ports, and edges and their mutual
/// cross-references.  Pure bookkeeping: referential integrity lives here,
/// expansion/layout/highlight semantics live in their own modules and
/// operate on this arena by id.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GraphRegistry {
    nodes: BTreeMap<NodeId, Node>,
    nodes_by_entity: HashMap<EntityId, NodeId>,
    ports: BTreeMap<PortId, Port>,
    edges: BTreeMap<EdgeId, Edge>,
    next_uid: i32,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn alloc_uid(&mut self) -> i32 {
        self.next_uid += 1;
        self.next_uid
    }

    /// Creates a node wrapping `content` at `level`.  The column index is
    /// the creation-order position within that level; geometry starts
    /// zeroed and is filled in by the layout pass.
    pub fn add_node(&mut self, content: NodeContent, level: u32, father: Option<NodeId>) -> NodeId {
        let entity_id = content.entity_id().clone();
        debug_assert!(
            !self.nodes_by_entity.contains_key(&entity_id),
            "one node per entity: {entity_id}"
        );
        let id = NodeId(self.alloc_uid());
        let column = self.nodes.values().filter(|n| n.level == level).count() as u32;
        let node = Node {
            id,
            entity_id: entity_id.clone(),
            content,
            level,
            column,
            father,
            expand: ExpandState::Collapsed,
            selected_ids: Default::default(),
            x: 0.0,
            y: 0.0,
            height: 0.0,
            ports: vec![],
        };
        self.nodes.insert(id, node);
        self.nodes_by_entity.insert(entity_id, id);
        id
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn node_id_by_entity(&self, entity_id: &EntityId) -> Option<NodeId> {
        self.nodes_by_entity.get(entity_id).copied()
    }

    pub fn node_by_entity(&self, entity_id: &EntityId) -> Option<&Node> {
        self.node_id_by_entity(entity_id)
            .and_then(|id| self.nodes.get(&id))
    }

    /// Nodes in uid (creation) order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_on_level(&self, level: u32) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.level == level)
    }

    /// Inserts a port, appending it to the owning node's port list.
    pub fn add_port(&mut self, port: Port) -> Result<()> {
        if self.ports.contains_key(&port.id) {
            return registry_err!(DuplicatePort, port.id.to_string());
        }
        let Some(node) = self.nodes.get_mut(&port.node) else {
            return registry_err!(NodeNotFound, format!("{} owning {}", port.node, port.id));
        };
        node.ports.push(port.id.clone());
        self.ports.insert(port.id.clone(), port);
        Ok(())
    }

    pub fn port(&self, id: &PortId) -> Option<&Port> {
        self.ports.get(id)
    }

    /// Ports in id order.
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub fn has_port(&self, id: &PortId) -> bool {
        self.ports.contains_key(id)
    }

    /// Merges `extend` into the target port by concatenation.  A missing
    /// or `None` port id is a silent no-op, matching the tolerant contract
    /// callers rely on when an endpoint may not exist yet.
    pub fn update_port_info(&mut self, port_id: Option<&PortId>, extend: PortExtend) {
        let Some(port_id) = port_id else {
            return;
        };
        let Some(port) = self.ports.get_mut(port_id) else {
            warn!("update_port_info: no port {port_id}");
            return;
        };
        port.ids.extend(extend.ids);
        port.correlation_ids.extend(extend.correlation_ids);
        port.edge_ids.extend(extend.edge_ids);
    }

    /// Removes a port from the index and from the owning node's list in
    /// one operation.  Callers remove the port's edges first; a leftover
    /// edge reference is a consistency defect.
    pub fn delete_port(&mut self, id: &PortId) {
        debug_assert!(
            self.edges
                .values()
                .all(|e| e.source_port != *id && e.target_port != *id),
            "deleting port {id} with live edges"
        );
        let Some(port) = self.ports.remove(id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&port.node) {
            node.ports.retain(|pid| pid != id);
        }
    }

    /// Removes every port owned by `node_id`.
    pub fn clear_node_ports(&mut self, node_id: &NodeId) {
        let port_ids = match self.nodes.get_mut(node_id) {
            Some(node) => std::mem::take(&mut node.ports),
            None => return,
        };
        for pid in &port_ids {
            debug_assert!(
                self.edges
                    .values()
                    .all(|e| e.source_port != *pid && e.target_port != *pid),
                "clearing port {pid} with live edges"
            );
            self.ports.remove(pid);
        }
    }

    /// Adds a directed edge between two existing ports.  On success the
    /// new edge id is appended to both endpoint ports.
    pub fn add_edge(&mut self, source_port: &PortId, target_port: &PortId) -> Result<EdgeId> {
        let (source_node, target_node) = match (self.ports.get(source_port), self.ports.get(target_port)) {
            (Some(s), Some(t)) => (s.node, t.node),
            _ => {
                error!("add_edge: missing endpoint {source_port} -> {target_port}");
                return registry_err!(
                    Generic,
                    format!("edge endpoints must exist: {source_port} -> {target_port}")
                );
            }
        };
        if self.edge_between(source_port, target_port).is_some() {
            return registry_err!(
                DuplicateEdge,
                format!("{source_port} -> {target_port}")
            );
        }
        let id = EdgeId(self.alloc_uid());
        self.edges.insert(
            id,
            Edge {
                id,
                source_node,
                source_port: source_port.clone(),
                target_node,
                target_port: target_port.clone(),
                highlighted: false,
            },
        );
        let extend = PortExtend {
            edge_ids: vec![id],
            ..Default::default()
        };
        self.update_port_info(Some(source_port), extend.clone());
        self.update_port_info(Some(target_port), extend);
        Ok(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    /// Edges in uid (creation) order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge_between(&self, source_port: &PortId, target_port: &PortId) -> Option<EdgeId> {
        self.edges
            .values()
            .find(|e| e.source_port == *source_port && e.target_port == *target_port)
            .map(|e| e.id)
    }

    /// Detaches the edge from both endpoint ports and removes it.
    pub fn remove_edge(&mut self, id: &EdgeId) {
        let Some(edge) = self.edges.remove(id) else {
            return;
        };
        for pid in [&edge.source_port, &edge.target_port] {
            if let Some(port) = self.ports.get_mut(pid) {
                port.edge_ids.retain(|eid| eid != id);
            }
        }
    }

    pub fn edges_touching_node(&self, node_id: &NodeId) -> Vec<EdgeId> {
        self.edges
            .values()
            .filter(|e| e.source_node == *node_id || e.target_node == *node_id)
            .map(|e| e.id)
            .collect()
    }

    /// Nodes whose ports correlate with `data_id`, in uid order.
    pub fn find_connected_node_ids(&self, data_id: &EntityId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = vec![];
        for port in self.ports.values() {
            if port.correlation_ids.contains(data_id) && !out.contains(&port.node) {
                out.push(port.node);
            }
        }
        out.sort();
        out
    }

    /// Resolves the node backing `data_id`: either the node's own entity
    /// id or a field id represented by one of its ports.  Fails with
    /// `NodeNotFound` otherwise; an id known only as a correlation is a
    /// consistency violation the caller must treat as such.
    pub fn node_by_data_id(&self, data_id: &EntityId) -> Result<&Node> {
        if let Some(node) = self.node_by_entity(data_id) {
            return Ok(node);
        }
        for port in self.ports.values() {
            if port.represents(data_id) {
                if let Some(node) = self.nodes.get(&port.node) {
                    return Ok(node);
                }
            }
        }
        let dangling = self
            .ports
            .values()
            .any(|p| p.correlation_ids.contains(data_id));
        if dangling {
            registry_err!(NodeNotFound, format!("{data_id} only known as correlation"))
        } else {
            registry_err!(NodeNotFound, data_id.to_string())
        }
    }

    /// Edges whose source (upstream) port represents `data_id`.
    pub fn edges_by_upstream_id(&self, data_id: &EntityId) -> Vec<EdgeId> {
        self.edges
            .values()
            .filter(|e| {
                self.ports
                    .get(&e.source_port)
                    .is_some_and(|p| p.represents(data_id))
            })
            .map(|e| e.id)
            .collect()
    }

    /// Edges whose target (downstream) port represents `data_id`.
    pub fn edges_by_downstream_id(&self, data_id: &EntityId) -> Vec<EdgeId> {
        self.edges
            .values()
            .filter(|e| {
                self.ports
                    .get(&e.target_port)
                    .is_some_and(|p| p.represents(data_id))
            })
            .map(|e| e.id)
            .collect()
    }

    pub fn ports_by_node(&self, node_id: &NodeId) -> Vec<&Port> {
        let Some(node) = self.nodes.get(node_id) else {
            return vec![];
        };
        node.ports
            .iter()
            .filter_map(|pid| self.ports.get(pid))
            .collect()
    }

    /// The first id immediately upstream of `data_id`, if any edge leads
    /// there.
    pub fn next_connected_node_id(&self, data_id: &EntityId) -> Option<EntityId> {
        for eid in self.edges_by_downstream_id(data_id) {
            let edge = self.edges.get(&eid)?;
            if let Some(source) = self.ports.get(&edge.source_port) {
                if let Some(id) = source.ids.first() {
                    return Some(id.clone());
                }
            }
        }
        None
    }

    /// Upstream ids feeding `node_id`: the ids represented by the source
    /// port of every edge that targets one of this node's ports.
    pub fn upstream_ids_of_node(&self, node_id: &NodeId) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = vec![];
        for edge in self.edges.values() {
            if edge.target_node != *node_id {
                continue;
            }
            if let Some(source) = self.ports.get(&edge.source_port) {
                for id in &source.ids {
                    if !out.contains(id) {
                        out.push(id.clone());
                    }
                }
            }
        }
        out
    }

    /// Uids of the nodes at the source end of every edge into `node_id`.
    pub fn upstream_neighbors(&self, node_id: &NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = vec![];
        for edge in self.edges.values() {
            if edge.target_node == *node_id && !out.contains(&edge.source_node) {
                out.push(edge.source_node);
            }
        }
        out
    }

    pub fn clear_node_selected(&mut self) {
        for node in self.nodes.values_mut() {
            node.selected_ids.clear();
        }
    }

    pub fn reset_highlights(&mut self) {
        for edge in self.edges.values_mut() {
            edge.highlighted = false;
        }
    }

    /// Port ids kept as a scratch list by callers that mutate while
    /// iterating.
    pub fn port_ids(&self) -> SmallVec<[PortId; 8]> {
        self.ports.keys().cloned().collect()
    }
}
