// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Read-only view structs handed to the rendering layer after each
//! mutation.

use serde::Serialize;

use crate::common::{EdgeId, EntityId, Error, ErrorCode, ErrorKind, NodeId, PortId, Result};
use crate::datamodel::element::{ExpandState, Node, NodeContent, PortSlot};
use crate::layout::LayoutConfig;
use crate::registry::GraphRegistry;
use crate::window;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeView>,
    pub ports: Vec<PortView>,
    pub edges: Vec<EdgeView>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub entity_id: EntityId,
    pub kind: String,
    pub name: String,
    pub level: u32,
    pub column: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub expand: ExpandState,
    pub selected_ids: Vec<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageView>,
}

/// Pagination state of one table node's field window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub offset: u32,
    pub page_count: usize,
    pub visible_fields: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PortView {
    pub id: PortId,
    pub node: NodeId,
    pub slot: PortSlot,
    pub ids: Vec<EntityId>,
    pub correlation_ids: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    pub id: EdgeId,
    pub source_node: NodeId,
    pub source_port: PortId,
    pub target_node: NodeId,
    pub target_port: PortId,
    pub highlighted: bool,
}

fn node_view(node: &Node, config: &LayoutConfig) -> NodeView {
    let page = match &node.content {
        NodeContent::Table(state) => {
            let len = state.info.fields.len();
            let range =
                window::visible_range(state.page_offset as usize, config.page_size, len);
            Some(PageView {
                offset: state.page_offset,
                page_count: window::page_count(len, config.page_size),
                visible_fields: state.info.fields[range]
                    .iter()
                    .map(|f| f.id.clone())
                    .collect(),
            })
        }
        _ => None,
    };
    NodeView {
        id: node.id,
        entity_id: node.entity_id.clone(),
        kind: node.content.kind_name().to_string(),
        name: node.content.display_name().to_string(),
        level: node.level,
        column: node.column,
        x: node.x,
        y: node.y,
        width: config.node_width,
        height: node.height,
        expand: node.expand,
        selected_ids: node.selected_ids.iter().cloned().collect(),
        page,
    }
}

impl GraphSnapshot {
    pub fn capture(registry: &GraphRegistry, config: &LayoutConfig) -> Self {
        GraphSnapshot {
            nodes: registry
                .nodes()
                .map(|node| node_view(node, config))
                .collect(),
            ports: registry
                .ports()
                .map(|port| PortView {
                    id: port.id.clone(),
                    node: port.node,
                    slot: port.slot.clone(),
                    ids: port.ids.to_vec(),
                    correlation_ids: port.correlation_ids.to_vec(),
                })
                .collect(),
            edges: registry
                .edges()
                .map(|edge| EdgeView {
                    id: edge.id,
                    source_node: edge.source_node,
                    source_port: edge.source_port.clone(),
                    target_node: edge.target_node,
                    target_port: edge.target_port.clone(),
                    highlighted: edge.highlighted,
                })
                .collect(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeView> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// JSON rendering for bridge and debugging use.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| {
            Error::new(
                ErrorKind::Registry,
                ErrorCode::Generic,
                Some(err.to_string()),
            )
        })
    }
}
