// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The gesture-level facade the rendering layer drives.
//!
//! One `LineageGraph` owns the registry, the metadata fetcher, and the
//! layout configuration for a viewing session.  Every user gesture maps
//! to one method; after each mutating call the caller takes a fresh
//! [`GraphSnapshot`] and redraws.

use log::debug;

use crate::common::{EntityId, NodeId, Result};
use crate::datamodel::element::{NodeContent, PortSlot};
use crate::expand::{ExpandOutcome, Expander};
use crate::fetch::MetadataFetcher;
use crate::highlight::Highlighter;
use crate::layout::{self, LayoutConfig};
use crate::registry::{GraphRegistry, PortExtend};
use crate::registry_err;
use crate::snapshot::GraphSnapshot;
use crate::window;

pub struct LineageGraph<F: MetadataFetcher> {
    registry: GraphRegistry,
    fetcher: F,
    config: LayoutConfig,
    root: Option<NodeId>,
}

impl<F: MetadataFetcher> LineageGraph<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, LayoutConfig::default())
    }

    pub fn with_config(fetcher: F, config: LayoutConfig) -> Self {
        LineageGraph {
            registry: GraphRegistry::new(),
            fetcher,
            config,
            root: None,
        }
    }

    /// Clears the session and anchors the graph on `id`'s indicator.
    /// The previous graph survives an unresolvable root.
    pub async fn set_root(&mut self, id: EntityId) -> Result<NodeId> {
        let info = self.fetcher.fetch_indicator(&id).await?;
        debug!("set root {id}");

        self.registry = GraphRegistry::new();
        let node = self
            .registry
            .add_node(NodeContent::from_indicator(info), 0, None);
        layout::refresh_node_height(&mut self.registry, &self.config, &node);
        let main = window::ensure_port(&mut self.registry, node, PortSlot::Main)?;
        self.registry
            .update_port_info(Some(&main), PortExtend::ids(vec![id]));
        layout::relayout_level(&mut self.registry, &self.config, 0);
        self.root = Some(node);
        Ok(node)
    }

    /// Expand-toggle gesture on a node.
    pub async fn expand_upstream(&mut self, node: NodeId) -> Result<ExpandOutcome> {
        Expander::new(&mut self.registry, &self.fetcher, &self.config)
            .expand(node)
            .await
    }

    /// Field-click gesture in a node's detail panel.
    pub fn select_field(&mut self, id: &EntityId) -> Result<()> {
        Highlighter::new(&mut self.registry).select_field(id)
    }

    /// Dependency-link click gesture between two indicators.
    pub fn select_link(&mut self, downstream: &EntityId, upstream: &EntityId) -> Result<()> {
        Highlighter::new(&mut self.registry).select_link(downstream, upstream)
    }

    /// Node-body click gesture: selects the node's backing entity.
    pub fn click_node(&mut self, node: NodeId) -> Result<()> {
        let Some(found) = self.registry.node(&node) else {
            return registry_err!(NodeNotFound, node.to_string());
        };
        let entity = found.entity_id.clone();
        self.select_field(&entity)
    }

    /// Pager gesture on a table node.
    pub fn change_page(&mut self, node: NodeId, offset: u32) -> Result<()> {
        window::change_page(&mut self.registry, &self.config, &node, offset)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(&self.registry, &self.config)
    }

    pub fn registry(&self) -> &GraphRegistry {
        &self.registry
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }
}
