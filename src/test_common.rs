// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Common test infrastructure for building metadata catalogs and seeded
//! registries.
//!
//! This module provides a builder-based API for the fixture records the
//! unit test modules and integration tests share.

use crate::common::NodeId;
use crate::datamodel::element::{NodeContent, PortSlot};
use crate::datamodel::{
    FieldInfo, IndicatorInfo, IndicatorKind, Restriction, TableInfo, WhereInfo,
};
use crate::fetch::StaticCatalog;
use crate::layout::{self, LayoutConfig};
use crate::registry::{GraphRegistry, PortExtend};
use crate::window;

/// Minimal well-formed indicator record; tests mutate the optional
/// fields they care about.
pub fn indicator_info(id: &str, kind: IndicatorKind) -> IndicatorInfo {
    IndicatorInfo {
        id: id.into(),
        kind,
        name: format!("{id} name"),
        expression: None,
        atomic_indicator_id: None,
        where_info: None,
        refer_view_id: None,
        owner: "dana".to_string(),
        department: "analytics".to_string(),
    }
}

/// Table record with `field_count` fields, ids following the
/// `{table}_F{index}` pattern.
pub fn table_info(id: &str, field_count: usize) -> TableInfo {
    TableInfo {
        id: id.into(),
        business_name: format!("{id} table"),
        fields: (0..field_count)
            .map(|i| FieldInfo {
                id: format!("{id}_F{i}").into(),
                business_name: format!("field {i}"),
                data_type: "string".to_string(),
            })
            .collect(),
    }
}

/// Fully-resolved restriction row.
pub fn restriction(label: &str, table: &str, field: &str) -> Restriction {
    Restriction {
        label: label.to_string(),
        table_id: Some(table.into()),
        field_id: Some(field.into()),
    }
}

/// Builder for the static metadata catalogs that back expansion tests.
#[derive(Default)]
pub struct TestCatalog {
    catalog: StaticCatalog,
}

impl TestCatalog {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add an atomic indicator with no bound view.
    pub fn atomic(self, id: &str) -> Self {
        self.push(indicator_info(id, IndicatorKind::Atomic))
    }

    /// Add an atomic indicator reading from `view`.
    pub fn atomic_with_view(self, id: &str, view: &str) -> Self {
        let mut info = indicator_info(id, IndicatorKind::Atomic);
        info.refer_view_id = Some(view.into());
        self.push(info)
    }

    /// Add a derived indicator over `atomic_id` with no where-clause.
    pub fn derived(self, id: &str, atomic_id: &str) -> Self {
        let mut info = indicator_info(id, IndicatorKind::Derived);
        info.atomic_indicator_id = Some(atomic_id.into());
        self.push(info)
    }

    /// Add a derived indicator with an explicit where-clause.
    pub fn derived_where(self, id: &str, atomic_id: &str, where_info: WhereInfo) -> Self {
        let mut info = indicator_info(id, IndicatorKind::Derived);
        info.atomic_indicator_id = Some(atomic_id.into());
        info.where_info = Some(where_info);
        self.push(info)
    }

    /// Add a derived indicator in free-form SQL mode, restricted over
    /// `view`.
    pub fn derived_sql(self, id: &str, atomic_id: &str, view: &str, sql: &str) -> Self {
        let mut info = indicator_info(id, IndicatorKind::Derived);
        info.atomic_indicator_id = Some(atomic_id.into());
        info.where_info = Some(WhereInfo::Sql(sql.to_string()));
        info.refer_view_id = Some(view.into());
        self.push(info)
    }

    /// Add a composite indicator computed by `expression`.
    pub fn composite(self, id: &str, expression: &str) -> Self {
        let mut info = indicator_info(id, IndicatorKind::Composite);
        info.expression = Some(expression.to_string());
        self.push(info)
    }

    /// Add a table with `field_count` generated fields.
    pub fn table(mut self, id: &str, field_count: usize) -> Self {
        self.catalog = self.catalog.with_table(table_info(id, field_count));
        self
    }

    pub fn build(self) -> StaticCatalog {
        self.catalog
    }

    fn push(mut self, info: IndicatorInfo) -> Self {
        self.catalog = self.catalog.with_indicator(info);
        self
    }
}

/// Registry holding a single root node for the catalog's indicator `id`,
/// seeded the way the facade seeds it.
pub fn root_registry(catalog: &StaticCatalog, id: &str) -> (GraphRegistry, NodeId) {
    let entity = id.into();
    let info = catalog
        .indicator(&entity)
        .unwrap_or_else(|| panic!("no indicator {id} in catalog"))
        .clone();
    let config = LayoutConfig::default();
    let mut registry = GraphRegistry::new();
    let node = registry.add_node(NodeContent::from_indicator(info), 0, None);
    layout::refresh_node_height(&mut registry, &config, &node);
    let main = window::ensure_port(&mut registry, node, PortSlot::Main)
        .unwrap_or_else(|err| panic!("seeding root port: {err}"));
    registry.update_port_info(Some(&main), PortExtend::ids(vec![entity]));
    (registry, node)
}
