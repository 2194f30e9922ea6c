// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;
use std::ops::Range;

use log::{debug, warn};

use crate::common::{EntityId, Error, ErrorCode, ErrorKind, NodeId, PortId, Result};
use crate::datamodel::element::{Port, PortSlot};
use crate::layout::{self, LayoutConfig};
use crate::registry::{GraphRegistry, PortExtend};
use crate::registry_err;

/// Which region of the field window an absolute index falls in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WindowSlot {
    /// folded into the shared previous-page port
    Prev,
    /// its own row within the visible page
    Row(usize),
    /// folded into the shared next-page port
    Next,
}

pub fn slot_for(index: usize, offset: usize, page_size: usize) -> WindowSlot {
    if index < offset * page_size {
        WindowSlot::Prev
    } else if index >= (offset + 1) * page_size {
        WindowSlot::Next
    } else {
        WindowSlot::Row(index)
    }
}

/// Absolute indices of the fields visible at `offset`.
pub fn visible_range(offset: usize, page_size: usize, len: usize) -> Range<usize> {
    let start = (offset * page_size).min(len);
    let end = (start + page_size).min(len);
    start..end
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size).max(1)
}

/// Creates the slot's port on `node` if it does not exist yet and returns
/// its id.
pub(crate) fn ensure_port(
    registry: &mut GraphRegistry,
    node: NodeId,
    slot: PortSlot,
) -> Result<PortId> {
    let pid = slot.port_id(node);
    if !registry.has_port(&pid) {
        registry.add_port(Port::new(node, slot))?;
    }
    Ok(pid)
}

fn extend_missing(registry: &mut GraphRegistry, pid: &PortId, extend: PortExtend) {
    let Some(port) = registry.port(pid) else {
        return;
    };
    let ids: Vec<EntityId> = extend
        .ids
        .into_iter()
        .filter(|id| !port.ids.contains(id))
        .collect();
    let correlation_ids: Vec<EntityId> = extend
        .correlation_ids
        .into_iter()
        .filter(|id| !port.correlation_ids.contains(id))
        .collect();
    if ids.is_empty() && correlation_ids.is_empty() {
        return;
    }
    registry.update_port_info(
        Some(pid),
        PortExtend {
            ids,
            correlation_ids,
            edge_ids: vec![],
        },
    );
}

/// Binds one correlation between a table node and a far (downstream)
/// port: resolves the field's window slot (the table header when
/// `subject` is `None` or names an unknown field), creates the slot port
/// on demand, records ids/correlations on both ends, and adds the edge if
/// the pair is not already connected.
pub(crate) fn attach_table_correlation(
    registry: &mut GraphRegistry,
    config: &LayoutConfig,
    table_node: NodeId,
    subject: Option<&EntityId>,
    far_port: &PortId,
    far_entity: &EntityId,
) -> Result<()> {
    let (slot, represented) = {
        let Some(node) = registry.node(&table_node) else {
            return registry_err!(NodeNotFound, table_node.to_string());
        };
        let Some(state) = node.content.table() else {
            return Err(Error::new(
                ErrorKind::Registry,
                ErrorCode::WrongNodeKind,
                Some(format!("{table_node} is not a table")),
            ));
        };
        let table_id = state.info.id.clone();
        match subject {
            None => (PortSlot::Header, table_id),
            Some(field_id) => match state.info.field_index(field_id) {
                Some(index) => {
                    let slot = match slot_for(index, state.page_offset as usize, config.page_size) {
                        WindowSlot::Prev => PortSlot::Prev,
                        WindowSlot::Next => PortSlot::Next,
                        WindowSlot::Row(_) => PortSlot::Row(field_id.clone()),
                    };
                    (slot, field_id.clone())
                }
                None => {
                    warn!("field {field_id} not in table {table_id}; binding to header");
                    (PortSlot::Header, table_id)
                }
            },
        }
    };

    let table_port = ensure_port(registry, table_node, slot)?;
    extend_missing(
        registry,
        &table_port,
        PortExtend {
            ids: vec![represented.clone()],
            correlation_ids: vec![far_entity.clone()],
            edge_ids: vec![],
        },
    );
    extend_missing(registry, far_port, PortExtend::correlations(vec![represented]));

    if registry.edge_between(&table_port, far_port).is_none() {
        registry.add_edge(&table_port, far_port)?;
    }
    Ok(())
}

/// Moves a table node to a new page.  All of the node's ports and every
/// edge touching it are destroyed, then rebuilt from the far-side
/// correlations that survive the wipe, so no stale port or edge can
/// outlive a page turn.
pub fn change_page(
    registry: &mut GraphRegistry,
    config: &LayoutConfig,
    node_id: &NodeId,
    new_offset: u32,
) -> Result<()> {
    let (level, field_ids, table_id, current_offset, pages) = {
        let Some(node) = registry.node(node_id) else {
            return registry_err!(NodeNotFound, node_id.to_string());
        };
        let Some(state) = node.content.table() else {
            return Err(Error::new(
                ErrorKind::Registry,
                ErrorCode::WrongNodeKind,
                Some(format!("page change on {} ({})", node_id, node.content.kind_name())),
            ));
        };
        let field_ids: BTreeSet<EntityId> =
            state.info.fields.iter().map(|f| f.id.clone()).collect();
        (
            node.level,
            field_ids,
            state.info.id.clone(),
            state.page_offset,
            page_count(state.info.fields.len(), config.page_size),
        )
    };

    let mut offset = new_offset;
    let max_offset = (pages - 1) as u32;
    if offset > max_offset {
        debug!("page offset {offset} clamped to {max_offset} on {node_id}");
        offset = max_offset;
    }
    if offset == current_offset {
        return Ok(());
    }

    // far-side correlations are the rebuild's source of truth
    let mut bindings: Vec<(PortId, EntityId, Vec<EntityId>)> = vec![];
    for port in registry.port_ids() {
        let Some(port) = registry.port(&port) else {
            continue;
        };
        if port.node == *node_id {
            continue;
        }
        let subjects: Vec<EntityId> = port
            .correlation_ids
            .iter()
            .filter(|id| field_ids.contains(*id) || **id == table_id)
            .cloned()
            .collect();
        if subjects.is_empty() {
            continue;
        }
        let far_entity = match registry.node(&port.node) {
            Some(n) => n.entity_id.clone(),
            None => continue,
        };
        bindings.push((port.id.clone(), far_entity, subjects));
    }

    for eid in registry.edges_touching_node(node_id) {
        registry.remove_edge(&eid);
    }
    registry.clear_node_ports(node_id);

    if let Some(node) = registry.node_mut(node_id) {
        node.set_page_offset(offset)?;
    }
    layout::refresh_node_height(registry, config, node_id);

    for (far_port, far_entity, subjects) in bindings {
        for subject in subjects {
            let subject = if subject == table_id { None } else { Some(subject) };
            attach_table_correlation(
                registry,
                config,
                *node_id,
                subject.as_ref(),
                &far_port,
                &far_entity,
            )?;
        }
    }

    layout::relayout_level(registry, config, level);
    debug!("page {current_offset} -> {offset} on {node_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EdgeId;
    use crate::datamodel::IndicatorKind;
    use crate::datamodel::element::{NodeContent, TableState};
    use crate::test_common::{indicator_info, table_info};
    use proptest::prelude::*;

    #[test]
    fn slot_for_splits_window_regions() {
        assert_eq!(WindowSlot::Row(0), slot_for(0, 0, 10));
        assert_eq!(WindowSlot::Row(9), slot_for(9, 0, 10));
        assert_eq!(WindowSlot::Next, slot_for(10, 0, 10));
        assert_eq!(WindowSlot::Prev, slot_for(9, 1, 10));
        assert_eq!(WindowSlot::Row(10), slot_for(10, 1, 10));
        assert_eq!(WindowSlot::Row(19), slot_for(19, 1, 10));
        assert_eq!(WindowSlot::Next, slot_for(20, 1, 10));
    }

    #[test]
    fn page_count_rounds_up_and_floors_at_one() {
        assert_eq!(1, page_count(0, 10));
        assert_eq!(1, page_count(10, 10));
        assert_eq!(2, page_count(11, 10));
        assert_eq!(3, page_count(25, 10));
    }

    fn window_registry(field_count: usize) -> (GraphRegistry, NodeId, NodeId, PortId) {
        let mut reg = GraphRegistry::new();
        let root = reg.add_node(
            NodeContent::from_indicator(indicator_info("I1", IndicatorKind::Atomic)),
            0,
            None,
        );
        let table = reg.add_node(
            NodeContent::Table(TableState {
                info: table_info("T1", field_count),
                page_offset: 0,
            }),
            1,
            Some(root),
        );
        let main = ensure_port(&mut reg, root, PortSlot::Main).unwrap();
        reg.update_port_info(Some(&main), PortExtend::ids(vec!["I1".into()]));
        (reg, root, table, main)
    }

    #[test]
    fn attach_binds_row_fold_and_header_slots() {
        let (mut reg, _root, table, main) = window_registry(25);
        let config = LayoutConfig::default();

        // in-window field gets its own row port
        attach_table_correlation(&mut reg, &config, table, Some(&"T1_F3".into()), &main, &"I1".into())
            .unwrap();
        let row_pid = PortSlot::Row("T1_F3".into()).port_id(table);
        assert!(reg.has_port(&row_pid));
        assert!(reg.port(&row_pid).unwrap().represents(&"T1_F3".into()));

        // out-of-window field folds into the next-page port
        attach_table_correlation(&mut reg, &config, table, Some(&"T1_F20".into()), &main, &"I1".into())
            .unwrap();
        let next_pid = PortSlot::Next.port_id(table);
        assert!(reg.port(&next_pid).unwrap().represents(&"T1_F20".into()));

        // whole-table binding lands on the header
        attach_table_correlation(&mut reg, &config, table, None, &main, &"I1".into()).unwrap();
        assert!(reg.has_port(&PortSlot::Header.port_id(table)));

        // re-attaching is idempotent at the data level
        attach_table_correlation(&mut reg, &config, table, Some(&"T1_F3".into()), &main, &"I1".into())
            .unwrap();
        let row = reg.port(&row_pid).unwrap();
        assert_eq!(1, row.ids.iter().filter(|id| **id == "T1_F3".into()).count());
        assert_eq!(1, row.edge_ids.len());
        assert_eq!(3, reg.edge_count());
    }

    #[test]
    fn change_page_rebuilds_ports_and_edges() {
        let (mut reg, _root, table, main) = window_registry(25);
        let config = LayoutConfig::default();
        for field in ["T1_F2", "T1_F12", "T1_F22"] {
            attach_table_correlation(&mut reg, &config, table, Some(&field.into()), &main, &"I1".into())
                .unwrap();
        }
        let before: Vec<PortId> = reg
            .ports_by_node(&table)
            .into_iter()
            .map(|p| p.id.clone())
            .collect();
        // F12 and F22 share the next-page fold, so two table ports and
        // two deduplicated edges exist on page 0
        assert_eq!(2, before.len());
        let edges_before: Vec<EdgeId> = reg.edges_touching_node(&table);
        assert_eq!(2, edges_before.len());

        change_page(&mut reg, &config, &table, 1).unwrap();

        for pid in &before {
            // F2's row port may not survive the wipe; it lives in the
            // previous-page fold now
            if pid.as_str().contains("field:T1_F2") {
                assert!(!reg.has_port(pid), "stale port {pid}");
            }
        }
        for eid in &edges_before {
            assert!(reg.edge(eid).is_none(), "stale edge {eid}");
        }

        assert_eq!(Some(1), reg.node(&table).unwrap().page_offset());
        assert!(reg.has_port(&PortSlot::Prev.port_id(table)));
        assert!(reg.has_port(&PortSlot::Next.port_id(table)));
        assert!(reg.has_port(&PortSlot::Row("T1_F12".into()).port_id(table)));
        assert!(
            reg.port(&PortSlot::Prev.port_id(table))
                .unwrap()
                .represents(&"T1_F2".into())
        );
        assert!(
            reg.port(&PortSlot::Next.port_id(table))
                .unwrap()
                .represents(&"T1_F22".into())
        );
        assert_eq!(3, reg.edges_touching_node(&table).len());

        // turning back restores the original shape, folds included
        change_page(&mut reg, &config, &table, 0).unwrap();
        assert!(reg.has_port(&PortSlot::Row("T1_F2".into()).port_id(table)));
        let next = reg.port(&PortSlot::Next.port_id(table)).unwrap();
        assert!(next.represents(&"T1_F12".into()));
        assert!(next.represents(&"T1_F22".into()));
        assert_eq!(2, reg.edges_touching_node(&table).len());
    }

    #[test]
    fn change_page_clamps_past_the_last_page() {
        let (mut reg, _root, table, _main) = window_registry(25);
        let config = LayoutConfig::default();
        change_page(&mut reg, &config, &table, 99).unwrap();
        assert_eq!(Some(2), reg.node(&table).unwrap().page_offset());
    }

    #[test]
    fn change_page_rejects_indicators() {
        let (mut reg, root, _table, _main) = window_registry(5);
        let config = LayoutConfig::default();
        let err = change_page(&mut reg, &config, &root, 1).unwrap_err();
        assert_eq!(ErrorCode::WrongNodeKind, err.code);
    }

    proptest! {
        #[test]
        fn slots_partition_every_field(len in 0usize..200, offset in 0usize..25) {
            let page_size = 10;
            let visible = visible_range(offset, page_size, len);
            let mut prev = 0usize;
            let mut rows = 0usize;
            let mut next = 0usize;
            for i in 0..len {
                match slot_for(i, offset, page_size) {
                    WindowSlot::Prev => prev += 1,
                    WindowSlot::Row(at) => {
                        prop_assert!(visible.contains(&at));
                        rows += 1;
                    }
                    WindowSlot::Next => next += 1,
                }
            }
            prop_assert_eq!(visible.len(), rows);
            prop_assert_eq!(len.min(offset * page_size), prev);
            prop_assert_eq!(prev + rows + next, len);
        }

        #[test]
        fn forward_then_back_restores_the_visible_set(len in 11usize..60) {
            let page_size = 10;
            let first: Vec<usize> = visible_range(0, page_size, len).collect();
            let _second: Vec<usize> = visible_range(1, page_size, len).collect();
            let back: Vec<usize> = visible_range(0, page_size, len).collect();
            prop_assert_eq!(first, back);
        }
    }
}
