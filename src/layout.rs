// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;

use log::debug;

use crate::common::NodeId;
use crate::datamodel::element::NodeContent;
use crate::registry::GraphRegistry;

pub const NODE_WIDTH: f64 = 240.0;
pub const LEVEL_GAP: f64 = 80.0;
pub const COLUMN_GAP: f64 = 24.0;
pub const HEADER_HEIGHT: f64 = 40.0;
pub const SECTION_TITLE_HEIGHT: f64 = 24.0;
pub const LINE_HEIGHT: f64 = 24.0;
pub const PAD_HEIGHT: f64 = 12.0;
pub const EMPTY_TABLE_HEIGHT: f64 = 120.0;
pub const PAGER_HEIGHT: f64 = 32.0;
pub const EXPR_CHARS_PER_LINE: usize = 28;
pub const EXPR_MAX_LINES: usize = 6;

/// Geometry knobs for node sizing and column placement.
///
/// All values are in logical canvas units.
#[derive(Clone, Debug)]
pub struct LayoutConfig {
    /// Fixed width of every node card.
    pub node_width: f64,
    /// Horizontal space between adjacent dependency levels.
    pub level_gap: f64,
    /// Vertical space between stacked nodes in one column.
    pub column_gap: f64,
    /// Visible field rows per table page.
    pub page_size: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: NODE_WIDTH,
            level_gap: LEVEL_GAP,
            column_gap: COLUMN_GAP,
            page_size: 10,
        }
    }
}

impl LayoutConfig {
    /// X coordinate of every node at `level`; upstream levels grow to the
    /// left of the root anchor at the origin.
    pub fn level_x(&self, level: u32) -> f64 {
        -(level as f64) * (self.node_width + self.level_gap)
    }
}

fn expression_block_height(expression: Option<&str>) -> f64 {
    let Some(expression) = expression else {
        return 0.0;
    };
    let chars = expression.chars().count();
    if chars == 0 {
        return 0.0;
    }
    let lines = chars.div_ceil(EXPR_CHARS_PER_LINE).clamp(1, EXPR_MAX_LINES);
    lines as f64 * LINE_HEIGHT
}

/// Height of a node card, a deterministic function of its content shape.
pub fn node_height(content: &NodeContent, config: &LayoutConfig) -> f64 {
    match content {
        NodeContent::Atomic(info) => {
            HEADER_HEIGHT
                + SECTION_TITLE_HEIGHT
                + expression_block_height(info.expression.as_deref())
                + PAD_HEIGHT
        }
        NodeContent::Derived(info) => {
            let (time_count, biz_count) = info.restriction_counts();
            let mut height = HEADER_HEIGHT + SECTION_TITLE_HEIGHT + LINE_HEIGHT;
            if time_count > 0 {
                height += SECTION_TITLE_HEIGHT + time_count as f64 * LINE_HEIGHT;
            }
            if biz_count > 0 {
                height += SECTION_TITLE_HEIGHT + biz_count as f64 * LINE_HEIGHT;
            }
            height + PAD_HEIGHT
        }
        NodeContent::Composite(info) => {
            let deps = info.expression_dependencies().len();
            HEADER_HEIGHT + SECTION_TITLE_HEIGHT + deps as f64 * LINE_HEIGHT + PAD_HEIGHT
        }
        NodeContent::Table(state) => {
            let fields = state.info.fields.len();
            if fields == 0 {
                EMPTY_TABLE_HEIGHT
            } else if fields <= config.page_size {
                HEADER_HEIGHT + fields as f64 * LINE_HEIGHT + PAD_HEIGHT
            } else {
                HEADER_HEIGHT + config.page_size as f64 * LINE_HEIGHT + PAGER_HEIGHT + PAD_HEIGHT
            }
        }
    }
}

/// Recomputes `height` from the node's current content.
pub fn refresh_node_height(registry: &mut GraphRegistry, config: &LayoutConfig, id: &NodeId) {
    if let Some(node) = registry.node_mut(id) {
        node.height = node_height(&node.content, config);
    }
}

#[derive(Clone, Debug)]
struct Family {
    father: Option<NodeId>,
    order: (i64, u32),
    members: Vec<(NodeId, u32, f64)>, // (id, column, height)
}

/// Re-homes one dependency level: nodes are grouped by the father that
/// created them, each family stacked in column order with `column_gap`,
/// the stack vertically centered on the father and clamped so a stack
/// shorter than its father aligns to the father's top.  A running cursor
/// keeps adjacent families from overlapping.  Levels untouched by a
/// structural change are never revisited.
pub fn relayout_level(registry: &mut GraphRegistry, config: &LayoutConfig, level: u32) {
    if level == 0 {
        let root_id = registry.nodes_on_level(0).map(|n| n.id).next();
        if let Some(root_id) = root_id {
            if let Some(root) = registry.node_mut(&root_id) {
                root.x = 0.0;
                root.y = 0.0;
            }
        }
        return;
    }

    let x = config.level_x(level);
    let mut families: Vec<Family> = vec![];
    for node in registry.nodes_on_level(level) {
        let father = node.father;
        let order = match father.and_then(|fid| registry.node(&fid)) {
            Some(f) => (f.y.round() as i64, f.column),
            // fathers can be gone only for discarded roots; sort them last
            None => (i64::MAX, u32::MAX),
        };
        match families.iter_mut().find(|f| f.father == father) {
            Some(family) => family.members.push((node.id, node.column, node.height)),
            None => families.push(Family {
                father,
                order,
                members: vec![(node.id, node.column, node.height)],
            }),
        }
    }
    families.sort_by_key(|f| f.order);

    let mut cursor = f64::NEG_INFINITY;
    for family in &mut families {
        family.members.sort_by_key(|(_, column, _)| *column);
        let stack_h: f64 = family.members.iter().map(|(_, _, h)| h).sum::<f64>()
            + config.column_gap * (family.members.len().saturating_sub(1)) as f64;

        let start = match family.father.and_then(|fid| registry.node(&fid)) {
            Some(father) => {
                let centered = father.y - (stack_h - father.height).max(0.0) / 2.0;
                centered.max(cursor)
            }
            None => cursor.max(0.0),
        };

        let mut y = start;
        for (id, _, height) in &family.members {
            if let Some(node) = registry.node_mut(id) {
                node.x = x;
                node.y = y;
            }
            y += height + config.column_gap;
        }
        cursor = y;
    }
    debug!("relayout level {level}: {} families at x {x:.1}", families.len());
}

/// Re-homes every affected level, nearest the root first so a family's
/// father already sits at its final y when the family is placed.
pub fn relayout_levels(registry: &mut GraphRegistry, config: &LayoutConfig, levels: &BTreeSet<u32>) {
    for level in levels {
        relayout_level(registry, config, *level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::element::{NodeContent, TableState};
    use crate::datamodel::{IndicatorKind, Restriction, WhereInfo};
    use crate::test_common::{indicator_info, table_info};
    use float_cmp::approx_eq;

    #[test]
    fn default_config_matches_constants() {
        let config = LayoutConfig::default();
        assert!((config.node_width - NODE_WIDTH).abs() < f64::EPSILON);
        assert!((config.level_gap - LEVEL_GAP).abs() < f64::EPSILON);
        assert!((config.column_gap - COLUMN_GAP).abs() < f64::EPSILON);
        assert_eq!(10, config.page_size);
    }

    #[test]
    fn level_x_marches_upstream_leftward() {
        let config = LayoutConfig::default();
        assert!(approx_eq!(f64, 0.0, config.level_x(0)));
        assert!(approx_eq!(f64, -320.0, config.level_x(1)));
        assert!(approx_eq!(f64, -640.0, config.level_x(2)));
    }

    #[test]
    fn atomic_height_depends_on_expression_length() {
        let config = LayoutConfig::default();
        let mut info = indicator_info("A1", IndicatorKind::Atomic);
        let bare = node_height(&NodeContent::Atomic(info.clone()), &config);
        assert!(approx_eq!(
            f64,
            HEADER_HEIGHT + SECTION_TITLE_HEIGHT + PAD_HEIGHT,
            bare
        ));

        info.expression = Some("sum(amount)".to_owned());
        let one_line = node_height(&NodeContent::Atomic(info.clone()), &config);
        assert!(approx_eq!(f64, bare + LINE_HEIGHT, one_line));

        info.expression = Some("x".repeat(EXPR_CHARS_PER_LINE * 2 + 1));
        let three_lines = node_height(&NodeContent::Atomic(info.clone()), &config);
        assert!(approx_eq!(f64, bare + 3.0 * LINE_HEIGHT, three_lines));

        // the estimate saturates rather than growing without bound
        info.expression = Some("x".repeat(EXPR_CHARS_PER_LINE * 40));
        let capped = node_height(&NodeContent::Atomic(info), &config);
        assert!(approx_eq!(
            f64,
            bare + EXPR_MAX_LINES as f64 * LINE_HEIGHT,
            capped
        ));
    }

    #[test]
    fn derived_height_counts_restrictions() {
        let config = LayoutConfig::default();
        let mut info = indicator_info("D1", IndicatorKind::Derived);
        let base = HEADER_HEIGHT + SECTION_TITLE_HEIGHT + LINE_HEIGHT + PAD_HEIGHT;
        assert!(approx_eq!(
            f64,
            base,
            node_height(&NodeContent::Derived(info.clone()), &config)
        ));

        info.where_info = Some(WhereInfo::Structured {
            time: vec![Restriction {
                label: "last 30 days".to_owned(),
                table_id: None,
                field_id: None,
            }],
            business: vec![
                Restriction {
                    label: "region".to_owned(),
                    table_id: None,
                    field_id: None,
                },
                Restriction {
                    label: "channel".to_owned(),
                    table_id: None,
                    field_id: None,
                },
            ],
        });
        let structured = node_height(&NodeContent::Derived(info.clone()), &config);
        assert!(approx_eq!(
            f64,
            base + (SECTION_TITLE_HEIGHT + LINE_HEIGHT) + (SECTION_TITLE_HEIGHT + 2.0 * LINE_HEIGHT),
            structured
        ));

        // SQL mode is approximated as one synthetic restriction per side
        info.where_info = Some(WhereInfo::Sql("dt >= '2026-01-01' and region = 'EMEA'".to_owned()));
        let sql = node_height(&NodeContent::Derived(info), &config);
        assert!(approx_eq!(
            f64,
            base + 2.0 * (SECTION_TITLE_HEIGHT + LINE_HEIGHT),
            sql
        ));
    }

    #[test]
    fn composite_height_counts_unique_dependencies() {
        let config = LayoutConfig::default();
        let mut info = indicator_info("C1", IndicatorKind::Composite);
        info.expression = Some("{{A}} / ({{B}} + {{A}})".to_owned());
        let height = node_height(&NodeContent::Composite(info), &config);
        assert!(approx_eq!(
            f64,
            HEADER_HEIGHT + SECTION_TITLE_HEIGHT + 2.0 * LINE_HEIGHT + PAD_HEIGHT,
            height
        ));
    }

    #[test]
    fn table_height_windows_large_field_lists() {
        let config = LayoutConfig::default();
        let table = |n: usize| {
            NodeContent::Table(TableState {
                info: table_info("T1", n),
                page_offset: 0,
            })
        };
        assert!(approx_eq!(f64, EMPTY_TABLE_HEIGHT, node_height(&table(0), &config)));
        assert!(approx_eq!(
            f64,
            HEADER_HEIGHT + 5.0 * LINE_HEIGHT + PAD_HEIGHT,
            node_height(&table(5), &config)
        ));
        assert!(approx_eq!(
            f64,
            HEADER_HEIGHT + 10.0 * LINE_HEIGHT + PAGER_HEIGHT + PAD_HEIGHT,
            node_height(&table(25), &config)
        ));
    }

    #[test]
    fn relayout_centers_family_on_father() {
        let mut reg = GraphRegistry::new();
        let config = LayoutConfig::default();

        let root = reg.add_node(
            NodeContent::from_indicator(indicator_info("R", IndicatorKind::Composite)),
            0,
            None,
        );
        let a = reg.add_node(
            NodeContent::from_indicator(indicator_info("A", IndicatorKind::Atomic)),
            1,
            Some(root),
        );
        let b = reg.add_node(
            NodeContent::from_indicator(indicator_info("B", IndicatorKind::Atomic)),
            1,
            Some(root),
        );
        for id in [root, a, b] {
            refresh_node_height(&mut reg, &config, &id);
        }
        relayout_level(&mut reg, &config, 0);
        relayout_level(&mut reg, &config, 1);

        let (root_n, a_n, b_n) = (
            reg.node(&root).unwrap().clone(),
            reg.node(&a).unwrap().clone(),
            reg.node(&b).unwrap().clone(),
        );
        assert!(approx_eq!(f64, config.level_x(1), a_n.x));
        assert!(approx_eq!(f64, a_n.x, b_n.x));

        let stack_h = a_n.height + b_n.height + config.column_gap;
        let want_top = root_n.y - (stack_h - root_n.height).max(0.0) / 2.0;
        assert!(approx_eq!(f64, want_top, a_n.y));
        assert!(approx_eq!(f64, a_n.y + a_n.height + config.column_gap, b_n.y));
        // stacked, not overlapping
        assert!(b_n.y >= a_n.y + a_n.height);
    }

    #[test]
    fn relayout_keeps_adjacent_families_apart() {
        let mut reg = GraphRegistry::new();
        let config = LayoutConfig::default();

        let root = reg.add_node(
            NodeContent::from_indicator(indicator_info("R", IndicatorKind::Composite)),
            0,
            None,
        );
        let f1 = reg.add_node(
            NodeContent::from_indicator(indicator_info("F1", IndicatorKind::Derived)),
            1,
            Some(root),
        );
        let f2 = reg.add_node(
            NodeContent::from_indicator(indicator_info("F2", IndicatorKind::Derived)),
            1,
            Some(root),
        );
        let c1 = reg.add_node(
            NodeContent::from_indicator(indicator_info("C1", IndicatorKind::Atomic)),
            2,
            Some(f1),
        );
        let c2 = reg.add_node(
            NodeContent::from_indicator(indicator_info("C2", IndicatorKind::Atomic)),
            2,
            Some(f2),
        );
        for id in [root, f1, f2, c1, c2] {
            refresh_node_height(&mut reg, &config, &id);
        }
        for level in [0, 1, 2] {
            relayout_level(&mut reg, &config, level);
        }

        let (c1_n, c2_n) = (reg.node(&c1).unwrap().clone(), reg.node(&c2).unwrap().clone());
        // second family may not ride above the first family's bottom
        assert!(c2_n.y >= c1_n.y + c1_n.height + config.column_gap - f64::EPSILON);
    }
}
