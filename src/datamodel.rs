// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::common::EntityId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Atomic,
    Derived,
    Composite,
}

/// One filter clause of a derived indicator.  Structured clauses usually
/// name the table field they constrain; clauses that constrain nothing
/// fetchable (literal time windows, say) carry only a label.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Restriction {
    pub label: String,
    #[serde(default)]
    pub table_id: Option<EntityId>,
    #[serde(default)]
    pub field_id: Option<EntityId>,
}

/// A derived indicator's where-clause, as the backend reports it: either a
/// structured pair of restriction lists or an opaque SQL fragment.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhereInfo {
    Structured {
        time: Vec<Restriction>,
        business: Vec<Restriction>,
    },
    Sql(String),
}

/// Descriptive record of one indicator, as returned by the metadata
/// service.  Which optional fields are populated depends on `kind`:
/// atomics may carry `refer_view_id`, deriveds carry
/// `atomic_indicator_id` and usually `where_info`, composites carry an
/// `expression` embedding `{{…}}` references.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct IndicatorInfo {
    pub id: EntityId,
    pub kind: IndicatorKind,
    pub name: String,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub atomic_indicator_id: Option<EntityId>,
    #[serde(default)]
    pub where_info: Option<WhereInfo>,
    #[serde(default)]
    pub refer_view_id: Option<EntityId>,
    pub owner: String,
    pub department: String,
}

impl IndicatorInfo {
    /// Count of (time, business) restriction rows the node displays.  A
    /// free-form SQL where-clause counts as one synthetic row on each
    /// side; this is a display approximation, not a parse.
    pub fn restriction_counts(&self) -> (usize, usize) {
        match &self.where_info {
            None => (0, 0),
            Some(WhereInfo::Sql(_)) => (1, 1),
            Some(WhereInfo::Structured { time, business }) => (time.len(), business.len()),
        }
    }

    /// Indicator ids referenced from the expression, deduplicated, in
    /// order of first appearance.
    pub fn expression_dependencies(&self) -> Vec<EntityId> {
        match &self.expression {
            Some(expression) => expression_dependencies(expression),
            None => vec![],
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FieldInfo {
    pub id: EntityId,
    pub business_name: String,
    pub data_type: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TableInfo {
    pub id: EntityId,
    pub business_name: String,
    pub fields: Vec<FieldInfo>,
}

impl TableInfo {
    pub fn field_index(&self, field_id: &EntityId) -> Option<usize> {
        self.fields.iter().position(|f| &f.id == field_id)
    }

    pub fn contains_field(&self, field_id: &EntityId) -> bool {
        self.field_index(field_id).is_some()
    }
}

lazy_static! {
    // matches one {{ ... }} reference; the inner id is trimmed
    static ref SIGIL_RE: Regex = Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap();
}

/// Extracts the ids embedded in a composite expression via the fixed
/// `{{id}}` sigil pattern, deduplicated in order of first appearance.
pub fn expression_dependencies(expression: &str) -> Vec<EntityId> {
    let mut deps: Vec<EntityId> = vec![];
    for caps in SIGIL_RE.captures_iter(expression) {
        let id = EntityId::new(&caps[1]);
        if !deps.contains(&id) {
            deps.push(id);
        }
    }
    deps
}

pub mod element {
    use std::collections::BTreeSet;

    use serde::Serialize;
    use smallvec::SmallVec;

    use super::{IndicatorInfo, IndicatorKind, TableInfo};
    use crate::common::{EdgeId, EntityId, Error, ErrorCode, ErrorKind, NodeId, PortId, Result};

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ExpandState {
        Collapsed,
        Expanding,
        Expanded,
    }

    /// Where on a node a port sits.  Indicators have a single `Main`
    /// connector; tables have a whole-table `Header` connector, one `Row`
    /// per correlated in-window field, and `Prev`/`Next` fold connectors
    /// shared by every correlated field before/after the window.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PortSlot {
        Main,
        Header,
        Row(EntityId),
        Prev,
        Next,
    }

    impl PortSlot {
        pub fn port_id(&self, node: NodeId) -> PortId {
            match self {
                PortSlot::Main => PortId::new(format!("{}:main", node.0)),
                PortSlot::Header => PortId::new(format!("{}:header", node.0)),
                PortSlot::Row(field) => PortId::new(format!("{}:field:{}", node.0, field)),
                PortSlot::Prev => PortId::new(format!("{}:prev", node.0)),
                PortSlot::Next => PortId::new(format!("{}:next", node.0)),
            }
        }
    }

    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct TableState {
        pub info: TableInfo,
        pub page_offset: u32,
    }

    #[derive(Clone, PartialEq, Debug)]
    pub enum NodeContent {
        Atomic(IndicatorInfo),
        Derived(IndicatorInfo),
        Composite(IndicatorInfo),
        Table(TableState),
    }

    impl NodeContent {
        pub fn from_indicator(info: IndicatorInfo) -> NodeContent {
            match info.kind {
                IndicatorKind::Atomic => NodeContent::Atomic(info),
                IndicatorKind::Derived => NodeContent::Derived(info),
                IndicatorKind::Composite => NodeContent::Composite(info),
            }
        }

        pub fn entity_id(&self) -> &EntityId {
            match self {
                NodeContent::Atomic(info) => &info.id,
                NodeContent::Derived(info) => &info.id,
                NodeContent::Composite(info) => &info.id,
                NodeContent::Table(state) => &state.info.id,
            }
        }

        pub fn display_name(&self) -> &str {
            match self {
                NodeContent::Atomic(info) => info.name.as_str(),
                NodeContent::Derived(info) => info.name.as_str(),
                NodeContent::Composite(info) => info.name.as_str(),
                NodeContent::Table(state) => state.info.business_name.as_str(),
            }
        }

        pub fn indicator(&self) -> Option<&IndicatorInfo> {
            match self {
                NodeContent::Atomic(info) => Some(info),
                NodeContent::Derived(info) => Some(info),
                NodeContent::Composite(info) => Some(info),
                NodeContent::Table(_) => None,
            }
        }

        pub fn table(&self) -> Option<&TableState> {
            match self {
                NodeContent::Table(state) => Some(state),
                _ => None,
            }
        }

        pub fn kind_name(&self) -> &'static str {
            match self {
                NodeContent::Atomic(_) => "atomic",
                NodeContent::Derived(_) => "derived",
                NodeContent::Composite(_) => "composite",
                NodeContent::Table(_) => "table",
            }
        }
    }

    /// One visual unit, wrapping exactly one backing entity.
    #[derive(Clone, PartialEq, Debug)]
    pub struct Node {
        pub id: NodeId,
        pub entity_id: EntityId,
        pub content: NodeContent,
        /// 0 = root/anchor; strictly increases moving upstream.
        pub level: u32,
        /// creation-order index within the level
        pub column: u32,
        /// the downstream node whose expansion created this one
        pub father: Option<NodeId>,
        pub expand: ExpandState,
        pub selected_ids: BTreeSet<EntityId>,
        pub x: f64,
        pub y: f64,
        pub height: f64,
        /// owned ports, in creation order
        pub ports: Vec<PortId>,
    }

    impl Node {
        fn wrong_kind(&self, wanted: &str) -> Error {
            Error::new(
                ErrorKind::Registry,
                ErrorCode::WrongNodeKind,
                Some(format!(
                    "{} is {}, not {}",
                    self.id,
                    self.content.kind_name(),
                    wanted
                )),
            )
        }

        pub fn update_atomic(&mut self, info: IndicatorInfo) -> Result<()> {
            match &mut self.content {
                NodeContent::Atomic(existing) => {
                    *existing = info;
                    Ok(())
                }
                _ => Err(self.wrong_kind("atomic")),
            }
        }

        pub fn update_derived(&mut self, info: IndicatorInfo) -> Result<()> {
            match &mut self.content {
                NodeContent::Derived(existing) => {
                    *existing = info;
                    Ok(())
                }
                _ => Err(self.wrong_kind("derived")),
            }
        }

        pub fn update_composite(&mut self, info: IndicatorInfo) -> Result<()> {
            match &mut self.content {
                NodeContent::Composite(existing) => {
                    *existing = info;
                    Ok(())
                }
                _ => Err(self.wrong_kind("composite")),
            }
        }

        pub fn update_table(&mut self, info: TableInfo) -> Result<()> {
            match &mut self.content {
                NodeContent::Table(state) => {
                    state.info = info;
                    Ok(())
                }
                _ => Err(self.wrong_kind("table")),
            }
        }

        pub fn set_page_offset(&mut self, page_offset: u32) -> Result<()> {
            match &mut self.content {
                NodeContent::Table(state) => {
                    state.page_offset = page_offset;
                    Ok(())
                }
                _ => Err(self.wrong_kind("table")),
            }
        }

        pub fn page_offset(&self) -> Option<u32> {
            self.content.table().map(|state| state.page_offset)
        }

        pub fn is_table(&self) -> bool {
            matches!(self.content, NodeContent::Table(_))
        }
    }

    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct Port {
        pub id: PortId,
        pub node: NodeId,
        pub slot: PortSlot,
        /// entity/field ids this port currently represents; more than one
        /// only on header/fold ports
        pub ids: SmallVec<[EntityId; 2]>,
        /// ids on the other end of every edge terminating here
        pub correlation_ids: SmallVec<[EntityId; 2]>,
        pub edge_ids: SmallVec<[EdgeId; 4]>,
    }

    impl Port {
        pub fn new(node: NodeId, slot: PortSlot) -> Port {
            Port {
                id: slot.port_id(node),
                node,
                slot,
                ids: SmallVec::new(),
                correlation_ids: SmallVec::new(),
                edge_ids: SmallVec::new(),
            }
        }

        pub fn represents(&self, id: &EntityId) -> bool {
            self.ids.contains(id)
        }
    }

    /// A directed lineage link: source is the upstream end, target the
    /// downstream end.
    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct Edge {
        pub id: EdgeId,
        pub source_node: NodeId,
        pub source_port: PortId,
        pub target_node: NodeId,
        pub target_port: PortId,
        pub highlighted: bool,
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::common::ErrorCode;

        fn table_node() -> Node {
            Node {
                id: NodeId(7),
                entity_id: EntityId::new("T1"),
                content: NodeContent::Table(TableState {
                    info: TableInfo {
                        id: EntityId::new("T1"),
                        business_name: "orders".to_owned(),
                        fields: vec![],
                    },
                    page_offset: 0,
                }),
                level: 1,
                column: 0,
                father: Some(NodeId(1)),
                expand: ExpandState::Collapsed,
                selected_ids: BTreeSet::new(),
                x: 0.0,
                y: 0.0,
                height: 0.0,
                ports: vec![],
            }
        }

        #[test]
        fn port_ids_are_slot_derived() {
            assert_eq!(
                "7:field:F1",
                PortSlot::Row(EntityId::new("F1"))
                    .port_id(NodeId(7))
                    .as_str()
            );
            assert_eq!("7:prev", PortSlot::Prev.port_id(NodeId(7)).as_str());
            assert_eq!("4:main", PortSlot::Main.port_id(NodeId(4)).as_str());
        }

        #[test]
        fn typed_updates_enforce_variant() {
            let mut node = table_node();
            assert!(node.set_page_offset(2).is_ok());
            assert_eq!(Some(2), node.page_offset());

            let err = node
                .update_atomic(IndicatorInfo {
                    id: EntityId::new("I1"),
                    kind: IndicatorKind::Atomic,
                    name: "n".to_owned(),
                    expression: None,
                    atomic_indicator_id: None,
                    where_info: None,
                    refer_view_id: None,
                    owner: "o".to_owned(),
                    department: "d".to_owned(),
                })
                .unwrap_err();
            assert_eq!(ErrorCode::WrongNodeKind, err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_dependencies_are_deduped_in_order() {
        let deps = expression_dependencies("{{A}} + {{ B }} * ({{A}} - {{C}})");
        let want: Vec<EntityId> = ["A", "B", "C"].iter().map(|s| EntityId::new(*s)).collect();
        assert_eq!(want, deps);
    }

    #[test]
    fn expression_dependencies_ignores_malformed_sigils() {
        assert!(expression_dependencies("{A} + {{}} + plain").is_empty());
        assert_eq!(
            vec![EntityId::new("X")],
            expression_dependencies("{{X}} + {notref}")
        );
    }

    #[test]
    fn restriction_counts_follow_where_info_shape() {
        let mut info = IndicatorInfo {
            id: EntityId::new("D1"),
            kind: IndicatorKind::Derived,
            name: "margin".to_owned(),
            expression: None,
            atomic_indicator_id: Some(EntityId::new("A1")),
            where_info: None,
            refer_view_id: None,
            owner: "ops".to_owned(),
            department: "finance".to_owned(),
        };
        assert_eq!((0, 0), info.restriction_counts());

        info.where_info = Some(WhereInfo::Structured {
            time: vec![Restriction {
                label: "last 30 days".to_owned(),
                table_id: None,
                field_id: None,
            }],
            business: vec![
                Restriction {
                    label: "region = EMEA".to_owned(),
                    table_id: Some(EntityId::new("T1")),
                    field_id: Some(EntityId::new("F_REGION")),
                },
                Restriction {
                    label: "channel = web".to_owned(),
                    table_id: Some(EntityId::new("T1")),
                    field_id: Some(EntityId::new("F_CHANNEL")),
                },
            ],
        });
        assert_eq!((1, 2), info.restriction_counts());

        info.where_info = Some(WhereInfo::Sql("dt > '2026-01-01'".to_owned()));
        assert_eq!((1, 1), info.restriction_counts());
    }

    #[test]
    fn where_info_deserializes_both_shapes() {
        let sql: WhereInfo = serde_json::from_str("\"a = 1\"").unwrap();
        assert_eq!(WhereInfo::Sql("a = 1".to_owned()), sql);

        let structured: WhereInfo = serde_json::from_str(
            r#"{"time": [{"label": "last 7 days"}], "business": []}"#,
        )
        .unwrap();
        match structured {
            WhereInfo::Structured { time, business } => {
                assert_eq!(1, time.len());
                assert!(business.is_empty());
            }
            _ => panic!("expected structured where_info"),
        }
    }
}
