// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::common::{EntityId, Result};
use crate::datamodel::{IndicatorInfo, TableInfo};
use crate::fetch_err;

/// Source of indicator and table metadata.  The engine only consumes this;
/// the application supplies an implementation backed by its metadata
/// service.  Timeouts and retries belong to the implementation, never to
/// the engine.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fails with `DoesNotExist` for unknown ids.
    async fn fetch_indicator(&self, id: &EntityId) -> Result<IndicatorInfo>;

    /// Fails with `DoesNotExist` for unknown ids.
    async fn fetch_table(&self, id: &EntityId) -> Result<TableInfo>;
}

/// One prefetched upstream record, tagged by what it is.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FetchedEntity {
    Indicator(IndicatorInfo),
    Table(TableInfo),
}

/// In-memory `MetadataFetcher` over two maps.  Useful for demos, offline
/// rendering, and as the fixture base in tests.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    indicators: HashMap<EntityId, IndicatorInfo>,
    tables: HashMap<EntityId, TableInfo>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_indicator(mut self, info: IndicatorInfo) -> Self {
        self.indicators.insert(info.id.clone(), info);
        self
    }

    pub fn with_table(mut self, info: TableInfo) -> Self {
        self.tables.insert(info.id.clone(), info);
        self
    }

    pub fn indicator(&self, id: &EntityId) -> Option<&IndicatorInfo> {
        self.indicators.get(id)
    }

    pub fn table(&self, id: &EntityId) -> Option<&TableInfo> {
        self.tables.get(id)
    }
}

#[async_trait]
impl MetadataFetcher for StaticCatalog {
    async fn fetch_indicator(&self, id: &EntityId) -> Result<IndicatorInfo> {
        match self.indicators.get(id) {
            Some(info) => Ok(info.clone()),
            None => fetch_err!(DoesNotExist, format!("indicator {id}")),
        }
    }

    async fn fetch_table(&self, id: &EntityId) -> Result<TableInfo> {
        match self.tables.get(id) {
            Some(info) => Ok(info.clone()),
            None => fetch_err!(DoesNotExist, format!("table {id}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::datamodel::IndicatorKind;

    #[tokio::test]
    async fn static_catalog_serves_and_misses() {
        let catalog = StaticCatalog::new()
            .with_indicator(IndicatorInfo {
                id: EntityId::new("I1"),
                kind: IndicatorKind::Atomic,
                name: "revenue".to_owned(),
                expression: None,
                atomic_indicator_id: None,
                where_info: None,
                refer_view_id: None,
                owner: "ops".to_owned(),
                department: "finance".to_owned(),
            })
            .with_table(TableInfo {
                id: EntityId::new("T1"),
                business_name: "orders".to_owned(),
                fields: vec![],
            });

        let info = catalog.fetch_indicator(&EntityId::new("I1")).await.unwrap();
        assert_eq!("revenue", info.name);

        let err = catalog
            .fetch_indicator(&EntityId::new("missing"))
            .await
            .unwrap_err();
        assert_eq!(ErrorCode::DoesNotExist, err.code);

        let err = catalog
            .fetch_table(&EntityId::new("missing"))
            .await
            .unwrap_err();
        assert_eq!(ErrorCode::DoesNotExist, err.code);
    }
}
