// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

//! Incremental lineage-graph engine for indicator/table ancestry views.
//!
//! The crate tracks nodes, field-level ports, and directed lineage edges
//! in a [`registry::GraphRegistry`], expands a node's upstream ancestry
//! on demand through a [`fetch::MetadataFetcher`], lays levels out
//! without overlap, windows large table field lists into a fixed page of
//! ports, and propagates field-click highlights across expanded
//! ancestors.  [`LineageGraph`] ties those pieces together behind one
//! gesture-level API.

pub mod common;
pub mod datamodel;
pub mod expand;
pub mod fetch;
pub mod graph;
pub mod highlight;
pub mod layout;
pub mod registry;
pub mod snapshot;
pub mod window;

#[cfg(any(test, feature = "testing"))]
pub mod test_common;

// Re-export the gesture-level surface
pub use common::{EdgeId, EntityId, Error, ErrorCode, ErrorKind, NodeId, PortId, Result};
pub use expand::ExpandOutcome;
pub use fetch::{MetadataFetcher, StaticCatalog};
pub use graph::LineageGraph;
pub use layout::LayoutConfig;
pub use snapshot::GraphSnapshot;
