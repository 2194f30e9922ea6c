// Copyright 2026 The Lineage Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

use serde::{Deserialize, Serialize};

/// Backend identifier of an indicator, table, or table field.
///
/// The metadata service hands out ids from a single namespace; the engine
/// never interprets their contents, only compares them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry-allocated node uid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Registry-allocated edge uid.  Edge uids are not stable across a
/// pagination rebuild; only node and port identities are.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub i32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Deterministic port id, derived from the owning node's uid and the
/// port's slot (`"4:main"`, `"7:field:F_AMT"`, `"7:prev"`).  Determinism
/// is what makes check-before-create a plain map lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(String);

impl PortId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        PortId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,      // will never be produced
    DoesNotExist, // the named entity doesn't exist
    DuplicatePort,
    DuplicateEdge,
    NodeNotFound,
    WrongNodeKind,
    FetchFailure,
    Generic,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            DoesNotExist => "does_not_exist",
            DuplicatePort => "duplicate_port",
            DuplicateEdge => "duplicate_edge",
            NodeNotFound => "node_not_found",
            WrongNodeKind => "wrong_node_kind",
            FetchFailure => "fetch_failure",
            Generic => "generic",
        };

        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Registry,
    Expansion,
    Selection,
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Registry => "RegistryError",
            ErrorKind::Expansion => "ExpansionError",
            ErrorKind::Selection => "SelectionError",
            ErrorKind::Fetch => "FetchError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! registry_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Registry,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Registry, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! expand_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Expansion,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Expansion, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! fetch_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Fetch, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Fetch, ErrorCode::$code, None))
    }};
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Registry,
        ErrorCode::DuplicatePort,
        Some("4:main".to_owned()),
    );
    assert_eq!("RegistryError{duplicate_port: 4:main}", format!("{err}"));

    let err = Error::new(ErrorKind::Fetch, ErrorCode::DoesNotExist, None);
    assert_eq!("FetchError{does_not_exist}", format!("{err}"));
}

#[test]
fn test_error_macros() {
    let err: Result<()> = registry_err!(DuplicateEdge, "already bound".to_owned());
    assert_eq!(ErrorCode::DuplicateEdge, err.unwrap_err().code);

    let err: Result<()> = expand_err!(FetchFailure);
    let err = err.unwrap_err();
    assert_eq!(ErrorKind::Expansion, err.kind);
    assert_eq!(None, err.details);
}

#[test]
fn test_id_display() {
    assert_eq!("n3", format!("{}", NodeId(3)));
    assert_eq!("e12", format!("{}", EdgeId(12)));
    assert_eq!("IND_A", format!("{}", EntityId::new("IND_A")));
}
