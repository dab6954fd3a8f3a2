//! Girder - a dependency graph engine for GitHub issue hierarchies.
//!
//! Girder reads a tree of issues linked by sub-issue relations, parses the
//! "Blocked by" sections in their bodies and answers three questions:
//! which items can be started now ([`ready`]), which one should be started
//! next ([`schedule`]) and whether the graph is sound ([`health`]). It can
//! also record blocking edges on both endpoints ([`deps::writer`]) and
//! create a whole hierarchy from a graph file ([`materialize`]).
//!
//! Remote access goes through the [`tracker::IssueTracker`] seam. The
//! GitHub implementation sits on a retrying [`remote::RemoteClient`]; an
//! in-memory implementation backs the tests.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod config;
pub mod deps;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod health;
pub mod materialize;
pub mod ready;
pub mod remote;
pub mod schedule;
pub mod tracker;

// Public CLI modules (needed by binary)
pub mod app;
pub mod cli;
pub mod output;

pub use error::{Error, Result};
