//! Story Engine: branching visual-novel stories as a DAG of nodes.
//!
//! A design document describes the graph; a line-oriented script gives each
//! node its playable content. The engine validates the graph, builds the
//! memory each node's content is generated from, parses scripts into typed
//! instruction streams, and plays them back one suspension point at a time.

pub mod core;
pub mod schema;
