//! fraudgraph-core: relationship-graph fraud and coordinated-abuse engine.
//!
//! The engine maintains a weighted, typed relationship graph between
//! accounts, decays it over time, and runs two detectors over snapshots of
//! it: collusion rings (strongly-connected, isolated groups sharing devices
//! and payment loops) and spam clusters (burst-registered, near-identical,
//! mass-messaging accounts). Detected clusters are scored into risk bands,
//! enforced with graduated reversible restrictions, and surfaced to human
//! moderators as cases.
//!
//! Everything is deterministic: detection is a pure function of the graph
//! snapshot and config, all iteration is order-stable, and the pipeline
//! takes its clock as a parameter.

pub mod case_manager;
pub mod cluster;
pub mod config;
pub mod enforcement;
pub mod error;
pub mod events;
pub mod graph;
pub mod pipeline;
pub mod ring_detector;
pub mod risk;
pub mod signal;
pub mod spam_detector;
pub mod store;
pub mod types;
