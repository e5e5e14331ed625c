#![forbid(unsafe_code)]

//! Scaling-meter runtime.
//!
//! Wraps `meter_engine` with persistence, replay, snapshots, session
//! management, drift detection and batch simulation.
//!
//! No scoring logic lives here. Every step goes through the engine.

pub mod proto_types;
pub mod proto_bridge;
pub mod step_store;
pub mod replay;
pub mod snapshot;
pub mod snapshot_codec;
pub mod session;
pub mod drift;
pub mod scenario;
pub mod simulate;
