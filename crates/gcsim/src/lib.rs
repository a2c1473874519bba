//! # gcsim - Synthetic Allocation Workload Engine
//!
//! gcsim generates controlled, reproducible pressure on a memory manager: a
//! configurable mix of short-lived and long-lived, pinned and unpinned, flat
//! and graph-shaped objects, allocated at a target rate and held at a target
//! live size. It does not collect garbage itself and makes no promises about
//! what the memory manager does; it promises the *sequence* of allocation,
//! survival, pinning and shape events its configuration describes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gcsim::{run, Args, SystemCollector};
//!
//! fn main() -> gcsim::Result<()> {
//!     let args = Args::load_from_path("workload.txt".as_ref())?;
//!     let report = run(&args, Arc::new(SystemCollector::new()))?;
//!     print!("{}", report);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! config (flags | text | TOML) ──► Args ──► per_thread_args()
//!                                               │
//!                  ┌────────────────────────────┼───────────────┐
//!                  ▼                            ▼               ▼
//!              Engine 0                     Engine 1   ...  Engine N-1
//!     ┌──────────────────────────┐
//!     │ BucketChooser + Rand     │  draws ObjectSpecs
//!     │ ObjectContext            │  handles, finalizers, counters
//!     │ LiveSet<FlatItem|Graph>  │  retained objects, exact byte total
//!     └──────────────────────────┘
//!                  │ Init → SteadyState → Terminating → Done
//!                  ▼
//!              EngineTotals ──► RunReport (=== STATS === / JSON)
//! ```
//!
//! Engines share nothing except the [`Collector`], which is how a phase
//! requests collections and how the report reads final memory figures.
//!
//! ## Modules
//!
//! - [`bucket`]: size classes and the weighted round-robin chooser
//! - [`random`]: the deterministic generator every engine draws from
//! - [`object`]: flat and graph objects, handles, finalizers
//! - [`live_set`]: the bounded table of retained objects
//! - [`engine`]: the per-thread state machine and graph growth
//! - [`config`]: configuration model, text grammar and flag set
//! - [`collector`]: the memory manager seam
//! - [`runner`] / [`report`]: threads in, summary out

pub mod bucket;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod live_set;
pub mod object;
pub mod random;
pub mod report;
pub mod runner;

pub use bucket::{BucketChooser, BucketSpec, ObjectSpec, SizeRange};
pub use collector::{Collector, Generation, HeapInfo, SystemCollector};
pub use config::flags::FlagArgs;
pub use config::{AllocType, Args, PerThreadArgs, Phase, TestKind};
pub use engine::{Engine, EngineState, EngineTotals};
pub use error::{Result, SimError};
pub use live_set::LiveSet;
pub use object::{Allocatable, FlatItem, GraphItem, ObjectContext};
pub use random::Rand;
pub use report::RunReport;
pub use runner::run;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
