//! Progressive assembly of streamed 3D scenes.
//!
//! A scene is delivered as a stream of payload chunks: tree node batches,
//! views, meshes, materials, textures, geometries, parametric shapes,
//! annotations and animation data, in whatever order the content service
//! produces them. This crate reconciles those out-of-order, partial and
//! dependent payloads into one consistent scene graph while the transfer
//! is still in progress, so the host can display the model progressively.
//!
//! # Architecture
//!
//! - [`SceneContext`] orchestrates one scene load: it ingests payloads,
//!   tracks per-category pending requests, cascades follow-up requests and
//!   emits deterministic progress and completion milestones.
//! - [`SceneBuilder`] is the mutation sink the context assembles into. The
//!   crate ships [`MemorySceneBuilder`]; a renderer provides its own.
//! - [`geometry`] decodes the binary mesh/geometry wire format.
//! - [`queue`] tracks which resource ids are still pending per category.
//!
//! Transport is not this crate's concern: a loader owns the connection and
//! invokes the context's entry points as responses arrive. Everything is
//! single-threaded and non-blocking.
//!
//! # Example
//!
//! ```ignore
//! use scene_assembly::{MemorySceneBuilder, SceneContext};
//! use serde_json::json;
//!
//! let mut ctx = SceneContext::new(MemorySceneBuilder::new());
//! ctx.events().scene_completed.subscribe(|_| println!("done"));
//!
//! ctx.set_tree_node(json!([{ "sid": "root", "meshId": "7" }]))?;
//! ctx.notify_finished_tree(true)?;
//! ctx.set_mesh(&mesh_bytes)?;
//! # Ok::<(), scene_assembly::SceneError>(())
//! ```

pub mod builder;
pub mod context;
pub mod error;
pub mod event;
pub mod geometry;
pub mod payload;
pub mod queue;

pub use builder::{MemorySceneBuilder, SceneBuilder};
pub use context::{
    LoadPhase, LoadState, ProgressUpdate, RetrievalType, SceneContext, SceneEvents,
};
pub use error::{SceneError, SceneResult};
