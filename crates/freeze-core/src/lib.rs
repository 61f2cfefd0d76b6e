//! # Freeze Core Library
//!
//! Synthesis of volumetric density maps for frozen cryo-EM specimens: discrete entities
//! (atoms or coarse-grained particles) are placed into a bounded volume without overlap,
//! rasterized onto a regular voxel grid through mass-conserving Gaussian kernels, and
//! embedded in a stochastic vitreous-ice background.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`EntityTemplate`, `Pose`,
//!   `VoxelGrid`, `BoundingSphere`, `PlacementRegion`) and the density kernel library.
//!
//! - **[`engine`]: The Logic Core.** Configuration and validation, the spatial index,
//!   the placement engine, the grid rasterizer, the ice/background synthesizer and the
//!   pipeline state machine.
//!
//! - **[`workflows`]: The Public API.** [`workflows::freeze::run`] executes the complete
//!   placement → rasterization → background pipeline and hands back the finished grid
//!   together with a placement report.

pub mod core;
pub mod engine;
pub mod workflows;
