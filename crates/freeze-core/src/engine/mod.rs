//! # Engine Module
//!
//! The logic of the freezing pipeline: everything between a validated configuration and a
//! finished density grid.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Volume, placement, rasterization and background
//!   parameters, plus the validating builder
//! - **Spatial Index** ([`spatial_index`]) - Uniform hash grid of accepted bounding spheres
//! - **Placement** ([`placement`]) - Sequential rejection sampling of non-overlapping poses
//! - **Rasterization** ([`rasterize`]) - Kernel accumulation of placed instances onto the
//!   voxel grid, slab-parallel
//! - **Background** ([`background`]) - Vitreous-ice random field synthesis and merging
//! - **Pipeline State** ([`state`]) - The forward-only stage machine of a run
//! - **Reporting** ([`report`], [`progress`]) - Placement outcome and progress events
//! - **Error Handling** ([`error`]) - Engine-level error type
//!
//! ## Randomness
//!
//! No component owns a random generator. Placement and background synthesis both take an
//! `&mut impl Rng`, so a single seeded generator threaded through a run fixes its output.

pub mod background;
pub mod config;
pub mod error;
pub mod placement;
pub mod progress;
pub mod rasterize;
pub mod report;
pub mod spatial_index;
pub mod state;
