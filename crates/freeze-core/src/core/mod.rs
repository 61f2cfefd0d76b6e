//! # Core Module
//!
//! Fundamental building blocks of the freezing pipeline: the data models describing
//! what is placed and where it is accumulated, and the density kernels that turn a point
//! contribution into voxel densities.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Entity templates, poses, placed instances, bounding
//!   volumes, placement regions and the voxel grid
//! - **Density Kernels** ([`kernel`]) - Normalised Gaussian and Gaussian-sum kernels and
//!   their separable voxel sampling
//! - **Utilities** ([`utils`]) - Rotation sampling and geometry helpers
//!
//! ## Scientific Foundation
//!
//! Every point contribution carries a scattering weight that is spread over space by a
//! kernel whose integral equals that weight. Rasterizing a set of placed entities
//! therefore conserves the total scattering mass of the specimen, up to whatever falls
//! outside the grid.

pub mod kernel;
pub mod models;
pub mod utils;
