//! # Core Models Module
//!
//! Data structures describing what the freezing pipeline places and where it
//! accumulates density.
//!
//! ## Key Components
//!
//! - [`template`] - Immutable entity templates: point contributions with offsets, weights
//!   and kernels
//! - [`pose`] - Rigid world-space poses (rotation followed by translation)
//! - [`instance`] - Placed instances referencing an entity by index
//! - [`bounds`] - Bounding spheres used for overlap testing
//! - [`region`] - Allowed placement sub-volumes (cuboids, cylinders)
//! - [`grid`] - Grid geometry and the dense voxel grid
//! - [`ids`] - Unique identifier types

pub mod bounds;
pub mod grid;
pub mod ids;
pub mod instance;
pub mod pose;
pub mod region;
pub mod template;
