//! # Workflows Module
//!
//! Top-level entry points of the library. A workflow takes caller-owned templates and a
//! validated configuration, drives every engine stage in order and returns the result.
//!
//! - **Freeze Workflow** ([`freeze`]) - Placement, rasterization and background merge of
//!   one frozen specimen volume.

pub mod freeze;
