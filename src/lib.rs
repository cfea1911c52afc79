//! Truck load planning: 2D floor layouts for delivery tours.
//!
//! The engine packs boxes onto truck beds, finds free spots for single boxes,
//! computes the smallest fleet for a load and drives interactive layout
//! editing. The `api` module exposes it over HTTP.

pub mod api;
pub mod capacity;
pub mod config;
pub mod fleet;
pub mod geometry;
pub mod model;
pub mod packer;
pub mod scanner;
pub mod session;
pub mod store;
pub mod types;
