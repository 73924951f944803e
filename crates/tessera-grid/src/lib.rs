//! Hexagonal grid coordinates for the Tessera client.
//!
//! Everything in this crate is pure: no I/O, no shared state. The entity
//! store keys its spatial index on [`Hex`], and the renderer projects cells
//! to the screen through [`HexLayout`].
//!
//! # Modules
//!
//! - [`hex`] -- Axial coordinates, neighbors, distance, lines, ranges.
//! - [`layout`] -- Pixel projection and its exact inverse.
//! - [`error`] -- Cell-key parse errors.

pub mod error;
pub mod hex;
pub mod layout;

pub use error::GridError;
pub use hex::{Hex, NEIGHBOR_OFFSETS};
pub use layout::{DEFAULT_GRID_PITCH, HexLayout, Point};
