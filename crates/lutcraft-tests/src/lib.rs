//! Integration test crate for LutCraft.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every library crate to verify they work together.

#[cfg(test)]
mod cpu;

#[cfg(test)]
mod formats;

#[cfg(test)]
mod engine;

#[cfg(test)]
mod gpu;
