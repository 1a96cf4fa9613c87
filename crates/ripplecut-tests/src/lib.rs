//! Integration test crate for RippleCut.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on the core, store, model, media, and engine crates to
//! verify the command surface end to end.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod invariants;

#[cfg(test)]
mod scenarios;
