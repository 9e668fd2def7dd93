//! # wikiforge
//!
//! Command line front end for the wikiforge pipeline engine.
//!
//! All pipeline logic lives in `wikiforge-core`; this crate only parses
//! arguments, layers configuration and prints results.

pub mod cli;
