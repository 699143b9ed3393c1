//! Orso keeps a small relational catalog of bears and their colors readable
//! at memory speed: every mutation is funneled through an in-process FIFO
//! job queue drained by a single background processor, and every successful
//! mutation replaces an immutable, indexed snapshot that serves all reads.
//!
//! Readers never touch the database; writers never touch the snapshot.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod queue;
pub(crate) mod util;
