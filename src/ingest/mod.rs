//! Ingest adapters: pure parsing functions at the boundary between an
//! external log/event source and the core's `Record` model.
//!
//! The reading loops themselves (tailing a container's log stream,
//! consuming from a message bus) are left to external collaborators; the
//! parsing halves are plain, fully tested functions.

pub mod bus;
pub mod container;
