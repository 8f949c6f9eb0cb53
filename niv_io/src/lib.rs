//! # niv_io - Buffer registry and load/save coordination
//!
//! [`IoCoordinator`] owns the [`BufferList`], decides whether a load or
//! save runs inline or on a worker thread, and reconciles worker
//! completions with the buffers they belong to.

pub mod buffer;
pub mod collaborators;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod registry;

pub use buffer::{Buffer, BufferId, LifeState, ViewState, WorkerKind};
pub use collaborators::{Choice, Dialogs, Extension, NoExtension};
pub use coordinator::{ExternalChange, IoCoordinator, OpenFlags, SaveStatus};
pub use error::{IoError, IoResult};
pub use events::IoEvent;
pub use registry::{BufferList, InFlight};
