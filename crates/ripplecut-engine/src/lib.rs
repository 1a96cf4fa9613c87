//! RippleCut engine - command execution and timeline mutation
//!
//! Turns each user intent (split, overwrite, insert, nudge, ripple trim,
//! rename, delete, toggle, import) into a deterministic, undoable mutation
//! of the persisted clip graph. The dispatcher wraps every command in a
//! transaction, records it in the undo log, and flushes the per-command
//! mutation bucket to the UI timeline cache on commit.

pub mod bucket;
pub mod command;
pub mod commands;
pub mod registry;
pub mod ripple;
pub mod ui_state;
pub mod undo;

pub use bucket::{BulkShiftBlock, ClipInsert, ClipUpdate, MutationBucket, SequenceMeta};
pub use command::{Command, CommandRecord, CommandSpec, ExecResult, RateValue};
pub use registry::{Engine, NullBrowser, ProjectBrowser};
pub use ripple::{EdgeSelector, EdgeType, RipplePreview, TrimType};
pub use ui_state::TimelineState;
