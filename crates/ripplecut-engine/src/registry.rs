//! Command registry and dispatcher.
//!
//! Owns the store connection, the UI timeline cache, the per-command
//! mutation bucket, the undo log, and the last-error channel. Exactly one
//! command executes at a time; each is wrapped in a transaction, recorded
//! in the undo log under an undo-group id, and its bucket is flushed to
//! the UI cache on commit. Nested commands join the caller's transaction
//! and undo group.

use tracing::{debug, warn};
use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_media::{MediaProber, StaticProber};
use ripplecut_store::Store;

use crate::command::{Command, CommandRecord, CommandState, ExecResult};
use crate::commands;
use crate::ripple::RipplePreview;
use crate::ui_state::TimelineState;

/// Project browser collaborator, used by MatchFrame.
pub trait ProjectBrowser {
    fn focus_master_clip(&mut self, master_clip_id: Uuid);
}

/// Default browser: remembers the last focused master clip.
#[derive(Debug, Default)]
pub struct NullBrowser {
    pub focused: Option<Uuid>,
}

impl ProjectBrowser for NullBrowser {
    fn focus_master_clip(&mut self, master_clip_id: Uuid) {
        self.focused = Some(master_clip_id);
    }
}

/// The command engine: executor/undoer/redoer dispatch over one store.
pub struct Engine {
    pub(crate) store: Store,
    pub(crate) ui: TimelineState,
    pub(crate) bucket: crate::bucket::MutationBucket,
    pub(crate) prober: Box<dyn MediaProber>,
    pub(crate) browser: Box<dyn ProjectBrowser>,
    undo_log: Vec<CommandRecord>,
    /// Records `[0, undo_cursor)` are applied; the rest are redoable.
    undo_cursor: usize,
    last_error: Option<String>,
    next_sequence_number: u64,
    group_stack: Vec<Uuid>,
}

impl Engine {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            ui: TimelineState::new(),
            bucket: crate::bucket::MutationBucket::new(),
            prober: Box::new(StaticProber::new()),
            browser: Box::<NullBrowser>::default(),
            undo_log: Vec::new(),
            undo_cursor: 0,
            last_error: None,
            next_sequence_number: 1,
            group_stack: Vec::new(),
        }
    }

    pub fn set_prober(&mut self, prober: Box<dyn MediaProber>) {
        self.prober = prober;
    }

    pub fn set_browser(&mut self, browser: Box<dyn ProjectBrowser>) {
        self.browser = browser;
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn ui(&self) -> &TimelineState {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut TimelineState {
        &mut self.ui
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_last_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn can_undo(&self) -> bool {
        self.undo_cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.undo_cursor < self.undo_log.len()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_cursor
    }

    pub fn redo_count(&self) -> usize {
        self.undo_log.len() - self.undo_cursor
    }

    /// The applied undo-log slice, with persisted parameter state. A
    /// fresh engine over the same initial store replays it to the same
    /// final store.
    pub fn log_records(&self) -> &[CommandRecord] {
        &self.undo_log[..self.undo_cursor]
    }

    /// Name of the command the next `undo` would revert.
    pub fn undo_description(&self) -> Option<&'static str> {
        self.undo_cursor
            .checked_sub(1)
            .and_then(|i| self.undo_log.get(i))
            .map(|r| r.command.spec().name)
    }

    /// Execute one command. Never panics; failures surface through
    /// `last_error` and the returned result.
    pub fn execute(&mut self, command: Command) -> ExecResult {
        let spec = command.spec();
        let dry_run = command.is_dry_run();
        let top_level = self.group_stack.is_empty();
        if top_level {
            self.group_stack.push(Uuid::new_v4());
        }
        let group_id = *self.group_stack.last().unwrap_or(&Uuid::nil());

        let mut record = CommandRecord {
            id: Uuid::new_v4(),
            sequence_number: self.next_sequence_number,
            undo_group_id: Some(group_id),
            command,
            state: CommandState::Empty,
        };
        self.next_sequence_number += 1;

        debug!(command = spec.name, dry_run, "execute");
        let result = self.run_in_transaction(&mut record);
        if top_level {
            self.group_stack.pop();
        }

        match result {
            Ok(preview) => {
                if top_level && !dry_run {
                    // Flush the bucket (including nested commands') to the
                    // UI cache in emission order.
                    self.ui.apply(&mut self.bucket);
                }
                if spec.undoable && !dry_run {
                    self.undo_log.truncate(self.undo_cursor);
                    self.undo_log.push(record);
                    self.undo_cursor = self.undo_log.len();
                }
                match preview {
                    Some(p) => ExecResult::with_preview(p),
                    None => ExecResult::ok(),
                }
            }
            Err(err) => {
                if top_level {
                    self.bucket.clear();
                    // Nested commands already logged under this group are
                    // rolled back with the transaction.
                    self.undo_log
                        .retain(|r| r.undo_group_id != Some(group_id));
                    self.undo_cursor = self.undo_cursor.min(self.undo_log.len());
                }
                let message = err.to_string();
                warn!(command = spec.name, error = %message, "command failed");
                self.set_last_error(message.clone());
                ExecResult::fail(message)
            }
        }
    }

    /// Run a nested command inside the current command's transaction and
    /// undo group (used by Split and BatchCommand).
    pub(crate) fn execute_nested(&mut self, command: Command) -> Result<()> {
        if self.group_stack.is_empty() {
            return Err(EngineError::InvariantViolation(
                "nested execute outside a command".into(),
            ));
        }
        let result = self.execute(command);
        if result.success {
            Ok(())
        } else {
            Err(EngineError::ConstraintViolation(
                result
                    .error_message
                    .unwrap_or_else(|| "nested command failed".into()),
            ))
        }
    }

    fn run_in_transaction(&mut self, record: &mut CommandRecord) -> Result<Option<RipplePreview>> {
        let txn = self.store.begin_transaction()?;
        match self.dispatch(record) {
            Ok(preview) => {
                self.store.commit(txn)?;
                Ok(preview)
            }
            Err(err) => {
                if let Err(rb) = self.store.rollback(txn) {
                    warn!(error = %rb, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Undo the most recent undo group: every command with that group id,
    /// in reverse order, as one atomic unit.
    pub fn undo(&mut self) -> ExecResult {
        if self.undo_cursor == 0 {
            return ExecResult::fail("nothing to undo");
        }
        let group = self.undo_log[self.undo_cursor - 1].undo_group_id;
        let mut first = self.undo_cursor;
        while first > 0 && self.undo_log[first - 1].undo_group_id == group {
            first -= 1;
        }

        let txn = match self.store.begin_transaction() {
            Ok(t) => t,
            Err(e) => return self.fail_with(e),
        };
        for index in (first..self.undo_cursor).rev() {
            let record = self.undo_log[index].clone();
            debug!(command = record.command.spec().name, "undo");
            if let Err(err) = commands::undo_record(self, &record) {
                if let Err(rb) = self.store.rollback(txn) {
                    warn!(error = %rb, "rollback failed");
                }
                self.bucket.clear();
                // The undo log remains pointing at the failed command.
                return self.fail_with(EngineError::UndoFailure(err.to_string()));
            }
        }
        if let Err(e) = self.store.commit(txn) {
            return self.fail_with(e);
        }
        self.ui.apply(&mut self.bucket);
        self.undo_cursor = first;
        ExecResult::ok()
    }

    /// Redo the next undo group by re-executing each command with its
    /// persisted state, so every generated id is reused.
    pub fn redo(&mut self) -> ExecResult {
        if self.undo_cursor >= self.undo_log.len() {
            return ExecResult::fail("nothing to redo");
        }
        let group = self.undo_log[self.undo_cursor].undo_group_id;
        let mut last = self.undo_cursor;
        while last < self.undo_log.len() && self.undo_log[last].undo_group_id == group {
            last += 1;
        }

        let txn = match self.store.begin_transaction() {
            Ok(t) => t,
            Err(e) => return self.fail_with(e),
        };
        for index in self.undo_cursor..last {
            let mut record = self.undo_log[index].clone();
            debug!(command = record.command.spec().name, "redo");
            match self.dispatch(&mut record) {
                Ok(_) => self.undo_log[index] = record,
                Err(err) => {
                    if let Err(rb) = self.store.rollback(txn) {
                        warn!(error = %rb, "rollback failed");
                    }
                    self.bucket.clear();
                    return self.fail_with(err);
                }
            }
        }
        if let Err(e) = self.store.commit(txn) {
            return self.fail_with(e);
        }
        self.ui.apply(&mut self.bucket);
        self.undo_cursor = last;
        ExecResult::ok()
    }

    /// Replay a slice of command records (e.g. a persisted undo log) with
    /// their persisted states, reproducing the same final store.
    pub fn replay(&mut self, records: &[CommandRecord]) -> ExecResult {
        for record in records {
            let mut replayed = record.clone();
            let txn = match self.store.begin_transaction() {
                Ok(t) => t,
                Err(e) => return self.fail_with(e),
            };
            match self.dispatch(&mut replayed) {
                Ok(_) => {
                    if let Err(e) = self.store.commit(txn) {
                        return self.fail_with(e);
                    }
                    self.ui.apply(&mut self.bucket);
                }
                Err(err) => {
                    if let Err(rb) = self.store.rollback(txn) {
                        warn!(error = %rb, "rollback failed");
                    }
                    self.bucket.clear();
                    return self.fail_with(err);
                }
            }
        }
        ExecResult::ok()
    }

    fn fail_with(&mut self, err: EngineError) -> ExecResult {
        let message = err.to_string();
        self.set_last_error(message.clone());
        ExecResult::fail(message)
    }

    fn dispatch(&mut self, record: &mut CommandRecord) -> Result<Option<RipplePreview>> {
        commands::dispatch(self, record)
    }
}
