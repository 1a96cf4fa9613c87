//! Typed command surface.
//!
//! One variant per command name; the serde tag keeps the wire names
//! stable for scripting and replay. Executors persist whatever undo and
//! deterministic re-execution need into the record's [`CommandState`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::{FrameRate, TimeValue};
use ripplecut_model::{Bin, Clip, Property, Sequence, Track, TrackKind};

use crate::ripple::{EdgeSelector, RipplePreview};
use crate::undo::MutationLedger;

/// A frame rate as external callers write it: `30`, or `{num, den}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateValue {
    Pair { num: u32, den: u32 },
    Fps(u32),
}

impl RateValue {
    pub fn to_rate(self) -> FrameRate {
        match self {
            RateValue::Pair { num, den } => FrameRate::new(num.max(1), den.max(1)),
            RateValue::Fps(fps) => FrameRate::new(fps.max(1), 1),
        }
    }
}

/// The command surface. The wire shape is the classic command record,
/// `{"name": ..., "parameters": {...}}`; aliases keep legacy names
/// routable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", content = "parameters")]
pub enum Command {
    CreateProject {
        name: String,
    },
    LoadProject {
        project_id: Uuid,
    },
    CreateSequence {
        project_id: Uuid,
        name: String,
        frame_rate: RateValue,
        width: u32,
        height: u32,
    },
    SetSequenceMetadata {
        sequence_id: Uuid,
        field: String,
        #[serde(default)]
        value: serde_json::Value,
    },
    SetupProject {
        project_id: Uuid,
    },
    NewBin {
        project_id: Uuid,
        name: String,
        #[serde(default)]
        parent_id: Option<Uuid>,
    },
    DeleteBin {
        bin_id: Uuid,
    },
    RenameItem {
        item_type: String,
        item_id: Uuid,
        name: String,
    },
    MoveToBin {
        bin_id: Uuid,
        #[serde(default)]
        parent_id: Option<Uuid>,
        #[serde(default)]
        insert_index: Option<i64>,
    },
    ImportMedia {
        project_id: Uuid,
        #[serde(default)]
        file_paths: Vec<String>,
        #[serde(default)]
        file_path: Option<String>,
    },
    DuplicateMasterClip {
        masterclip_sequence_id: Uuid,
    },
    DeleteMasterClip {
        masterclip_sequence_id: Uuid,
    },
    DeleteSequence {
        sequence_id: Uuid,
    },
    AddTrack {
        sequence_id: Uuid,
        kind: TrackKind,
        #[serde(default)]
        height: Option<u32>,
    },
    #[serde(alias = "AddClip", alias = "InsertClipToTimeline")]
    CreateClip {
        sequence_id: Uuid,
        track_id: Uuid,
        #[serde(default)]
        media_id: Option<Uuid>,
        #[serde(default)]
        master_clip_id: Option<Uuid>,
        timeline_start: TimeValue,
        #[serde(default)]
        duration: Option<TimeValue>,
        #[serde(default)]
        source_in: Option<TimeValue>,
    },
    Insert {
        sequence_id: Uuid,
        track_id: Uuid,
        #[serde(default)]
        media_id: Option<Uuid>,
        #[serde(default)]
        master_clip_id: Option<Uuid>,
        insert_time: TimeValue,
        #[serde(default)]
        duration: Option<TimeValue>,
        #[serde(default)]
        source_in: Option<TimeValue>,
        #[serde(default)]
        advance_playhead: bool,
    },
    Overwrite {
        sequence_id: Uuid,
        track_id: Uuid,
        #[serde(default)]
        media_id: Option<Uuid>,
        #[serde(default)]
        master_clip_id: Option<Uuid>,
        overwrite_time: TimeValue,
        #[serde(default)]
        duration: Option<TimeValue>,
        #[serde(default)]
        source_in: Option<TimeValue>,
        #[serde(default)]
        advance_playhead: bool,
    },
    SplitClip {
        clip_id: Uuid,
        split_value: TimeValue,
    },
    #[serde(alias = "Cut")]
    Split {
        sequence_id: Uuid,
        #[serde(default)]
        at: Option<TimeValue>,
    },
    MoveClipToTrack {
        clip_id: Uuid,
        track_id: Uuid,
    },
    DeleteClip {
        clip_id: Uuid,
    },
    ToggleClipEnabled {
        sequence_id: Uuid,
        #[serde(default)]
        clip_ids: Vec<Uuid>,
    },
    RippleDelete {
        sequence_id: Uuid,
        track_id: Uuid,
        gap_start: TimeValue,
        gap_duration: TimeValue,
    },
    RippleDeleteSelection {
        sequence_id: Uuid,
        #[serde(default)]
        clip_ids: Vec<Uuid>,
        #[serde(default)]
        block_mode: bool,
    },
    #[serde(alias = "SetProperty", alias = "ModifyProperty")]
    SetClipProperty {
        clip_id: Uuid,
        property_name: String,
        value: serde_json::Value,
        #[serde(default)]
        property_type: Option<String>,
        #[serde(default)]
        default_value: Option<serde_json::Value>,
    },
    Nudge {
        sequence_id: Uuid,
        delta_frames: i64,
        #[serde(default)]
        clip_ids: Vec<Uuid>,
    },
    RippleEdit {
        sequence_id: Uuid,
        edge: EdgeSelector,
        #[serde(default)]
        delta_frames: Option<i64>,
        #[serde(default)]
        delta_ms: Option<f64>,
        #[serde(default)]
        dry_run: bool,
    },
    BatchRippleEdit {
        sequence_id: Uuid,
        edges: Vec<EdgeSelector>,
        #[serde(default)]
        delta_frames: Option<i64>,
        #[serde(default)]
        delta_ms: Option<f64>,
        #[serde(default)]
        dry_run: bool,
    },
    ExtendEdit {
        sequence_id: Uuid,
        edges: Vec<EdgeSelector>,
    },
    MatchFrame {
        sequence_id: Uuid,
    },
    SelectAll {
        sequence_id: Uuid,
    },
    DeselectAll {
        sequence_id: Uuid,
    },
    GoToStart {
        sequence_id: Uuid,
    },
    GoToEnd {
        sequence_id: Uuid,
    },
    GoToPrevEdit {
        sequence_id: Uuid,
    },
    GoToNextEdit {
        sequence_id: Uuid,
    },
    ToggleSnapping,
    BatchCommand {
        commands: Vec<Command>,
    },
}

/// Static per-command behaviour flags.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub undoable: bool,
}

impl Command {
    pub fn spec(&self) -> CommandSpec {
        use Command::*;
        let (name, undoable) = match self {
            CreateProject { .. } => ("CreateProject", true),
            LoadProject { .. } => ("LoadProject", false),
            CreateSequence { .. } => ("CreateSequence", true),
            SetSequenceMetadata { .. } => ("SetSequenceMetadata", true),
            SetupProject { .. } => ("SetupProject", true),
            NewBin { .. } => ("NewBin", true),
            DeleteBin { .. } => ("DeleteBin", true),
            RenameItem { .. } => ("RenameItem", true),
            MoveToBin { .. } => ("MoveToBin", true),
            ImportMedia { .. } => ("ImportMedia", true),
            DuplicateMasterClip { .. } => ("DuplicateMasterClip", true),
            DeleteMasterClip { .. } => ("DeleteMasterClip", true),
            DeleteSequence { .. } => ("DeleteSequence", true),
            AddTrack { .. } => ("AddTrack", true),
            CreateClip { .. } => ("CreateClip", true),
            Insert { .. } => ("Insert", true),
            Overwrite { .. } => ("Overwrite", true),
            SplitClip { .. } => ("SplitClip", true),
            Split { .. } => ("Split", true),
            MoveClipToTrack { .. } => ("MoveClipToTrack", true),
            DeleteClip { .. } => ("DeleteClip", true),
            ToggleClipEnabled { .. } => ("ToggleClipEnabled", true),
            RippleDelete { .. } => ("RippleDelete", true),
            RippleDeleteSelection { .. } => ("RippleDeleteSelection", true),
            SetClipProperty { .. } => ("SetClipProperty", true),
            Nudge { .. } => ("Nudge", true),
            RippleEdit { .. } => ("RippleEdit", true),
            BatchRippleEdit { .. } => ("BatchRippleEdit", true),
            ExtendEdit { .. } => ("ExtendEdit", true),
            MatchFrame { .. } => ("MatchFrame", false),
            SelectAll { .. } => ("SelectAll", false),
            DeselectAll { .. } => ("DeselectAll", false),
            GoToStart { .. } => ("GoToStart", false),
            GoToEnd { .. } => ("GoToEnd", false),
            GoToPrevEdit { .. } => ("GoToPrevEdit", false),
            GoToNextEdit { .. } => ("GoToNextEdit", false),
            ToggleSnapping => ("ToggleSnapping", false),
            BatchCommand { .. } => ("BatchCommand", true),
        };
        CommandSpec { name, undoable }
    }

    /// Dry-run commands plan without mutating; they never take an undo
    /// slot.
    pub fn is_dry_run(&self) -> bool {
        matches!(
            self,
            Command::RippleEdit { dry_run: true, .. }
                | Command::BatchRippleEdit { dry_run: true, .. }
        )
    }
}

/// One imported file's generated ids, persisted for deterministic replay
/// and reverse-order undo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedFile {
    pub path: String,
    pub media_id: Uuid,
    pub masterclip_sequence_id: Uuid,
    pub video_track_id: Option<Uuid>,
    pub video_clip_id: Option<Uuid>,
    pub audio_track_ids: Vec<Uuid>,
    pub audio_clip_ids: Vec<Uuid>,
    pub created_media: bool,
    pub created_sequence: bool,
    /// Rate the masterclip sequence had before a re-probe updated it.
    pub previous_rate: Option<(u32, u32)>,
}

/// Per-clip enable flip, captured for undo/redo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToggleChange {
    pub clip_id: Uuid,
    pub enabled_before: bool,
    pub enabled_after: bool,
}

/// State the executor persists onto the undo-log record. Replay reads
/// generated ids from here instead of minting new ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CommandState {
    #[default]
    Empty,
    CreateProject {
        project_id: Uuid,
    },
    CreateSequence {
        sequence_id: Uuid,
        track_ids: Vec<Uuid>,
    },
    SetupProject {
        bin_id: Uuid,
        sequence_id: Uuid,
        track_ids: Vec<Uuid>,
    },
    SetSequenceMetadata {
        previous: serde_json::Value,
    },
    NewBin {
        bin_id: Uuid,
    },
    DeleteBin {
        bin: Bin,
    },
    RenameItem {
        previous_name: String,
    },
    MoveToBin {
        previous_parent: Option<Uuid>,
        previous_index: i64,
    },
    ImportMedia {
        files: Vec<ImportedFile>,
    },
    DuplicateMasterClip {
        sequence_id: Uuid,
        track_ids: Vec<Uuid>,
        clip_ids: Vec<Uuid>,
    },
    DeleteSequence {
        sequence: Sequence,
        tracks: Vec<Track>,
        clips: Vec<Clip>,
        properties: Vec<Property>,
    },
    AddTrack {
        track_id: Uuid,
    },
    CreateClip {
        clip_id: Uuid,
        insert_ids: Vec<Uuid>,
        ledger: MutationLedger,
    },
    Insert {
        clip_id: Uuid,
        insert_ids: Vec<Uuid>,
        ledger: MutationLedger,
    },
    Overwrite {
        clip_id: Uuid,
        insert_ids: Vec<Uuid>,
        ledger: MutationLedger,
    },
    SplitClip {
        second_clip_id: Uuid,
        original: Clip,
    },
    Split {
        split_frames: i64,
        clip_ids: Vec<Uuid>,
    },
    MoveClipToTrack {
        previous_track_id: Uuid,
        insert_ids: Vec<Uuid>,
        ledger: MutationLedger,
    },
    DeleteClip {
        clip: Clip,
        properties: Vec<Property>,
    },
    ToggleClipEnabled {
        changes: Vec<ToggleChange>,
    },
    RippleDelete {
        gap_start: i64,
        gap_duration: i64,
        ledger: MutationLedger,
    },
    RippleDeleteSelection {
        ledger: MutationLedger,
    },
    SetClipProperty {
        previous: Option<Property>,
        created_property_id: Option<Uuid>,
        degraded: bool,
    },
    Nudge {
        ledger: MutationLedger,
    },
    Ripple {
        clamped_delta_frames: i64,
        clamped_delta_ms: f64,
        ledger: MutationLedger,
    },
    Batch,
}

impl CommandState {
    pub fn is_empty(&self) -> bool {
        matches!(self, CommandState::Empty)
    }
}

/// One submitted command plus everything replay needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: Uuid,
    pub sequence_number: u64,
    pub undo_group_id: Option<Uuid>,
    pub command: Command,
    #[serde(default)]
    pub state: CommandState,
}

/// Result of `execute`/`undo`/`redo`.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub cancelled: bool,
    pub preview: Option<RipplePreview>,
}

impl ExecResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_preview(preview: RipplePreview) -> Self {
        Self {
            success: true,
            preview: Some(preview),
            ..Self::default()
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}
