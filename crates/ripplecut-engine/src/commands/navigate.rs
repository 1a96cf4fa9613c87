//! Non-undoable UI commands: selection, playhead navigation, match frame.

use tracing::debug;
use uuid::Uuid;

use ripplecut_core::{RationalTime, Result};
use ripplecut_model::{Track, TrackKind};

use crate::registry::Engine;

use super::{load_sequence, sequence_clips};

pub(crate) fn select_all(engine: &mut Engine, sequence_id: Uuid) -> Result<()> {
    let clips = sequence_clips(engine, sequence_id)?;
    engine.ui.selected_clips = clips.iter().map(|c| c.id).collect();
    Ok(())
}

pub(crate) fn deselect_all(engine: &mut Engine, sequence_id: Uuid) -> Result<()> {
    let _ = sequence_id;
    engine.ui.clear_edit_selection();
    Ok(())
}

pub(crate) fn go_to_start(engine: &mut Engine, sequence_id: Uuid) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    engine
        .ui
        .set_playhead(sequence_id, RationalTime::zero(seq.frame_rate));
    Ok(())
}

pub(crate) fn go_to_end(engine: &mut Engine, sequence_id: Uuid) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    let end = seq.duration(&engine.store)?;
    engine.ui.set_playhead(sequence_id, end);
    Ok(())
}

/// Step the playhead to the nearest clip boundary before or after it.
pub(crate) fn go_to_edit(engine: &mut Engine, sequence_id: Uuid, forward: bool) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let playhead = engine
        .ui
        .playhead(sequence_id)
        .unwrap_or(seq.playhead)
        .rescale(rate)
        .frames();

    let points = seq.edit_points(&engine.store)?;
    let target = if forward {
        points.iter().copied().find(|p| *p > playhead)
    } else {
        points.iter().rev().copied().find(|p| *p < playhead)
    };
    if let Some(frame) = target {
        engine
            .ui
            .set_playhead(sequence_id, RationalTime::from_frames(frame, rate));
    }
    Ok(())
}

/// Find the topmost clip under the playhead (respecting a non-empty
/// selection) and ask the project browser to focus its master clip.
pub(crate) fn match_frame(engine: &mut Engine, sequence_id: Uuid) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let playhead = engine
        .ui
        .playhead(sequence_id)
        .unwrap_or(seq.playhead)
        .rescale(rate);

    let clips = sequence_clips(engine, sequence_id)?;
    let tracks = Track::load_for_sequence(&engine.store, sequence_id)?;
    let track_rank = |track_id: Option<Uuid>| -> (u8, u32) {
        tracks
            .iter()
            .find(|t| Some(t.id) == track_id)
            .map(|t| {
                (
                    match t.kind {
                        TrackKind::Video => 1,
                        TrackKind::Audio => 0,
                    },
                    t.index,
                )
            })
            .unwrap_or((0, 0))
    };

    let selection = &engine.ui.selected_clips;
    let hit = clips
        .iter()
        .filter(|c| selection.is_empty() || selection.contains(&c.id))
        .filter(|c| {
            let start = c.timeline_start.rescale(rate);
            let end = start + c.duration.rescale(rate);
            start <= playhead && playhead < end
        })
        .max_by_key(|c| track_rank(c.track_id));

    match hit {
        Some(clip) => {
            // The master clip is the source-side sequence; fall back to a
            // direct parent reference when present.
            let master = clip.source_sequence_id.or(clip.parent_clip_id);
            if let Some(master_id) = master {
                engine.browser.focus_master_clip(master_id);
            } else {
                debug!(clip = %clip.id, "match frame found a clip without a master");
            }
        }
        None => debug!("match frame found no clip under the playhead"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::commands::clip::tests::{fixture, place};

    #[test]
    fn test_select_all_then_deselect() {
        let (mut engine, pid, sid, tid) = fixture();
        place(&engine, pid, sid, tid, 0, 50);
        place(&engine, pid, sid, tid, 100, 50);

        assert!(engine.execute(Command::SelectAll { sequence_id: sid }).success);
        assert_eq!(engine.ui().selected_clips.len(), 2);

        assert!(engine
            .execute(Command::DeselectAll { sequence_id: sid })
            .success);
        assert!(engine.ui().selected_clips.is_empty());
        // Neither command took an undo slot.
        assert_eq!(engine.undo_count(), 0);
    }

    #[test]
    fn test_edit_point_navigation() {
        let (mut engine, pid, sid, tid) = fixture();
        place(&engine, pid, sid, tid, 0, 50);
        place(&engine, pid, sid, tid, 100, 50);

        engine
            .ui_mut()
            .set_playhead(sid, RationalTime::new(60, 30, 1));
        assert!(engine
            .execute(Command::GoToNextEdit { sequence_id: sid })
            .success);
        assert_eq!(engine.ui().playhead(sid).unwrap().frames(), 100);

        assert!(engine
            .execute(Command::GoToPrevEdit { sequence_id: sid })
            .success);
        assert_eq!(engine.ui().playhead(sid).unwrap().frames(), 50);

        assert!(engine.execute(Command::GoToStart { sequence_id: sid }).success);
        assert_eq!(engine.ui().playhead(sid).unwrap().frames(), 0);

        assert!(engine.execute(Command::GoToEnd { sequence_id: sid }).success);
        assert_eq!(engine.ui().playhead(sid).unwrap().frames(), 150);
    }

    #[test]
    fn test_match_frame_focuses_topmost_master() {
        use crate::registry::ProjectBrowser;
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Recorder(Rc<RefCell<Option<Uuid>>>);
        impl ProjectBrowser for Recorder {
            fn focus_master_clip(&mut self, id: Uuid) {
                *self.0.borrow_mut() = Some(id);
            }
        }

        let (mut engine, pid, sid, tid) = fixture();
        let focused = Rc::new(RefCell::new(None));
        engine.set_browser(Box::new(Recorder(focused.clone())));

        let master_id = Uuid::new_v4();
        let mut clip = place(&engine, pid, sid, tid, 0, 100);
        clip.source_sequence_id = Some(master_id);
        clip.save(engine.store()).unwrap();

        engine
            .ui_mut()
            .set_playhead(sid, RationalTime::new(50, 30, 1));
        assert!(engine.execute(Command::MatchFrame { sequence_id: sid }).success);
        assert_eq!(*focused.borrow(), Some(master_id));

        // Off-clip playhead focuses nothing.
        *focused.borrow_mut() = None;
        engine
            .ui_mut()
            .set_playhead(sid, RationalTime::new(500, 30, 1));
        assert!(engine.execute(Command::MatchFrame { sequence_id: sid }).success);
        assert!(focused.borrow().is_none());
    }
}
