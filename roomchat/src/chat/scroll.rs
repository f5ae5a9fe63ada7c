//! Viewport follow policy.
//!
//! Every store change moves the viewport to the newest message. How it
//! moves depends on a two-state machine:
//!
//! ```text
//! InitialLoad --(first successful local send)--> Live
//! ```
//!
//! In `InitialLoad` the viewport jumps (history load, early arrivals, the
//! local user's first message). In `Live` it scrolls smoothly. Changes that
//! were already queued when the first send succeeded still jump. The
//! machine never goes back; a new room session starts a new controller.

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollMode {
    /// Jump straight to the bottom.
    #[default]
    InitialLoad,
    /// Animate to the bottom.
    Live,
}

/// How the viewport was moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAction {
    /// Instant jump to the bottom.
    Snap,
    /// Smooth scroll to the bottom.
    Animate,
}

/// Something that can show the bottom of the message list.
pub trait Viewport {
    /// Jump to the newest message without animation.
    fn snap_to_bottom(&mut self);

    /// Scroll to the newest message with animation.
    fn animate_to_bottom(&mut self);
}

/// Decides how the viewport follows store changes.
#[derive(Debug, Clone, Default)]
pub struct ScrollController {
    mode: ScrollMode,
    /// Changes queued before the switch to `Live` that still jump.
    snaps_owed: usize,
}

impl ScrollController {
    /// A controller in [`ScrollMode::InitialLoad`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: ScrollMode::InitialLoad,
            snaps_owed: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn mode(&self) -> ScrollMode {
        self.mode
    }

    /// The action the next store change will trigger.
    #[must_use]
    pub const fn next_action(&self) -> ScrollAction {
        match self.mode {
            ScrollMode::Live if self.snaps_owed == 0 => ScrollAction::Animate,
            _ => ScrollAction::Snap,
        }
    }

    /// React to one store change.
    ///
    /// Returns the action performed, or `None` when no viewport is mounted
    /// yet (the change is then simply not followed, but still counts
    /// against the queued backlog).
    pub fn on_store_change(
        &mut self,
        viewport: Option<&mut (dyn Viewport + '_)>,
    ) -> Option<ScrollAction> {
        let action = self.next_action();
        self.snaps_owed = self.snaps_owed.saturating_sub(1);
        let viewport = viewport?;
        match action {
            ScrollAction::Snap => viewport.snap_to_bottom(),
            ScrollAction::Animate => viewport.animate_to_bottom(),
        }
        Some(action)
    }

    /// Record a successful local send. Returns `true` on the transition
    /// to [`ScrollMode::Live`].
    ///
    /// `queued_changes` is the number of store changes not yet passed to
    /// [`on_store_change`](Self::on_store_change). On the transition they
    /// keep the jump of the mode they arrived in.
    pub fn on_local_send(&mut self, queued_changes: usize) -> bool {
        let was_initial = self.mode == ScrollMode::InitialLoad;
        self.mode = ScrollMode::Live;
        if was_initial {
            self.snaps_owed = queued_changes;
            tracing::debug!(queued_changes, "viewport follow switched to live");
        }
        was_initial
    }
}
