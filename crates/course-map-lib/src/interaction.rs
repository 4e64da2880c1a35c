//! Interaction State Machine - hover previews and click selection
//!
//! One machine per map. Hover previews are debounced: entering a marker arms a
//! [`HoverTimer`] and the preview only shows once the timer fires. Every timer
//! carries a fresh generation number and only the currently armed one is
//! honoured, so a timer delivered after the state moved on is a no-op.
//!
//! A click always wins: selecting a marker cancels any pending or shown hover,
//! and no new hover starts while the detail panel is open.

use instant::Instant;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The single live interaction state of a map
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle,
    HoverPending { marker_id: String, since: Instant },
    HoverShown { marker_id: String },
    Selected { marker_id: String },
}

impl InteractionState {
    /// Marker the state refers to, if any
    pub fn marker_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::HoverPending { marker_id, .. }
            | Self::HoverShown { marker_id }
            | Self::Selected { marker_id } => Some(marker_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::HoverPending { .. } => "hover_pending",
            Self::HoverShown { .. } => "hover_shown",
            Self::Selected { .. } => "selected",
        }
    }
}

/// Serializable view of [`InteractionState`] for UI consumers
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InteractionSnapshot {
    pub state: String,
    pub marker_id: Option<String>,
}

impl From<&InteractionState> for InteractionSnapshot {
    fn from(state: &InteractionState) -> Self {
        Self {
            state: state.name().to_string(),
            marker_id: state.marker_id().map(str::to_string),
        }
    }
}

/// A scheduled hover preview, handed to the host's scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverTimer {
    pub marker_id: String,
    pub generation: u64,
    pub due: Instant,
}

/// Hover/click state machine
#[derive(Debug, Clone)]
pub struct InteractionMachine {
    state: InteractionState,
    /// Generation of the most recently armed timer
    generation: u64,
    pending: Option<HoverTimer>,
    hover_delay: Duration,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl InteractionMachine {
    pub fn new(hover_delay: Duration) -> Self {
        Self {
            state: InteractionState::Idle,
            generation: 0,
            pending: None,
            hover_delay,
        }
    }

    #[inline]
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Marker whose detail panel is open
    pub fn selected(&self) -> Option<&str> {
        match &self.state {
            InteractionState::Selected { marker_id } => Some(marker_id),
            _ => None,
        }
    }

    /// Marker whose hover preview is visible
    pub fn preview(&self) -> Option<&str> {
        match &self.state {
            InteractionState::HoverShown { marker_id } => Some(marker_id),
            _ => None,
        }
    }

    /// The armed hover timer, if any
    #[inline]
    pub fn pending_timer(&self) -> Option<&HoverTimer> {
        self.pending.as_ref()
    }

    #[inline]
    pub fn hover_delay(&self) -> Duration {
        self.hover_delay
    }

    /// Pointer entered a marker; returns the timer to schedule, if one was armed
    pub fn pointer_enter(&mut self, marker_id: &str, now: Instant) -> Option<HoverTimer> {
        match &self.state {
            // The detail panel suppresses previews
            InteractionState::Selected { .. } => return None,
            InteractionState::HoverPending { marker_id: current, .. }
            | InteractionState::HoverShown { marker_id: current }
                if current == marker_id =>
            {
                return None;
            }
            _ => {}
        }

        self.cancel_pending();
        self.generation += 1;
        let timer = HoverTimer {
            marker_id: marker_id.to_string(),
            generation: self.generation,
            due: now + self.hover_delay,
        };
        self.state = InteractionState::HoverPending {
            marker_id: marker_id.to_string(),
            since: now,
        };
        self.pending = Some(timer.clone());
        self.debug_check();
        Some(timer)
    }

    /// Pointer left a marker; stale leaves for other markers are ignored
    pub fn pointer_leave(&mut self, marker_id: &str) {
        let hovering = matches!(
            &self.state,
            InteractionState::HoverPending { marker_id: current, .. }
            | InteractionState::HoverShown { marker_id: current }
            if current == marker_id
        );
        if hovering {
            self.cancel_pending();
            self.state = InteractionState::Idle;
        }
        self.debug_check();
    }

    /// Deliver a fired timer; returns whether the preview is now shown
    pub fn hover_timer_fired(&mut self, timer: &HoverTimer, now: Instant) -> bool {
        let current = self.pending.as_ref().is_some_and(|pending| {
            pending.generation == timer.generation && pending.marker_id == timer.marker_id
        });
        if !current {
            tracing::trace!(
                marker = %timer.marker_id,
                generation = timer.generation,
                "Ignoring stale hover timer"
            );
            return false;
        }
        if now < timer.due {
            return false;
        }
        let InteractionState::HoverPending { marker_id, .. } = &self.state else {
            return false;
        };
        let marker_id = marker_id.clone();

        self.pending = None;
        self.state = InteractionState::HoverShown { marker_id };
        self.debug_check();
        true
    }

    /// Fire the pending timer if it is due; for hosts that poll every frame
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.pending.clone() {
            Some(timer) if now >= timer.due => self.hover_timer_fired(&timer, now),
            _ => false,
        }
    }

    /// Click on a marker: opens (or switches) the detail panel
    pub fn click(&mut self, marker_id: &str) {
        self.cancel_pending();
        self.state = InteractionState::Selected {
            marker_id: marker_id.to_string(),
        };
        self.debug_check();
    }

    /// Click anywhere that is not a marker or the detail panel
    pub fn click_outside(&mut self) {
        if matches!(self.state, InteractionState::Selected { .. }) {
            self.state = InteractionState::Idle;
        }
        self.debug_check();
    }

    /// Detail panel closed explicitly
    pub fn close_panel(&mut self) {
        self.click_outside();
    }

    /// Drop hover state (pending or shown), keeping any selection
    pub fn clear_hover(&mut self) {
        if matches!(
            self.state,
            InteractionState::HoverPending { .. } | InteractionState::HoverShown { .. }
        ) {
            self.cancel_pending();
            self.state = InteractionState::Idle;
        }
    }

    /// Return to idle if the referenced marker no longer exists
    pub fn retain(&mut self, exists: impl Fn(&str) -> bool) {
        if let Some(marker_id) = self.state.marker_id() {
            if !exists(marker_id) {
                self.cancel_pending();
                self.state = InteractionState::Idle;
            }
        }
    }

    /// Disarm the pending timer; its generation can never match again
    fn cancel_pending(&mut self) {
        self.pending = None;
    }

    /// At most one of {pending timer, shown preview, open panel}
    fn debug_check(&self) {
        debug_assert_eq!(
            self.pending.is_some(),
            matches!(self.state, InteractionState::HoverPending { .. }),
            "pending timer must exist exactly while hover is pending"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(175);

    fn machine() -> InteractionMachine {
        InteractionMachine::new(DELAY)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_hover_shows_after_delay() {
        let mut m = machine();
        let t0 = Instant::now();

        let timer = m.pointer_enter("a", t0).unwrap();
        assert_eq!(timer.due, t0 + DELAY);
        assert!(matches!(m.state(), InteractionState::HoverPending { .. }));

        assert!(!m.hover_timer_fired(&timer, t0 + ms(100)));
        assert!(m.hover_timer_fired(&timer, t0 + ms(175)));
        assert_eq!(m.preview(), Some("a"));
        assert!(m.pending_timer().is_none());
    }

    #[test]
    fn test_leave_before_delay_cancels() {
        let mut m = machine();
        let t0 = Instant::now();

        let timer = m.pointer_enter("a", t0).unwrap();
        m.pointer_leave("a");
        assert_eq!(m.state(), &InteractionState::Idle);
        assert!(!m.hover_timer_fired(&timer, t0 + ms(500)));
        assert_eq!(m.state(), &InteractionState::Idle);
    }

    #[test]
    fn test_leave_hides_preview() {
        let mut m = machine();
        let t0 = Instant::now();
        m.pointer_enter("a", t0);
        assert!(m.tick(t0 + ms(200)));
        m.pointer_leave("a");
        assert_eq!(m.state(), &InteractionState::Idle);
    }

    #[test]
    fn test_stale_leave_is_ignored() {
        let mut m = machine();
        let t0 = Instant::now();
        m.pointer_enter("a", t0);
        m.pointer_enter("b", t0 + ms(10));
        m.pointer_leave("a");
        assert_eq!(m.state().marker_id(), Some("b"));
    }

    #[test]
    fn test_moving_between_markers_supersedes_timer() {
        let mut m = machine();
        let t0 = Instant::now();

        let first = m.pointer_enter("a", t0).unwrap();
        let second = m.pointer_enter("b", t0 + ms(50)).unwrap();
        assert_ne!(first.generation, second.generation);

        assert!(!m.hover_timer_fired(&first, t0 + ms(300)));
        assert!(m.hover_timer_fired(&second, t0 + ms(300)));
        assert_eq!(m.preview(), Some("b"));
    }

    #[test]
    fn test_reentering_same_marker_keeps_timer() {
        let mut m = machine();
        let t0 = Instant::now();
        let timer = m.pointer_enter("a", t0).unwrap();
        assert!(m.pointer_enter("a", t0 + ms(20)).is_none());
        assert!(m.hover_timer_fired(&timer, t0 + ms(180)));
    }

    #[test]
    fn test_click_cancels_pending_hover() {
        let mut m = machine();
        let t0 = Instant::now();

        let timer = m.pointer_enter("a", t0).unwrap();
        m.click("a");
        assert_eq!(m.selected(), Some("a"));

        // The timer armed before the click must never show a preview
        assert!(!m.hover_timer_fired(&timer, t0 + ms(400)));
        assert!(!m.tick(t0 + ms(400)));
        assert_eq!(m.selected(), Some("a"));
        assert!(m.preview().is_none());
    }

    #[test]
    fn test_click_clears_shown_preview() {
        let mut m = machine();
        let t0 = Instant::now();
        m.pointer_enter("a", t0);
        m.tick(t0 + ms(200));
        m.click("b");
        assert_eq!(m.selected(), Some("b"));
        assert!(m.preview().is_none());
    }

    #[test]
    fn test_no_hover_while_panel_open() {
        let mut m = machine();
        let t0 = Instant::now();
        m.click("a");
        assert!(m.pointer_enter("b", t0).is_none());
        assert!(!m.tick(t0 + ms(500)));
        assert_eq!(m.selected(), Some("a"));
    }

    #[test]
    fn test_selection_exits() {
        let mut m = machine();
        m.click("a");
        m.click("b");
        assert_eq!(m.selected(), Some("b"));
        m.click_outside();
        assert_eq!(m.state(), &InteractionState::Idle);

        m.click("c");
        m.close_panel();
        assert_eq!(m.state(), &InteractionState::Idle);
    }

    #[test]
    fn test_click_outside_keeps_hover() {
        let mut m = machine();
        let t0 = Instant::now();
        m.pointer_enter("a", t0);
        m.click_outside();
        assert!(matches!(m.state(), InteractionState::HoverPending { .. }));
    }

    #[test]
    fn test_retain_drops_missing_marker() {
        let mut m = machine();
        let t0 = Instant::now();
        let timer = m.pointer_enter("gone", t0).unwrap();
        m.retain(|id| id != "gone");
        assert_eq!(m.state(), &InteractionState::Idle);
        assert!(!m.hover_timer_fired(&timer, t0 + ms(300)));
    }

    #[test]
    fn test_rapid_sequences_never_show_preview_and_panel() {
        #[derive(Clone, Copy, Debug)]
        enum Step {
            Enter(u8),
            Leave(u8),
            Click(u8),
            Outside,
            Wait(u64),
        }

        let script = [
            Step::Enter(1),
            Step::Click(1),
            Step::Leave(1),
            Step::Wait(300),
            Step::Enter(2),
            Step::Wait(100),
            Step::Click(2),
            Step::Wait(200),
            Step::Outside,
            Step::Enter(3),
            Step::Wait(200),
            Step::Click(1),
            Step::Enter(3),
            Step::Wait(400),
            Step::Leave(3),
            Step::Outside,
            Step::Enter(1),
            Step::Leave(1),
            Step::Enter(1),
            Step::Wait(175),
        ];

        let mut m = machine();
        let mut now = Instant::now();
        let mut armed: Vec<HoverTimer> = Vec::new();
        let mut shown_after_click = false;

        for step in script {
            match step {
                Step::Enter(id) => armed.extend(m.pointer_enter(&id.to_string(), now)),
                Step::Leave(id) => m.pointer_leave(&id.to_string()),
                Step::Click(id) => m.click(&id.to_string()),
                Step::Outside => m.click_outside(),
                Step::Wait(n) => {
                    now += ms(n);
                    // Deliver every timer ever armed, stale ones included
                    for timer in &armed {
                        let was_selected = m.selected().is_some();
                        if m.hover_timer_fired(timer, now) && was_selected {
                            shown_after_click = true;
                        }
                    }
                }
            }
            assert!(!(m.preview().is_some() && m.selected().is_some()));
        }

        assert!(!shown_after_click);
        assert_eq!(m.preview(), Some("1"));
    }
}
