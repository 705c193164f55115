//! The view model: the engine's cursor into the compiled pick sequence,
//! the weaver-facing mode, and the pending-command queue that soaks up
//! commands issued while the loom's arms are not down (spec §3 "View
//! state", §4.5 "Command queueing").
//!
//! This crate owns no I/O: [`ViewState::execute`] only ever mutates state.
//! The loom protocol engine (`dobby-proto`) decides *when* to call it and
//! whether the result needs to reach the wire.

pub mod command;

pub use command::{Command, CommandQueue};
use dobby_color::Color;

/// What the weaver is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Following the compiled pick sequence.
    Weave,
    /// Free-running between tabby A and tabby B.
    Tabby,
    /// Typing a single pick number to jump to.
    PickEntry,
    /// Typing a new pick-list to recompile.
    PickListEntry,
    Quit,
}

/// The last reported state of the loom's beater arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arms {
    Up,
    Down,
    Unknown,
}

/// Ring buffer of the last 4 weft colors, used for color-alert bell
/// detection (spec §4.4 "Color-alert bell").
#[derive(Debug, Clone, Default)]
pub struct WeftRing {
    slots: [Color; 4],
    len: usize,
}

impl WeftRing {
    /// Pushes a new color, shifting older ones back.
    pub fn push(&mut self, color: Color) {
        self.slots.rotate_right(1);
        self.slots[0] = color;
        self.len = (self.len + 1).min(4);
    }

    /// The color `n` picks ago (`0` = the one just pushed), or `None` if the
    /// ring hasn't seen that many picks yet.
    pub fn ago(&self, n: usize) -> Option<Color> {
        if n < self.len {
            Some(self.slots[n])
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The engine's view of where weaving currently stands.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub mode: Mode,
    /// The compiled pick sequence (spec §3); rebuilt on `DoSetPickList`.
    pub pick_sequence: Vec<i32>,
    /// Index into `pick_sequence`; meaningless while `mode == Tabby`.
    cursor: usize,
    /// The resolved pick about to be sent: `pick_sequence[cursor]` in Weave
    /// mode, or a tabby sentinel in Tabby mode.
    pub next_pick: i32,
    /// The pick that was last actually woven (committed on `<up>`).
    pub current_pick: i32,
    pub weave_forward: bool,
    pub loom_arms: Arms,
    pub pick_sent: bool,
    pub weft_ring: WeftRing,
    pub pending: CommandQueue,
    pub entry_buffer: String,
    pub paren_depth: i32,
    pub last_error: Option<String>,
    saved_cursor: Option<usize>,
}

impl ViewState {
    pub fn new(pick_sequence: Vec<i32>, start_cursor: usize, weave_forward: bool) -> Self {
        let cursor = if pick_sequence.is_empty() {
            0
        } else {
            start_cursor % pick_sequence.len()
        };
        let next_pick = pick_sequence.get(cursor).copied().unwrap_or(0);
        Self {
            mode: Mode::Weave,
            pick_sequence,
            cursor,
            next_pick,
            current_pick: 0,
            weave_forward,
            loom_arms: Arms::Unknown,
            pick_sent: false,
            weft_ring: WeftRing::default(),
            pending: CommandQueue::new(),
            entry_buffer: String::new(),
            paren_depth: 0,
            last_error: None,
            saved_cursor: None,
        }
    }

    /// Returns the 1-based pick number that should be persisted to
    /// `$HOME/.drawboypick` on exit: the next pick that would have been
    /// woven (spec §6 "Persisted state", §8 scenario 6).
    pub fn persisted_next_pick(&self) -> i32 {
        self.cursor as i32 + 1
    }

    /// `advance(forward)`: spec §4.5 "Pick-cursor arithmetic". Steps the
    /// cursor by `+1` if `forward == weave_forward`, else `-1`.
    pub fn advance(&mut self, forward: bool) {
        let delta = if forward == self.weave_forward { 1 } else { -1 };
        self.advance_by(delta);
    }

    /// Steps by an arbitrary signed amount, e.g. a merged `AdvancePick`.
    pub fn advance_by(&mut self, delta: i32) {
        match self.mode {
            Mode::Tabby => {
                if delta.rem_euclid(2) == 1 {
                    self.next_pick = if self.next_pick == dobby_picks::TABBY_A {
                        dobby_picks::TABBY_B
                    } else {
                        dobby_picks::TABBY_A
                    };
                }
            }
            _ => {
                let n = self.pick_sequence.len() as i32;
                if n == 0 {
                    return;
                }
                // Wrap modulo the sequence length (spec: "wrap modulo the
                // pick sequence length"); the 9999 hard cap spec.md also
                // describes is a no-op once rem_euclid has already folded
                // the index into [0, n), since drafts never approach that
                // many picks, but is kept as the documented safety net.
                let mut idx = self.cursor as i32 + delta;
                idx = idx.rem_euclid(n);
                if idx >= 9999 {
                    idx -= (idx / n) * n;
                }
                self.cursor = idx as usize;
                self.next_pick = self.pick_sequence[self.cursor];
            }
        }
    }

    /// Enters tabby mode, remembering the pattern cursor so `Liftplan` can
    /// restore it. The initial letter is chosen by direction (open question
    /// in spec §9: independent of the tabby-pattern option).
    pub fn enter_tabby(&mut self) {
        if self.mode == Mode::Tabby {
            return;
        }
        self.saved_cursor = Some(self.cursor);
        self.mode = Mode::Tabby;
        self.next_pick = if self.weave_forward {
            dobby_picks::TABBY_A
        } else {
            dobby_picks::TABBY_B
        };
    }

    /// Leaves tabby mode, restoring the remembered pattern cursor.
    pub fn enter_liftplan(&mut self) {
        if self.mode != Mode::Tabby {
            return;
        }
        self.mode = Mode::Weave;
        if let Some(cursor) = self.saved_cursor.take() {
            self.cursor = cursor;
            self.next_pick = self.pick_sequence.get(cursor).copied().unwrap_or(0);
        }
    }

    pub fn reverse(&mut self) {
        self.weave_forward = !self.weave_forward;
        self.advance(true);
    }

    pub fn enter_pick_entry(&mut self) {
        self.mode = Mode::PickEntry;
        self.entry_buffer.clear();
        self.paren_depth = 0;
    }

    pub fn enter_pick_list_entry(&mut self) {
        self.mode = Mode::PickListEntry;
        self.entry_buffer.clear();
        self.paren_depth = 0;
    }

    /// Cancels whichever entry mode is active, returning to Weave.
    pub fn cancel_entry(&mut self) {
        if matches!(self.mode, Mode::PickEntry | Mode::PickListEntry) {
            self.mode = Mode::Weave;
            self.entry_buffer.clear();
        }
    }

    /// Commits a single typed pick number: jumps the cursor to that 1-based
    /// draft pick, wherever it sits in the compiled sequence.
    pub fn do_set_pick(&mut self, pick: i32) {
        self.mode = Mode::Weave;
        if let Some(idx) = self.pick_sequence.iter().position(|&p| p == pick) {
            self.cursor = idx;
            self.next_pick = pick;
        } else {
            tracing::warn!(pick, "requested pick is not in the compiled pick sequence");
        }
    }

    /// Recompiles the pick sequence from typed pick-list text. On success
    /// resets the cursor to the start and marks `current_pick` as
    /// meaningless (spec §4.5 "DoSetPickList"); on failure records the
    /// parser diagnostic in `last_error` and stays put.
    pub fn do_set_pick_list(
        &mut self,
        text: &str,
        max_pick: u32,
        pattern_before_tabby: bool,
        tabby_a_first: bool,
        treadle_threading: bool,
    ) {
        match dobby_picks::compile(
            text,
            max_pick,
            pattern_before_tabby,
            tabby_a_first,
            treadle_threading,
        ) {
            Ok(sequence) => {
                self.pick_sequence = sequence;
                self.cursor = 0;
                self.next_pick = self.pick_sequence.first().copied().unwrap_or(0);
                self.current_pick = 0;
                self.mode = Mode::Weave;
                self.last_error = None;
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Commits the queued command text for whichever entry mode is active.
    pub fn submit_entry(
        &mut self,
        max_pick: u32,
        pattern_before_tabby: bool,
        tabby_a_first: bool,
        treadle_threading: bool,
    ) {
        match self.mode {
            Mode::PickEntry => {
                let text = self.entry_buffer.trim();
                match text.parse::<i32>() {
                    Ok(pick) => self.do_set_pick(pick),
                    Err(_) => self.last_error = Some(format!("'{text}' is not a pick number")),
                }
                self.entry_buffer.clear();
            }
            Mode::PickListEntry => {
                let text = std::mem::take(&mut self.entry_buffer);
                self.do_set_pick_list(
                    &text,
                    max_pick,
                    pattern_before_tabby,
                    tabby_a_first,
                    treadle_threading,
                );
            }
            _ => {}
        }
    }

    /// Executes one command against the view's state. `defer_pick` is true
    /// while flushing the pending-command queue: the caller (the protocol
    /// engine) is responsible for not re-issuing I/O per command in that
    /// case, only once after the whole queue has drained.
    pub fn execute(&mut self, cmd: Command, _defer_pick: bool) {
        match cmd {
            Command::Tabby => self.enter_tabby(),
            Command::Liftplan => self.enter_liftplan(),
            Command::Reverse => self.reverse(),
            Command::AdvancePick(n) => self.advance_by(n),
            Command::SetPick => self.enter_pick_entry(),
            Command::SetPickList => self.enter_pick_list_entry(),
            Command::DoSetPick(n) => self.do_set_pick(n),
            Command::DoSetPickList(text) => {
                self.do_set_pick_list(&text, self.pick_sequence.len() as u32, true, true, false);
            }
            Command::Quit => self.mode = Mode::Quit,
        }
    }

    /// Enqueues `cmd` if the loom isn't ready for it right now, otherwise
    /// executes it immediately. Returns `true` if the command was queued
    /// (so the caller knows to redraw the prompt with a "queued" notice).
    ///
    /// "Ready for it" means the arms are down *and* this cycle's pattern
    /// hasn't been sent yet — once `pick_sent` is set, a command arriving
    /// before the matching `<up>` must wait for the next `<down>`, same as
    /// one that arrives while the arms are up.
    pub fn dispatch(&mut self, cmd: Command) -> bool {
        if self.loom_arms != Arms::Down || self.pick_sent {
            self.pending.push(cmd);
            true
        } else {
            self.execute(cmd, false);
            false
        }
    }

    /// Flushes the pending-command queue; called on every `<down>`
    /// transition before the next shaft pattern is sent.
    pub fn flush_pending(&mut self) -> usize {
        let mut count = 0;
        let commands: Vec<_> = self.pending.drain().collect();
        for cmd in commands {
            self.execute(cmd, true);
            count += 1;
        }
        count
    }

    pub fn record_weft_color(&mut self, color: Color) {
        self.weft_ring.push(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewState {
        ViewState::new(vec![1, 2, 3, 4], 0, true)
    }

    #[test]
    fn advance_forward_steps_and_wraps() {
        let mut v = view();
        v.advance(true);
        assert_eq!(v.next_pick, 2);
        v.advance(true);
        v.advance(true);
        v.advance(true);
        assert_eq!(v.next_pick, 1); // wrapped
    }

    #[test]
    fn reverse_then_reverse_is_identity_on_direction() {
        let mut v = view();
        let forward = v.weave_forward;
        v.reverse();
        v.reverse();
        assert_eq!(v.weave_forward, forward);
    }

    #[test]
    fn stepping_forward_then_back_returns_to_start() {
        let mut v = view();
        for _ in 0..3 {
            v.advance(true);
        }
        for _ in 0..3 {
            v.advance(false);
        }
        assert_eq!(v.next_pick, 1);
    }

    #[test]
    fn tabby_round_trip_restores_pattern_cursor() {
        let mut v = view();
        v.advance(true);
        assert_eq!(v.next_pick, 2);
        v.enter_tabby();
        assert_eq!(v.next_pick, dobby_picks::TABBY_A);
        v.advance(true);
        assert_eq!(v.next_pick, dobby_picks::TABBY_B);
        v.enter_liftplan();
        assert_eq!(v.mode, Mode::Weave);
        assert_eq!(v.next_pick, 2);
    }

    #[test]
    fn dispatch_queues_while_not_down() {
        let mut v = view();
        v.loom_arms = Arms::Up;
        let queued = v.dispatch(Command::Reverse);
        assert!(queued);
        assert_eq!(v.pending.len(), 1);
        assert!(v.weave_forward); // not yet applied
    }

    #[test]
    fn dispatch_executes_immediately_when_down() {
        let mut v = view();
        v.loom_arms = Arms::Down;
        let queued = v.dispatch(Command::AdvancePick(1));
        assert!(!queued);
        assert_eq!(v.next_pick, 2);
    }

    #[test]
    fn flush_pending_merges_and_executes_in_order() {
        let mut v = view();
        v.loom_arms = Arms::Up;
        v.dispatch(Command::AdvancePick(1));
        v.dispatch(Command::AdvancePick(1));
        assert_eq!(v.pending.len(), 1);
        let executed = v.flush_pending();
        assert_eq!(executed, 1);
        assert_eq!(v.next_pick, 3);
    }

    #[test]
    fn do_set_pick_list_resets_cursor_on_success() {
        let mut v = view();
        v.advance(true);
        v.do_set_pick_list("3,4", 4, true, true, false);
        assert_eq!(v.pick_sequence, vec![3, 4]);
        assert_eq!(v.next_pick, 3);
        assert_eq!(v.current_pick, 0);
    }

    #[test]
    fn do_set_pick_list_keeps_state_on_failure() {
        let mut v = view();
        v.do_set_pick_list("(1,2", 4, true, true, false);
        assert!(v.last_error.is_some());
        assert_eq!(v.pick_sequence, vec![1, 2, 3, 4]);
    }

    #[test]
    fn persisted_next_pick_is_one_based_cursor() {
        let mut v = view();
        assert_eq!(v.persisted_next_pick(), 1);
        v.advance(true);
        assert_eq!(v.persisted_next_pick(), 2);
    }
}
