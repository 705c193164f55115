//! The loom protocol engine: a pure state machine that turns loom events
//! and weaver commands into a list of [`Action`]s for the runtime to carry
//! out. No socket, terminal, or file I/O happens in this module — that
//! separation is what makes the protocol logic testable without a fake
//! loom (spec §4.5 "Engine / runtime split").

use dobby_draft::{polarity, Draft, DobbyType};
use dobby_view::{Arms, Command, ViewState};

use crate::dialect::Generation;
use crate::gen123;
use crate::gen4::{self, Gen4Frame};
use crate::BinaryFrame;

/// Everything the runtime must do in response to a batch of engine calls.
/// Ordered: earlier actions must be carried out before later ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SendBinary(Vec<u8>),
    SendText(String),
    /// A pick was just woven (arms went back up after a sent pattern); the
    /// runtime persists this as the resume point and feeds it to the
    /// renderer's pick-history ring.
    PickWoven(i32),
    RedrawPrompt,
    Warn(String),
    /// The engine has nothing further to send and the runtime should tear
    /// down the connection and exit.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    WaitReset,
    /// Gen 4 only: greeting received, password not yet acknowledged.
    NeedPassword,
    Ready,
    Quit,
}

/// Gen 4's handshake requires a second round-trip before a pick actually
/// reaches the loom: if the previous pattern is still set, `clear` must be
/// sent and acknowledged before the new `pick` command goes out. This
/// tracks what ought to happen when the next `READY>` arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingSend {
    ClearThenPick(u64),
    AwaitPickAck,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub generation: Generation,
    pub dobby_type: DobbyType,
    pub tabby_a_mask: u64,
    pub tabby_b_mask: u64,
}

/// A loom-side event the runtime observed, already decoded by
/// [`gen123::parse_binary_frame`] or [`gen4::parse_gen4_frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoomEvent {
    Binary(BinaryFrame),
    Text(Gen4Frame),
    /// The periodic tick the runtime drives `WaitReset` retries from (spec
    /// §12 "3s WaitReset ping cadence").
    Timeout,
}

pub struct Engine {
    config: EngineConfig,
    state: EngineState,
    view: ViewState,
    gen4_dirty: bool,
    pending_after_ready: Option<PendingSend>,
    quit_requested: bool,
    any_pick_woven: bool,
}

impl Engine {
    pub fn new(config: EngineConfig, view: ViewState) -> Self {
        Self {
            config,
            state: EngineState::WaitReset,
            view,
            gen4_dirty: false,
            pending_after_ready: None,
            quit_requested: false,
            any_pick_woven: false,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state == EngineState::Quit
    }

    /// Whether `$HOME/.drawboypick` should be written on exit: only once at
    /// least one pick has actually reached the loom (spec §6 "Persisted
    /// state").
    pub fn should_persist_on_exit(&self) -> bool {
        self.any_pick_woven
    }

    /// Forces the engine into its terminal state without attempting any
    /// further wire traffic — used when the loom connection has already
    /// dropped (EPIPE, unexpected EOF) rather than on a weaver-requested
    /// quit.
    pub fn force_shutdown(&mut self) -> Vec<Action> {
        self.state = EngineState::Quit;
        vec![Action::Shutdown]
    }

    fn resolve_lift(&self, draft: &Draft, pick: i32) -> u64 {
        let mask = draft.shaft_mask();
        let raw = match pick {
            dobby_picks::TABBY_A => self.config.tabby_a_mask,
            dobby_picks::TABBY_B => self.config.tabby_b_mask,
            p if p >= 1 => draft.liftplan.get(p as usize).copied().unwrap_or(0),
            _ => 0,
        } & mask;
        if polarity::inverts(self.config.dobby_type, draft.rising_shed) {
            (!raw) & mask
        } else {
            raw
        }
    }

    fn shafts_from_mask(mask: u64) -> Vec<u32> {
        (0..64).filter(|i| mask & (1u64 << i) != 0).map(|i| i + 1).collect()
    }

    /// Dispatches a weaver command through the view, returning any actions
    /// the resulting state change demands (a redraw, or — once the arms
    /// allow it — kicking off shutdown).
    pub fn on_user_command(&mut self, cmd: Command, draft: &Draft) -> Vec<Action> {
        if cmd == Command::Quit {
            self.quit_requested = true;
        }
        let queued = self.view.dispatch(cmd);
        let mut actions = vec![Action::RedrawPrompt];
        if !queued && self.quit_requested && self.view.loom_arms != Arms::Down {
            actions.extend(self.begin_shutdown(draft));
        }
        actions
    }

    pub fn on_timeout(&mut self) -> Vec<Action> {
        if self.state == EngineState::WaitReset && !self.config.generation.is_gen4() {
            return vec![Action::SendBinary(gen123::encode_reset_ping())];
        }
        Vec::new()
    }

    pub fn on_loom_event(&mut self, event: LoomEvent, draft: &Draft) -> Vec<Action> {
        match event {
            LoomEvent::Timeout => self.on_timeout(),
            LoomEvent::Binary(frame) => self.on_binary_frame(frame, draft),
            LoomEvent::Text(frame) => self.on_text_frame(frame, draft),
        }
    }

    fn on_binary_frame(&mut self, frame: BinaryFrame, draft: &Draft) -> Vec<Action> {
        match (self.state, frame) {
            (EngineState::WaitReset, BinaryFrame::ResetComplete) => {
                self.state = EngineState::Ready;
                vec![Action::RedrawPrompt]
            }
            (EngineState::Ready, BinaryFrame::ArmsDown) => self.on_arms_down(draft),
            (EngineState::Ready, BinaryFrame::ArmsUp) => self.on_arms_up(),
            (_, BinaryFrame::Unknown(bytes)) => {
                vec![Action::Warn(format!("unrecognised loom frame: {bytes:02x?}"))]
            }
            _ => Vec::new(),
        }
    }

    fn on_text_frame(&mut self, frame: Gen4Frame, draft: &Draft) -> Vec<Action> {
        match (self.state, frame) {
            (EngineState::WaitReset, Gen4Frame::Greeting { shafts, negative }) => {
                self.state = EngineState::NeedPassword;
                if negative != matches!(self.config.dobby_type, DobbyType::Negative) {
                    vec![Action::Warn(format!(
                        "loom reports {} shafts, polarity {}; configured dobby type may not match",
                        shafts,
                        if negative { "negative" } else { "positive" }
                    ))]
                } else {
                    Vec::new()
                }
            }
            (EngineState::NeedPassword, Gen4Frame::Password) => {
                self.state = EngineState::Ready;
                vec![Action::SendText(gen4::encode_password())]
            }
            (EngineState::Ready, Gen4Frame::Down) => self.on_arms_down(draft),
            (EngineState::Ready, Gen4Frame::Up) => self.on_arms_up(),
            (EngineState::Ready, Gen4Frame::Ready) => self.on_gen4_ready(),
            (_, Gen4Frame::ArmNull) => {
                vec![Action::Warn("loom reports arm null".to_string())]
            }
            (_, Gen4Frame::What) => {
                vec![Action::Warn("loom did not understand the last command".to_string())]
            }
            (_, Gen4Frame::Error(msg)) => vec![Action::Warn(msg)],
            (_, Gen4Frame::Unknown(line)) => {
                vec![Action::Warn(format!("unrecognised loom line: {line:?}"))]
            }
            _ => Vec::new(),
        }
    }

    fn on_arms_down(&mut self, draft: &Draft) -> Vec<Action> {
        self.view.loom_arms = Arms::Down;
        let mut actions = Vec::new();
        let flushed = self.view.flush_pending();
        if flushed > 0 {
            actions.push(Action::RedrawPrompt);
        } else if self.any_pick_woven {
            // Nothing was queued while the arms were up: step to the next
            // pick in the current weaving direction. A queued command
            // (Reverse, AdvancePick, ...) already moves the cursor itself,
            // so this only fires when nothing else did.
            self.view.advance(true);
        }
        if self.quit_requested {
            actions.extend(self.begin_shutdown(draft));
            return actions;
        }
        let lift = self.resolve_lift(draft, self.view.next_pick);
        self.view.pick_sent = true;
        if self.config.generation.is_gen4() {
            if self.gen4_dirty {
                actions.push(Action::SendText(gen4::encode_clear()));
                self.pending_after_ready = Some(PendingSend::ClearThenPick(lift));
            } else {
                let shafts = Self::shafts_from_mask(lift);
                actions.push(Action::SendText(gen4::encode_pick(&shafts)));
                self.gen4_dirty = true;
                self.pending_after_ready = Some(PendingSend::AwaitPickAck);
            }
        } else {
            actions.push(Action::SendBinary(gen123::encode_shaft_pattern(lift)));
        }
        actions
    }

    fn on_gen4_ready(&mut self) -> Vec<Action> {
        match self.pending_after_ready.take() {
            Some(PendingSend::ClearThenPick(lift)) => {
                self.gen4_dirty = false;
                let shafts = Self::shafts_from_mask(lift);
                self.gen4_dirty = true;
                self.pending_after_ready = Some(PendingSend::AwaitPickAck);
                vec![Action::SendText(gen4::encode_pick(&shafts))]
            }
            Some(PendingSend::AwaitPickAck) | None => Vec::new(),
        }
    }

    fn on_arms_up(&mut self) -> Vec<Action> {
        self.view.loom_arms = Arms::Up;
        if !self.view.pick_sent {
            return Vec::new();
        }
        self.view.pick_sent = false;
        self.view.current_pick = self.view.next_pick;
        self.any_pick_woven = true;
        let woven = self.view.current_pick;
        let mut actions = vec![Action::PickWoven(woven), Action::RedrawPrompt];
        if self.quit_requested {
            actions.push(Action::Warn(
                "quit requested; finishing the current pick before shutting down".to_string(),
            ));
        }
        actions
    }

    /// Called once the loom's arms are up (or never came down at all) and
    /// the weaver has asked to quit: drains the loom per its dialect's
    /// shutdown handshake, then signals the runtime to close the
    /// connection and persist the resume point.
    fn begin_shutdown(&mut self, draft: &Draft) -> Vec<Action> {
        self.state = EngineState::Quit;
        let mut actions = Vec::new();
        if self.config.generation.is_gen4() {
            match self.config.dobby_type {
                DobbyType::Positive | DobbyType::Virtual => {
                    actions.push(Action::SendText(gen4::encode_clear()));
                }
                DobbyType::Negative => {
                    let all_raised = Self::shafts_from_mask(draft.shaft_mask());
                    actions.push(Action::SendText(gen4::encode_pick(&all_raised)));
                }
            }
            actions.push(Action::SendText(gen4::encode_close()));
        } else {
            actions.push(Action::SendBinary(gen123::encode_reset_ping()));
        }
        actions.push(Action::Shutdown);
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dobby_color::Color;

    fn draft() -> Draft {
        Draft {
            max_shafts: 8,
            max_treadles: 4,
            rising_shed: true,
            ends: 2,
            picks: 3,
            threading: vec![0, 0b1, 0b10],
            liftplan: vec![0, 0b0001, 0b0010, 0b0100],
            warp_color: vec![Color::default(); 3],
            weft_color: vec![Color::default(); 4],
        }
    }

    fn gen123_engine() -> Engine {
        Engine::new(
            EngineConfig {
                generation: Generation::Gen2,
                dobby_type: DobbyType::Positive,
                tabby_a_mask: 0b0101,
                tabby_b_mask: 0b1010,
            },
            ViewState::new(vec![1, 2, 3], 0, true),
        )
    }

    fn gen4_engine() -> Engine {
        Engine::new(
            EngineConfig {
                generation: Generation::Gen4,
                dobby_type: DobbyType::Negative,
                tabby_a_mask: 0b0101,
                tabby_b_mask: 0b1010,
            },
            ViewState::new(vec![1, 2, 3], 0, true),
        )
    }

    #[test]
    fn wait_reset_resends_ping_on_timeout() {
        let mut e = gen123_engine();
        let actions = e.on_timeout();
        assert_eq!(actions, vec![Action::SendBinary(gen123::encode_reset_ping())]);
    }

    #[test]
    fn reset_complete_moves_to_ready() {
        let mut e = gen123_engine();
        let d = draft();
        let actions = e.on_loom_event(LoomEvent::Binary(BinaryFrame::ResetComplete), &d);
        assert_eq!(actions, vec![Action::RedrawPrompt]);
        assert_eq!(e.state, EngineState::Ready);
    }

    #[test]
    fn arms_down_sends_resolved_shaft_pattern() {
        let mut e = gen123_engine();
        let d = draft();
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ResetComplete), &d);
        let actions = e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d);
        let expect_lift = 0b0001; // positive dobby, rising shed: no inversion
        assert_eq!(
            actions,
            vec![Action::SendBinary(gen123::encode_shaft_pattern(expect_lift))]
        );
    }

    #[test]
    fn arms_up_commits_pick_without_advancing_and_next_down_steps_forward() {
        let mut e = gen123_engine();
        let d = draft();
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ResetComplete), &d);
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d);
        let actions = e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsUp), &d);
        assert_eq!(actions[0], Action::PickWoven(1));
        // The cursor doesn't move on <up> itself — only on the next <down>,
        // so a command queued in between still sees the pre-commit cursor.
        assert_eq!(e.view().next_pick, 1);
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d);
        assert_eq!(e.view().next_pick, 2);
    }

    #[test]
    fn negative_dobby_inverts_lift_on_rising_shed() {
        let mut e = Engine::new(
            EngineConfig {
                generation: Generation::Gen2,
                dobby_type: DobbyType::Negative,
                tabby_a_mask: 0,
                tabby_b_mask: 0,
            },
            ViewState::new(vec![1], 0, true),
        );
        let d = draft();
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ResetComplete), &d);
        let actions = e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d);
        let expect = (!0b0001u64) & d.shaft_mask();
        assert_eq!(
            actions,
            vec![Action::SendBinary(gen123::encode_shaft_pattern(expect))]
        );
    }

    #[test]
    fn quit_during_arms_up_holds_until_loom_releases() {
        let mut e = gen123_engine();
        let d = draft();
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ResetComplete), &d);
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d);
        e.on_user_command(Command::Quit, &d);
        assert!(!e.is_shutting_down());
        let actions = e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsUp), &d);
        assert!(actions.contains(&Action::PickWoven(1)));
    }

    #[test]
    fn quit_while_arms_already_up_shuts_down_immediately() {
        let mut e = gen123_engine();
        let d = draft();
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ResetComplete), &d);
        e.view_mut().loom_arms = Arms::Up;
        let actions = e.on_user_command(Command::Quit, &d);
        assert!(actions.contains(&Action::Shutdown));
        assert!(e.is_shutting_down());
    }

    #[test]
    fn gen4_greeting_moves_to_need_password_without_sending() {
        let mut e = gen4_engine();
        let d = draft();
        let actions = e.on_loom_event(
            LoomEvent::Text(Gen4Frame::Greeting {
                shafts: 8,
                negative: true,
            }),
            &d,
        );
        assert!(actions.is_empty());
        assert_eq!(e.state, EngineState::NeedPassword);
    }

    #[test]
    fn gen4_password_prompt_sends_password_and_unlocks_engine() {
        let mut e = gen4_engine();
        let d = draft();
        e.on_loom_event(
            LoomEvent::Text(Gen4Frame::Greeting {
                shafts: 8,
                negative: true,
            }),
            &d,
        );
        let actions = e.on_loom_event(LoomEvent::Text(Gen4Frame::Password), &d);
        assert_eq!(actions, vec![Action::SendText(gen4::encode_password())]);
        assert_eq!(e.state, EngineState::Ready);
    }

    #[test]
    fn gen4_second_pick_clears_before_sending() {
        let mut e = gen4_engine();
        let d = draft();
        e.on_loom_event(
            LoomEvent::Text(Gen4Frame::Greeting {
                shafts: 8,
                negative: true,
            }),
            &d,
        );
        e.on_loom_event(LoomEvent::Text(Gen4Frame::Password), &d);

        // First pick: no clear needed yet.
        let first = e.on_loom_event(LoomEvent::Text(Gen4Frame::Down), &d);
        assert_eq!(first, vec![Action::SendText(gen4::encode_pick(&[1]))]);
        e.on_loom_event(LoomEvent::Text(Gen4Frame::Up), &d);

        // Second pick: loom is still "dirty" from the first, so clear first.
        let second = e.on_loom_event(LoomEvent::Text(Gen4Frame::Down), &d);
        assert_eq!(second, vec![Action::SendText(gen4::encode_clear())]);
        let after_clear = e.on_loom_event(LoomEvent::Text(Gen4Frame::Ready), &d);
        assert_eq!(after_clear, vec![Action::SendText(gen4::encode_pick(&[2]))]);
    }

    #[test]
    fn dispatch_while_arms_down_is_queued_not_applied_early() {
        let mut e = gen123_engine();
        let d = draft();
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ResetComplete), &d);
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d);
        e.on_user_command(Command::AdvancePick(1), &d);
        assert_eq!(e.view().next_pick, 1); // not applied yet, still queued
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsUp), &d);
        // commit of pick 1 does not itself step the cursor; the queued
        // AdvancePick(1) is the only thing that moves it, once arms go
        // down again and flush runs.
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d);
        assert_eq!(e.view().next_pick, 2);
    }

    #[test]
    fn reverse_after_single_pick_goes_to_previous_in_new_direction() {
        let mut e = gen123_engine();
        let d = draft();
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ResetComplete), &d);
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d); // sends pick 1
        e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsUp), &d); // commits pick 1
        e.on_user_command(Command::Reverse, &d); // queued; arms are up
        let actions = e.on_loom_event(LoomEvent::Binary(BinaryFrame::ArmsDown), &d);
        // Reversing direction after weaving pick 1 steps one pick behind it
        // in the new direction, wrapping to the end of the sequence — not
        // back onto the pick that was just woven.
        assert_eq!(e.view().next_pick, 3);
        assert_eq!(
            actions,
            vec![
                Action::RedrawPrompt,
                Action::SendBinary(gen123::encode_shaft_pattern(e.resolve_lift(&d, 3))),
            ]
        );
    }

    #[test]
    fn unknown_binary_frame_warns_without_panicking() {
        let mut e = gen123_engine();
        let d = draft();
        let actions = e.on_loom_event(LoomEvent::Binary(BinaryFrame::Unknown(vec![0xAB])), &d);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Warn(_)));
    }
}
