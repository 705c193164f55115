//! The async event loop: the only place in this crate that touches a
//! socket, a terminal, or a clock. Everything it decides is handed off to
//! [`Engine`], which is free of I/O entirely.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use dobby_draft::Draft;
use dobby_terminal::{TermEvent, TermKey, Terminal};
use dobby_view::{Command, Mode};
use tokio::time::MissedTickBehavior;

use crate::engine::{Action, Engine, LoomEvent};
use crate::frame::FrameReader;
use crate::gen123;
use crate::gen4;
use crate::io::LoomConn;

/// Implemented by whatever owns the terminal's pixels; kept as a trait so
/// this crate never has to depend on the renderer crate.
pub trait Render {
    fn draw(&mut self, terminal: &Terminal, draft: &Draft, view: &dobby_view::ViewState) -> Result<()>;
    fn draw_warning(&mut self, terminal: &Terminal, message: &str) -> Result<()>;
    /// Called once per committed pick (spec §4.4 "Color-alert bell"),
    /// right after the weft-color ring has been updated and before the
    /// redraw that follows it.
    fn ring_bell(&mut self, view: &dobby_view::ViewState) -> Result<()>;
}

/// How often the engine gets a [`LoomEvent::Timeout`] tick — drives the
/// `WaitReset` ping cadence on gen 1–3.
const TICK_INTERVAL: Duration = Duration::from_secs(3);

/// Runs the weaving session until the weaver quits or the loom connection
/// drops. `persist_pick` is called with the pick to resume from every time
/// one is woven, and again right before the loop exits.
pub async fn run<R: Render>(
    mut engine: Engine,
    draft: Draft,
    mut conn: LoomConn,
    mut terminal: Terminal,
    mut render: R,
    is_gen4: bool,
    mut persist_pick: impl FnMut(i32) -> Result<()>,
) -> Result<()> {
    let terminator = if is_gen4 { b'>' } else { 0x03 };
    let mut frames = FrameReader::new(terminator);
    let mut read_buf = [0u8; 512];

    terminal.enter()?;
    render.draw(&terminal, &draft, engine.view())?;

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let actions = tokio::select! {
            term_event = terminal.next_event() => {
                match term_event? {
                    Some(ev) => handle_term_event(&mut engine, &draft, ev),
                    None => break,
                }
            }
            n = conn.read(&mut read_buf) => {
                let n = n?;
                if n == 0 {
                    continue;
                }
                tracing::trace!(target: "loom.rx", bytes = n, "read from loom");
                let mut batch = Vec::new();
                for frame in frames.push(&read_buf[..n]) {
                    log_rx(is_gen4, &frame);
                    let event = if is_gen4 {
                        LoomEvent::Text(gen4::parse_gen4_frame(&String::from_utf8_lossy(&frame)))
                    } else {
                        LoomEvent::Binary(gen123::parse_binary_frame(&frame))
                    };
                    batch.extend(engine.on_loom_event(event, &draft));
                }
                batch
            }
            _ = ticker.tick() => {
                engine.on_loom_event(LoomEvent::Timeout, &draft)
            }
        };

        apply_actions(
            actions,
            &mut engine,
            &draft,
            &mut conn,
            &mut terminal,
            &mut render,
            &mut persist_pick,
        )
        .await?;

        if engine.is_shutting_down() {
            break;
        }
    }

    terminal.leave()?;
    Ok(())
}

fn log_rx(is_gen4: bool, frame: &[u8]) {
    if is_gen4 {
        tracing::trace!(target: "loom.rx", line = %String::from_utf8_lossy(frame), "loom line");
    } else {
        tracing::trace!(target: "loom.rx", bytes = ?frame, "loom frame");
    }
}

async fn apply_actions<R: Render>(
    actions: Vec<Action>,
    engine: &mut Engine,
    draft: &Draft,
    conn: &mut LoomConn,
    terminal: &mut Terminal,
    render: &mut R,
    persist_pick: &mut impl FnMut(i32) -> Result<()>,
) -> Result<()> {
    let mut queue: VecDeque<Action> = actions.into_iter().collect();
    while let Some(action) = queue.pop_front() {
        match action {
            Action::SendBinary(bytes) => {
                tracing::trace!(target: "loom.tx", bytes = ?bytes, "write to loom");
                let followups = write_to_loom(conn, terminal, engine, draft, &bytes).await?;
                queue.extend(followups);
            }
            Action::SendText(text) => {
                tracing::trace!(target: "loom.tx", line = %text.trim_end(), "write to loom");
                let followups = write_to_loom(conn, terminal, engine, draft, text.as_bytes()).await?;
                queue.extend(followups);
            }
            Action::PickWoven(pick) => {
                if pick >= 1 {
                    if let Some(&color) = draft.weft_color.get(pick as usize) {
                        engine.view_mut().record_weft_color(color);
                    }
                }
                render.ring_bell(engine.view())?;
                persist_pick(pick)?;
                render.draw(terminal, draft, engine.view())?;
            }
            Action::RedrawPrompt => render.draw(terminal, draft, engine.view())?,
            Action::Warn(message) => {
                tracing::warn!(%message, "loom protocol warning");
                render.draw_warning(terminal, &message)?;
            }
            Action::Shutdown => {}
        }
    }
    Ok(())
}

/// Writes to the loom while still racing the terminal's event stream, so a
/// slow or partial write can't starve keystrokes (spec §4.5 "Write
/// retry"). Any terminal events observed mid-write are translated to
/// actions immediately — same as the top-level loop would — and queued for
/// the caller to run once the write completes.
async fn write_to_loom(
    conn: &mut LoomConn,
    terminal: &mut Terminal,
    engine: &mut Engine,
    draft: &Draft,
    data: &[u8],
) -> Result<Vec<Action>> {
    let mut followups = Vec::new();
    let write = conn.write_all(data);
    tokio::pin!(write);
    loop {
        tokio::select! {
            result = &mut write => {
                result?;
                return Ok(followups);
            }
            term_event = terminal.next_event() => {
                match term_event? {
                    Some(ev) => followups.extend(handle_term_event(engine, draft, ev)),
                    None => followups.extend(engine.on_user_command(Command::Quit, draft)),
                }
            }
        }
    }
}

/// Translates one decoded terminal event into engine actions, routing
/// keystrokes to free-text entry-buffer editing while a pick or pick-list
/// is being typed, and to single-key commands otherwise.
fn handle_term_event(engine: &mut Engine, draft: &Draft, ev: TermEvent) -> Vec<Action> {
    if matches!(engine.view().mode, Mode::PickEntry | Mode::PickListEntry) {
        return handle_entry_event(engine, draft, ev);
    }
    if let TermEvent::Resize(_, _) = ev {
        return vec![Action::RedrawPrompt];
    }
    match weave_command(engine, ev) {
        Some(cmd) => engine.on_user_command(cmd, draft),
        None => Vec::new(),
    }
}

fn handle_entry_event(engine: &mut Engine, draft: &Draft, ev: TermEvent) -> Vec<Action> {
    match ev {
        TermEvent::Char(c) => {
            engine.view_mut().entry_buffer.push(c);
            vec![Action::RedrawPrompt]
        }
        TermEvent::Key(TermKey::Backspace) => {
            engine.view_mut().entry_buffer.pop();
            vec![Action::RedrawPrompt]
        }
        TermEvent::Key(TermKey::Enter) => {
            let max_pick = draft.picks;
            engine.view_mut().submit_entry(max_pick, true, true, false);
            vec![Action::RedrawPrompt]
        }
        TermEvent::Key(TermKey::Esc) => {
            engine.view_mut().cancel_entry();
            vec![Action::RedrawPrompt]
        }
        TermEvent::Key(TermKey::CtrlC) => engine.on_user_command(Command::Quit, draft),
        TermEvent::Key(TermKey::CtrlL) | TermEvent::Resize(_, _) => vec![Action::RedrawPrompt],
        _ => Vec::new(),
    }
}

/// The weave-mode hotkeys. `t`/`T` toggles tabby on or off depending on
/// which mode is currently active, since there's only one key for it on
/// the keyboard overlay.
fn weave_command(engine: &Engine, ev: TermEvent) -> Option<Command> {
    match ev {
        TermEvent::Char(' ') => Some(Command::AdvancePick(1)),
        TermEvent::Char('r') | TermEvent::Char('R') => Some(Command::Reverse),
        TermEvent::Char('t') | TermEvent::Char('T') => {
            if engine.view().mode == Mode::Tabby {
                Some(Command::Liftplan)
            } else {
                Some(Command::Tabby)
            }
        }
        TermEvent::Char('p') | TermEvent::Char('P') => Some(Command::SetPick),
        TermEvent::Char('k') | TermEvent::Char('K') => Some(Command::SetPickList),
        TermEvent::Char('q') | TermEvent::Char('Q') => Some(Command::Quit),
        TermEvent::Key(TermKey::Left) => Some(Command::AdvancePick(-1)),
        TermEvent::Key(TermKey::Right) => Some(Command::AdvancePick(1)),
        TermEvent::Key(TermKey::CtrlC) => Some(Command::Quit),
        _ => None,
    }
}
