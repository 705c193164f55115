//! Decodes raw crossterm events into the four-way shape the loom protocol
//! engine actually switches on (spec §4.5 "Input multiplexing": `{Char, Key,
//! Resize, None}`).

use crossterm::event::{
    Event as CEvent, KeyCode as CKeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};

/// The named, non-printable keys the engine's mode handlers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKey {
    CtrlC,
    CtrlL,
    Esc,
    Enter,
    Backspace,
    Tab,
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermEvent {
    Char(char),
    Key(TermKey),
    Resize(u16, u16),
    None,
}

/// Translates one crossterm [`CEvent`] into a [`TermEvent`]. Key releases
/// (only reported under `KeyboardEnhancementFlags`) are swallowed as `None`
/// since the engine only reacts to presses and repeats.
pub fn decode(event: CEvent) -> TermEvent {
    match event {
        CEvent::Resize(cols, rows) => TermEvent::Resize(cols, rows),
        CEvent::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) => {
            if kind == KeyEventKind::Release {
                return TermEvent::None;
            }
            if modifiers.contains(KeyModifiers::CONTROL) {
                if let CKeyCode::Char(c) = code {
                    match c.to_ascii_lowercase() {
                        'c' => return TermEvent::Key(TermKey::CtrlC),
                        'l' => return TermEvent::Key(TermKey::CtrlL),
                        _ => {}
                    }
                }
            }
            match code {
                CKeyCode::Char(c) => TermEvent::Char(c),
                CKeyCode::Esc => TermEvent::Key(TermKey::Esc),
                CKeyCode::Enter => TermEvent::Key(TermKey::Enter),
                CKeyCode::Backspace => TermEvent::Key(TermKey::Backspace),
                CKeyCode::Tab => TermEvent::Key(TermKey::Tab),
                CKeyCode::Left => TermEvent::Key(TermKey::Left),
                CKeyCode::Right => TermEvent::Key(TermKey::Right),
                CKeyCode::Up => TermEvent::Key(TermKey::Up),
                CKeyCode::Down => TermEvent::Key(TermKey::Down),
                _ => TermEvent::None,
            }
        }
        _ => TermEvent::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: CKeyCode, modifiers: KeyModifiers) -> CEvent {
        CEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        })
    }

    #[test]
    fn decodes_plain_char() {
        assert_eq!(
            decode(key(CKeyCode::Char('p'), KeyModifiers::NONE)),
            TermEvent::Char('p')
        );
    }

    #[test]
    fn decodes_ctrl_c_distinctly_from_c() {
        assert_eq!(
            decode(key(CKeyCode::Char('c'), KeyModifiers::CONTROL)),
            TermEvent::Key(TermKey::CtrlC)
        );
    }

    #[test]
    fn decodes_ctrl_l() {
        assert_eq!(
            decode(key(CKeyCode::Char('l'), KeyModifiers::CONTROL)),
            TermEvent::Key(TermKey::CtrlL)
        );
    }

    #[test]
    fn decodes_esc_and_enter() {
        assert_eq!(
            decode(key(CKeyCode::Esc, KeyModifiers::NONE)),
            TermEvent::Key(TermKey::Esc)
        );
        assert_eq!(
            decode(key(CKeyCode::Enter, KeyModifiers::NONE)),
            TermEvent::Key(TermKey::Enter)
        );
    }

    #[test]
    fn decodes_resize() {
        assert_eq!(decode(CEvent::Resize(80, 24)), TermEvent::Resize(80, 24));
    }

    #[test]
    fn key_release_is_none() {
        let ev = CEvent::Key(KeyEvent {
            code: CKeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::empty(),
        });
        assert_eq!(decode(ev), TermEvent::None);
    }
}
