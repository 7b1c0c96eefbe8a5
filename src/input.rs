//! Key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Game command from a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RotateLeft,
    RotateRight,
    Rotate180,
    MoveLeft,
    MoveRight,
    SoftDropStart,
    SoftDropStop,
    HardDrop,
    Reset,
    Quit,
    None,
}

/// Map a key event to a command. Only the soft-drop key reacts to repeats and releases.
pub fn key_to_command(key: KeyEvent) -> Command {
    let KeyEvent {
        code,
        modifiers,
        kind,
        ..
    } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Command::Quit;
    }
    if code == KeyCode::Down {
        return match kind {
            KeyEventKind::Release => Command::SoftDropStop,
            _ => Command::SoftDropStart,
        };
    }
    if kind != KeyEventKind::Press {
        return Command::None;
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Command::None;
    }
    match code {
        KeyCode::Up => Command::RotateRight,
        KeyCode::Char('z') | KeyCode::Char('Z') => Command::RotateLeft,
        KeyCode::Char('a') | KeyCode::Char('A') => Command::Rotate180,
        KeyCode::Left => Command::MoveLeft,
        KeyCode::Right => Command::MoveRight,
        KeyCode::Char(' ') => Command::HardDrop,
        KeyCode::Esc | KeyCode::Char('r') | KeyCode::Char('R') => Command::Reset,
        KeyCode::Char('q') | KeyCode::Char('Q') => Command::Quit,
        _ => Command::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    fn press(code: KeyCode) -> Command {
        key_to_command(key(code, KeyEventKind::Press))
    }

    #[test]
    fn movement_and_rotation_keys() {
        assert_eq!(press(KeyCode::Up), Command::RotateRight);
        assert_eq!(press(KeyCode::Char('z')), Command::RotateLeft);
        assert_eq!(press(KeyCode::Char('a')), Command::Rotate180);
        assert_eq!(press(KeyCode::Left), Command::MoveLeft);
        assert_eq!(press(KeyCode::Right), Command::MoveRight);
        assert_eq!(press(KeyCode::Char(' ')), Command::HardDrop);
        assert_eq!(press(KeyCode::Esc), Command::Reset);
        assert_eq!(press(KeyCode::Char('q')), Command::Quit);
        assert_eq!(press(KeyCode::Char('x')), Command::None);
    }

    #[test]
    fn soft_drop_follows_press_and_release() {
        assert_eq!(press(KeyCode::Down), Command::SoftDropStart);
        assert_eq!(
            key_to_command(key(KeyCode::Down, KeyEventKind::Repeat)),
            Command::SoftDropStart
        );
        assert_eq!(
            key_to_command(key(KeyCode::Down, KeyEventKind::Release)),
            Command::SoftDropStop
        );
    }

    #[test]
    fn repeats_and_releases_of_other_keys_are_ignored() {
        assert_eq!(
            key_to_command(key(KeyCode::Left, KeyEventKind::Repeat)),
            Command::None
        );
        assert_eq!(
            key_to_command(key(KeyCode::Char(' '), KeyEventKind::Release)),
            Command::None
        );
    }

    #[test]
    fn ctrl_c_quits() {
        let ev = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_to_command(ev), Command::Quit);
        let ev = KeyEvent::new(KeyCode::Char('z'), KeyModifiers::ALT);
        assert_eq!(key_to_command(ev), Command::None);
    }
}
