use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use crate::shared::{Direction, InputEvent};

// poll for input from the terminal and map key presses to input events
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    let mut events = Vec::new();
    // drain whatever else is already queued so held keys don't lag behind
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                events.extend(handle_key(key.code));
            }
        }
        if !event::poll(Duration::ZERO)? {
            break;
        }
    }
    Ok(events)
}

fn handle_key(code: KeyCode) -> Option<InputEvent> {
    let event = match code {
        KeyCode::Esc | KeyCode::Char('q') => InputEvent::Quit,
        KeyCode::Char(' ') => InputEvent::PlayPress,
        KeyCode::Enter | KeyCode::Char('x') => InputEvent::ToggleNote,
        KeyCode::Tab => InputEvent::NextSetting,

        KeyCode::Up | KeyCode::Char('k') => InputEvent::MoveCursor(Direction::Up),
        KeyCode::Down | KeyCode::Char('j') => InputEvent::MoveCursor(Direction::Down),
        KeyCode::Left | KeyCode::Char('h') => InputEvent::MoveCursor(Direction::Left),
        KeyCode::Right | KeyCode::Char('l') => InputEvent::MoveCursor(Direction::Right),

        // lowercase = step by one, shifted = step by ten
        KeyCode::Char('-') => InputEvent::AdjustSetting(-1),
        KeyCode::Char('=') => InputEvent::AdjustSetting(1),
        KeyCode::Char('_') => InputEvent::AdjustSetting(-10),
        KeyCode::Char('+') => InputEvent::AdjustSetting(10),

        _ => return None,
    };
    Some(event)
}
