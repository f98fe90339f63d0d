use std::collections::HashMap;
use std::time::{Duration, Instant};

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::shared::{CellState, DisplayState, Emphasis, Instrument};

pub const FLASH: Duration = Duration::from_millis(600);

const NAME_WIDTH: usize = 11;

// What the grid shows about playback: which column the play cursor is on and
// which cells are flashing. Owned by one view, fed from tick announcements.
#[derive(Debug, Default)]
pub struct GridView {
    playing_tick: Option<usize>,
    flashes: HashMap<(Instrument, usize), Instant>, // cell -> flash end
}

impl GridView {
    pub fn on_tick<I>(&mut self, index: usize, instruments: I, now: Instant)
    where
        I: IntoIterator<Item = Instrument>,
    {
        self.playing_tick = Some(index);
        for instrument in instruments {
            self.flashes.insert((instrument, index), now + FLASH);
        }
    }

    pub fn playing_tick(&self) -> Option<usize> {
        self.playing_tick
    }

    pub fn is_flashing(&self, instrument: Instrument, index: usize, now: Instant) -> bool {
        self.flashes
            .get(&(instrument, index))
            .is_some_and(|end| *end > now)
    }

    // Forget finished flashes and anything past the end of a shrunk loop.
    pub fn expire(&mut self, now: Instant, loop_len: usize) {
        self.flashes
            .retain(|(_, index), end| *end > now && *index < loop_len);
        if self.playing_tick.is_some_and(|t| t >= loop_len) {
            self.playing_tick = None;
        }
    }

    pub fn clear(&mut self) {
        self.playing_tick = None;
        self.flashes.clear();
    }
}

fn separator(emphasis: Emphasis) -> &'static str {
    match emphasis {
        Emphasis::Bar => "|",
        Emphasis::Beat => ":",
        Emphasis::Tick => " ",
    }
}

pub fn draw_grid(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mut lines = Vec::with_capacity(state.rows.len() + 1);

    // play cursor row
    let mut header = vec![Span::raw(" ".repeat(NAME_WIDTH))];
    for (col, emphasis) in state.emphasis.iter().enumerate() {
        let mark = if state.playing_tick == Some(col) { "▼" } else { " " };
        header.push(Span::raw(separator(*emphasis)));
        header.push(Span::styled(mark, Style::default().fg(Color::Yellow)));
    }
    lines.push(Line::from(header));

    for (row, (name, cells)) in state.rows.iter().enumerate() {
        let name_style = if state.selected.0 == row {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut spans = vec![Span::styled(format!("{name:<NAME_WIDTH$}"), name_style)];

        for (col, cell) in cells.iter().enumerate() {
            let emphasis = state.emphasis.get(col).copied().unwrap_or(Emphasis::Tick);
            spans.push(Span::styled(
                separator(emphasis),
                Style::default().fg(Color::DarkGray),
            ));

            let (glyph, mut style) = match cell {
                CellState::Rest => ("·", Style::default().fg(Color::DarkGray)),
                CellState::Note => ("●", Style::default().fg(Color::Magenta)),
                CellState::Hit => ("●", Style::default().fg(Color::LightMagenta).bg(Color::Magenta)),
            };
            if state.playing_tick == Some(col) {
                style = style.add_modifier(Modifier::BOLD);
            }
            if state.selected == (row, col) {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(glyph, style));
        }
        lines.push(Line::from(spans));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", state.channel_name));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use super::{FLASH, GridView};
    use crate::shared::Instrument;

    #[test]
    fn flash_lasts_its_duration() {
        let t0 = Instant::now();
        let mut view = GridView::default();
        view.on_tick(3, [Instrument::J, Instrument::D], t0);

        assert_eq!(view.playing_tick(), Some(3));
        assert!(view.is_flashing(Instrument::J, 3, t0 + Duration::from_millis(599)));
        assert!(!view.is_flashing(Instrument::J, 3, t0 + FLASH));
        assert!(!view.is_flashing(Instrument::A, 3, t0));
        assert!(!view.is_flashing(Instrument::J, 4, t0));
    }

    #[test]
    fn retriggered_cell_flashes_again() {
        let t0 = Instant::now();
        let mut view = GridView::default();
        view.on_tick(0, [Instrument::J], t0);
        view.on_tick(0, [Instrument::J], t0 + Duration::from_millis(500));
        assert!(view.is_flashing(Instrument::J, 0, t0 + Duration::from_millis(900)));
    }

    #[test]
    fn expire_drops_old_and_out_of_range() {
        let t0 = Instant::now();
        let mut view = GridView::default();
        view.on_tick(1, [Instrument::A], t0);
        view.on_tick(20, [Instrument::B], t0);
        view.expire(t0, 16);
        assert!(view.is_flashing(Instrument::A, 1, t0));
        assert!(!view.is_flashing(Instrument::B, 20, t0));
        assert_eq!(view.playing_tick(), None);

        view.expire(t0 + FLASH, 16);
        assert!(view.flashes.is_empty());
    }
}
