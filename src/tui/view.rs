use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use super::grid::draw_grid;
use crate::shared::DisplayState;

const HELP: &str = "space play/pause  enter toggle  tab setting  -/= adjust  q quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // transport + settings
            Constraint::Length(state.rows.len() as u16 + 3), // grid incl. cursor row
            Constraint::Length(1), // status
            Constraint::Min(0),
        ])
        .split(area);

    draw_settings(frame, sections[0], state);
    draw_grid(frame, sections[1], state);
    draw_status(frame, sections[2], state);
}

fn draw_settings(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (transport, color) = if state.playing {
        ("▶ PLAY ", Color::Green)
    } else {
        ("■ STOP ", Color::DarkGray)
    };
    let mut spans = vec![Span::styled(transport, Style::default().fg(color).add_modifier(Modifier::BOLD))];

    for (name, value) in &state.settings {
        let style = if *name == state.selected_setting {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Cyan)
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!("{} {value}", name.label()), style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let text = if state.status.is_empty() { HELP } else { state.status.as_str() };
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
