use cadence_lib::catalog::{TrackDescriptor, TrackId};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph},
    Terminal,
};

use crate::controls::StatusSnapshot;

pub struct View<'a> {
    pub tracks: &'a [TrackDescriptor],
    pub selected: Option<&'a TrackId>,
    pub cursor: usize,
    pub status: &'a StatusSnapshot,
    pub log_lines: &'a [String],
}

pub fn draw(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, view: &View) {
    let _ = terminal.draw(|f| {
        let status_height = view.status.text.lines().count() as u16 + 2;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Percentage(45),
                Constraint::Length(status_height),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(f.size());

        let controls = Paragraph::new(
            "space=play/pause  ←/→=seek 10s  n/p=next/previous  ↑/↓+enter=choose  q=quit",
        )
        .style(Style::default().fg(Color::Blue))
        .block(Block::default().borders(Borders::ALL).title("Controls"));
        f.render_widget(controls, chunks[0]);

        let items: Vec<ListItem> = view
            .tracks
            .iter()
            .map(|track| {
                let marker = if view.selected == Some(&track.id) { "▶ " } else { "  " };
                ListItem::new(format!(
                    "{}{}  ({:.1}x)",
                    marker, track.display_name, track.speed
                ))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Tracks"))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default();
        if !view.tracks.is_empty() {
            state.select(Some(view.cursor.min(view.tracks.len() - 1)));
        }
        f.render_stateful_widget(list, chunks[1], &mut state);

        let status_widget = Paragraph::new(view.status.text.as_str())
            .style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .block(Block::default().borders(Borders::ALL).title("Playback"));
        f.render_widget(status_widget, chunks[2]);

        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(view.status.progress.clamp(0.0, 1.0))
            .label(view.status.gauge_label.as_str());
        f.render_widget(gauge, chunks[3]);

        let log_height = chunks[4].height.saturating_sub(2) as usize;
        let start = view.log_lines.len().saturating_sub(log_height);
        let log_text = if view.log_lines.is_empty() {
            "No logs yet.".to_string()
        } else {
            view.log_lines[start..].join("\n")
        };

        let log_widget = Paragraph::new(log_text)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Logs"));
        f.render_widget(log_widget, chunks[4]);
    });
}
