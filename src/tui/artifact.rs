use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::state::UiState;
use crate::model::Artifact;

/// Lines of the artifact panel: id, creation time when known, then the pretty-printed output.
pub fn artifact_lines(a: &Artifact) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled("ID: ", Style::default().fg(Color::Gray)),
        Span::styled(a.id.clone(), Style::default().fg(Color::Cyan)),
    ])];
    if let Some(created) = a.created_display() {
        lines.push(Line::from(vec![
            Span::styled("Created: ", Style::default().fg(Color::Gray)),
            Span::raw(created),
        ]));
    }
    if let Some(mode) = a.mode.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("Mode: ", Style::default().fg(Color::Gray)),
            Span::raw(mode.to_string()),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Structured output",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.extend(
        a.pretty_output()
            .lines()
            .map(|l| Line::from(l.to_string())),
    );
    lines
}

pub fn draw_artifact(area: Rect, f: &mut Frame, state: &UiState) {
    let Some(a) = state.session.artifact.as_ref() else {
        return;
    };
    let p = Paragraph::new(artifact_lines(a))
        .wrap(Wrap { trim: false })
        .scroll((state.artifact_scroll, 0))
        .block(Block::default().borders(Borders::ALL).title("Artifact"));
    f.render_widget(p, area);
}
