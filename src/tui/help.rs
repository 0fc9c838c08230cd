use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame, log_path: Option<&str>) {
    let mut lines = vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("Esc", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        key_line("Tab", 9, "Next field (Shift-Tab: previous)"),
        key_line("←/→", 9, "Change mode (mode field)"),
        key_line("Ctrl-S", 6, "Convert raw input into an artifact"),
        key_line("Enter", 7, "Load artifact (id field) / new line (raw input)"),
        key_line("Ctrl-L", 6, "Load artifact by id"),
        key_line("Ctrl-D", 6, "Download artifact ZIP"),
        key_line("Ctrl-Y", 6, "Copy artifact id to clipboard"),
        key_line("PgUp/PgDn", 3, "Scroll artifact"),
        key_line("F1", 10, "Toggle this help"),
        Line::from(""),
        Line::from("Only one request runs at a time; actions are ignored while busy."),
    ];
    if let Some(p) = log_path {
        lines.push(Line::from(""));
        lines.push(Line::from("Log file:"));
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(p.to_string(), Style::default().fg(Color::Cyan)),
        ]));
    }
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
