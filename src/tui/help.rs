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

pub fn draw_help(area: Rect, f: &mut Frame, ticking: bool) {
    let mut lines = vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        key_line("tab", 9, "Switch tabs (Stocks / Brokers / Help)"),
        key_line("?", 11, "Show this help"),
        key_line("r", 11, "Reload from backend"),
        Line::from(""),
        Line::from("Table:"),
        key_line("↑/↓ j/k", 5, "Select row"),
        key_line("←/→", 9, "Previous / next page"),
        key_line("g/G", 9, "First / last page"),
        key_line("+/-", 9, "More / fewer rows per page"),
        key_line("/", 11, "Edit filter (id + name), Enter/Esc to leave"),
        key_line("i n p m", 5, "Sort by id, name, price, amount (asc → desc → off)"),
        Line::from(""),
        Line::from("Records:"),
        key_line("a", 11, "Add"),
        key_line("e / Enter", 3, "Edit selected"),
        key_line("d", 11, "Delete selected"),
        Line::from(""),
        Line::from("Dialogs:"),
        key_line("tab / S-tab", 1, "Next / previous field"),
        key_line("Enter", 7, "Save / confirm"),
        key_line("Esc", 9, "Cancel"),
    ];
    if ticking {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Prices are simulated: they drift every refresh interval.",
            Style::default().fg(Color::Gray),
        )));
    }
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
