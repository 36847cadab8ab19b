mod help;
mod keys;
mod state;

use crate::cli::{build_config, Cli};
use crate::dialog::{Field, RecordDialog};
use crate::model::{DeskEvent, RecordKind};
use crate::orchestrator::{self, UiCommand};
use crate::table::{page_count, SortDirection, SortKey, TableViewModel, ViewState};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use keys::{handle_key, KeyOutcome};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the controller and the render loop.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<DeskEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let cfg = build_config(&args);
    let ui_state = UiState::new(
        cfg.initial_kind,
        args.initial_view(),
        cfg.refresh_interval.is_some(),
    );

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(ui_state, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&cfg, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

fn now_stamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "now".into())
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<DeskEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();
    info!("tui started");

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        let mut controller_gone = false;
        loop {
            match event_rx.try_recv() {
                Ok(ev) => {
                    apply_event(&mut state, ev);
                    dirty = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    controller_gone = true;
                    break;
                }
            }
        }
        if controller_gone {
            debug!("controller closed its event channel");
            break Ok(());
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                match handle_key(&mut state, k) {
                    KeyOutcome::Continue => {}
                    KeyOutcome::Command(cmd) => {
                        debug!(?cmd, "ui command");
                        let _ = cmd_tx.send(cmd);
                    }
                    KeyOutcome::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn apply_event(state: &mut UiState, ev: DeskEvent) {
    match ev {
        DeskEvent::Records { kind, records } => state.apply_records(kind, records, now_stamp()),
        DeskEvent::Info(msg) => state.info = msg,
        DeskEvent::Alert(msg) => state.alert = Some(msg),
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from(RecordKind::Stocks.title()),
        Line::from(RecordKind::Brokers.title()),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("tickerdesk"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match (state.kind(), state.table()) {
        (Some(kind), Some(table)) => draw_table(chunks[1], f, state, kind, table),
        _ => help::draw_help(chunks[1], f, state.ticking),
    }

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Info: ", Style::default().fg(Color::Gray)),
            Span::raw(state.info.as_str()),
        ])),
        chunks[2],
    );

    if let Some(dialog) = state.dialog.as_ref() {
        draw_dialog(area, f, dialog);
    }
    if let Some(alert) = state.alert.as_deref() {
        draw_alert(area, f, alert);
    }
}

fn header_label(view: &ViewState, key: SortKey) -> String {
    match (view.sort.key, view.sort.direction) {
        (Some(k), SortDirection::Asc) if k == key => format!("{} ↑", key.label()),
        (Some(k), SortDirection::Desc) if k == key => format!("{} ↓", key.label()),
        _ => key.label().to_string(),
    }
}

fn draw_table(
    area: Rect,
    f: &mut ratatui::Frame,
    state: &UiState,
    kind: RecordKind,
    table: &TableViewModel,
) {
    let rows_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(1)].as_ref())
        .split(area);

    // Filter input
    let filter_style = if state.filter_editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let filter_text = if state.filter_input.value().is_empty() && !state.filter_editing {
        Span::styled("press / to filter by id or name", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(state.filter_input.value())
    };
    f.render_widget(
        Paragraph::new(Line::from(filter_text)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(filter_style)
                .title("Filter"),
        ),
        rows_area[0],
    );
    if state.filter_editing {
        f.set_cursor_position(Position::new(
            rows_area[0].x + 1 + state.filter_input.cursor() as u16,
            rows_area[0].y + 1,
        ));
    }

    // Records
    let view = table.view();
    let page = table.page();
    let header = Row::new(
        SortKey::ALL
            .iter()
            .map(|&k| Cell::from(header_label(view, k)))
            .collect::<Vec<_>>(),
    )
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let rows = page.rows.iter().map(|r| {
        Row::new(vec![
            Cell::from(r.id.to_string()),
            Cell::from(r.name.clone()),
            Cell::from(r.price.clone()).style(Style::default().fg(Color::Green)),
            Cell::from(r.amount.clone()),
        ])
    });
    let widths = [
        Constraint::Length(8),
        Constraint::Min(16),
        Constraint::Length(14),
        Constraint::Length(12),
    ];
    let title = match state.last_update[kind.index()].as_deref() {
        Some(stamp) => format!("{} (updated {stamp})", kind.title()),
        None => format!("{} (loading…)", kind.title()),
    };
    let widget = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut table_state = TableState::default();
    if !page.rows.is_empty() {
        table_state.select(Some(state.selected));
    }
    f.render_stateful_widget(widget, rows_area[1], &mut table_state);

    // Paginator
    let pages = page_count(page.filtered_len, page.page_size);
    let paginator = Line::from(vec![
        Span::styled("Rows per page: ", Style::default().fg(Color::Gray)),
        Span::raw(page.page_size.to_string()),
        Span::raw("   "),
        Span::raw(page.range_label()),
        Span::raw("   "),
        Span::styled("Page ", Style::default().fg(Color::Gray)),
        Span::raw(format!("{}/{}", page.page_index.saturating_add(1), pages)),
        Span::raw("   "),
        Span::styled("a", Style::default().fg(Color::Magenta)),
        Span::raw(" add  "),
        Span::styled("e", Style::default().fg(Color::Magenta)),
        Span::raw(" edit  "),
        Span::styled("d", Style::default().fg(Color::Magenta)),
        Span::raw(" delete  "),
        Span::styled("?", Style::default().fg(Color::Magenta)),
        Span::raw(" help"),
    ]);
    f.render_widget(Paragraph::new(paginator), rows_area[2]);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_dialog(area: Rect, f: &mut ratatui::Frame, dialog: &RecordDialog) {
    let popup = centered_rect(60, 11, area);
    f.render_widget(Clear, popup);

    let label_w = 8u16;
    let mut lines = Vec::new();
    if let Some(id) = dialog.id() {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<8}", "Id"), Style::default().fg(Color::Gray)),
            Span::raw(id.to_string()),
        ]));
    }
    let first_field_row = lines.len();
    for field in Field::ALL {
        let focused = !dialog.is_read_only() && dialog.focus() == field;
        let value_style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let mut spans = vec![
            Span::styled(format!("{:<8}", field.label()), Style::default().fg(Color::Gray)),
            Span::styled(dialog.input(field).value().to_string(), value_style),
        ];
        if let Some(err) = dialog.error_for(field) {
            spans.push(Span::styled(format!("  {err}"), Style::default().fg(Color::Red)));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(""));
    let hint = if dialog.is_read_only() {
        "y / Enter delete   n / Esc cancel"
    } else {
        "Enter save   Esc cancel   Tab next field"
    };
    lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::Magenta))));

    let border = if dialog.is_read_only() {
        Color::Red
    } else {
        Color::Yellow
    };
    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(dialog.title()),
        ),
        popup,
    );

    if !dialog.is_read_only() {
        let row = Field::ALL
            .iter()
            .position(|&field| field == dialog.focus())
            .unwrap_or(0)
            + first_field_row;
        f.set_cursor_position(Position::new(
            popup.x + 1 + label_w + dialog.input(dialog.focus()).cursor() as u16,
            popup.y + 1 + row as u16,
        ));
    }
}

fn draw_alert(area: Rect, f: &mut ratatui::Frame, message: &str) {
    let popup = centered_rect(64, 8, area);
    f.render_widget(Clear, popup);
    let p = Paragraph::new(vec![
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to dismiss",
            Style::default().fg(Color::Gray),
        )),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title("Error"),
    );
    f.render_widget(p, popup);
}
