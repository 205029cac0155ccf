//! UI rendering for the TUI.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};
use tably_core::format::{format_money, format_record_date, format_split_each};
use tably_core::{Participant, Stage, TipMode};

use crate::app::{App, ReviewFocus};

// ========== Colors ==========

/// Accent for headers and key hints
const ACCENT: Color = Color::Rgb(16, 185, 129);
/// Dim gray for secondary text
const DIM: Color = Color::Rgb(128, 128, 128);
/// Error text
const ERROR_COLOR: Color = Color::Rgb(239, 68, 68);
/// Warning hint (unassigned items)
const WARN_COLOR: Color = Color::Rgb(245, 158, 11);
/// Border for input prompts
const PROMPT_BORDER: Color = Color::Rgb(59, 130, 246);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    match app.session.stage() {
        Stage::Home => render_home(frame, app),
        Stage::Capturing { .. } => render_capture(frame, app),
        Stage::Assigning => render_assign(frame, app),
        Stage::Reviewing => render_review(frame, app),
    }
}

/// Map a participant's hex accent (e.g. "#10b981") to a terminal color.
fn participant_color(participant: &Participant) -> Color {
    let hex = participant.color.trim_start_matches('#');
    if hex.len() == 6 {
        if let (Ok(r), Ok(g), Ok(b)) = (
            u8::from_str_radix(&hex[0..2], 16),
            u8::from_str_radix(&hex[2..4], 16),
            u8::from_str_radix(&hex[4..6], 16),
        ) {
            return Color::Rgb(r, g, b);
        }
    }
    Color::White
}

/// Render the header with title.
fn render_header(frame: &mut Frame, title: &str, area: Rect) {
    let header = Paragraph::new(format!(" tably  {}", title))
        .style(Style::default().fg(ACCENT).bold())
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

/// Render a single-line footer with key hints.
fn render_footer(frame: &mut Frame, hints: &str, area: Rect) {
    let footer = Paragraph::new(hints).style(Style::default().fg(DIM));
    frame.render_widget(footer, area);
}

// ========== Home ==========

/// Render the home view (recent splits table).
fn render_home(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Min(5),    // Recent splits
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, "Split a restaurant bill", chunks[0]);

    if app.recent.is_empty() {
        let empty = Paragraph::new("No splits yet. Press 's' to scan a receipt.")
            .style(Style::default().fg(DIM))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Recent splits "),
            );
        frame.render_widget(empty, chunks[1]);
    } else {
        let rows: Vec<Row> = app
            .recent
            .iter()
            .map(|record| {
                let label = record.label.as_deref().unwrap_or("(unlabeled)");
                Row::new(vec![
                    Cell::from(label.to_string()),
                    Cell::from(format_record_date(record.created_at)),
                    Cell::from(format_money(record.total)),
                    Cell::from(format!("{} people", record.participants.len())),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Min(20),
                Constraint::Length(14),
                Constraint::Length(10),
                Constraint::Length(10),
            ],
        )
        .header(
            Row::new(vec!["Label", "Date", "Total", "People"])
                .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Recent splits "),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        frame.render_stateful_widget(table, chunks[1], &mut app.recent_state);
    }

    render_footer(
        frame,
        " s scan receipt  ↑/↓ select  Enter reopen  q quit",
        chunks[2],
    );
}

// ========== Capture ==========

/// Render the capture view (path prompt / scanning indicator).
fn render_capture(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Min(5),    // Prompt
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, "Scan a receipt", chunks[0]);

    let mut lines: Vec<Line> = Vec::new();
    if app.scanning() {
        lines.push(Line::from(Span::styled(
            "Scanning receipt...",
            Style::default().fg(ACCENT).bold(),
        )));
        lines.push(Line::from(Span::styled(
            "Reading line items from the image",
            Style::default().fg(DIM),
        )));
    } else {
        lines.push(Line::from(vec![
            Span::styled("Image path: ", Style::default().fg(DIM)),
            Span::raw(app.path_input.clone()),
            Span::styled("_", Style::default().fg(ACCENT)),
        ]));
        if let Some(error) = app.session.capture_error() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                format!("Scan failed: {}", error),
                Style::default().fg(ERROR_COLOR),
            )));
            lines.push(Line::from(Span::styled(
                "Fix the path or try again.",
                Style::default().fg(DIM),
            )));
        }
    }

    let prompt = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(PROMPT_BORDER))
                .title(" Receipt image "),
        );
    frame.render_widget(prompt, chunks[1]);

    let hints = if app.scanning() {
        " scanning..."
    } else {
        " type path  Enter scan  Esc back"
    };
    render_footer(frame, hints, chunks[2]);
}

// ========== Assign ==========

/// Render the assign view (participant strip + item list).
fn render_assign(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Length(3), // Participant strip
        Constraint::Min(5),    // Items
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, "Who had what?", chunks[0]);
    render_participant_strip(frame, app, chunks[1]);
    render_item_table(frame, app, chunks[2]);

    let hints = if app.session.is_fully_assigned() {
        " Space toggle  Tab next person  a add person  r review  Esc discard".to_string()
    } else {
        format!(
            " Space toggle  Tab next person  a add person  r review ({} unassigned)  Esc discard",
            app.session
                .items()
                .iter()
                .filter(|i| i.assigned_to.is_empty())
                .count()
        )
    };
    render_footer(frame, &hints, chunks[3]);

    if app.adding_participant {
        render_text_prompt(frame, " Add person ", &app.name_input, area);
    }
}

/// Render the participant strip with accent colors; the active assignee
/// is highlighted.
fn render_participant_strip(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans: Vec<Span> = vec![Span::raw(" ")];
    for (idx, participant) in app.session.participants().iter().enumerate() {
        let color = participant_color(participant);
        let style = if idx == app.active_participant {
            Style::default()
                .fg(Color::Black)
                .bg(color)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color)
        };
        spans.push(Span::styled(format!(" {} ", participant.name), style));
        spans.push(Span::raw(" "));
    }

    let strip = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" People (Tab to switch) "),
    );
    frame.render_widget(strip, area);
}

/// Render the item table with assignees and per-assignee split price.
fn render_item_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let participants = app.session.participants();
    let rows: Vec<Row> = app
        .session
        .items()
        .iter()
        .map(|item| {
            let assignees = if item.assigned_to.is_empty() {
                Span::styled("unassigned", Style::default().fg(WARN_COLOR))
            } else {
                let names: Vec<&str> = participants
                    .iter()
                    .filter(|p| item.assigned_to.contains(&p.id))
                    .map(|p| p.name.as_str())
                    .collect();
                Span::raw(names.join(", "))
            };
            let split = if item.assigned_to.len() > 1 {
                format_split_each(item.split_price())
            } else {
                String::new()
            };
            Row::new(vec![
                Cell::from(item.name.clone()),
                Cell::from(format!("x{}", item.quantity)),
                Cell::from(format_money(item.price)),
                Cell::from(Line::from(assignees)),
                Cell::from(split),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(4),
            Constraint::Length(9),
            Constraint::Min(14),
            Constraint::Length(11),
        ],
    )
    .header(
        Row::new(vec!["Item", "Qty", "Price", "Shared by", "Split"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(" Items "))
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    frame.render_stateful_widget(table, area, &mut app.item_state);
}

// ========== Review ==========

/// Render the review view (tax/tip inputs + per-participant breakdown).
fn render_review(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Length(4), // Tax/tip inputs + totals
        Constraint::Min(5),    // Breakdown
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, "Settle up", chunks[0]);

    let split = app.session.current_split();

    // Tax/tip inputs and the headline totals
    let field_style = |focus: ReviewFocus| {
        if app.review_focus == focus {
            Style::default().fg(Color::Black).bg(ACCENT)
        } else {
            Style::default().fg(Color::White)
        }
    };
    let tip_suffix = match app.tip_mode() {
        TipMode::Percent => "%",
        TipMode::Absolute => "$",
    };
    let totals = vec![
        Line::from(vec![
            Span::styled("Tax (t): ", Style::default().fg(DIM)),
            Span::styled(
                format!(" {} ", app.session.tax_text()),
                field_style(ReviewFocus::Tax),
            ),
            Span::raw("   "),
            Span::styled(format!("Tip (p) [{}]: ", tip_suffix), Style::default().fg(DIM)),
            Span::styled(
                format!(" {} ", app.session.tip_text()),
                field_style(ReviewFocus::Tip),
            ),
        ]),
        Line::from(vec![
            Span::styled("Subtotal ", Style::default().fg(DIM)),
            Span::raw(format_money(split.subtotal)),
            Span::styled("  Tax ", Style::default().fg(DIM)),
            Span::raw(format_money(split.tax_amount)),
            Span::styled("  Tip ", Style::default().fg(DIM)),
            Span::raw(format_money(split.tip_amount)),
            Span::styled("  Total ", Style::default().fg(DIM)),
            Span::styled(
                format_money(split.grand_total),
                Style::default().fg(ACCENT).bold(),
            ),
        ]),
    ];
    let totals_block = Paragraph::new(totals)
        .block(Block::default().borders(Borders::ALL).title(" Bill "));
    frame.render_widget(totals_block, chunks[1]);

    // Per-participant breakdown
    let mut lines: Vec<Line> = Vec::new();
    for share in &split.per_participant {
        let color = participant_color(&share.participant);
        lines.push(Line::from(vec![
            Span::styled(
                format!("{} ", share.participant.name),
                Style::default().fg(color).bold(),
            ),
            Span::styled(
                format_money(share.total),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    "  (items {} + tax {} + tip {})",
                    format_money(share.item_subtotal),
                    format_money(share.tax_share),
                    format_money(share.tip_share)
                ),
                Style::default().fg(DIM),
            ),
        ]));
        for owned in &share.items {
            lines.push(Line::from(Span::styled(
                format!("    {} {}", owned.name, format_money(owned.price)),
                Style::default().fg(DIM),
            )));
        }
    }
    if split.per_participant.is_empty() {
        lines.push(Line::from(Span::styled(
            "Nobody owes anything yet. Esc to go back and assign items.",
            Style::default().fg(DIM),
        )));
    }

    let breakdown = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Who owes what "),
        );
    frame.render_widget(breakdown, chunks[2]);

    let hints = if app.review_focus == ReviewFocus::None {
        " t tax  p tip  % tip mode  f finish  Esc back"
    } else {
        " type amount  Enter done  Esc done"
    };
    render_footer(frame, hints, chunks[3]);

    if app.entering_label {
        render_text_prompt(frame, " Name this split (optional) ", &app.label_input, area);
    }
}

// ========== Prompts ==========

/// Render a centered single-line text prompt over the current view.
fn render_text_prompt(frame: &mut Frame, title: &str, input: &str, area: Rect) {
    let width = area.width.saturating_sub(8).min(50).max(20);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + area.height / 2,
        width,
        height: 3,
    };

    frame.render_widget(Clear, popup);
    let prompt = Paragraph::new(Line::from(vec![
        Span::raw(input.to_string()),
        Span::styled("_", Style::default().fg(ACCENT)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(PROMPT_BORDER))
            .title(title),
    );
    frame.render_widget(prompt, popup);
}
