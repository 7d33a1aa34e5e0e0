use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation, Wrap,
    },
    Frame, Terminal,
};
use similar::{ChangeTag, TextDiff};

use crate::app::{App, AppMode};
use crate::model::{BookmarkNode, DiffAction, DiffResult, DiffType};
use crate::navigator::DiffFilter;
use crate::utils::{format_timestamp, truncate_path};

pub fn draw_ui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    terminal.draw(|f| {
        draw_review(f, app);
        if app.mode == AppMode::Confirm {
            draw_confirm_popup(f, app);
        }
    })?;
    Ok(())
}

fn diff_color(diff_type: DiffType) -> Color {
    match diff_type {
        DiffType::Added => Color::LightGreen,
        DiffType::Deleted => Color::LightRed,
        DiffType::Modified => Color::Yellow,
        DiffType::Duplicated => Color::LightMagenta,
    }
}

fn draw_review(f: &mut Frame, app: &mut App) {
    app.viewport_height = f.area().height;

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    draw_toolbar(f, app, main_chunks[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_chunks[1]);

    draw_diff_list(f, app, chunks[0]);
    draw_detail(f, app, chunks[1]);
    draw_status(f, app, main_chunks[2]);
}

fn key_hint<'a>(label: &'a str, key: &'a str) -> Vec<Span<'a>> {
    vec![
        Span::raw(label),
        Span::raw("("),
        Span::styled(key, Style::default().fg(Color::Red)),
        Span::raw(")"),
    ]
}

fn draw_toolbar(f: &mut Frame, app: &App, area: Rect) {
    let summary = app.navigator.summary();
    let current = app.navigator.filter();

    let mut spans = Vec::new();
    for (i, filter) in DiffFilter::CHOICES.iter().enumerate() {
        let count = match filter {
            DiffFilter::All => summary.total,
            DiffFilter::Only(diff_type) => summary.count(*diff_type),
        };
        let style = if *filter == current {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(format!("{} {}", filter, count), style));
        spans.push(Span::raw("("));
        spans.push(Span::styled((i + 1).to_string(), Style::default().fg(Color::Red)));
        spans.push(Span::raw(")"));
        spans.push(Span::raw(" │ "));
    }
    spans.extend(key_hint("Apply", "Enter"));
    spans.push(Span::raw(" │ "));
    spans.extend(key_hint("Write", "w"));
    spans.push(Span::raw(" │ "));
    spans.extend(key_hint("Quit", "q"));

    let toolbar = Paragraph::new(vec![Line::from(spans)])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Filters ")
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        )
        .alignment(Alignment::Left);
    f.render_widget(toolbar, area);
}

fn draw_diff_list(f: &mut Frame, app: &mut App, area: Rect) {
    let width = area.width.saturating_sub(6) as usize;
    let items: Vec<ListItem> = app
        .navigator
        .filtered_diffs()
        .map(|diff| {
            let marker = if app.is_queued(diff) { "•" } else { " " };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!("{} ", diff.diff_type.status_char()),
                    Style::default().fg(diff_color(diff.diff_type)).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    truncate_path(&diff.display_path(), width),
                    Style::default().fg(diff_color(diff.diff_type)),
                ),
            ]))
        })
        .collect();

    let title = format!(
        "{} ⇄ {}",
        truncate_path(&app.left_label, 30),
        truncate_path(&app.right_label, 30)
    );
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

    f.render_stateful_widget(list, area, &mut app.list_state);

    f.render_stateful_widget(
        Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓")),
        area.inner(Margin {
            vertical: 1,
            horizontal: 0,
        }),
        &mut app.scrollbar_state,
    );
}

/// Character level highlight of a URL change: removed characters on the
/// old line, inserted characters on the new one.
pub fn url_change_spans(old: &str, new: &str) -> (Vec<Span<'static>>, Vec<Span<'static>>) {
    let diff = TextDiff::from_chars(old, new);
    let mut old_spans = Vec::new();
    let mut new_spans = Vec::new();

    for change in diff.iter_all_changes() {
        let text = change.value().to_string();
        match change.tag() {
            ChangeTag::Equal => {
                old_spans.push(Span::raw(text.clone()));
                new_spans.push(Span::raw(text));
            }
            ChangeTag::Delete => old_spans.push(Span::styled(
                text,
                Style::default().fg(Color::Black).bg(Color::LightRed),
            )),
            ChangeTag::Insert => new_spans.push(Span::styled(
                text,
                Style::default().fg(Color::Black).bg(Color::LightGreen),
            )),
        }
    }

    (old_spans, new_spans)
}

fn label(text: &str) -> Span<'static> {
    Span::styled(format!("{:<9}", text), Style::default().fg(Color::DarkGray))
}

fn node_lines(
    heading: &str,
    node: Option<&BookmarkNode>,
    url_spans: Option<Vec<Span<'static>>>,
) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        heading.to_string(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))];

    let Some(node) = node else {
        lines.push(Line::from(Span::styled("  (absent)", Style::default().fg(Color::DarkGray))));
        return lines;
    };

    lines.push(Line::from(vec![label("  title"), Span::raw(node.title.clone())]));
    if node.is_folder() {
        lines.push(Line::from(vec![
            label("  folder"),
            Span::raw(format!("{} item(s)", node.descendant_count())),
        ]));
    }
    if let Some(url) = node.url.as_deref() {
        let mut spans = vec![label("  url")];
        match url_spans {
            Some(highlighted) => spans.extend(highlighted),
            None => spans.push(Span::raw(url.to_string())),
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(vec![label("  added"), Span::raw(format_timestamp(node.created_at))]));
    if let Some(description) = node.description.as_deref() {
        lines.push(Line::from(vec![label("  note"), Span::raw(description.to_string())]));
    }
    lines
}

fn detail_lines(diff: &DiffResult) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                diff.diff_type.to_string(),
                Style::default().fg(diff_color(diff.diff_type)).add_modifier(Modifier::BOLD),
            ),
            Span::raw(": "),
            Span::raw(diff.change_summary.clone()),
        ]),
        Line::from(Span::raw(diff.display_path())),
        Line::from(""),
    ];

    let urls = diff
        .left_item
        .as_ref()
        .and_then(|l| l.url.as_deref())
        .zip(diff.right_item.as_ref().and_then(|r| r.url.as_deref()));
    let (left_url, right_url) = match urls {
        Some((old, new)) if old != new => {
            let (old_spans, new_spans) = url_change_spans(old, new);
            (Some(old_spans), Some(new_spans))
        }
        _ => (None, None),
    };

    if diff.diff_type == DiffType::Duplicated {
        lines.extend(node_lines("First entry", diff.left_item.as_ref(), None));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Duplicates",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for path in diff.duplicate_paths() {
            lines.push(Line::from(format!("  {}", path.join(" / "))));
        }
    } else {
        lines.extend(node_lines("Left", diff.left_item.as_ref(), left_url));
        lines.push(Line::from(""));
        lines.extend(node_lines("Right", diff.right_item.as_ref(), right_url));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Operations",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));
    for operation in &diff.operations {
        let key = match operation.action {
            DiffAction::CopyLeftToRight => "l",
            DiffAction::CopyRightToLeft => "r",
            DiffAction::Accept => "a",
            DiffAction::Delete => "d",
            DiffAction::ResolveDuplicate => "u",
            DiffAction::Rename => "-",
        };
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(key.to_string(), Style::default().fg(Color::Red)),
            Span::raw(format!("  {}", operation.label)),
        ]));
    }
    lines
}

fn draw_detail(f: &mut Frame, app: &App, area: Rect) {
    let lines = match app.active_diff() {
        Some(diff) => detail_lines(diff),
        None => vec![Line::from(Span::styled(
            "No differences",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let detail = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Details "))
        .wrap(Wrap { trim: false });
    f.render_widget(detail, area);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let failed_style = if app.failed.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD)
    };
    let status = Paragraph::new(Line::from(vec![
        Span::styled(format!("queued {}", app.queue.len()), Style::default().fg(Color::Cyan)),
        Span::raw(" │ "),
        Span::styled(format!("failed {}", app.failed.len()), failed_style),
        Span::raw(" │ "),
        Span::raw(app.status_message.clone()),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn draw_confirm_popup(f: &mut Frame, app: &App) {
    let Some(pending) = app.pending.as_ref() else {
        return;
    };
    let popup_area = centered_rect(50, 25, f.area());
    f.render_widget(Clear, popup_area);

    let popup_block = Block::default()
        .title(format!(" Confirm {} ", pending.action))
        .title_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));
    let popup_inner = popup_block.inner(popup_area);
    f.render_widget(popup_block, popup_area);

    let max_path_width = popup_inner.width.saturating_sub(2) as usize;
    let body = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            truncate_path(&pending.diff.display_path(), max_path_width),
            Style::default().fg(Color::Yellow),
        )),
        Line::from(pending.diff.change_summary.clone()),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" - OK    "),
            Span::styled("Esc", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw(" - Cancel"),
        ]),
    ])
    .alignment(Alignment::Center);
    f.render_widget(body, popup_inner);
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
