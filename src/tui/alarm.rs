use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};

use crate::alarm::FireEvent;
use crate::tui::events::{Event, EventHandler};
use crate::tui::theme;
use crate::utils::format::display_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmOutcome {
    Dismissed,
    Snoozed,
    /// Closed from outside, e.g. the daemon stopped the presenter.
    Stopped,
}

pub fn outcome_for_key(key: KeyEvent) -> Option<AlarmOutcome> {
    match key.code {
        KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Enter | KeyCode::Esc => {
            Some(AlarmOutcome::Dismissed)
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(AlarmOutcome::Dismissed)
        }
        KeyCode::Char('s') | KeyCode::Char('S') => Some(AlarmOutcome::Snoozed),
        _ => None,
    }
}

/// Take over the terminal until the user dismisses or snoozes, or until
/// `ringing` is cleared by someone else.
pub fn run(event: &FireEvent, ringing: &AtomicBool, ring: bool, use_24h: bool) -> Result<AlarmOutcome> {
    let mut terminal = ratatui::init();
    let result = (|| -> Result<AlarmOutcome> {
        let events = EventHandler::new(1000);
        let mut elapsed = 0u64;
        loop {
            if !ringing.load(Ordering::SeqCst) {
                return Ok(AlarmOutcome::Stopped);
            }
            terminal.draw(|frame| draw(frame, event, use_24h, elapsed))?;

            match events.next()? {
                Event::Key(key) => {
                    if let Some(outcome) = outcome_for_key(key) {
                        return Ok(outcome);
                    }
                }
                Event::Tick => {
                    elapsed += 1;
                    if ring {
                        let mut out = std::io::stdout();
                        out.write_all(b"\x07")?;
                        out.flush()?;
                    }
                }
            }
        }
    })();
    ratatui::restore();
    result
}

pub fn draw(frame: &mut Frame, event: &FireEvent, use_24h: bool, elapsed_secs: u64) {
    let area = frame.area();
    frame.render_widget(Block::default().style(theme::base()), area);

    let times: Vec<&str> = event.all_times.lines().collect();
    let height = (times.len() as u16 + 12).min(area.height);
    let card = centered(area, 46.min(area.width), height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme::gold())
        .style(theme::surface())
        .title(Span::styled(" Azan ", theme::gold()));
    let inner = block.inner(card);
    frame.render_widget(block, card);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(event.name.display_name().to_uppercase(), theme::bold())),
        Line::from(Span::styled(display_time(&event.time, use_24h), theme::amber())),
        Line::from(Span::styled(
            format!("It's time for {} prayer", event.name),
            theme::dim(),
        )),
        Line::from(""),
    ];
    for row in times {
        let style = if row.starts_with(&format!("{}:", event.name)) {
            theme::gold()
        } else {
            theme::dim()
        };
        let text = match row.split_once(": ") {
            Some((name, time)) => format!("{:<10}{:>8}", name, display_time(time, use_24h)),
            None => row.to_string(),
        };
        lines.push(Line::from(Span::styled(text, style)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("[d]", theme::gold()),
        Span::styled(" Dismiss   ", theme::dim()),
        Span::styled("[s]", theme::gold()),
        Span::styled(" Snooze", theme::dim()),
    ]));
    if elapsed_secs > 0 {
        lines.push(Line::from(Span::styled(
            format!("ringing for {}s", elapsed_secs),
            theme::dim(),
        )));
    }

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(row);
    cell
}
