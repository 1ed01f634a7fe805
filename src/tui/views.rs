//! TUI Views
//!
//! Renders the flow pane, the optional agent pane and the status bar.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::colors;
use super::state::{AppState, PaneBuffer};

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const HOTKEYS: &str = "p pause  v pane  i interrupt  k kill  PgUp/PgDn scroll";

/// Split the screen into flow, agent and status areas.
pub fn layout(area: Rect, show_agent: bool) -> (Rect, Option<Rect>, Rect) {
    if show_agent {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(45), Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        (chunks[0], Some(chunks[1]), chunks[2])
    } else {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        (chunks[0], None, chunks[1])
    }
}

fn render_pane(frame: &mut Frame, area: Rect, title: String, buffer: &PaneBuffer) {
    // borders take two rows
    let height = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = buffer
        .visible(height)
        .map(|line| ListItem::new(Line::from(Span::styled(line.text.clone(), Style::default().fg(line.color)))))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(colors::DIM)),
    );
    frame.render_widget(list, area);
}

fn render_status(frame: &mut Frame, area: Rect, state: &AppState) {
    let line = match &state.prompt {
        Some(prompt) => Line::from(vec![
            Span::styled(
                format!(" {} ", prompt.label),
                Style::default().fg(colors::WARNING).add_modifier(Modifier::BOLD),
            ),
            Span::raw(prompt.input.content().to_string()),
            Span::styled("█", Style::default().fg(colors::DIM)),
        ]),
        None => {
            let mut spans = Vec::new();
            if let Some(label) = &state.activity {
                let frame_str = SPINNER[state.spinner_frame % SPINNER.len()];
                spans.push(Span::styled(format!(" {} {} ", frame_str, label), Style::default().fg(colors::HEADER)));
            }
            spans.push(Span::styled(
                format!(" {} ", state.status_text()),
                Style::default().fg(state.status_color()).add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(format!("│ {}", HOTKEYS), Style::default().fg(colors::KEYBIND)));
            Line::from(spans)
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Draw the whole screen.
pub fn render(frame: &mut Frame, state: &AppState) {
    let (flow_area, agent_area, status_area) = layout(frame.area(), state.show_agent);

    let flow_title = format!(" Flow (cycle {}) ", state.cycle);
    render_pane(frame, flow_area, flow_title, &state.flow);

    if let Some(area) = agent_area {
        let title = if state.agent.scroll() > 0 {
            format!(" Agent output [-{}] ", state.agent.scroll())
        } else {
            " Agent output ".to_string()
        };
        render_pane(frame, area, title, &state.agent);
    }

    render_status(frame, status_area, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};

    #[test]
    fn test_layout_with_and_without_agent_pane() {
        let area = Rect::new(0, 0, 80, 40);
        let (flow, agent, status) = layout(area, true);
        assert!(agent.is_some());
        assert_eq!(status.height, 1);
        assert!(flow.height > 0);

        let (flow, agent, status) = layout(area, false);
        assert!(agent.is_none());
        assert_eq!(flow.height, 39);
        assert_eq!(status.y, 39);
    }

    #[test]
    fn test_render_shows_status_and_lines() {
        let mut state = AppState::new();
        state.push_flow("=== Cycle 1 ===", colors::HEADER);
        state.push_agent("planner", "Processing task", colors::TEXT);

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| render(f, &state)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("=== Cycle 1 ==="));
        assert!(text.contains("Processing task"));
        assert!(text.contains("cycle 1"));
    }
}
