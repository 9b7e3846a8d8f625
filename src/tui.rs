use anyhow::Result;
use apptrack::models::{ApplicationRecord, Status, User};
use apptrack::{ApplicationFormController, Database, Notice, NoticeBoard, Tracker, delete_application};
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Browse,
    Search,
    Form(Field),
    ConfirmDelete(ApplicationRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Position,
    Status,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Name => Field::Position,
            Field::Position => Field::Status,
            Field::Status => Field::Name,
        }
    }

    fn prev(self) -> Self {
        match self {
            Field::Name => Field::Status,
            Field::Position => Field::Name,
            Field::Status => Field::Position,
        }
    }
}

struct AppState<'a> {
    db: &'a Database,
    user: User,
    tracker: Tracker,
    form: ApplicationFormController,
    notices: NoticeBoard,
    query: String,
    selected: usize,
    status_cursor: usize,
    mode: Mode,
    disconnected: bool,
    quit: bool,
}

impl<'a> AppState<'a> {
    fn new(db: &'a Database, user: User) -> Self {
        Self {
            db,
            user,
            tracker: Tracker::new(),
            form: ApplicationFormController::new(),
            notices: NoticeBoard::new(),
            query: String::new(),
            selected: 0,
            status_cursor: 0,
            mode: Mode::Browse,
            disconnected: false,
            quit: false,
        }
    }

    fn visible(&self) -> Vec<&ApplicationRecord> {
        self.tracker.list().filter(&self.query)
    }

    fn current(&self) -> Option<&ApplicationRecord> {
        self.visible().get(self.selected).copied()
    }

    /// Picks up commits from other processes, applies queued snapshots and
    /// surfaces a newly failed or closed subscription.
    fn pump(&mut self) {
        if let Err(e) = self.db.refresh() {
            tracing::warn!(error = %e, "refresh failed");
        }
        let before = self.tracker.last_error().map(str::to_string);
        self.tracker.sync_pending();
        if let Some(reason) = self.tracker.last_error() {
            if before.as_deref() != Some(reason) {
                self.notices.push(Notice::for_subscription(reason));
            }
        }
        if self.tracker.is_disconnected() && !self.disconnected {
            self.disconnected = true;
            self.notices.push(Notice::disconnected());
        }
        let len = self.visible().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn next(&mut self) {
        if self.selected + 1 < self.visible().len() {
            self.selected += 1;
        }
    }

    fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        match self.mode.clone() {
            Mode::Browse => self.on_browse(key),
            Mode::Search => self.on_search(key),
            Mode::Form(field) => self.on_form(key, field).await,
            Mode::ConfirmDelete(record) => self.on_confirm(key, &record).await,
        }
    }

    fn on_browse(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => self.quit = true,
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.prev(),
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('a') => {
                self.form.open_for_create();
                self.mode = Mode::Form(Field::Name);
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(record) = self.current().cloned() {
                    self.form.open_for_edit(&record);
                    self.mode = Mode::Form(Field::Name);
                }
            }
            KeyCode::Char('d') => {
                if let Some(record) = self.current().cloned() {
                    self.mode = Mode::ConfirmDelete(record);
                }
            }
            KeyCode::Char('x') => self.notices.dismiss(),
            _ => {}
        }
    }

    fn on_search(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.query.clear();
                self.mode = Mode::Browse;
            }
            KeyCode::Enter => self.mode = Mode::Browse,
            KeyCode::Backspace => {
                self.query.pop();
            }
            KeyCode::Char(c) if !has_command_modifier(key) => self.query.push(c),
            _ => return,
        }
        self.selected = 0;
    }

    async fn on_form(&mut self, key: KeyEvent, field: Field) {
        if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.submit().await;
            return;
        }

        if self.form.selector_open() {
            match key.code {
                KeyCode::Esc => self.form.toggle_status_selector(),
                KeyCode::Down | KeyCode::Char('j') => {
                    self.status_cursor = (self.status_cursor + 1) % Status::ALL.len();
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.status_cursor = (self.status_cursor + Status::ALL.len() - 1) % Status::ALL.len();
                }
                KeyCode::Enter | KeyCode::Char(' ') => {
                    self.form.select_status(Status::ALL[self.status_cursor]);
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => {
                self.form.close();
                self.mode = Mode::Browse;
            }
            KeyCode::Tab | KeyCode::Down => self.mode = Mode::Form(field.next()),
            KeyCode::BackTab | KeyCode::Up => self.mode = Mode::Form(field.prev()),
            KeyCode::Enter if field == Field::Status => {
                self.status_cursor = self.form.draft().status.and_then(Status::index).unwrap_or(0);
                self.form.toggle_status_selector();
            }
            KeyCode::Enter => self.submit().await,
            KeyCode::Backspace => match field {
                Field::Name => {
                    self.form.name_mut().pop();
                }
                Field::Position => {
                    self.form.position_mut().pop();
                }
                Field::Status => {}
            },
            KeyCode::Char(c) if !has_command_modifier(key) => match field {
                Field::Name => self.form.name_mut().push(c),
                Field::Position => self.form.position_mut().push(c),
                Field::Status => {}
            },
            _ => {}
        }
    }

    async fn submit(&mut self) {
        let result = self.form.submit(self.db, Some(&self.user.id)).await;
        if result.is_ok() {
            self.mode = Mode::Browse;
        }
        self.notices.push(Notice::for_submit(&result));
    }

    async fn on_confirm(&mut self, key: KeyEvent, record: &ApplicationRecord) {
        if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            let result = delete_application(self.db, Some(&self.user.id), &record.id).await;
            self.notices.push(Notice::for_delete(&result));
        }
        self.mode = Mode::Browse;
    }
}

pub async fn run_browse(db: &Database, user: &User) -> Result<()> {
    let mut state = AppState::new(db, user.clone());
    state.tracker.activate(db, &user.id).await?;
    tracing::info!(user = %user.email, "browse session started");

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    state.tracker.deactivate();
    result
}

async fn run_loop(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, state: &mut AppState<'_>) -> Result<()> {
    let mut list_state = ListState::default();

    while !state.quit {
        state.pump();
        list_state.select(if state.visible().is_empty() { None } else { Some(state.selected) });
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                state.handle_key(key).await;
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(1)])
        .split(frame.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(columns[1]);

    draw_list(frame, state, list_state, columns[0]);

    let detail = Paragraph::new(build_detail(state.current()))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, right[0]);

    draw_dashboard(frame, state, right[1]);

    if let Some(notice) = state.notices.current() {
        let color = if notice.is_error() { Color::Red } else { Color::Green };
        frame.render_widget(
            Paragraph::new(format!(" {notice}")).style(Style::default().fg(color)),
            rows[1],
        );
    }

    let help = match state.mode {
        Mode::Browse => " j/k:navigate  /:search  a:add  e:edit  d:delete  x:dismiss  q:quit",
        Mode::Search => " type to filter by company  Enter:keep  Esc:clear",
        Mode::Form(_) if state.form.selector_open() => " j/k:choose status  Enter:select  Esc:close selector",
        Mode::Form(_) => " Tab:next field  Enter:submit (status: open selector)  Ctrl-S:submit  Esc:cancel",
        Mode::ConfirmDelete(_) => " y:delete  any other key:cancel",
    };
    frame.render_widget(Paragraph::new(help).style(Style::default().fg(Color::DarkGray)), rows[2]);

    match &state.mode {
        Mode::Form(field) => draw_form(frame, state, *field),
        Mode::ConfirmDelete(record) => draw_confirm(frame, record),
        _ => {}
    }
}

fn draw_list(frame: &mut Frame, state: &AppState, list_state: &mut ListState, area: Rect) {
    let visible = state.visible();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|record| {
            ListItem::new(Line::from(vec![
                Span::styled("● ", Style::default().fg(status_color(record.status))),
                Span::raw(format!("{}  {} | {}", record.local_date().format("%m/%d"), record.name, record.position)),
            ]))
        })
        .collect();

    let title = match (state.tracker.state(), state.query.is_empty()) {
        (apptrack::SyncState::Ready, true) => format!(" Applications ({}) ", visible.len()),
        (apptrack::SyncState::Ready, false) => format!(
            " Applications ({}/{}) /{} ",
            visible.len(),
            state.tracker.list().len(),
            state.query
        ),
        _ => " Applications (loading...) ".to_string(),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, list_state);
}

fn draw_dashboard(frame: &mut Frame, state: &AppState, area: Rect) {
    let stats = state.tracker.stats();
    let title = format!(" Dashboard: {} total, {} offers ", stats.total(), stats.offers());
    let block = Block::default().borders(Borders::ALL).title(title);

    if !stats.has_data() {
        let message = if state.tracker.state() == apptrack::SyncState::Ready {
            "No applications yet. Press 'a' to add one."
        } else {
            "Loading..."
        };
        frame.render_widget(
            Paragraph::new(message).style(Style::default().fg(Color::DarkGray)).block(block),
            area,
        );
        return;
    }

    let bars: Vec<Bar> = stats
        .histogram()
        .map(|(status, count)| {
            Bar::default()
                .value(count as u64)
                .label(Line::from(short_label(status)))
                .style(Style::default().fg(status_color(status)))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(6)
        .bar_gap(1);
    frame.render_widget(chart, area);
}

fn draw_form(frame: &mut Frame, state: &AppState, focus: Field) {
    let area = centered(frame.area(), 60, 11);
    frame.render_widget(Clear, area);

    let title = if state.form.editing_id().is_some() {
        " Edit application "
    } else {
        " Add application "
    };
    let draft = state.form.draft();
    let label = |field: Field, name: &'static str| {
        let style = if field == focus {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Span::styled(format!("{name:<10}"), style)
    };
    let status = match draft.status {
        Some(status) => Span::styled(status.label(), Style::default().fg(status_color(status))),
        None => Span::styled("(choose)", Style::default().fg(Color::DarkGray)),
    };

    let mut lines = vec![
        Line::from(vec![label(Field::Name, "Company"), Span::raw(draft.name.as_str())]),
        Line::from(vec![label(Field::Position, "Position"), Span::raw(draft.position.as_str())]),
        Line::from(vec![label(Field::Status, "Status"), status]),
        Line::from(""),
    ];

    if state.form.selector_open() {
        for (i, status) in Status::ALL.iter().enumerate() {
            let marker = if i == state.status_cursor { "> " } else { "  " };
            lines.push(Line::from(vec![
                Span::raw(format!("  {marker}")),
                Span::styled(status.label(), Style::default().fg(status_color(*status))),
            ]));
        }
    }

    let form = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(form, area);
}

fn draw_confirm(frame: &mut Frame, record: &ApplicationRecord) {
    let area = centered(frame.area(), 50, 5);
    frame.render_widget(Clear, area);
    let text = Text::from(vec![
        Line::from(format!("Delete {} ({})?", record.name, record.position)),
        Line::from(Span::styled("y to confirm, any other key to cancel", Style::default().fg(Color::DarkGray))),
    ]);
    frame.render_widget(
        Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(" Delete "))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn build_detail(record: Option<&ApplicationRecord>) -> Text<'_> {
    let Some(record) = record else {
        return Text::raw("No application selected");
    };

    Text::from(vec![
        Line::from(Span::styled(&record.name, Style::default().add_modifier(Modifier::BOLD))),
        Line::from(format!("Position: {}", record.position)),
        Line::from(format!("Applied:  {}", record.local_date().format("%Y-%m-%d"))),
        Line::from(Span::styled(
            format!("Status:   {}", record.status),
            Style::default().fg(status_color(record.status)),
        )),
        Line::from(Span::styled(format!("ID:       {}", record.id), Style::default().fg(Color::DarkGray))),
    ])
}

/// Ctrl or Alt chords are commands, never text.
fn has_command_modifier(key: KeyEvent) -> bool {
    key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

fn short_label(status: Status) -> &'static str {
    match status {
        Status::Submitted => "Sent",
        Status::OaReceived => "OA in",
        Status::OaCompleted => "OA ok",
        Status::Interview => "Intvw",
        Status::Rejected => "Rej",
        Status::Offer => "Offer",
        Status::Unknown => "?",
    }
}

fn status_color(status: Status) -> Color {
    hex_color(status.color()).unwrap_or(Color::Gray)
}

fn hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn centered(outer: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(outer.width);
    let height = height.min(outer.height);
    Rect {
        x: outer.x + (outer.width - width) / 2,
        y: outer.y + (outer.height - height) / 2,
        width,
        height,
    }
}
