use std::time::{Duration, Instant};

use chrono::Local;
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Wrap};
use tokio::sync::broadcast;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::command::Command;
use crate::metadata::DocumentHead;
use crate::page::{ContentView, PagePhase, PageView, SubView};
use crate::render::{LOADING_MESSAGE, NO_TRENDS_MESSAGE, TRENDS_HEADING, trend_price_label};
use crate::session::PageSession;

const LOADING_SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];
const MAX_SYMBOL_LEN: usize = 32;
const HELP_LINE: &str = "/ ou e: nova moeda · r: recarregar · j/k: rolar tendências · q/Esc: sair";

struct LoadingSpinner {
    index: usize,
    last_tick: Instant,
}

impl LoadingSpinner {
    fn new() -> Self {
        LoadingSpinner {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn tick(&mut self) -> bool {
        if self.last_tick.elapsed() < Duration::from_millis(120) {
            return false;
        }
        self.index = (self.index + 1) % LOADING_SPINNER_FRAMES.len();
        self.last_tick = Instant::now();
        true
    }

    fn frame(&self) -> char {
        LOADING_SPINNER_FRAMES[self.index % LOADING_SPINNER_FRAMES.len()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyOutcome {
    Ignored,
    Redraw,
    Exit,
}

/// Terminal preview of the quote page.
pub struct TuiApp {
    session: PageSession<DocumentHead>,
    symbol_input: Option<String>,
    trend_offset: usize,
    spinner: LoadingSpinner,
    last_draw: Instant,
    min_redraw_gap: Duration,
    status_message: Option<String>,
    status_visible_until: Option<Instant>,
    status_is_error: bool,
}

impl TuiApp {
    fn is_exit_key(key: &KeyEvent) -> bool {
        matches!(
            key.code,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc
        ) || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
    }

    pub fn new(session: PageSession<DocumentHead>) -> TuiApp {
        let min_redraw_gap = Duration::from_millis(100);
        TuiApp {
            session,
            symbol_input: None,
            trend_offset: 0,
            spinner: LoadingSpinner::new(),
            last_draw: Instant::now() - min_redraw_gap,
            min_redraw_gap,
            status_message: None,
            status_visible_until: None,
            status_is_error: false,
        }
    }

    /// Mounts the page and opens the initial route, if any.
    pub fn start(&mut self, moeda: Option<&str>) {
        self.session.mount();
        if !self.session.navigate(moeda) {
            self.set_status_message("Nenhuma moeda informada. Pressione / para escolher uma.");
        }
    }

    pub fn dispose(&self) {
        ratatui::restore();
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(3));
        self.status_is_error = false;
    }

    fn set_error_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(5));
        self.status_is_error = true;
    }

    fn clear_status_if_allowed(&mut self) -> bool {
        if self.status_message.is_none() {
            return false;
        }
        if let Some(visible_until) = self.status_visible_until {
            if Instant::now() < visible_until {
                return false;
            }
        }
        self.status_message = None;
        self.status_visible_until = None;
        self.status_is_error = false;
        true
    }

    pub async fn run(&mut self, rx: &mut broadcast::Receiver<Command>) -> Result<()> {
        color_eyre::install()?;
        let mut terminal = ratatui::init();
        let mut input_tick = tokio::time::interval(self.min_redraw_gap);
        terminal.draw(|frame| self.render(frame))?;
        self.last_draw = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = input_tick.tick() => {
                    let mut should_redraw = self.session.page().is_loading() && self.spinner.tick();
                    match self.poll_input()? {
                        KeyOutcome::Exit => return Ok(()),
                        KeyOutcome::Redraw => should_redraw = true,
                        KeyOutcome::Ignored => {}
                    }
                    if self.clear_status_if_allowed() {
                        should_redraw = true;
                    }
                    if should_redraw && self.last_draw.elapsed() >= self.min_redraw_gap {
                        terminal.draw(|frame| self.render(frame))?;
                        self.last_draw = Instant::now();
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(command) => {
                            if self.handle_command(command) {
                                return Ok(());
                            }
                            terminal.draw(|frame| self.render(frame))?;
                            self.last_draw = Instant::now();
                        }
                        Err(broadcast::error::RecvError::Closed) => return Ok(()),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
    }

    /// Returns true when the app should exit.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Exit => true,
            Command::Error(message) => {
                self.set_error_status_message(message);
                false
            }
            command @ Command::PriceSettled { .. } => {
                if self.session.handle(command) {
                    self.announce_price_outcome();
                }
                false
            }
            command @ Command::TrendsSettled(_) => {
                let failed = matches!(command, Command::TrendsSettled(Err(_)));
                self.session.handle(command);
                self.trend_offset = 0;
                if failed {
                    self.set_error_status_message("Não foi possível carregar as tendências mapeadas");
                }
                false
            }
        }
    }

    fn announce_price_outcome(&mut self) {
        let now = Local::now().format("%H:%M:%S");
        let route = self
            .session
            .page()
            .route()
            .map(|route| route.upper())
            .unwrap_or_default();
        let loaded = match self.session.page().phase() {
            PagePhase::Ready(_) => true,
            PagePhase::Failed(_) => false,
            PagePhase::Loading => return,
        };
        if loaded {
            self.set_status_message(format!("{route} atualizado às {now}"));
        } else {
            self.set_error_status_message(format!("Falha ao carregar {route} às {now}"));
        }
    }

    fn poll_input(&mut self) -> Result<KeyOutcome> {
        let mut outcome = KeyOutcome::Ignored;
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match self.handle_key_event(key) {
                    KeyOutcome::Exit => return Ok(KeyOutcome::Exit),
                    KeyOutcome::Redraw => outcome = KeyOutcome::Redraw,
                    KeyOutcome::Ignored => {}
                }
            }
        }
        Ok(outcome)
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return KeyOutcome::Exit;
        }
        if self.symbol_input.is_some() {
            self.handle_symbol_input_key(key);
            return KeyOutcome::Redraw;
        }
        if Self::is_exit_key(&key) {
            return KeyOutcome::Exit;
        }
        match key.code {
            KeyCode::Char('/') | KeyCode::Char('e') | KeyCode::Char('E') => {
                self.symbol_input = Some(String::new());
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                if self.session.reload() {
                    self.set_status_message("Recarregando cotação...");
                } else {
                    self.set_error_status_message("Nenhuma moeda selecionada para recarregar");
                }
            }
            KeyCode::Char('j') | KeyCode::Down => self.scroll_trends(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_trends(-1),
            _ => return KeyOutcome::Ignored,
        }
        KeyOutcome::Redraw
    }

    fn handle_symbol_input_key(&mut self, key: KeyEvent) {
        let Some(input) = self.symbol_input.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.symbol_input = None;
            }
            KeyCode::Enter => {
                let symbol = input.trim().to_string();
                self.symbol_input = None;
                if self.session.navigate(Some(&symbol)) {
                    self.trend_offset = 0;
                    self.set_status_message(format!("Buscando {}...", symbol.to_uppercase()));
                } else {
                    self.set_error_status_message("Informe o símbolo de uma moeda");
                }
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(ch) if !ch.is_whitespace() && input.chars().count() < MAX_SYMBOL_LEN => {
                input.push(ch);
            }
            _ => {}
        }
    }

    fn scroll_trends(&mut self, delta: isize) {
        let len = self.session.page().trends().len();
        if len == 0 {
            self.trend_offset = 0;
            return;
        }
        let next = self.trend_offset as isize + delta;
        self.trend_offset = next.clamp(0, len as isize - 1) as usize;
    }

    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let has_status = self.status_message.is_some() && area.height >= 10;
        let mut constraints = vec![Constraint::Length(3), Constraint::Min(3)];
        if has_status {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Length(1));
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        self.render_title(frame, chunks[0]);
        match self.session.page().view() {
            PageView::Loading => self.render_loading(frame, chunks[1]),
            PageView::Error(message) => render_error(frame, chunks[1], message),
            PageView::Content(content) => self.render_content(frame, chunks[1], &content),
        }
        if has_status {
            self.render_status(frame, chunks[2]);
        }
        let help = Paragraph::new(HELP_LINE).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[chunks.len() - 1]);
        if let Some(input) = &self.symbol_input {
            render_symbol_dialog(frame, chunks[1], input);
        }
    }

    fn render_title(&self, frame: &mut Frame, area: Rect) {
        let title = self.session.page().metadata().title().to_string();
        let paragraph = Paragraph::new(Line::from(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )))
        .block(Block::bordered().title("Cotação Hoje"));
        frame.render_widget(paragraph, area);
    }

    fn render_loading(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![Line::from(Span::styled(
            format!("{} {}", self.spinner.frame(), LOADING_MESSAGE),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))];
        if let Some(quote) = self.session.page().last_quote() {
            lines.push(Line::from(Span::styled(
                format!("Última cotação: R$ {}", quote.price),
                Style::default().fg(Color::DarkGray),
            )));
        }
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::bordered());
        frame.render_widget(paragraph, area);
    }

    fn render_content(&self, frame: &mut Frame, area: Rect, content: &ContentView<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);
        let head = self.session.page().metadata();
        let sections = SubView::ALL
            .iter()
            .map(|view| view.name())
            .collect::<Vec<_>>()
            .join(" · ");
        let lines = vec![
            Line::from(vec![
                Span::raw("Moeda: "),
                Span::styled(
                    content.route.upper(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::raw("Preço: "),
                Span::styled(
                    format!("R$ {}", content.quote.price),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(format!("Ícone: {}", content.icon)),
            Line::from(format!("Descrição: {}", head.description().unwrap_or("-"))),
            Line::from(format!("Página: {}", content.schema.url)),
            Line::from(format!("Comprar: {}", content.schema.offers.url)),
            Line::from(Span::styled(
                format!("Seções: {sections}"),
                Style::default().fg(Color::DarkGray),
            )),
        ];
        let quote_panel = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::bordered().title(content.schema.name.as_str()));
        frame.render_widget(quote_panel, chunks[0]);
        self.render_trends(frame, chunks[1], content);
    }

    fn render_trends(&self, frame: &mut Frame, area: Rect, content: &ContentView<'_>) {
        let block = Block::bordered().title(TRENDS_HEADING);
        let inner_width = area.width.saturating_sub(2) as usize;
        if content.trends.is_empty() {
            let paragraph = Paragraph::new(NO_TRENDS_MESSAGE)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }
        let mut lines = Vec::new();
        for entry in content.trends.iter().skip(self.trend_offset) {
            lines.push(Line::from(Span::styled(
                clip_to_width(&entry.trend, inner_width),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            let detail = format!(
                "  {} · R$ {} · {}",
                entry.coin_label(),
                trend_price_label(entry),
                entry.source
            );
            lines.push(Line::from(clip_to_width(&detail, inner_width)));
            lines.push(Line::from(Span::styled(
                clip_to_width(&format!("  {}", entry.url), inner_width),
                Style::default().fg(Color::Blue),
            )));
        }
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some(message) = &self.status_message {
            let color = if self.status_is_error {
                Color::Red
            } else {
                Color::Yellow
            };
            let status = Paragraph::new(message.as_str())
                .style(Style::default().fg(color))
                .alignment(Alignment::Left)
                .block(Block::bordered().title("Status"));
            frame.render_widget(status, area);
        }
    }
}

fn render_error(frame: &mut Frame, area: Rect, message: &str) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(Block::bordered());
    frame.render_widget(paragraph, area);
}

fn render_symbol_dialog(frame: &mut Frame, area: Rect, input: &str) {
    if area.width < 24 || area.height < 3 {
        return;
    }
    let popup_width = area.width.saturating_sub(10).min(40).max(24);
    let popup_height = 3;
    let left = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let top = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup = Rect::new(left, top, popup_width, popup_height);
    let paragraph = Paragraph::new(Line::from(vec![
        Span::raw(input.to_string()),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ]))
    .block(Block::bordered().title("Moeda (Enter confirma · Esc cancela)"));
    frame.render_widget(Clear, popup);
    frame.render_widget(paragraph, popup);
}

fn clip_to_width(value: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(value) <= width {
        return value.to_string();
    }
    let mut result = String::new();
    let mut remaining = width.saturating_sub(1);
    for ch in value.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if ch_width > remaining {
            break;
        }
        result.push(ch);
        remaining = remaining.saturating_sub(ch_width);
    }
    result.push('…');
    result
}
