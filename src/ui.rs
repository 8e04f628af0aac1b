use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};

use crate::api::Comment;
use crate::feed::{FeedItem, LoadStatus, Session};
use crate::navigation::{InputEvent, NavKey};
use crate::reconcile::{Event as SessionEvent, LikeOutcome, SubmitOutcome};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const ICON_LIKED: &str = "♥";
const ICON_UNLIKED: &str = "♡";
const LOADING_TEXT: &str = "Loading videos...";
const EMPTY_TEXT: &str = "No videos found.";

pub struct Options {
    pub session: Session,
    /// Pixels per terminal row, used to turn mouse drags into swipe distances.
    pub cell_height: f32,
    pub status_message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Browse,
    Compose,
}

pub struct Model {
    session: Session,
    mode: Mode,
    comments_visible: bool,
    status_message: String,
    cell_height: f32,
    spinner: Spinner,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let cell_height = if opts.cell_height.is_finite() && opts.cell_height > 0.0 {
            opts.cell_height
        } else {
            1.0
        };
        Self {
            session: opts.session,
            mode: Mode::Browse,
            comments_visible: false,
            status_message: opts.status_message,
            cell_height,
            spinner: Spinner::new(),
            needs_redraw: true,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.load_feed(&mut terminal).and_then(|_| self.event_loop(&mut terminal));

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn load_feed(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        terminal.draw(|frame| self.draw(frame))?;
        self.session.load();
        self.after_load();
        Ok(())
    }

    fn after_load(&mut self) {
        match self.session.status() {
            LoadStatus::Ready => {
                self.status_message = format!(
                    "{} videos. {}",
                    self.session.len(),
                    self.status_message.trim()
                )
                .trim()
                .to_string();
            }
            LoadStatus::Empty => {
                self.status_message = match self.session.last_error() {
                    Some(err) => format!("Could not load videos: {err}"),
                    None => EMPTY_TEXT.to_string(),
                };
            }
            LoadStatus::Loading => {}
        }
        self.mark_dirty();
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        *self.session.status() == LoadStatus::Loading || self.session.in_flight() > 0
    }

    fn poll_async(&mut self) -> bool {
        let events = self.session.poll();
        for event in &events {
            self.apply_event(event);
        }
        !events.is_empty()
    }

    fn apply_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::LikeSettled { outcome, .. } => match outcome {
                LikeOutcome::Confirmed { liked } => {
                    self.status_message = if *liked {
                        "Liked.".to_string()
                    } else {
                        "Like removed.".to_string()
                    };
                }
                LikeOutcome::RolledBack { error } => {
                    self.status_message = format!("Like failed and was undone: {error}");
                }
                LikeOutcome::Failed { error } => {
                    self.status_message = format!("Like failed: {error}");
                }
            },
            SessionEvent::RefreshFailed { index, error } if Some(*index) == self.session.index() => {
                self.status_message = format!("Could not refresh: {error}");
            }
            SessionEvent::CommentPosted { .. } => {
                self.mode = Mode::Browse;
                self.status_message = "Comment posted.".to_string();
            }
            SessionEvent::CommentFailed { error, .. } => {
                self.mode = Mode::Browse;
                self.status_message = format!("Comment failed: {error}");
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.mode == Mode::Compose {
            self.handle_compose_key(code);
            return Ok(false);
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.navigate(NavKey::ArrowDown),
            KeyCode::Char('k') | KeyCode::Up => self.navigate(NavKey::ArrowUp),
            KeyCode::Char('l') | KeyCode::Char(' ') => self.like(),
            KeyCode::Char('c') => {
                self.comments_visible = !self.comments_visible;
            }
            KeyCode::Char('i') => self.begin_compose(),
            KeyCode::Char('m') => self.toggle_mute(),
            KeyCode::Char('t') => self.toggle_minting(),
            KeyCode::Char('s') => self.share()?,
            _ => return Ok(false),
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_compose_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.status_message = "Comment discarded.".to_string();
                self.session.set_draft(String::new());
            }
            KeyCode::Enter => match self.session.submit_comment() {
                SubmitOutcome::Sent => {
                    self.status_message = "Posting comment...".to_string();
                }
                SubmitOutcome::Skipped => {
                    self.status_message = if self.current_loading(|item| item.social.comments_loading) {
                        "Comments are still syncing.".to_string()
                    } else {
                        "Nothing to post.".to_string()
                    };
                }
            },
            KeyCode::Backspace => {
                self.session.draft_mut().pop();
            }
            KeyCode::Char(ch) => self.session.draft_mut().push(ch),
            _ => return,
        }
        self.mark_dirty();
    }

    fn handle_mouse(&mut self, event: MouseEvent) {
        if self.mode == Mode::Compose {
            return;
        }
        let y = f32::from(event.row) * self.cell_height;
        let input = match event.kind {
            MouseEventKind::ScrollDown => InputEvent::Wheel {
                delta_y: self.cell_height,
            },
            MouseEventKind::ScrollUp => InputEvent::Wheel {
                delta_y: -self.cell_height,
            },
            MouseEventKind::Down(MouseButton::Left) => InputEvent::TouchStart { y },
            MouseEventKind::Drag(MouseButton::Left) => InputEvent::TouchMove { y },
            MouseEventKind::Up(MouseButton::Left) => InputEvent::TouchEnd,
            _ => return,
        };
        let before = self.session.index();
        self.session.handle_input(input);
        if self.session.index() != before {
            self.mark_dirty();
        }
    }

    fn navigate(&mut self, key: NavKey) {
        self.session.handle_input(InputEvent::Key(key));
    }

    fn like(&mut self) {
        if self.session.toggle_like_current() == SubmitOutcome::Skipped {
            self.status_message = if !self.session.identity().is_known() {
                "Sign in to like videos.".to_string()
            } else if self.current_loading(|item| item.social.likes_loading) {
                "Likes are still syncing.".to_string()
            } else {
                "This video cannot be liked yet.".to_string()
            };
        }
    }

    fn current_loading(&self, flag: impl Fn(&FeedItem) -> bool) -> bool {
        self.session.current().map(flag).unwrap_or(false)
    }

    fn begin_compose(&mut self) {
        if !self.session.identity().is_known() {
            self.status_message = "Sign in to comment.".to_string();
            return;
        }
        let commentable = self
            .session
            .current()
            .map(|item| item.video.persisted_id().is_some())
            .unwrap_or(false);
        if !commentable {
            self.status_message = "This video cannot take comments yet.".to_string();
            return;
        }
        self.mode = Mode::Compose;
        self.comments_visible = true;
        self.status_message = "Type a comment. Enter posts, Esc cancels.".to_string();
    }

    fn toggle_mute(&mut self) {
        let Some(index) = self.session.index() else {
            return;
        };
        if let Some(muted) = self.session.toggle_mute(index) {
            self.status_message = if muted {
                "Muted.".to_string()
            } else {
                "Sound on.".to_string()
            };
        }
    }

    fn toggle_minting(&mut self) {
        let Some(index) = self.session.index() else {
            return;
        };
        let minting = self
            .session
            .item(index)
            .map(|item| !item.playback.minting)
            .unwrap_or(false);
        if self.session.set_minting(index, minting) {
            self.status_message = if minting {
                "Mint panel open.".to_string()
            } else {
                "Mint panel closed.".to_string()
            };
        }
    }

    fn share(&mut self) -> Result<()> {
        let Some(link) = self.session.index().and_then(|index| self.session.share_link(index))
        else {
            return Ok(());
        };
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(link.url.clone()))
        {
            Ok(()) => {
                self.status_message = format!("Copied link: {}", link.url);
            }
            Err(err) => {
                tracing::warn!("clipboard unavailable: {err}");
                self.status_message = format!("{} {}", link.text, link.url);
            }
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        if self.comments_visible {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
                .split(layout[1]);
            self.draw_card(frame, chunks[0]);
            self.draw_comments(frame, chunks[1]);
        } else {
            self.draw_card(frame, layout[1]);
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn draw_card(&self, frame: &mut Frame<'_>, area: Rect) {
        let position = match (self.session.index(), self.session.len()) {
            (Some(index), len) if len > 0 => format!(" {}/{} ", index + 1, len),
            _ => String::new(),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if self.comments_visible {
                COLOR_BORDER_IDLE
            } else {
                COLOR_BORDER_FOCUSED
            }))
            .title(Span::styled(
                " Reels ",
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .title(
                ratatui::widgets::block::Title::from(position).alignment(Alignment::Right),
            )
            .padding(Padding::horizontal(1))
            .style(Style::default().bg(COLOR_PANEL_BG));

        let text = match (self.session.status(), self.session.current()) {
            (LoadStatus::Loading, _) => centered_notice(LOADING_TEXT),
            (LoadStatus::Empty, _) | (LoadStatus::Ready, None) => centered_notice(EMPTY_TEXT),
            (LoadStatus::Ready, Some(item)) => {
                let width = area.width.saturating_sub(4).max(10) as usize;
                card_text(item, width)
            }
        };

        let alignment = if self.session.current().is_some() {
            Alignment::Left
        } else {
            Alignment::Center
        };
        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(alignment)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_comments(&self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.mode == Mode::Compose || self.comments_visible;
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused {
                COLOR_BORDER_FOCUSED
            } else {
                COLOR_BORDER_IDLE
            }))
            .title(Span::styled(
                " Comments ",
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .padding(Padding::horizontal(1))
            .style(Style::default().bg(COLOR_PANEL_BG));

        let width = area.width.saturating_sub(4).max(10) as usize;
        let mut lines: Vec<Line<'static>> = Vec::new();
        let loading = self
            .session
            .current()
            .map(|item| item.social.comments_loading)
            .unwrap_or(false);
        let comments = self
            .session
            .index()
            .map(|index| self.session.comments(index))
            .unwrap_or(&[]);

        if loading && comments.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("{} Loading comments...", self.spinner.frame()),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        } else if comments.is_empty() {
            lines.push(Line::from(Span::styled(
                "No comments yet.",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
        for comment in comments {
            lines.extend(comment_lines(comment, width));
            lines.push(Line::default());
        }

        if self.mode == Mode::Compose {
            lines.push(Line::from(vec![
                Span::styled("> ", Style::default().fg(COLOR_ACCENT)),
                Span::styled(
                    format!("{}_", self.session.draft()),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                ),
            ]));
        }

        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn footer_text(&self) -> String {
        match self.mode {
            Mode::Compose => "Compose: type to edit · Enter post · Backspace delete · Esc cancel"
                .to_string(),
            Mode::Browse => {
                let mut parts: Vec<&str> = vec!["j/k or scroll to move"];
                if self.session.identity().is_known() {
                    parts.push("l like");
                    parts.push("i comment");
                }
                parts.push(if self.comments_visible {
                    "c hide comments"
                } else {
                    "c comments"
                });
                parts.push("m mute");
                parts.push("t mint");
                parts.push("s share");
                parts.push("q quit");
                parts.join(" · ")
            }
        }
    }
}

fn centered_notice(message: &str) -> Text<'static> {
    Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )),
    ])
}

fn card_text(item: &FeedItem, width: usize) -> Text<'static> {
    let video = &item.video;
    let mut lines: Vec<Line<'static>> = Vec::new();

    let title = if video.title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        video.title.trim().to_string()
    };
    lines.push(Line::from(Span::styled(
        title,
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    )));

    let mut byline = vec![Span::styled(
        video.creator_handle(),
        Style::default().fg(COLOR_ACCENT),
    )];
    let display_name = video.creator_info.display_name.trim();
    if !display_name.is_empty() {
        byline.push(Span::styled(
            format!(" ({display_name})"),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ));
    }
    lines.push(Line::from(byline));
    lines.push(Line::default());

    let caption = video.caption().trim();
    if !caption.is_empty() {
        for row in wrap(caption, WrapOptions::new(width)) {
            lines.push(Line::from(Span::styled(
                row.into_owned(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )));
        }
        lines.push(Line::default());
    }

    let social = &item.social;
    let like_style = if social.liked {
        Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_TEXT_SECONDARY)
    };
    let like_icon = if social.liked { ICON_LIKED } else { ICON_UNLIKED };
    lines.push(Line::from(vec![
        Span::styled(format!("{like_icon} {}", social.like_count), like_style),
        Span::raw("   "),
        Span::styled(
            format!("{} comments", social.comments.len()),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
        Span::raw("   "),
        Span::styled(
            format!("{} views", video.views),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
    ]));

    let symbol = video.token_data.symbol.trim();
    let mut mint = format!("Mint {}", video.mint_price());
    if !symbol.is_empty() {
        mint.push(' ');
        mint.push_str(symbol);
    }
    let mut mint_line = vec![Span::styled(mint, Style::default().fg(COLOR_SUCCESS))];
    if item.playback.minting {
        mint_line.push(Span::styled(
            "  [minting]",
            Style::default()
                .fg(COLOR_SUCCESS)
                .add_modifier(Modifier::BOLD),
        ));
    }
    lines.push(Line::from(mint_line));

    let sound = if item.playback.muted { "muted" } else { "sound on" };
    lines.push(Line::from(Span::styled(
        sound.to_string(),
        Style::default()
            .fg(COLOR_TEXT_SECONDARY)
            .add_modifier(Modifier::ITALIC),
    )));

    Text::from(lines)
}

fn comment_lines(comment: &Comment, width: usize) -> Vec<Line<'static>> {
    let author = match comment.author.username.trim() {
        "" => "@unknown".to_string(),
        name => format!("@{name}"),
    };
    let mut header = vec![Span::styled(
        author,
        Style::default()
            .fg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(posted) = comment.created_at.as_ref().and_then(|ts| ts.parse()) {
        header.push(Span::styled(
            format!("  {}", posted.format("%b %d %H:%M")),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ));
    }

    let mut lines = vec![Line::from(header)];
    for row in wrap(comment.content.trim(), WrapOptions::new(width)) {
        lines.push(Line::from(Span::styled(
            row.into_owned(),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        )));
    }
    lines
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}
