use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use ratatui::text::Line;

use crate::commands::{Command, CommandOutcome};
use crate::conversation::{ConversationEntry, EntryKind};
use crate::domain::{Agent, ModelInfo, Task, TaskPhase};
use crate::errors::UserError;
use crate::events::{Event, KeyAction};
use crate::feed::{self, FeedView};
use crate::theme::Theme;

pub const DOUBLE_PRESS_WINDOW: Duration = Duration::from_secs(1);
pub const HEADER_HEIGHT: u16 = 3;
pub const INPUT_BOX_HEIGHT: u16 = 3;
pub const FOOTER_HEIGHT: u16 = 1;
pub const MIN_FEED_HEIGHT: u16 = 3;
pub const FEED_HORIZONTAL_PADDING: u16 = 1;
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Input,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub feed_width: u16,
    pub feed_height: u16,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        let chrome = HEADER_HEIGHT + INPUT_BOX_HEIGHT + FOOTER_HEIGHT;
        Self {
            feed_width: width.saturating_sub(FEED_HORIZONTAL_PADDING * 2).max(1),
            feed_height: height.saturating_sub(chrome).max(MIN_FEED_HEIGHT),
        }
    }
}

#[derive(Debug, Clone)]
struct FeedCache {
    width: u16,
    generation: u64,
    lines: Arc<Vec<Line<'static>>>,
}

#[derive(Debug)]
pub struct SessionState {
    pub running: bool,
    pub ticks: u64,
    theme: Theme,
    task: Task,
    agent: Agent,
    agents: Vec<Agent>,
    model_cache: HashMap<String, ModelInfo>,
    model_info: Option<ModelInfo>,
    conversation: Vec<ConversationEntry>,
    seen_entry_ids: HashSet<String>,
    pending_echoes: VecDeque<String>,
    local_entry_seq: u64,
    mode: UiMode,
    waiting_for_agent: bool,
    viewport: Viewport,
    input: String,
    cursor: usize,
    feed_scroll: usize,
    last_clear_press: Option<Instant>,
    feed_generation: u64,
    feed_cache: RefCell<Option<FeedCache>>,
}

impl SessionState {
    pub fn new(task: Task, agent: Agent, agents: Vec<Agent>, theme: Theme, viewport: Viewport) -> Self {
        let mut state = Self {
            running: true,
            ticks: 0,
            theme,
            task: Task::default(),
            agent,
            agents,
            model_cache: HashMap::new(),
            model_info: None,
            conversation: Vec::new(),
            seen_entry_ids: HashSet::new(),
            pending_echoes: VecDeque::new(),
            local_entry_seq: 0,
            mode: UiMode::Input,
            waiting_for_agent: false,
            viewport,
            input: String::new(),
            cursor: 0,
            feed_scroll: 0,
            last_clear_press: None,
            feed_generation: 0,
            feed_cache: RefCell::new(None),
        };
        state.apply_task(task);
        state
    }

    pub fn startup_commands(&self) -> Vec<Command> {
        let mut commands = vec![Command::FetchTask {
            task_id: self.task.id.clone(),
        }];
        if !self.model_cache.contains_key(&self.agent.model_id) {
            commands.push(Command::FetchModel {
                model_id: self.agent.model_id.clone(),
            });
        }
        commands
    }

    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Command> {
        match event {
            Event::Key(action) => self.handle_key(action, now),
            Event::Resize { width, height } => {
                self.viewport = Viewport::new(width, height);
                Vec::new()
            }
            Event::ServerTask { task_id } => self.on_server_task(task_id),
            Event::Outcome(outcome) => self.on_outcome(outcome),
            Event::Tick => {
                self.on_tick();
                Vec::new()
            }
        }
    }

    pub fn on_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    fn handle_key(&mut self, action: KeyAction, now: Instant) -> Vec<Command> {
        if action == KeyAction::Ignored {
            return Vec::new();
        }
        if action != KeyAction::ClearOrQuit {
            self.last_clear_press = None;
        }
        if self.mode == UiMode::Help {
            self.mode = UiMode::Input;
            return Vec::new();
        }

        match action {
            KeyAction::ClearOrQuit => {
                self.clear_or_quit(now);
                Vec::new()
            }
            KeyAction::Submit => self.submit(),
            KeyAction::Escape => vec![Command::SuspendTask {
                task_id: self.task.id.clone(),
            }],
            KeyAction::NextAgent => self.switch_agent(),
            KeyAction::Help => {
                self.mode = UiMode::Help;
                Vec::new()
            }
            KeyAction::PageUp => {
                self.scroll_feed_up(self.half_page());
                Vec::new()
            }
            KeyAction::PageDown => {
                self.scroll_feed_down(self.half_page());
                Vec::new()
            }
            KeyAction::MoveUp => {
                self.scroll_feed_up(1);
                Vec::new()
            }
            KeyAction::MoveDown => {
                self.scroll_feed_down(1);
                Vec::new()
            }
            KeyAction::Home => {
                self.cursor = 0;
                Vec::new()
            }
            KeyAction::End => {
                self.cursor = self.input.chars().count();
                Vec::new()
            }
            KeyAction::CursorLeft => {
                self.cursor = self.cursor.saturating_sub(1);
                Vec::new()
            }
            KeyAction::CursorRight => {
                self.cursor = (self.cursor + 1).min(self.input.chars().count());
                Vec::new()
            }
            KeyAction::Backspace => {
                self.backspace_input();
                Vec::new()
            }
            KeyAction::Delete => {
                self.delete_input();
                Vec::new()
            }
            KeyAction::InputChar(c) => {
                self.input_char(c);
                Vec::new()
            }
            KeyAction::Ignored => Vec::new(),
        }
    }

    fn clear_or_quit(&mut self, now: Instant) {
        if let Some(previous) = self.last_clear_press
            && now.saturating_duration_since(previous) < DOUBLE_PRESS_WINDOW
        {
            tracing::info!(task_id = %self.task.id, "quit requested");
            self.quit();
            return;
        }
        self.input.clear();
        self.cursor = 0;
        self.last_clear_press = Some(now);
    }

    fn submit(&mut self) -> Vec<Command> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return Vec::new();
        }
        self.input.clear();
        self.cursor = 0;

        let id = self.next_local_id("local");
        self.append(ConversationEntry::user(id, text.clone(), Utc::now()));
        self.pending_echoes.push_back(text.clone());
        self.waiting_for_agent = true;
        self.feed_scroll = 0;
        vec![Command::SendMessage {
            task_id: self.task.id.clone(),
            text,
            agent_id: self.agent.id.clone(),
        }]
    }

    fn switch_agent(&mut self) -> Vec<Command> {
        if self.agents.len() <= 1 {
            return vec![Command::ListAgents];
        }
        let next = self
            .agents
            .iter()
            .position(|agent| agent.id == self.agent.id)
            .map(|idx| (idx + 1) % self.agents.len())
            .unwrap_or(0);
        self.agent = self.agents[next].clone();
        tracing::info!(agent_id = %self.agent.id, "switched agent");

        match self.model_cache.get(&self.agent.model_id) {
            Some(info) => {
                self.model_info = Some(info.clone());
                Vec::new()
            }
            None => {
                self.model_info = None;
                vec![Command::FetchModel {
                    model_id: self.agent.model_id.clone(),
                }]
            }
        }
    }

    fn on_server_task(&mut self, task_id: String) -> Vec<Command> {
        if task_id != self.task.id {
            return Vec::new();
        }
        vec![Command::FetchTask { task_id }]
    }

    fn on_outcome(&mut self, outcome: CommandOutcome) -> Vec<Command> {
        match outcome {
            CommandOutcome::MessageSent {
                task_id,
                text,
                result,
            } => {
                if task_id != self.task.id {
                    return Vec::new();
                }
                if let Err(err) = result {
                    self.waiting_for_agent = false;
                    if let Some(idx) = self.pending_echoes.iter().position(|echo| *echo == text) {
                        self.pending_echoes.remove(idx);
                    }
                    self.push_error(err);
                }
                Vec::new()
            }
            CommandOutcome::TaskSuspended { task_id, result } => {
                if task_id != self.task.id {
                    return Vec::new();
                }
                match result {
                    Ok(()) => vec![Command::FetchTask { task_id }],
                    Err(err) => {
                        self.push_error(err);
                        Vec::new()
                    }
                }
            }
            CommandOutcome::TaskFetched { task_id, result } => {
                if task_id != self.task.id {
                    tracing::debug!(%task_id, "discarding task fetched for another task");
                    return Vec::new();
                }
                match result {
                    Ok(task) => self.apply_task(task),
                    Err(err) => self.push_error(err),
                }
                Vec::new()
            }
            CommandOutcome::ModelFetched { model_id, result } => {
                match result {
                    Ok(info) => {
                        if model_id == self.agent.model_id {
                            self.model_info = Some(info.clone());
                        }
                        self.model_cache.insert(model_id, info);
                    }
                    Err(err) => self.push_error(err),
                }
                Vec::new()
            }
            CommandOutcome::AgentsListed { result } => {
                match result {
                    Ok(agents) => self.agents = agents,
                    Err(err) => self.push_error(err),
                }
                Vec::new()
            }
        }
    }

    fn apply_task(&mut self, mut task: Task) {
        let messages = std::mem::take(&mut task.messages);
        self.task = task;

        let mut agent_content_arrived = false;
        for message in &messages {
            for entry in message.entries() {
                if !self.seen_entry_ids.insert(entry.id.clone()) {
                    continue;
                }
                if let EntryKind::UserText(text) = &entry.kind
                    && self.absorb_echo(text)
                {
                    continue;
                }
                agent_content_arrived |= entry.is_agent_content();
                self.append(entry);
            }
        }
        if agent_content_arrived {
            self.waiting_for_agent = false;
        }
    }

    fn absorb_echo(&mut self, text: &str) -> bool {
        if self
            .pending_echoes
            .front()
            .is_some_and(|echo| echo == text.trim())
        {
            self.pending_echoes.pop_front();
            return true;
        }
        false
    }

    fn push_error(&mut self, err: UserError) {
        if err.is_silent() {
            tracing::debug!(message = %err.message, "suppressing cancelled request");
            return;
        }
        let id = self.next_local_id("error");
        self.append(ConversationEntry::system_error(id, err, Utc::now()));
    }

    fn append(&mut self, entry: ConversationEntry) {
        self.conversation.push(entry);
        self.feed_generation = self.feed_generation.wrapping_add(1);
    }

    fn next_local_id(&mut self, prefix: &str) -> String {
        self.local_entry_seq = self.local_entry_seq.saturating_add(1);
        format!("{prefix}-{}", self.local_entry_seq)
    }

    fn input_char(&mut self, c: char) {
        let byte_idx = char_to_byte_idx(&self.input, self.cursor);
        self.input.insert(byte_idx, c);
        self.cursor = self.cursor.saturating_add(1);
    }

    fn backspace_input(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = char_to_byte_idx(&self.input, self.cursor - 1);
        let end = char_to_byte_idx(&self.input, self.cursor);
        self.input.drain(start..end);
        self.cursor -= 1;
    }

    fn delete_input(&mut self) {
        if self.cursor >= self.input.chars().count() {
            return;
        }
        let start = char_to_byte_idx(&self.input, self.cursor);
        let end = char_to_byte_idx(&self.input, self.cursor + 1);
        self.input.drain(start..end);
    }

    fn half_page(&self) -> usize {
        usize::from((self.viewport.feed_height / 2).max(1))
    }

    fn scroll_feed_up(&mut self, lines: usize) {
        let max_scroll = self.feed_view().max_scroll;
        self.feed_scroll = self.feed_scroll.saturating_add(lines).min(max_scroll);
    }

    fn scroll_feed_down(&mut self, lines: usize) {
        self.feed_scroll = self.feed_scroll.saturating_sub(lines);
    }

    pub fn feed_view(&self) -> FeedView {
        let width = self.viewport.feed_width;
        let height = self.viewport.feed_height;
        if let Some(cache) = self.feed_cache.borrow().as_ref()
            && cache.width == width
            && cache.generation == self.feed_generation
        {
            return feed::view_of(&cache.lines, height, self.feed_scroll);
        }

        let lines = Arc::new(feed::layout_lines(&self.conversation, &self.theme, width));
        let view = feed::view_of(&lines, height, self.feed_scroll);
        *self.feed_cache.borrow_mut() = Some(FeedCache {
            width,
            generation: self.feed_generation,
            lines,
        });
        view
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn model_info(&self) -> Option<&ModelInfo> {
        self.model_info.as_ref()
    }

    #[cfg(test)]
    pub fn conversation(&self) -> &[ConversationEntry] {
        &self.conversation
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    #[cfg(test)]
    pub fn is_waiting_for_agent(&self) -> bool {
        self.waiting_for_agent
    }

    #[cfg(test)]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub fn feed_scroll(&self) -> usize {
        self.feed_scroll
    }

    pub fn context_percent(&self) -> Option<u8> {
        self.model_info
            .as_ref()
            .map(|info| self.task.usage.context_percent(info.context_window))
    }

    pub fn spinner_frame(&self) -> Option<&'static str> {
        let busy = self.waiting_for_agent || self.task.phase == TaskPhase::Running;
        busy.then(|| SPINNER_FRAMES[(self.ticks % SPINNER_FRAMES.len() as u64) as usize])
    }
}

fn char_to_byte_idx(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or_else(|| s.len())
}

#[cfg(test)]
#[path = "../tests/unit/session_tests.rs"]
mod tests;
