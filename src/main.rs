use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::cursor::SetCursorStyle;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;

mod client;
mod commands;
mod config;
mod conversation;
mod domain;
mod errors;
mod events;
mod feed;
mod logging;
mod markdown;
mod selection;
mod session;
mod text_layout;
mod theme;
mod ui;

use client::{HttpTaskClient, TaskClient};
use commands::CommandRunner;
use config::{Config, SERVER_ENV_VAR};
use domain::{Agent, TaskSummary};
use errors::{ClientError, ErrorReporter, TracingReporter, translate};
use events::Event;
use selection::{SelectionState, SelectionTable};
use session::{SessionState, Viewport};
use theme::Theme;

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const MAX_EVENTS_PER_LOOP: usize = 128;

type AppTerminal = Terminal<CrosstermBackend<io::Stdout>>;

#[derive(Debug, Parser)]
#[command(
    name = "taskdeck",
    version,
    about = "Terminal client for a remote multi-agent task service"
)]
struct LaunchOptions {
    /// Base URL of the task service
    #[arg(long, value_name = "URL")]
    server: Option<String>,
    /// Open this task instead of picking one
    #[arg(long, value_name = "ID", conflicts_with = "new_task")]
    task: Option<String>,
    /// Start with this agent selected
    #[arg(long, value_name = "ID")]
    agent: Option<String>,
    /// Create a new task
    #[arg(long = "new")]
    new_task: bool,
    /// Workspace for a new task (defaults to the current directory)
    #[arg(long, value_name = "PATH", requires = "new_task")]
    workspace: Option<PathBuf>,
    /// Path to the config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

enum StartTarget {
    Task(String),
    Pick(Vec<TaskSummary>),
}

fn main() -> io::Result<()> {
    let options = LaunchOptions::parse();

    let config_path = options.config.clone().or_else(Config::default_path);
    let (config, config_error) = match config_path.as_deref().map(Config::load) {
        Some(Ok(config)) => (config, None),
        Some(Err(err)) => (Config::default(), Some(err)),
        None => (Config::default(), None),
    };
    let config =
        config.with_server_override(std::env::var(SERVER_ENV_VAR).ok(), options.server.clone());
    let _log_guard = logging::init(&config.log_dir());
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "falling back to default configuration");
    }
    tracing::info!(server = %config.server_url, "taskdeck starting");

    let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingReporter);
    let client: Arc<dyn TaskClient> = Arc::new(
        HttpTaskClient::new(&config.server_url, config.request_timeout())
            .map_err(|err| startup_error(&err, reporter.as_ref()))?,
    );

    let target = if options.new_task {
        let workspace = match options.workspace.clone() {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let task = client
            .create_task(&workspace.to_string_lossy())
            .map_err(|err| startup_error(&err, reporter.as_ref()))?;
        tracing::info!(task_id = %task.id, "created task");
        StartTarget::Task(task.id)
    } else if let Some(task_id) = options.task.clone() {
        StartTarget::Task(task_id)
    } else {
        let tasks = client
            .list_tasks()
            .map_err(|err| startup_error(&err, reporter.as_ref()))?;
        if tasks.is_empty() {
            eprintln!(
                "No tasks found on {}. Start one with --new.",
                config.server_url
            );
            return Ok(());
        }
        StartTarget::Pick(tasks)
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, SetCursorStyle::SteadyBar)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(
        &mut terminal,
        target,
        &options,
        &config,
        client,
        reporter,
    );

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        SetCursorStyle::DefaultUserShape,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        tracing::error!(error = %err, "taskdeck exited with error");
    }
    result
}

fn run_app(
    terminal: &mut AppTerminal,
    target: StartTarget,
    options: &LaunchOptions,
    config: &Config,
    client: Arc<dyn TaskClient>,
    reporter: Arc<dyn ErrorReporter>,
) -> io::Result<()> {
    let theme = config.theme();
    let (event_tx, event_rx) = mpsc::channel();
    events::spawn_terminal_reader(event_tx.clone());

    let task_id = match target {
        StartTarget::Task(task_id) => task_id,
        StartTarget::Pick(tasks) => match run_picker(terminal, tasks, &theme, &event_rx)? {
            Some(summary) => summary.id,
            None => return Ok(()),
        },
    };

    let task = client
        .get_task(&task_id)
        .map_err(|err| startup_error(&err, reporter.as_ref()))?;
    let agents = client
        .list_agents()
        .map_err(|err| startup_error(&err, reporter.as_ref()))?;
    let agent = choose_agent(&agents, options.agent.as_deref(), task.agent_id.as_deref())?;
    tracing::info!(task_id = %task.id, agent_id = %agent.id, "opening task");

    let size = terminal.size()?;
    let mut state = SessionState::new(
        task,
        agent,
        agents,
        theme,
        Viewport::new(size.width, size.height),
    );
    client::spawn_server_event_listener(event_tx.clone(), config.server_url.clone());
    let runner = CommandRunner::new(client, reporter, event_tx);
    runner.dispatch_all(state.startup_commands());

    let mut last_tick = Instant::now();
    while state.running {
        terminal.draw(|frame| ui::render(frame, &state))?;

        let wait = TICK_INTERVAL.saturating_sub(last_tick.elapsed());
        let mut pending = match event_rx.recv_timeout(wait) {
            Ok(event) => vec![event],
            Err(RecvTimeoutError::Timeout) => Vec::new(),
            Err(RecvTimeoutError::Disconnected) => break,
        };
        pending.extend(drain_events_limited(&event_rx, MAX_EVENTS_PER_LOOP));
        if last_tick.elapsed() >= TICK_INTERVAL {
            pending.push(Event::Tick);
            last_tick = Instant::now();
        }

        for event in pending {
            let commands = state.handle(event, Instant::now());
            runner.dispatch_all(commands);
        }
    }
    tracing::info!("session closed");
    Ok(())
}

fn run_picker(
    terminal: &mut AppTerminal,
    tasks: Vec<TaskSummary>,
    theme: &Theme,
    event_rx: &Receiver<Event>,
) -> io::Result<Option<TaskSummary>> {
    let mut table = SelectionTable::new(tasks, ui::picker_rows(terminal.size()?.height));
    loop {
        terminal.draw(|frame| ui::render_picker(frame, &table, theme))?;
        match event_rx.recv() {
            Ok(Event::Key(action)) => {
                if table.handle(action) != SelectionState::Open {
                    break;
                }
            }
            Ok(Event::Resize { height, .. }) => table.set_page_size(ui::picker_rows(height)),
            Ok(_) => {}
            Err(_) => return Ok(None),
        }
    }
    Ok(table.into_confirmed())
}

fn drain_events_limited(event_rx: &Receiver<Event>, max: usize) -> Vec<Event> {
    let mut drained = Vec::new();
    while drained.len() < max {
        match event_rx.try_recv() {
            Ok(event) => drained.push(event),
            Err(_) => break,
        }
    }
    drained
}

fn choose_agent(
    agents: &[Agent],
    requested: Option<&str>,
    task_agent: Option<&str>,
) -> io::Result<Agent> {
    if let Some(requested) = requested {
        return agents
            .iter()
            .find(|agent| agent.id == requested)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Unknown agent: {requested}"),
                )
            });
    }
    task_agent
        .and_then(|id| agents.iter().find(|agent| agent.id == id))
        .or_else(|| agents.first())
        .cloned()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "The server has no agents"))
}

fn startup_error(err: &ClientError, reporter: &dyn ErrorReporter) -> io::Error {
    let user_error = translate(err, reporter);
    let mut message = user_error.message;
    for hint in user_error.hints {
        message.push_str("\n  ");
        message.push_str(&hint);
    }
    io::Error::other(message)
}
