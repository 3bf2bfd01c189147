use super::*;
use crate::errors::ErrorCategory;

fn agent(id: &str, model_id: &str) -> Agent {
    Agent {
        id: id.to_string(),
        name: id.to_uppercase(),
        model_id: model_id.to_string(),
    }
}

fn roster() -> Vec<Agent> {
    vec![agent("a", "m-a"), agent("b", "m-b"), agent("c", "m-c")]
}

fn task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        workspace: "/home/dev/project".to_string(),
        ..Task::default()
    }
}

fn task_from_json(json: &str) -> Task {
    serde_json::from_str(json).expect("task json should parse")
}

fn session_with(active: Agent, agents: Vec<Agent>) -> SessionState {
    SessionState::new(
        task("t1"),
        active,
        agents,
        Theme::default(),
        Viewport::new(80, 24),
    )
}

fn session() -> SessionState {
    session_with(agent("a", "m-a"), roster())
}

fn key(state: &mut SessionState, action: KeyAction, now: Instant) -> Vec<Command> {
    state.handle(Event::Key(action), now)
}

fn type_text(state: &mut SessionState, text: &str) {
    let now = Instant::now();
    for c in text.chars() {
        key(state, KeyAction::InputChar(c), now);
    }
}

fn user_error(category: ErrorCategory, message: &str) -> UserError {
    UserError {
        category,
        message: message.to_string(),
        hints: Vec::new(),
    }
}

fn model(name: &str) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        context_window: 200_000,
    }
}

fn system_errors(state: &SessionState) -> Vec<&UserError> {
    state
        .conversation()
        .iter()
        .filter_map(|entry| match &entry.kind {
            EntryKind::SystemError(err) => Some(err),
            _ => None,
        })
        .collect()
}

#[test]
fn startup_fetches_task_and_active_model() {
    let state = session();
    assert_eq!(
        state.startup_commands(),
        vec![
            Command::FetchTask {
                task_id: "t1".to_string()
            },
            Command::FetchModel {
                model_id: "m-a".to_string()
            },
        ]
    );
}

#[test]
fn submit_echoes_locally_and_sends_with_active_agent() {
    let mut state = session();
    type_text(&mut state, "  fix the build  ");

    let commands = key(&mut state, KeyAction::Submit, Instant::now());

    assert_eq!(
        commands,
        vec![Command::SendMessage {
            task_id: "t1".to_string(),
            text: "fix the build".to_string(),
            agent_id: "a".to_string(),
        }]
    );
    assert_eq!(state.input(), "");
    assert_eq!(state.cursor(), 0);
    assert!(state.is_waiting_for_agent());
    assert_eq!(state.conversation().len(), 1);
    assert_eq!(
        state.conversation()[0].kind,
        EntryKind::UserText("fix the build".to_string())
    );
}

#[test]
fn whitespace_only_submit_issues_nothing() {
    let mut state = session();
    assert!(key(&mut state, KeyAction::Submit, Instant::now()).is_empty());

    type_text(&mut state, "   ");
    assert!(key(&mut state, KeyAction::Submit, Instant::now()).is_empty());
    assert!(state.conversation().is_empty());
    assert!(!state.is_waiting_for_agent());
}

#[test]
fn agent_switch_advances_and_wraps() {
    let mut state = session_with(agent("b", "m-b"), roster());

    let commands = key(&mut state, KeyAction::NextAgent, Instant::now());
    assert_eq!(state.agent().id, "c");
    assert_eq!(
        commands,
        vec![Command::FetchModel {
            model_id: "m-c".to_string()
        }]
    );

    key(&mut state, KeyAction::NextAgent, Instant::now());
    assert_eq!(state.agent().id, "a");
}

#[test]
fn agent_switch_falls_back_to_first_when_active_is_unknown() {
    let mut state = session_with(agent("ghost", "m-x"), roster());
    key(&mut state, KeyAction::NextAgent, Instant::now());
    assert_eq!(state.agent().id, "a");
}

#[test]
fn agent_switch_uses_cached_model_without_fetching() {
    let mut state = session();
    state.handle(
        Event::Outcome(CommandOutcome::ModelFetched {
            model_id: "m-b".to_string(),
            result: Ok(model("Model B")),
        }),
        Instant::now(),
    );

    let commands = key(&mut state, KeyAction::NextAgent, Instant::now());

    assert!(commands.is_empty());
    assert_eq!(state.model_info().map(|info| info.name.as_str()), Some("Model B"));
}

#[test]
fn single_agent_roster_requests_a_refresh_instead_of_switching() {
    let mut state = session_with(agent("a", "m-a"), vec![agent("a", "m-a")]);
    let commands = key(&mut state, KeyAction::NextAgent, Instant::now());
    assert_eq!(commands, vec![Command::ListAgents]);
    assert_eq!(state.agent().id, "a");

    state.handle(
        Event::Outcome(CommandOutcome::AgentsListed { result: Ok(roster()) }),
        Instant::now(),
    );
    assert_eq!(state.agents().len(), 3);
}

#[test]
fn stale_model_outcome_does_not_overwrite_displayed_model() {
    let mut state = session();
    let now = Instant::now();
    key(&mut state, KeyAction::NextAgent, now);
    state.handle(
        Event::Outcome(CommandOutcome::ModelFetched {
            model_id: "m-b".to_string(),
            result: Ok(model("Model B")),
        }),
        now,
    );
    assert_eq!(state.model_info().map(|info| info.name.as_str()), Some("Model B"));

    state.handle(
        Event::Outcome(CommandOutcome::ModelFetched {
            model_id: "m-a".to_string(),
            result: Ok(model("Model A")),
        }),
        now,
    );

    assert_eq!(state.model_info().map(|info| info.name.as_str()), Some("Model B"));
    let commands = key(&mut state, KeyAction::NextAgent, now);
    assert_eq!(state.agent().id, "c");
    assert_eq!(commands.len(), 1);
}

#[test]
fn double_press_within_window_quits() {
    let mut state = session();
    let start = Instant::now();
    type_text(&mut state, "draft");

    key(&mut state, KeyAction::ClearOrQuit, start);
    assert!(state.running);
    assert_eq!(state.input(), "");

    key(
        &mut state,
        KeyAction::ClearOrQuit,
        start + Duration::from_millis(500),
    );
    assert!(!state.running);
}

#[test]
fn slow_second_press_clears_again_instead_of_quitting() {
    let mut state = session();
    let start = Instant::now();
    type_text(&mut state, "first");
    key(&mut state, KeyAction::ClearOrQuit, start);
    assert_eq!(state.input(), "");

    let later = start + Duration::from_secs(2);
    for c in "second".chars() {
        key(&mut state, KeyAction::InputChar(c), later);
    }
    key(&mut state, KeyAction::ClearOrQuit, later);
    assert!(state.running);
    assert_eq!(state.input(), "");

    let much_later = later + Duration::from_secs(2);
    key(&mut state, KeyAction::ClearOrQuit, much_later);
    assert!(state.running);
}

#[test]
fn other_keys_between_presses_reset_the_gesture() {
    let mut state = session();
    let start = Instant::now();
    key(&mut state, KeyAction::ClearOrQuit, start);
    key(
        &mut state,
        KeyAction::InputChar('x'),
        start + Duration::from_millis(100),
    );
    key(
        &mut state,
        KeyAction::ClearOrQuit,
        start + Duration::from_millis(200),
    );
    assert!(state.running);
    assert_eq!(state.input(), "");
}

#[test]
fn send_failure_clears_waiting_and_appends_one_error() {
    let mut state = session();
    type_text(&mut state, "hello");
    key(&mut state, KeyAction::Submit, Instant::now());

    state.handle(
        Event::Outcome(CommandOutcome::MessageSent {
            task_id: "t1".to_string(),
            text: "hello".to_string(),
            result: Err(user_error(ErrorCategory::Generic, "boom")),
        }),
        Instant::now(),
    );

    assert!(!state.is_waiting_for_agent());
    let errors = system_errors(&state);
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].message.is_empty());
    assert_eq!(state.conversation().len(), 2);
}

#[test]
fn cancelled_failures_are_not_rendered() {
    let mut state = session();
    state.handle(
        Event::Outcome(CommandOutcome::TaskFetched {
            task_id: "t1".to_string(),
            result: Err(user_error(ErrorCategory::Cancelled, "Request cancelled.")),
        }),
        Instant::now(),
    );
    assert!(state.conversation().is_empty());
}

#[test]
fn fetched_task_replaces_status_and_appends_new_entries_once() {
    let mut state = session();
    type_text(&mut state, "list the files");
    key(&mut state, KeyAction::Submit, Instant::now());

    let fetched = task_from_json(
        r#"{
            "id": "t1",
            "workspace": "/home/dev/project",
            "phase": "running",
            "usage": {"input_tokens": 10, "output_tokens": 5, "cost": 0.25},
            "messages": [
                {"id": "u1", "role": "user", "parts": [{"type": "text", "text": "list the files"}]},
                {"id": "r1", "role": "assistant", "parts": [
                    {"type": "text", "text": "Sure."},
                    {"type": "tool_call", "id": "call-1", "tool": "list_files", "input": {"path": "."}}
                ]}
            ]
        }"#,
    );

    for _ in 0..2 {
        state.handle(
            Event::Outcome(CommandOutcome::TaskFetched {
                task_id: "t1".to_string(),
                result: Ok(fetched.clone()),
            }),
            Instant::now(),
        );
    }

    assert_eq!(state.task().phase, TaskPhase::Running);
    assert_eq!(state.task().usage.output_tokens, 5);
    assert!(!state.is_waiting_for_agent());
    let ids: Vec<&str> = state
        .conversation()
        .iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(ids, vec!["local-1", "r1/0", "call-1"]);
}

#[test]
fn part_that_parses_later_does_not_duplicate_its_neighbours() {
    let mut state = session();
    let fetch = |input: &str| {
        task_from_json(&format!(
            r#"{{"id":"t1","messages":[{{"id":"m1","role":"assistant","parts":[
                {{"type":"text","text":"Looking."}},
                {{"type":"tool_call","id":"c1","tool":"read_file","input":{input}}},
                {{"type":"text","text":"Done."}}
            ]}}]}}"#
        ))
    };

    for fetched in [fetch("{}"), fetch(r#"{"path":"a.rs"}"#)] {
        state.handle(
            Event::Outcome(CommandOutcome::TaskFetched {
                task_id: "t1".to_string(),
                result: Ok(fetched),
            }),
            Instant::now(),
        );
    }

    let ids: Vec<&str> = state
        .conversation()
        .iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(ids, vec!["m1/0", "m1/2", "c1"]);
    let done_count = state
        .conversation()
        .iter()
        .filter(|entry| entry.kind == EntryKind::AssistantText("Done.".to_string()))
        .count();
    assert_eq!(done_count, 1);
}

#[test]
fn failed_fetch_appends_one_error_and_keeps_the_task() {
    let mut state = session();
    state.handle(
        Event::Outcome(CommandOutcome::TaskFetched {
            task_id: "t1".to_string(),
            result: Err(user_error(ErrorCategory::NotFound, "Not found: t1")),
        }),
        Instant::now(),
    );

    let errors = system_errors(&state);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Not found: t1");
    assert_eq!(state.conversation().len(), 1);
    assert_eq!(state.task().id, "t1");
}

#[test]
fn failed_model_fetch_appends_an_error_and_leaves_model_unknown() {
    let mut state = session();
    state.handle(
        Event::Outcome(CommandOutcome::ModelFetched {
            model_id: "m-a".to_string(),
            result: Err(user_error(ErrorCategory::TransientUnavailable, "not ready")),
        }),
        Instant::now(),
    );

    assert_eq!(system_errors(&state).len(), 1);
    assert!(state.model_info().is_none());
    assert_eq!(state.context_percent(), None);
}

#[test]
fn listed_agents_replace_an_existing_roster() {
    let mut state = session();
    assert_eq!(state.agents().len(), 3);

    let refreshed = vec![agent("x", "m-x"), agent("a", "m-a")];
    state.handle(
        Event::Outcome(CommandOutcome::AgentsListed {
            result: Ok(refreshed.clone()),
        }),
        Instant::now(),
    );

    assert_eq!(state.agents(), refreshed.as_slice());
    assert_eq!(state.agent().id, "a");
    key(&mut state, KeyAction::NextAgent, Instant::now());
    assert_eq!(state.agent().id, "x");
}

#[test]
fn user_only_fetch_keeps_waiting_for_agent() {
    let mut state = session();
    type_text(&mut state, "hi");
    key(&mut state, KeyAction::Submit, Instant::now());
    state.handle(
        Event::Outcome(CommandOutcome::TaskFetched {
            task_id: "t1".to_string(),
            result: Ok(task_from_json(
                r#"{"id":"t1","messages":[{"id":"u1","role":"user","parts":[{"type":"text","text":"hi"}]}]}"#,
            )),
        }),
        Instant::now(),
    );
    assert!(state.is_waiting_for_agent());
    assert_eq!(state.conversation().len(), 1);
}

#[test]
fn task_fetched_for_another_task_is_discarded() {
    let mut state = session();
    state.handle(
        Event::Outcome(CommandOutcome::TaskFetched {
            task_id: "other".to_string(),
            result: Ok(task_from_json(r#"{"id":"other","phase":"suspended"}"#)),
        }),
        Instant::now(),
    );
    assert_eq!(state.task().id, "t1");
    assert_eq!(state.task().phase, TaskPhase::Awaiting);
}

#[test]
fn orphan_tool_result_still_renders() {
    let mut state = session();
    state.handle(
        Event::Outcome(CommandOutcome::TaskFetched {
            task_id: "t1".to_string(),
            result: Ok(task_from_json(
                r#"{"id":"t1","messages":[{"id":"r9","role":"assistant","parts":[
                    {"type":"tool_result","call_id":"missing","tool":"search","output":{"matches":2}}
                ]}]}"#,
            )),
        }),
        Instant::now(),
    );
    assert_eq!(state.conversation().len(), 1);
    let view = state.feed_view();
    let text: String = view.lines[0]
        .spans
        .iter()
        .map(|span| span.content.as_ref())
        .collect();
    assert_eq!(text, "  ⎿ Found 2 matches");
}

#[test]
fn server_events_fetch_only_the_current_task() {
    let mut state = session();
    assert_eq!(
        state.handle(
            Event::ServerTask {
                task_id: "t1".to_string()
            },
            Instant::now()
        ),
        vec![Command::FetchTask {
            task_id: "t1".to_string()
        }]
    );
    assert!(
        state
            .handle(
                Event::ServerTask {
                    task_id: "t2".to_string()
                },
                Instant::now()
            )
            .is_empty()
    );
}

#[test]
fn suspend_does_not_change_phase_until_refetched() {
    let mut state = session();
    let commands = key(&mut state, KeyAction::Escape, Instant::now());
    assert_eq!(
        commands,
        vec![Command::SuspendTask {
            task_id: "t1".to_string()
        }]
    );
    assert_eq!(state.task().phase, TaskPhase::Awaiting);

    let follow_up = state.handle(
        Event::Outcome(CommandOutcome::TaskSuspended {
            task_id: "t1".to_string(),
            result: Ok(()),
        }),
        Instant::now(),
    );
    assert_eq!(
        follow_up,
        vec![Command::FetchTask {
            task_id: "t1".to_string()
        }]
    );
}

#[test]
fn help_overlay_consumes_the_closing_key() {
    let mut state = session();
    type_text(&mut state, "draft");
    key(&mut state, KeyAction::Help, Instant::now());
    assert_eq!(state.mode(), UiMode::Help);

    assert!(key(&mut state, KeyAction::Submit, Instant::now()).is_empty());
    assert_eq!(state.mode(), UiMode::Input);
    assert_eq!(state.input(), "draft");
    assert!(state.conversation().is_empty());

    key(&mut state, KeyAction::InputChar('z'), Instant::now());
    assert_eq!(state.input(), "draftz");

    key(&mut state, KeyAction::Help, Instant::now());
    key(&mut state, KeyAction::Help, Instant::now());
    assert_eq!(state.mode(), UiMode::Input);
}

#[test]
fn ctrl_c_in_help_only_closes_the_overlay() {
    let mut state = session();
    let start = Instant::now();
    type_text(&mut state, "draft");
    key(&mut state, KeyAction::Help, start);

    key(&mut state, KeyAction::ClearOrQuit, start);
    assert_eq!(state.mode(), UiMode::Input);
    assert_eq!(state.input(), "draft");
    assert!(state.running);

    // The closing press is not counted as the first half of the gesture.
    key(&mut state, KeyAction::ClearOrQuit, start + Duration::from_millis(100));
    assert_eq!(state.input(), "");
    assert!(state.running);

    key(&mut state, KeyAction::ClearOrQuit, start + Duration::from_millis(200));
    assert!(!state.running);
}

#[test]
fn resize_recomputes_feed_geometry_with_floor() {
    let mut state = session();
    state.handle(
        Event::Resize {
            width: 100,
            height: 40,
        },
        Instant::now(),
    );
    assert_eq!(state.viewport().feed_height, 33);
    assert_eq!(state.viewport().feed_width, 98);

    state.handle(
        Event::Resize {
            width: 10,
            height: 5,
        },
        Instant::now(),
    );
    assert_eq!(state.viewport().feed_height, MIN_FEED_HEIGHT);
}

#[test]
fn input_editing_handles_multibyte_characters() {
    let mut state = session();
    type_text(&mut state, "héllo");
    let now = Instant::now();
    key(&mut state, KeyAction::Home, now);
    key(&mut state, KeyAction::CursorRight, now);
    key(&mut state, KeyAction::Delete, now);
    assert_eq!(state.input(), "hllo");
    key(&mut state, KeyAction::InputChar('ë'), now);
    assert_eq!(state.input(), "hëllo");
    key(&mut state, KeyAction::End, now);
    key(&mut state, KeyAction::Backspace, now);
    assert_eq!(state.input(), "hëll");
    assert_eq!(state.cursor(), 4);
}

#[test]
fn page_up_is_clamped_to_history() {
    let mut state = session();
    for n in 0..30 {
        type_text(&mut state, &format!("message {n}"));
        key(&mut state, KeyAction::Submit, Instant::now());
    }
    let max_scroll = state.feed_view().max_scroll;
    assert!(max_scroll > 0);

    for _ in 0..50 {
        key(&mut state, KeyAction::PageUp, Instant::now());
    }
    assert_eq!(state.feed_scroll(), max_scroll);
    assert_eq!(state.feed_view().top, 0);

    key(&mut state, KeyAction::PageDown, Instant::now());
    assert_eq!(
        state.feed_scroll(),
        max_scroll - usize::from(state.viewport().feed_height / 2)
    );
}

#[test]
fn spinner_runs_only_while_busy() {
    let mut state = session();
    assert_eq!(state.spinner_frame(), None);
    type_text(&mut state, "go");
    key(&mut state, KeyAction::Submit, Instant::now());
    let first = state.spinner_frame();
    state.handle(Event::Tick, Instant::now());
    assert!(first.is_some());
    assert_ne!(state.spinner_frame(), first);
}
