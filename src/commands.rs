use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use crate::client::TaskClient;
use crate::domain::{Agent, ModelInfo, Task};
use crate::errors::{ErrorReporter, UserError, translate};
use crate::events::Event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SendMessage {
        task_id: String,
        text: String,
        agent_id: String,
    },
    SuspendTask {
        task_id: String,
    },
    FetchTask {
        task_id: String,
    },
    FetchModel {
        model_id: String,
    },
    ListAgents,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "send_message",
            Self::SuspendTask { .. } => "suspend_task",
            Self::FetchTask { .. } => "fetch_task",
            Self::FetchModel { .. } => "fetch_model",
            Self::ListAgents => "list_agents",
        }
    }
}

// Every outcome carries the identity it was requested for.
#[derive(Debug)]
pub enum CommandOutcome {
    MessageSent {
        task_id: String,
        text: String,
        result: Result<(), UserError>,
    },
    TaskSuspended {
        task_id: String,
        result: Result<(), UserError>,
    },
    TaskFetched {
        task_id: String,
        result: Result<Task, UserError>,
    },
    ModelFetched {
        model_id: String,
        result: Result<ModelInfo, UserError>,
    },
    AgentsListed {
        result: Result<Vec<Agent>, UserError>,
    },
}

pub fn execute(
    command: Command,
    client: &dyn TaskClient,
    reporter: &dyn ErrorReporter,
) -> CommandOutcome {
    let to_user = |err| translate(&err, reporter);
    match command {
        Command::SendMessage {
            task_id,
            text,
            agent_id,
        } => {
            let result = client
                .create_message(&task_id, &text, &agent_id)
                .map_err(to_user);
            CommandOutcome::MessageSent {
                task_id,
                text,
                result,
            }
        }
        Command::SuspendTask { task_id } => {
            let result = client.suspend_task(&task_id).map_err(to_user);
            CommandOutcome::TaskSuspended { task_id, result }
        }
        Command::FetchTask { task_id } => {
            let result = client.get_task(&task_id).map_err(to_user);
            CommandOutcome::TaskFetched { task_id, result }
        }
        Command::FetchModel { model_id } => {
            let result = client.get_model(&model_id).map_err(to_user);
            CommandOutcome::ModelFetched { model_id, result }
        }
        Command::ListAgents => CommandOutcome::AgentsListed {
            result: client.list_agents().map_err(to_user),
        },
    }
}

#[derive(Clone)]
pub struct CommandRunner {
    client: Arc<dyn TaskClient>,
    reporter: Arc<dyn ErrorReporter>,
    event_tx: Sender<Event>,
}

impl CommandRunner {
    pub fn new(
        client: Arc<dyn TaskClient>,
        reporter: Arc<dyn ErrorReporter>,
        event_tx: Sender<Event>,
    ) -> Self {
        Self {
            client,
            reporter,
            event_tx,
        }
    }

    pub fn dispatch(&self, command: Command) {
        tracing::debug!(command = command.name(), "dispatching command");
        let client = Arc::clone(&self.client);
        let reporter = Arc::clone(&self.reporter);
        let event_tx = self.event_tx.clone();
        thread::spawn(move || {
            let outcome = execute(command, client.as_ref(), reporter.as_ref());
            let _ = event_tx.send(Event::Outcome(outcome));
        });
    }

    pub fn dispatch_all(&self, commands: Vec<Command>) {
        for command in commands {
            self.dispatch(command);
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/commands_tests.rs"]
mod tests;
