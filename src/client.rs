use std::error::Error as _;
use std::io::{BufRead, BufReader};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::domain::{Agent, ModelInfo, Task, TaskSummary};
use crate::errors::ClientError;
use crate::events::Event;

const EVENT_STREAM_RETRY_DELAY: Duration = Duration::from_millis(400);
const EVENT_STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub trait TaskClient: Send + Sync {
    fn list_tasks(&self) -> Result<Vec<TaskSummary>, ClientError>;
    fn create_task(&self, workspace: &str) -> Result<Task, ClientError>;
    fn get_task(&self, task_id: &str) -> Result<Task, ClientError>;
    fn create_message(&self, task_id: &str, text: &str, agent_id: &str)
    -> Result<(), ClientError>;
    fn suspend_task(&self, task_id: &str) -> Result<(), ClientError>;
    fn get_model(&self, model_id: &str) -> Result<ModelInfo, ClientError>;
    fn list_agents(&self) -> Result<Vec<Agent>, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpTaskClient {
    http: Client,
    base_url: Url,
}

impl HttpTaskClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|err| ClientError::Transport {
            message: format!("invalid server url {base_url}: {err}"),
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self { http, base_url })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Transport {
                message: format!("server url {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let body = self.execute(request)?;
        serde_json::from_str(&body).map_err(|err| ClientError::Decode(err.to_string()))
    }

    fn execute(&self, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request.send().map_err(transport_error)?;
        let status = response.status();
        let body = response.text().map_err(transport_error)?;
        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body));
        }
        Ok(body)
    }
}

impl TaskClient for HttpTaskClient {
    fn list_tasks(&self) -> Result<Vec<TaskSummary>, ClientError> {
        self.fetch(self.http.get(self.url(&["tasks"])?))
    }

    fn create_task(&self, workspace: &str) -> Result<Task, ClientError> {
        let request = self
            .http
            .post(self.url(&["tasks"])?)
            .json(&json!({ "workspace": workspace }));
        self.fetch(request)
    }

    fn get_task(&self, task_id: &str) -> Result<Task, ClientError> {
        self.fetch(self.http.get(self.url(&["tasks", task_id])?))
    }

    fn create_message(
        &self,
        task_id: &str,
        text: &str,
        agent_id: &str,
    ) -> Result<(), ClientError> {
        let request = self
            .http
            .post(self.url(&["tasks", task_id, "messages"])?)
            .json(&json!({ "text": text, "agent_id": agent_id }));
        self.execute(request).map(|_| ())
    }

    fn suspend_task(&self, task_id: &str) -> Result<(), ClientError> {
        let request = self.http.post(self.url(&["tasks", task_id, "suspend"])?);
        self.execute(request).map(|_| ())
    }

    fn get_model(&self, model_id: &str) -> Result<ModelInfo, ClientError> {
        self.fetch(self.http.get(self.url(&["models", model_id])?))
    }

    fn list_agents(&self) -> Result<Vec<Agent>, ClientError> {
        self.fetch(self.http.get(self.url(&["agents"])?))
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    ClientError::Transport { message }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn error_from_body(status: u16, body: &str) -> ClientError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let code = parsed.as_ref().and_then(|body| body.code.clone());
    let message = parsed
        .and_then(|body| body.message)
        .unwrap_or_else(|| body.trim().to_string());
    ClientError::Status {
        status,
        code,
        message,
    }
}

pub fn spawn_server_event_listener(event_tx: Sender<Event>, base_url: String) {
    thread::spawn(move || {
        // The stream stays open indefinitely, so only the connect phase is bounded.
        let client = match Client::builder()
            .connect_timeout(EVENT_STREAM_CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(%err, "failed to initialize server event stream client");
                return;
            }
        };

        let event_url = format!("{}/event", base_url.trim_end_matches('/'));
        loop {
            match client
                .get(&event_url)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
            {
                Ok(response) if response.status().is_success() => {
                    if !consume_server_event_stream(BufReader::new(response), &event_tx) {
                        return;
                    }
                }
                Ok(response) => {
                    tracing::debug!(
                        url = %event_url,
                        status = %response.status(),
                        "server event stream subscription rejected"
                    );
                }
                Err(err) => {
                    tracing::debug!(url = %event_url, %err, "server event stream disconnected");
                }
            }
            thread::sleep(EVENT_STREAM_RETRY_DELAY);
        }
    });
}

// Returns false once the receiving side is gone.
fn consume_server_event_stream(mut reader: impl BufRead, event_tx: &Sender<Event>) -> bool {
    let mut line = String::new();
    let mut data_lines: Vec<String> = Vec::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return forward_server_event(&data_lines, event_tx),
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\r', '\n']);
                if trimmed.is_empty() {
                    if !forward_server_event(&data_lines, event_tx) {
                        return false;
                    }
                    data_lines.clear();
                    continue;
                }
                if trimmed.starts_with(':') {
                    continue;
                }
                if let Some(payload) = trimmed.strip_prefix("data:") {
                    data_lines.push(payload.trim_start().to_string());
                }
            }
            Err(err) => {
                tracing::debug!(error = %ClientError::from(err), "error while reading server event stream");
                return true;
            }
        }
    }
}

fn forward_server_event(data_lines: &[String], event_tx: &Sender<Event>) -> bool {
    if data_lines.is_empty() {
        return true;
    }
    match task_id_from_payload(&data_lines.join("\n")) {
        Some(task_id) => event_tx.send(Event::ServerTask { task_id }).is_ok(),
        None => true,
    }
}

fn task_id_from_payload(payload: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(payload).ok()?;
    if value.get("type").and_then(|item| item.as_str()) != Some("task.updated") {
        return None;
    }
    ["task_id", "taskId", "taskID"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|item| item.as_str()))
        .map(ToString::to_string)
}
