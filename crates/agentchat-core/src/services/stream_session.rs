use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::message_composer::{ComposeRejection, MessageComposer};
use super::title_generator::{TitleEngine, first_human_text};
use super::tool_responses::is_hidden;
use crate::models::{
    AttachmentBlock, Message, Notification, Notifier, Thread, ThreadValues, ThreadsStore, UiEvent, UiMessage,
    reduce_ui,
};
use crate::repositories::{AgentService, EventStream, RunRequest, ServiceError, ServiceResult, StreamEvent, ThreadSearch};
use crate::settings::models::{ClientConfig, MessageFilterConfig, TitleConfig};

/// Message counts at which a running conversation is re-titled
fn is_retitle_point(count: usize) -> bool {
    count == 1 || count == 2 || (count > 0 && count % 5 == 0)
}

/// Status of the session's connection to the agent service
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Streaming,
    Error(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] ServiceError),

    #[error("No active thread")]
    NotConnected,

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error(transparent)]
    Rejected(#[from] ComposeRejection),
}

struct SessionState {
    status: SessionStatus,
    thread_id: Option<String>,
    /// Bumped on every thread change so stale naming passes can bail out
    generation: u64,
    messages: Vec<Message>,
    ui: Vec<UiMessage>,
    /// Optimistic message ids the server has not echoed yet
    pending: HashSet<String>,
    /// Initial naming gate, reset on thread change
    named: bool,
    /// Last title persisted for the current thread
    title: Option<String>,
    /// Stored or hand-set title; automatic passes leave it alone
    title_pinned: bool,
    /// Context sent with the latest turn
    context: Option<Value>,
    last_error: Option<String>,
    in_flight: bool,
    finished: bool,
    last_retitle_count: usize,
}

impl SessionState {
    fn new() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            thread_id: None,
            generation: 0,
            messages: Vec::new(),
            ui: Vec::new(),
            pending: HashSet::new(),
            named: false,
            title: None,
            title_pinned: false,
            context: None,
            last_error: None,
            in_flight: false,
            finished: false,
            last_retitle_count: 0,
        }
    }

    fn reset_for(&mut self, thread_id: Option<String>) {
        self.thread_id = thread_id;
        self.generation += 1;
        self.messages.clear();
        self.ui.clear();
        self.pending.clear();
        self.named = false;
        self.title = None;
        self.title_pinned = false;
        self.context = None;
        self.last_error = None;
        self.finished = false;
        self.last_retitle_count = 0;
    }
}

/// Merge a server message list with local state.
///
/// The server list is authoritative. Repeated ids collapse into one entry at
/// the position of the first occurrence holding the content of the last.
/// Pending optimistic messages the server has not echoed yet stay at the end;
/// echoed ids leave `pending`.
pub fn reconcile_messages(server: Vec<Message>, local: &[Message], pending: &mut HashSet<String>) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(server.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for message in server {
        match message.id.clone() {
            Some(id) => match positions.get(&id) {
                Some(&index) => merged[index] = message,
                None => {
                    positions.insert(id, merged.len());
                    merged.push(message);
                }
            },
            None => merged.push(message),
        }
    }

    pending.retain(|id| !positions.contains_key(id));
    merged.extend(
        local
            .iter()
            .filter(|m| m.id.as_ref().is_some_and(|id| pending.contains(id)))
            .cloned(),
    );
    merged
}

/// One live conversation with the agent service.
///
/// Owns the active thread's messages and UI elements, applies optimistic
/// updates on submit, reconciles streamed state and drives thread naming.
pub struct StreamSession {
    config: ClientConfig,
    service: Arc<dyn AgentService>,
    notifier: Arc<dyn Notifier>,
    composer: Mutex<MessageComposer>,
    titles: TitleEngine,
    state: Mutex<SessionState>,
    threads: Mutex<ThreadsStore>,
    cancel_flag: AtomicBool,
    naming_lock: tokio::sync::Mutex<()>,
    naming_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StreamSession {
    pub fn new(config: ClientConfig, service: Arc<dyn AgentService>, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        let composer = MessageComposer::from_config(&config);
        let titles = TitleEngine::new(config.title.clone(), Some(service.clone()));

        Arc::new(Self {
            config,
            service,
            notifier,
            composer: Mutex::new(composer),
            titles,
            state: Mutex::new(SessionState::new()),
            threads: Mutex::new(ThreadsStore::new()),
            cancel_flag: AtomicBool::new(false),
            naming_lock: tokio::sync::Mutex::new(()),
            naming_tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status.clone()
    }

    pub fn thread_id(&self) -> Option<String> {
        self.state.lock().thread_id.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    /// Messages meant for display, without synthetic tool responses
    pub fn visible_messages(&self) -> Vec<Message> {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|m| !is_hidden(m))
            .cloned()
            .collect()
    }

    pub fn ui(&self) -> Vec<UiMessage> {
        self.state.lock().ui.clone()
    }

    /// Title last persisted for the active thread
    pub fn current_title(&self) -> Option<String> {
        self.state.lock().title.clone()
    }

    pub fn context(&self) -> Option<Value> {
        self.state.lock().context.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn titles(&self) -> &TitleEngine {
        &self.titles
    }

    /// `(thread_id, display title)` of the known threads, newest first
    pub fn thread_titles(&self) -> Vec<(String, String)> {
        self.threads.lock().display_titles()
    }

    /// Switch to another thread, or to a fresh chat with `None`.
    pub async fn connect(&self, thread_id: Option<String>) -> Result<(), SessionError> {
        let generation = {
            let mut state = self.state.lock();
            state.reset_for(thread_id.clone());
            state.status = match thread_id {
                Some(_) => SessionStatus::Connecting,
                None => SessionStatus::Disconnected,
            };
            state.generation
        };
        self.threads.lock().set_active(thread_id.clone());

        let Some(thread_id) = thread_id else {
            debug!("Session reset to a new chat");
            return Ok(());
        };

        info!(thread_id = %thread_id, "Connecting to thread");
        let loaded = tokio::try_join!(
            self.service.get_thread(&thread_id),
            self.service.get_thread_state(&thread_id)
        );
        match loaded {
            Ok((thread, thread_state)) => {
                let title = thread.title().map(str::to_string);
                self.threads.lock().upsert(thread);

                let mut state = self.state.lock();
                if state.generation != generation {
                    return Ok(());
                }
                if let Some(title) = title {
                    state.named = true;
                    state.title_pinned = true;
                    state.title = Some(title);
                }
                state.messages = thread_state.values.messages;
                for element in thread_state.values.ui {
                    reduce_ui(&mut state.ui, UiEvent::Upsert(element));
                }
                state.finished = thread_state.values.agent_outcome.is_some_and(|o| o.is_finish());
                state.last_retitle_count = state.messages.len();
                state.status = SessionStatus::Streaming;
                debug!(thread_id = %thread_id, messages = state.messages.len(), "Thread state loaded");
                Ok(())
            }
            Err(e) => {
                error!(thread_id = %thread_id, error = %e, "Failed to load thread");
                self.state.lock().status = SessionStatus::Error(e.to_string());
                self.notifier
                    .notify(Notification::error("Failed to load thread").with_description(e.to_string()));
                Err(SessionError::Transport(e))
            }
        }
    }

    /// Probe the agent service. A failure raises a persistent warning but
    /// leaves the session usable.
    pub async fn check_health(&self) -> bool {
        match self.service.health().await {
            Ok(()) => {
                debug!("Agent service reachable");
                true
            }
            Err(e) => {
                warn!(error = %e, "Agent service health check failed");
                self.state.lock().status = SessionStatus::Error(e.to_string());
                self.notifier.notify(
                    Notification::warning("Failed to connect to the agent service")
                        .with_description(format!("Please check that the service is running at {}", self.config.api_url))
                        .persistent(),
                );
                false
            }
        }
    }

    pub fn spawn_health_probe(self: &Arc<Self>) -> JoinHandle<bool> {
        let session = self.clone();
        tokio::spawn(async move { session.check_health().await })
    }

    /// Probe the service in the background and open the configured thread,
    /// or a fresh chat when none is configured.
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<bool>, SessionError> {
        let health = self.spawn_health_probe();
        self.connect(self.config.thread_id.clone()).await?;
        Ok(health)
    }

    /// Send a user turn and consume the resulting stream.
    ///
    /// The thread is created on the first message. Optimistic messages stay
    /// in place when the transport fails.
    pub async fn submit(
        self: &Arc<Self>,
        text: &str,
        attachments: Vec<AttachmentBlock>,
        context: Option<Value>,
    ) -> Result<(), SessionError> {
        let (outgoing, start_naming) = {
            let mut state = self.state.lock();
            let outgoing = self
                .composer
                .lock()
                .compose(text, attachments, &state.messages, state.in_flight)?
                .into_messages();

            for message in &outgoing {
                if let Some(id) = &message.id {
                    state.pending.insert(id.clone());
                }
            }
            state.messages.extend(outgoing.iter().cloned());
            if context.is_some() {
                state.context = context.clone();
            }
            state.in_flight = true;
            state.finished = false;
            state.status = SessionStatus::Streaming;

            let start = !state.named;
            if start {
                state.named = true;
                state.last_retitle_count = state.messages.len();
            }
            (outgoing, start)
        };
        self.cancel_flag.store(false, Ordering::SeqCst);

        let thread_id = match self.ensure_thread().await {
            Ok(thread_id) => thread_id,
            Err(e) => {
                {
                    let mut state = self.state.lock();
                    state.in_flight = false;
                    if start_naming {
                        state.named = false;
                    }
                }
                return Err(self.fail_transport(e));
            }
        };

        if start_naming {
            self.spawn_naming(false);
        }

        self.run(&thread_id, outgoing, context).await
    }

    /// Replace a human message and run the conversation again from there.
    /// Editing the first human message renames the thread.
    pub async fn edit_message(self: &Arc<Self>, message_id: &str, text: &str) -> Result<(), SessionError> {
        let (thread_id, replacement, rename, context) = {
            let mut state = self.state.lock();
            if state.in_flight {
                return Err(ComposeRejection::SendInFlight.into());
            }
            let thread_id = state.thread_id.clone().ok_or(SessionError::NotConnected)?;
            let index = state
                .messages
                .iter()
                .position(|m| m.is_human() && m.id.as_deref() == Some(message_id))
                .ok_or_else(|| SessionError::MessageNotFound(message_id.to_string()))?;
            let rename = state.messages.iter().position(Message::is_human) == Some(index);

            let replacement = self.composer.lock().compose_edit(&state.messages[index], text)?;
            state.messages.truncate(index);
            state.messages.push(replacement.clone());
            state.pending.insert(message_id.to_string());
            state.in_flight = true;
            state.finished = false;
            state.status = SessionStatus::Streaming;
            if rename {
                state.named = true;
                state.title_pinned = false;
                state.last_retitle_count = state.messages.len();
            }
            (thread_id, replacement, rename, state.context.clone())
        };
        self.cancel_flag.store(false, Ordering::SeqCst);

        debug!(message_id, rename, "Editing message");
        if rename {
            self.spawn_naming(true);
        }

        self.run(&thread_id, vec![replacement], context).await
    }

    /// Stop consuming the current stream. The server run is not cancelled.
    pub fn stop(&self) {
        debug!("Stopping stream");
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    async fn ensure_thread(&self) -> ServiceResult<String> {
        if let Some(thread_id) = self.thread_id() {
            return Ok(thread_id);
        }

        let thread = self.service.create_thread().await?;
        let thread_id = thread.thread_id.clone();
        info!(thread_id = %thread_id, "Created thread");

        self.state.lock().thread_id = Some(thread_id.clone());
        let mut threads = self.threads.lock();
        threads.upsert(thread);
        threads.set_active(Some(thread_id.clone()));
        Ok(thread_id)
    }

    async fn run(self: &Arc<Self>, thread_id: &str, messages: Vec<Message>, context: Option<Value>) -> Result<(), SessionError> {
        let request = RunRequest {
            assistant_id: self.config.assistant_id.clone(),
            messages,
            context,
        };

        let outcome = match self.service.stream_run(thread_id, request).await {
            Ok(stream) => self.consume(stream).await,
            Err(e) => Err(e),
        };
        self.state.lock().in_flight = false;

        outcome.map_err(|e| self.fail_transport(e))
    }

    async fn consume(self: &Arc<Self>, mut stream: EventStream) -> ServiceResult<()> {
        let mut clean = true;

        while let Some(event) = stream.next().await {
            if self.cancel_flag.load(Ordering::SeqCst) {
                debug!("Stream stopped by user");
                break;
            }

            match event? {
                StreamEvent::Metadata(metadata) => debug!(?metadata, "Run metadata"),
                StreamEvent::Values(values) => self.apply_values(values),
                StreamEvent::Custom(event) => reduce_ui(&mut self.state.lock().ui, event),
                StreamEvent::Error(message) => {
                    clean = false;
                    self.report_stream_error(message);
                }
                StreamEvent::End => break,
            }
        }

        if clean {
            self.state.lock().last_error = None;
        }
        Ok(())
    }

    fn apply_values(self: &Arc<Self>, values: ThreadValues) {
        let finished = values.is_finished();
        let (retitle, final_pass) = {
            let mut state = self.state.lock();
            let state = &mut *state;
            state.messages = reconcile_messages(values.messages, &state.messages, &mut state.pending);
            for element in values.ui {
                reduce_ui(&mut state.ui, UiEvent::Upsert(element));
            }

            let count = state.messages.len();
            let final_pass = finished && !state.finished;
            if final_pass {
                state.finished = true;
            }
            let retitle = !state.finished && count != state.last_retitle_count && is_retitle_point(count);
            if retitle || final_pass {
                state.last_retitle_count = count;
            }
            (retitle, final_pass)
        };

        if final_pass {
            debug!("Run finished, final naming pass");
        }
        if retitle || final_pass {
            self.spawn_naming(false);
        }
    }

    fn report_stream_error(&self, message: String) {
        let notify = {
            let mut state = self.state.lock();
            state.status = SessionStatus::Error(message.clone());
            if state.last_error.as_deref() == Some(message.as_str()) {
                false
            } else {
                state.last_error = Some(message.clone());
                true
            }
        };

        if notify {
            warn!(error = %message, "Agent run reported an error");
            self.notifier
                .notify(Notification::error("An error occurred. Please try again.").with_description(message));
        } else {
            debug!(error = %message, "Repeated stream error suppressed");
        }
    }

    fn fail_transport(&self, e: ServiceError) -> SessionError {
        error!(error = %e, "Failed to send message");
        self.state.lock().status = SessionStatus::Error(e.to_string());
        self.notifier
            .notify(Notification::error("Failed to send message").with_description(e.to_string()));
        SessionError::Transport(e)
    }

    fn spawn_naming(self: &Arc<Self>, force: bool) {
        let session = self.clone();
        let generation = self.state.lock().generation;
        let handle = tokio::spawn(async move { session.naming_pass(generation, force).await });
        let mut tasks = self.naming_tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Generate a title for the current thread and persist it when it
    /// differs from the last persisted one. Passes run one at a time; only
    /// forced passes replace a pinned title.
    async fn naming_pass(&self, generation: u64, force: bool) {
        let _guard = self.naming_lock.lock().await;

        let snapshot = {
            let state = self.state.lock();
            if state.generation != generation || (!force && state.title_pinned) {
                return;
            }
            state
                .thread_id
                .clone()
                .map(|thread_id| (thread_id, first_human_text(&state.messages)))
        };
        let Some((thread_id, Some(text))) = snapshot else {
            return;
        };

        let title = if force {
            self.titles.regenerate(&text).await
        } else {
            self.titles.generate(&text).await
        };

        {
            let state = self.state.lock();
            if state.generation != generation {
                debug!(thread_id = %thread_id, "Thread changed during naming, dropping title");
                return;
            }
            if state.title.as_deref() == Some(title.as_str()) || (!force && state.title_pinned) {
                return;
            }
        }

        if let Err(e) = self.persist_title(&thread_id, &title).await {
            warn!(thread_id = %thread_id, error = %e, "Failed to persist thread title");
            return;
        }

        let mut state = self.state.lock();
        if state.generation == generation {
            state.title = Some(title);
        }
    }

    async fn persist_title(&self, thread_id: &str, title: &str) -> ServiceResult<()> {
        let mut metadata = Map::new();
        metadata.insert("title".to_string(), Value::String(title.to_string()));
        self.service.update_thread_metadata(thread_id, metadata).await?;

        info!(thread_id = %thread_id, title = %title, "Thread title updated");
        let mut threads = self.threads.lock();
        if !threads.set_title(thread_id, title) {
            let mut thread = Thread::new(thread_id);
            thread.set_title(title);
            threads.upsert(thread);
        }
        Ok(())
    }

    /// Wait until every naming pass started so far has completed
    pub async fn wait_for_naming(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.naming_tasks.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Naming task failed");
                }
            }
        }
    }

    /// Reload the thread list for the configured assistant.
    ///
    /// UUID assistant ids are matched on `assistant_id` metadata, graph
    /// names on `graph_id`.
    pub async fn refresh_threads(&self) -> Result<Vec<Thread>, SessionError> {
        let assistant_id = &self.config.assistant_id;
        let key = if Uuid::parse_str(assistant_id).is_ok() {
            "assistant_id"
        } else {
            "graph_id"
        };
        let mut metadata = Map::new();
        metadata.insert(key.to_string(), Value::String(assistant_id.clone()));

        let threads = self
            .service
            .search_threads(ThreadSearch {
                metadata,
                limit: self.config.thread_search_limit,
            })
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to load threads"))?;
        debug!(count = threads.len(), "Threads loaded");

        let active_title = {
            let mut store = self.threads.lock();
            store.replace_all(threads.clone());
            store
                .active_id()
                .and_then(|id| store.get(id))
                .and_then(|t| t.title().map(str::to_string))
        };

        if let Some(title) = active_title {
            let mut state = self.state.lock();
            if state.title.is_none() {
                state.named = true;
                state.title_pinned = true;
                state.title = Some(title);
            }
        }
        Ok(threads)
    }

    /// Rename a thread by hand
    pub async fn update_thread_title(&self, thread_id: &str, title: &str) -> Result<(), SessionError> {
        let title = title.trim();
        if title.is_empty() {
            debug!(thread_id, "Ignoring blank thread title");
            return Ok(());
        }

        self.persist_title(thread_id, title).await?;

        let mut state = self.state.lock();
        if state.thread_id.as_deref() == Some(thread_id) {
            state.named = true;
            state.title_pinned = true;
            state.title = Some(title.to_string());
        }
        Ok(())
    }

    pub fn update_filter_config(&self, config: MessageFilterConfig) {
        self.composer.lock().update_filter(config);
    }

    pub fn update_title_config(&self, config: TitleConfig) {
        self.titles.update_config(config);
    }
}
