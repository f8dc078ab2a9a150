use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::agent_service::{AgentService, BoxFuture, EventStream, RunRequest, StreamEvent, ThreadSearch};
use super::error::{ServiceError, ServiceResult};
use crate::models::{AgentOutcome, Message, Thread, ThreadState, ThreadValues};

/// How the scripted service answers naming requests
#[derive(Clone, Debug)]
pub enum NamingBehavior {
    Title(String),
    /// No naming capability on this server
    Unavailable,
    Fail(String),
}

/// One scripted reaction to `stream_run`
#[derive(Debug)]
pub enum ScriptedRun {
    /// Echo the submitted messages back as server state, followed by the
    /// given AI reply when there is one
    Echo { reply: Option<String>, finish: bool },
    /// Emit exactly these events
    Events(Vec<ServiceResult<StreamEvent>>),
    /// Refuse the submission
    Reject(String),
}

struct ServiceState {
    threads: HashMap<String, Thread>,
    messages: HashMap<String, Vec<Message>>,
    runs: VecDeque<ScriptedRun>,
    naming: NamingBehavior,
    metadata_updates: Vec<(String, Map<String, Value>)>,
    submitted: Vec<RunRequest>,
}

/// In-memory agent service.
/// Useful for testing and development
#[derive(Clone)]
pub struct InMemoryAgentService {
    state: Arc<Mutex<ServiceState>>,
    healthy: Arc<AtomicBool>,
    naming_delay: Option<Duration>,
    naming_calls: Arc<AtomicUsize>,
    next_id: Arc<AtomicUsize>,
}

impl InMemoryAgentService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServiceState {
                threads: HashMap::new(),
                messages: HashMap::new(),
                runs: VecDeque::new(),
                naming: NamingBehavior::Unavailable,
                metadata_updates: Vec::new(),
                submitted: Vec::new(),
            })),
            healthy: Arc::new(AtomicBool::new(true)),
            naming_delay: None,
            naming_calls: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    pub fn with_naming(self, naming: NamingBehavior) -> Self {
        self.state.lock().naming = naming;
        self
    }

    /// Make every naming request take this long
    pub fn with_naming_delay(mut self, delay: Duration) -> Self {
        self.naming_delay = Some(delay);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Queue the reaction to the next run. Without a script, runs echo.
    pub fn push_run(&self, run: ScriptedRun) {
        self.state.lock().runs.push_back(run);
    }

    pub fn insert_thread(&self, thread: Thread, messages: Vec<Message>) {
        let mut state = self.state.lock();
        state.messages.insert(thread.thread_id.clone(), messages);
        state.threads.insert(thread.thread_id.clone(), thread);
    }

    pub fn thread(&self, thread_id: &str) -> Option<Thread> {
        self.state.lock().threads.get(thread_id).cloned()
    }

    pub fn naming_calls(&self) -> usize {
        self.naming_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_updates(&self) -> Vec<(String, Map<String, Value>)> {
        self.state.lock().metadata_updates.clone()
    }

    pub fn submitted_runs(&self) -> Vec<RunRequest> {
        self.state.lock().submitted.clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for InMemoryAgentService {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace messages with the same id, append the rest
fn merge_by_id(stored: &mut Vec<Message>, incoming: Vec<Message>) {
    for message in incoming {
        let position = message
            .id
            .as_ref()
            .and_then(|id| stored.iter().position(|m| m.id.as_ref() == Some(id)));
        match position {
            Some(index) => {
                // The server reducer drops everything after an edited message
                stored.truncate(index);
                stored.push(message);
            }
            None => stored.push(message),
        }
    }
}

impl AgentService for InMemoryAgentService {
    fn create_thread(&self) -> BoxFuture<'static, ServiceResult<Thread>> {
        let thread = Thread::new(self.next_id("thread"));
        let state = self.state.clone();

        Box::pin(async move {
            let mut state = state.lock();
            state.messages.insert(thread.thread_id.clone(), Vec::new());
            state.threads.insert(thread.thread_id.clone(), thread.clone());
            Ok(thread)
        })
    }

    fn get_thread(&self, thread_id: &str) -> BoxFuture<'static, ServiceResult<Thread>> {
        let thread = self.thread(thread_id);
        let thread_id = thread_id.to_string();

        Box::pin(async move {
            thread.ok_or_else(|| ServiceError::Http {
                status: 404,
                body: format!("Thread {} not found", thread_id),
            })
        })
    }

    fn get_thread_state(&self, thread_id: &str) -> BoxFuture<'static, ServiceResult<ThreadState>> {
        let state = self.state.clone();
        let thread_id = thread_id.to_string();

        Box::pin(async move {
            let state = state.lock();
            let messages = state.messages.get(&thread_id).ok_or_else(|| ServiceError::Http {
                status: 404,
                body: format!("Thread {} not found", thread_id),
            })?;
            Ok(ThreadState {
                values: ThreadValues {
                    messages: messages.clone(),
                    ..ThreadValues::default()
                },
            })
        })
    }

    fn stream_run(
        &self,
        thread_id: &str,
        request: RunRequest,
    ) -> BoxFuture<'static, ServiceResult<EventStream>> {
        let service = self.clone();
        let thread_id = thread_id.to_string();

        Box::pin(async move {
            let events = {
                let mut state = service.state.lock();
                if !state.threads.contains_key(&thread_id) {
                    return Err(ServiceError::Http {
                        status: 404,
                        body: format!("Thread {} not found", thread_id),
                    });
                }
                state.submitted.push(request.clone());
                let run = state.runs.pop_front().unwrap_or(ScriptedRun::Echo {
                    reply: None,
                    finish: false,
                });

                match run {
                    ScriptedRun::Reject(reason) => return Err(ServiceError::Stream(reason)),
                    ScriptedRun::Events(events) => events,
                    ScriptedRun::Echo { reply, finish } => {
                        let stored = state.messages.entry(thread_id.clone()).or_default();
                        merge_by_id(stored, request.messages);
                        let mut events = vec![Ok(StreamEvent::Values(ThreadValues {
                            messages: stored.clone(),
                            ..ThreadValues::default()
                        }))];
                        if let Some(reply) = reply {
                            let id = format!("ai-{}", stored.len());
                            stored.push(Message::ai(id, reply));
                            let outcome = finish.then(|| AgentOutcome {
                                kind: "AgentFinish".to_string(),
                                rest: Map::new(),
                            });
                            events.push(Ok(StreamEvent::Values(ThreadValues {
                                messages: stored.clone(),
                                ui: Vec::new(),
                                agent_outcome: outcome,
                            })));
                        }
                        events.push(Ok(StreamEvent::End));
                        events
                    }
                }
            };

            Ok(futures::stream::iter(events).boxed())
        })
    }

    fn update_thread_metadata(
        &self,
        thread_id: &str,
        metadata: Map<String, Value>,
    ) -> BoxFuture<'static, ServiceResult<()>> {
        let state = self.state.clone();
        let thread_id = thread_id.to_string();

        Box::pin(async move {
            let mut state = state.lock();
            let thread = state.threads.get_mut(&thread_id).ok_or_else(|| ServiceError::Http {
                status: 404,
                body: format!("Thread {} not found", thread_id),
            })?;
            thread.metadata.extend(metadata.clone());
            state.metadata_updates.push((thread_id, metadata));
            Ok(())
        })
    }

    fn search_threads(&self, search: ThreadSearch) -> BoxFuture<'static, ServiceResult<Vec<Thread>>> {
        let state = self.state.clone();

        Box::pin(async move {
            let state = state.lock();
            let mut threads: Vec<Thread> = state
                .threads
                .values()
                .filter(|t| {
                    search
                        .metadata
                        .iter()
                        .all(|(k, v)| t.metadata.get(k) == Some(v))
                })
                .cloned()
                .collect();
            threads.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
            threads.truncate(search.limit);
            Ok(threads)
        })
    }

    fn health(&self) -> BoxFuture<'static, ServiceResult<()>> {
        let healthy = self.healthy.load(Ordering::SeqCst);
        Box::pin(async move {
            if healthy {
                Ok(())
            } else {
                Err(ServiceError::Stream("service unreachable".into()))
            }
        })
    }

    fn generate_name(&self, _initial_message: &str) -> BoxFuture<'static, ServiceResult<Option<String>>> {
        self.naming_calls.fetch_add(1, Ordering::SeqCst);
        let naming = self.state.lock().naming.clone();
        let delay = self.naming_delay;

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match naming {
                NamingBehavior::Title(title) => Ok(Some(title)),
                NamingBehavior::Unavailable => Ok(None),
                NamingBehavior::Fail(reason) => Err(ServiceError::Http {
                    status: 500,
                    body: reason,
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageContent;
    use serde_json::json;

    fn human(id: &str, text: &str) -> Message {
        Message::human(id, MessageContent::Text(text.into()))
    }

    fn run(messages: Vec<Message>) -> RunRequest {
        RunRequest {
            assistant_id: "agent".into(),
            messages,
            context: None,
        }
    }

    #[tokio::test]
    async fn test_echo_run_appends_reply() {
        let service = InMemoryAgentService::new();
        let thread = service.create_thread().await.unwrap();
        service.push_run(ScriptedRun::Echo {
            reply: Some("hi there".into()),
            finish: true,
        });

        let events: Vec<_> = service
            .stream_run(&thread.thread_id, run(vec![human("m1", "hi")]))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        let state = service.get_thread_state(&thread.thread_id).await.unwrap();
        assert_eq!(state.values.messages.len(), 2);
        assert!(matches!(events[1].as_ref().unwrap(), StreamEvent::Values(v) if v.is_finished()));
    }

    #[tokio::test]
    async fn test_resubmitted_id_truncates_history() {
        let service = InMemoryAgentService::new();
        let thread = service.create_thread().await.unwrap();
        service.push_run(ScriptedRun::Echo { reply: Some("a".into()), finish: false });
        let _ = service.stream_run(&thread.thread_id, run(vec![human("m1", "first")])).await.unwrap();

        let _ = service.stream_run(&thread.thread_id, run(vec![human("m1", "edited")])).await.unwrap();

        let state = service.get_thread_state(&thread.thread_id).await.unwrap();
        assert_eq!(state.values.messages.len(), 1);
        assert_eq!(state.values.messages[0].text(), "edited");
    }

    #[tokio::test]
    async fn test_metadata_updates_are_recorded_and_searchable() {
        let service = InMemoryAgentService::new();
        let thread = service.create_thread().await.unwrap();
        let mut metadata = Map::new();
        metadata.insert("graph_id".into(), json!("agent"));
        service.update_thread_metadata(&thread.thread_id, metadata.clone()).await.unwrap();

        assert_eq!(service.metadata_updates().len(), 1);
        let found = service
            .search_threads(ThreadSearch { metadata, limit: 100 })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_naming_behaviors() {
        let service = InMemoryAgentService::new().with_naming(NamingBehavior::Fail("boom".into()));
        assert!(service.generate_name("x").await.is_err());
        assert_eq!(service.naming_calls(), 1);

        let service = InMemoryAgentService::new();
        assert_eq!(service.generate_name("x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_thread_is_404() {
        let service = InMemoryAgentService::new();
        let err = service.get_thread_state("missing").await.unwrap_err();
        assert!(err.is_not_available());
        assert!(service.get_thread("missing").await.unwrap_err().is_not_available());
    }
}
