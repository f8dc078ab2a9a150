use std::future::Future;
use std::pin::Pin;

use futures::stream::BoxStream;
use serde_json::{Map, Value, json};

use super::error::ServiceResult;
use crate::models::{Message, Thread, ThreadState, ThreadValues, UiEvent};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Events of one streamed run, already decoded
pub type EventStream = BoxStream<'static, ServiceResult<StreamEvent>>;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Run metadata (`run_id` and friends)
    Metadata(Value),
    /// Full graph state after a step
    Values(ThreadValues),
    Custom(UiEvent),
    /// Error reported inside the stream by the server
    Error(String),
    End,
}

/// Input for a streamed run on a thread
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub assistant_id: String,
    pub messages: Vec<Message>,
    pub context: Option<Value>,
}

impl RunRequest {
    pub fn body(&self) -> Value {
        let mut body = json!({
            "assistant_id": self.assistant_id,
            "input": { "messages": self.messages },
            "stream_mode": ["values", "custom"],
        });
        if let Some(context) = &self.context {
            body["context"] = context.clone();
        }
        body
    }
}

#[derive(Clone, Debug)]
pub struct ThreadSearch {
    pub metadata: Map<String, Value>,
    pub limit: usize,
}

/// The remote agent-execution service.
///
/// `generate_name` returns `Ok(None)` when the server has no naming
/// capability; callers fall back to local titles without surfacing an error.
pub trait AgentService: Send + Sync + 'static {
    fn create_thread(&self) -> BoxFuture<'static, ServiceResult<Thread>>;

    /// Thread record including its metadata (and stored title)
    fn get_thread(&self, thread_id: &str) -> BoxFuture<'static, ServiceResult<Thread>>;

    fn get_thread_state(&self, thread_id: &str) -> BoxFuture<'static, ServiceResult<ThreadState>>;

    fn stream_run(
        &self,
        thread_id: &str,
        request: RunRequest,
    ) -> BoxFuture<'static, ServiceResult<EventStream>>;

    fn update_thread_metadata(
        &self,
        thread_id: &str,
        metadata: Map<String, Value>,
    ) -> BoxFuture<'static, ServiceResult<()>>;

    fn search_threads(&self, search: ThreadSearch) -> BoxFuture<'static, ServiceResult<Vec<Thread>>>;

    /// Liveness probe
    fn health(&self) -> BoxFuture<'static, ServiceResult<()>>;

    fn generate_name(&self, initial_message: &str) -> BoxFuture<'static, ServiceResult<Option<String>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageContent;

    #[test]
    fn test_run_body_shape() {
        let request = RunRequest {
            assistant_id: "agent".into(),
            messages: vec![Message::human("m1", MessageContent::Text("hi".into()))],
            context: None,
        };
        let body = request.body();

        assert_eq!(body["assistant_id"], "agent");
        assert_eq!(body["input"]["messages"][0]["content"], "hi");
        assert_eq!(body["stream_mode"], json!(["values", "custom"]));
        assert!(body.get("context").is_none());
    }

    #[test]
    fn test_run_body_includes_context() {
        let request = RunRequest {
            assistant_id: "agent".into(),
            messages: vec![],
            context: Some(json!({"locale": "vi"})),
        };
        assert_eq!(request.body()["context"]["locale"], "vi");
    }
}
