use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::agent_service::{AgentService, BoxFuture, EventStream, RunRequest, StreamEvent, ThreadSearch};
use super::error::{ServiceError, ServiceResult};
use super::sse::{SseFrame, sse_frames};
use crate::models::{Thread, ThreadState, ThreadValues, UiEvent};
use crate::settings::models::{ClientConfig, NamingRoute};

const API_KEY_HEADER: &str = "X-Api-Key";
const NAMING_INPUT_KEY: &str = "Initial Message";
const TITLE_KEYS: &[&str] = &["Thread Name", "thread_name", "name", "title"];

/// [`AgentService`] over the LangGraph-style HTTP API
#[derive(Clone)]
pub struct HttpAgentService {
    client: Client,
    base_url: String,
    assistant_id: String,
    api_key: Option<String>,
    naming_routes: Vec<NamingRoute>,
}

impl HttpAgentService {
    pub fn new(config: &ClientConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            assistant_id: config.assistant_id.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            naming_routes: config.naming_routes.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn try_naming_route(&self, route: &NamingRoute, text: &str) -> ServiceResult<Option<String>> {
        let input = json!({ NAMING_INPUT_KEY: text });
        match route {
            NamingRoute::AssistantExperiment => {
                let path = format!("/assistants/{}/experiments/generate_name", self.assistant_id);
                let value: Value = send_json(self.request(Method::POST, &path).json(&json!({ "input": input }))).await?;
                Ok(pick_title(&value))
            }
            NamingRoute::GlobalExperiment => {
                let value: Value = send_json(
                    self.request(Method::POST, "/experiments/generate_name")
                        .json(&json!({ "input": input })),
                )
                .await?;
                Ok(pick_title(&value))
            }
            NamingRoute::GraphWait { graph_id } => {
                let value: Value = send_json(
                    self.request(Method::POST, "/runs/wait")
                        .json(&json!({ "assistant_id": graph_id, "input": input })),
                )
                .await?;
                Ok(pick_title(&value))
            }
            NamingRoute::GraphStream { graph_id } => {
                let response = check(
                    self.request(Method::POST, "/runs/stream")
                        .json(&json!({
                            "assistant_id": graph_id,
                            "input": input,
                            "stream_mode": ["values"],
                        }))
                        .send()
                        .await?,
                )
                .await?;

                let mut frames = Box::pin(sse_frames(response.bytes_stream()));
                let mut title = None;
                while let Some(frame) = frames.next().await {
                    title = pick_title_from_frame(&frame?).or(title);
                }
                Ok(title)
            }
        }
    }
}

async fn check(response: Response) -> ServiceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Http {
        status: status.as_u16(),
        body,
    })
}

async fn send_json<T: for<'de> Deserialize<'de>>(builder: RequestBuilder) -> ServiceResult<T> {
    let response = check(builder.send().await?).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Find a title in a naming payload, its `output` or its `values`.
pub fn pick_title(value: &Value) -> Option<String> {
    [Some(value), value.get("output"), value.get("values")]
        .into_iter()
        .flatten()
        .find_map(|candidate| {
            TITLE_KEYS.iter().find_map(|key| {
                candidate
                    .get(*key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
            })
        })
}

fn pick_title_from_frame(frame: &SseFrame) -> Option<String> {
    if frame.event.as_deref() != Some("values") {
        return None;
    }
    serde_json::from_str::<Value>(&frame.data)
        .ok()
        .and_then(|value| pick_title(&value))
}

/// Turn one SSE frame of a run into a stream event. Frames the client has no
/// use for yield `None`.
pub(crate) fn decode_frame(frame: SseFrame) -> Option<ServiceResult<StreamEvent>> {
    let event = frame.event.as_deref().unwrap_or("message");
    match event {
        "metadata" => Some(Ok(StreamEvent::Metadata(
            serde_json::from_str(&frame.data).unwrap_or(Value::Null),
        ))),
        "values" => Some(
            serde_json::from_str::<ThreadValues>(&frame.data)
                .map(StreamEvent::Values)
                .map_err(ServiceError::from),
        ),
        "custom" => match serde_json::from_str::<UiEvent>(&frame.data) {
            Ok(ui) => Some(Ok(StreamEvent::Custom(ui))),
            Err(e) => {
                debug!(error = %e, "Ignoring non-UI custom event");
                None
            }
        },
        "error" => {
            let message = serde_json::from_str::<Value>(&frame.data)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or(frame.data);
            Some(Ok(StreamEvent::Error(message)))
        }
        "end" => Some(Ok(StreamEvent::End)),
        other => {
            debug!(event = other, "Ignoring stream event");
            None
        }
    }
}

impl AgentService for HttpAgentService {
    fn create_thread(&self) -> BoxFuture<'static, ServiceResult<Thread>> {
        let request = self.request(Method::POST, "/threads").json(&json!({}));
        Box::pin(async move { send_json(request).await })
    }

    fn get_thread(&self, thread_id: &str) -> BoxFuture<'static, ServiceResult<Thread>> {
        let request = self.request(Method::GET, &format!("/threads/{}", thread_id));
        Box::pin(async move { send_json(request).await })
    }

    fn get_thread_state(&self, thread_id: &str) -> BoxFuture<'static, ServiceResult<ThreadState>> {
        let request = self.request(Method::GET, &format!("/threads/{}/state", thread_id));
        Box::pin(async move { send_json(request).await })
    }

    fn stream_run(
        &self,
        thread_id: &str,
        request: RunRequest,
    ) -> BoxFuture<'static, ServiceResult<EventStream>> {
        let builder = self
            .request(Method::POST, &format!("/threads/{}/runs/stream", thread_id))
            .header("Accept", "text/event-stream")
            .json(&request.body());
        let thread_id = thread_id.to_string();

        Box::pin(async move {
            let response = check(builder.send().await?).await?;
            debug!(thread_id = %thread_id, "Run stream opened");

            let mut frames = Box::pin(sse_frames(response.bytes_stream()));
            let events = async_stream::stream! {
                while let Some(frame) = frames.next().await {
                    match frame {
                        Ok(frame) => {
                            if let Some(event) = decode_frame(frame) {
                                yield event;
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            break;
                        }
                    }
                }
            };

            Ok(events.boxed())
        })
    }

    fn update_thread_metadata(
        &self,
        thread_id: &str,
        metadata: Map<String, Value>,
    ) -> BoxFuture<'static, ServiceResult<()>> {
        let request = self
            .request(Method::PATCH, &format!("/threads/{}", thread_id))
            .json(&json!({ "metadata": metadata }));
        Box::pin(async move {
            check(request.send().await?).await?;
            Ok(())
        })
    }

    fn search_threads(&self, search: ThreadSearch) -> BoxFuture<'static, ServiceResult<Vec<Thread>>> {
        let request = self
            .request(Method::POST, "/threads/search")
            .json(&json!({ "metadata": search.metadata, "limit": search.limit }));
        Box::pin(async move { send_json(request).await })
    }

    fn health(&self) -> BoxFuture<'static, ServiceResult<()>> {
        let request = self.request(Method::GET, "/info");
        Box::pin(async move {
            check(request.send().await?).await?;
            Ok(())
        })
    }

    fn generate_name(&self, initial_message: &str) -> BoxFuture<'static, ServiceResult<Option<String>>> {
        let service = self.clone();
        let text = initial_message.to_string();

        Box::pin(async move {
            for route in &service.naming_routes {
                match service.try_naming_route(route, &text).await {
                    Ok(Some(title)) => return Ok(Some(title)),
                    Ok(None) => debug!(?route, "Naming route returned no title"),
                    Err(e) if e.is_not_available() => {
                        debug!(?route, "Naming route not available on server")
                    }
                    Err(e) => {
                        warn!(?route, error = %e, "Naming route failed");
                        return Err(e);
                    }
                }
            }
            Ok(None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, MessageContent};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer, routes: Vec<NamingRoute>) -> HttpAgentService {
        let config = ClientConfig::new(server.uri(), "agent")
            .with_api_key("secret")
            .with_naming_routes(routes);
        HttpAgentService::new(&config).unwrap()
    }

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body.to_string())
    }

    #[tokio::test]
    async fn test_create_thread_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "thread_id": "t-1",
                "metadata": {},
                "status": "idle"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let thread = service(&server, vec![]).create_thread().await.unwrap();
        assert_eq!(thread.thread_id, "t-1");
    }

    #[tokio::test]
    async fn test_get_thread_reads_stored_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/t-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "thread_id": "t-1",
                "metadata": {"title": "Trip planning", "graph_id": "agent"},
                "status": "idle"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let thread = service(&server, vec![]).get_thread("t-1").await.unwrap();
        assert_eq!(thread.title(), Some("Trip planning"));
    }

    #[tokio::test]
    async fn test_http_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = service(&server, vec![]).health().await.unwrap_err();
        match err {
            ServiceError::Http { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stream_run_decodes_events() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: metadata\ndata: {\"run_id\":\"r1\"}\n\n",
            "event: values\ndata: {\"messages\":[{\"id\":\"m1\",\"type\":\"human\",\"content\":\"hi\"}]}\n\n",
            "event: custom\ndata: {\"type\":\"ui\",\"id\":\"u1\",\"name\":\"card\",\"props\":{}}\n\n",
            "event: custom\ndata: {\"progress\":0.5}\n\n",
            "event: end\ndata: null\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/threads/t-1/runs/stream"))
            .and(body_partial_json(json!({"assistant_id": "agent", "stream_mode": ["values", "custom"]})))
            .respond_with(sse(body))
            .mount(&server)
            .await;

        let request = RunRequest {
            assistant_id: "agent".into(),
            messages: vec![Message::human("m1", MessageContent::Text("hi".into()))],
            context: None,
        };
        let stream = service(&server, vec![]).stream_run("t-1", request).await.unwrap();
        let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], StreamEvent::Metadata(_)));
        assert!(matches!(&events[1], StreamEvent::Values(v) if v.messages.len() == 1));
        assert!(matches!(events[2], StreamEvent::Custom(UiEvent::Upsert(_))));
        assert_eq!(events[3], StreamEvent::End);
    }

    #[tokio::test]
    async fn test_stream_error_event_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/t-1/runs/stream"))
            .respond_with(sse("event: error\ndata: {\"error\":\"ValueError\",\"message\":\"boom\"}\n\n"))
            .mount(&server)
            .await;

        let request = RunRequest {
            assistant_id: "agent".into(),
            messages: vec![],
            context: None,
        };
        let events: Vec<_> = service(&server, vec![])
            .stream_run("t-1", request)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Error("boom".into()));
    }

    #[tokio::test]
    async fn test_generate_name_falls_through_missing_routes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistants/agent/experiments/generate_name"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/experiments/generate_name"))
            .and(body_partial_json(json!({"input": {"Initial Message": "hello world"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": {"Thread Name": "  Greeting  "}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let routes = vec![NamingRoute::AssistantExperiment, NamingRoute::GlobalExperiment];
        let title = service(&server, routes).generate_name("hello world").await.unwrap();
        assert_eq!(title.as_deref(), Some("Greeting"));
    }

    #[tokio::test]
    async fn test_generate_name_unavailable_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/experiments/generate_name"))
            .respond_with(ResponseTemplate::new(501))
            .mount(&server)
            .await;

        let title = service(&server, vec![NamingRoute::GlobalExperiment])
            .generate_name("hello")
            .await
            .unwrap();
        assert_eq!(title, None);
    }

    #[tokio::test]
    async fn test_generate_name_server_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/runs/wait"))
            .respond_with(ResponseTemplate::new(500).set_body_string("crash"))
            .mount(&server)
            .await;

        let routes = vec![NamingRoute::GraphWait { graph_id: "namer".into() }];
        let err = service(&server, routes).generate_name("hello").await.unwrap_err();
        assert!(matches!(err, ServiceError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_generate_name_streaming_graph_uses_last_values() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: values\ndata: {\"Initial Message\":\"hi\"}\n\n",
            "event: values\ndata: {\"Initial Message\":\"hi\",\"thread_name\":\"Small talk\"}\n\n",
            "event: end\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/runs/stream"))
            .and(body_partial_json(json!({"assistant_id": "namer"})))
            .respond_with(sse(body))
            .mount(&server)
            .await;

        let routes = vec![NamingRoute::GraphStream { graph_id: "namer".into() }];
        let title = service(&server, routes).generate_name("hi").await.unwrap();
        assert_eq!(title.as_deref(), Some("Small talk"));
    }

    #[test]
    fn test_pick_title_key_order() {
        assert_eq!(
            pick_title(&json!({"title": "b", "name": "a"})).as_deref(),
            Some("a")
        );
        assert_eq!(
            pick_title(&json!({"values": {"title": "c"}})).as_deref(),
            Some("c")
        );
        assert_eq!(pick_title(&json!({"name": "  "})), None);
    }
}
