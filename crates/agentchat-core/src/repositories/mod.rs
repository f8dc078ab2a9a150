pub mod agent_service;
pub mod error;
pub mod http_agent_service;
pub mod in_memory_agent_service;
pub mod sse;

pub use agent_service::{AgentService, BoxFuture, EventStream, RunRequest, StreamEvent, ThreadSearch};
pub use error::{ServiceError, ServiceResult};
pub use http_agent_service::HttpAgentService;
pub use in_memory_agent_service::{InMemoryAgentService, NamingBehavior, ScriptedRun};
