pub mod attachment;
pub mod message;
pub mod notification_store;
pub mod thread;
pub mod threads_store;
pub mod ui_message;

pub use attachment::{AttachmentBlock, AttachmentKind, AttachmentStaging, FileInput, FileSource};
pub use message::{ContentPart, Message, MessageContent, MessageRole, ToolCall};
pub use notification_store::{Notification, NotificationLevel, NotificationStore, Notifier};
pub use thread::{AgentOutcome, Thread, ThreadState, ThreadValues};
pub use threads_store::ThreadsStore;
pub use ui_message::{UiEvent, UiMessage, reduce_ui};
