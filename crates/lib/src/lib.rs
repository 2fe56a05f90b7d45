//! Parley core library: message types, the message service client, the write-through
//! message store, and the reference message service, shared by the CLI and desktop apps.

pub mod api;
pub mod config;
pub mod init;
pub mod message;
pub mod server;
pub mod store;

pub use api::{ApiError, HttpMessageService, MessageService};
pub use message::{Message, MessageDraft, MessageId};
pub use store::{DeleteError, EditError, FetchError, MessageStore, SendError};
