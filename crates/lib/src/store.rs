//! Client-side message store: the session's ordered copy of the service's messages.
//!
//! Every mutation is write-through: the service confirms it first and only then is the local
//! sequence touched. On any failure the sequence is left exactly as it was. The four async
//! operations are the only way to change the sequence; they take `&mut self`, so a store never
//! has two remote calls in flight.

use std::collections::HashSet;

use crate::api::{ApiError, MessageService};
use crate::message::{has_content, Message, MessageId};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("loading messages failed: {0}")]
    Api(#[from] ApiError),
    #[error("service returned message id {0} more than once")]
    DuplicateId(MessageId),
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("message text is empty")]
    EmptyText,
    #[error("sending message failed: {0}")]
    Api(#[from] ApiError),
    #[error("service returned message id {0}, which is already present")]
    DuplicateId(MessageId),
}

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("message text is empty")]
    EmptyText,
    #[error("no message with id {0}")]
    UnknownId(MessageId),
    #[error("editing message failed: {0}")]
    Api(#[from] ApiError),
    #[error("edited message {requested} but service returned id {returned}")]
    IdMismatch {
        requested: MessageId,
        returned: MessageId,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("deleting message failed: {0}")]
    Api(#[from] ApiError),
}

/// Ordered, session-scoped mirror of the remote message sequence.
pub struct MessageStore<S> {
    service: S,
    messages: Vec<Message>,
}

impl<S: MessageService> MessageStore<S> {
    /// Empty store; call [`load`](Self::load) to populate it.
    pub fn new(service: S) -> Self {
        Self {
            service,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The loaded message with `id`, if any.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Replace the local sequence with the service's, keeping server order.
    pub async fn load(&mut self) -> Result<(), FetchError> {
        let fetched = self.service.list().await.map_err(|e| {
            log::warn!("load: {}", e);
            FetchError::from(e)
        })?;
        let mut seen = HashSet::with_capacity(fetched.len());
        if let Some(dup) = fetched.iter().find(|m| !seen.insert(m.id)) {
            log::warn!("load: duplicate message id {} in service response", dup.id);
            return Err(FetchError::DuplicateId(dup.id));
        }
        log::debug!("loaded {} message(s)", fetched.len());
        self.messages = fetched;
        Ok(())
    }

    /// Submit `text` as a new user message and append the service's result, which is also
    /// returned. Whitespace-only text is rejected without contacting the service.
    pub async fn send(&mut self, text: &str) -> Result<Message, SendError> {
        if !has_content(text) {
            return Err(SendError::EmptyText);
        }
        let created = self.service.create(text).await.map_err(|e| {
            log::warn!("send: {}", e);
            SendError::from(e)
        })?;
        if self.position(created.id).is_some() {
            log::warn!("send: service returned existing id {}", created.id);
            return Err(SendError::DuplicateId(created.id));
        }
        log::debug!("sent message {}", created.id);
        self.messages.push(created.clone());
        Ok(created)
    }

    /// Replace the text of message `id`; the entry keeps its position and takes the service's
    /// recomputed bot response and timestamp.
    pub async fn edit(&mut self, id: MessageId, text: &str) -> Result<&Message, EditError> {
        if !has_content(text) {
            return Err(EditError::EmptyText);
        }
        let Some(idx) = self.position(id) else {
            return Err(EditError::UnknownId(id));
        };
        let updated = self.service.update(id, text).await.map_err(|e| {
            log::warn!("edit {}: {}", id, e);
            EditError::from(e)
        })?;
        if updated.id != id {
            log::warn!("edit {}: service returned id {}", id, updated.id);
            return Err(EditError::IdMismatch {
                requested: id,
                returned: updated.id,
            });
        }
        log::debug!("edited message {}", id);
        self.messages[idx] = updated;
        Ok(&self.messages[idx])
    }

    /// Delete message `id` on the service, then drop it locally (a no-op if it was not loaded).
    pub async fn delete(&mut self, id: MessageId) -> Result<(), DeleteError> {
        self.service.delete(id).await.map_err(|e| {
            log::warn!("delete {}: {}", id, e);
            DeleteError::from(e)
        })?;
        log::debug!("deleted message {}", id);
        self.messages.retain(|m| m.id != id);
        Ok(())
    }
}
