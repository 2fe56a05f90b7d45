//! Background worker that owns the message store.
//!
//! The UI thread never awaits: it submits [`Command`]s and polls [`Outcome`]s each frame.
//! Commands are applied one at a time in submission order, so a second edit or delete on an
//! id waits for the first to resolve instead of racing it.

use parley::{HttpMessageService, Message, MessageId, MessageService, MessageStore};
use std::sync::mpsc;

/// A store operation requested by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load,
    Send(String),
    Edit(MessageId, String),
    Delete(MessageId),
}

impl Command {
    /// Short label for error banners and logs.
    pub fn label(&self) -> String {
        match self {
            Command::Load => "load messages".to_string(),
            Command::Send(_) => "send message".to_string(),
            Command::Edit(id, _) => format!("edit message #{}", id),
            Command::Delete(id) => format!("delete message #{}", id),
        }
    }
}

/// Result of one command: the store's sequence after it ran, and the failure if any.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub command: Command,
    pub messages: Vec<Message>,
    pub error: Option<String>,
}

pub struct Worker {
    commands: mpsc::Sender<Command>,
    outcomes: mpsc::Receiver<Outcome>,
}

impl Worker {
    /// Worker talking to the HTTP message service at `base_url`.
    pub fn spawn_http(base_url: String) -> Self {
        Self::spawn(HttpMessageService::new(Some(base_url)))
    }

    /// Start the worker thread with its own single-threaded runtime.
    pub fn spawn<S: MessageService + 'static>(service: S) -> Self {
        let (command_tx, command_rx) = mpsc::channel::<Command>();
        let (outcome_tx, outcome_rx) = mpsc::channel::<Outcome>();
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("store worker runtime failed to start: {}", e);
                    return;
                }
            };
            let mut store = MessageStore::new(service);
            while let Ok(command) = command_rx.recv() {
                // The store has already logged the failure.
                let error = rt.block_on(apply(&mut store, &command)).err();
                let outcome = Outcome {
                    command,
                    messages: store.messages().to_vec(),
                    error,
                };
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
            log::debug!("store worker stopped");
        });
        Self {
            commands: command_tx,
            outcomes: outcome_rx,
        }
    }

    /// Queue a command; false if the worker has stopped.
    pub fn submit(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Next finished command, if any. Never blocks.
    pub fn try_recv(&self) -> Option<Outcome> {
        self.outcomes.try_recv().ok()
    }

    #[cfg(test)]
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Outcome> {
        self.outcomes.recv_timeout(timeout).ok()
    }
}

async fn apply<S: MessageService>(
    store: &mut MessageStore<S>,
    command: &Command,
) -> Result<(), String> {
    match command {
        Command::Load => store.load().await.map_err(|e| e.to_string()),
        Command::Send(text) => store.send(text).await.map(|_| ()).map_err(|e| e.to_string()),
        Command::Edit(id, text) => store
            .edit(*id, text)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Command::Delete(id) => store.delete(*id).await.map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley::ApiError;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Echo service whose next `failures` calls answer 503.
    #[derive(Default)]
    pub(crate) struct FlakyService {
        messages: Mutex<Vec<Message>>,
        failures: Mutex<usize>,
    }

    impl FlakyService {
        pub(crate) fn failing(failures: usize) -> Self {
            Self {
                failures: Mutex::new(failures),
                ..Default::default()
            }
        }

        fn check(&self) -> Result<(), ApiError> {
            let mut f = self.failures.lock().unwrap();
            if *f > 0 {
                *f -= 1;
                return Err(ApiError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MessageService for FlakyService {
        async fn list(&self) -> Result<Vec<Message>, ApiError> {
            self.check()?;
            Ok(self.messages.lock().unwrap().clone())
        }

        async fn create(&self, user_message: &str) -> Result<Message, ApiError> {
            self.check()?;
            let mut g = self.messages.lock().unwrap();
            let m = Message {
                id: g.len() as MessageId + 1,
                user_message: user_message.to_string(),
                bot_response: user_message.to_string(),
                timestamp: "t".to_string(),
            };
            g.push(m.clone());
            Ok(m)
        }

        async fn update(&self, id: MessageId, user_message: &str) -> Result<Message, ApiError> {
            self.check()?;
            let mut g = self.messages.lock().unwrap();
            let m = g.iter_mut().find(|m| m.id == id).ok_or(ApiError::Status {
                status: 404,
                body: String::new(),
            })?;
            m.user_message = user_message.to_string();
            m.bot_response = user_message.to_string();
            Ok(m.clone())
        }

        async fn delete(&self, id: MessageId) -> Result<(), ApiError> {
            self.check()?;
            self.messages.lock().unwrap().retain(|m| m.id != id);
            Ok(())
        }
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn commands_are_applied_in_submission_order() {
        let worker = Worker::spawn(FlakyService::default());
        assert!(worker.submit(Command::Load));
        assert!(worker.submit(Command::Send("hi".to_string())));
        assert!(worker.submit(Command::Edit(1, "hey".to_string())));
        assert!(worker.submit(Command::Delete(1)));

        let outcomes: Vec<Outcome> = (0..4).filter_map(|_| worker.recv_timeout(WAIT)).collect();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.error.is_none()));
        assert_eq!(outcomes[1].messages[0].user_message, "hi");
        assert_eq!(outcomes[2].messages[0].user_message, "hey");
        assert!(outcomes[3].messages.is_empty());
    }

    #[test]
    fn failed_command_reports_error_and_unchanged_snapshot() {
        let worker = Worker::spawn(FlakyService::failing(1));
        worker.submit(Command::Send("hi".to_string()));
        let failed = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(failed.command, Command::Send("hi".to_string()));
        assert!(failed.error.unwrap().contains("503"));
        assert!(failed.messages.is_empty());

        worker.submit(failed.command);
        let retried = worker.recv_timeout(WAIT).unwrap();
        assert!(retried.error.is_none());
        assert_eq!(retried.messages.len(), 1);
    }

    #[test]
    fn blank_send_is_rejected_locally() {
        let worker = Worker::spawn(FlakyService::default());
        worker.submit(Command::Send("  ".to_string()));
        let outcome = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(outcome.error.as_deref(), Some("message text is empty"));
    }

    #[test]
    fn labels_name_the_target() {
        assert_eq!(Command::Edit(3, "x".into()).label(), "edit message #3");
        assert_eq!(Command::Delete(4).label(), "delete message #4");
        assert_eq!(Command::Load.label(), "load messages");
    }
}
