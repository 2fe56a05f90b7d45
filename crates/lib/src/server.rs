//! Reference message service: the HTTP backend the store talks to.
//!
//! Messages are stored in a SQLite file through [`sqlx`]. The `id` column is
//! `AUTOINCREMENT`, so ids start at 1 and are never reused, across restarts too. Every
//! create/update asks the [`BotResponder`] for a fresh reply.
//!
//! Queries use the runtime-checked `sqlx::query` form, so no `DATABASE_URL` is needed at
//! compile time.

use crate::config::{self, Config};
use crate::message::{Message, MessageDraft, MessageId};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

const DEFAULT_LIST_LIMIT: usize = 100;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS messages (\
     id INTEGER PRIMARY KEY AUTOINCREMENT, \
     user_message TEXT NOT NULL, \
     bot_response TEXT NOT NULL, \
     timestamp TEXT NOT NULL)";

/// Produces the bot's reply to a user message.
pub trait BotResponder: Send + Sync {
    fn respond(&self, user_message: &str) -> String;
}

/// Replies with the user's text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoBot;

impl BotResponder for EchoBot {
    fn respond(&self, user_message: &str) -> String {
        user_message.to_string()
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// SQLite-backed message table, listed in insertion (id) order.
#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Open (or create) the database file at `path` and make sure the table exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, sqlx::Error> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        log::debug!("opened message database {}", path.display());
        Ok(Self { pool })
    }

    /// Messages in insertion order, after skipping `skip` and taking at most `limit`.
    pub async fn list(&self, skip: usize, limit: usize) -> Result<Vec<Message>, sqlx::Error> {
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT id, user_message, bot_response, timestamp \
             FROM messages ORDER BY id ASC LIMIT ?1 OFFSET ?2",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(skip).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, user_message, bot_response, timestamp)| Message {
                id,
                user_message,
                bot_response,
                timestamp,
            })
            .collect())
    }

    pub async fn insert(
        &self,
        user_message: String,
        bot_response: String,
    ) -> Result<Message, sqlx::Error> {
        let timestamp = now_timestamp();
        let res = sqlx::query(
            "INSERT INTO messages (user_message, bot_response, timestamp) VALUES (?1, ?2, ?3)",
        )
        .bind(&user_message)
        .bind(&bot_response)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;
        Ok(Message {
            id: res.last_insert_rowid(),
            user_message,
            bot_response,
            timestamp,
        })
    }

    /// Overwrite the texts of message `id` in place; `None` if it does not exist.
    pub async fn update(
        &self,
        id: MessageId,
        user_message: String,
        bot_response: String,
    ) -> Result<Option<Message>, sqlx::Error> {
        let timestamp = now_timestamp();
        let res = sqlx::query(
            "UPDATE messages SET user_message = ?1, bot_response = ?2, timestamp = ?3 \
             WHERE id = ?4",
        )
        .bind(&user_message)
        .bind(&bot_response)
        .bind(&timestamp)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Message {
            id,
            user_message,
            bot_response,
            timestamp,
        }))
    }

    /// Remove message `id`; false if it did not exist.
    pub async fn remove(&self, id: MessageId) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM messages WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Close the pool; pending writes are already committed.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Shared state for the message service handlers.
#[derive(Clone)]
pub struct ServerState {
    pub repo: Arc<MessageRepository>,
    pub bot: Arc<dyn BotResponder>,
}

impl ServerState {
    /// State answering with [`EchoBot`].
    pub fn new(repo: MessageRepository) -> Self {
        Self::with_bot(repo, Arc::new(EchoBot))
    }

    pub fn with_bot(repo: MessageRepository, bot: Arc<dyn BotResponder>) -> Self {
        Self {
            repo: Arc::new(repo),
            bot,
        }
    }
}

/// Routes for the message resource. Trailing slashes are part of the paths.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/messages/", get(list_messages).post(create_message))
        .route("/messages/:id/", put(update_message).delete(delete_message))
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("message service exited")?;
    Ok(())
}

/// Open the configured database, bind `server.bind:server.port` and serve until SIGINT/SIGTERM.
pub async fn run_server(config: Config, config_path: PathBuf) -> Result<()> {
    let db_path = config::resolve_database_path(&config, &config_path);
    let repo = MessageRepository::open(&db_path)
        .await
        .with_context(|| format!("opening message database {}", db_path.display()))?;
    log::info!("message database at {}", db_path.display());

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("message service listening on {}", bind_addr);
    serve(listener, ServerState::new(repo.clone()), shutdown_signal()).await?;
    repo.close().await;
    log::info!("message service stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

type ApiFailure = (StatusCode, Json<serde_json::Value>);

fn not_found() -> ApiFailure {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Message not found" })),
    )
}

fn storage_error(e: sqlx::Error) -> ApiFailure {
    log::error!("message database: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Storage error" })),
    )
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

/// GET /messages/
async fn list_messages(
    State(state): State<ServerState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Message>>, ApiFailure> {
    let messages = state
        .repo
        .list(params.skip, params.limit)
        .await
        .map_err(storage_error)?;
    Ok(Json(messages))
}

/// POST /messages/
async fn create_message(
    State(state): State<ServerState>,
    Json(draft): Json<MessageDraft>,
) -> Result<Json<Message>, ApiFailure> {
    let bot_response = state.bot.respond(&draft.user_message);
    let message = state
        .repo
        .insert(draft.user_message, bot_response)
        .await
        .map_err(storage_error)?;
    log::debug!("created message {}", message.id);
    Ok(Json(message))
}

/// PUT /messages/{id}/
async fn update_message(
    State(state): State<ServerState>,
    Path(id): Path<MessageId>,
    Json(draft): Json<MessageDraft>,
) -> Result<Json<Message>, ApiFailure> {
    let bot_response = state.bot.respond(&draft.user_message);
    let message = state
        .repo
        .update(id, draft.user_message, bot_response)
        .await
        .map_err(storage_error)?
        .ok_or_else(not_found)?;
    log::debug!("updated message {}", id);
    Ok(Json(message))
}

/// DELETE /messages/{id}/
async fn delete_message(
    State(state): State<ServerState>,
    Path(id): Path<MessageId>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    if !state.repo.remove(id).await.map_err(storage_error)? {
        return Err(not_found());
    }
    log::debug!("deleted message {}", id);
    Ok(Json(json!({ "detail": "Message deleted" })))
}
