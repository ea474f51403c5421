//! Headless smoke script: drives a full conversation against an in-memory
//! transport with a scripted peer, printing every session event.

mod config;
mod logging;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use palaver_core::{EngineConfig, SessionCommand, SessionEvent, ViewportSample};
use palaver_socket::{InMemoryTransport, SessionHandle, spawn_runtime, topic};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info};

use config::SmokeConfig;

const EMIT_WAIT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    logging::init();

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };
    info!(?config, "starting smoke script");

    let (transport, frames, mut emitted) = InMemoryTransport::new();
    let handle = spawn_runtime(
        transport.clone(),
        frames,
        EngineConfig {
            page_size: config.page_size,
        },
    );

    spawn_event_printer(&handle);

    if let Err(err) = run_script(&config, &handle, &transport, &mut emitted).await {
        error!(%err, "smoke script failed");
        handle.shutdown();
        std::process::exit(1);
    }

    handle.shutdown();
    if let Err(err) = wait_for_emit(&mut emitted, "left-chat").await {
        error!(%err, "shutdown did not leave the conversation");
        std::process::exit(1);
    }
    // Give the printer a moment to flush the tail of the event stream.
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!("smoke script completed");
}

async fn run_script(
    config: &SmokeConfig,
    handle: &SessionHandle,
    transport: &InMemoryTransport,
    emitted: &mut mpsc::UnboundedReceiver<(String, Value)>,
) -> Result<(), String> {
    let chat_id = config.chat_id.as_str();
    let base = now_ms();

    handle
        .send(SessionCommand::Join {
            chat_id: chat_id.to_owned(),
            self_user_id: config.self_user_id.clone(),
        })
        .await
        .map_err(|err| err.to_string())?;
    wait_for_emit(emitted, "joined-chat").await?;

    // The server answers the join with the init snapshot, newest-first. The
    // second peer message is still unread.
    transport.deliver(
        &topic(chat_id, "init"),
        json!({
            "recipientUser": {
                "userId": config.peer_user_id,
                "displayName": "Scripted Peer",
                "chatId": chat_id,
                "isArchived": false,
                "isOnline": true,
                "lastOnlineMs": null,
                "chatCreatedMs": base - 600_000,
            },
            "messages": [
                server_message("M2", &config.peer_user_id, chat_id, "are you there?", base - 30_000, "delivered"),
                server_message("M1", &config.self_user_id, chat_id, "hello!", base - 120_000, "read"),
            ],
        }),
    );

    // Scrolling to the bottom acknowledges the unread message.
    handle
        .send(SessionCommand::Viewport(ViewportSample {
            at_bottom: true,
            at_top: false,
            has_overflow: true,
        }))
        .await
        .map_err(|err| err.to_string())?;
    wait_for_emit(emitted, "read-messages").await?;

    // Optimistic send, then the server acknowledges with a permanent id.
    handle
        .send(SessionCommand::Send {
            body: "yes, right here".to_owned(),
        })
        .await
        .map_err(|err| err.to_string())?;
    let (_, payload) = wait_for_emit(emitted, "send-message").await?;
    let temp_id = payload["tempId"]
        .as_str()
        .ok_or_else(|| "send-message payload missing tempId".to_owned())?
        .to_owned();
    transport.deliver(
        &topic(chat_id, "delivered"),
        json!({ "tempId": temp_id, "actualId": "M100" }),
    );

    // The peer replies; the engine acknowledges it immediately.
    transport.deliver(
        &topic(chat_id, "new-message"),
        json!({
            "message": server_message("M101", &config.peer_user_id, chat_id, "good to hear", now_ms(), "delivered"),
        }),
    );
    wait_for_emit(emitted, "read-messages").await?;

    // The peer read everything we delivered, then dropped offline.
    transport.deliver(&topic(chat_id, "read-all"), json!({}));
    transport.deliver(
        &topic(chat_id, "recipient-status-change"),
        json!({ "isOnline": false }),
    );

    Ok(())
}

fn spawn_event_printer(handle: &SessionHandle) {
    let mut events = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Joined { chat_id }) => info!(%chat_id, "event: joined"),
                Ok(SessionEvent::Left { chat_id }) => info!(%chat_id, "event: left"),
                Ok(SessionEvent::Conversation(snapshot)) => info!(
                    messages = snapshot.messages.len(),
                    first_unread = ?snapshot.first_unread_index,
                    history_start = snapshot.history_start_reached,
                    peer_online = snapshot.peer.as_ref().map(|p| p.is_online),
                    "event: conversation"
                ),
                Ok(SessionEvent::Scroll(action)) => info!(?action, "event: scroll"),
                Ok(SessionEvent::Notice(err)) => info!(code = %err.code, "event: notice"),
                Ok(SessionEvent::Fatal(err)) => info!(code = %err.code, "event: fatal"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    info!(skipped, "event printer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn wait_for_emit(
    emitted: &mut mpsc::UnboundedReceiver<(String, Value)>,
    expected: &str,
) -> Result<(String, Value), String> {
    loop {
        let (name, payload) = timeout(EMIT_WAIT, emitted.recv())
            .await
            .map_err(|_| format!("timed out waiting for '{expected}' emit"))?
            .ok_or_else(|| "emit channel closed".to_owned())?;
        info!(event = %name, %payload, "client emitted");
        if name == expected {
            return Ok((name, payload));
        }
    }
}

fn server_message(
    id: &str,
    sender: &str,
    chat_id: &str,
    body: &str,
    created_at_ms: u64,
    delivery: &str,
) -> Value {
    json!({
        "id": id,
        "body": body,
        "chatId": chat_id,
        "senderId": sender,
        "createdAtMs": created_at_ms,
        "updatedAtMs": created_at_ms,
        "delivery": delivery,
    })
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
