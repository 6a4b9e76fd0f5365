// src/handlers/chat.rs

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};

use crate::{
    config::Config,
    error::AppError,
    models::chat::{ChatEvent, ClientEvent, OpenConversationRequest, SendMessageRequest},
    services::chat::ChatService,
    utils::jwt::{Claims, verify_jwt},
};

/// Returns the direct conversation with another user, creating it on first contact.
pub async fn open_conversation(
    State(chat): State<ChatService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<OpenConversationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let conversation = chat
        .get_or_create_conversation(claims.user_id()?, payload.participant_id)
        .await?;
    Ok(Json(conversation))
}

pub async fn list_messages(
    State(chat): State<ChatService>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let messages = chat.get_messages(conversation_id, claims.user_id()?).await?;
    Ok(Json(messages))
}

/// Stores a message and pushes it to everyone streaming the conversation.
pub async fn send_message(
    State(chat): State<ChatService>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<i64>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = chat
        .create_message(claims.user_id()?, conversation_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub token: Option<String>,
}

/// Upgrades to a WebSocket for one conversation.
///
/// Browsers cannot set headers on a WebSocket handshake, so this route sits
/// outside `auth_middleware` and also accepts the JWT as `?token=`. A bearer
/// header still works for other clients.
pub async fn stream_conversation(
    ws: WebSocketUpgrade,
    State(chat): State<ChatService>,
    State(config): State<Config>,
    Path(conversation_id): Path<i64>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let token = params
        .token
        .as_deref()
        .or(bearer)
        .ok_or_else(|| AppError::AuthError("Missing token".to_string()))?;
    let user_id = verify_jwt(token, &config.jwt_secret)?.user_id()?;

    chat.conversation_for(conversation_id, user_id).await?;
    let events = chat.subscribe(conversation_id);
    Ok(ws.on_upgrade(move |socket| relay(socket, chat, events, user_id, conversation_id)))
}

/// Pushes room events to the socket and routes client frames into the chat service.
async fn relay(
    socket: WebSocket,
    chat: ChatService,
    mut events: broadcast::Receiver<ChatEvent>,
    user_id: i64,
    conversation_id: i64,
) {
    let (mut sink, mut inbound) = socket.split();
    // errors go back to the sender only
    let (reply_tx, mut replies) = mpsc::channel::<ChatEvent>(16);

    let mut forward = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                received = events.recv() => match received {
                    // typing indicators are not echoed to their author
                    Ok(ChatEvent::Typing(status)) if status.user_id == user_id => continue,
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(conversation_id, skipped, "chat subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(reply) = replies.recv() => reply,
            };
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let inbound_chat = chat.clone();
    let mut receive = tokio::spawn(async move {
        while let Some(Ok(frame)) = inbound.next().await {
            match frame {
                WsMessage::Text(text) => {
                    let handled = handle_client_event(&inbound_chat, user_id, conversation_id, text.as_str()).await;
                    if let Err(e) = handled {
                        tracing::debug!(conversation_id, user_id, error = %e, "chat frame rejected");
                        if reply_tx.send(ChatEvent::error(e.client_message())).await.is_err() {
                            break;
                        }
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut forward => {
            receive.abort();
            let _ = receive.await;
        }
        _ = &mut receive => {
            forward.abort();
            let _ = forward.await;
        }
    }
    // both tasks are finished, so this socket's receiver is gone
    chat.release(conversation_id);
    tracing::debug!(conversation_id, user_id, "chat stream closed");
}

async fn handle_client_event(chat: &ChatService, user_id: i64, conversation_id: i64, text: &str) -> Result<(), AppError> {
    match serde_json::from_str::<ClientEvent>(text)? {
        ClientEvent::SendMessage { content } => {
            chat.create_message(user_id, conversation_id, SendMessageRequest { content })
                .await?;
        }
        ClientEvent::Typing { is_typing } => chat.set_typing(conversation_id, user_id, is_typing),
        ClientEvent::ReadReceipt { message_id } => {
            chat.mark_read(conversation_id, user_id, message_id).await?;
        }
    }
    Ok(())
}
