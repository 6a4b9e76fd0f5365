// src/services/chat.rs

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use validator::Validate;

use crate::{
    error::AppError,
    models::chat::{ChatEvent, Conversation, Message, ReadReceipt, SendMessageRequest, TypingStatus},
    store::{ChatRepository, UserRepository},
    utils::html::clean_html,
};

/// Buffered events per conversation before slow subscribers start lagging.
const ROOM_CAPACITY: usize = 200;

/// One broadcast channel per conversation, created on first use.
#[derive(Default)]
pub struct ChatHub {
    rooms: DashMap<i64, broadcast::Sender<ChatEvent>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, conversation_id: i64) -> broadcast::Receiver<ChatEvent> {
        self.rooms
            .entry(conversation_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, conversation_id: i64, event: ChatEvent) -> usize {
        let Some(sender) = self.rooms.get(&conversation_id) else {
            return 0;
        };
        let delivered = sender.send(event).unwrap_or(0);
        if delivered == 0 {
            drop(sender);
            // nobody listening anymore
            self.rooms
                .remove_if(&conversation_id, |_, tx| tx.receiver_count() == 0);
        }
        delivered
    }

    /// Drops the room once its last subscriber is gone.
    pub fn release(&self, conversation_id: i64) {
        self.rooms
            .remove_if(&conversation_id, |_, tx| tx.receiver_count() == 0);
    }
}

#[derive(Clone)]
pub struct ChatService {
    repo: Arc<dyn ChatRepository>,
    users: Arc<dyn UserRepository>,
    hub: Arc<ChatHub>,
}

impl ChatService {
    pub fn new(repo: Arc<dyn ChatRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self {
            repo,
            users,
            hub: Arc::new(ChatHub::new()),
        }
    }

    /// Finds the direct conversation between two users, creating it when missing.
    pub async fn get_or_create_conversation(&self, user_id: i64, peer_id: i64) -> Result<Conversation, AppError> {
        if user_id == peer_id {
            return Err(AppError::BadRequest("Cannot start a conversation with yourself".to_string()));
        }
        if self.users.find_user(peer_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        if let Some(existing) = self.repo.find_direct_conversation(user_id, peer_id).await? {
            return Ok(existing);
        }

        let conversation = self.repo.create_conversation(&[user_id, peer_id], false).await?;
        tracing::debug!(conversation_id = conversation.id, "conversation created");
        Ok(conversation)
    }

    /// Loads a conversation the user takes part in.
    pub async fn conversation_for(&self, conversation_id: i64, user_id: i64) -> Result<Conversation, AppError> {
        let conversation = self
            .repo
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        if !conversation.has_participant(user_id) {
            return Err(AppError::Forbidden("You are not part of this conversation".to_string()));
        }
        Ok(conversation)
    }

    /// Stores a message and relays it to the conversation's live subscribers.
    pub async fn create_message(
        &self,
        sender_id: i64,
        conversation_id: i64,
        request: SendMessageRequest,
    ) -> Result<Message, AppError> {
        request.validate()?;
        self.conversation_for(conversation_id, sender_id).await?;

        let content = clean_html(&request.content);
        if content.trim().is_empty() {
            return Err(AppError::BadRequest("Message is empty after sanitization".to_string()));
        }

        let message = self.repo.insert_message(conversation_id, sender_id, &content).await?;
        let delivered = self
            .hub
            .publish(conversation_id, ChatEvent::new_message(message.clone()));
        tracing::debug!(conversation_id, message_id = message.id, delivered, "message relayed");

        Ok(message)
    }

    pub async fn get_messages(&self, conversation_id: i64, user_id: i64) -> Result<Vec<Message>, AppError> {
        self.conversation_for(conversation_id, user_id).await?;
        self.repo.list_messages(conversation_id).await
    }

    pub fn subscribe(&self, conversation_id: i64) -> broadcast::Receiver<ChatEvent> {
        self.hub.subscribe(conversation_id)
    }

    /// Call after dropping a receiver from [`ChatService::subscribe`].
    pub fn release(&self, conversation_id: i64) {
        self.hub.release(conversation_id);
    }

    /// Relays a typing indicator. Nothing is stored; the caller must already be
    /// a participant.
    pub fn set_typing(&self, conversation_id: i64, user_id: i64, is_typing: bool) {
        self.hub.publish(
            conversation_id,
            ChatEvent::Typing(TypingStatus { user_id, is_typing }),
        );
    }

    /// Announces that `user_id` has read a message of the conversation.
    pub async fn mark_read(&self, conversation_id: i64, user_id: i64, message_id: i64) -> Result<(), AppError> {
        let message = self.repo.find_message(message_id).await?;
        if message.is_none_or(|m| m.conversation_id != conversation_id) {
            return Err(AppError::NotFound("Message not found".to_string()));
        }

        self.hub.publish(
            conversation_id,
            ChatEvent::MessageRead(ReadReceipt { user_id, message_id }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::NewUser, store::MemoryStore};

    async fn user(store: &MemoryStore, name: &str) -> i64 {
        store
            .create_user(&NewUser {
                username: name.to_string(),
                password_hash: "hash".to_string(),
                role: "student".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn setup() -> (ChatService, i64, i64, i64) {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let carol = user(&store, "carol").await;
        (ChatService::new(store.clone(), store), alice, bob, carol)
    }

    fn text(content: &str) -> SendMessageRequest {
        SendMessageRequest {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn conversation_is_reused_in_both_directions() {
        let (chat, alice, bob, _) = setup().await;
        let first = chat.get_or_create_conversation(alice, bob).await.unwrap();
        let second = chat.get_or_create_conversation(bob, alice).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!first.is_group);
    }

    #[tokio::test]
    async fn self_conversation_is_rejected() {
        let (chat, alice, _, _) = setup().await;
        let err = chat.get_or_create_conversation(alice, alice).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn messages_are_relayed_to_subscribers() {
        let (chat, alice, bob, _) = setup().await;
        let conversation = chat.get_or_create_conversation(alice, bob).await.unwrap();
        let mut rx = chat.subscribe(conversation.id);

        let sent = chat
            .create_message(alice, conversation.id, text("hello bob"))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event, ChatEvent::NewMessage(sent.clone()));
        assert_eq!(sent.sender_username, "alice");
    }

    #[tokio::test]
    async fn outsiders_cannot_read_or_write() {
        let (chat, alice, bob, carol) = setup().await;
        let conversation = chat.get_or_create_conversation(alice, bob).await.unwrap();

        let err = chat
            .create_message(carol, conversation.id, text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(matches!(
            chat.get_messages(conversation.id, carol).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn messages_come_back_oldest_first_and_sanitized() {
        let (chat, alice, bob, _) = setup().await;
        let conversation = chat.get_or_create_conversation(alice, bob).await.unwrap();
        chat.create_message(alice, conversation.id, text("first"))
            .await
            .unwrap();
        chat.create_message(bob, conversation.id, text("<b>second</b><script>x()</script>"))
            .await
            .unwrap();

        let messages = chat.get_messages(conversation.id, bob).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "<b>second</b>");
    }

    #[test]
    fn publish_without_subscribers_drops_the_room() {
        let hub = ChatHub::new();
        drop(hub.subscribe(5));
        assert_eq!(hub.publish(5, ChatEvent::new_message(Message {
            id: 1,
            conversation_id: 5,
            sender_id: 1,
            sender_username: "alice".to_string(),
            content: "hi".to_string(),
            created_at: None,
        })), 0);
        assert!(hub.rooms.is_empty());
    }

    #[test]
    fn release_drops_rooms_without_subscribers() {
        let hub = ChatHub::new();
        let first = hub.subscribe(7);
        let second = hub.subscribe(7);

        drop(first);
        hub.release(7);
        assert_eq!(hub.rooms.len(), 1);

        drop(second);
        hub.release(7);
        assert!(hub.rooms.is_empty());
    }

    #[tokio::test]
    async fn typing_and_read_receipts_reach_the_room() {
        let (chat, alice, bob, _) = setup().await;
        let conversation = chat.get_or_create_conversation(alice, bob).await.unwrap();
        let sent = chat
            .create_message(alice, conversation.id, text("ping"))
            .await
            .unwrap();
        let mut rx = chat.subscribe(conversation.id);

        chat.set_typing(conversation.id, bob, true);
        chat.mark_read(conversation.id, bob, sent.id).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ChatEvent::Typing(TypingStatus {
                user_id: bob,
                is_typing: true
            })
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ChatEvent::MessageRead(ReadReceipt {
                user_id: bob,
                message_id: sent.id
            })
        );
    }

    #[tokio::test]
    async fn read_receipt_for_unknown_message_fails() {
        let (chat, alice, bob, _) = setup().await;
        let conversation = chat.get_or_create_conversation(alice, bob).await.unwrap();
        let err = chat.mark_read(conversation.id, bob, 12345).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
