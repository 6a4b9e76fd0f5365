use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{chat::ChatService, quiz::QuizService},
    store::{ChatRepository, QuizRepository, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserRepository>,
    pub quizzes: QuizService,
    pub chat: ChatService,
}

impl AppState {
    /// Wires every service onto one store implementation.
    pub fn new<S>(store: S, config: Config) -> Self
    where
        S: QuizRepository + UserRepository + ChatRepository + 'static,
    {
        let store = Arc::new(store);
        Self {
            config,
            users: store.clone(),
            quizzes: QuizService::new(store.clone()),
            chat: ChatService::new(store.clone(), store),
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn UserRepository> {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}

impl FromRef<AppState> for QuizService {
    fn from_ref(state: &AppState) -> Self {
        state.quizzes.clone()
    }
}

impl FromRef<AppState> for ChatService {
    fn from_ref(state: &AppState) -> Self {
        state.chat.clone()
    }
}
