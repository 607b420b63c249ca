use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::Session;
use crate::db::SqliteStore;
use crate::store::Subscription;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub session: Option<Session>,
    pub subscriptions: Vec<Subscription>,
}

impl AppState {
    /// Forgets the signed-in identity and everything it was watching.
    pub fn clear_session(&mut self) {
        if let Some(store) = self.store.as_ref() {
            for sub in &self.subscriptions {
                store.feed().unsubscribe(sub.id);
            }
        }
        self.subscriptions.clear();
        self.session = None;
    }
}
