//! The per-update execution context handed to middleware and handlers.

use std::sync::{Arc, Mutex, Weak};

use log::debug;
use serde_json::{json, Value};

use crate::api::Transport;
use crate::bot::HandlerResult;
use crate::keyboard::Markup;
use crate::scene::{self, SceneRegistry};
use crate::session::{SceneCursor, Session};
use crate::update::{Update, UpdateKind, User};

/// Read/derive facade over one update, the bot's transport and scene
/// registry, and the live session. Rebuilt for every update; handlers
/// receive it as `Arc<Context>`.
pub struct Context {
    update: Update,
    transport: Arc<dyn Transport>,
    scenes: SceneRegistry,
    session: Mutex<Session>,
    // Handle back to the owning Arc, so scene steps invoked from `enter`
    // receive the same shared context the caller holds.
    me: Weak<Context>,
}

impl Context {
    pub(crate) fn create(
        update: Update,
        transport: Arc<dyn Transport>,
        scenes: SceneRegistry,
        session: Session,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Context {
            update,
            transport,
            scenes,
            session: Mutex::new(session),
            me: me.clone(),
        })
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.update.chat_id()
    }

    pub fn from(&self) -> Option<&User> {
        self.update.from()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.update.user_id()
    }

    pub fn text(&self) -> Option<&str> {
        self.update.text()
    }

    pub fn callback_data(&self) -> Option<&str> {
        self.update.callback_data()
    }

    // --- Outbound calls ---
    //
    // All helpers report transport failure (or a missing target field on
    // the update) as `None`, never as an error.

    /// Raw pass-through to the transport for methods without a helper.
    pub async fn invoke(&self, method: &str, params: Value) -> Option<Value> {
        self.transport.invoke(method, params).await
    }

    /// Send `text` to the chat this update came from.
    pub async fn reply(&self, text: &str) -> Option<Value> {
        let chat_id = self.chat_id()?;
        self.invoke("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    /// Send `text` with a keyboard or other reply markup attached.
    pub async fn reply_with(&self, text: &str, markup: impl Into<Markup>) -> Option<Value> {
        let chat_id = self.chat_id()?;
        let markup = serde_json::to_value(markup.into()).ok()?;
        self.invoke(
            "sendMessage",
            json!({ "chat_id": chat_id, "text": text, "reply_markup": markup }),
        )
        .await
    }

    /// Acknowledge the callback query behind this update, optionally with
    /// a toast or alert. No-op for message updates.
    pub async fn answer_callback(&self, text: Option<&str>, show_alert: bool) -> Option<Value> {
        let UpdateKind::CallbackQuery(query) = &self.update.kind else {
            return None;
        };
        let mut params = json!({ "callback_query_id": query.id, "show_alert": show_alert });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        self.invoke("answerCallbackQuery", params).await
    }

    /// Edit the message this callback originated from.
    pub async fn edit_message_text(&self, text: &str) -> Option<Value> {
        let (chat_id, message_id) = self.callback_source()?;
        self.invoke(
            "editMessageText",
            json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
        )
        .await
    }

    /// Edit the callback's source message, replacing its inline keyboard.
    pub async fn edit_message_text_with(
        &self,
        text: &str,
        markup: impl Into<Markup>,
    ) -> Option<Value> {
        let (chat_id, message_id) = self.callback_source()?;
        let markup = serde_json::to_value(markup.into()).ok()?;
        self.invoke(
            "editMessageText",
            json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "text": text,
                "reply_markup": markup
            }),
        )
        .await
    }

    /// Delete the message this update refers to.
    pub async fn delete_message(&self) -> Option<Value> {
        let chat_id = self.chat_id()?;
        let message_id = match &self.update.kind {
            UpdateKind::Message(m) => Some(m.id),
            UpdateKind::CallbackQuery(q) => q.message.as_ref().map(|m| m.id),
            UpdateKind::Unsupported => None,
        }?;
        self.invoke(
            "deleteMessage",
            json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
    }

    fn callback_source(&self) -> Option<(i64, i64)> {
        let UpdateKind::CallbackQuery(query) = &self.update.kind else {
            return None;
        };
        let message = query.message.as_ref()?;
        Some((message.chat.id, message.id))
    }

    // --- Session access ---
    //
    // The session lock is only ever held for the duration of a closure,
    // never across an await.

    pub fn session_get(&self, key: &str) -> Option<Value> {
        self.session.lock().unwrap().get(key).cloned()
    }

    pub fn session_set(&self, key: impl Into<String>, value: Value) {
        self.session.lock().unwrap().set(key, value);
    }

    pub fn session_remove(&self, key: &str) -> Option<Value> {
        self.session.lock().unwrap().remove(key)
    }

    /// Run `f` against the live session, for multi-field reads or writes.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.session.lock().unwrap())
    }

    pub(crate) fn session_value(&self) -> Value {
        self.session.lock().unwrap().to_value()
    }

    // --- Scene control ---

    /// The scene position recorded in this user's session, if any.
    pub fn scene_cursor(&self) -> Option<SceneCursor> {
        self.session.lock().unwrap().cursor()
    }

    /// Enter a scene: point the cursor at step 0 and, if the scene is
    /// registered and non-empty, run step 0 right away with this context.
    /// The nested step may itself call `next()`, `leave()` or `enter()`.
    pub async fn enter(&self, scene_id: &str) -> HandlerResult {
        self.session
            .lock()
            .unwrap()
            .set_cursor(&SceneCursor::start(scene_id));

        let step = scene::lookup_step(&self.scenes, scene_id, 0);
        match (step, self.me.upgrade()) {
            (Some(step), Some(this)) => step(this).await,
            _ => {
                debug!("entered scene {scene_id} with no runnable first step");
                Ok(())
            }
        }
    }

    /// Advance the cursor one step. Does not run the new step — the next
    /// inbound update from this user does. No-op outside a scene.
    pub fn next(&self) {
        let mut session = self.session.lock().unwrap();
        if let Some(mut cursor) = session.cursor() {
            cursor.step_index += 1;
            session.set_cursor(&cursor);
        }
    }

    /// Leave the active scene, if any. The next update routes normally.
    pub fn leave(&self) {
        self.session.lock().unwrap().clear_cursor();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::RwLock;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;

    /// Transport that answers every call with an empty result.
    pub struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn fetch_updates(&self, _offset: i64, _timeout_secs: u64) -> Result<Vec<Update>> {
            Ok(Vec::new())
        }

        async fn invoke(&self, _method: &str, _params: Value) -> Option<Value> {
            Some(Value::Null)
        }
    }

    impl Context {
        pub(crate) fn for_tests(update: Update) -> Arc<Context> {
            Context::create(
                update,
                Arc::new(NullTransport),
                Arc::new(RwLock::new(HashMap::new())),
                Session::default(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::update::{Chat, Message};

    fn message_ctx(text: &str) -> Arc<Context> {
        Context::for_tests(Update {
            id: 1,
            kind: UpdateKind::Message(Message {
                id: 1,
                chat: Chat { id: 5 },
                from: Some(User {
                    id: 9,
                    first_name: "T".to_string(),
                    last_name: None,
                    username: None,
                    language_code: None,
                }),
                text: Some(text.to_string()),
            }),
        })
    }

    #[test]
    fn session_fields_survive_within_one_context() {
        let ctx = message_ctx("hi");
        ctx.session_set("lang", json!("en"));
        assert_eq!(ctx.session_get("lang"), Some(json!("en")));
        assert_eq!(ctx.session_remove("lang"), Some(json!("en")));
        assert_eq!(ctx.session_get("lang"), None);
    }

    #[test]
    fn next_without_a_cursor_is_a_noop() {
        let ctx = message_ctx("hi");
        ctx.next();
        assert!(ctx.scene_cursor().is_none());
    }

    #[test]
    fn next_advances_the_cursor_in_place() {
        let ctx = message_ctx("hi");
        ctx.with_session(|s| s.set_cursor(&SceneCursor::start("signup")));
        ctx.next();
        ctx.next();
        assert_eq!(ctx.scene_cursor().unwrap().step_index, 2);
        ctx.leave();
        assert!(ctx.scene_cursor().is_none());
    }

    #[tokio::test]
    async fn entering_an_unknown_scene_still_sets_the_cursor() {
        let ctx = message_ctx("hi");
        ctx.enter("nowhere").await.unwrap();
        assert_eq!(ctx.scene_cursor().unwrap().scene_id, "nowhere");
    }
}
