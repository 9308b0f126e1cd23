//! Session persistence across updates and simulated process restarts.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use botkit::{Bot, Chat, FileStore, Message, SessionStore, Transport, Update, UpdateKind, User};
use serde_json::{json, Value};

struct SilentTransport;

#[async_trait]
impl Transport for SilentTransport {
    async fn fetch_updates(&self, _offset: i64, _timeout_secs: u64) -> Result<Vec<Update>> {
        Ok(Vec::new())
    }

    async fn invoke(&self, _method: &str, _params: Value) -> Option<Value> {
        Some(Value::Null)
    }
}

fn text_update(update_id: i64, user_id: i64, text: &str) -> Update {
    Update {
        id: update_id,
        kind: UpdateKind::Message(Message {
            id: update_id,
            chat: Chat { id: user_id },
            from: Some(User {
                id: user_id,
                first_name: "Test".to_string(),
                last_name: None,
                username: None,
                language_code: None,
            }),
            text: Some(text.to_string()),
        }),
    }
}

#[tokio::test]
async fn file_store_contract() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sessions.json");
    let store = FileStore::new(&path);

    assert_eq!(store.get("session:1").await, None);

    store.set("session:1", json!({"name": "Ada"})).await;
    store.set("session:2", json!({"name": "Grace"})).await;
    assert_eq!(store.get("session:1").await, Some(json!({"name": "Ada"})));

    store.delete("session:1").await;
    assert_eq!(store.get("session:1").await, None);
    assert_eq!(store.get("session:2").await, Some(json!({"name": "Grace"})));
    Ok(())
}

#[tokio::test]
async fn file_store_recovers_from_garbage() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sessions.json");
    tokio::fs::write(&path, b"{ not json").await?;

    let store = FileStore::new(&path);
    assert_eq!(store.get("session:1").await, None);

    // Writing afterwards replaces the garbage with a valid document.
    store.set("session:1", json!({"ok": true})).await;
    assert_eq!(store.get("session:1").await, Some(json!({"ok": true})));
    Ok(())
}

#[tokio::test]
async fn session_survives_a_simulated_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sessions.json");

    // First process: a handler records a value into the session.
    {
        let mut bot = Bot::with_transport(Arc::new(SilentTransport), FileStore::new(&path));
        bot.on_message(|ctx| async move {
            ctx.session_set("favourite", json!({"fruit": "plum", "n": 7}));
            Ok(())
        });
        bot.handle_update(text_update(1, 42, "remember this")).await?;
    }

    // Second process over the same file: the value is still there.
    let seen: Arc<Mutex<Option<Value>>> = Arc::default();
    {
        let mut bot = Bot::with_transport(Arc::new(SilentTransport), FileStore::new(&path));
        bot.on_message({
            let seen = Arc::clone(&seen);
            move |ctx| {
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().unwrap() = ctx.session_get("favourite");
                    Ok(())
                }
            }
        });
        bot.handle_update(text_update(2, 42, "what was it?")).await?;
    }

    assert_eq!(
        seen.lock().unwrap().clone(),
        Some(json!({"fruit": "plum", "n": 7}))
    );
    Ok(())
}

#[tokio::test]
async fn scene_cursor_survives_a_simulated_restart() -> Result<()> {
    use botkit::Scene;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sessions.json");
    let log: Arc<Mutex<Vec<String>>> = Arc::default();

    let build_bot = |log: Arc<Mutex<Vec<String>>>| {
        let mut bot = Bot::with_transport(Arc::new(SilentTransport), FileStore::new(&path));
        bot.add_scene(
            Scene::new("signup")
                .step({
                    let log = Arc::clone(&log);
                    move |ctx| {
                        let log = Arc::clone(&log);
                        async move {
                            log.lock().unwrap().push("step0".to_string());
                            ctx.next();
                            Ok(())
                        }
                    }
                })
                .step({
                    let log = Arc::clone(&log);
                    move |ctx| {
                        let log = Arc::clone(&log);
                        async move {
                            log.lock().unwrap().push("step1".to_string());
                            ctx.leave();
                            Ok(())
                        }
                    }
                }),
        );
        bot.command("signup", |ctx| async move { ctx.enter("signup").await });
        bot
    };

    {
        let bot = build_bot(Arc::clone(&log));
        bot.handle_update(text_update(1, 42, "/signup")).await?;
    }
    // "Restart": a fresh bot over the same session file resumes at step 1.
    {
        let bot = build_bot(Arc::clone(&log));
        bot.handle_update(text_update(2, 42, "Alice")).await?;
    }

    assert_eq!(*log.lock().unwrap(), vec!["step0", "step1"]);
    Ok(())
}
