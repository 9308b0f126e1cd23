//! The dispatch engine: registration API, middleware chain, scene/router
//! dispatch and the long-polling loop.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use futures_util::future::BoxFuture;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::api::{TelegramApi, Transport};
use crate::context::Context;
use crate::router::{Router, Trigger};
use crate::scene::{Scene, SceneRegistry};
use crate::session::{MemoryStore, Session, SessionStore};
use crate::update::Update;

/// Shared handle to the per-update context.
pub type Ctx = Arc<Context>;

pub type HandlerResult = Result<()>;

/// A boxed update handler. Built from any `Fn(Ctx) -> impl Future` via the
/// registration methods on [`Bot`] and [`Scene`].
pub type Handler = Arc<dyn Fn(Ctx) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A boxed middleware function. Runs before routing for every update.
pub type Middleware =
    Arc<dyn Fn(Ctx, Next) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Continuation token passed to middleware.
///
/// Known limitation, kept deliberately: [`Next::run`] is a no-op. The
/// chain always runs every middleware in registration order and then
/// proceeds to routing, whether or not a middleware calls `run()` —
/// middleware cannot short-circuit dispatch.
pub struct Next(());

impl Next {
    pub(crate) fn token() -> Self {
        Next(())
    }

    pub async fn run(self) {}
}

pub(crate) fn boxed_handler<H, F>(handler: H) -> Handler
where
    H: Fn(Ctx) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(handler(ctx)))
}

/// One entry for `set_commands`, mirroring the Bot API shape.
#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        BotCommand {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Requests the polling loop to stop. Takes effect at the top of the next
/// poll cycle; an in-flight fetch or update runs to completion.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Long-poll window requested from the transport, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed fetch before polling again.
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(3);

const SESSION_KEY_PREFIX: &str = "session:";

/// The bot: holds the registered handlers and drives each update through
/// session hydration, the middleware chain, scene or router dispatch, and
/// the unconditional session save.
pub struct Bot {
    transport: Arc<dyn Transport>,
    storage: Arc<dyn SessionStore>,
    scenes: SceneRegistry,
    middlewares: Vec<Middleware>,
    router: Router,
    offset: i64,
    running: Arc<AtomicBool>,
}

impl Bot {
    /// A bot talking to the Telegram Bot API, with in-memory sessions.
    pub fn new(token: &str) -> Self {
        Self::with_store(token, MemoryStore::new())
    }

    /// A bot talking to the Telegram Bot API with a custom session store.
    pub fn with_store(token: &str, store: impl SessionStore + 'static) -> Self {
        Self::with_transport(Arc::new(TelegramApi::new(token)), store)
    }

    /// A bot over any transport. This is the seam for test doubles and
    /// non-HTTP feeds.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        store: impl SessionStore + 'static,
    ) -> Self {
        Bot {
            transport,
            storage: Arc::new(store),
            scenes: Arc::new(RwLock::new(HashMap::new())),
            middlewares: Vec::new(),
            router: Router::new(),
            offset: 0,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    // --- Registration ---

    /// Register a middleware. Middleware run in registration order before
    /// routing, for every update. See [`Next`] for the chain semantics.
    pub fn use_middleware<M, F>(&mut self, middleware: M)
    where
        M: Fn(Ctx, Next) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.middlewares
            .push(Arc::new(move |ctx, next| Box::pin(middleware(ctx, next))));
    }

    /// Register a `/command` handler. The name may be given with or
    /// without the leading slash.
    pub fn command<H, F>(&mut self, name: &str, handler: H)
    where
        H: Fn(Ctx) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.command(name, boxed_handler(handler));
    }

    /// Register a free-text handler for an exact string or regex trigger.
    pub fn on_text<T, H, F>(&mut self, trigger: T, handler: H)
    where
        T: Into<Trigger>,
        H: Fn(Ctx) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.on_text(trigger.into(), boxed_handler(handler));
    }

    /// Register a callback-data handler for an exact string or regex
    /// trigger.
    pub fn on_callback<T, H, F>(&mut self, trigger: T, handler: H)
    where
        T: Into<Trigger>,
        H: Fn(Ctx) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router
            .on_callback(trigger.into(), boxed_handler(handler));
    }

    /// Register the fallback handler, invoked for text updates no other
    /// route matched.
    pub fn on_message<H, F>(&mut self, handler: H)
    where
        H: Fn(Ctx) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.set_fallback(boxed_handler(handler));
    }

    /// Register a scene. Replaces any scene with the same id.
    pub fn add_scene(&mut self, scene: Scene) {
        self.scenes
            .write()
            .unwrap()
            .insert(scene.id().to_string(), scene);
    }

    /// Publish the command menu via `setMyCommands`.
    pub async fn set_commands(&self, commands: &[BotCommand]) -> Option<Value> {
        let commands = serde_json::to_value(commands).ok()?;
        self.transport
            .invoke("setMyCommands", serde_json::json!({ "commands": commands }))
            .await
    }

    // --- Lifecycle ---

    /// A handle that stops the polling loop from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.running))
    }

    /// Run the polling loop until [`StopHandle::stop`] is called.
    ///
    /// Each cycle long-polls the transport at the current offset, then
    /// processes the returned updates strictly one at a time in delivery
    /// order. A failed fetch is logged and retried after a fixed pause;
    /// it never terminates the loop.
    pub async fn start(&mut self) {
        self.running.store(true, Ordering::SeqCst);
        info!("bot started, polling for updates");

        while self.running.load(Ordering::SeqCst) {
            match self
                .transport
                .fetch_updates(self.offset, POLL_TIMEOUT_SECS)
                .await
            {
                Ok(updates) => {
                    for update in updates {
                        // Advance the cursor first so a failing update
                        // cannot wedge the loop on itself.
                        self.offset = update.id + 1;
                        if let Err(e) = self.handle_update(update).await {
                            error!("update processing failed: {e:#}");
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "fetching updates failed ({e:#}), retrying in {}s",
                        FETCH_RETRY_DELAY.as_secs()
                    );
                    tokio::time::sleep(FETCH_RETRY_DELAY).await;
                }
            }
        }

        info!("bot stopped");
    }

    /// Process one update through the full pipeline: session hydrate,
    /// middleware chain, scene-or-router dispatch, session save.
    ///
    /// Public so embeddings can feed updates from sources other than the
    /// polling loop (webhooks, tests). The session is persisted even when
    /// the pipeline returns an error.
    pub async fn handle_update(&self, update: Update) -> Result<()> {
        // No acting user means nothing to key a session on; skip quietly.
        let Some(user_id) = update.user_id() else {
            debug!("skipping update {} with no acting user", update.id);
            return Ok(());
        };

        let session_key = format!("{SESSION_KEY_PREFIX}{user_id}");
        let session = match self.storage.get(&session_key).await {
            Some(blob) => Session::from_value(blob),
            None => Session::default(),
        };

        let ctx: Ctx = Context::create(
            update,
            Arc::clone(&self.transport),
            Arc::clone(&self.scenes),
            session,
        );

        let outcome = self.run_pipeline(&ctx).await;

        // Unconditional: saved whether or not anything matched, and even
        // when a middleware or handler failed.
        self.storage.set(&session_key, ctx.session_value()).await;

        outcome
    }

    async fn run_pipeline(&self, ctx: &Ctx) -> Result<()> {
        for middleware in &self.middlewares {
            middleware(Arc::clone(ctx), Next::token()).await?;
        }

        // An active scene owns the update and bypasses the router. A
        // cursor pointing at an unknown scene or past the last step falls
        // through to normal routing instead of failing dispatch.
        if let Some(cursor) = ctx.scene_cursor() {
            match crate::scene::lookup_step(&self.scenes, &cursor.scene_id, cursor.step_index) {
                Some(step) => return step(Arc::clone(ctx)).await,
                None => debug!(
                    "dangling scene cursor ({} step {}), routing normally",
                    cursor.scene_id, cursor.step_index
                ),
            }
        }

        if let Some(handler) = self.router.resolve(ctx.update()) {
            return handler(Arc::clone(ctx)).await;
        }

        // Routing miss: not an error, the update simply had no effect
        // beyond middleware and the session save.
        Ok(())
    }
}
