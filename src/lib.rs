//! # botkit
//!
//! A minimal framework for long-polling Telegram bots: per-user persisted
//! sessions, ordered middleware, command/text/callback routing, and linear
//! multi-step scenes.
//!
//! ```no_run
//! use botkit::{Bot, Keyboard};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut bot = Bot::new("TOKEN");
//!
//!     bot.command("start", |ctx| async move {
//!         ctx.reply_with("Hello!", Keyboard::reply([["Show cats"]])).await;
//!         Ok(())
//!     });
//!
//!     bot.on_text("Show cats", |ctx| async move {
//!         ctx.reply("Meow!").await;
//!         Ok(())
//!     });
//!
//!     bot.start().await;
//! }
//! ```

pub mod api;
pub mod bot;
pub mod context;
pub mod keyboard;
pub mod localdb;
pub mod router;
pub mod scene;
pub mod session;
pub mod update;

pub use api::{TelegramApi, Transport};
pub use bot::{Bot, BotCommand, Ctx, Handler, HandlerResult, Middleware, Next, StopHandle};
pub use context::Context;
pub use keyboard::{
    InlineKeyboardButton, InlineKeyboardMarkup, Keyboard, KeyboardButton, Markup,
    ReplyKeyboardMarkup, ReplyKeyboardRemove,
};
pub use localdb::LocalDb;
pub use router::Trigger;
pub use scene::Scene;
pub use session::{FileStore, MemoryStore, SceneCursor, Session, SessionStore, SCENE_KEY};
pub use update::{CallbackQuery, Chat, Message, Update, UpdateKind, User};
