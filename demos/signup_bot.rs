//! A two-step signup scene with file-backed sessions, plus a logging
//! middleware.
//!
//! Run with `BOT_TOKEN=... cargo run --example signup_bot`.

use anyhow::Result;
use botkit::{Bot, FileStore, Scene};
use log::info;
use serde_json::json;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenv::dotenv().ok();

    let token = env::var("BOT_TOKEN").expect("BOT_TOKEN must be set");
    let mut bot = Bot::with_store(&token, FileStore::new("sessions.json"));

    bot.use_middleware(|ctx, next| async move {
        if let Some(user) = ctx.from() {
            info!("update from user {} ({})", user.id, user.first_name);
        }
        next.run().await;
        Ok(())
    });

    let signup = Scene::new("signup")
        .step(|ctx| async move {
            ctx.reply("What is your name?").await;
            ctx.next();
            Ok(())
        })
        .step(|ctx| async move {
            let name = ctx.text().unwrap_or("stranger").to_string();
            ctx.session_set("name", json!(name.clone()));
            ctx.reply(&format!("Nice to meet you, {name}!")).await;
            ctx.leave();
            Ok(())
        });
    bot.add_scene(signup);

    bot.command("signup", |ctx| async move { ctx.enter("signup").await });

    bot.on_message(|ctx| async move {
        let greeting = match ctx.session_get("name") {
            Some(name) => format!("Hello again, {}!", name.as_str().unwrap_or("friend")),
            None => "Send /signup to introduce yourself.".to_string(),
        };
        ctx.reply(&greeting).await;
        Ok(())
    });

    info!("starting signup bot");
    bot.start().await;
    Ok(())
}
