//! Smallest possible bot: one command, one text trigger.
//!
//! Run with `BOT_TOKEN=... cargo run --example echo_bot`.

use anyhow::Result;
use botkit::{Bot, BotCommand, Keyboard};
use log::info;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenv::dotenv().ok();

    let token = env::var("BOT_TOKEN").expect("BOT_TOKEN must be set");
    let mut bot = Bot::new(&token);

    bot.set_commands(&[BotCommand::new("start", "Start the bot")])
        .await;

    bot.command("start", |ctx| async move {
        ctx.reply_with(
            "Hi! This is the simplest possible bot.",
            Keyboard::reply([["Show cats"]]),
        )
        .await;
        Ok(())
    });

    bot.on_text("Show cats", |ctx| async move {
        ctx.reply("🐈 Meow!").await;
        Ok(())
    });

    info!("starting echo bot");
    bot.start().await;
    Ok(())
}
