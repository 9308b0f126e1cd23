//! A tiny shop: a product catalog in a `LocalDb`, inline buy buttons and
//! an admin command to add products.
//!
//! Run with `BOT_TOKEN=... cargo run --example shop_bot`.

use std::env;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use botkit::{Bot, Ctx, Keyboard, LocalDb};
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Product {
    id: i64,
    name: String,
    price: u32,
}

async fn send_catalog(ctx: &Ctx, db: &LocalDb<Product>) {
    let buttons = db
        .get_all()
        .await
        .iter()
        .map(|p| vec![Keyboard::callback(format!("{} - {}₽", p.name, p.price), format!("buy_{}", p.id))])
        .collect();
    ctx.reply_with("What would you like to buy?", Keyboard::inline(buttons))
        .await;
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenv::dotenv().ok();

    let token = env::var("BOT_TOKEN").expect("BOT_TOKEN must be set");
    let mut bot = Bot::new(&token);

    let db = Arc::new(LocalDb::<Product>::open("products.json").await?);

    // Seed the catalog on first start.
    if db.is_empty().await {
        db.push(Product { id: 1, name: "🍎 Apple".into(), price: 100 }).await?;
        db.push(Product { id: 2, name: "🍌 Banana".into(), price: 150 }).await?;
        db.push(Product { id: 3, name: "🍒 Cherry".into(), price: 300 }).await?;
    }

    {
        let db = Arc::clone(&db);
        bot.command("start", move |ctx| {
            let db = Arc::clone(&db);
            async move {
                ctx.reply("Welcome to the fruit shop! 🍎").await;
                send_catalog(&ctx, &db).await;
                Ok(())
            }
        });
    }

    {
        let db = Arc::clone(&db);
        bot.on_callback(Regex::new(r"^buy_(\d+)$")?, move |ctx| {
            let db = Arc::clone(&db);
            async move {
                let product_id: i64 = ctx
                    .callback_data()
                    .and_then(|data| data.strip_prefix("buy_"))
                    .and_then(|id| id.parse().ok())
                    .unwrap_or(0);

                match db.find_one(|p| p.id == product_id).await {
                    Some(product) => {
                        ctx.answer_callback(Some(&format!("You picked: {}", product.name)), false)
                            .await;
                        ctx.reply(&format!(
                            "✅ You bought {} for {}₽",
                            product.name, product.price
                        ))
                        .await;
                    }
                    None => {
                        ctx.answer_callback(Some("Product not found"), true).await;
                    }
                }
                Ok(())
            }
        });
    }

    // Admin command, e.g. `/add 🍐 Pear-200`.
    {
        let db = Arc::clone(&db);
        let pattern = Regex::new(r"^/add (.+)-(\d+)$")?;
        let matcher = pattern.clone();
        bot.on_text(pattern, move |ctx| {
            let db = Arc::clone(&db);
            let matcher = matcher.clone();
            async move {
                let Some(text) = ctx.text().map(str::to_string) else {
                    return Ok(());
                };
                let Some(caps) = matcher.captures(&text) else {
                    return Ok(());
                };
                let name = caps[1].to_string();
                let price: u32 = caps[2].parse().unwrap_or(0);

                let id = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);
                db.push(Product { id, name: name.clone(), price }).await?;

                ctx.reply(&format!("Added product: {name} for {price}₽")).await;
                Ok(())
            }
        });
    }

    info!("starting shop bot");
    bot.start().await;
    Ok(())
}
