//! Handler selection: command, text-pattern and callback-pattern tables.

use regex::Regex;

use crate::bot::Handler;
use crate::update::Update;

/// A registered trigger: exact string equality, or a regex match.
#[derive(Debug, Clone)]
pub enum Trigger {
    Literal(String),
    Pattern(Regex),
}

impl Trigger {
    pub fn matches(&self, input: &str) -> bool {
        match self {
            Trigger::Literal(literal) => literal == input,
            Trigger::Pattern(regex) => regex.is_match(input),
        }
    }
}

impl From<&str> for Trigger {
    fn from(literal: &str) -> Self {
        Trigger::Literal(literal.to_string())
    }
}

impl From<String> for Trigger {
    fn from(literal: String) -> Self {
        Trigger::Literal(literal)
    }
}

impl From<Regex> for Trigger {
    fn from(regex: Regex) -> Self {
        Trigger::Pattern(regex)
    }
}

/// The registered route tables.
///
/// All tables are association lists, not maps: entries are tried in
/// registration order and the first match wins.
#[derive(Default)]
pub struct Router {
    commands: Vec<(String, Handler)>,
    text_routes: Vec<(Trigger, Handler)>,
    callback_routes: Vec<(Trigger, Handler)>,
    fallback: Option<Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command handler. A leading `/` in the name is stripped,
    /// so `"start"` and `"/start"` register the same command.
    pub fn command(&mut self, name: &str, handler: Handler) {
        let name = name.strip_prefix('/').unwrap_or(name);
        self.commands.push((name.to_string(), handler));
    }

    pub fn on_text(&mut self, trigger: Trigger, handler: Handler) {
        self.text_routes.push((trigger, handler));
    }

    pub fn on_callback(&mut self, trigger: Trigger, handler: Handler) {
        self.callback_routes.push((trigger, handler));
    }

    pub fn set_fallback(&mut self, handler: Handler) {
        self.fallback = Some(handler);
    }

    /// Pick at most one handler for the update.
    ///
    /// Priority is fixed: callback routes (when the update carries
    /// callback data), then the command table, then text routes, then the
    /// fallback (text updates only). No match is not an error.
    pub fn resolve(&self, update: &Update) -> Option<Handler> {
        if let Some(data) = update.callback_data() {
            if let Some(handler) = first_match(&self.callback_routes, data) {
                return Some(handler);
            }
        }

        let text = update.text()?;

        if let Some(name) = command_token(text) {
            if let Some((_, handler)) = self.commands.iter().find(|(cmd, _)| cmd == name) {
                return Some(handler.clone());
            }
        }

        if let Some(handler) = first_match(&self.text_routes, text) {
            return Some(handler);
        }

        self.fallback.clone()
    }
}

/// The command lookup key: the first whitespace-delimited token with the
/// leading `/` stripped. Trailing arguments stay in the raw text for the
/// handler but are ignored here.
fn command_token(text: &str) -> Option<&str> {
    let token = text.split_whitespace().next()?;
    token.strip_prefix('/')
}

fn first_match(routes: &[(Trigger, Handler)], input: &str) -> Option<Handler> {
    routes
        .iter()
        .find(|(trigger, _)| trigger.matches(input))
        .map(|(_, handler)| handler.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::bot::{boxed_handler, Ctx};
    use crate::update::{Chat, Message, Update, UpdateKind, User};

    /// Handler that records which route fired into a shared cell.
    fn marker(cell: &Arc<AtomicUsize>, value: usize) -> Handler {
        let cell = Arc::clone(cell);
        boxed_handler(move |_ctx: Ctx| {
            let cell = Arc::clone(&cell);
            async move {
                cell.store(value, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn text_update(text: &str) -> Update {
        Update {
            id: 1,
            kind: UpdateKind::Message(Message {
                id: 1,
                chat: Chat { id: 1 },
                from: Some(User {
                    id: 1,
                    first_name: "T".to_string(),
                    last_name: None,
                    username: None,
                    language_code: None,
                }),
                text: Some(text.to_string()),
            }),
        }
    }

    #[test]
    fn command_matches_first_token_only() {
        let cell = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router.command("start", marker(&cell, 1));

        assert!(router.resolve(&text_update("/start")).is_some());
        assert!(router.resolve(&text_update("/start extra args")).is_some());
        assert!(router.resolve(&text_update("start")).is_none());
        assert!(router.resolve(&text_update("/stats")).is_none());
    }

    #[test]
    fn command_registration_strips_leading_slash() {
        let cell = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router.command("/help", marker(&cell, 1));
        assert!(router.resolve(&text_update("/help")).is_some());
    }

    #[tokio::test]
    async fn first_registered_text_pattern_wins() {
        let cell = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        // Both patterns match "hello there"; the earlier registration must win.
        router.on_text(Regex::new("hello").unwrap().into(), marker(&cell, 1));
        router.on_text(Regex::new("there").unwrap().into(), marker(&cell, 2));

        let handler = router.resolve(&text_update("hello there")).unwrap();
        handler(dummy_ctx("hello there")).await.unwrap();
        assert_eq!(cell.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn literal_trigger_requires_exact_equality() {
        let trigger = Trigger::from("ping");
        assert!(trigger.matches("ping"));
        assert!(!trigger.matches("ping pong"));
    }

    #[test]
    fn fallback_fires_only_for_text_updates() {
        let cell = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router.set_fallback(marker(&cell, 9));

        assert!(router.resolve(&text_update("anything")).is_some());
        let bare = Update {
            id: 2,
            kind: UpdateKind::Unsupported,
        };
        assert!(router.resolve(&bare).is_none());
    }

    #[test]
    fn callback_routes_take_priority_over_text() {
        use crate::update::CallbackQuery;

        let cell = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router.on_callback(Regex::new(r"^buy_\d+$").unwrap().into(), marker(&cell, 3));
        router.set_fallback(marker(&cell, 9));

        let update = Update {
            id: 3,
            kind: UpdateKind::CallbackQuery(CallbackQuery {
                id: "q".to_string(),
                from: User {
                    id: 1,
                    first_name: "T".to_string(),
                    last_name: None,
                    username: None,
                    language_code: None,
                },
                message: None,
                data: Some("buy_7".to_string()),
            }),
        };
        assert!(router.resolve(&update).is_some());

        // Unmatched callback data selects nothing; callbacks never reach the
        // text fallback.
        let unmatched = Update {
            id: 4,
            kind: UpdateKind::CallbackQuery(CallbackQuery {
                id: "q2".to_string(),
                from: User {
                    id: 1,
                    first_name: "T".to_string(),
                    last_name: None,
                    username: None,
                    language_code: None,
                },
                message: None,
                data: Some("other".to_string()),
            }),
        };
        assert!(router.resolve(&unmatched).is_none());
    }

    fn dummy_ctx(text: &str) -> Ctx {
        crate::context::Context::for_tests(text_update(text))
    }
}
