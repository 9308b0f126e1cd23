//! Keyboard and reply-markup builders. Pure data, no state.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

/// A custom reply keyboard shown below the input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_keyboard: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_time_keyboard: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// One inline button: either a callback button carrying an opaque data
/// payload, or a URL button.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

/// Any of the markup shapes accepted by `reply_markup`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Markup {
    Reply(ReplyKeyboardMarkup),
    Inline(InlineKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

impl From<ReplyKeyboardMarkup> for Markup {
    fn from(m: ReplyKeyboardMarkup) -> Self {
        Markup::Reply(m)
    }
}

impl From<InlineKeyboardMarkup> for Markup {
    fn from(m: InlineKeyboardMarkup) -> Self {
        Markup::Inline(m)
    }
}

impl From<ReplyKeyboardRemove> for Markup {
    fn from(m: ReplyKeyboardRemove) -> Self {
        Markup::Remove(m)
    }
}

/// Constructors for the common markup shapes.
pub struct Keyboard;

impl Keyboard {
    /// Build a resizing reply keyboard, one button row per inner slice.
    pub fn reply<R, B>(rows: R) -> ReplyKeyboardMarkup
    where
        R: IntoIterator<Item = B>,
        B: IntoIterator<Item = &'static str>,
    {
        Self::reply_with_options(rows, Some(true), None)
    }

    pub fn reply_with_options<R, B>(
        rows: R,
        resize_keyboard: Option<bool>,
        one_time_keyboard: Option<bool>,
    ) -> ReplyKeyboardMarkup
    where
        R: IntoIterator<Item = B>,
        B: IntoIterator<Item = &'static str>,
    {
        let keyboard = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|text| KeyboardButton {
                        text: text.to_string(),
                    })
                    .collect()
            })
            .collect();
        ReplyKeyboardMarkup {
            keyboard,
            resize_keyboard,
            one_time_keyboard,
        }
    }

    pub fn inline(rows: Vec<Vec<InlineKeyboardButton>>) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup {
            inline_keyboard: rows,
        }
    }

    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }

    pub fn remove() -> ReplyKeyboardRemove {
        ReplyKeyboardRemove {
            remove_keyboard: true,
        }
    }
}
