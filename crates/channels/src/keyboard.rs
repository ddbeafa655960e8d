use serde::{Deserialize, Serialize};

/// An inline button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Button {
    /// Opens a URL.
    Url { label: String, url: String },
    /// Sends `data` back to the bot as a callback event.
    Callback { label: String, data: String },
}

impl Button {
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Url {
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Callback {
            label: label.into(),
            data: data.into(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Url { label, .. } | Self::Callback { label, .. } => label,
        }
    }
}

/// Rows of buttons, top to bottom.
pub type Keyboard = Vec<Vec<Button>>;

/// Lay buttons out `per_row` to a row, preserving order.
pub fn rows(buttons: Vec<Button>, per_row: usize) -> Keyboard {
    let per_row = per_row.max(1);
    let mut out: Keyboard = Vec::with_capacity(buttons.len().div_ceil(per_row));
    for button in buttons {
        match out.last_mut() {
            Some(row) if row.len() < per_row => row.push(button),
            _ => out.push(vec![button]),
        }
    }
    out
}
