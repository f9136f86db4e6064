//! Push-notification boundary type.
//!
//! Remote messages arrive as a flat key/value data map. The core only
//! shapes that map into a typed payload; rendering and delivery belong to
//! the host platform.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default action-button label when the message does not carry one.
const DEFAULT_ACTION_LABEL: &str = "Open";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub action_label: String,
}

impl NotificationPayload {
    /// Extract a payload from a remote message's data map. Returns `None`
    /// when the message carries no displayable title or body.
    pub fn from_data_map(data: &HashMap<String, String>) -> Option<Self> {
        let title = data.get("title")?.clone();
        let body = data.get("body")?.clone();
        let action_label = data
            .get("button")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ACTION_LABEL.to_string());
        Some(NotificationPayload {
            title,
            body,
            action_label,
        })
    }
}
