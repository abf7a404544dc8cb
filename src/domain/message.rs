use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMessage {
    pub date: DateTime<Utc>,
    pub sender: Option<String>,
    pub text: String,
}

impl GroupMessage {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn display_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.date.format("%Y-%m-%d %H:%M"),
            self.sender.as_deref().unwrap_or("N/A"),
            self.text
        )
    }
}
