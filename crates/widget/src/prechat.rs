use serde::{Deserialize, Serialize};

use crate::error::InputRejection;

/// Placeholder replaced with the visitor's name inside the welcome template.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Raw intake form values as typed by the visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreChatForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl PreChatForm {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Validates the form and produces the visitor identity it describes.
    pub fn validate(&self) -> Result<VisitorIdentity, InputRejection> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(InputRejection::EmptyName);
        }

        let email = self.email.trim();
        if email.is_empty() {
            return Err(InputRejection::EmptyEmail);
        }
        if !is_plausible_email(email) {
            return Err(InputRejection::MalformedEmail);
        }

        let note = self.message.trim();
        Ok(VisitorIdentity {
            name: name.to_string(),
            email: email.to_string(),
            note: (!note.is_empty()).then(|| note.to_string()),
        })
    }
}

/// Who the visitor said they were when passing the pre-chat gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorIdentity {
    pub name: String,
    pub email: String,
    /// Optional free-text answer to "how can we help?".
    pub note: Option<String>,
}

impl VisitorIdentity {
    /// Renders the configured welcome template for this visitor.
    pub fn personalize(&self, template: &str) -> String {
        template.replace(NAME_PLACEHOLDER, &self.name)
    }
}

// Exactly one `@`, something on both sides, no whitespace. Anything stricter belongs to the page.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    }
}
