use crate::error::InputRejection;

/// Text buffer behind the message input at the bottom of the thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    text: String,
}

/// What an Enter key press in the composer should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterAction {
    InsertNewline,
    Submit,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Shift+Enter writes a newline, plain Enter submits.
    pub fn enter_action(shift: bool) -> EnterAction {
        if shift {
            EnterAction::InsertNewline
        } else {
            EnterAction::Submit
        }
    }

    pub fn insert_newline(&mut self) {
        self.text.push('\n');
    }

    /// Returns the text ready to send without consuming it.
    ///
    /// Blank input is rejected and the buffer is left exactly as typed. Accepted text is
    /// sent as typed, minus one trailing newline.
    pub fn submission(&self) -> Result<String, InputRejection> {
        if self.text.trim().is_empty() {
            return Err(InputRejection::EmptyMessage);
        }

        let content = self.text.strip_suffix('\n').unwrap_or(&self.text);
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_is_rejected_and_kept() {
        let mut composer = Composer::new();
        composer.set_text("   \n ");

        assert_eq!(composer.submission(), Err(InputRejection::EmptyMessage));
        assert_eq!(composer.text(), "   \n ");
    }

    #[test]
    fn submission_drops_trailing_newline_and_leaves_buffer_untouched() {
        let mut composer = Composer::new();
        composer.set_text("Oi\n");

        assert_eq!(composer.submission(), Ok("Oi".to_string()));
        assert_eq!(composer.text(), "Oi\n");
        composer.clear();
        assert_eq!(composer.text(), "");
    }

    #[test]
    fn leading_whitespace_is_sent_as_typed() {
        let mut composer = Composer::new();
        composer.set_text("    fn main() {}\n");

        assert_eq!(composer.submission(), Ok("    fn main() {}".to_string()));
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let mut composer = Composer::new();
        composer.set_text("linha 1");

        assert_eq!(Composer::enter_action(true), EnterAction::InsertNewline);
        composer.insert_newline();
        let typed = format!("{}linha 2", composer.text());
        composer.set_text(typed);

        assert_eq!(composer.submission(), Ok("linha 1\nlinha 2".to_string()));
        assert_eq!(Composer::enter_action(false), EnterAction::Submit);
    }
}
