use shared::domain::{Message, Sender};

/// Tracks what the terminal has already printed for the active conversation.
#[derive(Debug, Default)]
pub struct Transcript {
    printed: Vec<Message>,
}

impl Transcript {
    /// Forget everything printed, e.g. after switching conversations.
    pub fn reset(&mut self) {
        self.printed.clear();
    }

    /// Lines for the messages not printed yet.
    ///
    /// When `messages` no longer starts with what was printed (the server's
    /// copy replaced the local one), the whole sequence counts as new. User
    /// lines are skipped unless `include_user`, since the user typed them at
    /// the prompt.
    pub fn pending_lines(
        &mut self,
        messages: &[Message],
        include_user: bool,
        persona: &str,
        render: impl Fn(&Message) -> String,
    ) -> Vec<String> {
        let start = if messages.starts_with(&self.printed) {
            self.printed.len()
        } else {
            0
        };
        let lines = messages[start..]
            .iter()
            .filter_map(|message| match message.from {
                Sender::User if include_user => Some(format!("you: {}", message.text)),
                Sender::User => None,
                Sender::Assistant => Some(format!("{persona}: {}", render(message))),
            })
            .collect();
        self.printed = messages.to_vec();
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(message: &Message) -> String {
        message.text.clone()
    }

    #[test]
    fn only_new_assistant_lines_are_printed() {
        let mut transcript = Transcript::default();
        let mut messages = vec![Message::user("hi"), Message::assistant("hello")];
        assert_eq!(
            transcript.pending_lines(&messages, false, "Bot", plain),
            vec!["Bot: hello"]
        );

        messages.push(Message::user("more"));
        messages.push(Message::assistant("sure"));
        assert_eq!(
            transcript.pending_lines(&messages, false, "Bot", plain),
            vec!["Bot: sure"]
        );
    }

    #[test]
    fn replaced_sequence_is_printed_from_the_start() {
        let mut transcript = Transcript::default();
        let failed = vec![Message::user("first"), Message::assistant("server error")];
        transcript.pending_lines(&failed, false, "Bot", plain);

        let created = vec![Message::user("second"), Message::assistant("answer")];
        assert_eq!(
            transcript.pending_lines(&created, false, "Bot", plain),
            vec!["Bot: answer"]
        );
    }

    #[test]
    fn loaded_conversation_echoes_user_lines() {
        let mut transcript = Transcript::default();
        transcript.pending_lines(&[Message::assistant("old")], false, "Bot", plain);
        transcript.reset();

        let loaded = vec![Message::user("q"), Message::assistant("a")];
        assert_eq!(
            transcript.pending_lines(&loaded, true, "Helper", plain),
            vec!["you: q", "Helper: a"]
        );
    }
}
