//! Speech output: the speaker boundary, canned dialogs, and utterance splitting.

use storage::SessionId;

/// Where spoken text goes.
///
/// In a host this emits a speak request on the message bus; whatever is spoken
/// is expected to come back as assistant speech for the same session.
pub trait Speaker: Send + Sync + 'static {
    fn speak(&self, session_id: &SessionId, utterance: &str);

    /// Render a dialog with the assistant's name and speak it.
    fn speak_dialog(&self, session_id: &SessionId, dialog: Dialog, name: &str) {
        self.speak(session_id, &dialog.render(name));
    }
}

/// Canned lines the skill speaks on its own behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialog {
    /// Confirmation that the question was forwarded.
    Asking,
    /// Nothing could be spoken for the question.
    Error,
}

impl Dialog {
    pub fn render(self, name: &str) -> String {
        match self {
            Self::Asking => format!("Asking {name}."),
            Self::Error => format!("Sorry, {name} is not responding right now."),
        }
    }
}

/// Split a reply into sentence-sized utterances.
///
/// Breaks after `.`, `!` or `?` when followed by whitespace. Pieces are
/// trimmed and empty ones dropped.
pub fn split_utterances(text: &str) -> Vec<String> {
    let mut utterances = Vec::new();
    let mut start = 0;
    for end in sentence_ends(text) {
        push_trimmed(&mut utterances, &text[start..end]);
        start = end;
    }
    push_trimmed(&mut utterances, &text[start..]);
    utterances
}

/// Collects a streamed reply and releases whole utterances as they complete.
///
/// A sentence is released once the whitespace after its terminator has
/// arrived, so a chunk ending in `"21."` is held until the next chunk shows
/// whether it was a decimal. Released pieces are exactly what
/// [`split_utterances`] gives for the full text.
#[derive(Debug, Default)]
pub struct UtteranceBuffer {
    pending: String,
}

impl UtteranceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append reply text and take the utterances it completed.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);
        let Some(end) = sentence_ends(&self.pending).last() else {
            return Vec::new();
        };
        let rest = self.pending.split_off(end);
        let done = std::mem::replace(&mut self.pending, rest);
        split_utterances(&done)
    }

    /// Text received after the last released utterance.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// The reply ended; release whatever is left.
    pub fn finish(self) -> Vec<String> {
        split_utterances(&self.pending)
    }
}

/// Byte offsets just past each sentence terminator.
fn sentence_ends(text: &str) -> impl Iterator<Item = usize> + '_ {
    let mut chars = text.char_indices().peekable();
    std::iter::from_fn(move || {
        while let Some((i, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?')
                && chars.peek().is_some_and(|&(_, next)| next.is_whitespace())
            {
                return Some(i + c.len_utf8());
            }
        }
        None
    })
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_ends() {
        let parts = split_utterances("First sentence. Second sentence! Third? Remainder");
        assert_eq!(
            parts,
            vec!["First sentence.", "Second sentence!", "Third?", "Remainder"]
        );
    }

    #[test]
    fn keeps_decimals_and_abbreviations_without_space() {
        assert_eq!(split_utterances("It is 21.5 degrees."), vec!["It is 21.5 degrees."]);
    }

    #[test]
    fn handles_newlines_and_blank_input() {
        assert_eq!(split_utterances("One.\nTwo."), vec!["One.", "Two."]);
        assert!(split_utterances("   ").is_empty());
        assert!(split_utterances("").is_empty());
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        assert_eq!(split_utterances("Café? Oui. ✓"), vec!["Café?", "Oui.", "✓"]);
    }

    #[test]
    fn buffer_holds_sentence_until_whitespace_arrives() {
        let mut buffer = UtteranceBuffer::new();
        assert!(buffer.push("It is 21.").is_empty());
        assert!(buffer.push("5 degrees").is_empty());
        assert_eq!(buffer.push(". Stay"), vec!["It is 21.5 degrees."]);
        assert!(buffer.push(" cool!").is_empty());
        assert_eq!(buffer.push(" Bye"), vec!["Stay cool!"]);
        assert_eq!(buffer.pending(), " Bye");
        assert_eq!(buffer.finish(), vec!["Bye"]);
    }

    #[test]
    fn buffered_chunks_match_one_shot_split() {
        let reply = "Café? Oui. It is 21.5 degrees!\nEnjoy. ✓";
        let mut buffer = UtteranceBuffer::new();
        let mut streamed = Vec::new();
        for c in reply.chars() {
            streamed.extend(buffer.push(c.encode_utf8(&mut [0; 4])));
        }
        streamed.extend(buffer.finish());
        assert_eq!(streamed, split_utterances(reply));
    }

    #[test]
    fn blank_stream_releases_nothing() {
        let mut buffer = UtteranceBuffer::new();
        assert!(buffer.push("  ").is_empty());
        assert!(buffer.push("\n").is_empty());
        assert!(buffer.finish().is_empty());
    }

    #[test]
    fn dialogs_name_the_assistant() {
        assert_eq!(Dialog::Asking.render("Gemini Chat"), "Asking Gemini Chat.");
        assert_eq!(
            Dialog::Error.render("Gemini Chat"),
            "Sorry, Gemini Chat is not responding right now."
        );
    }
}
