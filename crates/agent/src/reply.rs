//! Post-processing of the model's final text.

/// Turns raw final text into what the user sees.
pub trait ReplyExtractor: Send + Sync {
    fn extract(&self, text: &str) -> String;
}

/// Returns the text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ReplyExtractor for PassThrough {
    fn extract(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Extracts the span between `<tag>` and the following `</tag>`.
///
/// Falls back to the raw text when either tag is missing, so a model that
/// forgets the convention still gets its answer shown.
#[derive(Debug, Clone)]
pub struct TagReplyExtractor {
    open: String,
    close: String,
}

impl TagReplyExtractor {
    pub fn new(tag: &str) -> Self {
        Self {
            open: format!("<{tag}>"),
            close: format!("</{tag}>"),
        }
    }
}

impl Default for TagReplyExtractor {
    fn default() -> Self {
        Self::new("reply")
    }
}

impl ReplyExtractor for TagReplyExtractor {
    fn extract(&self, text: &str) -> String {
        let Some(start) = text.find(&self.open) else {
            return text.to_string();
        };
        let body = &text[start + self.open.len()..];
        match body.find(&self.close) {
            Some(end) => body[..end].trim().to_string(),
            None => text.to_string(),
        }
    }
}

/// Pick an extractor for a configured tag; an empty tag disables extraction.
pub fn for_tag(tag: &str) -> Box<dyn ReplyExtractor> {
    if tag.trim().is_empty() {
        Box::new(PassThrough)
    } else {
        Box::new(TagReplyExtractor::new(tag.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_reply() {
        let ex = TagReplyExtractor::default();
        let text = "<thinking>look up order</thinking>\n<reply>\n  Your order has shipped.\n</reply>";
        assert_eq!(ex.extract(text), "Your order has shipped.");
    }

    #[test]
    fn first_pair_wins() {
        let ex = TagReplyExtractor::new("answer");
        assert_eq!(ex.extract("<answer>one</answer> <answer>two</answer>"), "one");
    }

    #[test]
    fn missing_tags_fall_back_to_raw_text() {
        let ex = TagReplyExtractor::default();
        assert_eq!(ex.extract("no tags here"), "no tags here");
        assert_eq!(ex.extract("<reply>unterminated"), "<reply>unterminated");
        assert_eq!(ex.extract("stray </reply>"), "stray </reply>");
    }

    #[test]
    fn pass_through_is_identity() {
        assert_eq!(PassThrough.extract("<reply>x</reply>"), "<reply>x</reply>");
    }

    #[test]
    fn empty_tag_disables_extraction() {
        assert_eq!(for_tag("").extract("<reply>x</reply>"), "<reply>x</reply>");
        assert_eq!(for_tag("reply").extract("<reply>x</reply>"), "x");
    }
}
