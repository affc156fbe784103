//! Display-text sanitization.
//!
//! A [`Sanitizer`] turns a stored message into the text shown on screen.
//! An empty result means the message has nothing to show and is dropped
//! from the store.

use overlay_core::Message;

/// Transforms a message into display text.
pub trait Sanitizer {
    /// Display text for `message`; empty hides and removes it.
    fn sanitize(&self, message: &Message) -> String;
}

impl<F> Sanitizer for F
where
    F: Fn(&Message) -> String,
{
    fn sanitize(&self, message: &Message) -> String {
        self(message)
    }
}

type GlyphFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Replaces emote tokens with `<img>` tags.
///
/// Tokens are matched literally and every occurrence is replaced. An
/// optional glyph pass (emoji substitution) runs on the text first.
#[derive(Default)]
pub struct EmoteSanitizer {
    glyphs: Option<GlyphFn>,
}

impl EmoteSanitizer {
    /// Emote substitution only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `glyphs` over the text before emote substitution.
    #[must_use]
    pub fn with_glyphs(mut self, glyphs: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.glyphs = Some(Box::new(glyphs));
        self
    }
}

impl std::fmt::Debug for EmoteSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmoteSanitizer")
            .field("glyphs", &self.glyphs.is_some())
            .finish()
    }
}

impl Sanitizer for EmoteSanitizer {
    fn sanitize(&self, message: &Message) -> String {
        let text = match &self.glyphs {
            Some(glyphs) => glyphs(&message.text),
            None => message.text.clone(),
        };
        message
            .emotes
            .iter()
            .filter(|emote| !emote.id.is_empty())
            .fold(text, |text, emote| {
                text.replace(
                    &emote.id,
                    &format!(r#"<img class="smile" src="{}"  alt=""/>"#, emote.url),
                )
            })
    }
}
