use std::collections::HashMap;

use parking_lot::Mutex;

use super::{CommentaryContext, CommentaryTrigger};

const TRACK_CHANGED: &[&str] = &[
    "Up next, {title} by {artist}.",
    "Here's {artist} with {title}.",
    "Now playing: {title}, from {artist}.",
    "This one is {title}. {artist}, take it away.",
];

const DEVICE_CONNECTED: &[&str] = &[
    "{device} is connected. Let's get some music going.",
    "Welcome back, {device}.",
    "Hello {device}, ready when you are.",
];

const PAUSED: &[&str] = &[
    "Taking a breather.",
    "Holding {title} right there.",
    "Paused. I'll be here.",
];

const STOPPED: &[&str] = &[
    "And that's the end of the set.",
    "Music's off. Catch you later.",
];

const RESUMED: &[&str] = &[
    "And we're back.",
    "Back to {title} by {artist}.",
    "Picking up where we left off.",
];

/// Rotating local phrases used when no generator is available
///
/// Each trigger cycles through its templates in order, so repeated events
/// do not keep saying the same thing. Templates may use `{title}`,
/// `{artist}`, `{album}` and `{device}`.
#[derive(Debug)]
pub struct FallbackPhrases {
    templates: HashMap<CommentaryTrigger, Vec<String>>,
    cursors: Mutex<HashMap<CommentaryTrigger, usize>>,
}

impl Default for FallbackPhrases {
    fn default() -> Self {
        let builtin = [
            (CommentaryTrigger::TrackChanged, TRACK_CHANGED),
            (CommentaryTrigger::DeviceConnected, DEVICE_CONNECTED),
            (CommentaryTrigger::Paused, PAUSED),
            (CommentaryTrigger::Stopped, STOPPED),
            (CommentaryTrigger::Resumed, RESUMED),
        ];
        let templates = builtin
            .into_iter()
            .map(|(trigger, phrases)| {
                (trigger, phrases.iter().map(|p| p.to_string()).collect())
            })
            .collect();
        Self {
            templates,
            cursors: Mutex::new(HashMap::new()),
        }
    }
}

impl FallbackPhrases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the templates for one trigger; an empty list is ignored
    pub fn with_templates<I, S>(mut self, trigger: CommentaryTrigger, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let templates: Vec<String> = templates.into_iter().map(Into::into).collect();
        if !templates.is_empty() {
            self.templates.insert(trigger, templates);
            self.cursors.lock().remove(&trigger);
        }
        self
    }

    /// Next phrase for the context's trigger
    pub fn phrase(&self, context: &CommentaryContext) -> String {
        let template = match self.templates.get(&context.trigger) {
            Some(templates) if !templates.is_empty() => {
                let mut cursors = self.cursors.lock();
                let cursor = cursors.entry(context.trigger).or_insert(0);
                let template = &templates[*cursor % templates.len()];
                *cursor = cursor.wrapping_add(1);
                template.clone()
            }
            _ => return String::new(),
        };
        render(&template, context)
    }
}

fn render(template: &str, context: &CommentaryContext) -> String {
    let (title, artist, album) = match &context.track {
        Some(track) => (
            track.title.as_str(),
            track.artist.as_str(),
            track.album.as_deref().unwrap_or("this record"),
        ),
        None => ("this one", "the artist", "this record"),
    };
    template
        .replace("{title}", title)
        .replace("{artist}", artist)
        .replace("{album}", album)
        .replace("{device}", context.device_label())
}
