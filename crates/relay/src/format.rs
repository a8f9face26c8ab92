//! Post rendering
//!
//! Turns a [`Post`] into the HTML snippet sent to the channel. Rendering is
//! pure: no IO, no clock, same input always yields the same string.

use std::fmt::Write;

use crate::models::{Mention, Post};

/// Default marker for reposts (U+1F501, clockwise arrows)
pub const DEFAULT_REPOST_MARKER: char = '\u{1F501}';
/// Default marker for replies (U+21AA, arrow curving right)
pub const DEFAULT_REPLY_MARKER: char = '\u{21AA}';

const ARROW: char = '\u{2192}';
const TIMESTAMP_FORMAT: &str = "%A, %B %e %Y at %I:%M%p";

/// The run of mentions a post body starts with
///
/// Offsets are in characters, end-exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionRun<'a> {
    pub start: usize,
    pub end: usize,
    pub mentions: &'a [Mention],
}

/// Find the leading contiguous run of mentions in `text`
///
/// The run must start the body (only whitespace before the first mention)
/// and every following mention joins only while the text between it and
/// the previous one is whitespace. Mentions later in the body stay out.
pub fn leading_mention_run<'a>(text: &str, mentions: &'a [Mention]) -> Option<MentionRun<'a>> {
    let chars: Vec<char> = text.chars().collect();
    let blank = |from: usize, to: usize| {
        chars
            .get(from..to)
            .is_some_and(|gap| gap.iter().all(|c| c.is_whitespace()))
    };

    let first = mentions.first()?;
    if !blank(0, first.start) {
        return None;
    }

    let mut end = first.end;
    let mut len = 1;
    for mention in &mentions[1..] {
        if !blank(end, mention.start) {
            break;
        }
        end = mention.end;
        len += 1;
    }

    Some(MentionRun {
        start: first.start,
        end,
        mentions: &mentions[..len],
    })
}

/// Renders posts for the destination channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formatter {
    repost_marker: char,
    reply_marker: char,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(DEFAULT_REPOST_MARKER, DEFAULT_REPLY_MARKER)
    }
}

impl Formatter {
    pub fn new(repost_marker: char, reply_marker: char) -> Self {
        Self {
            repost_marker,
            reply_marker,
        }
    }

    /// Render a post as Telegram HTML
    pub fn render(&self, post: &Post) -> String {
        let mut out = String::new();

        if let Some(original) = &post.repost {
            let run = leading_mention_run(&original.text, &original.mentions);
            let targets = run
                .as_ref()
                .map(|run| format!(" {} {}", ARROW, handles(run.mentions)))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{}  <b>{}{}</b>",
                self.repost_marker, original.author, targets
            );
            let _ = writeln!(out, "{}", strip_run(&original.text, run.as_ref()));
        } else if post.is_reply() && !post.mentions.is_empty() {
            let run = leading_mention_run(&post.text, &post.mentions);
            let header = match &run {
                Some(run) => handles(run.mentions),
                None => format!("@{}", post.in_reply_to_author.as_deref().unwrap_or_default()),
            };
            let _ = writeln!(out, "{}  <b>{}</b>", self.reply_marker, header);
            let _ = writeln!(out, "{}", strip_run(&post.text, run.as_ref()));
        } else {
            let _ = writeln!(out, "{}", post.text);
        }

        let _ = writeln!(out, "{}", post.permalink);
        let _ = writeln!(out, "{}", post.created_at.format(TIMESTAMP_FORMAT));
        out
    }
}

fn handles(mentions: &[Mention]) -> String {
    mentions
        .iter()
        .map(|m| format!("@{}", m.screen_name))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Body text after the mention run, trimmed
fn strip_run(text: &str, run: Option<&MentionRun<'_>>) -> String {
    match run {
        Some(run) => text.chars().skip(run.end).collect::<String>().trim().to_string(),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostId, Repost};
    use chrono::{TimeZone, Utc};

    fn at_noon() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 5, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_mention_run_stops_at_gap() {
        let text = "@a  @bxyz @c tail";
        let mentions = vec![
            Mention::new("a", 0, 2),
            Mention::new("b", 4, 6),
            Mention::new("c", 10, 12),
        ];

        let run = leading_mention_run(text, &mentions).unwrap();
        assert_eq!(run.start, 0);
        assert_eq!(run.end, 6);
        assert_eq!(run.mentions.len(), 2);
    }

    #[test]
    fn test_mention_run_single_space_chain() {
        let text = "@a @b @c hello";
        let mentions = vec![
            Mention::new("a", 0, 2),
            Mention::new("b", 3, 5),
            Mention::new("c", 6, 8),
        ];

        let run = leading_mention_run(text, &mentions).unwrap();
        assert_eq!(run.end, 8);
        assert_eq!(run.mentions.len(), 3);
    }

    #[test]
    fn test_mention_run_requires_leading_position() {
        let text = "hey @a";
        let mentions = vec![Mention::new("a", 4, 6)];
        assert!(leading_mention_run(text, &mentions).is_none());
        assert!(leading_mention_run(text, &[]).is_none());
    }

    #[test]
    fn test_mention_run_uses_char_offsets() {
        // Multi-byte characters before the body must not break slicing
        let text = "@é @ü ünïcödé";
        let mentions = vec![Mention::new("é", 0, 2), Mention::new("ü", 3, 5)];

        let run = leading_mention_run(text, &mentions).unwrap();
        assert_eq!(strip_run(text, Some(&run)), "ünïcödé");
    }

    #[test]
    fn test_render_plain_post_keeps_text() {
        let post = Post::builder(PostId::new(42), "author")
            .text("Plain text with @someone in the middle")
            .mentions(vec![Mention::new("someone", 16, 24)])
            .created_at(at_noon())
            .build();

        let rendered = Formatter::default().render(&post);
        assert_eq!(
            rendered,
            "Plain text with @someone in the middle\n\
             https://twitter.com/author/status/42\n\
             Thursday, March  5 2020 at 12:30PM\n"
        );
    }

    #[test]
    fn test_render_repost_strips_leading_mentions() {
        let post = Post::builder(PostId::new(7), "relayer")
            .text("RT @orig: @x @y look at this @z")
            .repost(Repost {
                author: "orig".to_string(),
                text: "@x @y look at this @z".to_string(),
                mentions: vec![
                    Mention::new("x", 0, 2),
                    Mention::new("y", 3, 5),
                    Mention::new("z", 19, 21),
                ],
            })
            .created_at(at_noon())
            .build();

        let rendered = Formatter::new('R', 'r').render(&post);
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("R  <b>orig \u{2192} @x @y</b>"));
        assert_eq!(lines.next(), Some("look at this @z"));
        assert_eq!(lines.next(), Some("https://twitter.com/relayer/status/7"));
        assert!(!rendered.contains("@x @y look"));
    }

    #[test]
    fn test_render_repost_without_mentions() {
        let post = Post::builder(PostId::new(8), "relayer")
            .repost(Repost {
                author: "orig".to_string(),
                text: "  just words ".to_string(),
                mentions: Vec::new(),
            })
            .created_at(at_noon())
            .build();

        let rendered = Formatter::new('R', 'r').render(&post);
        assert!(rendered.starts_with("R  <b>orig</b>\njust words\n"));
    }

    #[test]
    fn test_render_reply() {
        let post = Post::builder(PostId::new(9), "author")
            .text("@friend @other thanks!")
            .in_reply_to("friend")
            .mentions(vec![Mention::new("friend", 0, 7), Mention::new("other", 8, 14)])
            .created_at(at_noon())
            .build();

        let rendered = Formatter::new('R', 'r').render(&post);
        assert!(rendered.starts_with("r  <b>@friend @other</b>\nthanks!\n"));
    }

    #[test]
    fn test_render_reply_without_leading_run() {
        let post = Post::builder(PostId::new(10), "author")
            .text("thanks @friend")
            .in_reply_to("friend")
            .mentions(vec![Mention::new("friend", 7, 14)])
            .created_at(at_noon())
            .build();

        let rendered = Formatter::new('R', 'r').render(&post);
        assert!(rendered.starts_with("r  <b>@friend</b>\nthanks @friend\n"));
    }

    #[test]
    fn test_render_reply_without_mentions_is_plain() {
        let post = Post::builder(PostId::new(11), "author")
            .text("self thread continues")
            .in_reply_to("author")
            .created_at(at_noon())
            .build();

        let rendered = Formatter::default().render(&post);
        assert!(rendered.starts_with("self thread continues\n"));
    }
}
