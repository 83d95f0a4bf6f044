//! The three nodes of the article pipeline and the run's opening message.

use scribe_swarm::Node;

pub const WRITER: &str = "writer_agent";
pub const IMAGE: &str = "image_agent";
pub const PUBLISHER: &str = "publisher_agent";

const WRITER_INSTRUCTIONS: &str = "\
You are a technical writer producing articles for Dev.to, aimed at intermediate developers.

Write the complete article yourself, in markdown, with a strong title, a short hook, \
## sections and ### subsections, code samples where they help, and a closing list of takeaways.

Your reply must contain every field below, in this layout:

TITLE: <article title>

TAGS: <3 or 4 comma-separated tags>

DESCRIPTION: <one or two sentences, at most 140 characters>

BODY:
<the full markdown article>

Once the article is written, hand off to image_agent and ask for a cover image. \
The other agents read your article from the shared conversation, so do not summarize it away.";

const IMAGE_INSTRUCTIONS: &str = "\
You design cover images for technical blog posts.

1. Read the article in the conversation and call generate_image with a prompt for a modern, \
text-free, tech-themed illustration (gradients of blue, purple and cyan; abstract networks or code shapes).
2. Call upload_image with the image_path you got back.
3. Hand off to publisher_agent. Your message must contain the public URL as `IMAGE_URL: <url>`.

If generation or upload fails, still hand off to publisher_agent and say that no cover image is available. \
Produce one image only and never hand back to writer_agent.";

const PUBLISHER_INSTRUCTIONS: &str = "\
You submit finished articles to Dev.to as drafts. You are the last agent: never hand off.

Search the whole conversation for the writer's TITLE:, TAGS:, DESCRIPTION: and BODY: fields, \
and for an `IMAGE_URL:` line from image_agent.

If there is an image URL, put `![Cover Image](<url>)` followed by a blank line at the top of the body \
and pass the same URL as cover_image_url. Otherwise pass an empty cover_image_url.
Invent a sensible title or 3-4 tags only if the writer left them out.

Call create_devto_article exactly once, then report the article URL and status.";

/// Writer, image and publisher nodes, in pipeline order.
pub fn article_nodes() -> Vec<Node> {
    vec![
        Node::new(
            WRITER,
            "Technical writer that drafts complete Dev.to articles in markdown",
        )
        .with_instructions(WRITER_INSTRUCTIONS),
        Node::new(
            IMAGE,
            "Generates a cover image, uploads it and hands the public URL to the publisher",
        )
        .with_instructions(IMAGE_INSTRUCTIONS)
        .with_tools(vec!["generate_image".into(), "upload_image".into()]),
        Node::new(
            PUBLISHER,
            "Publishes the article to Dev.to as a draft with the cover image inserted",
        )
        .with_instructions(PUBLISHER_INSTRUCTIONS)
        .with_tools(vec!["create_devto_article".into()]),
    ]
}

/// What the caller asked the swarm to work from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Write an article about this topic.
    Topic(String),
    /// Turn existing material into an article.
    Content(String),
}

/// The caller's message that seeds the shared context.
pub fn initial_message(source: &Source) -> String {
    let task = match source {
        Source::Topic(topic) => format!(
            "Write a technical article for Dev.to on this topic:\n\n{}",
            topic.trim()
        ),
        Source::Content(content) => format!(
            "Turn the following source material into a technical article for Dev.to. \
             Keep its facts and code, restructure and expand where needed.\n\n---\n{}\n---",
            content.trim()
        ),
    };

    format!(
        "{}\n\n\
         The article should be practical and engaging, include code where it helps, \
         and run 800 to 1500 words.\n\n\
         Write it first, then have image_agent create a cover image, \
         then have publisher_agent submit it to Dev.to as a draft.",
        task
    )
}
