use crate::convert::Conversion;
use crate::errors::SourceError;
use crate::types::{Fragment, JobId};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Fragments for one streaming session, in delivery order.
pub type ChunkStream = BoxStream<'static, Result<Fragment, SourceError>>;

/// What a chunk source gets to know about the job it is producing fragments for.
#[derive(Clone, Debug)]
pub struct ChunkRequest {
    pub job_id: JobId,
    pub result: Option<Arc<Conversion>>,
}

/// Produces the ordered fragments streamed for a job.
///
/// `chunks` is called once per streaming session and must start from the first fragment;
/// there is no resume.
pub trait ChunkSource: Send + Sync + 'static {
    fn chunks(&self, request: &ChunkRequest) -> ChunkStream;

    /// Delay before each fragment. `None` falls back to the coordinator's configured pacing.
    fn pacing(&self) -> Option<Duration> {
        None
    }
}

/// Streams the same fragments for every job.
#[derive(Clone, Debug)]
pub struct FixedChunks {
    fragments: Arc<[Fragment]>,
    pacing: Option<Duration>,
}

impl FixedChunks {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Fragment>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            pacing: None,
        }
    }

    /// Three sample corrected paragraphs, handy for exercising a client.
    pub fn demo() -> Self {
        Self::new([
            "<p>A codeshare agreement, also known simply as a codeshare, is a business arrangement common in the aviation industry.</p>",
            "<p>Two or more airlines publish and market the same flight under their own airline designator.</p>",
            "<p>Each airline lists the flight with its own designator and flight number as part of its published timetable.</p>",
        ])
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }
}

impl ChunkSource for FixedChunks {
    fn chunks(&self, _request: &ChunkRequest) -> ChunkStream {
        let fragments = self.fragments.clone();
        stream::iter((0..fragments.len()).map(move |i| Ok(fragments[i].clone()))).boxed()
    }

    fn pacing(&self) -> Option<Duration> {
        self.pacing
    }
}

/// Streams a job's own converted markup, one top-level block element per fragment.
///
/// Paced by the coordinator's configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkupBlocks;

impl MarkupBlocks {
    pub fn new() -> Self {
        Self
    }
}

impl ChunkSource for MarkupBlocks {
    fn chunks(&self, request: &ChunkRequest) -> ChunkStream {
        let blocks = request
            .result
            .as_ref()
            .map(|result| split_blocks(&result.markup))
            .unwrap_or_default();
        stream::iter(blocks.into_iter().map(Ok)).boxed()
    }
}

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "table", "blockquote", "pre", "div",
];

fn is_block(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

/// Split markup into its top-level block elements.
///
/// Nested blocks stay inside their parent. Stray text between blocks becomes a fragment of its
/// own, whitespace-only gaps are dropped.
pub fn split_blocks(markup: &str) -> Vec<Fragment> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut cursor = 0;

    while let Some(offset) = markup[cursor..].find('<') {
        let tag_start = cursor + offset;
        let tag_end = match markup[tag_start..].find('>') {
            Some(end) => tag_start + end + 1,
            None => break,
        };
        let tag = &markup[tag_start + 1..tag_end - 1];
        let (closing, body) = match tag.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, tag),
        };
        let name = body
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if is_block(&name) {
            if closing {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    push_block(&mut blocks, &markup[start..tag_end]);
                    start = tag_end;
                }
            } else if !body.ends_with('/') {
                if depth == 0 {
                    push_block(&mut blocks, &markup[start..tag_start]);
                    start = tag_start;
                }
                depth += 1;
            }
        }
        cursor = tag_end;
    }
    push_block(&mut blocks, &markup[start..]);
    blocks
}

fn push_block(blocks: &mut Vec<Fragment>, block: &str) {
    let block = block.trim();
    if !block.is_empty() {
        blocks.push(block.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn request(markup: &str) -> ChunkRequest {
        ChunkRequest {
            job_id: JobId::new_v4(),
            result: Some(Arc::new(Conversion::new(markup))),
        }
    }

    #[test]
    fn splits_flat_paragraphs() {
        let blocks = split_blocks("<p>one</p>\n<p>two</p><h1>title</h1>");
        assert_eq!(blocks, vec!["<p>one</p>", "<p>two</p>", "<h1>title</h1>"]);
    }

    #[test]
    fn nested_blocks_stay_with_their_parent() {
        let markup = "<blockquote><p>quoted</p><p>more</p></blockquote><p>after</p>";
        assert_eq!(
            split_blocks(markup),
            vec![
                "<blockquote><p>quoted</p><p>more</p></blockquote>",
                "<p>after</p>"
            ]
        );
    }

    #[test]
    fn inline_tags_and_stray_text() {
        let markup = "intro <p>a <strong>bold</strong><br /> move</p> outro";
        assert_eq!(
            split_blocks(markup),
            vec!["intro", "<p>a <strong>bold</strong><br /> move</p>", "outro"]
        );
    }

    #[test]
    fn uppercase_tags_and_attributes() {
        let markup = "<P class=\"x\">one</P><UL><li>a</li><li>b</li></UL>";
        assert_eq!(
            split_blocks(markup),
            vec!["<P class=\"x\">one</P>", "<UL><li>a</li><li>b</li></UL>"]
        );
    }

    #[test]
    fn empty_and_unterminated_markup() {
        assert!(split_blocks("").is_empty());
        assert!(split_blocks("   \n ").is_empty());
        assert_eq!(split_blocks("<p>open"), vec!["<p>open"]);
    }

    #[tokio::test]
    async fn fixed_chunks_restart_every_session() {
        let source = FixedChunks::new(["a", "b"]);
        let req = request("");
        let first: Vec<_> = source.chunks(&req).try_collect().await.unwrap();
        let second: Vec<_> = source.chunks(&req).try_collect().await.unwrap();
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn markup_blocks_follow_the_job_result() {
        let source = MarkupBlocks::new();
        let chunks: Vec<_> = source
            .chunks(&request("<p>x</p><p>y</p>"))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec!["<p>x</p>", "<p>y</p>"]);

        let no_result = ChunkRequest {
            job_id: JobId::new_v4(),
            result: None,
        };
        let chunks: Vec<_> = source.chunks(&no_result).try_collect().await.unwrap();
        assert!(chunks.is_empty());
    }
}
