//! Group raw partitioner elements into text blocks, isolated tables, and images.
//!
//! Text elements fill a section until the soft bound (`new_after_n_chars`) is reached or the
//! next element would exceed the hard bound (`max_characters`). Elements longer than the hard
//! bound are split on whitespace. With `by_title`, a title closes the open section and adjacent
//! sections shorter than `combine_text_under_n_chars` are merged afterwards. Tables always close
//! the open section. Images are emitted right after the section they appeared in.

use super::{ContentElement, ElementCategory, ElementPosition, RawElement};
use crate::artifact::{Artifact, ImageData};

const SEPARATOR: &str = "\n\n";
const SEPARATOR_LEN: usize = 2;

/// Size bounds applied while chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingOptions {
    /// Titles start new sections and small sections are combined.
    pub by_title: bool,
    /// Hard upper bound in characters.
    pub max_characters: usize,
    /// Soft bound after which no further elements are appended.
    pub new_after_n_chars: usize,
    /// Sections shorter than this absorb their successor when it fits.
    pub combine_text_under_n_chars: usize,
}

#[derive(Debug, Default)]
struct Section {
    parts: Vec<String>,
    len: usize,
    page_number: Option<u32>,
}

impl Section {
    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn push(&mut self, piece: String, page_number: Option<u32>) {
        let piece_len = piece.chars().count();
        self.len += if self.parts.is_empty() {
            piece_len
        } else {
            SEPARATOR_LEN + piece_len
        };
        if self.page_number.is_none() {
            self.page_number = page_number;
        }
        self.parts.push(piece);
    }

    fn absorb(&mut self, other: Section) {
        self.len += SEPARATOR_LEN + other.len;
        if self.page_number.is_none() {
            self.page_number = other.page_number;
        }
        self.parts.extend(other.parts);
    }
}

enum Block {
    Section(Section),
    Table(String, Option<u32>),
    Image(ImageData, Option<u32>),
}

struct Builder {
    blocks: Vec<Block>,
    current: Section,
    pending_images: Vec<(ImageData, Option<u32>)>,
}

impl Builder {
    fn flush(&mut self) {
        let section = std::mem::take(&mut self.current);
        if !section.is_empty() {
            self.blocks.push(Block::Section(section));
        }
        for (image, page) in self.pending_images.drain(..) {
            self.blocks.push(Block::Image(image, page));
        }
    }
}

/// Chunk raw elements into ordered content artifacts.
pub fn chunk_elements(
    elements: Vec<RawElement>,
    infer_table_structure: bool,
    options: &ChunkingOptions,
) -> Vec<ContentElement> {
    let mut builder = Builder {
        blocks: Vec::new(),
        current: Section::default(),
        pending_images: Vec::new(),
    };

    for element in elements {
        match element.category {
            ElementCategory::Title | ElementCategory::Text => {
                let text = element.text.trim();
                if text.is_empty() {
                    continue;
                }
                if options.by_title
                    && element.category == ElementCategory::Title
                    && !builder.current.is_empty()
                {
                    builder.flush();
                }
                for piece in split_oversized(text, options.max_characters) {
                    let piece_len = piece.chars().count();
                    let current = &builder.current;
                    if !current.is_empty()
                        && (current.len >= options.new_after_n_chars
                            || current.len + SEPARATOR_LEN + piece_len > options.max_characters)
                    {
                        builder.flush();
                    }
                    builder.current.push(piece, element.page_number);
                }
            }
            ElementCategory::Table => {
                builder.flush();
                let payload = match element.html {
                    Some(html) if infer_table_structure && !html.trim().is_empty() => html,
                    _ => element.text,
                };
                if payload.trim().is_empty() {
                    continue;
                }
                builder
                    .blocks
                    .push(Block::Table(payload, element.page_number));
            }
            ElementCategory::Image => match element.image {
                Some(image) if !image.is_empty() => {
                    builder.pending_images.push((image, element.page_number));
                }
                _ => tracing::debug!(
                    page = ?element.page_number,
                    "Image element without payload skipped"
                ),
            },
        }
    }
    builder.flush();

    let blocks = if options.by_title {
        combine_small_sections(builder.blocks, options)
    } else {
        builder.blocks
    };

    blocks
        .into_iter()
        .enumerate()
        .map(|(index, block)| {
            let (artifact, page_number) = match block {
                Block::Section(section) => {
                    (Artifact::Text(section.parts.join(SEPARATOR)), section.page_number)
                }
                Block::Table(payload, page) => (Artifact::Table(payload), page),
                Block::Image(image, page) => (Artifact::Image(image), page),
            };
            ContentElement {
                artifact,
                position: ElementPosition { index, page_number },
            }
        })
        .collect()
}

/// Merge each section into the preceding one while that one is still under the combine
/// threshold and the result fits the hard bound. Images between sections do not block merging;
/// tables do.
fn combine_small_sections(blocks: Vec<Block>, options: &ChunkingOptions) -> Vec<Block> {
    let mut combined: Vec<Block> = Vec::with_capacity(blocks.len());

    for block in blocks {
        let Block::Section(section) = block else {
            combined.push(block);
            continue;
        };

        let target = combined
            .iter()
            .rposition(|candidate| !matches!(candidate, Block::Image(..)));
        if let Some(Block::Section(previous)) = target.map(|index| &mut combined[index]) {
            if previous.len < options.combine_text_under_n_chars
                && previous.len + SEPARATOR_LEN + section.len <= options.max_characters
            {
                previous.absorb(section);
                continue;
            }
        }
        combined.push(Block::Section(section));
    }

    combined
}

/// Split text longer than `max` characters on whitespace; single words longer than `max` are
/// split on character boundaries.
fn split_oversized(text: &str, max: usize) -> Vec<String> {
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(max).map(|chunk| chunk.iter().collect::<String>()));
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len > max {
            pieces.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        } else {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;

    fn options(by_title: bool) -> ChunkingOptions {
        ChunkingOptions {
            by_title,
            max_characters: 50,
            new_after_n_chars: 40,
            combine_text_under_n_chars: 0,
        }
    }

    fn title(text: &str) -> RawElement {
        RawElement::text(ElementCategory::Title, text, Some(1))
    }

    fn narrative(text: &str) -> RawElement {
        RawElement::text(ElementCategory::Text, text, Some(1))
    }

    fn texts(elements: &[ContentElement]) -> Vec<&str> {
        elements
            .iter()
            .filter_map(|element| match &element.artifact {
                Artifact::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn titles_start_new_sections() {
        let elements = vec![
            title("Intro"),
            narrative("Alpha text."),
            title("Methods"),
            narrative("Beta text."),
        ];
        let chunks = chunk_elements(elements, true, &options(true));
        assert_eq!(
            texts(&chunks),
            vec!["Intro\n\nAlpha text.", "Methods\n\nBeta text."]
        );
    }

    #[test]
    fn default_strategy_ignores_titles() {
        let elements = vec![title("Intro"), narrative("Alpha."), title("Next")];
        let chunks = chunk_elements(elements, true, &options(false));
        assert_eq!(texts(&chunks), vec!["Intro\n\nAlpha.\n\nNext"]);
    }

    #[test]
    fn small_sections_are_combined() {
        let mut opts = options(true);
        opts.combine_text_under_n_chars = 20;
        let elements = vec![title("A"), title("B"), title("C"), narrative("Body")];
        let chunks = chunk_elements(elements, true, &opts);
        assert_eq!(texts(&chunks), vec!["A\n\nB\n\nC\n\nBody"]);
    }

    #[test]
    fn oversized_elements_respect_hard_bound() {
        let long = "word ".repeat(40);
        let chunks = chunk_elements(vec![narrative(&long)], true, &options(true));
        assert!(chunks.len() > 1);
        for text in texts(&chunks) {
            assert!(text.chars().count() <= 50, "chunk too long: {}", text.len());
        }
    }

    #[test]
    fn soft_bound_closes_section() {
        let elements = vec![
            narrative(&"a".repeat(41)),
            narrative("tail"),
        ];
        let chunks = chunk_elements(elements, true, &options(false));
        assert_eq!(texts(&chunks).len(), 2);
    }

    #[test]
    fn tables_are_isolated_and_prefer_html() {
        let table = RawElement {
            category: ElementCategory::Table,
            text: "a b".into(),
            html: Some("<table><tr><td>a</td></tr></table>".into()),
            image: None,
            page_number: Some(2),
        };
        let elements = vec![narrative("Before."), table.clone(), narrative("After.")];
        let chunks = chunk_elements(elements, true, &options(false));
        let kinds: Vec<_> = chunks.iter().map(|c| c.artifact.kind()).collect();
        assert_eq!(
            kinds,
            vec![ArtifactKind::Text, ArtifactKind::Table, ArtifactKind::Text]
        );
        assert_eq!(chunks[1].artifact.as_text(), Some("<table><tr><td>a</td></tr></table>"));
        assert_eq!(chunks[1].position.page_number, Some(2));

        let plain = chunk_elements(vec![table], false, &options(false));
        assert_eq!(plain[0].artifact.as_text(), Some("a b"));
    }

    #[test]
    fn images_follow_their_section() {
        let image = RawElement {
            category: ElementCategory::Image,
            text: String::new(),
            html: None,
            image: Some(ImageData::new(vec![1, 2, 3])),
            page_number: Some(1),
        };
        let elements = vec![narrative("Figure intro."), image, narrative("More text.")];
        let chunks = chunk_elements(elements, true, &options(false));
        let kinds: Vec<_> = chunks.iter().map(|c| c.artifact.kind()).collect();
        assert_eq!(kinds, vec![ArtifactKind::Text, ArtifactKind::Image]);
        assert_eq!(chunks[1].position.index, 1);
    }

    #[test]
    fn split_oversized_breaks_long_words() {
        let pieces = split_oversized(&"x".repeat(25), 10);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[2], "xxxxx");
    }
}
