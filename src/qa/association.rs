//! Best-effort association of a stored image with a person named in the question.
//!
//! This is an approximation: it never binds an image to a specific mention. When the question
//! names someone and the session's indexed text or tables mention that name, the session's first
//! stored image is offered. At most one image is ever returned.

use std::sync::LazyLock;

use regex::Regex;

use crate::artifact::{ArtifactKind, ImageData};
use crate::index::{DualStoreIndex, IndexError, SessionIndex};

const SEARCH_LIMIT: usize = 5;
const TEXTUAL_KINDS: [ArtifactKind; 2] = [ArtifactKind::Text, ArtifactKind::Table];

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?i:who is|about|regarding)|Dr\.|Mr\.|Mrs\.|Ms\.|Prof\.) ([A-Z][a-z]+ [A-Z][a-z]+)")
        .expect("name pattern compiles")
});

/// Two-word capitalized name following "who is", "about", "regarding", or an honorific.
pub fn extract_entity_name(question: &str) -> Option<&str> {
    NAME_PATTERN
        .captures(question)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
}

/// First stored image of the session when the named entity is mentioned in its indexed text
/// or tables. Image descriptions never count as a mention.
pub(crate) async fn associate_image(
    index: &DualStoreIndex,
    session: &SessionIndex,
    question: &str,
) -> Result<Option<ImageData>, IndexError> {
    let Some(name) = extract_entity_name(question) else {
        return Ok(None);
    };
    if !session.has_images() {
        tracing::debug!(session_id = session.session_id(), name, "No stored images to associate");
        return Ok(None);
    }

    let needle = name.to_lowercase();
    let mentioned = session.content().texts_mentioning(&needle) > 0
        || mentioned_in_summaries(index, session, &needle).await?;
    if !mentioned {
        tracing::debug!(session_id = session.session_id(), name, "Name not found in indexed text");
        return Ok(None);
    }
    tracing::debug!(session_id = session.session_id(), name, "Associating first stored image");
    Ok(session.images().into_iter().next())
}

/// Text and table summaries still carry the name when the content store was not restored.
async fn mentioned_in_summaries(
    index: &DualStoreIndex,
    session: &SessionIndex,
    needle: &str,
) -> Result<bool, IndexError> {
    for kind in TEXTUAL_KINDS {
        let hits = index
            .search_summaries(session, needle, SEARCH_LIMIT, Some(kind))
            .await?;
        let found = hits.iter().any(|hit| {
            hit.summary
                .as_deref()
                .is_some_and(|summary| summary.to_lowercase().contains(needle))
        });
        if found {
            return Ok(true);
        }
    }
    Ok(false)
}
