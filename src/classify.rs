use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::ocr::TextExtractor;
use crate::reddit::Submission;

/// Stored as the body when an image post yields no text.
pub const IMAGE_PLACEHOLDER: &str = "[Image] Unable to extract text from image.";

static IMAGE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|bmp|tiff|webp)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Image,
    Link,
}

pub fn is_image_url(url: &str) -> bool {
    IMAGE_URL_RE.is_match(url)
}

pub fn kind_of(submission: &Submission) -> ContentKind {
    if submission.is_self {
        ContentKind::Text
    } else if is_image_url(&submission.url) {
        ContentKind::Image
    } else {
        ContentKind::Link
    }
}

/// Resolve a submission's body text.
///
/// Image posts go through OCR; any failure there is logged and yields `""`.
/// Everything that is neither text nor image falls back to the raw URL.
pub async fn classify<X: TextExtractor + ?Sized>(submission: &Submission, extractor: &X) -> String {
    match kind_of(submission) {
        ContentKind::Text => {
            info!("Text post found: {}", submission.title);
            submission.selftext.clone()
        }
        ContentKind::Image => {
            info!("Image post found: {}", submission.url);
            match extractor.extract(&submission.url).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Error processing image from {}: {}", submission.url, e);
                    String::new()
                }
            }
        }
        ContentKind::Link => {
            info!("Non-text, non-image post found: {}", submission.url);
            submission.url.clone()
        }
    }
}
