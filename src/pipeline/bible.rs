//! Character bible and reference image.
//!
//! Both are best-effort: a failed bible yields an empty one, an empty bible
//! skips the reference image, and a failed reference image leaves page
//! illustrations without an anchor. None of these ever stop a compilation.

use crate::error::StageError;
use crate::model::ChapterText;
use crate::pipeline::postprocess::clean_prose;
use crate::prompts::{bible_user_message, reference_image_prompt, CHARACTER_BIBLE_SYSTEM_PROMPT};
use crate::services::{ImageGenerator, ImageRequest, TextGenerator, TextRequest};
use tracing::{info, warn};

/// Visual continuity material shared by every page illustration.
#[derive(Debug, Clone, Default)]
pub struct VisualAnchor {
    /// Free-text description of recurring characters and settings; may be empty.
    pub character_bible: String,
    /// Encoded reference illustration, if one was produced.
    pub reference_image: Option<Vec<u8>>,
}

impl VisualAnchor {
    pub fn bible(&self) -> Option<&str> {
        Some(self.character_bible.as_str()).filter(|b| !b.is_empty())
    }
}

/// Derive the character bible from every chapter's resolved text.
pub async fn generate_character_bible(
    generator: &dyn TextGenerator,
    chapters: &[ChapterText],
) -> Result<String, StageError> {
    let request = TextRequest::new(CHARACTER_BIBLE_SYSTEM_PROMPT, bible_user_message(chapters));
    match generator.generate(request).await {
        Ok(reply) => {
            let bible = clean_prose(&reply);
            info!("Character bible: {} chars", bible.chars().count());
            Ok(bible)
        }
        Err(e) => {
            warn!("Character bible generation failed, continuing without: {}", e);
            Err(StageError::BibleFailed {
                detail: e.to_string(),
            })
        }
    }
}

/// Produce the reference illustration for a non-empty bible.
pub async fn generate_reference_image(
    generator: &dyn ImageGenerator,
    character_bible: &str,
    style: &str,
    model: &str,
    size: &str,
) -> Result<Vec<u8>, StageError> {
    let prompt = reference_image_prompt(character_bible);
    let request = ImageRequest {
        prompt: &prompt,
        style,
        model,
        size,
        character_bible: Some(character_bible),
        reference_image: None,
    };
    match generator.generate(request).await {
        Ok(bytes) => {
            info!("Reference image: {} bytes", bytes.len());
            Ok(bytes)
        }
        Err(e) => {
            warn!("Reference image generation failed, continuing without: {}", e);
            Err(StageError::ReferenceImageFailed {
                detail: e.to_string(),
            })
        }
    }
}

/// Run both steps, collecting degradations into `warnings`.
pub async fn build_visual_anchor(
    text: &dyn TextGenerator,
    images: &dyn ImageGenerator,
    chapters: &[ChapterText],
    style: &str,
    model: &str,
    size: &str,
    warnings: &mut Vec<StageError>,
) -> VisualAnchor {
    let character_bible = match generate_character_bible(text, chapters).await {
        Ok(bible) => bible,
        Err(e) => {
            warnings.push(e);
            String::new()
        }
    };

    if character_bible.is_empty() {
        info!("No character bible; skipping reference image");
        return VisualAnchor::default();
    }

    let reference_image =
        match generate_reference_image(images, &character_bible, style, model, size).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warnings.push(e);
                None
            }
        };

    VisualAnchor {
        character_bible,
        reference_image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Text(Result<String, ServiceError>);

    #[async_trait]
    impl TextGenerator for Text {
        async fn generate(&self, _request: TextRequest) -> Result<String, ServiceError> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Images {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ImageGenerator for Images {
        async fn generate(&self, request: ImageRequest<'_>) -> Result<Vec<u8>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.character_bible.is_some());
            if self.fail {
                Err(ServiceError::Request("boom".into()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    fn chapters() -> Vec<ChapterText> {
        vec![ChapterText {
            chapter_number: 1,
            content: "Pip the mouse wore a blue scarf.".into(),
        }]
    }

    #[tokio::test]
    async fn full_anchor_on_success() {
        let images = Images::default();
        let mut warnings = Vec::new();
        let anchor = build_visual_anchor(
            &Text(Ok("Pip: small grey mouse, blue scarf".into())),
            &images,
            &chapters(),
            "watercolor",
            "gpt-image-1",
            "1024x1024",
            &mut warnings,
        )
        .await;
        assert_eq!(anchor.bible(), Some("Pip: small grey mouse, blue scarf"));
        assert_eq!(anchor.reference_image, Some(vec![1, 2, 3]));
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn bible_failure_skips_reference_image() {
        let images = Images::default();
        let mut warnings = Vec::new();
        let anchor = build_visual_anchor(
            &Text(Err(ServiceError::Timeout { secs: 5 })),
            &images,
            &chapters(),
            "watercolor",
            "gpt-image-1",
            "1024x1024",
            &mut warnings,
        )
        .await;
        assert!(anchor.bible().is_none());
        assert!(anchor.reference_image.is_none());
        assert_eq!(images.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(warnings[0], StageError::BibleFailed { .. }));
    }

    #[tokio::test]
    async fn reference_failure_keeps_bible() {
        let images = Images {
            fail: true,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let anchor = build_visual_anchor(
            &Text(Ok("Pip".into())),
            &images,
            &chapters(),
            "watercolor",
            "gpt-image-1",
            "1024x1024",
            &mut warnings,
        )
        .await;
        assert_eq!(anchor.bible(), Some("Pip"));
        assert!(anchor.reference_image.is_none());
        assert!(matches!(warnings[0], StageError::ReferenceImageFailed { .. }));
    }
}
