//! Prompts for the text and image models.
//!
//! Every instruction sent to a model lives here, so prompt changes never
//! touch retry, validation, or layout code, and unit tests can inspect the
//! prompts directly.

use crate::model::ChapterText;

/// System instruction for the character bible call.
pub const CHARACTER_BIBLE_SYSTEM_PROMPT: &str = r#"You are an art director preparing a children's picture book for illustration.

Read the full story and write a CHARACTER BIBLE that keeps every illustration visually consistent.

For each recurring character:
- Name (or role if unnamed) and species
- Age impression, size, and body shape
- Hair / fur / feathers: colour and style
- Clothing and accessories that stay the same across scenes
- One or two distinctive features an illustrator must never forget

Then describe the recurring SETTINGS (places, time of day, weather) and the overall mood.

Rules:
- Only describe characters and places that actually appear in the story
- Do NOT invent new characters
- Plain prose and short bullet lists only; no headings, no commentary
- Stay under 350 words"#;

/// System instruction for splitting one chapter into picture-book pages.
///
/// The placeholder `{pages}` is replaced with the chapter's page budget.
const PAGINATION_SYSTEM_PROMPT: &str = r#"You split the text of a spoken bedtime story into picture-book pages.

Split the chapter into about {pages} pages.

PAGE TEXT RULES
1. Each page holds 1 to 3 sentences and at most 40 words.
2. Break only at natural spoken pauses (sentence ends, or clause boundaries in very long sentences).
3. Copy the text EXACTLY. Concatenating every page's "content" in order must reproduce the chapter word for word.
   - Do not rewrite, summarise, correct, reorder, or omit anything.
   - Do not add any words, titles, or narration.

ILLUSTRATION PROMPT RULES
4. For every page write a concise visual scene description ("illustrationPrompt") of what that page's text shows.
5. Mention only characters, objects, and places explicitly present in the story text. Never invent characters.
6. Describe the scene only; no art-style words, no text or lettering in the image.

OUTPUT
Respond with JSON only, no code fences, exactly in this shape:
{"pages":[{"content":"...","illustrationPrompt":"..."}]}"#;

/// Render the pagination instruction for a chapter with `target_pages` pages.
pub fn pagination_system_prompt(target_pages: usize) -> String {
    PAGINATION_SYSTEM_PROMPT.replace("{pages}", &target_pages.to_string())
}

/// User message for the character bible call: every chapter, in order.
pub fn bible_user_message(chapters: &[ChapterText]) -> String {
    chapters
        .iter()
        .map(|c| format!("Chapter {}:\n{}", c.chapter_number, c.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt for the single reference illustration that anchors every page.
pub fn reference_image_prompt(character_bible: &str) -> String {
    format!(
        "Character reference sheet for a children's picture book. Show every main character \
         described below standing side by side on a plain light background, full body, \
         facing the viewer.\n\n{}",
        character_bible.trim()
    )
}

/// Scene prompt for one page.
pub fn page_illustration_prompt(scene: &str, chapter_number: u32) -> String {
    format!(
        "Picture-book page illustration from chapter {}. Scene: {}",
        chapter_number,
        scene.trim()
    )
}

/// Final prompt text sent to the image model: scene, style, and character bible.
pub fn illustration_prompt_with_bible(prompt: &str, style: &str, character_bible: Option<&str>) -> String {
    let mut out = format!("{}\n\nArt style: {}", prompt.trim(), style.trim());
    if let Some(bible) = character_bible.map(str::trim).filter(|b| !b.is_empty()) {
        out.push_str("\n\nKeep characters consistent with this character bible:\n");
        out.push_str(bible);
    }
    out.push_str("\n\nDo not draw any text, letters, or words in the image.");
    out
}

/// Illustration prompt for a chapter whose pagination fell back to one page:
/// the first `max_chars` characters of the text.
pub fn fallback_illustration_prompt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let prefix: String = trimmed.chars().take(max_chars).collect();
    if prefix.len() < trimmed.len() {
        format!("{}…", prefix.trim_end())
    } else {
        prefix
    }
}
