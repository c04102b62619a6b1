//! Post-processing: deterministic cleanup of model-generated text.
//!
//! Even well-prompted models wrap JSON in ```` ```json ```` fences, prepend a
//! sentence of chatter, or sprinkle zero-width characters into copied text.
//! These rules repair the envelope without touching the content, so the
//! strict checks in [`crate::pipeline::paginate`] judge what the model meant
//! to say rather than how it formatted it.
//!
//! ## Whitespace canonical form
//!
//! Content preservation is checked on the *whitespace-canonical* form of the
//! text: invisible characters removed, line endings normalised, every run of
//! whitespace collapsed to a single space, ends trimmed. Fragments are
//! compared after joining them with a single space. Anything else (a changed
//! word, a dropped comma, a swapped sentence) is a mismatch.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*)\n```\s*$").unwrap());

pub fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.trim().to_string()
    }
}

// ── Rule 2: Isolate the JSON object ──────────────────────────────────────────

/// Cut everything before the first `{` and after the last `}`.
///
/// Returns the input unchanged when no braces are present so the JSON
/// parser reports the real problem.
pub fn isolate_json_object(input: &str) -> &str {
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if start < end => &input[start..=end],
        _ => input,
    }
}

/// Fence stripping + object isolation, the full envelope repair for JSON replies.
pub fn clean_json_reply(input: &str) -> String {
    let unfenced = strip_code_fences(input);
    isolate_json_object(&unfenced).to_string()
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

pub fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Whitespace canonical form ────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn canonical_whitespace(input: &str) -> String {
    let visible = remove_invisible_chars(input);
    RE_WHITESPACE.replace_all(visible.trim(), " ").into_owned()
}

/// `true` when `fragments`, joined in order, reproduce `source` exactly in
/// whitespace-canonical form.
pub fn fragments_reconstruct<S: AsRef<str>>(source: &str, fragments: &[S]) -> bool {
    let joined = fragments
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    canonical_whitespace(&joined) == canonical_whitespace(source)
}

/// Cleanup for free-text replies (the character bible).
pub fn clean_prose(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = remove_invisible_chars(&s);
    s.replace("\r\n", "\n").trim().to_string()
}
