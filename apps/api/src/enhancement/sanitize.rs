//! Post-processing applied to enhancer output before it reaches the reconciler.
//!
//! The service is told not to use bullet characters and not to invent ids. These
//! helpers enforce both so a disobedient reply degrades into a smaller update instead
//! of a corrupted document.

use std::collections::HashSet;

use tracing::warn;

use crate::models::update::DescriptionUpdate;

const BULLET_MARKERS: &[char] = &['•', '◦', '▪', '▫', '●', '○', '■', '□', '‣', '⁃', '-', '*', '–', '—'];

/// Removes leading list markers ("• ", "- ", "* ", "1. ", "2) ") from one line.
pub fn strip_bullet_marker(line: &str) -> &str {
    let trimmed = line.trim_start();

    if let Some(rest) = trimmed.strip_prefix(BULLET_MARKERS) {
        // Only a marker when followed by whitespace: keeps "-20% churn" and "*nix" intact.
        if rest.starts_with(char::is_whitespace) {
            return rest.trim_start();
        }
        return trimmed;
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && digits <= 2 {
        let rest = &trimmed[digits..];
        if let Some(after) = rest.strip_prefix(['.', ')']) {
            if after.starts_with(char::is_whitespace) {
                return after.trim_start();
            }
        }
    }

    trimmed
}

/// Strips list markers from every line, trims each line and drops blank lines.
pub fn normalize_description(text: &str) -> String {
    text.lines()
        .map(|line| strip_bullet_marker(line).trim_end())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A whitespace-delimited token made only of list-marker characters, e.g. the inline
/// "•" in "Rust • Go".
fn is_marker_token(token: &str) -> bool {
    token.chars().all(|c| BULLET_MARKERS.contains(&c))
}

/// Flattens the text onto one line, drops list markers (leading or inline) and keeps at
/// most `max_words` words.
pub fn cap_words(text: &str, max_words: usize) -> String {
    text.lines()
        .map(strip_bullet_marker)
        .flat_map(str::split_whitespace)
        .filter(|token| !is_marker_token(token))
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps description updates whose id was part of the stage's input, with a non-blank
/// normalized description. Every dropped entry is logged.
pub fn retain_known_descriptions(
    stage: &str,
    updates: Vec<DescriptionUpdate>,
    known_ids: &HashSet<&str>,
) -> Vec<DescriptionUpdate> {
    updates
        .into_iter()
        .filter_map(|update| {
            if !known_ids.contains(update.id.as_str()) {
                warn!("{stage}: dropping update for unknown id '{}'", update.id);
                return None;
            }
            let description = normalize_description(&update.description);
            if description.is_empty() {
                warn!("{stage}: dropping blank description for id '{}'", update.id);
                return None;
            }
            Some(DescriptionUpdate {
                id: update.id,
                description,
            })
        })
        .collect()
}
