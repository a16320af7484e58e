use crate::note::{Note, PINNED};

/// Characters dropped from tags: they break markup display, and the sync
/// service rejects whitespace inside tags.
const UNSAFE_TAG_CHARS: &[char] = &['<', '>', '&', '"', '\''];

/// Turn comma-separated tag text into a clean tag list.
///
/// Sanitising the comma-joined output again yields the same list.
pub fn sanitise_tags(tags: &str) -> Vec<String> {
    let cleaned: String = tags
        .chars()
        .filter(|c| !c.is_whitespace() && !UNSAFE_TAG_CHARS.contains(c))
        .collect();
    cleaned
        .split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comma-joined tags as shown in the list and the tags field.
pub fn tags_display(tags: &[String]) -> String {
    sanitise_tags(&tags.join(", ")).join(", ")
}

pub fn note_pinned(note: &Note) -> bool {
    note.systemtags.iter().any(|t| t == PINNED)
}

/// Add or remove the `pinned` system tag. Returns whether anything changed.
pub fn set_pinned(note: &mut Note, pinned: bool) -> bool {
    let current = note_pinned(note);
    if current == pinned {
        return false;
    }
    if pinned {
        note.systemtags.push(PINNED.to_string());
    } else {
        note.systemtags.retain(|t| t != PINNED);
    }
    true
}

/// Case-insensitive prefix match of `wanted` against any tag on the note.
pub fn note_has_tag_prefix(note: &Note, wanted: &str) -> bool {
    let wanted = wanted.to_lowercase();
    note.tags.iter().any(|t| t.to_lowercase().starts_with(&wanted))
}

/// Hash a tag for deterministic color selection
pub fn hash_tag(tag: &str) -> u64 {
    let mut h: u64 = 5381;
    for b in tag.bytes() {
        h = (h.wrapping_shl(5)).wrapping_add(h) ^ u64::from(b);
    }
    h
}

/// Terminal color for a tag, stable across runs.
pub fn color_for_tag(tag: &str) -> (u8, u8, u8) {
    const PALETTE: &[(u8, u8, u8)] = &[
        (137, 180, 250),
        (166, 227, 161),
        (249, 226, 175),
        (245, 194, 231),
        (255, 169, 167),
        (148, 226, 213),
        (198, 160, 246),
        (240, 198, 198),
        (181, 232, 224),
        (183, 189, 248),
        (255, 214, 165),
        (196, 222, 255),
    ];
    PALETTE[(hash_tag(tag) as usize) % PALETTE.len()]
}
