use crate::constants::MAX_BRANCH_SLUG_CHARS;

/// Converts free text into a branch-safe slug: lowercase, every run of
/// characters outside `[a-z0-9]` collapsed to a single hyphen, trimmed,
/// capped at 60 characters. Total and idempotent; an empty result is the
/// caller's validation problem.
pub(crate) fn sanitize_branch_name(description: &str) -> String {
    let mut slug = String::new();
    let mut pending_separator = false;
    for ch in description.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }
    cap_slug(slug)
}

/// `prefix/slug`, or the bare slug when the prefix is empty.
pub(crate) fn branch_name(prefix: &str, description: &str) -> String {
    let slug = sanitize_branch_name(description);
    if prefix.is_empty() {
        slug
    } else {
        format!("{prefix}/{slug}")
    }
}

/// `prefix/key-summary` with the 60-character cap applied to the combined
/// key+summary string, so the full ref name stays bounded no matter how long
/// the ticket summary is.
pub(crate) fn branch_name_from_ticket(prefix: &str, ticket_key: &str, summary: &str) -> String {
    let combined = format!(
        "{}-{}",
        sanitize_branch_name(ticket_key),
        sanitize_branch_name(summary)
    );
    let name = cap_slug(combined.trim_matches('-').to_string());
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

fn cap_slug(mut slug: String) -> String {
    // Slugs are pure ASCII, so byte truncation is character truncation.
    if slug.len() > MAX_BRANCH_SLUG_CHARS {
        slug.truncate(MAX_BRANCH_SLUG_CHARS);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}
