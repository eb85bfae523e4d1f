//! Slug generation and path normalization.

/// Longest slug [`slugify`] produces.
pub const MAX_SLUG_LEN: usize = 128;

/// Convert text into a URL slug.
///
/// Lowercases, replaces anything that isn't an ASCII letter or digit with a
/// hyphen, collapses repeated hyphens, trims them from both ends, and
/// truncates on a word boundary.
pub fn slugify(text: &str) -> String {
    let slug: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    // Collapse consecutive hyphens and trim
    let mut result = String::with_capacity(slug.len());
    let mut prev_was_hyphen = true;
    for c in slug.chars() {
        if c == '-' {
            if !prev_was_hyphen {
                result.push('-');
            }
            prev_was_hyphen = true;
        } else {
            result.push(c);
            prev_was_hyphen = false;
        }
    }
    while result.ends_with('-') {
        result.pop();
    }

    if result.len() > MAX_SLUG_LEN {
        // ASCII only at this point, so byte indices are char boundaries.
        let truncated = &result[..MAX_SLUG_LEN];
        return match truncated.rfind('-') {
            Some(last_hyphen) => truncated[..last_hyphen].to_string(),
            None => truncated.to_string(),
        };
    }

    result
}

/// Whether `slug` can be used as a single path segment.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Normalize a request path into permalink-table form.
///
/// Percent-decodes, drops any query string or fragment, lowercases, collapses
/// repeated slashes, and yields a leading slash with no trailing slash.
pub fn normalize_path(raw: &str) -> String {
    let raw = raw.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(raw)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    let segments: Vec<&str> = decoded.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/")).to_lowercase()
}

/// Append a slug to a parent path.
pub fn join_path(parent: Option<&str>, slug: &str) -> String {
    match parent {
        Some(p) if p != "/" => format!("{p}/{slug}"),
        _ => format!("/{slug}"),
    }
}
