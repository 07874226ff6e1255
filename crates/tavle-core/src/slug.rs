//! URL-safe slug derivation from event titles.

/// Derive a URL-safe slug from a title.
///
/// Lowercases, folds the Norwegian letters æ/ø/å (and a few common
/// diacritics) to ASCII, collapses every other non-alphanumeric run into a
/// single dash, and trims leading/trailing dashes.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        let mapped: &str = match c.to_lowercase().next().unwrap_or(c) {
            'æ' => "ae",
            'ø' => "o",
            'å' => "a",
            'ä' => "a",
            'ö' => "o",
            'ü' => "u",
            'é' | 'è' | 'ê' => "e",
            c if c.is_ascii_alphanumeric() => {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
                continue;
            }
            _ => {
                pending_dash = true;
                continue;
            }
        };
        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;
        out.push_str(mapped);
    }

    out
}
