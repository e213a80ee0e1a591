//! Routing tag normalization
//!
//! Source systems decorate tags with a batch prefix (`B3_`, `В12_`) and a
//! variant suffix (`_new`, `_retarget`). The routing key is what remains:
//!
//! `"B1_[X8] Acme Corp_new"` → `"[X8] Acme Corp"`

use tracing::warn;

/// Canonical routing key for `raw`.
///
/// Applies the cleanup steps until the value stops changing, so the result
/// is a fixed point. If cleanup would leave nothing, `raw` is returned as is.
pub fn normalize_tag(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        if !raw.trim().is_empty() {
            warn!(tag = %raw, "Tag normalization produced an empty key, keeping original");
        }
        return raw.to_string();
    }

    current
}

/// One pass: trim, keep at most two `_` segments, drop batch prefixes, trim.
/// Never lengthens its input.
fn normalize_once(value: &str) -> String {
    let trimmed = value.trim();

    let mut parts = trimmed.splitn(3, '_');
    let head = match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), Some(_tail)) => &trimmed[..first.len() + 1 + second.len()],
        _ => trimmed,
    };

    let mut rest = head;
    while let Some(stripped) = strip_batch_prefix(rest) {
        rest = stripped.trim_start();
    }

    rest.trim().to_string()
}

/// `<letter><digits>_` at the start of `value` (any alphabet)
fn strip_batch_prefix(value: &str) -> Option<&str> {
    let mut chars = value.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_alphabetic() => {}
        _ => return None,
    }

    let mut saw_digit = false;
    for (idx, c) in chars {
        if c.is_ascii_digit() {
            saw_digit = true;
        } else if c == '_' && saw_digit {
            return Some(&value[idx + 1..]);
        } else {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_prefix_and_suffix() {
        assert_eq!(normalize_tag("B1_[X8] Acme Corp_new"), "[X8] Acme Corp");
        assert_eq!(normalize_tag("B3_[X1] Acme Corp_new"), "[X1] Acme Corp");
    }

    #[test]
    fn test_cyrillic_and_lowercase_prefix() {
        assert_eq!(normalize_tag("В2_[П8] Неометрия Ростов_new"), "[П8] Неометрия Ростов");
        assert_eq!(normalize_tag("b12_Acme"), "Acme");
    }

    #[test]
    fn test_keeps_first_two_segments() {
        assert_eq!(normalize_tag("Acme_Corp_new_old"), "Acme_Corp");
        assert_eq!(normalize_tag("Acme_Corp"), "Acme_Corp");
    }

    #[test]
    fn test_already_clean_tag_unchanged() {
        assert_eq!(normalize_tag("[X1] Acme"), "[X1] Acme");
        assert_eq!(normalize_tag("  [X1] Acme  "), "[X1] Acme");
    }

    #[test]
    fn test_prefix_requires_digits() {
        assert_eq!(normalize_tag("B_Acme"), "B_Acme");
        assert_eq!(normalize_tag("1B_Acme"), "1B_Acme");
    }

    #[test]
    fn test_suffix_dropped_before_prefix() {
        assert_eq!(normalize_tag("B2_[X1] Acme_new"), "[X1] Acme");
        assert_eq!(normalize_tag("B1_Acme_Corp_new"), "Acme");
        assert_eq!(normalize_tag("[X1] Acme_new"), "[X1] Acme_new");
    }

    #[test]
    fn test_fails_open_on_empty_result() {
        assert_eq!(normalize_tag("B1_"), "B1_");
        assert_eq!(normalize_tag(""), "");
        assert_eq!(normalize_tag("   "), "   ");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "B1_[X8] Acme Corp_new",
            "В2_Z3_foo_bar_baz",
            "A_B1_C_D",
            "_B1_C_D",
            "Q_W3_Z_k",
            "B1_",
            "x9_  y7_ z_",
            "plain",
            "  spaced _ parts _ here ",
            "",
        ];
        for sample in samples {
            let once = normalize_tag(sample);
            assert_eq!(normalize_tag(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
