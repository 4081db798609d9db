//! Callback data carried by feedback buttons.
//!
//! Format: `btn;<kind code>;<article id>`, e.g. `btn;0;42` for a like on
//! article 42.

use crate::store::ReactionKind;

/// Prefix of feedback button callback data.
pub const CALLBACK_PREFIX: &str = "btn";

/// Build the callback data for a feedback button.
pub fn encode_callback_data(kind: ReactionKind, article_id: i64) -> String {
    format!("{};{};{}", CALLBACK_PREFIX, kind.code(), article_id)
}

/// Parse feedback button callback data.
///
/// Returns `None` for anything that isn't a well-formed feedback payload.
pub fn parse_callback_data(data: &str) -> Option<(ReactionKind, i64)> {
    let mut parts = data.split(';');
    if parts.next()? != CALLBACK_PREFIX {
        return None;
    }
    let kind = ReactionKind::from_code(parts.next()?.parse().ok()?)?;
    let article_id = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((kind, article_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode_callback_data(ReactionKind::Like, 42), "btn;0;42");
        assert_eq!(encode_callback_data(ReactionKind::Dislike, 7), "btn;1;7");
    }

    #[test]
    fn test_parse_valid() {
        assert_eq!(
            parse_callback_data("btn;0;42"),
            Some((ReactionKind::Like, 42))
        );
        assert_eq!(
            parse_callback_data("btn;1;9000"),
            Some((ReactionKind::Dislike, 9000))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for data in [
            "",
            "btn",
            "btn;0",
            "btn;2;42",
            "btn;x;42",
            "btn;0;abc",
            "btn;0;42;extra",
            "other;0;42",
        ] {
            assert_eq!(parse_callback_data(data), None, "accepted {data:?}");
        }
    }
}
