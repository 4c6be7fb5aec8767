use std::collections::HashSet;

use crate::engine::types::WebhookData;

/// Replace `[KEY]` placeholders with values from webhook data.
///
/// Keys are matched in their upper-cased form, so `{"name": "Ann"}` fills
/// `[NAME]`. Matching is on the literal `[KEY]` text, so keys may contain
/// brackets themselves; where several keys fit at one position the longest
/// wins. Placeholders without a (non-empty) value stay as written, and
/// substituted values are never scanned again. With no data the text is
/// returned unchanged.
pub fn resolve_placeholders(text: &str, data: Option<&WebhookData>) -> String {
    let Some(data) = data else {
        return text.to_string();
    };
    let table = placeholder_table(data);
    if table.is_empty() {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        result.push_str(&rest[..open]);
        rest = &rest[open..];

        match match_placeholder(rest, &table) {
            Some((value, len)) => {
                result.push_str(value);
                rest = &rest[len..];
            }
            None => {
                result.push('[');
                rest = &rest[1..];
            }
        }
    }

    result.push_str(rest);
    result
}

/// `rest` starts with `[`. Returns the value and byte length of the first
/// `[KEY]` in `table` that `rest` begins with.
fn match_placeholder<'a>(rest: &str, table: &[(String, &'a str)]) -> Option<(&'a str, usize)> {
    let body = &rest[1..];
    table.iter().find_map(|(key, value)| {
        body.strip_prefix(key.as_str())
            .filter(|tail| tail.starts_with(']'))
            .map(|_| (*value, key.len() + 2))
    })
}

/// Upper-cased placeholder names with their values, longest name first.
/// Empty keys and empty values are left out; on an upper-casing collision
/// the first key in order wins.
fn placeholder_table(data: &WebhookData) -> Vec<(String, &str)> {
    let mut seen = HashSet::with_capacity(data.len());
    let mut table = Vec::with_capacity(data.len());
    for (key, value) in data {
        let key = key.to_uppercase();
        if key.is_empty() || value.is_empty() || !seen.insert(key.clone()) {
            continue;
        }
        table.push((key, value.as_str()));
    }
    table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> WebhookData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_substitution() {
        let d = data(&[("name", "Ann")]);
        assert_eq!(resolve_placeholders("Hello [NAME]", Some(&d)), "Hello Ann");
    }

    #[test]
    fn test_missing_key_left_untouched() {
        let d = data(&[]);
        assert_eq!(resolve_placeholders("Hello [NAME]", Some(&d)), "Hello [NAME]");

        let d = data(&[("company", "Acme")]);
        assert_eq!(
            resolve_placeholders("Hello [NAME] from [COMPANY]", Some(&d)),
            "Hello [NAME] from Acme"
        );
    }

    #[test]
    fn test_no_data_is_identity() {
        assert_eq!(resolve_placeholders("Hello [NAME]", None), "Hello [NAME]");
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let d = data(&[("name", "Ann")]);
        assert_eq!(
            resolve_placeholders("[NAME], yes, [NAME]!", Some(&d)),
            "Ann, yes, Ann!"
        );
    }

    #[test]
    fn test_values_are_not_resolved_again() {
        let d = data(&[("a", "[B]"), ("b", "bee")]);
        assert_eq!(resolve_placeholders("[A] [B]", Some(&d)), "[B] bee");
    }

    #[test]
    fn test_empty_value_keeps_placeholder() {
        let d = data(&[("name", "")]);
        assert_eq!(resolve_placeholders("Hi [NAME]", Some(&d)), "Hi [NAME]");
    }

    #[test]
    fn test_non_latin_keys() {
        let d = data(&[("имя", "Анна")]);
        assert_eq!(resolve_placeholders("Привет, [ИМЯ]", Some(&d)), "Привет, Анна");
    }

    #[test]
    fn test_lowercase_placeholder_not_matched() {
        let d = data(&[("name", "Ann")]);
        assert_eq!(resolve_placeholders("Hello [name]", Some(&d)), "Hello [name]");
    }

    #[test]
    fn test_nested_and_unclosed_brackets() {
        let d = data(&[("name", "Ann")]);
        assert_eq!(resolve_placeholders("[[NAME]]", Some(&d)), "[Ann]");
        assert_eq!(resolve_placeholders("[NAME", Some(&d)), "[NAME");
    }

    #[test]
    fn test_keys_with_brackets() {
        let d = data(&[("a]b", "x"), ("list[0]", "first")]);
        assert_eq!(resolve_placeholders("[A]B] and [LIST[0]]", Some(&d)), "x and first");
    }

    #[test]
    fn test_longest_key_wins() {
        let d = data(&[("a", "short"), ("a]", "long")]);
        assert_eq!(resolve_placeholders("[A]]", Some(&d)), "long");
        assert_eq!(resolve_placeholders("[A] ", Some(&d)), "short ");
    }
}
