//! Percent-decoding helpers shared by the HTTP adapter and the broker URL.

use url::form_urlencoded;

/// Decodes `%XX` escapes.  `+` is left alone (it is only a space inside
/// query strings).  Invalid UTF-8 is replaced with U+FFFD.
pub fn percent_decode(s: &str) -> String {
    // `form_urlencoded` also turns `+` into a space and splits on `&`, so
    // both are escaped first to survive as literals.
    let escaped = s.replace('+', "%2B").replace('&', "%26");
    form_urlencoded::parse(format!("x={escaped}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Decodes a query string into `(key, value)` pairs in their literal order.
///
/// Duplicate keys are kept.  Pairs whose value is empty (`a=` or a bare `a`)
/// are dropped.
pub fn parse_query_pairs(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decode_escapes() {
        assert_eq!(percent_decode("living%20room"), "living room");
        assert_eq!(percent_decode("a%2Fb"), "a/b");
    }

    #[test]
    fn test_percent_decode_keeps_plus_and_ampersand() {
        assert_eq!(percent_decode("a+b&c"), "a+b&c");
    }

    #[test]
    fn test_query_pairs_keep_order_and_duplicates() {
        let pairs = parse_query_pairs("b=2&a=1&b=3");
        assert_eq!(
            pairs,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_decode_plus_and_escapes() {
        let pairs = parse_query_pairs("name=living+room&x=%2B500%20-200");
        assert_eq!(pairs[0].1, "living room");
        assert_eq!(pairs[1].1, "+500 -200");
    }

    #[test]
    fn test_query_pairs_drop_blank_values() {
        let pairs = parse_query_pairs("a=&b&c=1");
        assert_eq!(pairs, vec![("c".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_empty_query() {
        assert!(parse_query_pairs("").is_empty());
    }
}
