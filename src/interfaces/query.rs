use std::collections::BTreeMap;
use url::form_urlencoded;

/// Decodes a query string or form body into the flat parameter map the
/// gateway sends. A leading `?` is ignored; the last value of a repeated key
/// wins.
pub fn parse_params(raw: &str) -> BTreeMap<String, String> {
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decodes_plus_and_percent() {
        let params = parse_params("?vnp_OrderInfo=Payment+of+deposit&vnp_ReturnUrl=https%3A%2F%2Fa.test");
        assert_eq!(params["vnp_OrderInfo"], "Payment of deposit");
        assert_eq!(params["vnp_ReturnUrl"], "https://a.test");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_params("").is_empty());
    }
}
