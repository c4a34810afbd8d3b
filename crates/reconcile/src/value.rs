//! Effective value resolution with default fallback

use crate::types::DefaultValue;

/// Compute the effective value of an entry.
///
/// A non-empty store value always wins. Otherwise the configured default is
/// used, with booleans rendered as `"true"`/`"false"`.
pub fn resolve(store_value: &str, default: Option<&DefaultValue>) -> String {
    if !store_value.is_empty() {
        return store_value.to_string();
    }

    match default {
        Some(d) => d.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default_when_empty() {
        let default = DefaultValue::from("fallback");
        assert_eq!(resolve("", Some(&default)), "fallback");
    }

    #[test]
    fn test_resolve_store_wins() {
        let default = DefaultValue::from("fallback");
        assert_eq!(resolve("live", Some(&default)), "live");
    }

    #[test]
    fn test_resolve_bool_default() {
        assert_eq!(resolve("", Some(&DefaultValue::Bool(true))), "true");
        assert_eq!(resolve("", Some(&DefaultValue::Bool(false))), "false");
    }

    #[test]
    fn test_resolve_nothing() {
        assert_eq!(resolve("", None), "");
    }
}
