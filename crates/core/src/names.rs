//! Well-known type names and name helpers
//!
//! Type names are `prefix:local` pairs. The engine reserves the `sys`
//! prefix for its bootstrap hierarchy; document/compound classification is
//! an ancestry test against these names.

/// Residual item name: matches any otherwise-undeclared item
pub const RESIDUAL: &str = "*";

/// Root of the type hierarchy
pub const SYS_BASE: &str = "sys:base";

/// Ancestor marking a type as a document type
pub const DOCUMENT_BASE: &str = "sys:document";

/// Ancestor marking a type as a compound (reusable field-group) type
pub const COMPOUND_BASE: &str = "sys:compound";

/// Namespace prefix of a `prefix:local` type name.
///
/// Unprefixed names have the empty prefix.
pub fn prefix_of(name: &str) -> &str {
    match name.split_once(':') {
        Some((prefix, _)) => prefix,
        None => "",
    }
}

/// Whether an item name is the residual wildcard
pub fn is_residual(name: &str) -> bool {
    name == RESIDUAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_of_namespaced() {
        assert_eq!(prefix_of("ns:news"), "ns");
        assert_eq!(prefix_of("sys:document"), "sys");
    }

    #[test]
    fn test_prefix_of_unprefixed() {
        assert_eq!(prefix_of("title"), "");
        assert_eq!(prefix_of(""), "");
    }

    #[test]
    fn test_prefix_of_extra_colon() {
        // Only the first colon splits prefix from local name
        assert_eq!(prefix_of("a:b:c"), "a");
    }

    #[test]
    fn test_is_residual() {
        assert!(is_residual("*"));
        assert!(!is_residual("title"));
        assert!(!is_residual("**"));
    }
}
