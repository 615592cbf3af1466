//! Scope string handling.
//!
//! Scopes travel on the wire and in the database as a single
//! space-separated string; everything that reasons about them works on the
//! parsed token list. A scope string is valid against an allowed set iff
//! every whitespace-separated token is a member of that set.

/// Parse a space-separated scope string into its tokens, dropping blanks.
pub fn parse_scope(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(String::from).collect()
}

/// Join scope tokens back into the wire form.
pub fn join_scope(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// Check a single scope token's character set (letters, digits, `:._-`).
pub fn is_valid_scope_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '.' || c == '_' || c == '-')
}

/// True iff every requested scope is an element of `allowed`.
pub fn scopes_allowed(requested: &[String], allowed: &[String]) -> bool {
    requested.iter().all(|s| allowed.contains(s))
}

/// True iff `narrowed` is a subset of `current` (used for refresh-grant
/// scope narrowing).
pub fn is_scope_subset(narrowed: &[String], current: &[String]) -> bool {
    narrowed.iter().all(|s| current.contains(s))
}

/// Human-readable description of a scope for the consent page.
pub fn describe_scope(scope: &str) -> String {
    match scope {
        "memories:read" => "Read your memories".to_string(),
        "memories:write" => "Create and update your memories".to_string(),
        "memories:delete" => "Delete your memories".to_string(),
        "profile:read" => "Read your profile information".to_string(),
        "profile:write" => "Update your profile information".to_string(),
        "offline_access" => {
            "Access your data when you're not using the application".to_string()
        }
        other => format!("Access to {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scopes(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_scope_splits_on_whitespace() {
        assert_eq!(
            parse_scope("memories:read  memories:write "),
            scopes(&["memories:read", "memories:write"])
        );
        assert!(parse_scope("").is_empty());
        assert!(parse_scope("   ").is_empty());
    }

    #[test]
    fn test_join_scope_roundtrip() {
        let list = scopes(&["memories:read", "profile:read"]);
        assert_eq!(join_scope(&list), "memories:read profile:read");
        assert_eq!(parse_scope(&join_scope(&list)), list);
    }

    #[test]
    fn test_is_valid_scope_token() {
        assert!(is_valid_scope_token("memories:read"));
        assert!(is_valid_scope_token("offline_access"));
        assert!(!is_valid_scope_token(""));
        assert!(!is_valid_scope_token("bad scope"));
        assert!(!is_valid_scope_token("bad/scope"));
    }

    #[test]
    fn test_scopes_allowed() {
        let allowed = scopes(&["memories:read", "memories:write"]);
        assert!(scopes_allowed(&scopes(&["memories:read"]), &allowed));
        assert!(scopes_allowed(&[], &allowed));
        assert!(!scopes_allowed(&scopes(&["memories:delete"]), &allowed));
    }

    #[test]
    fn test_is_scope_subset() {
        let current = scopes(&["memories:read", "profile:read"]);
        assert!(is_scope_subset(&scopes(&["memories:read"]), &current));
        assert!(is_scope_subset(&current, &current));
        assert!(!is_scope_subset(&scopes(&["memories:write"]), &current));
    }

    #[test]
    fn test_describe_scope_known_and_fallback() {
        assert_eq!(describe_scope("memories:read"), "Read your memories");
        assert_eq!(describe_scope("custom:thing"), "Access to custom:thing");
    }

    proptest! {
        #[test]
        fn prop_subset_is_reflexive_and_monotone(
            tokens in proptest::collection::vec("[a-z]{1,8}(:[a-z]{1,8})?", 0..6)
        ) {
            let list: Vec<String> = tokens;
            prop_assert!(is_scope_subset(&list, &list));
            if !list.is_empty() {
                let smaller = list[1..].to_vec();
                prop_assert!(is_scope_subset(&smaller, &list));
            }
        }
    }
}
