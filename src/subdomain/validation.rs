//! Subdomain syntax rules and the reserved-name list.

use crate::errors::{GatewayError, Result};

pub const MIN_SUBDOMAIN_LEN: usize = 3;
pub const MAX_SUBDOMAIN_LEN: usize = 63;

/// Names that route to platform infrastructure and can never be claimed
pub const RESERVED_SUBDOMAINS: &[&str] = &[
    "admin", "api", "app", "apps", "assets", "auth", "billing", "blog", "cdn", "dashboard", "dev",
    "docs", "ftp", "help", "imap", "internal", "login", "mail", "proxy", "root", "signup", "smtp",
    "staging", "static", "status", "support", "test", "www",
];

/// Lowercase and trim a requested name, then check syntax and the reserved list.
///
/// Returns the normalized name.
pub fn normalize_subdomain(raw: &str) -> Result<String> {
    let name = raw.trim().to_ascii_lowercase();
    check_syntax(&name)?;
    if is_reserved(&name) {
        return Err(GatewayError::Reserved { subdomain: name });
    }
    Ok(name)
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_SUBDOMAINS.contains(&name)
}

fn check_syntax(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(GatewayError::InvalidSubdomain { subdomain: name.to_string(), reason: reason.to_string() })
    };

    if name.len() < MIN_SUBDOMAIN_LEN || name.len() > MAX_SUBDOMAIN_LEN {
        return invalid("must be between 3 and 63 characters");
    }
    if !name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-') {
        return invalid("may only contain a-z, 0-9 and '-'");
    }
    let first = name.as_bytes()[0];
    let last = name.as_bytes()[name.len() - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return invalid("must start and end with a letter or digit");
    }
    if name.contains("--") {
        return invalid("must not contain consecutive hyphens");
    }
    Ok(())
}

/// Turn a free-form name into a subdomain-shaped candidate.
///
/// The result may still be reserved or too short; callers pass it through
/// [`normalize_subdomain`].
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_end_matches('-').to_string();
    slug.truncate(MAX_SUBDOMAIN_LEN);
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_and_lowercases() {
        assert_eq!(normalize_subdomain("  My-App1 ").unwrap(), "my-app1");
        assert_eq!(normalize_subdomain("abc").unwrap(), "abc");
    }

    #[test]
    fn rejects_bad_syntax() {
        let too_long = "a".repeat(64);
        for bad in ["ab", "-abc", "abc-", "a--b", "my_app", "caf\u{e9}", too_long.as_str()] {
            let err = normalize_subdomain(bad).unwrap_err();
            assert_eq!(err.kind(), "invalid_subdomain", "{bad}");
        }
    }

    #[test]
    fn rejects_reserved() {
        let err = normalize_subdomain("WWW").unwrap_err();
        assert!(matches!(err, GatewayError::Reserved { .. }));
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("My Cool App!"), "my-cool-app");
        assert_eq!(slugify("--Hello__World--"), "hello-world");
        assert_eq!(slugify("!!!"), "");
    }

    proptest! {
        #[test]
        fn normalized_names_satisfy_rules(raw in "[A-Za-z0-9-]{0,70}") {
            if let Ok(name) = normalize_subdomain(&raw) {
                prop_assert!(name.len() >= MIN_SUBDOMAIN_LEN && name.len() <= MAX_SUBDOMAIN_LEN);
                prop_assert!(!name.starts_with('-') && !name.ends_with('-'));
                prop_assert!(!name.contains("--"));
                prop_assert!(!is_reserved(&name));
                prop_assert_eq!(name.clone(), name.to_ascii_lowercase());
            }
        }

        #[test]
        fn slugify_never_produces_invalid_characters(raw in "\\PC{0,80}") {
            let slug = slugify(&raw);
            prop_assert!(slug.len() <= MAX_SUBDOMAIN_LEN);
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'));
        }
    }
}
