//! Named upstream targets and how each one expects its credential.

use std::collections::BTreeMap;

/// Where the tenant's credential goes on the outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <secret>`
    Bearer,
    /// `<header>: <secret>`
    Header(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: &'static str,
    pub base_url: String,
    /// Vault secret holding the credential for this target
    pub secret_name: &'static str,
    pub auth: AuthStyle,
    /// Static headers added to every outbound request
    pub extra_headers: &'static [(&'static str, &'static str)],
}

impl Target {
    fn new(
        name: &'static str,
        base_url: &str,
        secret_name: &'static str,
        auth: AuthStyle,
        extra_headers: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { name, base_url: base_url.to_string(), secret_name, auth, extra_headers }
    }
}

/// Fixed lookup table of upstream targets
#[derive(Debug, Clone)]
pub struct TargetTable {
    targets: BTreeMap<&'static str, Target>,
}

impl Default for TargetTable {
    fn default() -> Self {
        let targets = [
            Target::new("openai", "https://api.openai.com", "OPENAI_API_KEY", AuthStyle::Bearer, &[]),
            Target::new(
                "anthropic",
                "https://api.anthropic.com",
                "ANTHROPIC_API_KEY",
                AuthStyle::Header("x-api-key"),
                &[("anthropic-version", "2023-06-01")],
            ),
            Target::new(
                "gemini",
                "https://generativelanguage.googleapis.com",
                "GEMINI_API_KEY",
                AuthStyle::Header("x-goog-api-key"),
                &[],
            ),
            Target::new("groq", "https://api.groq.com/openai", "GROQ_API_KEY", AuthStyle::Bearer, &[]),
            Target::new("mistral", "https://api.mistral.ai", "MISTRAL_API_KEY", AuthStyle::Bearer, &[]),
            Target::new("clerk", "https://api.clerk.com", "CLERK_SECRET_KEY", AuthStyle::Bearer, &[]),
            Target::new("resend", "https://api.resend.com", "RESEND_API_KEY", AuthStyle::Bearer, &[]),
        ];

        Self { targets: targets.into_iter().map(|t| (t.name, t)).collect() }
    }
}

impl TargetTable {
    /// Exact, case-sensitive lookup
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.targets.keys().copied()
    }

    /// Point a known target at another base URL. Unknown names are ignored.
    pub fn with_base_url(mut self, name: &str, base_url: impl Into<String>) -> Self {
        if let Some(target) = self.targets.get_mut(name) {
            target.base_url = base_url.into();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_targets() {
        let table = TargetTable::default();
        let openai = table.get("openai").unwrap();
        assert_eq!(openai.secret_name, "OPENAI_API_KEY");
        assert_eq!(openai.auth, AuthStyle::Bearer);

        let anthropic = table.get("anthropic").unwrap();
        assert_eq!(anthropic.auth, AuthStyle::Header("x-api-key"));
        assert_eq!(anthropic.extra_headers, &[("anthropic-version", "2023-06-01")]);

        assert_eq!(table.names().count(), 7);
    }

    #[test]
    fn lookup_is_exact() {
        let table = TargetTable::default();
        assert!(table.get("OpenAI").is_none());
        assert!(table.get(" openai").is_none());
        assert!(table.get("cohere").is_none());
    }

    #[test]
    fn base_url_override() {
        let table = TargetTable::default().with_base_url("openai", "http://127.0.0.1:9999");
        assert_eq!(table.get("openai").unwrap().base_url, "http://127.0.0.1:9999");
        let table = table.with_base_url("nope", "http://x");
        assert!(table.get("nope").is_none());
    }
}
