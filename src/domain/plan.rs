//! Plan tiers and the quotas attached to them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Subscription tier of a tenant, ordered from least to most capable
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Hobby,
    Pro,
    Business,
}

impl PlanTier {
    pub const ALL: [PlanTier; 4] = [PlanTier::Free, PlanTier::Hobby, PlanTier::Pro, PlanTier::Business];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Hobby => "hobby",
            PlanTier::Pro => "pro",
            PlanTier::Business => "business",
        }
    }

    /// Maximum number of secrets a tenant on this tier may hold
    pub fn secret_quota(&self) -> u32 {
        match self {
            PlanTier::Free => 5,
            PlanTier::Hobby => 25,
            PlanTier::Pro => 100,
            PlanTier::Business => 500,
        }
    }
}

impl Default for PlanTier {
    fn default() -> Self {
        PlanTier::Free
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "hobby" => Ok(PlanTier::Hobby),
            "pro" => Ok(PlanTier::Pro),
            "business" => Ok(PlanTier::Business),
            other => Err(format!("unknown plan tier '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(PlanTier::Free < PlanTier::Hobby);
        assert!(PlanTier::Hobby < PlanTier::Pro);
        assert!(PlanTier::Pro < PlanTier::Business);
    }

    #[test]
    fn quotas_match_tiers() {
        let quotas: Vec<u32> = PlanTier::ALL.iter().map(PlanTier::secret_quota).collect();
        assert_eq!(quotas, vec![5, 25, 100, 500]);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("PRO".parse::<PlanTier>().unwrap(), PlanTier::Pro);
        assert!("enterprise".parse::<PlanTier>().is_err());
    }
}
