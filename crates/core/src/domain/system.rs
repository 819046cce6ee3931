use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// External system a provisioning step talks to.
///
/// The string form doubles as the metadata key the system writes under and
/// as the key of its retry policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSystem {
    Github,
    Supabase,
    Vercel,
    Eleven,
    Stripe,
}

impl ProviderSystem {
    pub const ALL: [ProviderSystem; 5] = [
        Self::Github,
        Self::Supabase,
        Self::Vercel,
        Self::Eleven,
        Self::Stripe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Supabase => "supabase",
            Self::Vercel => "vercel",
            Self::Eleven => "eleven",
            Self::Stripe => "stripe",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "github" => Some(Self::Github),
            "supabase" => Some(Self::Supabase),
            "vercel" => Some(Self::Vercel),
            "eleven" => Some(Self::Eleven),
            "stripe" => Some(Self::Stripe),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_round_trips_through_str() {
        for system in ProviderSystem::ALL {
            assert_eq!(ProviderSystem::parse(system.as_str()), Some(system));
        }
        assert_eq!(ProviderSystem::parse("heroku"), None);
    }
}
