use std::sync::Arc;

use async_trait::async_trait;
use factory_core::{ProviderSystem, RunMetadata};
use providers::HostingProvider;
use tracing::debug;

use super::{missing, verdict_for_error, StepVerifier, Verdict};

/// Cross-checks the deployed site against the database configuration: the
/// site must echo back the expected hosting URL and, when it reports one,
/// the database API URL recorded for the run.
pub struct DatabaseVerifier {
    hosting: Arc<dyn HostingProvider>,
}

impl DatabaseVerifier {
    pub fn new(hosting: Arc<dyn HostingProvider>) -> Self {
        Self { hosting }
    }
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

#[async_trait]
impl StepVerifier for DatabaseVerifier {
    fn system(&self) -> ProviderSystem {
        ProviderSystem::Supabase
    }

    async fn verify(&self, metadata: &RunMetadata) -> Verdict {
        let vercel = metadata.vercel();
        let Some(deployment_url) = vercel.deployment_url else {
            return missing("vercel.deploymentUrl");
        };
        let Some(expected_site) = vercel.production_url else {
            return missing("vercel.productionUrl");
        };

        let config = match self.hosting.fetch_site_config(&deployment_url).await {
            Ok(config) => config,
            Err(e) => return verdict_for_error(&e),
        };

        match config.site_url.as_deref() {
            Some(site_url) if same_url(site_url, &expected_site) => {}
            reported => {
                debug!(expected = %expected_site, reported = ?reported, "Site URL not propagated yet");
                return Verdict::Wait(format!(
                    "site reports {} instead of {}",
                    reported.unwrap_or("no site URL"),
                    expected_site
                ));
            }
        }

        if let (Some(reported), Some(expected)) =
            (config.supabase_url.as_deref(), metadata.supabase().api_url)
        {
            if !same_url(reported, &expected) {
                return Verdict::Wait(format!(
                    "site reports database {} instead of {}",
                    reported, expected
                ));
            }
        }

        Verdict::advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factory_core::{SupabaseMetadata, VercelMetadata};
    use providers::{Deployment, DeploymentState, EnvVar, HostingProject, ProviderError, SiteConfig};

    struct SiteHosting {
        config: Result<SiteConfig, ProviderError>,
    }

    impl SiteHosting {
        fn reporting(site_url: Option<&str>, supabase_url: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                config: Ok(SiteConfig {
                    site_url: site_url.map(str::to_string),
                    supabase_url: supabase_url.map(str::to_string),
                }),
            })
        }
    }

    #[async_trait]
    impl HostingProvider for SiteHosting {
        async fn create_or_fetch_project(&self, _: &str, _: &str) -> providers::Result<HostingProject> {
            unreachable!()
        }

        async fn upsert_env_vars(&self, _: &str, _: &[EnvVar]) -> providers::Result<()> {
            unreachable!()
        }

        async fn trigger_deployment(
            &self,
            _: &HostingProject,
            _: &str,
            _: &str,
        ) -> providers::Result<Deployment> {
            unreachable!()
        }

        async fn deployment_status(&self, _: &str) -> providers::Result<DeploymentState> {
            unreachable!()
        }

        async fn fetch_site_config(&self, _: &str) -> providers::Result<SiteConfig> {
            self.config.clone()
        }
    }

    fn deployed() -> RunMetadata {
        RunMetadata {
            vercel: Some(VercelMetadata {
                production_url: Some("https://acme-42.vercel.app".to_string()),
                deployment_url: Some("https://acme-42-dpl1.vercel.app".to_string()),
                ..Default::default()
            }),
            supabase: Some(SupabaseMetadata {
                api_url: Some("https://ref123.supabase.co".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_matching_site_advances() {
        let verifier = DatabaseVerifier::new(SiteHosting::reporting(
            Some("https://acme-42.vercel.app/"),
            Some("https://ref123.supabase.co"),
        ));
        assert_eq!(verifier.verify(&deployed()).await, Verdict::advance());
    }

    #[tokio::test]
    async fn test_site_without_database_url_advances() {
        let verifier =
            DatabaseVerifier::new(SiteHosting::reporting(Some("https://acme-42.vercel.app"), None));
        assert_eq!(verifier.verify(&deployed()).await, Verdict::advance());
    }

    #[tokio::test]
    async fn test_mismatched_site_url_waits() {
        let verifier = DatabaseVerifier::new(SiteHosting::reporting(
            Some("https://stale.vercel.app"),
            Some("https://ref123.supabase.co"),
        ));
        match verifier.verify(&deployed()).await {
            Verdict::Wait(reason) => assert!(reason.contains("https://stale.vercel.app")),
            other => panic!("expected wait, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_site_url_waits() {
        let verifier = DatabaseVerifier::new(SiteHosting::reporting(None, None));
        assert!(matches!(verifier.verify(&deployed()).await, Verdict::Wait(_)));
    }

    #[tokio::test]
    async fn test_mismatched_database_url_waits() {
        let verifier = DatabaseVerifier::new(SiteHosting::reporting(
            Some("https://acme-42.vercel.app"),
            Some("https://other.supabase.co"),
        ));
        match verifier.verify(&deployed()).await {
            Verdict::Wait(reason) => assert!(reason.contains("https://other.supabase.co")),
            other => panic!("expected wait, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_site_waits() {
        let verifier = DatabaseVerifier::new(Arc::new(SiteHosting {
            config: Err(ProviderError::transient(ProviderSystem::Vercel, "connection refused")),
        }));
        assert!(matches!(verifier.verify(&deployed()).await, Verdict::Wait(_)));
    }

    #[tokio::test]
    async fn test_missing_deployment_url_fails() {
        let verifier = DatabaseVerifier::new(SiteHosting::reporting(None, None));
        let mut metadata = deployed();
        metadata.vercel = Some(VercelMetadata {
            production_url: Some("https://acme-42.vercel.app".to_string()),
            ..Default::default()
        });

        match verifier.verify(&metadata).await {
            Verdict::Fail(reason) => assert!(reason.contains("vercel.deploymentUrl")),
            other => panic!("expected fail, got {:?}", other),
        }
    }
}
