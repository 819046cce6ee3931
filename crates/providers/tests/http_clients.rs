use factory_core::ProviderSystem;
use providers::{
    ChatNotifier, DatabaseHealth, DatabaseProvider, DeploymentState, EmailClient, EmailConfig,
    EmailMessage, EmailSender, HostingProject, HostingProvider, PaymentProvider, ProviderError,
    StripeClient, StripeConfig, SupabaseClient, SupabaseConfig, VercelClient, VercelConfig,
    VoiceAgentProvider, ElevenLabsClient, ElevenLabsConfig, WebhookNotifier,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod supabase {
    use super::*;

    fn client(server: &MockServer) -> SupabaseClient {
        SupabaseClient::new(SupabaseConfig {
            management_url: server.uri(),
            project_url_template: format!("{}/projects/{{ref}}", server.uri()),
            access_token: Some("sbp_test".to_string()),
            organization_id: Some("org_1".to_string()),
            db_password: Some("secret".to_string()),
            ..SupabaseConfig::default()
        })
    }

    #[tokio::test]
    async fn test_reuses_existing_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .and(header("authorization", "Bearer sbp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "ref123", "name": "acme-42", "region": "us-east-1", "status": "ACTIVE_HEALTHY" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let project = client(&server).create_or_fetch_project("acme-42").await.unwrap();

        assert_eq!(project.project_ref, "ref123");
        assert_eq!(project.api_url, format!("{}/projects/ref123", server.uri()));
    }

    #[tokio::test]
    async fn test_creates_missing_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects"))
            .and(body_partial_json(json!({ "name": "acme-42", "organization_id": "org_1" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "newref", "name": "acme-42", "status": "COMING_UP"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let project = client(&server).create_or_fetch_project("acme-42").await.unwrap();
        assert_eq!(project.project_ref, "newref");
    }

    #[tokio::test]
    async fn test_service_unavailable_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server).create_or_fetch_project("acme-42").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.system(), ProviderSystem::Supabase);
    }

    #[tokio::test]
    async fn test_project_health_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/ref123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ref123", "name": "acme-42", "status": "COMING_UP"
            })))
            .mount(&server)
            .await;

        let health = client(&server).project_health("ref123").await.unwrap();
        assert_eq!(health, DatabaseHealth::Pending("COMING_UP".to_string()));
    }

    #[tokio::test]
    async fn test_missing_service_key_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/ref123/api-keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "anon", "api_key": "anon-key" }
            ])))
            .mount(&server)
            .await;

        let err = client(&server).fetch_api_keys("ref123").await.unwrap_err();
        assert!(err.is_transient());
    }
}

mod vercel {
    use super::*;

    fn client(server: &MockServer) -> VercelClient {
        VercelClient::new(VercelConfig {
            api_url: server.uri(),
            token: Some("vc_test".to_string()),
            ..VercelConfig::default()
        })
    }

    #[tokio::test]
    async fn test_creates_project_when_lookup_404s() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v9/projects/acme-42"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v10/projects"))
            .and(body_partial_json(json!({
                "name": "acme-42",
                "gitRepository": { "type": "github", "repo": "factory/acme-42" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "prj_1", "name": "acme-42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let project = client(&server)
            .create_or_fetch_project("acme-42", "factory/acme-42")
            .await
            .unwrap();
        assert_eq!(project.id, "prj_1");
    }

    #[tokio::test]
    async fn test_deployment_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v13/deployments/dpl_ready"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dpl_ready", "readyState": "READY"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v13/deployments/dpl_broken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dpl_broken", "readyState": "ERROR", "errorMessage": "Build failed"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v13/deployments/dpl_building"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dpl_building", "readyState": "BUILDING"
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.deployment_status("dpl_ready").await.unwrap(),
            DeploymentState::Ready
        );
        assert_eq!(
            client.deployment_status("dpl_broken").await.unwrap(),
            DeploymentState::Error("Build failed".to_string())
        );
        assert_eq!(
            client.deployment_status("dpl_building").await.unwrap(),
            DeploymentState::Building("BUILDING".to_string())
        );
    }

    #[tokio::test]
    async fn test_trigger_deployment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v13/deployments"))
            .and(body_partial_json(json!({
                "project": "prj_1",
                "gitSource": { "org": "factory", "repo": "acme-42", "ref": "main" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dpl_1", "url": "acme-42-abc.vercel.app", "readyState": "QUEUED"
            })))
            .mount(&server)
            .await;

        let project = HostingProject {
            id: "prj_1".to_string(),
            name: "acme-42".to_string(),
        };
        let deployment = client(&server)
            .trigger_deployment(&project, "factory/acme-42", "main")
            .await
            .unwrap();

        assert_eq!(deployment.id, "dpl_1");
        assert_eq!(deployment.url, "https://acme-42-abc.vercel.app");
    }

    #[tokio::test]
    async fn test_fetch_site_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "siteUrl": "https://acme-42.vercel.app",
                "supabaseUrl": "https://ref123.supabase.co"
            })))
            .mount(&server)
            .await;

        let config = client(&server)
            .fetch_site_config(&format!("{}/", server.uri()))
            .await
            .unwrap();
        assert_eq!(config.site_url.as_deref(), Some("https://acme-42.vercel.app"));
    }

    #[tokio::test]
    async fn test_name_conflict_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v9/projects/acme-42"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v10/projects"))
            .respond_with(ResponseTemplate::new(409).set_body_string("project already exists"))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_or_fetch_project("acme-42", "factory/acme-42")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { .. }));
    }
}

mod elevenlabs {
    use super::*;

    fn client(server: &MockServer) -> ElevenLabsClient {
        ElevenLabsClient::new(ElevenLabsConfig {
            api_url: server.uri(),
            api_key: Some("xi_test".to_string()),
            voice_id: None,
        })
    }

    #[tokio::test]
    async fn test_creates_agent_when_search_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/convai/agents"))
            .and(query_param("search", "acme-42"))
            .and(header("xi-api-key", "xi_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agents": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/convai/agents/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agent_id": "agent_1" })))
            .expect(1)
            .mount(&server)
            .await;

        let agent = client(&server).create_or_fetch_agent("acme-42").await.unwrap();
        assert_eq!(agent.agent_id, "agent_1");
    }

    #[tokio::test]
    async fn test_probe_returns_agent_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/convai/agents/agent_1/simulate-conversation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "simulated_conversation": [
                    { "role": "user", "message": "Hello?" },
                    { "role": "agent", "message": "Hi! How can I help?" }
                ]
            })))
            .mount(&server)
            .await;

        let reply = client(&server).probe("agent_1", "Hello?").await.unwrap();
        assert_eq!(reply, "Hi! How can I help?");
    }
}

mod stripe {
    use super::*;

    fn client(server: &MockServer, price_id: Option<&str>) -> StripeClient {
        StripeClient::new(StripeConfig {
            api_url: server.uri(),
            secret_key: Some("sk_test".to_string()),
            price_id: price_id.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_reuses_customer_found_by_slug() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers/search"))
            .and(query_param("query", "metadata['project_slug']:'acme-42'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "cus_1" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let customer = client(&server, None)
            .create_or_fetch_customer("acme-42")
            .await
            .unwrap();
        assert_eq!(customer.id, "cus_1");
    }

    #[tokio::test]
    async fn test_creates_customer_with_idempotency_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(header("idempotency-key", "customer-acme-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_new" })))
            .expect(1)
            .mount(&server)
            .await;

        let customer = client(&server, None)
            .create_or_fetch_customer("acme-42")
            .await
            .unwrap();
        assert_eq!(customer.id, "cus_new");
    }

    #[tokio::test]
    async fn test_subscription_without_price_is_configuration_error() {
        let server = MockServer::start().await;

        let err = client(&server, None)
            .create_or_fetch_subscription("cus_1", "acme-42")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_skips_canceled_subscriptions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/subscriptions"))
            .and(query_param("customer", "cus_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "sub_old", "status": "canceled" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sub_new", "status": "incomplete"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let subscription = client(&server, Some("price_1"))
            .create_or_fetch_subscription("cus_1", "acme-42")
            .await
            .unwrap();
        assert_eq!(subscription.id, "sub_new");
    }
}

mod notify {
    use super::*;

    #[tokio::test]
    async fn test_webhook_posts_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/ops"))
            .and(body_partial_json(json!({ "text": "run failed" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        WebhookNotifier::new()
            .post(&format!("{}/hooks/ops", server.uri()), "run failed")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_email_requires_api_key() {
        let client = EmailClient::new(EmailConfig::default());
        let message = EmailMessage {
            to: "ops@example.com".to_string(),
            subject: "failed".to_string(),
            text: "details".to_string(),
        };

        assert!(client.send(&message).await.is_err());
    }

    #[tokio::test]
    async fn test_email_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({ "to": ["ops@example.com"], "subject": "failed" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = EmailClient::new(EmailConfig {
            api_url: format!("{}/emails", server.uri()),
            api_key: Some("re_test".to_string()),
            ..EmailConfig::default()
        });
        client
            .send(&EmailMessage {
                to: "ops@example.com".to_string(),
                subject: "failed".to_string(),
                text: "details".to_string(),
            })
            .await
            .unwrap();
    }
}
