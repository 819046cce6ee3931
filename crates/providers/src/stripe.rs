use async_trait::async_trait;
use factory_core::ProviderSystem;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::{build_client, require, send_json, DEFAULT_TIMEOUT};
use crate::traits::PaymentProvider;
use crate::types::{Customer, Subscription};

const SYSTEM: ProviderSystem = ProviderSystem::Stripe;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub api_url: String,
    pub secret_key: Option<String>,
    pub price_id: Option<String>,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.stripe.com".to_string(),
            secret_key: None,
            price_id: None,
        }
    }
}

impl StripeConfig {
    pub fn from_env() -> Self {
        Self {
            secret_key: std::env::var("STRIPE_SECRET_KEY").ok(),
            price_id: std::env::var("STRIPE_PRICE_ID").ok(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    status: String,
}

pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            config,
        }
    }

    pub fn with_client(config: StripeConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let key = require(SYSTEM, &self.config.secret_key, "STRIPE_SECRET_KEY")?;
        Ok(request.bearer_auth(key))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_or_fetch_customer(&self, project_slug: &str) -> Result<Customer> {
        let query = format!("metadata['project_slug']:'{}'", project_slug);
        let found: List<CustomerObject> = send_json(
            SYSTEM,
            self.authorized(self.client.get(self.url("/v1/customers/search")))?
                .query(&[("query", query.as_str())]),
        )
        .await?;

        if let Some(existing) = found.data.into_iter().next() {
            debug!(customer_id = %existing.id, "Reusing existing customer");
            return Ok(Customer { id: existing.id });
        }

        info!(project_slug = %project_slug, "Creating customer");
        let created: CustomerObject = send_json(
            SYSTEM,
            self.authorized(self.client.post(self.url("/v1/customers")))?
                .header("Idempotency-Key", format!("customer-{}", project_slug))
                .form(&[
                    ("name", project_slug),
                    ("metadata[project_slug]", project_slug),
                ]),
        )
        .await?;

        Ok(Customer { id: created.id })
    }

    async fn create_or_fetch_subscription(
        &self,
        customer_id: &str,
        project_slug: &str,
    ) -> Result<Subscription> {
        let price_id = require(SYSTEM, &self.config.price_id, "STRIPE_PRICE_ID")?;

        let found: List<SubscriptionObject> = send_json(
            SYSTEM,
            self.authorized(self.client.get(self.url("/v1/subscriptions")))?
                .query(&[
                    ("customer", customer_id),
                    ("price", price_id),
                    ("status", "all"),
                ]),
        )
        .await?;

        if let Some(existing) = found
            .data
            .into_iter()
            .find(|s| s.status != "canceled" && s.status != "incomplete_expired")
        {
            debug!(subscription_id = %existing.id, "Reusing existing subscription");
            return Ok(Subscription {
                id: existing.id,
                status: existing.status,
            });
        }

        info!(customer_id = %customer_id, "Creating subscription");
        let created: SubscriptionObject = send_json(
            SYSTEM,
            self.authorized(self.client.post(self.url("/v1/subscriptions")))?
                .header("Idempotency-Key", format!("subscription-{}", project_slug))
                .form(&[
                    ("customer", customer_id),
                    ("items[0][price]", price_id),
                    ("metadata[project_slug]", project_slug),
                    ("payment_behavior", "default_incomplete"),
                ]),
        )
        .await?;

        Ok(Subscription {
            id: created.id,
            status: created.status,
        })
    }
}
