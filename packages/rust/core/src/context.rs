//! Shared application context: config, storage and external API clients.

use tracing::{info, warn};

use faqbot_shared::{AppConfig, FaqBotError, Result};
use faqbot_storage::Storage;

use crate::billing::StripeClient;
use crate::openai::OpenAiClient;

/// Everything a request handler or CLI command needs.
///
/// The API clients are optional so that commands which only touch storage
/// work without secrets; flows that need a client fail with the missing
/// env var in the error.
pub struct AppContext {
    pub config: AppConfig,
    pub storage: Storage,
    openai: Option<OpenAiClient>,
    stripe: Option<StripeClient>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        storage: Storage,
        openai: Option<OpenAiClient>,
        stripe: Option<StripeClient>,
    ) -> Self {
        Self {
            config,
            storage,
            openai,
            stripe,
        }
    }

    /// Open storage and build clients for whichever secrets are present.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let db_path = config.database_path()?;
        let storage = Storage::open(&db_path).await?;
        info!(path = %db_path.display(), "storage opened");

        let openai = match OpenAiClient::from_config(&config.openai) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "language model client unavailable");
                None
            }
        };
        let stripe = match StripeClient::from_config(&config) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "billing client unavailable");
                None
            }
        };

        Ok(Self::new(config, storage, openai, stripe))
    }

    /// The language model client, or a config error naming the missing key.
    pub fn openai(&self) -> Result<&OpenAiClient> {
        self.openai.as_ref().ok_or_else(|| {
            let var = &self.config.openai.api_key_env;
            FaqBotError::config(format!("Missing {var}. Set the {var} environment variable."))
        })
    }

    /// The Stripe client, or a config error naming the missing key.
    pub fn stripe(&self) -> Result<&StripeClient> {
        self.stripe.as_ref().ok_or_else(|| {
            let var = &self.config.billing.secret_key_env;
            FaqBotError::config(format!("Missing {var}. Set the {var} environment variable."))
        })
    }
}
