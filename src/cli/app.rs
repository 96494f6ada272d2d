//! Haggle application wiring the hub components together

use crate::advisory::{AdvisoryClient, PriceHistory};
use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::hub::{BroadcastHub, MessageRouter};
use crate::net::HubServer;
use crate::store::{JsonlStore, MemoryStore, MessageStore, StoredMessage};
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// A bound hub ready to accept clients
pub struct HaggleApp {
    server: HubServer,
    router: Arc<MessageRouter>,
}

impl HaggleApp {
    /// Build the store, advisory client and hub, then bind the listener
    pub async fn new(config: HubConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn MessageStore> = match &config.store_path {
            Some(path) => {
                tracing::info!("Persisting messages to {}", path.display());
                Arc::new(JsonlStore::open(path).await?)
            }
            None => {
                tracing::info!("No store configured, messages kept in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let advisory = AdvisoryClient::new(&config.advisory_url, config.advisory_timeout)?;
        tracing::info!("Advisory service at {}", advisory.base_url());

        let hub = Arc::new(BroadcastHub::new(store, config.write_timeout));
        let router = Arc::new(MessageRouter::new(hub, advisory));
        let server = HubServer::bind(&config, router.clone()).await?;

        Ok(Self { server, router })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    pub fn router(&self) -> Arc<MessageRouter> {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.server.run_until(shutdown).await;
        tracing::info!(
            "Hub stopped with {} connected clients",
            self.router.hub().connection_count().await
        );
    }

    /// Serve until Ctrl+C
    pub async fn run(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                futures::future::pending::<()>().await;
            }
        })
        .await
    }
}

/// Read persisted messages from a JSON Lines log
pub async fn load_history(path: &Path, limit: Option<usize>) -> Result<Vec<StoredMessage>> {
    if tokio::fs::metadata(path).await.is_err() {
        return Err(HubError::Persistence(format!("no message log at {}", path.display())));
    }
    let store = JsonlStore::open(path).await?;
    store.list(limit).await
}

/// Ask the advisory service for recent market prices
pub async fn fetch_price_history(advisory_url: &str) -> Result<PriceHistory> {
    let client = AdvisoryClient::new(advisory_url, crate::advisory::DEFAULT_TIMEOUT)?;
    client.price_history().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, MessageKind, Role};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_app_binds_and_stops() {
        let config = HubConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            ..HubConfig::default()
        };
        let app = HaggleApp::new(config).await.unwrap();
        assert_ne!(app.local_addr().unwrap().port(), 0);

        tokio::time::timeout(Duration::from_secs(5), app.run_until(async {}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = HubConfig {
            advisory_url: "not-a-url".to_string(),
            ..HubConfig::default()
        };
        assert!(HaggleApp::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_load_history_reads_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.jsonl");

        let store = JsonlStore::open(&path).await.unwrap();
        for content in ["hello", "offer 90", "deal"] {
            store
                .append(&ChatMessage::from_participant(MessageKind::Chat, Role::Buyer, content))
                .await
                .unwrap();
        }

        let recent = load_history(&path, Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message.content, "offer 90");
        assert_eq!(recent[1].message.content, "deal");
    }

    #[tokio::test]
    async fn test_load_history_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.jsonl");

        let err = load_history(&path, None).await.unwrap_err();
        assert!(matches!(err, HubError::Persistence(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_fetch_price_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/price-history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "history": [{"day": "2024-01-01", "price": 101.5}],
                "predictions": []
            })))
            .mount(&server)
            .await;

        let history = fetch_price_history(&server.uri()).await.unwrap();
        assert_eq!(history.history.len(), 1);
        assert_eq!(history.history[0].price, 101.5);
    }
}
