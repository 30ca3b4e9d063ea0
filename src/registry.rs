//! Agent card registry.
//!
//! Resolves and caches the [`AgentCard`] published by each configured
//! remote address. Resolution never fails past this boundary: a network
//! error or a malformed card becomes [`Resolution::Unreachable`], and the
//! caller simply leaves that agent out of the current round.

use std::time::Duration;

use dashmap::DashMap;

use crate::a2a::config::A2AClientConfig;
use crate::a2a::{A2AClient, AgentCard};

/// Outcome of resolving one remote address.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(AgentCard),
    Unreachable { url: String, reason: String },
}

/// Resolves and caches agent cards, keyed by agent name.
///
/// Also remembers which name each URL resolved to, so that re-resolving a
/// URL whose agent was renamed drops the stale entry.
#[derive(Debug)]
pub struct AgentCardRegistry {
    config: A2AClientConfig,
    http: reqwest::Client,
    cards: DashMap<String, AgentCard>,
    names_by_url: DashMap<String, String>,
}

impl AgentCardRegistry {
    /// Create a registry whose fetches are bounded by `config.timeout_secs`.
    pub fn new(config: A2AClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            http,
            cards: DashMap::new(),
            names_by_url: DashMap::new(),
        })
    }

    /// A client for `url` sharing the registry's connection pool.
    pub fn client_for(&self, url: &str) -> A2AClient {
        A2AClient::with_http_client(url, self.http.clone(), self.config.clone())
    }

    /// Fetch the card at `url` and cache it.
    pub async fn resolve(&self, url: &str) -> Resolution {
        let resolution = self.fetch(url).await;
        if let Resolution::Resolved(ref card) = resolution {
            self.insert(url, card.clone());
        }
        resolution
    }

    /// Fetch the card at `url` without touching the cache.
    ///
    /// Callers resolving several URLs at once fetch concurrently and then
    /// [`insert`](Self::insert) in a fixed order, so that the winner among
    /// duplicate names does not depend on which answer arrived first.
    pub async fn fetch(&self, url: &str) -> Resolution {
        match self.client_for(url).fetch_agent_card().await {
            Ok(card) => {
                log::info!("Resolved agent '{}' at {}", card.name, url);
                Resolution::Resolved(card)
            }
            Err(e) => {
                log::warn!("Failed to get agent card from {}: {}", url, e);
                Resolution::Unreachable {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Cache `card` as the card published at `url`.
    ///
    /// Overwrites any card with the same name (last resolution wins) and
    /// drops the entry previously resolved from the same URL under another
    /// name.
    pub fn insert(&self, url: &str, card: AgentCard) {
        if let Some(previous) = self.names_by_url.insert(url.to_string(), card.name.clone()) {
            if previous != card.name {
                self.cards.remove(&previous);
            }
        }
        if let Some(old) = self.cards.insert(card.name.clone(), card) {
            if old.url != url {
                log::warn!("Agent name '{}' now resolves from {} (was {})", old.name, url, old.url);
            }
        }
    }

    /// The cached card for `name`.
    pub fn get(&self, name: &str) -> Option<AgentCard> {
        self.cards.get(name).map(|c| c.value().clone())
    }

    /// The name last resolved from `url`.
    pub fn name_for_url(&self, url: &str) -> Option<String> {
        self.names_by_url.get(url).map(|n| n.value().clone())
    }

    /// All cached cards, sorted by name.
    pub fn cards(&self) -> Vec<AgentCard> {
        let mut cards: Vec<AgentCard> = self.cards.iter().map(|c| c.value().clone()).collect();
        cards.sort_by(|a, b| a.name.cmp(&b.name));
        cards
    }

    /// Forget whatever was resolved from `url`.
    pub fn forget_url(&self, url: &str) {
        if let Some((_, name)) = self.names_by_url.remove(url) {
            let still_referenced = self.names_by_url.iter().any(|e| e.value() == &name);
            if !still_referenced {
                self.cards.remove(&name);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str, url: &str) -> AgentCard {
        serde_json::from_value(serde_json::json!({"name": name, "url": url})).unwrap()
    }

    fn registry() -> AgentCardRegistry {
        AgentCardRegistry::new(A2AClientConfig { timeout_secs: 2, ..Default::default() }).unwrap()
    }

    #[test]
    fn test_duplicate_name_last_resolution_wins() {
        let reg = registry();
        reg.insert("http://a:1", card("check_budget_agent", "http://a:1/"));
        reg.insert("http://b:2", card("check_budget_agent", "http://b:2/"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("check_budget_agent").unwrap().url, "http://b:2/");
    }

    #[test]
    fn test_renamed_agent_drops_stale_entry() {
        let reg = registry();
        reg.insert("http://a:1", card("old_name", "http://a:1/"));
        reg.insert("http://a:1", card("new_name", "http://a:1/"));
        assert!(reg.get("old_name").is_none());
        assert_eq!(reg.name_for_url("http://a:1").as_deref(), Some("new_name"));
    }

    #[test]
    fn test_forget_url() {
        let reg = registry();
        reg.insert("http://a:1", card("legal", "http://a:1/"));
        reg.forget_url("http://a:1");
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_resolving_twice_yields_identical_card() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let published = card("check_budget_agent", &format!("{}/", url));
        let app = axum::Router::new().route(
            "/.well-known/agent-card.json",
            axum::routing::get(move || {
                let published = published.clone();
                async move { axum::Json(published) }
            }),
        );
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let reg = registry();
        let first = reg.resolve(&url).await;
        let second = reg.resolve(&url).await;
        assert!(matches!(first, Resolution::Resolved(_)));
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&reg.get("check_budget_agent").unwrap()).unwrap(),
            serde_json::to_vec(&reg.cards()[0]).unwrap()
        );
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_never_raises() {
        let reg = registry();
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let res = reg.resolve(&format!("http://127.0.0.1:{}", port)).await;
        assert!(matches!(res, Resolution::Unreachable { .. }));
        assert!(reg.is_empty());
    }
}
