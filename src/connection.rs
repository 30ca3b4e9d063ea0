//! Remote agent connections and the shared connection table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;

use crate::a2a::jsonrpc::{SendMessageRequest, SendMessageResponse};
use crate::a2a::{A2AClient, A2AClientError, AgentCard};
use crate::config::RemoteAgent;
use crate::registry::{AgentCardRegistry, Resolution};

/// Handle binding a remote address to its resolved card.
///
/// Immutable: a re-resolution replaces the whole connection.
#[derive(Debug)]
pub struct RemoteAgentConnection {
    pub card: AgentCard,
    pub url: String,
    client: A2AClient,
}

impl RemoteAgentConnection {
    pub fn new(card: AgentCard, url: impl Into<String>, client: A2AClient) -> Self {
        Self {
            card,
            url: url.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.card.name
    }

    /// Send a `message/send` request to this agent.
    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<SendMessageResponse, A2AClientError> {
        self.client.send_message(request).await
    }
}

/// A configured agent that could not be resolved this round.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedAgent {
    /// Configured or last known name, else the URL.
    pub label: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Default)]
struct TableState {
    by_name: HashMap<String, Arc<RemoteAgentConnection>>,
    resolved_urls: HashSet<String>,
}

/// Connections to every reachable remote agent, keyed by agent name.
///
/// Shared by concurrent requests: reads take a snapshot under a read lock;
/// population is serialized so each address is resolved at most once per
/// round even when many requests arrive together.
#[derive(Debug)]
pub struct ConnectionTable {
    registry: Arc<AgentCardRegistry>,
    state: RwLock<TableState>,
    populate: tokio::sync::Mutex<()>,
}

impl ConnectionTable {
    pub fn new(registry: Arc<AgentCardRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(TableState::default()),
            populate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<AgentCardRegistry> {
        &self.registry
    }

    /// Resolve every configured agent that has no connection yet.
    ///
    /// Returns the agents that are still unresolved after this round.
    pub async fn ensure(&self, agents: &[RemoteAgent]) -> Vec<UnresolvedAgent> {
        let _guard = self.populate.lock().await;
        let pending: Vec<&RemoteAgent> = {
            let state = self.state.read();
            agents.iter().filter(|a| !state.resolved_urls.contains(&a.url)).collect()
        };
        if pending.is_empty() {
            return Vec::new();
        }
        self.resolve_all(&pending, false).await
    }

    /// Re-resolve every configured agent.
    ///
    /// Successful resolutions replace the existing connection; agents that
    /// fail are removed from the table.
    pub async fn refresh(&self, agents: &[RemoteAgent]) -> Vec<UnresolvedAgent> {
        let _guard = self.populate.lock().await;
        let all: Vec<&RemoteAgent> = agents.iter().collect();
        self.resolve_all(&all, true).await
    }

    async fn resolve_all(&self, agents: &[&RemoteAgent], remove_failed: bool) -> Vec<UnresolvedAgent> {
        let resolutions = join_all(agents.iter().map(|a| self.registry.fetch(&a.url))).await;

        let mut unresolved = Vec::new();
        let mut state = self.state.write();
        // Applied in configuration order, so for duplicate names the agent
        // listed last wins.
        for (agent, resolution) in agents.iter().zip(resolutions) {
            match resolution {
                Resolution::Resolved(card) => {
                    self.registry.insert(&agent.url, card.clone());
                    let conn = RemoteAgentConnection::new(card, agent.url.clone(), self.registry.client_for(&agent.url));
                    state.resolved_urls.insert(agent.url.clone());
                    state.by_name.retain(|name, c| c.url != agent.url || name == conn.name());
                    if let Some(old) = state.by_name.insert(conn.name().to_string(), Arc::new(conn)) {
                        if old.url != agent.url {
                            log::warn!("Duplicate agent name '{}': {} replaces {}", old.name(), agent.url, old.url);
                        }
                    }
                }
                Resolution::Unreachable { url, reason } => {
                    let known_name = self.registry.name_for_url(&url);
                    if remove_failed {
                        state.resolved_urls.remove(&url);
                        state.by_name.retain(|_, c| c.url != url);
                        self.registry.forget_url(&url);
                    }
                    unresolved.push(UnresolvedAgent {
                        label: agent.name.clone().or(known_name).unwrap_or_else(|| url.clone()),
                        url,
                        reason,
                    });
                }
            }
        }
        unresolved
    }

    /// Current connections, sorted by agent name.
    pub fn snapshot(&self) -> Vec<Arc<RemoteAgentConnection>> {
        let mut conns: Vec<_> = self.state.read().by_name.values().cloned().collect();
        conns.sort_by(|a, b| a.name().cmp(b.name()));
        conns
    }

    pub fn get(&self, name: &str) -> Option<Arc<RemoteAgentConnection>> {
        self.state.read().by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::routing::get;
    use axum::{Json, Router};
    use parking_lot::Mutex;

    use crate::a2a::config::A2AClientConfig;

    /// A card endpoint whose published name can change and which counts fetches.
    #[derive(Clone)]
    struct CardEndpoint {
        url: String,
        name: Arc<Mutex<String>>,
        hits: Arc<AtomicUsize>,
    }

    impl CardEndpoint {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        fn rename(&self, name: &str) {
            *self.name.lock() = name.to_string();
        }
    }

    async fn card_endpoint(name: &str, delay: Duration) -> CardEndpoint {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = CardEndpoint {
            url: format!("http://{}", listener.local_addr().unwrap()),
            name: Arc::new(Mutex::new(name.to_string())),
            hits: Arc::new(AtomicUsize::new(0)),
        };
        let served = endpoint.clone();
        let app = Router::new().route(
            "/.well-known/agent-card.json",
            get(move || {
                let served = served.clone();
                async move {
                    served.hits.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    let name = served.name.lock().clone();
                    Json(serde_json::json!({"name": name, "url": format!("{}/", served.url)}))
                }
            }),
        );
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        endpoint
    }

    fn table() -> ConnectionTable {
        let config = A2AClientConfig {
            timeout_secs: 5,
            ..Default::default()
        };
        ConnectionTable::new(Arc::new(AgentCardRegistry::new(config).unwrap()))
    }

    fn closed_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ensure_fetches_each_url_once() {
        let budget = card_endpoint("check_budget_agent", Duration::from_millis(100)).await;
        let legal = card_endpoint("check_legal_agent", Duration::from_millis(100)).await;
        let agents = vec![RemoteAgent::new(budget.url.clone()), RemoteAgent::new(legal.url.clone())];
        let table = Arc::new(table());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let table = table.clone();
                let agents = agents.clone();
                tokio::spawn(async move { table.ensure(&agents).await })
            })
            .collect();
        for unresolved in join_all(handles).await {
            assert!(unresolved.unwrap().is_empty());
        }

        assert_eq!(budget.hits(), 1);
        assert_eq!(legal.hits(), 1);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_skips_resolved_urls() {
        let budget = card_endpoint("check_budget_agent", Duration::ZERO).await;
        let planning = card_endpoint("check_planning_agent", Duration::ZERO).await;
        let table = table();

        table.ensure(&[RemoteAgent::new(budget.url.clone())]).await;
        let unresolved = table
            .ensure(&[RemoteAgent::new(budget.url.clone()), RemoteAgent::new(planning.url.clone())])
            .await;

        assert!(unresolved.is_empty());
        assert_eq!(budget.hits(), 1);
        assert_eq!(planning.hits(), 1);
        let names: Vec<String> = table.snapshot().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["check_budget_agent", "check_planning_agent"]);
    }

    #[tokio::test]
    async fn test_rename_on_same_url_drops_old_entry() {
        let endpoint = card_endpoint("old_name", Duration::ZERO).await;
        let agents = [RemoteAgent::new(endpoint.url.clone())];
        let table = table();
        table.ensure(&agents).await;
        assert!(table.get("old_name").is_some());

        endpoint.rename("new_name");
        assert!(table.refresh(&agents).await.is_empty());

        assert!(table.get("old_name").is_none());
        assert_eq!(table.get("new_name").unwrap().url, endpoint.url);
        assert_eq!(table.len(), 1);
        assert!(table.registry().get("old_name").is_none());
    }

    #[tokio::test]
    async fn test_refresh_replaces_live_connection() {
        let endpoint = card_endpoint("check_budget_agent", Duration::ZERO).await;
        let agents = [RemoteAgent::new(endpoint.url.clone())];
        let table = table();
        table.ensure(&agents).await;
        let before = table.get("check_budget_agent").unwrap();

        table.refresh(&agents).await;
        let after = table.get("check_budget_agent").unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(endpoint.hits(), 2);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_winner_matches_registry() {
        // The first address answers last; configuration order still decides.
        let first = card_endpoint("check_budget_agent", Duration::from_millis(300)).await;
        let second = card_endpoint("check_budget_agent", Duration::ZERO).await;
        let table = table();
        table
            .ensure(&[RemoteAgent::new(first.url.clone()), RemoteAgent::new(second.url.clone())])
            .await;

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("check_budget_agent").unwrap().url, second.url);
        let cached = table.registry().get("check_budget_agent").unwrap();
        assert_eq!(cached.url, format!("{}/", second.url));
    }

    #[tokio::test]
    async fn test_unreachable_agent_keeps_configured_label() {
        let table = table();
        let unresolved = table.ensure(&[RemoteAgent::named(closed_url(), "check_legal_agent")]).await;
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].label, "check_legal_agent");
        assert!(table.is_empty());
    }
}
