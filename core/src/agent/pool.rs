//! Multi-agent lifecycle management and graceful shutdown/resume (§4.10).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::model::ModelClient;
use crate::sandbox::Sandbox;
use crate::store::Store;
use crate::tools::Tool;

use super::{Agent, AgentDeps, ResumeStrategy};

/// The collaborators every agent in a pool shares; cloned (by `Arc`) into a
/// fresh [`AgentDeps`] each time an agent is created or resumed.
#[derive(Clone)]
pub struct PoolDeps {
    pub store: Arc<dyn Store>,
    pub sandbox: Arc<dyn Sandbox>,
    pub model: Arc<dyn ModelClient>,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl PoolDeps {
    fn to_agent_deps(&self) -> AgentDeps {
        AgentDeps {
            store: self.store.clone(),
            sandbox: self.sandbox.clone(),
            model: self.model.clone(),
            tools: self.tools.clone(),
        }
    }
}

pub struct ShutdownOptions {
    pub timeout: Duration,
    pub save_running_list: bool,
    pub force_interrupt: bool,
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            save_running_list: true,
            force_interrupt: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub interrupted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

const RUNNING_LIST_KEY: &str = "__pool_running_list__";

/// Holds every live agent keyed by id, bounded by `max_agents`.
pub struct AgentPool {
    deps: PoolDeps,
    max_agents: usize,
    agents: DashMap<String, Arc<Agent>>,
}

impl AgentPool {
    pub fn new(deps: PoolDeps, max_agents: usize) -> Self {
        Self {
            deps,
            max_agents: max_agents.max(1),
            agents: DashMap::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.agents.len()
    }

    pub fn list(&self) -> Vec<String> {
        self.agents.iter().map(|e| e.key().clone()).collect()
    }

    pub fn get(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.agents.get(agent_id).map(|e| e.clone())
    }

    #[instrument(name = "pool.create", skip(self, config))]
    pub async fn create(&self, config: AgentConfig) -> Result<Arc<Agent>, AgentError> {
        if self.agents.len() >= self.max_agents {
            return Err(AgentError::PoolFull {
                max_agents: self.max_agents,
            });
        }
        let agent = Agent::create(config, self.deps.to_agent_deps()).await?;
        self.agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    #[instrument(name = "pool.resume", skip(self, config))]
    pub async fn resume(
        &self,
        agent_id: &str,
        config: AgentConfig,
        strategy: ResumeStrategy,
    ) -> Result<Arc<Agent>, AgentError> {
        if let Some(existing) = self.get(agent_id) {
            return Ok(existing);
        }
        let agent = Agent::resume(agent_id, config, self.deps.to_agent_deps(), strategy).await?;
        self.agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    /// Resumes every agent id previously saved by [`Self::graceful_shutdown`]
    /// (when `save_running_list` was set), using `config_factory` to build
    /// each one's config from its id.
    #[instrument(name = "pool.resume_all", skip(self, config_factory))]
    pub async fn resume_all(
        &self,
        config_factory: impl Fn(&str) -> AgentConfig,
    ) -> Vec<Result<Arc<Agent>, AgentError>> {
        let ids = self
            .deps
            .store
            .load_media_cache(RUNNING_LIST_KEY)
            .await
            .ok()
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(agent_id) = id.as_str() else { continue };
            let config = config_factory(agent_id);
            results.push(self.resume(agent_id, config, ResumeStrategy::Crash).await);
        }
        results
    }

    /// Creates a new agent seeded from `agent_id`'s latest snapshot (or its
    /// live message history if `snapshot_id` is `None`), recording the
    /// parent in its lineage (§4.6 "fork").
    #[instrument(name = "pool.fork", skip(self, config))]
    pub async fn fork(
        &self,
        agent_id: &str,
        snapshot_id: Option<String>,
        config: AgentConfig,
    ) -> Result<Arc<Agent>, AgentError> {
        let parent = self.get(agent_id).ok_or_else(|| {
            AgentError::Resume(crate::error::ResumeError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })
        })?;

        let messages = if let Some(snapshot_id) = snapshot_id {
            parent.load_snapshot(&snapshot_id).await?.messages
        } else {
            parent.messages.read().clone()
        };

        let child = Agent::create(config, self.deps.to_agent_deps()).await?;
        *child.messages.write() = messages;
        {
            let mut metadata = child.metadata.write();
            metadata.lineage.push(agent_id.to_string());
            metadata.updated_at = OffsetDateTime::now_utc();
        }
        child.persist_info().await?;
        let persisted = child.messages.read().clone();
        self.deps
            .store
            .save_messages(&child.id, &persisted)
            .await
            .map_err(AgentError::from)?;

        self.agents.insert(child.id.clone(), child.clone());
        Ok(child)
    }

    pub async fn delete(&self, agent_id: &str) -> Result<(), AgentError> {
        self.agents.remove(agent_id);
        self.deps.store.delete(agent_id).await.map_err(AgentError::from)
    }

    /// Interrupts every running agent (bounded by `opts.timeout`), saves the
    /// running id list when requested, then drops them from the pool.
    #[instrument(name = "pool.graceful_shutdown", skip(self, opts))]
    pub async fn graceful_shutdown(&self, opts: ShutdownOptions) -> ShutdownReport {
        let ids = self.list();
        let mut report = ShutdownReport::default();

        if opts.save_running_list {
            let value = serde_json::Value::Array(
                ids.iter().map(|id| serde_json::Value::String(id.clone())).collect(),
            );
            if let Err(err) = self.deps.store.save_media_cache(RUNNING_LIST_KEY, &value).await {
                warn!(?err, "failed to persist running agent list");
            }
        }

        let shutdown = async {
            for id in &ids {
                if let Some(agent) = self.get(id) {
                    if opts.force_interrupt {
                        agent.interrupt(Some("pool shutdown".to_string())).await;
                    }
                    report.interrupted.push(id.clone());
                }
            }
        };

        if tokio::time::timeout(opts.timeout, shutdown).await.is_err() {
            warn!("graceful shutdown exceeded timeout, remaining agents dropped without interrupt");
        }

        for id in ids {
            self.agents.remove(&id);
        }
        info!(count = report.interrupted.len(), "pool shutdown complete");
        report
    }

    /// Installs SIGTERM/SIGINT handlers that run [`Self::graceful_shutdown`]
    /// once and then exit the process, mirroring a typical server's signal
    /// handling.
    pub fn register_shutdown_handlers(self: Arc<Self>) {
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");

            #[cfg(unix)]
            tokio::select! {
                _ = ctrl_c => {},
                _ = term.recv() => {},
            }
            #[cfg(not(unix))]
            let _ = ctrl_c.await;

            info!("shutdown signal received");
            self.graceful_shutdown(ShutdownOptions::default()).await;
            std::process::exit(0);
        });
    }
}

