//! Swarm Facade
//!
//! The external entry point: owns the shared substrate (event bus, rate
//! limiter, token accountant, LLM client, tool registry, file locks) and
//! exposes build / resume / continue operations plus configuration updates
//! to outer surfaces (CLI, dashboards).

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use swarm_core::{
    ConfigUpdate, EventBus, FileLocks, RateLimiter, SharedConfig, SubscriptionId, SwarmConfig,
    SwarmError, SwarmEvent, SwarmResult, TokenAccountant, TokenTotals,
};
use swarm_llm::LlmClient;
use swarm_tools::{worker_toolset, ToolRegistry};

use crate::models::ProjectContext;
use crate::services::checkpoint;
use crate::services::orchestrator::{BuildOutcome, Orchestrator};
use crate::services::verifier::{CommandVerifier, ProjectVerifier};

pub struct Swarm {
    config: SharedConfig,
    bus: Arc<EventBus>,
    shared_limiter: Arc<RateLimiter>,
    accountant: Arc<TokenAccountant>,
    client: Arc<LlmClient>,
    registry: Arc<ToolRegistry>,
    file_locks: Arc<FileLocks>,
    verifier: Arc<dyn ProjectVerifier>,
}

impl Swarm {
    pub fn new(config: SwarmConfig) -> SwarmResult<Self> {
        Self::with_verifier(config, Arc::new(CommandVerifier))
    }

    /// Construct with a custom verifier (tests, alternative build
    /// systems).
    pub fn with_verifier(
        config: SwarmConfig,
        verifier: Arc<dyn ProjectVerifier>,
    ) -> SwarmResult<Self> {
        config.validate().map_err(SwarmError::config)?;

        let bus = Arc::new(EventBus::new());
        let shared_limiter = Arc::new(RateLimiter::new(
            config.max_concurrent,
            config.max_calls_per_hour,
            bus.clone(),
        ));
        let accountant = Arc::new(TokenAccountant::new(bus.clone()));
        let shared_config = SharedConfig::new(config);
        let client = Arc::new(LlmClient::new(
            shared_config.clone(),
            shared_limiter.clone(),
            accountant.clone(),
            bus.clone(),
        ));

        Ok(Self {
            config: shared_config,
            bus,
            shared_limiter,
            accountant,
            client,
            registry: Arc::new(worker_toolset()),
            file_locks: Arc::new(FileLocks::new()),
            verifier,
        })
    }

    /// The event bus external observers subscribe on.
    pub fn events(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SwarmEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    pub fn config(&self) -> SwarmConfig {
        self.config.snapshot()
    }

    /// Apply a runtime configuration update. Limit changes are pushed into
    /// the live shared limiter; per-worker limiters pick the new bounds up
    /// on the next build.
    pub fn update_config(&self, update: ConfigUpdate) -> SwarmResult<SwarmConfig> {
        let mut candidate = self.config.snapshot();
        update.apply_to(&mut candidate);
        candidate.validate().map_err(SwarmError::config)?;

        self.config.replace(candidate.clone());
        if update.affects_rate_limits() {
            self.shared_limiter
                .update_limits(candidate.max_concurrent, candidate.max_calls_per_hour);
        }
        Ok(candidate)
    }

    pub fn token_totals(&self) -> TokenTotals {
        self.accountant.totals()
    }

    /// Start a fresh build of `task` in `root`. If a checkpoint exists it
    /// is resumed instead (interrupted builds pick up where they left
    /// off).
    pub async fn build(&self, task: &str, root: &Path) -> SwarmResult<BuildOutcome> {
        self.accountant.reset();
        let mut ctx = match checkpoint::load(root).await {
            Some(saved) => {
                info!("existing checkpoint found; resuming");
                saved.into_project_context()
            }
            None => ProjectContext::new(root, task),
        };
        self.orchestrator().run(&mut ctx).await
    }

    /// Resume a checkpointed build. Errors if no checkpoint exists.
    pub async fn resume(&self, root: &Path) -> SwarmResult<BuildOutcome> {
        self.accountant.reset();
        let saved = checkpoint::load(root)
            .await
            .ok_or_else(|| SwarmError::validation("no checkpoint found to resume"))?;
        let mut ctx = saved.into_project_context();
        self.orchestrator().run(&mut ctx).await
    }

    /// Continue a finished build with a change request. Completed subtasks
    /// are not re-executed; new subtasks run alongside them.
    pub async fn continue_build(
        &self,
        root: &Path,
        change_request: &str,
    ) -> SwarmResult<BuildOutcome> {
        let saved = checkpoint::load(root)
            .await
            .ok_or_else(|| SwarmError::validation("no checkpoint found to continue from"))?;
        let mut ctx = saved.into_project_context();
        self.orchestrator()
            .continue_build(&mut ctx, change_request)
            .await
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.config.clone(),
            self.client.clone(),
            self.registry.clone(),
            self.file_locks.clone(),
            self.bus.clone(),
            self.verifier.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let config = SwarmConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(Swarm::new(config).is_err());
    }

    #[test]
    fn test_update_config_pushes_limits() {
        let swarm = Swarm::new(SwarmConfig::default()).unwrap();
        let updated = swarm
            .update_config(ConfigUpdate {
                max_concurrent: Some(7),
                model: Some("gpt-4.1".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.max_concurrent, 7);
        assert_eq!(swarm.config().model, "gpt-4.1");
    }

    #[test]
    fn test_update_config_validates() {
        let swarm = Swarm::new(SwarmConfig::default()).unwrap();
        let result = swarm.update_config(ConfigUpdate {
            max_concurrent: Some(0),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resume_without_checkpoint_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let swarm = Swarm::new(SwarmConfig::default()).unwrap();
        let result = swarm.resume(dir.path()).await;
        assert!(matches!(result, Err(SwarmError::Validation(_))));
    }
}
