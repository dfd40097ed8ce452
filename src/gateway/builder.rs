//! Builder for configuring gateway instances.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::{KnowledgeSource, LanguageBackend};
use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;
use crate::reload::{ChangeEvent, HotReloadController, PipelineFactory, ReloadConfig};
use crate::{Muninn, MuninnError, Result};

/// Default factory: rebuilds a pipeline from the builder's configuration
/// and collaborators.
struct ConfigFactory {
    config: PipelineConfig,
    backend: Arc<dyn LanguageBackend>,
    knowledge: Vec<Arc<dyn KnowledgeSource>>,
}

impl PipelineFactory for ConfigFactory {
    fn build(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(
            self.config.clone(),
            Arc::clone(&self.backend),
            self.knowledge.clone(),
        ))
    }
}

/// Builder for configuring gateway instances.
///
/// A [`LanguageBackend`] is required; everything else has defaults.
pub struct MuninnBuilder {
    backend: Option<Arc<dyn LanguageBackend>>,
    knowledge: Vec<Arc<dyn KnowledgeSource>>,
    config: PipelineConfig,
    reload: ReloadConfig,
    factory: Option<Arc<dyn PipelineFactory>>,
    changes: Option<mpsc::Receiver<ChangeEvent>>,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            knowledge: Vec::new(),
            config: PipelineConfig::default(),
            reload: ReloadConfig::default(),
            factory: None,
            changes: None,
        }
    }

    /// Set the text-generation backend (required).
    pub fn backend(mut self, backend: Arc<dyn LanguageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Add a knowledge source consulted when building prompt context.
    pub fn knowledge_source(mut self, source: Arc<dyn KnowledgeSource>) -> Self {
        self.knowledge.push(source);
        self
    }

    /// Set the pipeline configuration.
    pub fn pipeline(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the reload controller configuration.
    pub fn reload(mut self, config: ReloadConfig) -> Self {
        self.reload = config;
        self
    }

    /// Override the factory used to build replacement pipelines during a
    /// reload. Without this, reloads rebuild from the builder's own
    /// configuration and collaborators.
    pub fn pipeline_factory(mut self, factory: Arc<dyn PipelineFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Attach a change-signal source (e.g. a filesystem watcher bridge).
    /// Events are debounced per the reload configuration.
    pub fn change_signal(mut self, changes: mpsc::Receiver<ChangeEvent>) -> Self {
        self.changes = Some(changes);
        self
    }

    /// Build the gateway, spawning workers, the updater, and (when a
    /// change signal is attached) the watcher task.
    ///
    /// Requires a tokio runtime context.
    pub fn build(self) -> Result<Muninn> {
        let factory: Arc<dyn PipelineFactory> = match self.factory {
            Some(factory) => factory,
            None => {
                let backend = self.backend.ok_or(MuninnError::NoBackend)?;
                Arc::new(ConfigFactory {
                    config: self.config,
                    backend,
                    knowledge: self.knowledge,
                })
            }
        };

        let initial = factory.build()?;
        let controller = Arc::new(HotReloadController::new(initial, factory, self.reload));
        if let Some(changes) = self.changes {
            controller.spawn_watcher(changes);
        }
        Ok(Muninn::from_controller(controller))
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
