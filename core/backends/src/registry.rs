//! Backend registry for resolving adapters by name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::BackendAdapter;
use crate::command::{CommandRunner, TokioCommandRunner};
use crate::config::ProtocolConfig;
use crate::locks::ArtifactLocks;
use crate::memory::MemoryBackend;
use crate::protocols::{
    self, DropbearBackend, HttpBackend, SquidBackend, SshBackend, SslBackend, UdpBackend,
    WebSocketBackend, XrayBackend,
};
use vpsgate_common::{Error, Result};

/// Everything a factory may need to build an adapter.
///
/// Adapters built from one context share its runner and artifact locks.
#[derive(Clone)]
pub struct BackendContext {
    pub config: ProtocolConfig,
    pub runner: Arc<dyn CommandRunner>,
    pub locks: ArtifactLocks,
}

impl BackendContext {
    /// Context using real processes.
    pub fn new(config: ProtocolConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioCommandRunner::default()))
    }

    pub fn with_runner(config: ProtocolConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            locks: ArtifactLocks::new(),
        }
    }
}

/// Factory function type for creating adapters.
pub type BackendFactory =
    Box<dyn Fn(&BackendContext) -> Result<Arc<dyn BackendAdapter>> + Send + Sync>;

/// Registry of backend factories.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory.
    ///
    /// # Errors
    /// - `name` is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: BackendFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Backend '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Build one adapter by name.
    ///
    /// # Errors
    /// - Backend not registered
    /// - The factory rejects the context
    pub fn resolve(&self, name: &str, ctx: &BackendContext) -> Result<Arc<dyn BackendAdapter>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Backend '{}' is not registered", name)))?;
        factory(ctx)
    }

    /// Build adapters for `names`, preserving their order.
    ///
    /// Fails on the first unknown name, before any adapter is used.
    pub fn build(&self, names: &[String], ctx: &BackendContext) -> Result<Vec<Arc<dyn BackendAdapter>>> {
        names.iter().map(|name| self.resolve(name, ctx)).collect()
    }

    /// Get list of registered backend names.
    pub fn providers(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Check if a backend is registered.
    pub fn has_backend(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn factory<F>(f: F) -> BackendFactory
where
    F: Fn(&BackendContext) -> Result<Arc<dyn BackendAdapter>> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Create a registry with every protocol adapter plus `memory`.
pub fn create_default_registry() -> BackendRegistry {
    let defaults: [(&str, BackendFactory); 9] = [
        (
            protocols::SSH,
            factory(|ctx| Ok(Arc::new(SshBackend::new(&ctx.config.ssh, ctx.runner.clone())))),
        ),
        (
            protocols::XRAY,
            factory(|ctx| {
                Ok(Arc::new(XrayBackend::new(
                    &ctx.config.xray,
                    ctx.runner.clone(),
                    ctx.locks.clone(),
                )))
            }),
        ),
        (
            protocols::SSL,
            factory(|ctx| Ok(Arc::new(SslBackend::new(&ctx.config.ssl, ctx.runner.clone())))),
        ),
        (
            protocols::WEBSOCKET,
            factory(|ctx| {
                Ok(Arc::new(WebSocketBackend::new(
                    &ctx.config.websocket,
                    &ctx.config.ssl,
                )))
            }),
        ),
        (
            protocols::HTTP,
            factory(|ctx| {
                Ok(Arc::new(HttpBackend::new(
                    &ctx.config.http,
                    ctx.runner.clone(),
                    ctx.locks.clone(),
                )))
            }),
        ),
        (
            protocols::SQUID,
            factory(|ctx| {
                Ok(Arc::new(SquidBackend::new(
                    &ctx.config.squid,
                    ctx.runner.clone(),
                    ctx.locks.clone(),
                )))
            }),
        ),
        (
            protocols::UDP,
            factory(|ctx| Ok(Arc::new(UdpBackend::new(&ctx.config.udp)))),
        ),
        (
            protocols::DROPBEAR,
            factory(|ctx| {
                Ok(Arc::new(DropbearBackend::new(
                    &ctx.config.dropbear,
                    ctx.runner.clone(),
                )))
            }),
        ),
        // For dry runs and tests.
        ("memory", factory(|_| Ok(Arc::new(MemoryBackend::new("memory"))))),
    ];

    BackendRegistry {
        factories: defaults
            .into_iter()
            .map(|(name, factory)| (name.to_string(), factory))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::ScriptedRunner;
    use crate::protocols::CANONICAL_ORDER;

    fn ctx() -> BackendContext {
        BackendContext::with_runner(ProtocolConfig::default(), Arc::new(ScriptedRunner::new()))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = BackendRegistry::new();
        registry
            .register("test", factory(|_| Ok(Arc::new(MemoryBackend::new("test")))))
            .unwrap();

        let backend = registry.resolve("test", &ctx()).unwrap();
        assert_eq!(backend.name(), "test");
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = BackendRegistry::new();
        registry
            .register("test", factory(|_| Ok(Arc::new(MemoryBackend::new("test")))))
            .unwrap();

        let result = registry.register("test", factory(|_| Ok(Arc::new(MemoryBackend::new("test")))));
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = BackendRegistry::new();
        let result = registry.resolve("unknown", &ctx());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_default_registry_builds_canonical_order() {
        let registry = create_default_registry();
        assert!(registry.has_backend("memory"));
        assert_eq!(registry.providers().len(), 9);

        let names: Vec<String> = CANONICAL_ORDER.iter().map(|s| s.to_string()).collect();
        let adapters = registry.build(&names, &ctx()).unwrap();
        let built: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
        assert_eq!(built, CANONICAL_ORDER.to_vec());
    }

    #[test]
    fn test_build_fails_on_unknown_name() {
        let registry = create_default_registry();
        let names = vec!["ssh".to_string(), "openvpn".to_string()];
        assert!(registry.build(&names, &ctx()).is_err());
    }
}
