/// Bridge implementation registry
///
/// Maps the `x11-bridge` configuration value to a constructor.
use crate::bridge::xpra::{XpraBridge, SERVICE_NAME};
use crate::bridge::BridgeContext;
use crate::config::types::{BridgeError, Result};
use crate::core::service::Service;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type BridgeFactory = dyn Fn(&str, &BridgeContext) -> Result<Box<dyn Service>> + Send + Sync;

#[derive(Default)]
pub struct BridgeRegistry {
    factories: BTreeMap<String, Arc<BridgeFactory>>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in bridge.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            SERVICE_NAME.to_string(),
            Arc::new(|owner: &str, ctx: &BridgeContext| -> Result<Box<dyn Service>> {
                Ok(Box::new(XpraBridge::new(owner, ctx)?))
            }),
        );
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(&str, &BridgeContext) -> Result<Box<dyn Service>> + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(BridgeError::Config(format!(
                "Bridge '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn create(&self, name: &str, owner: &str, ctx: &BridgeContext) -> Result<Box<dyn Service>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BridgeError::UnknownBridge(name.to_string()))?;
        factory(owner, ctx)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Build the bridge selected by `ctx.config.x11_bridge` for `owner`.
pub fn bridge_for(owner: &str, ctx: &BridgeContext) -> Result<Box<dyn Service>> {
    BridgeRegistry::with_defaults().create(&ctx.config.x11_bridge, owner, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::BridgeConfig;
    use crate::registry::json::JsonRegistry;
    use crate::testing::FakeRuntime;

    fn context(bridge: &str) -> BridgeContext {
        let mut config = BridgeConfig::default();
        config.x11_bridge = bridge.to_string();
        BridgeContext::new(
            config,
            Arc::new(JsonRegistry::in_memory()),
            Arc::new(FakeRuntime::new()),
        )
    }

    #[test]
    fn test_defaults_include_xpra() {
        let registry = BridgeRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["xpra"]);

        let bridge = bridge_for("browser", &context("xpra")).unwrap();
        assert_eq!(bridge.name(), "xpra");
        assert_eq!(bridge.owner(), "browser");
    }

    #[test]
    fn test_unknown_bridge_is_rejected() {
        let result = bridge_for("browser", &context("vnc"));
        assert!(matches!(result, Err(BridgeError::UnknownBridge(name)) if name == "vnc"));
    }

    #[test]
    fn test_path_like_owner_is_rejected() {
        let result = bridge_for("../../etc", &context("xpra"));
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = BridgeRegistry::with_defaults();
        let result = registry.register("xpra", |owner, ctx| -> Result<Box<dyn Service>> {
            Ok(Box::new(XpraBridge::new(owner, ctx)?))
        });
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }
}
