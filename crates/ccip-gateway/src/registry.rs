use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// A deterministic compute function: same params, same result. The registry
/// treats implementations as opaque; they may suspend (network, sleep) and
/// the caller must not hold any lock across `call`.
#[async_trait]
pub trait ComputeFunction: Send + Sync {
    async fn call(&self, params: &Map<String, Value>) -> anyhow::Result<Value>;
}

/// Name → compute function mapping. Populated at startup, immutable after;
/// at most one implementation per name.
#[derive(Default)]
pub struct ComputeRegistry {
    functions: HashMap<String, Arc<dyn ComputeFunction>>,
}

impl ComputeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: Arc<dyn ComputeFunction>,
    ) -> anyhow::Result<()> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            anyhow::bail!("compute function already registered: {name}");
        }
        self.functions.insert(name, function);
        Ok(())
    }

    /// Registered names, sorted for stable listings.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn dispatch(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, GatewayError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| GatewayError::UnknownMethod(name.to_string()))?;
        function
            .call(params)
            .await
            .map_err(|e| GatewayError::Compute(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ComputeFunction for Echo {
        async fn call(&self, params: &Map<String, Value>) -> anyhow::Result<Value> {
            Ok(Value::Object(params.clone()))
        }
    }

    struct Failing;

    #[async_trait]
    impl ComputeFunction for Failing {
        async fn call(&self, _params: &Map<String, Value>) -> anyhow::Result<Value> {
            anyhow::bail!("upstream unavailable")
        }
    }

    #[tokio::test]
    async fn dispatch_runs_the_registered_function() {
        let mut registry = ComputeRegistry::new();
        registry.register("echo", Arc::new(Echo)).unwrap();

        let mut params = Map::new();
        params.insert("pair".into(), json!("ethereum"));
        let result = registry.dispatch("echo", &params).await.unwrap();
        assert_eq!(result["pair"], "ethereum");
    }

    #[tokio::test]
    async fn unknown_method_is_an_error() {
        let registry = ComputeRegistry::new();
        let err = registry.dispatch("nosuch", &Map::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownMethod(ref n) if n == "nosuch"));
    }

    #[tokio::test]
    async fn compute_failures_surface_their_message() {
        let mut registry = ComputeRegistry::new();
        registry.register("flaky", Arc::new(Failing)).unwrap();
        let err = registry.dispatch("flaky", &Map::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Compute(ref m) if m.contains("upstream")));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = ComputeRegistry::new();
        registry.register("echo", Arc::new(Echo)).unwrap();
        assert!(registry.register("echo", Arc::new(Echo)).is_err());
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ComputeRegistry::new();
        registry.register("zeta", Arc::new(Echo)).unwrap();
        registry.register("alpha", Arc::new(Echo)).unwrap();
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }
}
