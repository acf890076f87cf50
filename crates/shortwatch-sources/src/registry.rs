//! Jurisdiction code to adapter registry.

use crate::adapter::SourceAdapter;
use crate::definition::SourceProfile;
use crate::jurisdictions::{
    Belgium, Denmark, Finland, France, Germany, Ireland, Italy, Netherlands, Norway, Spain,
    Sweden, UnitedKingdom,
};
use shortwatch_core::{CapabilityRegistry, JurisdictionCode};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Registered source adapters, indexed by jurisdiction code.
///
/// Adapters are shared behind `Arc` so a coordinator can hold one while the
/// registry is consulted elsewhere.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: Arc<RwLock<HashMap<JurisdictionCode, Arc<dyn SourceAdapter>>>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in source.
    #[must_use]
    pub fn with_default_sources() -> Self {
        let registry = Self::new();
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(Belgium::new()),
            Arc::new(Denmark::new()),
            Arc::new(Finland::new()),
            Arc::new(France::new()),
            Arc::new(Germany::new()),
            Arc::new(Ireland::new()),
            Arc::new(Italy::new()),
            Arc::new(Netherlands::new()),
            Arc::new(Norway::new()),
            Arc::new(Spain::new()),
            Arc::new(Sweden::new()),
            Arc::new(UnitedKingdom::new()),
        ];
        for adapter in adapters {
            registry.register(adapter);
        }
        info!(count = registry.count(), "registered default sources");
        registry
    }

    /// Add or replace the adapter for its jurisdiction.
    pub fn register(&self, adapter: Arc<dyn SourceAdapter>) {
        let code = adapter.code().clone();
        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        if adapters.insert(code.clone(), adapter).is_some() {
            debug!(jurisdiction = %code, "replaced source adapter");
        } else {
            debug!(jurisdiction = %code, "registered source adapter");
        }
    }

    /// Adapter for `code`, if registered.
    #[must_use]
    pub fn get(&self, code: &JurisdictionCode) -> Option<Arc<dyn SourceAdapter>> {
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        adapters.get(code).cloned()
    }

    /// Whether `code` has an adapter.
    #[must_use]
    pub fn contains(&self, code: &JurisdictionCode) -> bool {
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        adapters.contains_key(code)
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn count(&self) -> usize {
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        adapters.len()
    }

    /// Registered codes in alphabetical order.
    #[must_use]
    pub fn codes(&self) -> Vec<JurisdictionCode> {
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        let mut codes: Vec<JurisdictionCode> = adapters.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Country name for `code`, if registered.
    #[must_use]
    pub fn country_name(&self, code: &JurisdictionCode) -> Option<String> {
        self.get(code).map(|adapter| adapter.profile().name.clone())
    }

    /// Profiles of every registered source, ordered by code.
    #[must_use]
    pub fn profiles(&self) -> Vec<SourceProfile> {
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        let mut profiles: Vec<SourceProfile> =
            adapters.values().map(|adapter| adapter.profile().clone()).collect();
        profiles.sort_by(|a, b| a.code.cmp(&b.code));
        profiles
    }

    /// Codes whose transport is usable with the given capabilities.
    #[must_use]
    pub fn available(&self, capabilities: &CapabilityRegistry) -> Vec<JurisdictionCode> {
        self.profiles()
            .into_iter()
            .filter(|profile| {
                let usable = capabilities.supports_all(&profile.required_capabilities());
                if !usable {
                    debug!(jurisdiction = %profile.code, transport = %profile.transport, "source unavailable");
                }
                usable
            })
            .map(|profile| profile.code)
            .collect()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("codes", &self.codes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortwatch_core::{ActivityRule, Capability};

    fn code(value: &str) -> JurisdictionCode {
        JurisdictionCode::new(value).expect("valid code")
    }

    #[test]
    fn test_default_sources_registered() {
        let registry = SourceRegistry::with_default_sources();
        assert_eq!(registry.count(), 12);

        let codes: Vec<String> = registry.codes().iter().map(ToString::to_string).collect();
        assert_eq!(
            codes,
            vec!["BE", "DE", "DK", "ES", "FI", "FR", "GB", "IE", "IT", "NL", "NO", "SE"]
        );
    }

    #[test]
    fn test_lookup() {
        let registry = SourceRegistry::with_default_sources();
        assert!(registry.contains(&code("fr")));
        assert!(registry.get(&code("US")).is_none());
        assert_eq!(registry.country_name(&code("GB")).as_deref(), Some("United Kingdom"));
    }

    #[test]
    fn test_only_france_uses_composite_rule() {
        let registry = SourceRegistry::with_default_sources();
        let composite: Vec<String> = registry
            .profiles()
            .into_iter()
            .filter(|p| matches!(p.activity_rule, ActivityRule::Composite(_)))
            .map(|p| p.code.to_string())
            .collect();
        assert_eq!(composite, vec!["FR"]);
    }

    #[test]
    fn test_available_filters_browser_sources() {
        let registry = SourceRegistry::with_default_sources();

        let mut capabilities = CapabilityRegistry::new();
        let without_browser = registry.available(&capabilities);
        assert_eq!(without_browser.len(), 8);
        assert!(!without_browser.contains(&code("NO")));

        capabilities.enable(Capability::BrowserAutomation);
        assert_eq!(registry.available(&capabilities).len(), 12);
    }

    #[test]
    fn test_register_replaces() {
        let registry = SourceRegistry::new();
        registry.register(Arc::new(France::new()));
        registry.register(Arc::new(France::new()));
        assert_eq!(registry.count(), 1);
    }
}
