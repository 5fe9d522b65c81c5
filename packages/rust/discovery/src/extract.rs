//! Resolve which export of a config module holds the collections mapping.
//!
//! Config modules export collections in different shapes. Each shape is one
//! [`ExtractStrategy`]; strategies are evaluated in [`ExtractStrategy::ORDER`]
//! and the first hit wins.

use content_viewer_shared::{CollectionsMap, ConfigModule, HostValue};
use tracing::debug;

use crate::looks_like_collections;

/// One way a config module may expose its collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStrategy {
    /// `export const collections = { ... }`
    NamedCollections,
    /// `export default { collections: { ... } }`
    DefaultCollections,
    /// `export default { ... }` where the default export is the mapping itself.
    DefaultExport,
    /// Any other named export with the right shape (`export { data }`).
    AnyNamedExport,
}

impl ExtractStrategy {
    /// Resolution order.
    pub const ORDER: [Self; 4] = [
        Self::NamedCollections,
        Self::DefaultCollections,
        Self::DefaultExport,
        Self::AnyNamedExport,
    ];

    /// Human-readable strategy name for tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NamedCollections => "named-collections",
            Self::DefaultCollections => "default-collections",
            Self::DefaultExport => "default-export",
            Self::AnyNamedExport => "any-named-export",
        }
    }

    /// Run this strategy alone against `module`.
    pub fn apply<'m>(&self, module: &'m ConfigModule) -> Option<&'m CollectionsMap> {
        let candidate = match self {
            Self::NamedCollections => module.export("collections"),
            Self::DefaultCollections => module
                .export("default")
                .and_then(HostValue::as_object)
                .and_then(|default| default.get("collections")),
            Self::DefaultExport => module.export("default"),
            Self::AnyNamedExport => module
                .exports()
                .filter(|(name, _)| *name != "default")
                .map(|(_, value)| value)
                .find(|value| looks_like_collections(value)),
        };

        candidate
            .filter(|value| looks_like_collections(value))
            .and_then(HostValue::as_object)
    }
}

/// Run the strategies in order; report which one matched.
pub fn extract_with_strategy(module: &ConfigModule) -> Option<(ExtractStrategy, &CollectionsMap)> {
    ExtractStrategy::ORDER.iter().find_map(|strategy| {
        let found = strategy.apply(module);
        if found.is_none() {
            debug!(strategy = strategy.name(), "strategy did not match");
        }
        found.map(|collections| (*strategy, collections))
    })
}

/// The collections mapping exported by `module`, if any strategy finds one.
pub fn extract(module: &ConfigModule) -> Option<&CollectionsMap> {
    extract_with_strategy(module).map(|(_, collections)| collections)
}
