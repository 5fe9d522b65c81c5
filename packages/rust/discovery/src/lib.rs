//! Content config discovery.
//!
//! Before anything can be listed, we have to find the module that defines the
//! project's content collections. It can live at several paths and export the
//! collections in several shapes, so discovery happens in two steps:
//!
//! 1. [`locate`] walks [`CANDIDATE_PATHS`] in order and keeps the first module
//!    that looks like it defines collections.
//! 2. [`extract`] picks the export that actually holds the collections mapping.
//!
//! Both steps rely on [`looks_like_collections`], a structural test: an object
//! whose values include at least one object carrying a marker key. Any other
//! object with that shape is indistinguishable from real collections, and that
//! is accepted.

mod extract;

use content_viewer_shared::{
    CollectionsMap, ConfigModule, ContentViewerError, HostValue, ModuleLoader, Result,
};
use tracing::{debug, info, instrument};

pub use extract::{ExtractStrategy, extract, extract_with_strategy};

/// Every location the content config may live at, in resolution priority.
pub const CANDIDATE_PATHS: [&str; 6] = [
    "/src/content/config.ts",
    "/src/content/config.mjs",
    "/src/content/config.js",
    "/src/content.config.ts",
    "/src/content.config.mjs",
    "/src/content.config.js",
];

/// Keys whose presence marks an object as a collection definition.
pub const MARKER_KEYS: [&str; 3] = ["schema", "loader", "type"];

// ---------------------------------------------------------------------------
// Shape test
// ---------------------------------------------------------------------------

/// Whether `value` is an object carrying at least one marker key.
pub fn is_collection_definition(value: &HostValue) -> bool {
    value
        .as_object()
        .is_some_and(|obj| MARKER_KEYS.iter().any(|key| obj.contains_key(*key)))
}

/// Whether `value` is an object with at least one collection definition among its values.
pub fn looks_like_collections(value: &HostValue) -> bool {
    // Arrays and class instances do not count, unlike a `typeof` check.
    value
        .as_object()
        .is_some_and(|obj| obj.values().any(is_collection_definition))
}

fn export_looks_like_collections(module: &ConfigModule, name: &str) -> bool {
    module.export(name).is_some_and(looks_like_collections)
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// A candidate path together with the module it produced.
#[derive(Debug, Clone)]
pub struct LocatedConfig {
    pub path: String,
    pub module: ConfigModule,
}

/// Find the first candidate whose module exports collections as `collections`
/// or as its default export.
///
/// Load failures are never propagated: a candidate that fails to load is simply
/// skipped. Returns `None` once every candidate is exhausted.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub async fn locate(candidates: &[&str], loader: &dyn ModuleLoader) -> Option<LocatedConfig> {
    for &path in candidates {
        let module = match loader.load_module(path).await {
            Ok(module) => module,
            Err(e) => {
                debug!(path, error = %e, "candidate did not load");
                continue;
            }
        };

        if export_looks_like_collections(&module, "collections")
            || export_looks_like_collections(&module, "default")
        {
            info!(path, "content config found");
            return Some(LocatedConfig {
                path: path.to_string(),
                module,
            });
        }

        debug!(path, "candidate loaded but exports no collections");
    }

    None
}

/// Locate the content config and extract its collections mapping.
///
/// Fails with [`ContentViewerError::ConfigNotFound`] when no candidate matches,
/// and with [`ContentViewerError::NoCollections`] when the located module has no
/// extractable collections.
#[instrument(skip_all)]
pub async fn discover_collections(loader: &dyn ModuleLoader) -> Result<(String, CollectionsMap)> {
    let found = locate(&CANDIDATE_PATHS, loader)
        .await
        .ok_or(ContentViewerError::ConfigNotFound)?;

    let (strategy, collections) =
        extract_with_strategy(&found.module).ok_or(ContentViewerError::NoCollections)?;

    info!(
        path = %found.path,
        strategy = strategy.name(),
        collections = collections.len(),
        "collections extracted"
    );

    Ok((found.path, collections.clone()))
}


#[cfg(test)]
mod tests {
    use super::test_support::{StubLoader, module};
    use super::*;
    use serde_json::json;

    fn blog_collections() -> serde_json::Value {
        json!({"blog": {"loader": {"$opaque": "object"}, "schema": {"$opaque": "function"}}})
    }

    #[test]
    fn marker_keys_make_a_definition() {
        let value = HostValue::try_from(json!({"type": "content"})).unwrap();
        assert!(is_collection_definition(&value));

        let value = HostValue::try_from(json!({"title": "x"})).unwrap();
        assert!(!is_collection_definition(&value));
    }

    #[test]
    fn marker_key_with_undefined_value_still_counts() {
        let value = HostValue::try_from(json!({"posts": {"schema": {"$undefined": true}}})).unwrap();
        assert!(looks_like_collections(&value));
    }

    #[test]
    fn non_objects_never_look_like_collections() {
        for raw in [json!(null), json!("blog"), json!(3), json!([{"schema": 1}])] {
            let value = HostValue::try_from(raw).unwrap();
            assert!(!looks_like_collections(&value));
        }
        let empty = HostValue::try_from(json!({})).unwrap();
        assert!(!looks_like_collections(&empty));
    }

    #[test]
    fn one_matching_value_is_enough() {
        let value = HostValue::try_from(json!({
            "version": 2,
            "blog": {"schema": {"$opaque": "function"}},
        }))
        .unwrap();
        assert!(looks_like_collections(&value));
    }

    #[tokio::test]
    async fn locate_returns_first_matching_candidate() {
        let loader = StubLoader::default()
            .with("a", module(json!({"helpers": {}})))
            .with("b", module(json!({"collections": blog_collections()})))
            .with("c", module(json!({"collections": blog_collections()})));

        let found = locate(&["a", "b", "c"], &loader).await.expect("found");
        assert_eq!(found.path, "b");
        assert_eq!(loader.requested(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn locate_skips_load_failures() {
        let loader = StubLoader::default().with("c", module(json!({"default": blog_collections()})));

        let found = locate(&["a", "b", "c"], &loader).await.expect("found");
        assert_eq!(found.path, "c");
        assert_eq!(loader.requested(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn locate_returns_none_when_exhausted() {
        let loader = StubLoader::default().with("a", module(json!({"data": blog_collections()})));
        assert!(locate(&["a", "b"], &loader).await.is_none());
    }

    #[tokio::test]
    async fn candidate_paths_are_tried_in_priority_order() {
        let loader = StubLoader::default();
        assert!(locate(&CANDIDATE_PATHS, &loader).await.is_none());
        assert_eq!(loader.requested(), CANDIDATE_PATHS.to_vec());
    }

    #[tokio::test]
    async fn discover_reports_missing_config() {
        let loader = StubLoader::default();
        let err = discover_collections(&loader).await.unwrap_err();
        assert!(matches!(err, ContentViewerError::ConfigNotFound));
    }

    #[tokio::test]
    async fn discover_returns_path_and_collections() {
        let loader = StubLoader::default().with(
            "/src/content.config.ts",
            module(json!({"collections": blog_collections()})),
        );
        let (path, collections) = discover_collections(&loader).await.unwrap();
        assert_eq!(path, "/src/content.config.ts");
        assert_eq!(collections.keys().collect::<Vec<_>>(), vec!["blog"]);
    }
}
