use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use otter_loader::{InFlightPolicy, LoadError, Loader, LoaderConfig, ModuleStatus, Resource};

#[tokio::test]
async fn test_fetch_failure_rejects_import() {
    let loader = Loader::builder()
        .fetch(|url: String| async move {
            if url == "file:///main.js" {
                Ok(Resource::script("import './missing.js';"))
            } else {
                Err(LoadError::fetch(&url, "404"))
            }
        })
        .build();

    let err = loader
        .import_from_resolved_url("file:///main.js")
        .await
        .unwrap_err();
    assert!(
        matches!(&err, LoadError::Fetch { url, .. } if url == "file:///missing.js"),
        "{:?}",
        err
    );
    assert_eq!(
        loader.cache().get("file:///main.js").unwrap().status(),
        ModuleStatus::Unlinked
    );
}

#[tokio::test]
async fn test_resolve_failure_rejects_import() {
    let loader = Loader::builder()
        .fetch(|_url: String| async move { Ok(Resource::script("import 'lodash';")) })
        .build();

    let err = loader
        .import_from_resolved_url("file:///main.js")
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Resolve { ref specifier, .. } if specifier == "lodash"));
}

#[tokio::test]
async fn test_unsupported_content_type_is_init_error() {
    let loader = Loader::builder()
        .fetch(|_url: String| async move { Ok(Resource::new(b"\x00".to_vec(), "image/png")) })
        .build();

    let err = loader
        .import_from_resolved_url("file:///logo.png")
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Init { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_init_hook_must_compile_the_record() {
    let loader = Loader::builder()
        .fetch(|_url: String| async move { Ok(Resource::script("export default 1")) })
        .init(|_record, _resource, _cx| Ok(()))
        .build();

    let err = loader
        .import_from_resolved_url("file:///main.js")
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Init { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_syntax_error_is_compile_error() {
    let loader = Loader::builder()
        .fetch(|_url: String| async move { Ok(Resource::script("export const = ;")) })
        .build();

    let err = loader
        .import_from_resolved_url("file:///broken.js")
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Compile { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_missing_export_is_link_error() {
    let loader = Loader::builder()
        .fetch(|url: String| async move {
            let source = if url.ends_with("main.js") {
                "import { nope } from './dep.js'; nope;"
            } else {
                "export const yes = 1;"
            };
            Ok(Resource::script(source))
        })
        .build();

    let err = loader
        .import_from_resolved_url("file:///main.js")
        .await
        .unwrap_err();
    match &err {
        LoadError::Link { url, message } => {
            assert_eq!(url, "file:///main.js");
            assert!(message.contains("'nope'"), "{}", message);
        }
        other => panic!("expected link error, got {:?}", other),
    }

    let main = loader.cache().get("file:///main.js").unwrap();
    assert_eq!(main.status(), ModuleStatus::Errored);

    let again = loader
        .import_from_resolved_url("file:///main.js")
        .await
        .unwrap_err();
    assert!(err.is_same(&again));
}

#[tokio::test]
async fn test_conflicting_star_exports_are_ambiguous() {
    let loader = Loader::builder()
        .fetch(|url: String| async move {
            let source = match url.as_str() {
                "file:///main.js" => "import { x } from './both.js';",
                "file:///both.js" => "export * from './a.js'; export * from './b.js';",
                _ => "export const x = 1;",
            };
            Ok(Resource::script(source))
        })
        .build();

    let err = loader
        .import_from_resolved_url("file:///main.js")
        .await
        .unwrap_err();
    assert!(
        matches!(&err, LoadError::Link { message, .. } if message.contains("conflicting")),
        "{:?}",
        err
    );
}

/// Entry with one fast failing dependency and one slow one that records completion
fn racing_loader(policy: InFlightPolicy, slow_finished: Arc<AtomicBool>) -> Loader {
    let config = LoaderConfig {
        in_flight: policy,
        ..LoaderConfig::default()
    };
    Loader::builder()
        .config(config)
        .fetch(move |url: String| {
            let slow_finished = slow_finished.clone();
            async move {
                match url.as_str() {
                    "file:///main.js" => Ok(Resource::script("import './fail.js'; import './slow.js';")),
                    "file:///slow.js" => {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        slow_finished.store(true, Ordering::SeqCst);
                        Ok(Resource::script("export default 'slow';"))
                    }
                    _ => Err(LoadError::fetch(&url, "boom")),
                }
            }
        })
        .build()
}

#[tokio::test]
async fn test_abort_policy_cancels_outstanding_fetches() {
    let slow_finished = Arc::new(AtomicBool::new(false));
    let loader = racing_loader(InFlightPolicy::Abort, slow_finished.clone());

    let err = loader
        .import_from_resolved_url("file:///main.js")
        .await
        .unwrap_err();
    assert!(matches!(&err, LoadError::Fetch { url, .. } if url == "file:///fail.js"));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!slow_finished.load(Ordering::SeqCst));
    assert!(!loader.cache().get("file:///slow.js").unwrap().is_compiled());
}

#[tokio::test]
async fn test_detach_policy_lets_fetches_finish_without_effect() {
    let slow_finished = Arc::new(AtomicBool::new(false));
    let loader = racing_loader(InFlightPolicy::Detach, slow_finished.clone());

    let err = loader
        .import_from_resolved_url("file:///main.js")
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Fetch { .. }));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(slow_finished.load(Ordering::SeqCst));
    assert!(!loader.cache().get("file:///slow.js").unwrap().is_compiled());
}

#[tokio::test]
async fn test_failed_discovery_can_be_retried() {
    let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = attempts.clone();
    let loader = Loader::builder()
        .fetch(move |url: String| {
            let attempt = if url.ends_with("flaky.js") {
                counter.fetch_add(1, Ordering::SeqCst)
            } else {
                0
            };
            async move {
                match url.as_str() {
                    "file:///main.js" => Ok(Resource::script(
                        "import { v } from './flaky.js'; export default v;",
                    )),
                    _ if attempt == 0 => Err(LoadError::fetch(&url, "temporarily unavailable")),
                    _ => Ok(Resource::script("export const v = 'ok';")),
                }
            }
        })
        .build();

    assert!(loader.import_from_resolved_url("file:///main.js").await.is_err());

    let ns = loader.import_from_resolved_url("file:///main.js").await.unwrap();
    assert_eq!(ns.get("default"), Some(otter_loader::Value::from("ok")));
}
