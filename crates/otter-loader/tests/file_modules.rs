use std::fs;
use std::path::Path;

use otter_loader::{LoadError, Loader, ModuleStatus, Value};
use tempfile::tempdir;
use url::Url;

fn file_url(path: &Path) -> String {
    Url::from_file_path(path).unwrap().to_string()
}

#[tokio::test]
async fn test_import_meta_url_of_file_module() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("import-meta.mjs");
    fs::write(&path, "export default import.meta;\n").unwrap();
    let url = file_url(&path);

    let loader = Loader::new();
    let ns = loader.import_from_resolved_url(&url).await.unwrap();
    assert_eq!(
        ns.get("default").unwrap().to_json(),
        serde_json::json!({ "url": url })
    );
}

#[tokio::test]
async fn test_import_meta_hook_decorates_object() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("main.js");
    fs::write(&path, "export const isMain = import.meta.main;").unwrap();
    let url = file_url(&path);

    let entry = url.clone();
    let loader = Loader::builder()
        .import_meta(move |module_url, meta| {
            meta.set("main", Value::Bool(module_url == entry));
        })
        .build();

    let ns = loader.import_from_resolved_url(&url).await.unwrap();
    assert_eq!(ns.get("isMain"), Some(Value::Bool(true)));
}

#[tokio::test]
async fn test_relative_imports_between_files() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    fs::write(
        dir.path().join("main.js"),
        "import { greet } from './lib/greet.js';\nexport default greet;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("lib/greet.js"),
        "import { name } from '../name.js';\nexport const greet = 'hello ' + name;\n",
    )
    .unwrap();
    fs::write(dir.path().join("name.js"), "export const name = 'otter';\n").unwrap();

    let loader = Loader::new();
    let ns = loader
        .import_from_resolved_url(&file_url(&dir.path().join("main.js")))
        .await
        .unwrap();
    assert_eq!(ns.get("default"), Some(Value::from("hello otter")));
    assert_eq!(loader.cache().len(), 3);

    let snapshot = loader.cache().snapshot();
    let main = &snapshot[0];
    assert_eq!(main.status, ModuleStatus::Evaluated);
    assert_eq!(
        main.dependencies,
        vec![file_url(&dir.path().join("lib/greet.js"))]
    );
}

#[tokio::test]
async fn test_json_module_default_export() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{ "name": "otter", "features": ["esm", "json"] }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("main.js"),
        "import config from './config.json';\nexport default config.name + ':' + config.features.join('+');\n",
    )
    .unwrap();

    let loader = Loader::new();
    let ns = loader
        .import_from_resolved_url(&file_url(&dir.path().join("main.js")))
        .await
        .unwrap();
    assert_eq!(ns.get("default"), Some(Value::from("otter:esm+json")));

    let json = loader
        .cache()
        .get(&file_url(&dir.path().join("config.json")))
        .unwrap()
        .namespace();
    assert_eq!(json.keys(), vec!["default"]);
}

#[tokio::test]
async fn test_missing_file_is_fetch_error() {
    let dir = tempdir().unwrap();
    let url = file_url(&dir.path().join("nope.js"));

    let err = Loader::new().import_from_resolved_url(&url).await.unwrap_err();
    assert!(matches!(err, LoadError::Fetch { .. }), "{:?}", err);
}
