use otter_loader::{JsObject, LoadError, Loader, ObjectRef, Resource, Value};

fn fs_object() -> (ObjectRef, Value) {
    let read_file = Value::function("readFile", |args| {
        Ok(Value::from(format!("contents of {}", args.first().cloned().unwrap_or_default())))
    });
    let fs = JsObject::from_entries([
        ("readFile", read_file.clone()),
        ("constants", Value::Object(JsObject::new())),
    ]);
    (fs, read_file)
}

#[tokio::test]
async fn test_core_module_exposes_default_and_named_exports() {
    let (fs, read_file) = fs_object();
    let loader = Loader::builder().builtin("node:fs", fs.clone()).build();

    let ns = loader.import_from_resolved_url("node:fs").await.unwrap();
    assert_eq!(ns.get("default"), Some(Value::Object(fs)));
    assert_eq!(ns.get("readFile"), Some(read_file));
    assert_eq!(ns.keys(), vec!["constants", "default", "readFile"]);
}

#[tokio::test]
async fn test_script_imports_builtin_by_name_and_default() {
    let (fs, _) = fs_object();
    let loader = Loader::builder()
        .builtin("node:fs", fs)
        .fetch(|url: String| async move {
            if url.starts_with("node:") {
                return Ok(Resource::builtin());
            }
            Ok(Resource::script(
                r#"
import fs, { readFile } from "node:fs";
export const kind = typeof fs.readFile;
export const same = [fs.readFile].includes(readFile);
export default readFile("a.txt");
"#,
            ))
        })
        .build();

    let ns = loader.import_from_resolved_url("file:///main.js").await.unwrap();
    assert_eq!(ns.get("kind"), Some(Value::from("function")));
    assert_eq!(ns.get("same"), Some(Value::Bool(true)));
    assert_eq!(ns.get("default"), Some(Value::from("contents of a.txt")));
}

#[tokio::test]
async fn test_unregistered_builtin_is_init_error() {
    let loader = Loader::new();
    let err = loader
        .import_from_resolved_url("node:nope")
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Init { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_builtin_default_key_is_the_object_itself() {
    let obj = JsObject::from_entries([("default", Value::from("shadowed")), ("x", Value::from(1))]);
    let loader = Loader::builder().builtin("node:odd", obj.clone()).build();

    let ns = loader.import_from_resolved_url("node:odd").await.unwrap();
    assert_eq!(ns.get("default"), Some(Value::Object(obj)));
    assert_eq!(ns.get("x"), Some(Value::from(1)));
}
