use otter_loader::{
    LoadError, Loader, ModuleRecord, ModuleStatus, Reflect, Resource, Value, create_dynamic_module,
    default_init,
};

#[test]
fn test_dynamic_module_exports_set_by_executor() {
    let target = ModuleRecord::new("virtual:answer");
    let module = create_dynamic_module(
        &target,
        &["x"],
        Some(Box::new(|reflect: &Reflect| {
            reflect.export("x").unwrap().set(42);
            Ok(())
        })),
    )
    .unwrap();

    assert_eq!(target.status(), ModuleStatus::Instantiated);
    target.evaluate().unwrap();

    let ns = target.namespace();
    assert_eq!(ns.get("x"), Some(Value::from(42)));
    assert_eq!(module.reflect.export("x").unwrap().get(), Value::from(42));
    assert_eq!(module.reflect.namespace().get("x"), Some(Value::from(42)));
}

#[test]
fn test_executor_throw_errors_the_record() {
    let target = ModuleRecord::new("virtual:throws");
    create_dynamic_module(
        &target,
        &["x"],
        Some(Box::new(|_: &Reflect| -> Result<(), Value> {
            Err(Value::error("Error", "host failure"))
        })),
    )
    .unwrap();

    let err = target.evaluate().unwrap_err();
    assert_eq!(
        err.exception().map(ToString::to_string).as_deref(),
        Some("Error: host failure")
    );
    assert_eq!(target.status(), ModuleStatus::Errored);
}

#[test]
fn test_invalid_export_name_is_init_error() {
    let target = ModuleRecord::new("virtual:bad");
    let err = create_dynamic_module(&target, &["not valid"], None).unwrap_err();
    assert!(matches!(err, LoadError::Init { .. }));
}

#[tokio::test]
async fn test_source_module_imports_dynamic_module() {
    let loader = Loader::builder()
        .fetch(|url: String| async move {
            if url.starts_with("virtual:") {
                Ok(Resource::new(Vec::new(), "application/x-virtual"))
            } else {
                Ok(Resource::script(
                    "import { x, label } from 'virtual:answer'; export default label + ':' + x;",
                ))
            }
        })
        .resolve(|specifier, _referrer| Ok(specifier.to_string()))
        .init(|record, resource, cx| {
            if resource.content_type() != "application/x-virtual" {
                return default_init()(record, resource, cx);
            }
            create_dynamic_module(
                record,
                &["x", "label"],
                Some(Box::new(|reflect: &Reflect| {
                    reflect.export("x").unwrap().set(42);
                    reflect.export("label").unwrap().set("answer");
                    Ok(())
                })),
            )
            .map(drop)
        })
        .build();

    let ns = loader.import_from_resolved_url("file:///main.js").await.unwrap();
    assert_eq!(ns.get("default"), Some(Value::from("answer:42")));

    let dynamic = loader.cache().get("virtual:answer").unwrap();
    assert_eq!(dynamic.status(), ModuleStatus::Evaluated);
    assert_eq!(dynamic.namespace().keys(), vec!["label", "x"]);
}

#[tokio::test]
async fn test_host_updates_after_evaluation_are_visible_to_importers() {
    let loader = Loader::builder()
        .fetch(|url: String| async move {
            if url == "virtual:state" {
                Ok(Resource::new(Vec::new(), "application/x-virtual"))
            } else {
                Ok(Resource::script("export { state } from 'virtual:state';"))
            }
        })
        .resolve(|specifier, _referrer| Ok(specifier.to_string()))
        .init(|record, resource, cx| {
            if resource.content_type() == "application/x-virtual" {
                create_dynamic_module(record, &["state"], None).map(drop)
            } else {
                record.compile(cx.compiler(), resource.text().unwrap())
            }
        })
        .build();

    let main = loader.import_from_resolved_url("file:///main.js").await.unwrap();
    assert_eq!(main.get("state"), Some(Value::Undefined));

    let state = loader.cache().get("virtual:state").unwrap().namespace();
    state.binding("state").unwrap().set(Value::from("ready"));
    assert_eq!(main.get("state"), Some(Value::from("ready")));
}
