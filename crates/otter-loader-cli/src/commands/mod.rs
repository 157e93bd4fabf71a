//! CLI command implementations.

pub mod graph;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use otter_loader::{JsObject, Loader, LoaderConfig, ObjectRef, Value};
use url::Url;

/// Turn a CLI entry argument into a canonical module URL.
///
/// Absolute URLs (`file:///...`, `node:fs`) pass through; anything else is a
/// path relative to the current directory.
pub fn entry_url(entry: &str, config: &LoaderConfig) -> Result<String> {
    if entry.starts_with(&config.builtin_scheme) {
        return Ok(entry.to_string());
    }
    if let Ok(url) = Url::parse(entry) {
        // A single letter scheme is a Windows drive, not a URL
        if url.scheme().len() > 1 {
            return Ok(url.into());
        }
    }
    let path = std::path::absolute(Path::new(entry))
        .with_context(|| format!("Cannot resolve path {}", entry))?;
    Url::from_file_path(&path)
        .map(String::from)
        .map_err(|_| anyhow::anyhow!("Cannot convert {} to a file URL", path.display()))
}

/// `node:process` as seen by loaded modules
fn process_object(argv: &[String]) -> ObjectRef {
    JsObject::from_entries([
        ("platform", Value::from(std::env::consts::OS)),
        ("arch", Value::from(std::env::consts::ARCH)),
        (
            "argv",
            Value::array(argv.iter().map(|arg| Value::from(arg.as_str()))),
        ),
        (
            "cwd",
            Value::function("cwd", |_| {
                std::env::current_dir()
                    .map(|dir| Value::from(dir.display().to_string()))
                    .map_err(|e| Value::error("Error", e.to_string()))
            }),
        ),
    ])
}

/// Loader with the CLI's host builtins registered
pub fn build_loader(config: LoaderConfig, argv: &[String]) -> Loader {
    let process = format!("{}process", config.builtin_scheme);
    Loader::builder()
        .builtin(process, process_object(argv))
        .config(config)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_url_passthrough() {
        let config = LoaderConfig::default();
        assert_eq!(entry_url("node:fs", &config).unwrap(), "node:fs");
        assert_eq!(
            entry_url("file:///tmp/a.js", &config).unwrap(),
            "file:///tmp/a.js"
        );
    }

    #[test]
    fn test_entry_url_from_relative_path() {
        let config = LoaderConfig::default();
        let url = entry_url("main.js", &config).unwrap();
        assert!(url.starts_with("file:///"), "{}", url);
        assert!(url.ends_with("/main.js"), "{}", url);
    }

    #[test]
    fn test_process_object() {
        let process = process_object(&["a".to_string(), "b".to_string()]);
        assert_eq!(
            process.get("platform"),
            Some(Value::from(std::env::consts::OS))
        );
        assert_eq!(process.get("argv").unwrap().to_string(), "a,b");
    }
}
