//! Graph command - load a module graph and report every cached module.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use otter_loader::ModuleInfo;

use super::{build_loader, entry_url};
use crate::config::load_config;

#[derive(Args)]
pub struct GraphCommand {
    /// Entry module (path or URL)
    pub entry: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl GraphCommand {
    pub async fn run(&self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?.loader;
        let url = entry_url(&self.entry, &config)?;
        let loader = build_loader(config, &[url.clone()]);

        // The graph is reported even when loading fails part-way
        let outcome = loader.load(&url).await;
        let snapshot = loader.cache().snapshot();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        } else {
            print_human_readable(&snapshot);
        }

        outcome?;
        Ok(())
    }
}

fn print_human_readable(snapshot: &[ModuleInfo]) {
    for module in snapshot {
        println!("{} [{}]", module.url, module.status);
        for dependency in &module.dependencies {
            println!("  -> {}", dependency);
        }
    }
}
