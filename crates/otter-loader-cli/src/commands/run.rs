//! Run command - load a module graph and print the entry's exports.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{build_loader, entry_url};
use crate::config::load_config;

#[derive(Args)]
pub struct RunCommand {
    /// Entry module (path or URL)
    pub entry: String,

    /// Arguments exposed as `process.argv`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

impl RunCommand {
    pub async fn run(&self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?.loader;
        let url = entry_url(&self.entry, &config)?;

        let mut argv = vec![url.clone()];
        argv.extend(self.args.iter().cloned());
        let loader = build_loader(config, &argv);

        tracing::debug!(url = %url, "running entry");
        let namespace = loader.import_from_resolved_url(&url).await?;

        let json = namespace.to_json();
        if self.compact {
            println!("{}", serde_json::to_string(&json)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Ok(())
    }
}
