use anyhow::Result;
use clap::Parser;

use super::open_store;
use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::registry::Registry;
use crate::store::VectorStore;

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {}

impl SubCommandExtend for StatusCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let registry = Registry::load(opts.conf_dir.registry());
        for (name, count) in registry.collections() {
            println!("{}\t{}", name, count);
        }

        let store = open_store(&opts.conf_dir).await?;
        println!("向量总数: {}", store.count().await?);
        if let Some(dimensions) = store.dimensions().await {
            println!("向量维度: {}", dimensions);
        }
        Ok(())
    }
}
