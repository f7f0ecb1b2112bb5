use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::assets;
use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::registry::Registry;

#[derive(Parser, Debug, Clone)]
pub struct CollectionsCommand {
    /// 资源目录
    #[arg(long, value_name = "DIR", default_value = "assets")]
    pub assets: PathBuf,
}

impl SubCommandExtend for CollectionsCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let registry = Registry::load(opts.conf_dir.registry());
        for name in assets::list_collections(&self.assets)? {
            let encoded = registry.encoded(&name).map_or(0, |set| set.len());
            println!("{}\t{}", name, encoded);
        }
        Ok(())
    }
}
