//! Главный исполняемый файл heapdb

use clap::Parser;
use heapdb::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
    log::debug!("Effective configuration: {:?}", config);

    cli.execute(&config)
}
