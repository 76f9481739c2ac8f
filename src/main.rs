use clap::Parser;
use tracing::error;

use ipsight::config::{Cli, StaticConfig, get_config, init_config};
use ipsight::errors::IpsightError;
use ipsight::runtime::modes::server::run_server;
use ipsight::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    }

    init_config(Some(&cli.config));
    let config = get_config();

    // 进程退出前保持存活
    let _log_guard = init_logging(&config.logging)?;

    if let Err(e) = run_server().await {
        match e.downcast_ref::<IpsightError>() {
            Some(err) => eprintln!("{}", err.format_colored()),
            None => error!("{:#}", e),
        }
        return Err(e);
    }

    Ok(())
}
