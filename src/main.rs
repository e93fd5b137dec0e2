use ip_discover::DiscoverError;
use ip_discover::config::Config;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::load()?;

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::from_level(config.log_level).into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?config, "Configuration loaded");

    match run(&config).await {
        Ok(Some(address)) => println!("{}", address),
        Ok(None) => tracing::warn!("No IPv4 address bound to the {} network", config.network),
        Err(e) => {
            let Some(err) = e.downcast_ref::<DiscoverError>() else {
                tracing::error!("{:#}", e);
                return Ok(ExitCode::FAILURE);
            };
            tracing::error!("{}. {}", err, err.user_message());
            return Ok(ExitCode::from(err.exit_code()));
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(target_os = "linux")]
async fn run(config: &Config) -> anyhow::Result<Option<ip_discover::Address>> {
    use ip_discover::{NetlinkBackend, Resolver};
    use tokio_util::sync::CancellationToken;

    let resolver = Resolver::new(NetlinkBackend::connect()?).with_tables(config.tables.clone());

    let cancel = CancellationToken::new();
    if let Some(timeout) = config.timeout {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel.cancel();
        });
    }

    Ok(resolver.resolve_with_cancel(&config.network, &cancel).await?)
}

#[cfg(not(target_os = "linux"))]
async fn run(_config: &Config) -> anyhow::Result<Option<ip_discover::Address>> {
    Err(anyhow::anyhow!("Unsupported platform"))
}
