use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;

use gilga::{
    backend::{memory::MemoryBackend, nostr::NostrBackend, Storage},
    infrastructure::{cli::Cli, config::Config, tui::real::RealTui},
    utils::{get_config_dir, initialize_logging, initialize_panic_handler},
    App,
};

async fn tokio_main() -> Result<()> {
    initialize_logging()?;

    initialize_panic_handler()?;

    let args = <Cli as Parser>::parse();
    let config_dir = args.config_dir.clone().unwrap_or_else(get_config_dir);
    let config = Config::load(&config_dir)?;

    let mut tui = RealTui::new()?
        .tick_rate(args.tick_rate)
        .frame_rate(args.frame_rate);

    if args.offline {
        log::info!("Starting offline");
        let backend = Arc::new(MemoryBackend::new().with_relays(config.relays.clone()).with_echo());
        App::new(backend).run(&mut tui).await?;
    } else {
        let backend = Arc::new(NostrBackend::new(
            Storage::new(config_dir),
            config.nostr_options(),
        )?);
        let result = App::new(Arc::clone(&backend)).run(&mut tui).await;
        backend.shutdown().await;
        result?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = tokio_main().await {
        eprintln!("{} error: Something went wrong", env!("CARGO_PKG_NAME"));
        Err(e)
    } else {
        Ok(())
    }
}
