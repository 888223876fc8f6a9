use sentinel::config::Config;
use sentinel::server::Server;
use sentinel::static_files::StaticFiles;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    tracing::info!(
        root = %cfg.static_files.root.display(),
        list_directories = cfg.static_files.list_directories,
        "serving static files"
    );

    let handler = StaticFiles::from_config(&cfg.static_files);
    let server = Server::from_config(handler, &cfg)
        .run(&cfg.server.listen_addr)
        .await?;

    tokio::select! {
        _ = server.wait_stopped() => {}

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            server.stop().await;
        }
    }

    Ok(())
}
