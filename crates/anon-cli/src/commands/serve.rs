use anon_config::Config;
use anon_server::AnonServer;
use anyhow::Result;
use std::sync::Arc;

pub async fn handle(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    public_url: Option<String>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if public_url.is_some() {
        config.server.public_url = public_url;
    }

    let pipeline = Arc::new(super::build_pipeline(&config)?);

    println!(
        "Serving anonymized repositories on {}:{} (data: {})",
        config.server.host,
        config.server.port,
        config.storage.data_dir().display()
    );
    AnonServer::serve(pipeline, &config.server.host, config.server.port).await?;

    Ok(())
}
