use anon_config::Config;
use anyhow::{Result, bail};

pub async fn handle(config: &Config, id: String) -> Result<()> {
    let pipeline = super::build_pipeline(config)?;

    if !pipeline.invalidate_repository(&id).await? {
        bail!("Registration '{}' not found", id);
    }

    println!("✓ Invalidated cache of {}", id);

    Ok(())
}
