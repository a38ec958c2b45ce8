use anon_config::Config;
use anon_core::{Origin, RedactionOptions, Registration};
use anon_storage::RegistrationStore;
use anyhow::{Result, bail};

pub async fn handle(
    config: &Config,
    url: String,
    branch: Option<String>,
    terms: Vec<String>,
    id: Option<String>,
    options: RedactionOptions,
) -> Result<()> {
    let store = super::registration_store(config)?;
    let origin = Origin::parse(&url, branch.as_deref())?;

    let registration = match id {
        Some(id) => {
            if store.load(&id).await?.is_some() {
                bail!("Registration '{}' already exists", id);
            }
            Registration::with_id(id, origin, terms)
        }
        None => Registration::new(origin, terms),
    }
    .with_options(options);

    store.save(&registration).await?;

    println!("✓ Registered {}", registration.origin.full_name());
    println!("  ID: {}", registration.id);
    println!("  Branch: {}", registration.origin.branch);
    println!("  Terms: {}", registration.terms.len());
    println!(
        "  URL: {}/repository/{}/",
        config.server.public_url(),
        registration.id
    );

    Ok(())
}

pub async fn list(config: &Config) -> Result<()> {
    let registrations = super::registration_store(config)?.list().await?;

    if registrations.is_empty() {
        println!("No registrations found.");
        return Ok(());
    }

    println!("Registrations:");
    for registration in registrations {
        println!("  {} ({})", registration.id, registration.origin.full_name());
        match &registration.last_snapshot {
            Some(snapshot) => println!("    Snapshot: {}", snapshot),
            None => println!("    Snapshot: not fetched yet"),
        }
    }

    Ok(())
}
