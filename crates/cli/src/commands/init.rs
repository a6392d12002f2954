//! `warden init`: write a default config file.

use warden_config::AppConfig;

use super::CliResult;

pub async fn run(force: bool) -> CliResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🛡️  Warden Setup");
    println!("===============\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() && !force {
        println!("  Config file exists: {} (use --force to overwrite)", config_path.display());
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", config_path.display());
    println!("\nNext: point `registry_path` at your tool registry, then run `warden doctor`.");
    Ok(())
}
