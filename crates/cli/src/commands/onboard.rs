//! `blockmind onboard`: first-time setup.

use blockmind_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("⛏️  blockmind: first-time setup");
    println!("==============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config file exists: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config file: {}", config_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Start Ollama and pull the model: ollama pull gemma3:1b");
    println!("  2. Check everything: blockmind doctor");
    println!("  3. Launch agents:    blockmind start");
    Ok(())
}
