//! `blockmind doctor`: diagnose config, oracle and memory store.

use blockmind_config::AppConfig;
use blockmind_core::PolicyOracle;
use blockmind_providers::OllamaOracle;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 blockmind doctor: system diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    // Config
    let file = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    if !file.exists() {
        println!(
            "  ⚠️  No config file at {}, using defaults (run `blockmind onboard`)",
            file.display()
        );
        issues += 1;
    }
    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!(
                "  ✅ Config valid ({} agent(s) configured)",
                config.agents.len()
            );
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Cannot continue without a valid config.");
            return Ok(());
        }
    };

    // Oracle
    let oracle = OllamaOracle::from_config(&config.oracle);
    match oracle.check_available().await {
        Ok(true) => {
            println!("  ✅ Oracle reachable at {}", oracle.base_url());
            match oracle.list_models().await {
                Ok(models) if models.iter().any(|m| m == oracle.model()) => {
                    println!("  ✅ Model '{}' installed", oracle.model());
                }
                Ok(models) => {
                    println!(
                        "  ⚠️  Model '{}' not installed (available: {}), run `ollama pull {}`",
                        oracle.model(),
                        if models.is_empty() {
                            "none".to_string()
                        } else {
                            models.join(", ")
                        },
                        oracle.model()
                    );
                    issues += 1;
                }
                Err(e) => {
                    println!("  ⚠️  Could not list models: {e}");
                    issues += 1;
                }
            }
        }
        Ok(false) => {
            println!("  ❌ Oracle at {} reports unavailable", oracle.base_url());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Oracle unreachable at {}: {e}", oracle.base_url());
            issues += 1;
        }
    }

    // Memory store
    let path = config.memory.resolved_path();
    match blockmind_memory::open_store(&config.memory.backend, &path).await {
        Ok(store) => {
            println!("  ✅ Memory store '{}' opened", store.name());
            if let Err(e) = store.close().await {
                println!("  ⚠️  Memory store did not close cleanly: {e}");
                issues += 1;
            }
        }
        Err(e) => {
            println!(
                "  ❌ Memory store '{}' failed to open: {e}",
                config.memory.backend
            );
            issues += 1;
        }
    }

    // World driver
    if config.driver.kind == "sim" {
        println!("  ✅ Driver 'sim' available");
    } else {
        println!(
            "  ❌ Driver '{}' is not available in this build",
            config.driver.kind
        );
        issues += 1;
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
