//! `codeweave config`: Configuration management commands.

use codeweave_config::AppConfig;

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ok  Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() && !config.provider.api_url.contains("localhost") {
                warnings.push("No API key set (set CODEWEAVE_API_KEY or OPENAI_API_KEY)");
            }
            if config.knowledge.backend == "none" {
                warnings.push("Knowledge store disabled; save_knowledge calls will be dropped");
            }
            if !config.orchestrator.tools_enabled {
                warnings.push("Tools disabled; the model can only answer in text");
            }

            if warnings.is_empty() {
                println!("   ok  All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   !!  {w}");
                }
            }

            println!();
            println!("   Endpoint:   {}", config.provider.api_url);
            println!("   Model:      {}", config.provider.model);
            println!("   Max turns:  {}", config.orchestrator.max_turns);
            println!("   Knowledge:  {}", config.knowledge.backend);
        }
        Err(e) => {
            println!("   xx  Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.redacted_toml());
    Ok(())
}

pub fn path() {
    println!("{}", config_path().display());
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = config_path();
        assert!(path.to_str().unwrap().ends_with("config.toml"));
        assert!(path.to_str().unwrap().contains(".codeweave"));
    }
}
