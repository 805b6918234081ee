use std::error::Error;
use std::sync::Arc;

use rig::providers::openai;

use crate::agents::{MoviePlanner, QueryAgent};
use crate::openapi::ReducedSpec;
use crate::tmdb::TmdbClient;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub spec_path: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            tmdb_api_key: std::env::var("TMDB_API_KEY")
                .map_err(|_| "TMDB_API_KEY not found in environment variables")?,
            spec_path: std::env::var("TMDB_SPEC_PATH")
                .unwrap_or_else(|_| "api_spec/tmdb_openapi.yaml".to_string()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
}

impl AiConfig {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            // An absent key is handed to the model client as-is; its own
            // failure mode applies on first use
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
        })
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Process-lifetime singletons, constructed once at startup and shared
/// read-only by every request-handling task.
pub struct AppState {
    pub agent: Arc<dyn QueryAgent>,
    pub spec: Arc<ReducedSpec>,
}

pub async fn app_init() -> Result<(Config, Arc<AppState>), Box<dyn Error>> {
    let config = Config::from_env()?;
    log::info!("✅ Configuration loaded");
    let ai_config = AiConfig::from_env()?;
    log::info!("✅ AI configuration loaded (model: {})", ai_config.model);

    // OpenAPI specification
    log::info!("📄 Reducing OpenAPI spec from {}...", config.spec_path);
    let spec = Arc::new(ReducedSpec::from_file(&config.spec_path)?);
    log::info!(
        "✅ {}: {} operations",
        spec.title,
        spec.operations.len()
    );

    // Authenticated TMDB client
    let tmdb = Arc::new(TmdbClient::new(&config.tmdb_api_key, &spec.base_url)?);
    log::info!("✅ TMDB client ready ({})", tmdb.base_url());

    // Planner agent, constructed once and reused for all requests
    let client = openai::Client::builder()
        .api_key(ai_config.api_key.as_str())
        .build()?;
    let planner = MoviePlanner::new(client, ai_config.model.clone(), spec.clone(), tmdb);

    let state = Arc::new(AppState {
        agent: Arc::new(planner),
        spec,
    });
    Ok((config, state))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Env mutation is process-wide, so both branches live in one test
    #[test]
    fn test_config_requires_tmdb_key() {
        unsafe { std::env::remove_var("TMDB_API_KEY") };
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("TMDB_API_KEY"));

        unsafe { std::env::set_var("TMDB_API_KEY", "test-token") };
        let config = Config::from_env().unwrap();
        assert_eq!(config.tmdb_api_key, "test-token");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.spec_path, "api_spec/tmdb_openapi.yaml");

        unsafe { std::env::remove_var("TMDB_API_KEY") };
    }

    #[test]
    fn test_ai_config_passes_missing_key_through() {
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        let ai_config = AiConfig::from_env().unwrap();
        assert_eq!(ai_config.api_key, "");
        assert_eq!(ai_config.model, "gpt-4");
    }
}
