use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct AppConfig {
    #[envconfig(from = "SLACK_SIGNING_SECRET")]
    pub slack_signing_secret: String,
}

pub fn load() -> anyhow::Result<AppConfig> {
    AppConfig::init_from_env()
        .map_err(|e| anyhow::anyhow!("SLACK_SIGNING_SECRET must be set: {e}"))
}
