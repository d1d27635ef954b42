use clap::Parser;

/// Process-wide configuration. Every field can be set as a flag or an
/// environment variable — `clap`'s `env` feature reads the latter when the
/// flag is absent, which is all a container-deployed service needs.
///
/// Note: the original deployment's `REDIS_URL` has no equivalent here — the
/// Analytics Store is in-process (see the store's own design note), so
/// there is no Redis dependency to configure.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Real-time sports video analytics service")]
pub struct Config {
    #[arg(long, env = "CORE_SERVICE_URL")]
    pub core_service_url: String,

    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<String>,

    #[arg(long, env = "DEVICE", default_value = "cpu", ignore_case = true)]
    pub device: Device,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Config {
    pub fn from_env() -> Self {
        Config::parse()
    }
}
