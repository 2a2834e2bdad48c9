use tracing::info;

pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3001"),
            database_url: var_or("DATABASE_URL", "sqlite://cradle.db?mode=rwc"),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    match dotenv::var(key) {
        Ok(value) => value,
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default.to_owned()
        }
    }
}
