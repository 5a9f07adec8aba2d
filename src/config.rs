use std::env;

pub const DEFAULT_SCHEMA: &str = "dailypdbanpacarica";
pub const DEFAULT_FLAGSYNC_SCHEMA: &str = "dailypdbanpaclima";
pub const DEFAULT_STATIONS_SCHEMA: &str = "sciapgm";

#[derive(Debug, Clone)]
pub struct Config {
    pub schema: String,
    pub flagsync_schema: String,
    pub stations_schema: String,
    pub max_connections: u32,
    pub parallel: usize,
}

impl Config {
    /// Settings that every entry point shares; the database URL is taken from the
    /// command line (or `DATABASE_URL`) by each binary.
    pub fn from_env() -> Self {
        Config {
            schema: env::var("SCIA_SCHEMA").unwrap_or_else(|_| DEFAULT_SCHEMA.to_string()),
            flagsync_schema: env::var("SCIA_FLAGSYNC_SCHEMA")
                .unwrap_or_else(|_| DEFAULT_FLAGSYNC_SCHEMA.to_string()),
            stations_schema: env::var("SCIA_STATIONS_SCHEMA")
                .unwrap_or_else(|_| DEFAULT_STATIONS_SCHEMA.to_string()),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            parallel: env::var("SCIA_PARALLEL")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            schema: DEFAULT_SCHEMA.to_string(),
            flagsync_schema: DEFAULT_FLAGSYNC_SCHEMA.to_string(),
            stations_schema: DEFAULT_STATIONS_SCHEMA.to_string(),
            max_connections: 5,
            parallel: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schemas() {
        let config = Config::default();
        assert_eq!(config.schema, "dailypdbanpacarica");
        assert_eq!(config.flagsync_schema, "dailypdbanpaclima");
        assert_eq!(config.stations_schema, "sciapgm");
        assert_eq!(config.parallel, 4);
    }
}
