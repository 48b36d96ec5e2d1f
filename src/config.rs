fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub admin_promotion_key: Option<String>,
    pub uploads_dir: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        // DATABASE_URL wins; otherwise compose from the individual DB_* parts.
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                env_or("DB_USER", "postgres"),
                env_or("DB_PASSWORD", "postgres"),
                env_or("DB_HOST", "localhost"),
                env_or("DB_PORT", "5432"),
                env_or("DB_NAME", "classboard"),
            )
        });

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_ttl_hours: std::env::var("JWT_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
            admin_promotion_key: std::env::var("ADMIN_PROMOTION_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            uploads_dir: env_or("UPLOADS_DIR", "uploads"),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(20 * 1024 * 1024),
        })
    }
}
