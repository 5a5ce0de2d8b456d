/// Configuration management for the media service
///
/// Loads configuration from environment variables with sensible defaults.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub s3: S3Config,
    pub media: MediaConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
}

/// Media processing configuration (ffmpeg pipeline + worker pool)
#[derive(Clone, Debug, Deserialize)]
pub struct MediaConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Vertical resolutions produced per video
    pub resolutions: Vec<u32>,
    /// HLS segment length in seconds
    pub segment_seconds: u32,
    /// Scratch space for staging downloads and transcode output
    pub tmp_dir: String,
    /// Number of encode workers; jobs are sharded by video id
    pub worker_count: usize,
    /// Attempts per encode job before the video is marked failed
    pub max_attempts: u32,
    /// Base retry delay in seconds, doubled per attempt
    pub retry_base_delay_secs: u64,
    /// Presigned upload URL lifetime
    pub upload_url_ttl_secs: u64,
    /// Presigned playback URL lifetime
    pub playback_url_ttl_secs: u64,
    /// Write placeholder artifacts instead of invoking ffmpeg
    pub enable_mock: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("MEDIA_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("MEDIA_SERVICE_PORT")
                    .unwrap_or_else(|_| "8082".to_string())
                    .parse()
                    .unwrap_or(8082),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/pawreel".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            cache: CacheConfig {
                redis_url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost".to_string()),
            },
            s3: S3Config {
                bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "pawreel-media".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
            },
            media: MediaConfig::from_env(),
        })
    }
}

impl MediaConfig {
    pub fn from_env() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            resolutions: std::env::var("MEDIA_RESOLUTIONS")
                .ok()
                .map(|raw| {
                    raw.split(',')
                        .filter_map(|s| s.trim().parse().ok())
                        .collect::<Vec<u32>>()
                })
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| vec![360, 480, 720]),
            segment_seconds: 6,
            tmp_dir: std::env::var("MEDIA_TMP_DIR").unwrap_or_else(|_| "/tmp".to_string()),
            worker_count: std::env::var("MEDIA_WORKER_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            max_attempts: std::env::var("MEDIA_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            retry_base_delay_secs: std::env::var("MEDIA_RETRY_BASE_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            upload_url_ttl_secs: 600,
            playback_url_ttl_secs: 3000,
            enable_mock: std::env::var("MEDIA_TRANSCODE_ENABLE_MOCK")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_config_defaults() {
        let cfg = MediaConfig::from_env();
        assert_eq!(cfg.resolutions, vec![360, 480, 720]);
        assert_eq!(cfg.segment_seconds, 6);
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.retry_base_delay_secs, 10);
        assert_eq!(cfg.upload_url_ttl_secs, 600);
        assert_eq!(cfg.playback_url_ttl_secs, 3000);
    }
}
