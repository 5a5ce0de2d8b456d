/// Media transcoding engine
///
/// Stateless transformation of a local input file into playback-ready
/// artifacts: probed metadata, a 1280x720 thumbnail frame, and per-resolution
/// HLS renditions behind a master playlist. Knows nothing about the Video
/// entity or object storage; retry policy belongs to the encode worker.
///
/// Mock mode (`media.enable_mock`) writes placeholder artifacts so the
/// pipeline is exercisable without ffmpeg installed.
use crate::config::MediaConfig;
use crate::error::{AppError, Result};
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Kbps per vertical resolution; unlisted resolutions fall back to 1400
pub fn bitrate_for(resolution: u32) -> u32 {
    match resolution {
        360 => 800,
        480 => 1400,
        720 => 2800,
        1080 => 5000,
        _ => 1400,
    }
}

/// Even-numbered 16:9 width for a vertical resolution (H.264 requires even
/// dimensions)
pub fn even_16x9_width(height: u32) -> u32 {
    let width = ((height as f64) * 16.0 / 9.0).round() as u32;
    width + (width % 2)
}

pub fn rendition_playlist_name(resolution: u32) -> String {
    format!("{resolution}p.m3u8")
}

pub fn segment_file_name(resolution: u32, index: u32) -> String {
    format!("{resolution}p_{index:03}.ts")
}

/// Master playlist listing one rendition per resolution
pub fn build_master_playlist(resolutions: &[u32]) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for &resolution in resolutions {
        let bandwidth = bitrate_for(resolution) * 1000;
        let width = even_16x9_width(resolution);
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},RESOLUTION={width}x{resolution}\n"
        ));
        playlist.push_str(&rendition_playlist_name(resolution));
        playlist.push('\n');
    }
    playlist
}

/// Metadata extracted via ffprobe
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub bitrate_kbps: u32,
}

#[derive(Clone)]
pub struct TranscodingEngine {
    cfg: MediaConfig,
}

impl TranscodingEngine {
    pub fn new(cfg: MediaConfig) -> Self {
        Self { cfg }
    }

    /// Extract container metadata; fails with `Probe` if the file is
    /// unreadable or not a decodable media container
    pub async fn probe_metadata(&self, input: &Path) -> Result<MediaInfo> {
        if !input.exists() {
            return Err(AppError::Probe(format!(
                "input not found: {}",
                input.display()
            )));
        }
        if self.cfg.enable_mock {
            return Ok(MediaInfo {
                duration_seconds: 30.0,
                width: 1280,
                height: 720,
                codec: "h264".into(),
                bitrate_kbps: 2500,
            });
        }

        let output = Command::new(&self.cfg.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_streams",
                "-show_format",
                "-of",
                "json",
            ])
            .arg(input)
            .output()
            .await
            .map_err(|e| AppError::Probe(format!("ffprobe spawn error: {e}")))?;

        if !output.status.success() {
            return Err(AppError::Probe(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let json: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::Probe(format!("ffprobe json parse: {e}")))?;

        let mut width = 0u32;
        let mut height = 0u32;
        let mut codec = String::new();
        let mut bitrate_kbps = 0u32;

        if let Some(streams) = json.get("streams").and_then(|v| v.as_array()) {
            for stream in streams {
                if stream.get("codec_type").and_then(|v| v.as_str()) == Some("video") {
                    width = stream.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                    height = stream.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                    codec = stream
                        .get("codec_name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    bitrate_kbps = stream
                        .get("bit_rate")
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse::<u32>().ok())
                        .unwrap_or(0)
                        / 1000;
                }
            }
        }

        let duration_seconds = json
            .get("format")
            .and_then(|f| f.get("duration"))
            .and_then(|d| d.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        if width == 0 || height == 0 || duration_seconds <= 0.0 {
            return Err(AppError::Probe(format!(
                "no decodable video stream in {}",
                input.display()
            )));
        }

        Ok(MediaInfo {
            duration_seconds,
            width,
            height,
            codec: if codec.is_empty() { "unknown".into() } else { codec },
            bitrate_kbps,
        })
    }

    /// Extract a single 1280x720 frame at `capture_at_percent` of duration
    pub async fn generate_thumbnail(
        &self,
        input: &Path,
        output: &Path,
        capture_at_percent: u32,
    ) -> Result<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if self.cfg.enable_mock {
            tokio::fs::write(output, b"").await?;
            return Ok(());
        }

        let info = self
            .probe_metadata(input)
            .await
            .map_err(|e| AppError::Thumbnail(e.to_string()))?;
        let capture_at = info.duration_seconds * f64::from(capture_at_percent) / 100.0;

        let status = Command::new(&self.cfg.ffmpeg_path)
            .args(["-y", "-ss", &format!("{capture_at:.2}"), "-i"])
            .arg(input)
            .args([
                "-frames:v",
                "1",
                "-vf",
                "scale=1280:720:force_original_aspect_ratio=decrease,\
                 pad=1280:720:(ow-iw)/2:(oh-ih)/2",
            ])
            .arg(output)
            .output()
            .await
            .map_err(|e| AppError::Thumbnail(format!("ffmpeg spawn error: {e}")))?;

        if !status.status.success() {
            return Err(AppError::Thumbnail(format!(
                "ffmpeg thumbnail failed: {}",
                String::from_utf8_lossy(&status.stderr).trim()
            )));
        }
        Ok(())
    }

    /// Produce one HLS rendition per requested vertical resolution plus a
    /// master playlist. A failing resolution aborts the whole run; callers
    /// must treat the partially written `out_dir` as invalid.
    pub async fn transcode_to_adaptive_hls(
        &self,
        input: &Path,
        out_dir: &Path,
        resolutions: &[u32],
    ) -> Result<()> {
        tokio::fs::create_dir_all(out_dir).await?;

        for &resolution in resolutions {
            self.transcode_rendition(input, out_dir, resolution).await?;
        }

        let master = build_master_playlist(resolutions);
        tokio::fs::write(out_dir.join("master.m3u8"), master).await?;
        Ok(())
    }

    async fn transcode_rendition(
        &self,
        input: &Path,
        out_dir: &Path,
        resolution: u32,
    ) -> Result<()> {
        let playlist = out_dir.join(rendition_playlist_name(resolution));
        let segment_pattern = out_dir.join(format!("{resolution}p_%03d.ts"));

        if self.cfg.enable_mock {
            tokio::fs::write(&playlist, mock_rendition_playlist(resolution)).await?;
            for index in 0..3 {
                tokio::fs::write(out_dir.join(segment_file_name(resolution, index)), b"").await?;
            }
            return Ok(());
        }

        let width = even_16x9_width(resolution);
        let bitrate = format!("{}k", bitrate_for(resolution));
        let segment_seconds = self.cfg.segment_seconds.to_string();

        debug!(resolution, %bitrate, "transcoding rendition");

        let output = Command::new(&self.cfg.ffmpeg_path)
            .args(["-y", "-i"])
            .arg(input)
            .args([
                "-vf",
                &format!("scale={width}:{resolution}"),
                "-c:v",
                "libx264",
                "-b:v",
                &bitrate,
                "-preset",
                "veryfast",
                "-c:a",
                "aac",
                "-b:a",
                "128k",
                "-hls_time",
                &segment_seconds,
                "-hls_playlist_type",
                "vod",
                "-hls_segment_filename",
            ])
            .arg(&segment_pattern)
            .arg(&playlist)
            .output()
            .await
            .map_err(|e| AppError::Transcode {
                resolution,
                message: format!("ffmpeg spawn error: {e}"),
            })?;

        if !output.status.success() {
            return Err(AppError::Transcode {
                resolution,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

fn mock_rendition_playlist(resolution: u32) -> String {
    let mut playlist = String::from(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n#EXT-X-PLAYLIST-TYPE:VOD\n",
    );
    for index in 0..3 {
        playlist.push_str("#EXTINF:6.0,\n");
        playlist.push_str(&segment_file_name(resolution, index));
        playlist.push('\n');
    }
    playlist.push_str("#EXT-X-ENDLIST\n");
    playlist
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_bitrate_table() {
        assert_eq!(bitrate_for(360), 800);
        assert_eq!(bitrate_for(480), 1400);
        assert_eq!(bitrate_for(720), 2800);
        assert_eq!(bitrate_for(1080), 5000);
        assert_eq!(bitrate_for(540), 1400);
    }

    #[test]
    fn test_widths_are_even_16x9() {
        assert_eq!(even_16x9_width(360), 640);
        assert_eq!(even_16x9_width(480), 854);
        assert_eq!(even_16x9_width(720), 1280);
        assert_eq!(even_16x9_width(1080), 1920);
        for height in [360, 480, 540, 720, 1080] {
            assert_eq!(even_16x9_width(height) % 2, 0);
        }
    }

    #[test]
    fn test_segment_and_playlist_names() {
        assert_eq!(rendition_playlist_name(480), "480p.m3u8");
        assert_eq!(segment_file_name(480, 7), "480p_007.ts");
        assert_eq!(segment_file_name(720, 123), "720p_123.ts");
    }

    #[test]
    fn test_master_playlist_format() {
        let master = build_master_playlist(&[360, 720]);
        assert!(master.starts_with("#EXTM3U\n"));
        assert!(master.contains("#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n360p.m3u8\n"));
        assert!(master.contains("#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n720p.m3u8\n"));
    }

    fn mock_engine() -> TranscodingEngine {
        let mut cfg = crate::config::MediaConfig::from_env();
        cfg.enable_mock = true;
        TranscodingEngine::new(cfg)
    }

    fn scratch_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pawreel_test_{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_mock_hls_output_layout() {
        let dir = scratch_dir();
        let input = dir.join("input.mp4");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(&input, b"").await.unwrap();

        let engine = mock_engine();
        engine
            .transcode_to_adaptive_hls(&input, &dir, &[360, 480, 720])
            .await
            .unwrap();

        assert!(dir.join("master.m3u8").exists());
        for resolution in [360, 480, 720] {
            assert!(dir.join(rendition_playlist_name(resolution)).exists());
            assert!(dir.join(segment_file_name(resolution, 0)).exists());
        }

        let master = tokio::fs::read_to_string(dir.join("master.m3u8")).await.unwrap();
        assert_eq!(master, build_master_playlist(&[360, 480, 720]));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_missing_input_is_probe_error() {
        let engine = mock_engine();
        let err = engine
            .probe_metadata(Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Probe(_)));
    }

    #[tokio::test]
    async fn test_mock_thumbnail_written() {
        let dir = scratch_dir();
        let input = dir.join("input.mp4");
        let thumb = dir.join("thumb.jpg");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(&input, b"").await.unwrap();

        let engine = mock_engine();
        engine.generate_thumbnail(&input, &thumb, 10).await.unwrap();
        assert!(thumb.exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
