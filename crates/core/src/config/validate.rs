use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Default target size is not 0
/// - Tool paths are not empty
/// - Codec names and output extensions are not empty
/// - Output suffix is not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let pipeline = &config.pipeline;
    let encoder = &config.encoder;

    if pipeline.default_target_kib == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.default_target_kib cannot be 0".to_string(),
        ));
    }

    for (key, path) in [
        ("encoder.ffmpeg_path", &encoder.ffmpeg_path),
        ("encoder.ffprobe_path", &encoder.ffprobe_path),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                key
            )));
        }
    }

    for (key, value) in [
        ("encoder.video.codec", &encoder.video.codec),
        ("encoder.video.extension", &encoder.video.extension),
        ("encoder.audio.codec", &encoder.audio.codec),
        ("encoder.audio.extension", &encoder.audio.extension),
        ("encoder.audio.copy_extension", &encoder.audio.copy_extension),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                key
            )));
        }
    }

    // Output lands next to the input.
    if pipeline.output_suffix.is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.output_suffix cannot be empty".to_string(),
        ));
    }

    Ok(())
}
