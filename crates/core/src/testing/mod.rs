//! Testing utilities and mock implementations.
//!
//! [`MockTool`] stands in for ffprobe and ffmpeg so the whole pipeline can run
//! against real temporary files without the external binaries.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sizecap_core::testing::{fixtures, MockTool};
//!
//! let tool = Arc::new(MockTool::new());
//! tool.set_default_report(fixtures::probe_report(180.0, 1)).await;
//!
//! let mut pipeline = PassPipeline::new(encoder, config, tool.clone(), tool.clone(), request);
//! pipeline.run().await?;
//! ```

mod mock_tool;

pub use mock_tool::{MockTool, RecordedInvocation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::probe::{ProbeFormat, ProbeReport, ProbeStream};

    /// A prober report with one video stream and `audio_streams` audio streams.
    pub fn probe_report(duration_secs: f64, audio_streams: u32) -> ProbeReport {
        let mut streams = vec![ProbeStream {
            index: 0,
            codec_type: Some("video".to_string()),
            codec_name: Some("h264".to_string()),
        }];
        for i in 0..audio_streams {
            streams.push(ProbeStream {
                index: i + 1,
                codec_type: Some("audio".to_string()),
                codec_name: Some("aac".to_string()),
            });
        }

        ProbeReport {
            streams,
            format: ProbeFormat {
                duration: Some(format!("{:.6}", duration_secs)),
            },
        }
    }

    /// A prober report with no usable duration.
    pub fn probe_report_without_duration() -> ProbeReport {
        ProbeReport {
            format: ProbeFormat { duration: None },
            ..probe_report(0.0, 1)
        }
    }
}
