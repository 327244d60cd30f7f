use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, info, warn};

use crate::{
    error::{PipelineError, Result},
    types::ScriptContent,
};

const SILENCE_SAMPLE_RATE: u32 = 22_050;

#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub path: PathBuf,
    pub duration_seconds: f64,
    /// False when the track is generated silence.
    pub spoken: bool,
}

/// Narration track for a script: `piper` speech when a voice model is
/// configured, silence of the script length otherwise.
pub struct Narrator {
    piper_model: Option<PathBuf>,
    program: PathBuf,
}

impl Narrator {
    pub fn new(piper_model: Option<PathBuf>) -> Self {
        Self {
            piper_model,
            program: PathBuf::from("piper"),
        }
    }

    pub async fn narrate(&self, content: &ScriptContent, work_dir: &Path) -> Result<Narration> {
        let path = work_dir.join("narration.wav");

        if let Some(model) = &self.piper_model {
            match self.speak(model, content.narration_text(), &path).await {
                Ok(duration_seconds) => {
                    info!(duration_seconds, "narration synthesized");
                    return Ok(Narration {
                        path,
                        duration_seconds,
                        spoken: true,
                    });
                }
                Err(reason) => warn!("speech synthesis failed, narrating silence: {reason}"),
            }
        }

        let duration_seconds = content.total_duration();
        write_silence(&path, duration_seconds).map_err(|e| PipelineError::AssetUnavailable {
            reason: format!("silent narration at {}: {e}", path.display()),
        })?;
        debug!(duration_seconds, "silent narration written");

        Ok(Narration {
            path,
            duration_seconds,
            spoken: false,
        })
    }

    async fn speak(
        &self,
        model: &Path,
        text: &str,
        out: &Path,
    ) -> std::result::Result<f64, String> {
        let mut child = Command::new(&self.program)
            .arg("--model")
            .arg(model)
            .arg("--output_file")
            .arg(out)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to start {}: {e}", self.program.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| e.to_string())?;
        }

        let output = child.wait_with_output().await.map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        wav_duration(out).map_err(|e| e.to_string())
    }
}

/// Length of a WAV file in seconds, from its header.
pub fn wav_duration(path: &Path) -> std::result::Result<f64, hound::Error> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Mono 16-bit silence lasting `seconds`.
pub fn write_silence(path: &Path, seconds: f64) -> std::result::Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SILENCE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let samples = (seconds.max(0.0) * SILENCE_SAMPLE_RATE as f64).round() as u32;

    let mut writer = hound::WavWriter::create(path, spec)?;
    {
        let mut samples_writer = writer.get_i16_writer(samples);
        for _ in 0..samples {
            samples_writer.write_sample(0i16);
        }
        samples_writer.flush()?;
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn script() -> ScriptContent {
        ScriptContent::new(
            "t",
            "topic",
            "one two",
            vec![Segment::new("one", 1.5), Segment::new("two", 2.0)],
        )
        .unwrap()
    }

    #[test]
    fn silence_has_requested_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.wav");
        write_silence(&path, 2.5).unwrap();
        assert!((wav_duration(&path).unwrap() - 2.5).abs() < 1e-3);
    }

    #[tokio::test]
    async fn without_voice_model_narration_is_silent_script_length() {
        let dir = tempfile::tempdir().unwrap();
        let narration = Narrator::new(None).narrate(&script(), dir.path()).await.unwrap();
        assert!(!narration.spoken);
        assert_eq!(narration.duration_seconds, 3.5);
        assert!((wav_duration(&narration.path).unwrap() - 3.5).abs() < 1e-3);
    }

    #[tokio::test]
    async fn missing_piper_binary_falls_back_to_silence() {
        let dir = tempfile::tempdir().unwrap();
        let mut narrator = Narrator::new(Some(PathBuf::from("voice.onnx")));
        narrator.program = PathBuf::from("definitely-not-piper-binary");
        let narration = narrator.narrate(&script(), dir.path()).await.unwrap();
        assert!(!narration.spoken);
        assert!(narration.path.exists());
    }
}
