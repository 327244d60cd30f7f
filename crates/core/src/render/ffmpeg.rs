//! `VideoEncoder` backed by the `ffmpeg` / `ffprobe` command line tools.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{
    format::format_timestamp,
    render::{
        encoder::{ClipJob, ConcatJob, EncoderError, MuxJob, VideoEncoder},
        plan::SourceSlice,
    },
};

const AUDIO_SAMPLE_RATE: u32 = 44_100;
const STDERR_TAIL_LINES: usize = 12;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound for a single ffmpeg invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, program: &Path, args: &[String]) -> Result<Vec<u8>, EncoderError> {
        let name = program.display().to_string();
        debug!(program = %name, args = %args.join(" "), "invoking");

        let pending = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| EncoderError::Timeout {
                program: name.clone(),
                after: self.timeout,
            })?
            .map_err(|source| EncoderError::Spawn {
                program: name.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EncoderError::Failed {
                program: name,
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode_clip(&self, job: &ClipJob) -> Result<(), EncoderError> {
        self.run(&self.ffmpeg, &clip_args(job)).await.map(drop)
    }

    async fn concat(&self, job: &ConcatJob) -> Result<(), EncoderError> {
        let list = concat_list_path(&job.output);
        tokio::fs::write(&list, concat_list(&job.clips)).await?;
        self.run(&self.ffmpeg, &concat_args(&list, &job.output))
            .await
            .map(drop)
    }

    async fn mux_audio(&self, job: &MuxJob) -> Result<(), EncoderError> {
        self.run(&self.ffmpeg, &mux_args(job)).await.map(drop)
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, EncoderError> {
        let stdout = self.run(&self.ffprobe, &probe_args(path)).await?;
        parse_probe_duration(&String::from_utf8_lossy(&stdout)).ok_or_else(|| {
            EncoderError::Output {
                what: format!("duration of {}", path.display()),
                reason: String::from_utf8_lossy(&stdout).trim().to_string(),
            }
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn common_args() -> Vec<String> {
    ["-y", "-hide_banner", "-loglevel", "error", "-nostdin"]
        .map(String::from)
        .to_vec()
}

pub(crate) fn clip_args(job: &ClipJob) -> Vec<String> {
    let (w, h, fps) = (job.format.width, job.format.height, job.format.fps);
    let mut args = common_args();

    match &job.source {
        SourceSlice::Still { path } => {
            args.extend(["-loop".into(), "1".into(), "-framerate".into(), fps.to_string()]);
            args.extend(["-i".into(), path_arg(path)]);
        }
        SourceSlice::Video { path, offset } => {
            args.extend(["-stream_loop", "-1"].map(String::from));
            args.extend(["-ss".into(), format_timestamp(*offset)]);
            args.extend(["-i".into(), path_arg(path)]);
        }
    }
    args.extend(["-loop".into(), "1".into(), "-i".into(), path_arg(&job.overlay)]);

    // cover then centre-crop: never letterboxed
    let graph = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps}[bg];\
         [bg][1:v]overlay=0:0:format=auto,format=yuv420p[v]"
    );
    args.extend(["-filter_complex".into(), graph, "-map".into(), "[v]".into()]);
    args.extend([
        "-frames:v".into(),
        job.frames.to_string(),
        "-r".into(),
        fps.to_string(),
    ]);
    args.extend(
        [
            "-c:v", "libx264", "-preset", "veryfast", "-b:v", "2000k", "-maxrate", "2500k",
            "-bufsize", "5000k", "-pix_fmt", "yuv420p", "-an",
        ]
        .map(String::from),
    );
    args.push(path_arg(&job.output));
    args
}

fn concat_list_path(output: &Path) -> PathBuf {
    output.with_extension("concat.txt")
}

/// Input list for the concat demuxer, one `file` line per clip in order.
pub(crate) fn concat_list(clips: &[PathBuf]) -> String {
    clips
        .iter()
        .map(|clip| format!("file '{}'\n", path_arg(clip).replace('\'', r"'\''")))
        .collect()
}

pub(crate) fn concat_args(list: &Path, output: &Path) -> Vec<String> {
    let mut args = common_args();
    args.extend(["-f", "concat", "-safe", "0", "-i"].map(String::from));
    args.push(path_arg(list));
    args.extend(["-c".into(), "copy".into(), path_arg(output)]);
    args
}

pub(crate) fn mux_args(job: &MuxJob) -> Vec<String> {
    let d = format!("{:.3}", job.duration);
    let mut args = common_args();
    args.extend(["-i".into(), path_arg(&job.video)]);
    args.extend(["-i".into(), path_arg(&job.narration)]);

    // narration is padded with silence and cut to the video length
    let narration = format!(
        "[1:a]volume={:.2},aresample={AUDIO_SAMPLE_RATE},apad,atrim=0:{d}",
        job.narration_volume
    );
    let graph = match &job.music {
        None => format!("{narration},asetpts=N/SR/TB[a]"),
        Some(music) => {
            args.extend(["-stream_loop".into(), "-1".into(), "-i".into(), path_arg(music)]);
            format!(
                "{narration}[n];\
                 [2:a]volume={:.2},aresample={AUDIO_SAMPLE_RATE},atrim=0:{d}[m];\
                 [n][m]amix=inputs=2:duration=first:normalize=0,asetpts=N/SR/TB[a]",
                job.music_volume
            )
        }
    };

    args.extend(["-filter_complex".into(), graph]);
    args.extend(
        ["-map", "0:v", "-map", "[a]", "-c:v", "copy", "-c:a", "aac", "-b:a", "128k"]
            .map(String::from),
    );
    args.extend(["-t".into(), d, "-movflags".into(), "+faststart".into()]);
    args.push(path_arg(&job.output));
    args
}

pub(crate) fn probe_args(path: &Path) -> Vec<String> {
    let mut args = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .map(String::from)
    .to_vec();
    args.push(path_arg(path));
    args
}

fn parse_probe_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VideoFormat;

    fn format() -> VideoFormat {
        VideoFormat {
            width: 720,
            height: 1280,
            fps: 24,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let pos = args.iter().position(|a| a == flag).unwrap();
        &args[pos + 1]
    }

    #[test]
    fn still_clip_loops_image_and_counts_frames() {
        let job = ClipJob {
            source: SourceSlice::Still {
                path: PathBuf::from("/w/bg.png"),
            },
            overlay: PathBuf::from("/w/overlay-0.png"),
            format: format(),
            frames: 37,
            output: PathBuf::from("/w/clip-0.mp4"),
        };
        let args = clip_args(&job);

        assert_eq!(value_after(&args, "-framerate"), "24");
        assert_eq!(value_after(&args, "-frames:v"), "37");
        assert_eq!(value_after(&args, "-c:v"), "libx264");
        let graph = value_after(&args, "-filter_complex");
        assert!(graph.contains("force_original_aspect_ratio=increase,crop=720:1280"));
        assert!(!graph.contains("pad="));
        assert_eq!(args.last().unwrap(), "/w/clip-0.mp4");
    }

    #[test]
    fn video_clip_seeks_into_looping_source() {
        let job = ClipJob {
            source: SourceSlice::Video {
                path: PathBuf::from("bg.mp4"),
                offset: 3.5,
            },
            overlay: PathBuf::from("o.png"),
            format: format(),
            frames: 24,
            output: PathBuf::from("c.mp4"),
        };
        let args = clip_args(&job);
        assert_eq!(value_after(&args, "-stream_loop"), "-1");
        assert_eq!(value_after(&args, "-ss"), "00:00:03.500");
    }

    #[test]
    fn concat_list_keeps_order_and_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/w/clip-0.mp4"), PathBuf::from("/w/it's.mp4")]);
        assert_eq!(list, "file '/w/clip-0.mp4'\nfile '/w/it'\\''s.mp4'\n");
    }

    #[test]
    fn mux_without_music_pads_narration_only() {
        let job = MuxJob {
            video: PathBuf::from("v.mp4"),
            narration: PathBuf::from("n.wav"),
            narration_volume: 1.0,
            music: None,
            music_volume: 0.2,
            duration: 12.5,
            output: PathBuf::from("out.mp4"),
        };
        let args = mux_args(&job);
        let graph = value_after(&args, "-filter_complex");
        assert!(graph.contains("apad,atrim=0:12.500"));
        assert!(!graph.contains("amix"));
        assert_eq!(value_after(&args, "-t"), "12.500");
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
    }

    #[test]
    fn mux_with_music_loops_and_attenuates() {
        let job = MuxJob {
            video: PathBuf::from("v.mp4"),
            narration: PathBuf::from("n.wav"),
            narration_volume: 1.0,
            music: Some(PathBuf::from("m.mp3")),
            music_volume: 0.2,
            duration: 8.0,
            output: PathBuf::from("out.mp4"),
        };
        let args = mux_args(&job);
        let graph = value_after(&args, "-filter_complex");
        assert!(graph.contains("[2:a]volume=0.20"));
        assert!(graph.contains("amix=inputs=2:duration=first"));
        assert_eq!(value_after(&args, "-stream_loop"), "-1");
    }

    #[test]
    fn probe_output_parsing() {
        assert_eq!(parse_probe_duration("12.480000\n"), Some(12.48));
        assert_eq!(parse_probe_duration("N/A\n"), None);
        assert_eq!(parse_probe_duration(""), None);
    }

    #[test]
    fn stderr_is_trimmed_to_tail() {
        let noisy: String = (0..40).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(noisy.as_bytes());
        assert!(tail.starts_with("line 28"));
        assert!(tail.ends_with("line 39"));
    }
}
