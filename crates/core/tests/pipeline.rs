use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rand::{SeedableRng, rngs::StdRng};
use shortcast_core::{
    Credential, Pipeline, PipelineConfig, PipelineError, PipelineObserver, PrivacyStatus,
    RunOptions, Stage, UploadMetadata, UploadProgress,
    assets::AssetProvider,
    content::ContentProvider,
    narration::Narrator,
    publish::{
        AccessToken, ApiError, ChunkOutcome, Publisher, RetryPolicy, UploadApi, UploadSession,
    },
    render::{
        CaptionStyle, Renderer,
        fakes::{BlockGlyphs, EncoderOp, RecordingEncoder},
    },
};
use tokio::sync::broadcast;

#[derive(Default)]
struct AcceptingServer {
    received: Mutex<Vec<u8>>,
    calls: AtomicUsize,
    privacy: Mutex<Option<PrivacyStatus>>,
}

struct ServerHandle(Arc<AcceptingServer>);

#[async_trait]
impl UploadApi for ServerHandle {
    async fn refresh_access_token(&self, _: &Credential) -> Result<AccessToken, ApiError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new("token"))
    }

    async fn start_session(
        &self,
        _: &AccessToken,
        metadata: &UploadMetadata,
        total_bytes: u64,
    ) -> Result<UploadSession, ApiError> {
        *self.0.privacy.lock().unwrap() = Some(metadata.privacy_status);
        Ok(UploadSession {
            uri: "https://upload/session".into(),
            total_bytes,
        })
    }

    async fn put_chunk(
        &self,
        _: &AccessToken,
        session: &UploadSession,
        _: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkOutcome, ApiError> {
        let mut received = self.0.received.lock().unwrap();
        received.extend_from_slice(&chunk);
        if received.len() as u64 == session.total_bytes {
            Ok(ChunkOutcome::Complete {
                video_id: "abc123".into(),
            })
        } else {
            Ok(ChunkOutcome::Incomplete {
                next_offset: received.len() as u64,
            })
        }
    }

    async fn query_offset(
        &self,
        _: &AccessToken,
        _: &UploadSession,
    ) -> Result<ChunkOutcome, ApiError> {
        Ok(ChunkOutcome::Incomplete {
            next_offset: self.0.received.lock().unwrap().len() as u64,
        })
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    progress: Mutex<Vec<UploadProgress>>,
}

impl PipelineObserver for Recorder {
    fn stage_started(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start {stage}"));
    }

    fn stage_finished(&self, stage: Stage, _: &str) {
        self.events.lock().unwrap().push(format!("done {stage}"));
    }

    fn stage_failed(&self, stage: Stage, _: &PipelineError) {
        self.events.lock().unwrap().push(format!("fail {stage}"));
    }

    fn upload_progress(&self, progress: UploadProgress) {
        self.progress.lock().unwrap().push(progress);
    }
}

fn config(output_dir: &Path, with_credentials: bool) -> PipelineConfig {
    let mut env: HashMap<&str, String> = HashMap::from([
        ("OUTPUT_DIR", output_dir.display().to_string()),
        ("MUSIC_PATH", output_dir.join("no-music.mp3").display().to_string()),
        ("TEXT_SOURCE", "local".to_string()),
        ("VIDEO_WIDTH", "720".to_string()),
        ("VIDEO_HEIGHT", "1280".to_string()),
        ("TARGET_SECONDS", "3".to_string()),
        ("SEGMENT_COUNT", "3".to_string()),
        ("MIN_SEGMENT_SECONDS", "1".to_string()),
    ]);
    if with_credentials {
        env.insert("YT_CLIENT_ID", "id".into());
        env.insert("YT_CLIENT_SECRET", "secret".into());
        env.insert("YT_REFRESH_TOKEN", "refresh".into());
    }
    PipelineConfig::from_lookup(|key| env.get(key).cloned(), false).unwrap()
}

fn pipeline(
    config: PipelineConfig,
    encoder: Arc<RecordingEncoder>,
    server: Arc<AcceptingServer>,
) -> Pipeline {
    let content = ContentProvider::new(
        None,
        config.timing,
        Duration::from_secs(1),
        StdRng::seed_from_u64(3),
    );
    let assets = AssetProvider::new(
        None,
        "technology",
        config.music_path.clone(),
        Duration::from_secs(1),
        StdRng::seed_from_u64(4),
    );
    let renderer = Renderer::new(encoder, Arc::new(BlockGlyphs), CaptionStyle::default());
    let publisher = Publisher::new(
        Box::new(ServerHandle(server)),
        config.upload.chunk_bytes,
        RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        },
    );
    Pipeline::new(config, content, assets, Narrator::new(None), renderer, publisher)
}

fn run_dirs(output: &Path) -> usize {
    std::fs::read_dir(output).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn full_run_renders_and_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(RecordingEncoder::new());
    let server = Arc::new(AcceptingServer::default());
    let config = config(dir.path(), true);
    let mut pipeline = pipeline(config, Arc::clone(&encoder), Arc::clone(&server));

    let (_tx, mut shutdown) = broadcast::channel(1);
    let observer = Recorder::default();
    let options = RunOptions {
        topic: Some("quick python tip".into()),
        privacy: Some(PrivacyStatus::Unlisted),
        ..RunOptions::default()
    };

    let report = pipeline.run(&options, &observer, &mut shutdown).await.unwrap();

    assert_eq!(report.video_id.as_deref(), Some("abc123"));
    assert_eq!(report.topic, "quick python tip");
    assert!(report.video_path.is_none());
    assert_eq!(run_dirs(dir.path()), 0, "run directory should be cleaned up");
    assert_eq!(*server.privacy.lock().unwrap(), Some(PrivacyStatus::Unlisted));

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start content", "done content", "start assets", "done assets",
            "start narration", "done narration", "start render", "done render",
            "start publish", "done publish",
        ]
    );

    let progress = observer.progress.lock().unwrap().clone();
    let last = progress.last().unwrap();
    assert_eq!(last.sent_bytes, last.total_bytes);

    let ops = encoder.ops();
    let mux = ops
        .iter()
        .find_map(|op| match op {
            EncoderOp::Mux(job) => Some(job.clone()),
            _ => None,
        })
        .unwrap();
    assert!(mux.music.is_none());
    assert!((mux.duration - report.duration_seconds).abs() < 1e-9);
}

#[tokio::test]
async fn missing_credentials_fail_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(RecordingEncoder::new());
    let server = Arc::new(AcceptingServer::default());
    let config = config(dir.path(), false);
    let mut pipeline = pipeline(config, Arc::clone(&encoder), Arc::clone(&server));

    let (_tx, mut shutdown) = broadcast::channel(1);
    let err = pipeline
        .run(&RunOptions::default(), &shortcast_core::NoopObserver, &mut shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    assert!(encoder.ops().is_empty());
    assert_eq!(server.calls.load(Ordering::SeqCst), 0);
    assert_eq!(run_dirs(dir.path()), 0);
}

#[tokio::test]
async fn skip_upload_keeps_the_video() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(RecordingEncoder::new());
    let server = Arc::new(AcceptingServer::default());
    let config = config(dir.path(), false);
    let mut pipeline = pipeline(config, Arc::clone(&encoder), Arc::clone(&server));

    let (_tx, mut shutdown) = broadcast::channel(1);
    let options = RunOptions {
        upload: false,
        ..RunOptions::default()
    };
    let report = pipeline
        .run(&options, &shortcast_core::NoopObserver, &mut shutdown)
        .await
        .unwrap();

    let path = report.video_path.unwrap();
    assert!(path.exists());
    assert!(report.video_id.is_none());
    assert_eq!(server.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_stops_between_stages() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(RecordingEncoder::new());
    let server = Arc::new(AcceptingServer::default());
    let config = config(dir.path(), true);
    let mut pipeline = pipeline(config, Arc::clone(&encoder), Arc::clone(&server));

    let (tx, mut shutdown) = broadcast::channel(1);
    tx.send(()).unwrap();

    let err = pipeline
        .run(&RunOptions::default(), &shortcast_core::NoopObserver, &mut shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled { after: "content" }));
    assert!(encoder.ops().is_empty());
    assert_eq!(server.calls.load(Ordering::SeqCst), 0);
}
