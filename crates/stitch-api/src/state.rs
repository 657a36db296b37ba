//! Application state.

use std::sync::Arc;

use stitch_media::MediaMerger;
use stitch_queue::{JobQueue, JobReceiver, LedgerConfig, PollingGateway, ProgressLedger};
use stitch_remote::{DriveUploader, OAuthManager, RemoteConfig, YouTubeUploader};
use stitch_storage::{StagingConfig, StagingStore};
use stitch_worker::{JobExecutor, ProcessingContext, WorkerConfig, YouTubeAdapter};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: StagingStore,
    pub queue: JobQueue,
    pub gateway: PollingGateway,
    pub oauth: Arc<OAuthManager>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: StagingStore,
        queue: JobQueue,
        oauth: Arc<OAuthManager>,
    ) -> Self {
        let gateway = PollingGateway::new(Arc::clone(queue.ledger()), store.clone());
        Self {
            config,
            store,
            queue,
            gateway,
            oauth,
        }
    }

    /// Build the state and the executor that consumes its queue.
    pub async fn bootstrap(
        config: ApiConfig,
    ) -> Result<(Self, JobExecutor, JobReceiver), Box<dyn std::error::Error>> {
        let store = StagingStore::open(StagingConfig::from_env()).await?;
        let ledger = Arc::new(ProgressLedger::open(&LedgerConfig::from_env()));
        let (queue, jobs) = JobQueue::channel(Arc::clone(&ledger));

        let remote = RemoteConfig::from_env()?;
        let oauth = Arc::new(OAuthManager::new(remote.clone())?);

        let worker_config = WorkerConfig::from_env();
        let ctx = ProcessingContext {
            store: store.clone(),
            ledger,
            transcoder: Arc::new(MediaMerger::new(worker_config.merge.clone())),
            drive: Arc::new(DriveUploader::new(&remote)?),
            video_platform: Arc::new(YouTubeAdapter::new(
                YouTubeUploader::new(&remote)?,
                Arc::clone(&oauth),
            )),
        };
        let executor = JobExecutor::new(worker_config, ctx);

        Ok((Self::new(config, store, queue, oauth), executor, jobs))
    }
}
