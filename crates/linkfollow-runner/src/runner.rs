use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use linkfollow_core::{Checkpoint, DispatchOutcome, FollowRequest, ItemBucket};
use linkfollow_net::{
    build_client, FollowDelivery, HttpFollowDelivery, HttpLinkSource, HttpMentionSearch,
    LinkSource, MentionSearch,
};
use linkfollow_sched::{AdaptiveScheduler, CrontabBackend, TriggerBackend, TriggerPeriod};
use linkfollow_store::{CheckpointStore, DirQueue};
use tracing::info;

use crate::config::Config;
use crate::{discovery, worker};

/// Credentials for the follow-delivery account. Never persisted; they
/// arrive from flags or the environment on every invocation.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct StatusReport {
    pub checkpoint: Checkpoint,
    pub ready: usize,
    pub claimed: usize,
    pub done: usize,
    pub error: usize,
}

/// Owns the persistent state (checkpoint + queue) and wires the
/// discovery pipeline, dispatch worker and adaptive scheduler together.
pub struct Runner {
    pub state_root: PathBuf,
    pub cfg: Config,
    pub checkpoint: CheckpointStore,
    pub queue: DirQueue,
    pub scheduler: AdaptiveScheduler,
}

impl Runner {
    /// Open the installation at `state_root` (default `~/.linkfollow`),
    /// creating the config file, checkpoint and queue storage on first
    /// use. Triggers go to the user's crontab.
    pub fn open(state_root: Option<PathBuf>) -> Result<Self> {
        Self::open_with_backend(state_root, Box::new(CrontabBackend::new()))
    }

    pub fn open_with_backend(
        state_root: Option<PathBuf>,
        backend: Box<dyn TriggerBackend>,
    ) -> Result<Self> {
        let state_root = state_root.unwrap_or_else(Config::default_state_root);

        let cfg_path = Config::config_path(&state_root);
        let cfg = if cfg_path.exists() {
            Config::load_from(&cfg_path)?
        } else {
            let cfg = Config::default_config();
            cfg.save_to(&cfg_path)?;
            cfg
        };

        let checkpoint = CheckpointStore::new(Config::checkpoint_path(&state_root));
        let queue = DirQueue::open(Config::queue_path(&state_root))?;
        let scheduler = AdaptiveScheduler::new(
            backend,
            dispatch_signature(),
            TriggerPeriod::EveryMinutes(cfg.dispatch.period_minutes),
        );

        Ok(Self {
            state_root,
            cfg,
            checkpoint,
            queue,
            scheduler,
        })
    }

    /// Discover actors that referenced a tracked link since the last
    /// run. Touches the checkpoint, never the queue.
    pub fn find(&self) -> Result<Vec<String>> {
        let (links, search) = self.http_discovery()?;
        self.find_with(&links, &search)
    }

    pub fn find_with(
        &self,
        links: &dyn LinkSource,
        search: &dyn MentionSearch,
    ) -> Result<Vec<String>> {
        discovery::run(
            links,
            search,
            &self.checkpoint,
            self.cfg.links_user(),
            &self.cfg.links.tags,
            |_, _| Ok(()),
        )
    }

    /// Discover and enqueue one follow request per newly seen actor,
    /// then converge the dispatch trigger with the queue state.
    pub fn follow(&self) -> Result<Vec<String>> {
        let (links, search) = self.http_discovery()?;
        self.follow_with(&links, &search)
    }

    pub fn follow_with(
        &self,
        links: &dyn LinkSource,
        search: &dyn MentionSearch,
    ) -> Result<Vec<String>> {
        let names = discovery::run(
            links,
            search,
            &self.checkpoint,
            self.cfg.links_user(),
            &self.cfg.links.tags,
            |mention, url| {
                let request = FollowRequest {
                    actor_id: mention.actor_id.clone(),
                    actor_name: mention.actor_name.to_lowercase(),
                    source_url: url.to_string(),
                };
                if self.queue.enqueue(mention.actor_id.as_str(), request)?.is_some() {
                    info!(actor = %mention.actor_name, "queued follow request");
                }
                Ok(())
            },
        )?;
        self.scheduler.sync(self.queue.is_empty()?)?;
        Ok(names)
    }

    /// One dispatch tick against the real follow endpoint.
    pub fn push(&self, credentials: &Credentials) -> Result<DispatchOutcome> {
        let delivery = self.http_delivery(credentials)?;
        self.push_with(&delivery)
    }

    pub fn push_with(&self, delivery: &dyn FollowDelivery) -> Result<DispatchOutcome> {
        worker::run_once(&self.queue, delivery, &self.scheduler)
    }

    pub fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            checkpoint: self.checkpoint.load()?,
            ready: self.queue.count_bucket(ItemBucket::Ready)?,
            claimed: self.queue.count_bucket(ItemBucket::Claimed)?,
            done: self.queue.count_bucket(ItemBucket::Done)?,
            error: self.queue.count_bucket(ItemBucket::Error)?,
        })
    }

    /// Reset the checkpoint (scraping from way back on the next run)
    /// and destroy the queue.
    pub fn reset(&self) -> Result<()> {
        self.checkpoint.reset()?;
        self.queue.reset()?;
        self.scheduler.sync(true)?;
        Ok(())
    }

    pub fn purge(&self) -> Result<usize> {
        self.queue.purge_terminal()
    }

    pub fn recover(&self) -> Result<usize> {
        let recovered = self.queue.recover_claimed()?;
        self.scheduler.sync(self.queue.is_empty()?)?;
        Ok(recovered)
    }

    /// Install the coarse discovery trigger, replacing any stale
    /// linkfollow lines first. The fine-grained dispatch trigger is
    /// left to the adaptive rule.
    pub fn automate(&self) -> Result<()> {
        let backend = self.scheduler.backend();
        backend.remove(&follow_signature())?;
        backend.remove(self.scheduler.signature())?;
        backend.install(
            &follow_signature(),
            TriggerPeriod::EveryHours(self.cfg.dispatch.discover_every_hours),
        )?;
        info!(
            every_hours = self.cfg.dispatch.discover_every_hours,
            "installed discovery trigger"
        );
        Ok(())
    }

    fn http_discovery(&self) -> Result<(HttpLinkSource, HttpMentionSearch)> {
        if self.cfg.search.api_key.is_empty() {
            bail!("missing search api key: set search.api_key in linkfollow.toml");
        }
        if self.cfg.links_user().is_empty() {
            bail!("missing links user: set links.user or service.user in linkfollow.toml");
        }
        let client = build_client().context("build http client")?;
        let links = HttpLinkSource::new(client.clone(), self.cfg.links.base_url.clone());
        let search = HttpMentionSearch::new(
            client,
            self.cfg.search.base_url.clone(),
            self.cfg.search.api_key.clone(),
        );
        Ok((links, search))
    }

    fn http_delivery(&self, credentials: &Credentials) -> Result<HttpFollowDelivery> {
        if credentials.user.is_empty() || credentials.password.is_empty() {
            bail!("missing delivery credentials: pass --user and --password");
        }
        let client = build_client().context("build http client")?;
        Ok(HttpFollowDelivery::new(
            client,
            self.cfg.service.follow_url.clone(),
            credentials.user.clone(),
            credentials.password.clone(),
        ))
    }
}

/// Command signatures identify our crontab lines. The binary path is
/// resolved at install time so the trigger survives $PATH differences
/// between the shell and cron.
fn binary_path() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "linkfollow".to_string())
}

pub fn dispatch_signature() -> String {
    format!("{} push", binary_path())
}

pub fn follow_signature() -> String {
    format!("{} follow", binary_path())
}
