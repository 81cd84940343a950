//! Runtime assembly shared by `run` and `chat`.
//!
//! Wires store, sessions, target chat, calendar, dispatcher and scheduler
//! around one channel, then serves until Ctrl-C or the inbound stream ends.

use listkeeper_config::AppConfig;
use listkeeper_core::channel::Channel;
use listkeeper_core::chat::ChatId;
use listkeeper_core::clock::{Clock, SystemClock};
use listkeeper_core::store::ItemStore;
use listkeeper_dispatch::Dispatcher;
use listkeeper_session::{SessionRegistry, TargetChat};
use listkeeper_store::SqliteStore;
use listkeeper_workflow::{DailyScheduler, Trigger};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Runtime {
    channel: Arc<dyn Channel>,
    dispatcher: Arc<Dispatcher>,
    scheduler: Arc<DailyScheduler>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl Runtime {
    pub async fn assemble(config: &AppConfig, channel: Arc<dyn Channel>) -> Result<Self, Box<dyn std::error::Error>> {
        let tz = config.tz()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store: Arc<dyn ItemStore> = Arc::new(
            SqliteStore::new(&config.db_path)
                .await
                .map_err(|e| format!("Failed to open database {}: {e}", config.db_path))?,
        );
        let target = Arc::new(TargetChat::new(config.target_chat_id.map(ChatId), store.clone()));
        let sessions = Arc::new(SessionRegistry::new(config.session.ttl(), clock.clone()));
        let calendar = listkeeper_calendar::from_config(&config.calendar, tz)?;
        let triggers = Trigger::from_config(&config.schedule)?;

        let dispatcher = Arc::new(Dispatcher::new(
            sessions,
            store.clone(),
            channel.clone(),
            target.clone(),
            clock.clone(),
        ));
        let scheduler = Arc::new(DailyScheduler::new(
            triggers,
            tz,
            store,
            channel.clone(),
            calendar,
            target,
        ));

        info!(
            channel = channel.name(),
            db = %config.db_path,
            timezone = %tz,
            ttl_minutes = config.session.ttl_minutes,
            "Runtime assembled"
        );

        Ok(Self {
            channel,
            dispatcher,
            scheduler,
            clock,
            poll_interval: config.schedule.poll_interval(),
        })
    }

    pub fn scheduler(&self) -> &DailyScheduler {
        &self.scheduler
    }

    /// Start the channel and both workers; return once they have stopped.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        let events = self.channel.start().await?;
        let cancel = CancellationToken::new();

        let mut dispatcher_task = self.dispatcher.clone().spawn(events, cancel.child_token());
        let scheduler_task = self
            .scheduler
            .clone()
            .spawn(self.clock.clone(), self.poll_interval, cancel.child_token());

        let dispatcher_finished = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown requested");
                false
            }
            joined = &mut dispatcher_task => {
                if let Err(e) = joined {
                    warn!(error = %e, "Dispatcher task failed");
                }
                true
            }
        };

        cancel.cancel();
        if !dispatcher_finished && let Err(e) = dispatcher_task.await {
            warn!(error = %e, "Dispatcher task failed");
        }
        if let Err(e) = scheduler_task.await {
            warn!(error = %e, "Scheduler task failed");
        }

        if let Err(e) = self.channel.stop().await {
            warn!(channel = self.channel.name(), error = %e, "Channel did not stop cleanly");
        }
        info!("Stopped");
        Ok(())
    }
}
