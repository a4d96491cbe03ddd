//! Policy watch loop
//!
//! Watches `ResourceTTL` objects, turns watch events into [`PolicyEvent`]s
//! and hands each one to the [`Reconciler`] on its own task. A reflector
//! cache of the policies is re-submitted on every resync tick, which is what
//! retries skipped passes and catches resources that expired between
//! notifications.

use crate::config::ControllerConfig;
use crate::core::{PolicyEvent, PolicyObject, PolicyRef, Result, TtlError};
use crate::reconcile::Reconciler;
use crate::shutdown::Shutdown;
use futures::StreamExt;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::runtime::reflector::{self, Store};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const POLICY_KIND: &str = "ResourceTTL";

/// API coordinates of the policy custom resource.
pub fn policy_api_resource(config: &ControllerConfig) -> ApiResource {
    let gvk = GroupVersionKind::gvk(&config.policy_group, &config.policy_version, POLICY_KIND);
    ApiResource::from_gvk_with_plural(&gvk, &config.policy_plural)
}

pub fn policy_object(object: &DynamicObject) -> PolicyObject {
    let id = PolicyRef {
        namespace: object.metadata.namespace.clone(),
        name: object.metadata.name.clone().unwrap_or_default(),
    };
    PolicyObject::new(id, object.data.clone())
}

/// Maps a watcher event to a policy notification.
///
/// Objects seen during the initial list are `Added`; later applies are
/// `Updated`. Init markers carry no object and map to `None`.
pub fn policy_event(event: watcher::Event<DynamicObject>) -> Option<PolicyEvent> {
    match event {
        watcher::Event::InitApply(object) => Some(PolicyEvent::Added(policy_object(&object))),
        watcher::Event::Apply(object) => Some(PolicyEvent::Updated(policy_object(&object))),
        watcher::Event::Delete(object) => Some(PolicyEvent::Deleted(policy_object(&object))),
        watcher::Event::Init | watcher::Event::InitDone => None,
    }
}

/// Runs reconciliation passes on background tasks, at most
/// `max_concurrent` at a time.
pub struct Dispatcher {
    reconciler: Reconciler,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(reconciler: Reconciler, max_concurrent: usize) -> Self {
        Self {
            reconciler,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Spawns a pass for `event`, waiting for a free slot first.
    pub async fn submit(&mut self, event: PolicyEvent) -> Result<()> {
        self.reap();

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| TtlError::Cancelled(format!("dispatcher closed: {}", err)))?;

        let reconciler = self.reconciler.clone();
        self.tasks.spawn(async move {
            let _permit = permit;
            reconciler.handle(event).await;
        });
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every spawned pass to finish.
    pub async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "Reconciliation task panicked");
            }
        }
    }

    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(err) = joined {
                warn!(error = %err, "Reconciliation task panicked");
            }
        }
    }
}

fn resync_timer(period: Option<Duration>) -> Option<Interval> {
    period.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// One `Updated` notification per cached policy.
pub fn resync_events(cache: &Store<DynamicObject>) -> Vec<PolicyEvent> {
    cache
        .state()
        .iter()
        .map(|object| PolicyEvent::Updated(policy_object(object)))
        .collect()
}

/// Re-submits every cached policy as `Updated`.
pub async fn resync(cache: &Store<DynamicObject>, dispatcher: &mut Dispatcher) -> Result<()> {
    let events = resync_events(cache);
    debug!(policies = events.len(), "Resyncing cached policies");
    for event in events {
        dispatcher.submit(event).await?;
    }
    Ok(())
}

/// Watches policy objects until `shutdown` fires or the stream ends, then
/// waits for in-flight passes.
pub async fn run(
    client: Client,
    reconciler: Reconciler,
    config: &ControllerConfig,
    shutdown: Shutdown,
) -> Result<()> {
    let resource = policy_api_resource(config);
    let api: Api<DynamicObject> = match &config.policy_namespace {
        Some(namespace) => Api::namespaced_with(client, namespace, &resource),
        None => Api::all_with(client, &resource),
    };

    let writer = reflector::store::Writer::new(resource.clone());
    let cache = writer.as_reader();
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer);
    let mut stream = std::pin::pin!(stream);

    let mut dispatcher = Dispatcher::new(reconciler, config.max_concurrent_passes);
    let mut timer = resync_timer(config.resync_interval);

    info!(
        group = %config.policy_group,
        version = %config.policy_version,
        plural = %config.policy_plural,
        namespace = config.policy_namespace.as_deref().unwrap_or("<all>"),
        resync_secs = ?config.resync_interval.map(|d| d.as_secs()),
        "Watching TTL policies"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                info!("Shutdown requested, stopping policy watch");
                break;
            }
            _ = next_tick(&mut timer) => {
                resync(&cache, &mut dispatcher).await?;
            }
            next = stream.next() => match next {
                Some(Ok(event)) => {
                    if let Some(event) = policy_event(event) {
                        debug!(policy = %event.object().id, event = event.label(), "Policy notification");
                        dispatcher.submit(event).await?;
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "Policy watch error, backing off");
                }
                None => {
                    warn!("Policy watch stream ended");
                    break;
                }
            }
        }
    }

    info!(in_flight = dispatcher.in_flight(), "Waiting for in-flight passes");
    dispatcher.drain().await;
    Ok(())
}
