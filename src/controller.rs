//! Trigger wiring: watches `AnnotatedObject`s and runs one reconciliation
//! pass per change.
//!
//! The kube-runtime [`Controller`] owns scheduling: it deduplicates work per
//! object key, so a single object is never reconciled twice concurrently.
//! Failed passes are requeued with per-object exponential backoff; the
//! reconciler itself never retries.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use epha_core::{AnnotatedObject, BackoffConfig, Config, ObjectKey};
use epha_reconciler::{KubeCluster, Reconciler, ReconcilerBuilder, resolver_from_config};
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::watcher;
use kube::{Api, Client, Resource, ResourceExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors surfaced to the controller runtime.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("AnnotatedObject '{name}' has no namespace")]
    MissingNamespace { name: String },

    #[error(transparent)]
    Reconcile(#[from] epha_reconciler::Error),
}

impl ControllerError {
    fn is_poison_pill(&self) -> bool {
        match self {
            Self::MissingNamespace { .. } => true,
            Self::Reconcile(e) => e.is_poison_pill(),
        }
    }
}

/// Exponential requeue delay: `base * 2^attempt`, capped at `max`.
pub fn backoff_delay(attempt: u32, config: &BackoffConfig) -> Duration {
    let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
    config.base.saturating_mul(factor).min(config.max)
}

/// Per-object failure counters.
pub struct Backoff {
    config: BackoffConfig,
    failures: DashMap<ObjectKey, u32>,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: DashMap::new(),
        }
    }

    /// Record a failure and return how long to wait before the next pass.
    pub fn next_delay(&self, key: &ObjectKey) -> Duration {
        let mut failures = self.failures.entry(key.clone()).or_insert(0);
        let attempt = *failures;
        *failures = attempt.saturating_add(1);
        backoff_delay(attempt, &self.config)
    }

    /// Forget past failures after a successful pass.
    pub fn reset(&self, key: &ObjectKey) {
        self.failures.remove(key);
    }

    /// Consecutive failures recorded for `key`.
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures.get(key).map_or(0, |f| *f)
    }

    /// Number of objects with outstanding failures.
    pub fn tracked(&self) -> usize {
        self.failures.len()
    }

    pub const fn max_delay(&self) -> Duration {
        self.config.max
    }
}

/// Shared state handed to every reconcile call.
pub struct Context {
    reconciler: Reconciler,
    backoff: Backoff,
}

impl Context {
    pub const fn new(reconciler: Reconciler, backoff: Backoff) -> Self {
        Self {
            reconciler,
            backoff,
        }
    }

    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}

fn object_key(object: &AnnotatedObject) -> Result<ObjectKey, ControllerError> {
    let name = object.name_any();
    let namespace = object
        .namespace()
        .ok_or_else(|| ControllerError::MissingNamespace { name: name.clone() })?;
    Ok(ObjectKey::new(namespace, name))
}

/// Run one pass for the object behind a watch event.
///
/// # Errors
///
/// Returns the pass error so the runtime requeues the object.
pub async fn reconcile(
    object: Arc<AnnotatedObject>,
    ctx: Arc<Context>,
) -> Result<Action, ControllerError> {
    let key = object_key(&object)?;
    let outcome = ctx.reconciler.reconcile(&key).await?;
    ctx.backoff.reset(&key);
    debug!(object = %key, ?outcome, "Pass finished");
    Ok(Action::await_change())
}

/// Requeue a failed object with exponential backoff.
pub fn error_policy(
    object: Arc<AnnotatedObject>,
    error: &ControllerError,
    ctx: Arc<Context>,
) -> Action {
    let delay = object_key(&object).map_or_else(
        |_| ctx.backoff.max_delay(),
        |key| ctx.backoff.next_delay(&key),
    );

    if error.is_poison_pill() {
        error!(
            object = %object.name_any(),
            error = %error,
            requeue_ms = delay.as_millis(),
            "Declaration cannot be applied until it is corrected"
        );
    } else {
        warn!(
            object = %object.name_any(),
            error = %error,
            requeue_ms = delay.as_millis(),
            "Reconciliation failed, requeueing"
        );
    }

    Action::requeue(delay)
}

/// Drop the failure counter of an object that left the cluster while it was
/// still being requeued. No pass will run for it again, so `reset` never fires.
fn forget_deleted(ctx: &Context, namespace: Option<&str>, name: &str) {
    let Some(namespace) = namespace else {
        return;
    };
    let key = ObjectKey::new(namespace, name);
    if ctx.backoff.failures.remove(&key).is_some() {
        debug!(object = %key, "Object deleted, backoff state dropped");
    }
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    namespace.map_or_else(
        || Api::all(client.clone()),
        |ns| Api::namespaced(client.clone(), ns),
    )
}

/// Build the reconciler from `config` and run the controller until a
/// termination signal arrives.
///
/// # Errors
///
/// Returns an error if the configuration does not yield a valid reconciler.
pub async fn run(client: Client, config: Config) -> Result<(), ControllerError> {
    let cluster = Arc::new(KubeCluster::new(client.clone()));
    let resolver = resolver_from_config(&config, Arc::clone(&cluster))?;
    let reconciler = ReconcilerBuilder::new()
        .with_source(cluster)
        .with_resolver(resolver)
        .build()?;
    let context = Arc::new(Context::new(reconciler, Backoff::new(config.backoff)));
    let events = Arc::clone(&context);

    let namespace = config.namespace.as_deref();
    info!(
        namespace = namespace.unwrap_or("<all>"),
        strategy = %config.strategy,
        "Starting AnnotatedObject controller"
    );

    Controller::new(
        scoped_api::<AnnotatedObject>(&client, namespace),
        watcher::Config::default(),
    )
    .owns(
        scoped_api::<Deployment>(&client, namespace),
        watcher::Config::default(),
    )
    .owns(
        scoped_api::<ReplicaSet>(&client, namespace),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(reconcile, error_policy, context)
    .for_each(|result| {
        match result {
            Ok((object, _)) => debug!(object = %object, "Reconciled"),
            Err(controller::Error::ObjectNotFound(object)) => {
                forget_deleted(&events, object.namespace.as_deref(), &object.name);
            }
            Err(e) => debug!(error = %e, "Controller event"),
        }
        futures::future::ready(())
    })
    .await;

    info!("Controller stopped");
    Ok(())
}
