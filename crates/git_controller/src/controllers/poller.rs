use super::{
    reconciler::{Reconciled, Reconciler},
    writer::{KubeWriter, WorkloadWriter},
};
use crate::{
    api::Workload,
    git::{GitCli, GitOps, MirrorStore},
    util::{
        errors::{Error, Result, StdError},
        metrics,
    },
};
use chrono::{DateTime, Utc};
use k8s_openapi::api::{apps::v1::Deployment, core::v1::ReplicationController};
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::events::{Event, EventType, Recorder, Reporter},
    ResourceExt,
};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use tokio::{
    sync::RwLock,
    time::{self, Duration, MissedTickBehavior},
};
use tracing::*;

/// Runtime settings of the poll loop
#[derive(Clone, Debug)]
pub struct Settings {
    /// Namespace to watch, all namespaces when unset
    pub namespace: Option<String>,
    /// Label selector restricting the workloads inspected
    pub selector: Option<String>,
    pub poll_interval: Duration,
    /// Directory the `repos` mirror tree is created under
    pub base_dir: PathBuf,
    pub git_binary: PathBuf,
}

/// State shared between the poll loop and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the poll loop
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the poll loop outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Context that can update State
    pub fn to_context(&self, client: Client, settings: &Settings) -> Result<Arc<Context>> {
        let metrics = metrics::Metrics::default()
            .register(&self.registry)
            .map_err(|e| Error::StdError(StdError::MetricsError(e)))?;
        let mirrors = MirrorStore::new(&settings.base_dir, GitCli::new(&settings.git_binary));
        Ok(Arc::new(Context {
            reconciler: Reconciler::new(mirrors, KubeWriter::new(client.clone())),
            client,
            metrics,
            diagnostics: self.diagnostics.clone(),
        }))
    }
}

// Context for the poll loop
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    pub reconciler: Reconciler<GitCli, KubeWriter>,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: metrics::Metrics,
}

/// Outcome counts of one poll over every selected workload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub inspected: usize,
    pub updated: usize,
    pub failed: usize,
}

impl PassSummary {
    fn merge(&mut self, other: PassSummary) {
        self.inspected += other.inspected;
        self.updated += other.updated;
        self.failed += other.failed;
    }
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    pub last_pass: PassSummary,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            last_pass: PassSummary::default(),
            reporter: "git-controller".into(),
        }
    }
}
impl Diagnostics {
    fn recorder(&self, client: Client) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

fn list_params(settings: &Settings) -> ListParams {
    match &settings.selector {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

fn api_for<K: Workload>(client: &Client, settings: &Settings) -> Api<K> {
    match &settings.namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

async fn publish_changes<K: Workload>(reconciled: &Reconciled<K>, ctx: &Context) {
    let recorder = ctx.diagnostics.read().await.recorder(ctx.client.clone());
    let note = reconciled
        .changes
        .iter()
        .map(|c| format!("{}: {} -> {}", c.volume, c.from, c.to))
        .collect::<Vec<_>>()
        .join(", ");
    let result = recorder
        .publish(
            &Event {
                type_: EventType::Normal,
                reason: "RevisionUpdated".into(),
                note: Some(note),
                action: "Updating".into(),
                secondary: None,
            },
            &reconciled.workload.object_ref(&()),
        )
        .await;
    if let Err(e) = result {
        warn!("failed to publish event for {}: {}", reconciled.workload.name_any(), e);
    }
}

/// Reconcile `workloads` one after the other.
///
/// A failing object is logged once and counted, then the next one is tried.
/// Returns the counts for this batch and every workload that was written back.
pub async fn reconcile_all<K, G, W>(
    reconciler: &Reconciler<G, W>,
    workloads: Vec<K>,
    metrics: &metrics::Metrics,
) -> (PassSummary, Vec<Reconciled<K>>)
where
    K: Workload,
    G: GitOps,
    W: WorkloadWriter,
{
    let kind = K::kind_name();
    let mut summary = PassSummary::default();
    let mut updated = Vec::new();

    for workload in workloads {
        let _timer = metrics.count_and_measure(&kind);
        let name = workload.name_any();
        let ns = workload.namespace().unwrap_or_default();
        summary.inspected += 1;

        match reconciler.reconcile(workload).await {
            Ok(reconciled) if reconciled.changed() => {
                summary.updated += 1;
                metrics.revisions_advanced(&kind.to_lowercase(), reconciled.changes.len());
                updated.push(reconciled);
            }
            Ok(_) => {}
            Err(e) => {
                summary.failed += 1;
                if e.is_unsupported() {
                    warn!("skipping {} '{}' in namespace '{}': {}", kind, name, ns, e);
                } else {
                    error!("failed to reconcile {} '{}' in namespace '{}': {}", kind, name, ns, e);
                }
                metrics.reconcile_failure(&kind.to_lowercase(), &e);
            }
        }
    }

    (summary, updated)
}

/// List the selected workloads of kind `K`, reconcile them and announce the updates.
async fn poll_kind<K: Workload>(ctx: &Context, settings: &Settings) -> PassSummary {
    let kind = K::kind_name();

    let workloads = match api_for::<K>(&ctx.client, settings).list(&list_params(settings)).await {
        Ok(list) => list.items,
        Err(e) => {
            let e = Error::StdError(StdError::KubeError(e));
            error!("failed to list {}: {}", kind, e);
            ctx.metrics.reconcile_failure(&kind.to_lowercase(), &e);
            return PassSummary {
                failed: 1,
                ..Default::default()
            };
        }
    };

    let (summary, updated) = reconcile_all(&ctx.reconciler, workloads, &ctx.metrics).await;
    for reconciled in &updated {
        publish_changes(reconciled, ctx).await;
    }
    summary
}

/// One poll over Deployments then ReplicationControllers
pub async fn poll(ctx: Arc<Context>, settings: &Settings) -> PassSummary {
    ctx.diagnostics.write().await.last_event = Utc::now();

    let mut summary = poll_kind::<Deployment>(&ctx, settings).await;
    summary.merge(poll_kind::<ReplicationController>(&ctx, settings).await);

    info!(
        inspected = summary.inspected,
        updated = summary.updated,
        failed = summary.failed,
        "poll complete"
    );
    ctx.diagnostics.write().await.last_pass = summary.clone();
    summary
}

/// Initialize the poll loop and run it until the process exits
pub async fn run(state: State, settings: Settings) -> Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| Error::StdError(StdError::KubeError(e)))?;
    let ctx = state.to_context(client, &settings)?;

    if let Some(selector) = &settings.selector {
        info!("Using label selector: {}", selector);
    }
    info!(
        "Mirroring git volumes under {} every {:?}",
        ctx.reconciler.mirrors().base_dir().display(),
        settings.poll_interval
    );

    let mut interval = time::interval(settings.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        poll(ctx.clone(), &settings).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::{EventCapture, FakeGit, RecordingWriter};
    use k8s_openapi::api::{
        apps::v1::DeploymentSpec,
        core::v1::{GitRepoVolumeSource, PodSpec, PodTemplateSpec, ReplicationControllerSpec, Volume},
    };
    use kube::api::ObjectMeta;

    const APP: &str = "https://example.com/app.git";
    const BROKEN: &str = "https://example.com/broken.git";

    fn metadata(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("ns1".to_string()),
            ..Default::default()
        }
    }

    fn template(repository: &str) -> PodTemplateSpec {
        PodTemplateSpec {
            spec: Some(PodSpec {
                volumes: Some(vec![Volume {
                    name: "src".to_string(),
                    git_repo: Some(GitRepoVolumeSource {
                        repository: repository.to_string(),
                        revision: Some("abc123".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn deployment(name: &str, repository: &str) -> Deployment {
        Deployment {
            metadata: metadata(name),
            spec: Some(DeploymentSpec {
                template: template(repository),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn replication_controller(name: &str, repository: &str) -> ReplicationController {
        ReplicationController {
            metadata: metadata(name),
            spec: Some(ReplicationControllerSpec {
                template: Some(template(repository)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn one_failing_workload_does_not_stop_the_rest() {
        let base = tempfile::tempdir().unwrap();
        let git = FakeGit::default()
            .with_history(APP, &["abc123", "def456"])
            .failing(BROKEN);
        let writer = Arc::new(RecordingWriter::default());
        let reconciler = Reconciler::new(MirrorStore::new(base.path(), git), writer.clone());
        let metrics = metrics::Metrics::default();
        let capture = EventCapture::default();
        let guard = capture.install();

        let (mut summary, updated) = reconcile_all(
            &reconciler,
            vec![deployment("broken", BROKEN), deployment("web", APP)],
            &metrics,
        )
        .await;
        let (rc_summary, rc_updated) =
            reconcile_all(&reconciler, vec![replication_controller("legacy", APP)], &metrics).await;
        summary.merge(rc_summary);
        drop(guard);

        assert_eq!(
            summary,
            PassSummary {
                inspected: 3,
                updated: 1,
                failed: 2
            }
        );
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].workload.name_any(), "web");
        assert!(rc_updated.is_empty());
        assert_eq!(writer.updates().len(), 1);

        assert_eq!(
            metrics
                .failures
                .with_label_values(&["deployment", "giterror"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .failures
                .with_label_values(&["replicationcontroller", "unsupportedmutation"])
                .get(),
            1
        );
        assert_eq!(metrics.revisions_advanced.with_label_values(&["deployment"]).get(), 1);
        assert_eq!(metrics.reconciliations.get(), 3);

        let errors = capture.at(Level::ERROR);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].field("message").unwrap().contains("'broken'"));
        let skips = capture.at(Level::WARN);
        assert_eq!(skips.len(), 1);
        assert!(skips[0].field("message").unwrap().starts_with("skipping ReplicationController 'legacy'"));
    }

    fn settings(selector: Option<&str>) -> Settings {
        Settings {
            namespace: None,
            selector: selector.map(str::to_string),
            poll_interval: Duration::from_secs(30),
            base_dir: PathBuf::from("/work"),
            git_binary: PathBuf::from("git"),
        }
    }

    #[test]
    fn selector_becomes_label_selector() {
        assert_eq!(
            list_params(&settings(Some("app=web,tier!=db"))).label_selector.as_deref(),
            Some("app=web,tier!=db")
        );
        assert_eq!(list_params(&settings(None)).label_selector, None);
    }

    #[test]
    fn summaries_accumulate() {
        let mut summary = PassSummary {
            inspected: 2,
            updated: 1,
            failed: 0,
        };
        summary.merge(PassSummary {
            inspected: 3,
            updated: 0,
            failed: 1,
        });
        assert_eq!(
            summary,
            PassSummary {
                inspected: 5,
                updated: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn diagnostics_serialize_without_reporter() {
        let state = State::default();
        let value = serde_json::to_value(state.diagnostics().await).unwrap();
        assert!(value.get("last_event").is_some());
        assert_eq!(value["last_pass"]["inspected"], 0);
        assert!(value.get("reporter").is_none());
    }
}
