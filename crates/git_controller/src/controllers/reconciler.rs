use super::{
    revision::{apply_changes, RevisionChange},
    scanner::git_volumes,
    writer::WorkloadWriter,
};
use crate::{
    api::Workload,
    git::{GitOps, MirrorKey, MirrorStore},
    util::errors::{Error, Result, StdError},
};
use kube::ResourceExt;
use tracing::{debug, info};

/// What one reconciliation pass did to a workload.
#[derive(Clone, Debug)]
pub struct Reconciled<K> {
    /// The workload as it stands after the pass, with any advanced pins applied
    pub workload: K,
    pub changes: Vec<RevisionChange>,
}

impl<K> Reconciled<K> {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Drives one reconciliation pass per workload object: scan its git volumes,
/// sync each mirror, advance the pins that moved, then write the object back.
pub struct Reconciler<G, W> {
    mirrors: MirrorStore<G>,
    writer: W,
}

impl<G: GitOps, W: WorkloadWriter> Reconciler<G, W> {
    pub fn new(mirrors: MirrorStore<G>, writer: W) -> Self {
        Self { mirrors, writer }
    }

    pub fn mirrors(&self) -> &MirrorStore<G> {
        &self.mirrors
    }

    /// Run one pass over `workload`.
    ///
    /// Any sync or revision lookup failure aborts the pass before the object is
    /// written, so a workload is either fully advanced or left untouched.
    pub async fn reconcile<K: Workload>(&self, mut workload: K) -> Result<Reconciled<K>> {
        let kind = K::kind_name();
        let name = workload.name_any();
        let namespace = workload.namespace().ok_or_else(|| {
            Error::StdError(StdError::MetadataMissing(format!(
                "{} {} has no namespace",
                kind, name
            )))
        })?;

        let Some(pod_spec) = workload.pod_spec() else {
            debug!("{} '{}' in namespace '{}' has no pod template", kind, name, namespace);
            return Ok(Reconciled {
                workload,
                changes: Vec::new(),
            });
        };

        let mut changes = Vec::new();
        for volume in git_volumes(Some(pod_spec)) {
            let path = self.mirrors.mirror_path(&MirrorKey {
                namespace: &namespace,
                kind: &kind,
                name: &name,
                volume: &volume.name,
            });
            self.mirrors.sync(&volume.repository, &path).await?;
            let latest = self.mirrors.latest_since(&path, &volume.revision).await?;

            let advance = volume.advance(&latest);
            if advance.changed {
                info!(
                    volume = %volume.name,
                    kind = %kind,
                    name = %name,
                    namespace = %namespace,
                    from = %volume.revision,
                    to = %advance.revision,
                    "Revision updated from {} to {} for volume: {} namespace: {} name: {}",
                    volume.revision,
                    advance.revision,
                    volume.name,
                    namespace,
                    name
                );
                changes.push(RevisionChange {
                    volume: volume.name,
                    from: volume.revision,
                    to: advance.revision,
                });
            }
        }

        if changes.is_empty() {
            return Ok(Reconciled { workload, changes });
        }

        if !K::supports_update() {
            return Err(Error::UnsupportedMutation {
                kind,
                namespace,
                name,
            });
        }

        let mut pod_spec = pod_spec.clone();
        apply_changes(&mut pod_spec, &changes);
        workload.set_pod_spec(pod_spec);

        self.writer.update(&workload).await?;
        Ok(Reconciled { workload, changes })
    }
}
