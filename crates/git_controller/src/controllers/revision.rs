use super::scanner::GitVolume;
use k8s_openapi::api::core::v1::PodSpec;

/// Result of comparing a volume's pin with the newest known commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advance {
    pub revision: String,
    pub changed: bool,
}

/// One pinned revision moving forward on one volume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionChange {
    pub volume: String,
    pub from: String,
    pub to: String,
}

impl GitVolume {
    /// Decide the pin for this volume given the newest commit in its mirror.
    pub fn advance(&self, candidate: &str) -> Advance {
        if candidate == self.revision {
            Advance {
                revision: self.revision.clone(),
                changed: false,
            }
        } else {
            Advance {
                revision: candidate.to_string(),
                changed: true,
            }
        }
    }
}

/// Write each change's new revision into the matching git volume of `pod_spec`.
pub fn apply_changes(pod_spec: &mut PodSpec, changes: &[RevisionChange]) {
    let Some(volumes) = pod_spec.volumes.as_mut() else {
        return;
    };
    for change in changes {
        let source = volumes
            .iter_mut()
            .filter(|volume| volume.name == change.volume)
            .find_map(|volume| volume.git_repo.as_mut());
        if let Some(source) = source {
            source.revision = Some(change.to.clone());
        }
    }
}
