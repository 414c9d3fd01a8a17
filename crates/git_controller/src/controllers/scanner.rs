use k8s_openapi::api::core::v1::PodSpec;

/// A git-backed volume found in a pod specification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitVolume {
    pub name: String,
    pub repository: String,
    /// Pinned revision, empty when the volume does not pin one
    pub revision: String,
}

/// Git-backed volumes of `pod_spec` in volume list order. Other volume sources are skipped.
pub fn git_volumes(pod_spec: Option<&PodSpec>) -> Vec<GitVolume> {
    pod_spec
        .and_then(|spec| spec.volumes.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|volume| {
            volume.git_repo.as_ref().map(|source| GitVolume {
                name: volume.name.clone(),
                repository: source.repository.clone(),
                revision: source.revision.clone().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, GitRepoVolumeSource, Volume};

    fn git_volume(name: &str, repository: &str, revision: Option<&str>) -> Volume {
        Volume {
            name: name.to_string(),
            git_repo: Some(GitRepoVolumeSource {
                repository: repository.to_string(),
                revision: revision.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn absent_pod_spec_yields_nothing() {
        assert!(git_volumes(None).is_empty());
        assert!(git_volumes(Some(&PodSpec::default())).is_empty());
    }

    #[test]
    fn only_git_volumes_in_order() {
        let spec = PodSpec {
            volumes: Some(vec![
                git_volume("a", "https://example.com/a.git", Some("abc123")),
                Volume {
                    name: "b".to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                },
                git_volume("c", "https://example.com/c.git", Some("def456")),
            ]),
            ..Default::default()
        };

        let found = git_volumes(Some(&spec));
        assert_eq!(
            found,
            vec![
                GitVolume {
                    name: "a".to_string(),
                    repository: "https://example.com/a.git".to_string(),
                    revision: "abc123".to_string(),
                },
                GitVolume {
                    name: "c".to_string(),
                    repository: "https://example.com/c.git".to_string(),
                    revision: "def456".to_string(),
                },
            ]
        );
    }

    #[test]
    fn missing_revision_is_empty() {
        let spec = PodSpec {
            volumes: Some(vec![git_volume("src", "https://example.com/a.git", None)]),
            ..Default::default()
        };
        assert_eq!(git_volumes(Some(&spec))[0].revision, "");
    }
}
