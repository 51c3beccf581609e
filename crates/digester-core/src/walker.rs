//! Locating containers inside a workload

use crate::catalog::{ContainerListKind, ContainerListPath};
use crate::tree::{TreePath, WorkloadTree};

/// A container found by [`locate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    /// Container name, when declared
    pub name: Option<String>,
    /// Image string as found in the document
    pub image: String,
    /// Which list the container belongs to
    pub list_kind: ContainerListKind,
    /// Path to the owning list
    pub list_path: TreePath,
    /// Position within the list
    pub index: usize,
}

impl ContainerRef {
    /// Path of this container's `image` field, used for write-back
    pub fn image_path(&self) -> TreePath {
        self.list_path.child(self.index).child("image")
    }
}

/// Lazily yield every container with a string `image` field, in document order
///
/// Paths are visited in the order given. A missing intermediate node, a
/// non-sequence list, or a container without an image yields nothing for
/// that entry; it never fails the walk.
pub fn locate<'a>(
    tree: &'a WorkloadTree,
    paths: &'a [ContainerListPath],
) -> impl Iterator<Item = ContainerRef> + 'a {
    paths.iter().flat_map(move |path| {
        let list_path = TreePath::from_keys(path.keys);
        tree.sequence_at(path.keys)
            .into_iter()
            .flatten()
            .enumerate()
            .filter_map(move |(index, container)| {
                let image = container.get("image")?.as_str()?;
                Some(ContainerRef {
                    name: container
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(str::to_string),
                    image: image.to_string(),
                    list_kind: path.kind,
                    list_path: list_path.clone(),
                    index,
                })
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WorkloadShape;
    use serde_json::json;

    fn images(tree: &WorkloadTree) -> Vec<String> {
        let shape = WorkloadShape::from_kind(tree.kind());
        locate(tree, shape.paths()).map(|c| c.image).collect()
    }

    #[test]
    fn test_pod_containers_then_init_containers() {
        let tree = WorkloadTree::from_value(json!({
            "kind": "Pod",
            "spec": {
                "initContainers": [{"name": "init0", "image": "image2"}],
                "containers": [
                    {"name": "c0", "image": "image0"},
                    {"name": "c1", "image": "image1"}
                ]
            }
        }));

        let found: Vec<ContainerRef> = locate(&tree, WorkloadShape::Pod.paths()).collect();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].image, "image0");
        assert_eq!(found[0].name.as_deref(), Some("c0"));
        assert_eq!(found[1].image, "image1");
        assert_eq!(found[1].index, 1);
        assert_eq!(found[2].image, "image2");
        assert_eq!(found[2].list_kind, ContainerListKind::InitContainers);
        assert_eq!(
            found[2].image_path().to_string(),
            "spec.initContainers[0].image"
        );
    }

    #[test]
    fn test_templated_without_bare_containers() {
        let tree = WorkloadTree::from_value(json!({
            "kind": "Deployment",
            "spec": {
                "replicas": 2,
                "template": {"spec": {"containers": [{"name": "app", "image": "app:v1"}]}}
            }
        }));
        assert_eq!(images(&tree), vec!["app:v1"]);
    }

    #[test]
    fn test_cronjob_only_nested_template() {
        let tree = WorkloadTree::from_value(json!({
            "kind": "CronJob",
            "spec": {
                "containers": [{"image": "ignored"}],
                "jobTemplate": {"spec": {"template": {"spec": {
                    "containers": [{"image": "job:1"}],
                    "initContainers": [{"image": "job-init:1"}]
                }}}}
            }
        }));
        assert_eq!(images(&tree), vec!["job:1", "job-init:1"]);
    }

    #[test]
    fn test_cronjob_without_job_template_is_empty() {
        let tree = WorkloadTree::from_value(json!({"kind": "CronJob", "spec": {"schedule": "* * * * *"}}));
        assert!(images(&tree).is_empty());
    }

    #[test]
    fn test_skips_malformed_entries() {
        let tree = WorkloadTree::from_value(json!({
            "kind": "Pod",
            "spec": {
                "containers": [
                    {"name": "no-image"},
                    {"name": "numeric", "image": 42},
                    "not-a-mapping",
                    {"name": "ok", "image": "ok:1"}
                ],
                "initContainers": {"not": "a sequence"}
            }
        }));

        let found: Vec<ContainerRef> = locate(&tree, WorkloadShape::Pod.paths()).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 3);
    }

    #[test]
    fn test_empty_document() {
        let tree = WorkloadTree::from_value(json!({}));
        assert!(images(&tree).is_empty());
    }
}
