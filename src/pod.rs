//! Pod identity and semantic equality.
//!
//! Pods are represented by [`k8s_openapi::api::core::v1::Pod`] directly —
//! the shape spec'd as an "opaque record with UID/Name/Namespace/Spec/
//! Labels/Annotations/Status" is exactly what that type already is, and it
//! comes with a correct `Clone` for free, which is all the "deep-copy
//! capability" the merger needs.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

/// `(Namespace, Name)`, always post-[`normalize_namespace`].
pub type PodKey = (String, String);

/// A caller-supplied predicate identifying annotation keys the node agent
/// itself owns. Changes to these keys are preserved across updates but never
/// trigger an `Update` event — only a `Reconcile`. Intentionally not
/// hardcoded to any particular prefix (see spec §9): the source repository
/// this design traces to uses a `"kubernetes.io/"` prefix, but that's a
/// parameter, not a contract.
pub type LocalAnnotationPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// `"" -> "default"`, otherwise passes the namespace through unchanged.
pub fn normalize_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        "default"
    } else {
        namespace
    }
}

/// The identity key of a pod, or `None` if the pod has no name (invalid).
pub fn pod_key(pod: &Pod) -> Option<PodKey> {
    let name = pod.metadata.name.as_deref().unwrap_or_default();
    if name.is_empty() {
        return None;
    }
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
    Some((normalize_namespace(namespace).to_string(), name.to_string()))
}

fn non_local_annotations(
    pod: &Pod,
    is_local: &LocalAnnotationPredicate,
) -> BTreeMap<&str, &str> {
    pod.metadata
        .annotations
        .iter()
        .flatten()
        .filter(|(k, _)| !is_local(k))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// True iff `spec`, `labels`, and the non-local subset of `annotations` are
/// deep-equal between `a` and `b`. `status` never participates: it's
/// observed state, not desired state.
pub fn semantically_equal(a: &Pod, b: &Pod, is_local: &LocalAnnotationPredicate) -> bool {
    a.spec == b.spec
        && a.metadata.labels == b.metadata.labels
        && non_local_annotations(a, is_local) == non_local_annotations(b, is_local)
}

/// Copies every local annotation from `existing` into `incoming`, overwriting
/// whatever `incoming` already carried under those keys. Call before
/// comparing `incoming` against `existing` with [`semantically_equal`], so
/// local-annotation changes on `incoming` never surface as a diff.
pub fn merge_local_annotations(
    incoming: &mut Pod,
    existing: &Pod,
    is_local: &LocalAnnotationPredicate,
) {
    let Some(existing_annotations) = existing.metadata.annotations.as_ref() else {
        return;
    };
    let local: Vec<(String, String)> = existing_annotations
        .iter()
        .filter(|(k, _)| is_local(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if local.is_empty() {
        return;
    }
    let annotations = incoming.metadata.annotations.get_or_insert_with(BTreeMap::new);
    for (k, v) in local {
        annotations.insert(k, v);
    }
}

/// True iff `existing`'s local annotations differ from `incoming`'s, given
/// `incoming` has already had [`merge_local_annotations`] applied to it. In
/// practice this only fires when `incoming` omitted a local key `existing`
/// had — `merge_local_annotations` overwrites the rest.
pub fn local_annotations_changed(
    incoming_before_merge: &Pod,
    existing: &Pod,
    is_local: &LocalAnnotationPredicate,
) -> bool {
    let local = |pod: &Pod| -> BTreeMap<&str, &str> {
        pod.metadata
            .annotations
            .iter()
            .flatten()
            .filter(|(k, _)| is_local(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    };
    local(incoming_before_merge) != local(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(name: &str, namespace: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn empty_namespace_normalizes_to_default() {
        assert_eq!(normalize_namespace(""), "default");
        assert_eq!(normalize_namespace("prod"), "prod");
    }

    #[test]
    fn key_is_none_for_missing_name() {
        let p = pod("", "prod");
        assert_eq!(pod_key(&p), None);
    }

    #[test]
    fn key_normalizes_empty_namespace() {
        let p = pod("foo", "");
        assert_eq!(pod_key(&p), Some(("default".to_string(), "foo".to_string())));
    }

    #[test]
    fn local_annotation_changes_do_not_break_equality() {
        let is_local: LocalAnnotationPredicate = Arc::new(|k| k.starts_with("kubernetes.io/"));

        let mut a = pod("foo", "default");
        a.metadata.annotations = Some(BTreeMap::from([(
            "kubernetes.io/config.seen".to_string(),
            "v1".to_string(),
        )]));

        let mut b = pod("foo", "default");
        b.metadata.annotations = Some(BTreeMap::from([(
            "kubernetes.io/config.seen".to_string(),
            "v2".to_string(),
        )]));

        assert!(semantically_equal(&a, &b, &is_local));
    }

    #[test]
    fn non_local_annotation_changes_break_equality() {
        let is_local: LocalAnnotationPredicate = Arc::new(|k| k.starts_with("kubernetes.io/"));

        let mut a = pod("foo", "default");
        a.metadata.annotations = Some(BTreeMap::from([("team".to_string(), "a".to_string())]));

        let mut b = pod("foo", "default");
        b.metadata.annotations = Some(BTreeMap::from([("team".to_string(), "b".to_string())]));

        assert!(!semantically_equal(&a, &b, &is_local));
    }

    #[test]
    fn typo_prefix_is_not_local() {
        // "kubenetes.io/" (missing the first 'r') must not match a
        // "kubernetes.io/" predicate — it's a different string, not a
        // contract this crate special-cases.
        let is_local: LocalAnnotationPredicate = Arc::new(|k| k.starts_with("kubernetes.io/"));

        let mut a = pod("foo", "default");
        a.metadata.annotations = Some(BTreeMap::from([(
            "kubenetes.io/blah".to_string(),
            "v1".to_string(),
        )]));

        let mut b = pod("foo", "default");
        b.metadata.annotations = Some(BTreeMap::from([(
            "kubenetes.io/blah".to_string(),
            "v2".to_string(),
        )]));

        assert!(!semantically_equal(&a, &b, &is_local));
    }

    #[test]
    fn merge_local_annotations_overwrites_incoming() {
        let is_local: LocalAnnotationPredicate = Arc::new(|k| k.starts_with("kubernetes.io/"));

        let mut existing = pod("foo", "default");
        existing.metadata.annotations = Some(BTreeMap::from([(
            "kubernetes.io/config.source".to_string(),
            "file".to_string(),
        )]));

        let mut incoming = pod("foo", "default");
        merge_local_annotations(&mut incoming, &existing, &is_local);

        assert_eq!(
            incoming
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get("kubernetes.io/config.source"))
                .map(String::as_str),
            Some("file")
        );
    }
}
