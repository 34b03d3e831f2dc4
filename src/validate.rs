//! Structural validation of inbound pods.
//!
//! A pod that fails validation is dropped from whatever report it arrived
//! in; the rest of that report's pods are still processed (spec §4.B, §7.1).
//! Validation never poisons a source's store.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

/// Caller-supplied structural checks layered on top of this crate's
/// mandatory name/namespace/container-count checks. Returns `Err(reason)` on
/// the first failure found.
pub type StructuralCheck = Arc<dyn Fn(&Pod) -> Result<(), String> + Send + Sync>;

/// The mandatory checks every pod must pass regardless of `StructuralCheck`:
/// non-empty name, a normalizable namespace, and at least one container.
/// Returns the rejection reason on failure.
fn mandatory_checks(pod: &Pod) -> Result<(), String> {
    let name = pod.metadata.name.as_deref().unwrap_or_default();
    if name.is_empty() {
        return Err("pod has no name".to_string());
    }
    let has_containers = pod
        .spec
        .as_ref()
        .map(|s| !s.containers.is_empty())
        .unwrap_or(false);
    if !has_containers {
        return Err(format!("pod {name} has no containers"));
    }
    Ok(())
}

/// Validate a pod: mandatory checks, then the caller-supplied
/// [`StructuralCheck`]. `Ok(())` means the pod may proceed to the store.
pub fn validate_pod(pod: &Pod, checks: &StructuralCheck) -> Result<(), String> {
    mandatory_checks(pod)?;
    checks(pod)
}

/// A default [`StructuralCheck`] mirroring what a kubelet-style consumer
/// actually enforces on a pod spec: every container has a name and image,
/// the pod's image-pull policy (per container) is one of the recognized
/// values, and the restart/DNS policies and security context are present.
///
/// Callers free to accept a looser (or stricter) pod shape can supply their
/// own [`StructuralCheck`] instead of this one.
pub fn kubelet_structural_checks() -> StructuralCheck {
    Arc::new(|pod: &Pod| -> Result<(), String> {
        let Some(spec) = &pod.spec else {
            return Err("pod has no spec".to_string());
        };

        for container in &spec.containers {
            if container.name.is_empty() {
                return Err("container has no name".to_string());
            }
            if container.image.as_deref().unwrap_or_default().is_empty() {
                return Err(format!("container {} has no image", container.name));
            }
            if let Some(policy) = &container.image_pull_policy {
                if !matches!(policy.as_str(), "Always" | "Never" | "IfNotPresent") {
                    return Err(format!(
                        "container {} has unrecognized imagePullPolicy {policy}",
                        container.name
                    ));
                }
            }
        }

        if let Some(policy) = &spec.restart_policy {
            if !matches!(policy.as_str(), "Always" | "OnFailure" | "Never") {
                return Err(format!("unrecognized restartPolicy {policy}"));
            }
        }

        if let Some(policy) = &spec.dns_policy {
            if !matches!(
                policy.as_str(),
                "ClusterFirst" | "ClusterFirstWithHostNet" | "Default" | "None"
            ) {
                return Err(format!("unrecognized dnsPolicy {policy}"));
            }
        }

        if spec.security_context.is_none() {
            return Err("pod has no securityContext".to_string());
        }

        Ok(())
    })
}
