//! The authoritative per-source pod map and its apply-delta logic.
//!
//! [`SourceStore::apply`] is pure with respect to `self`: no channels, no
//! I/O. That's deliberate — it's the part of this crate with the subtlest
//! semantics (spec §4.C), so it's kept testable in isolation from the
//! concurrency machinery in [`crate::merger`].

use std::collections::{HashMap, HashSet};

use k8s_openapi::api::core::v1::Pod;

use crate::pod::{
    local_annotations_changed, merge_local_annotations, pod_key, semantically_equal,
    LocalAnnotationPredicate, PodKey,
};
use crate::update::Op;

/// The four classification buckets an `apply` call produces. A bucket that
/// stays empty means nothing of that kind happened in this report.
#[derive(Debug, Clone, Default)]
pub struct DeltaOutcome {
    pub adds: Vec<Pod>,
    pub updates: Vec<Pod>,
    pub removes: Vec<Pod>,
    pub reconciles: Vec<Pod>,
}

impl DeltaOutcome {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
            && self.updates.is_empty()
            && self.removes.is_empty()
            && self.reconciles.is_empty()
    }
}

/// The authoritative `PodKey -> Pod` map for a single source.
#[derive(Debug, Default)]
pub struct SourceStore {
    entries: HashMap<PodKey, Pod>,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &PodKey) -> bool {
        self.entries.contains_key(key)
    }

    /// A clone of every pod currently held, for `Snapshot` mode and `Sync`.
    pub fn snapshot(&self) -> Vec<Pod> {
        self.entries.values().cloned().collect()
    }

    /// Apply an incoming report against this store, returning the
    /// classified buckets per spec §4.C. Pods reaching this function are
    /// assumed already validated; pods without a resolvable key (should not
    /// occur post-validation) are silently skipped rather than poisoning the
    /// store.
    pub fn apply(
        &mut self,
        op: Op,
        pods: Vec<Pod>,
        is_local: &LocalAnnotationPredicate,
    ) -> DeltaOutcome {
        match op {
            Op::Remove => self.apply_remove(pods),
            Op::Set => self.apply_set(pods, is_local),
            Op::Add | Op::Update | Op::Reconcile => self.apply_upsert(pods, is_local),
        }
    }

    fn apply_remove(&mut self, pods: Vec<Pod>) -> DeltaOutcome {
        let mut out = DeltaOutcome::default();
        for (key, _) in dedup_by_key(pods) {
            if let Some(removed) = self.entries.remove(&key) {
                out.removes.push(removed);
            }
        }
        out
    }

    fn apply_set(&mut self, pods: Vec<Pod>, is_local: &LocalAnnotationPredicate) -> DeltaOutcome {
        let incoming = dedup_by_key(pods);
        let incoming_keys: HashSet<PodKey> = incoming.iter().map(|(k, _)| k.clone()).collect();

        let mut out = DeltaOutcome::default();
        let stale: Vec<PodKey> = self
            .entries
            .keys()
            .filter(|k| !incoming_keys.contains(*k))
            .cloned()
            .collect();
        for key in stale {
            if let Some(removed) = self.entries.remove(&key) {
                out.removes.push(removed);
            }
        }

        self.upsert(incoming, is_local, &mut out);
        out
    }

    fn apply_upsert(&mut self, pods: Vec<Pod>, is_local: &LocalAnnotationPredicate) -> DeltaOutcome {
        let incoming = dedup_by_key(pods);
        let mut out = DeltaOutcome::default();
        self.upsert(incoming, is_local, &mut out);
        out
    }

    fn upsert(
        &mut self,
        incoming: Vec<(PodKey, Pod)>,
        is_local: &LocalAnnotationPredicate,
        out: &mut DeltaOutcome,
    ) {
        for (key, mut pod) in incoming {
            match self.entries.get(&key) {
                None => {
                    out.adds.push(pod.clone());
                    self.entries.insert(key, pod);
                }
                Some(existing) => {
                    let local_changed = local_annotations_changed(&pod, existing, is_local);
                    merge_local_annotations(&mut pod, existing, is_local);

                    if semantically_equal(&pod, existing, is_local) {
                        if local_changed {
                            out.reconciles.push(pod.clone());
                            self.entries.insert(key, pod);
                        }
                        // else: no-op, existing entry untouched.
                    } else {
                        out.updates.push(pod.clone());
                        self.entries.insert(key, pod);
                    }
                }
            }
        }
    }
}

/// Deduplicate a report's pods by key: within one report, later entries for
/// a repeated key win and earlier ones are discarded silently (spec §4.C,
/// "Tie-breaking"). Pods without a resolvable key are dropped — validation
/// should have already rejected them, but `apply` must never panic on one.
fn dedup_by_key(pods: Vec<Pod>) -> Vec<(PodKey, Pod)> {
    let mut order: Vec<PodKey> = Vec::new();
    let mut last: HashMap<PodKey, Pod> = HashMap::new();
    for pod in pods {
        let Some(key) = pod_key(&pod) else { continue };
        if !last.contains_key(&key) {
            order.push(key.clone());
        }
        last.insert(key, pod);
    }
    order
        .into_iter()
        .map(|k| {
            let pod = last.remove(&k).expect("key was just inserted above");
            (k, pod)
        })
        .collect()
}
