//! Profile reconciliation pipeline.
//!
//! # Phases
//! ```text
//! reconcile(document, profile)
//!   → validate      document must be a mapping, else empty fallback
//!   → synthetic     upsert ♻️ 负载均衡 / ♻️ 故障切换 from the node list
//!   → runtime       force `tun` capture block and `log-level: debug`
//!   → refresh       rewrite selector and dependent group memberships
//! ```
//!
//! A failing phase is reported to the diagnostics sink and the remaining
//! phases still run. `reconcile` itself never fails.

use std::collections::HashSet;
use std::fmt;

use serde_json::{json, Map, Value};

use super::diagnostics::{Diagnostics, TracingDiagnostics};
use super::document::{
    empty_document, find_group, group_kind, group_name, group_references, node_names,
    overwrite_fields, string_sequence,
};
use super::error::{type_name, ReconcileError};
use super::roles::{
    selected_probe_target, GroupKind, GroupRole, Sentinel, FAILOVER_INTERVAL_SECS,
    FORCED_LOG_LEVEL, LOAD_BALANCE_INTERVAL_SECS, LOAD_BALANCE_STRATEGY, LOG_LEVEL_KEY,
    PROBE_TIMEOUT_MS, PROXIES_KEY, PROXY_GROUPS_KEY, TUN_KEY,
};
use super::union::{filtered_union, ordered_union};

/// Pipeline stage, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validate,
    SyntheticGroups,
    RuntimeFields,
    Refresh,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validation"),
            Self::SyntheticGroups => write!(f, "synthetic group upsert"),
            Self::RuntimeFields => write!(f, "runtime field enforcement"),
            Self::Refresh => write!(f, "group refresh"),
        }
    }
}

/// What a reconciliation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Input was not a mapping; the empty fallback was returned.
    pub fell_back: bool,
    /// Node count seen in `proxies`.
    pub nodes: usize,
    pub created: Vec<GroupRole>,
    pub updated: Vec<GroupRole>,
    /// Primary selector groups whose membership was rebuilt.
    pub selectors_refreshed: Vec<String>,
    /// Other groups rewritten because they referenced nodes or a selector.
    pub dependents_rewritten: Vec<String>,
    pub failures: Vec<(Phase, ReconcileError)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        !self.fell_back && self.failures.is_empty()
    }
}

/// Normalizes a Clash profile around the node list it carries.
///
/// Stateless: every call derives the node set afresh from the document, so
/// one reconciler can serve any number of profiles.
#[derive(Debug, Clone, Default)]
pub struct ConfigReconciler<D = TracingDiagnostics> {
    diagnostics: D,
}

impl ConfigReconciler<TracingDiagnostics> {
    pub fn new() -> Self {
        Self {
            diagnostics: TracingDiagnostics,
        }
    }
}

impl<D: Diagnostics> ConfigReconciler<D> {
    pub fn with_diagnostics(diagnostics: D) -> Self {
        Self { diagnostics }
    }

    /// Reconcile `document` and return the updated profile.
    ///
    /// `profile_name` only labels diagnostics.
    pub fn reconcile(&self, document: Value, profile_name: &str) -> Value {
        self.reconcile_with_report(document, profile_name).0
    }

    pub fn reconcile_with_report(
        &self,
        document: Value,
        profile_name: &str,
    ) -> (Value, ReconcileReport) {
        let _span = tracing::info_span!("reconcile", profile = profile_name).entered();
        let mut report = ReconcileReport::default();

        let mut root = match document {
            Value::Object(root) => root,
            other => {
                self.fail(
                    &mut report,
                    Phase::Validate,
                    ReconcileError::NotAnObject {
                        found: type_name(&other),
                    },
                );
                report.fell_back = true;
                return (empty_document(), report);
            }
        };

        let names = match self.extract_node_names(&mut root) {
            Ok(names) => names,
            Err(e) => {
                self.fail(&mut report, Phase::Validate, e);
                Vec::new()
            }
        };
        report.nodes = names.len();

        if let Err(e) = self.upsert_synthetic_groups(&mut root, &names, &mut report) {
            self.fail(&mut report, Phase::SyntheticGroups, e);
        }

        self.enforce_runtime_fields(&mut root);

        if let Err(e) = self.refresh_groups(&mut root, &names, &mut report) {
            self.fail(&mut report, Phase::Refresh, e);
        }

        (Value::Object(root), report)
    }

    fn fail(&self, report: &mut ReconcileReport, phase: Phase, error: ReconcileError) {
        self.diagnostics.error(&format!("{phase} failed: {error}"));
        report.failures.push((phase, error));
    }

    /// Node names in `proxies` order. A missing or null list becomes `[]`.
    fn extract_node_names(
        &self,
        root: &mut Map<String, Value>,
    ) -> Result<Vec<String>, ReconcileError> {
        let slot = root
            .entry(PROXIES_KEY)
            .or_insert_with(|| Value::Array(Vec::new()));
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(nodes) => Ok(node_names(nodes)),
            other => Err(ReconcileError::MalformedField {
                field: PROXIES_KEY,
                expected: "a sequence",
                found: type_name(other),
            }),
        }
    }

    fn ensure_groups<'a>(
        &self,
        root: &'a mut Map<String, Value>,
    ) -> Result<&'a mut Vec<Value>, ReconcileError> {
        let slot = root.entry(PROXY_GROUPS_KEY).or_insert(Value::Null);
        if slot.is_null() {
            self.diagnostics
                .error("`proxy-groups` not found, starting from an empty list");
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(groups) => Ok(groups),
            other => Err(ReconcileError::MalformedField {
                field: PROXY_GROUPS_KEY,
                expected: "a sequence",
                found: type_name(other),
            }),
        }
    }

    fn upsert_synthetic_groups(
        &self,
        root: &mut Map<String, Value>,
        names: &[String],
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        let groups = self.ensure_groups(root)?;
        let url = selected_probe_target();
        self.diagnostics
            .info(&format!("all nodes (total {}): {names:?}", names.len()));

        let node_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let lb_members = ordered_union([node_refs.clone()]);
        let mut lb = Map::new();
        lb.insert("strategy".into(), json!(LOAD_BALANCE_STRATEGY));
        lb.insert("url".into(), json!(url));
        lb.insert("interval".into(), json!(LOAD_BALANCE_INTERVAL_SECS));
        lb.insert("timeout".into(), json!(PROBE_TIMEOUT_MS));
        lb.insert(PROXIES_KEY.into(), string_sequence(&lb_members));
        self.upsert(groups, GroupRole::LoadBalance, GroupKind::LoadBalance, lb, report)?;

        let fo_members = ordered_union([
            vec![GroupRole::LoadBalance.name()],
            node_refs,
            vec![Sentinel::Direct.token()],
        ]);
        let mut fo = Map::new();
        fo.insert("url".into(), json!(url));
        fo.insert("interval".into(), json!(FAILOVER_INTERVAL_SECS));
        fo.insert("timeout".into(), json!(PROBE_TIMEOUT_MS));
        fo.insert(PROXIES_KEY.into(), string_sequence(&fo_members));
        self.upsert(groups, GroupRole::Failover, GroupKind::Fallback, fo, report)?;

        Ok(())
    }

    /// Create `role`'s group from `settings`, or overwrite `settings` onto
    /// the existing one keeping its other keys.
    fn upsert(
        &self,
        groups: &mut Vec<Value>,
        role: GroupRole,
        kind: GroupKind,
        settings: Map<String, Value>,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        let url = selected_probe_target();
        let members = settings.get(PROXIES_KEY).cloned().unwrap_or(Value::Null);

        let Some(index) = find_group(groups, role.name()) else {
            let mut group = Map::new();
            group.insert("name".into(), json!(role.name()));
            group.insert("type".into(), json!(kind.as_str()));
            overwrite_fields(&mut group, settings);
            groups.push(Value::Object(group));
            self.diagnostics
                .info(&format!("created {role}: {members}, probe target {url}"));
            report.created.push(role);
            return Ok(());
        };

        let group = &mut groups[index];
        if let Some(existing) = group_kind(group).filter(|k| *k != kind) {
            self.diagnostics.info(&format!(
                "{role} keeps its declared type `{existing}` (expected `{kind}`)"
            ));
        }
        let Some(map) = group.as_object_mut() else {
            return Err(ReconcileError::MalformedGroup {
                index,
                reason: format!("{role} is not a mapping"),
            });
        };
        overwrite_fields(map, settings);
        self.diagnostics
            .info(&format!("updated {role}: {members}, probe target {url}"));
        report.updated.push(role);
        Ok(())
    }

    /// Capture mode and log level are forced regardless of prior values.
    fn enforce_runtime_fields(&self, root: &mut Map<String, Value>) {
        root.insert(
            TUN_KEY.into(),
            json!({
                "enable": true,
                "stack": "system",
                "auto-route": true,
                "auto-detect-interface": true
            }),
        );
        root.insert(LOG_LEVEL_KEY.into(), json!(FORCED_LOG_LEVEL));
        self.diagnostics.info(&format!(
            "TUN mode enabled (stack: system), log level: {FORCED_LOG_LEVEL}"
        ));
    }

    /// Rebuild selector and dependent group memberships from `names`.
    ///
    /// Repeating this with the same node list yields the same groups.
    fn refresh_groups(
        &self,
        root: &mut Map<String, Value>,
        names: &[String],
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        let available: Vec<&str> = if names.is_empty() {
            self.diagnostics.info("no nodes available, falling back to DIRECT");
            vec![Sentinel::Direct.token()]
        } else {
            self.diagnostics.info(&format!(
                "available nodes (total {}): {names:?}",
                names.len()
            ));
            names.iter().map(String::as_str).collect()
        };

        let groups = match root.get_mut(PROXY_GROUPS_KEY) {
            Some(Value::Array(groups)) => groups,
            Some(other) => {
                return Err(ReconcileError::MalformedField {
                    field: PROXY_GROUPS_KEY,
                    expected: "a sequence",
                    found: type_name(other),
                })
            }
            None => {
                return Err(ReconcileError::MissingField {
                    field: PROXY_GROUPS_KEY,
                })
            }
        };

        self.refresh_selectors(groups, &available, report);
        self.refresh_dependents(groups, names, &available, report);

        self.diagnostics.info(&format!(
            "all proxy groups refreshed, probe target {}",
            selected_probe_target()
        ));
        Ok(())
    }

    /// Selector groups get both synthetic groups, then every available node,
    /// then whatever else they already listed.
    fn refresh_selectors(
        &self,
        groups: &mut [Value],
        available: &[&str],
        report: &mut ReconcileReport,
    ) {
        let failover = GroupRole::Failover.name();
        let load_balance = GroupRole::LoadBalance.name();
        let mut found = false;

        for group in groups.iter_mut() {
            let Some(name) = group_name(group).map(str::to_string) else {
                continue;
            };
            if !GroupRole::from_name(&name).is_some_and(GroupRole::is_primary_selector) {
                continue;
            }
            found = true;

            let existing: Vec<String> = group_references(group)
                .unwrap_or_default()
                .into_iter()
                .filter(|r| r != failover && r != load_balance)
                .collect();
            let members = ordered_union([
                vec![failover, load_balance],
                available.to_vec(),
                existing.iter().map(String::as_str).collect(),
            ]);

            if let Some(map) = group.as_object_mut() {
                map.insert(PROXIES_KEY.into(), string_sequence(&members));
            }
            self.diagnostics
                .info(&format!("refreshed selector {name}: {members:?}"));
            report.selectors_refreshed.push(name);
        }

        if !found {
            self.diagnostics.error(&format!(
                "no primary selector group found: {} or {}",
                GroupRole::PrimarySelect,
                GroupRole::NodeSelect
            ));
        }
    }

    /// Any other group that points at a selector or a node is rebuilt from
    /// the canonical candidate list; references to vanished nodes drop out.
    fn refresh_dependents(
        &self,
        groups: &mut [Value],
        names: &[String],
        available: &[&str],
        report: &mut ReconcileReport,
    ) {
        let failover = GroupRole::Failover.name();
        let load_balance = GroupRole::LoadBalance.name();
        let node_set: HashSet<&str> = names.iter().map(String::as_str).collect();
        let available_set: HashSet<&str> = available.iter().copied().collect();

        let candidates: Vec<&str> = [failover, load_balance]
            .into_iter()
            .chain(available.iter().copied())
            .chain([Sentinel::Direct.token(), Sentinel::Reject.token()])
            .collect();

        for (index, group) in groups.iter_mut().enumerate() {
            let name = group_name(group).map(str::to_string);
            if name.as_deref().and_then(GroupRole::from_name).is_some() {
                continue;
            }
            let Some(refs) = group_references(group) else {
                if group
                    .get(PROXIES_KEY)
                    .is_some_and(|p| !p.is_array() && !p.is_null())
                {
                    let error = ReconcileError::MalformedGroup {
                        index,
                        reason: "`proxies` is not a sequence".to_string(),
                    };
                    self.diagnostics.error(&error.to_string());
                }
                continue;
            };

            let depends = refs.iter().any(|r| {
                GroupRole::from_name(r).is_some_and(GroupRole::is_primary_selector)
                    || node_set.contains(r.as_str())
            });
            if !depends {
                continue;
            }

            let original: HashSet<&str> = refs.iter().map(String::as_str).collect();
            let members = filtered_union(candidates.iter().copied(), |c| {
                original.contains(c)
                    || Sentinel::is_sentinel(c)
                    || c == failover
                    || c == load_balance
                    || available_set.contains(c)
            });

            if let Some(map) = group.as_object_mut() {
                map.insert(PROXIES_KEY.into(), string_sequence(&members));
            }
            let label = name.unwrap_or_else(|| format!("#{index}"));
            self.diagnostics
                .info(&format!("refreshed dependent group {label}: {members:?}"));
            report.dependents_rewritten.push(label);
        }
    }
}

/// Reconcile with tracing-backed diagnostics.
pub fn reconcile(document: Value, profile_name: &str) -> Value {
    ConfigReconciler::new().reconcile(document, profile_name)
}
