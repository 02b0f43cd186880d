//! Read-side views over a generic Clash profile tree.
//!
//! The profile stays a `serde_json::Value` so unknown keys pass through
//! untouched; these helpers give the few fields the reconciler cares about
//! a typed shape.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::roles::{GroupKind, GroupRole, PROXIES_KEY, PROXY_GROUPS_KEY};

/// The fallback returned for input that is not a mapping.
pub fn empty_document() -> Value {
    json!({ PROXIES_KEY: [], PROXY_GROUPS_KEY: [] })
}

/// Name of a proxy node. Missing or null names become the empty string,
/// which is still a valid member of the node set.
pub fn node_name(node: &Value) -> String {
    node.get("name").and_then(scalar_text).unwrap_or_default()
}

/// Text of a scalar as Clash compares it. Numbers and booleans are written
/// out; null, sequences and mappings have no text.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Ordered node names, one per entry in `proxies`.
pub fn node_names(nodes: &[Value]) -> Vec<String> {
    nodes.iter().map(node_name).collect()
}

/// A group's `name`, if it is a mapping with a string name.
pub fn group_name(group: &Value) -> Option<&str> {
    group.get("name").and_then(Value::as_str)
}

pub fn group_kind(group: &Value) -> Option<GroupKind> {
    group.get("type").and_then(Value::as_str).map(GroupKind::parse)
}

/// References of a group's `proxies` list, read the same way node names are.
///
/// `None` when the group has no `proxies` sequence. Entries without scalar
/// text are skipped.
pub fn group_references(group: &Value) -> Option<Vec<String>> {
    group
        .get(PROXIES_KEY)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(scalar_text).collect())
}

/// Index of the first mapping in `groups` named `name`.
pub fn find_group(groups: &[Value], name: &str) -> Option<usize> {
    groups.iter().position(|g| group_name(g) == Some(name))
}

pub fn string_sequence<S: AsRef<str>>(items: &[S]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|s| Value::String(s.as_ref().to_string()))
            .collect(),
    )
}

/// Write `fields` onto `group`, keeping every key not listed.
pub fn overwrite_fields(group: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (key, value) in fields {
        group.insert(key, value);
    }
}

/// One line of `inspect` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub kind: Option<GroupKind>,
    pub members: usize,
    #[serde(skip)]
    pub role: Option<GroupRole>,
}

/// Node and group overview of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub nodes: usize,
    pub groups: Vec<GroupSummary>,
}

impl DocumentSummary {
    pub fn of(document: &Value) -> Self {
        let nodes = document
            .get(PROXIES_KEY)
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        let groups = document
            .get(PROXY_GROUPS_KEY)
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter(|g| g.is_object())
                    .map(|g| {
                        let name = group_name(g).unwrap_or_default().to_string();
                        GroupSummary {
                            role: GroupRole::from_name(&name),
                            kind: group_kind(g),
                            members: group_references(g).map_or(0, |r| r.len()),
                            name,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { nodes, groups }
    }

    pub fn group(&self, name: &str) -> Option<&GroupSummary> {
        self.groups.iter().find(|g| g.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_shape() {
        let doc = empty_document();
        assert_eq!(doc, json!({"proxies": [], "proxy-groups": []}));
    }

    #[test]
    fn node_name_defaults_to_empty() {
        assert_eq!(node_name(&json!({"name": "tokyo"})), "tokyo");
        assert_eq!(node_name(&json!({"server": "a.example.com"})), "");
        assert_eq!(node_name(&json!({"name": null})), "");
        assert_eq!(node_name(&json!("not a node")), "");
        assert_eq!(node_name(&json!({"name": 42})), "42");
    }

    #[test]
    fn node_names_keep_order_and_empties() {
        let nodes = vec![json!({"name": "b"}), json!({}), json!({"name": "a"})];
        assert_eq!(node_names(&nodes), vec!["b", "", "a"]);
    }

    #[test]
    fn group_references_read_scalars_as_text() {
        let group = json!({"name": "g", "proxies": ["a", 1, null, true, ["x"], "b"]});
        assert_eq!(
            group_references(&group),
            Some(vec![
                "a".to_string(),
                "1".to_string(),
                "true".to_string(),
                "b".to_string()
            ])
        );
        assert_eq!(group_references(&json!({"name": "g"})), None);
        assert_eq!(group_references(&json!({"proxies": "a"})), None);
    }

    #[test]
    fn find_group_ignores_non_mappings() {
        let groups = vec![json!("🔰 选择节点"), json!({"name": "🔰 选择节点"})];
        assert_eq!(find_group(&groups, "🔰 选择节点"), Some(1));
        assert_eq!(find_group(&groups, "missing"), None);
    }

    #[test]
    fn overwrite_fields_keeps_unlisted_keys() {
        let mut group = json!({"name": "g", "lazy": true, "interval": 1})
            .as_object()
            .cloned()
            .unwrap();
        let mut fields = Map::new();
        fields.insert("interval".into(), json!(300));
        overwrite_fields(&mut group, fields);
        assert_eq!(group["interval"], json!(300));
        assert_eq!(group["lazy"], json!(true));
        assert_eq!(group["name"], json!("g"));
    }

    #[test]
    fn summary_counts_nodes_and_groups() {
        let doc = json!({
            "proxies": [{"name": "a"}, {"name": "b"}],
            "proxy-groups": [
                {"name": "♻️ 负载均衡", "type": "load-balance", "proxies": ["a", "b"]},
                {"name": "media", "type": "select"},
                "garbage"
            ]
        });
        let summary = DocumentSummary::of(&doc);
        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.groups.len(), 2);

        let lb = summary.group("♻️ 负载均衡").unwrap();
        assert_eq!(lb.kind, Some(GroupKind::LoadBalance));
        assert_eq!(lb.members, 2);
        assert_eq!(lb.role, Some(GroupRole::LoadBalance));

        let media = summary.group("media").unwrap();
        assert_eq!(media.members, 0);
        assert_eq!(media.role, None);
    }

    #[test]
    fn summary_of_non_profile_is_empty() {
        let summary = DocumentSummary::of(&json!(7));
        assert_eq!(summary.nodes, 0);
        assert!(summary.groups.is_empty());
    }
}
