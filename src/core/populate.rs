//! Relation-expansion directives and their resolution
//!
//! A [`PopulateDirective`] declares which relation fields of a document
//! should be replaced with the referenced documents, optionally projected
//! down to a field selection, and optionally expanded one level further.
//!
//! [`resolve`] translates a directive into a flat list of [`Expansion`]
//! values that storage backends execute natively. Resolution is pure
//! translation: it does not know whether a relation path exists. Unknown
//! paths are deferred to the storage layer, whose failures flow through the
//! error classifier.
//!
//! Expansion depth is a fixed two-level contract (declared + one nested
//! level). Anything deeper in a directive is dropped during resolution,
//! never reported as an error.

use serde::{Deserialize, Serialize};

/// A single relation to expand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateNode {
    /// Relation field on the parent document
    pub path: String,

    /// Fields to keep on the expanded document; `None` keeps all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,

    /// One further expansion relative to this relation
    ///
    /// The type admits arbitrary depth because directives are deserialized
    /// from caller-supplied JSON; [`resolve`] caps the depth at two.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populate: Option<Box<PopulateNode>>,
}

impl PopulateNode {
    /// Node expanding `path` with no field selection and no nesting
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            select: None,
            populate: None,
        }
    }

    /// Keep only the given fields on the expanded document
    pub fn with_select(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Expand one further relation on the populated document
    pub fn with_populate(mut self, nested: PopulateNode) -> Self {
        self.populate = Some(Box::new(nested));
        self
    }
}

/// Relation-expansion directive supplied by the caller per operation
///
/// Either a single node or an ordered sequence of nodes. Sequence nodes are
/// siblings, applied independently, not chained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PopulateDirective {
    Single(PopulateNode),
    Sequence(Vec<PopulateNode>),
}

impl PopulateDirective {
    /// The directive's nodes in declaration order
    pub fn nodes(&self) -> &[PopulateNode] {
        match self {
            PopulateDirective::Single(node) => std::slice::from_ref(node),
            PopulateDirective::Sequence(nodes) => nodes,
        }
    }
}

impl From<PopulateNode> for PopulateDirective {
    fn from(node: PopulateNode) -> Self {
        PopulateDirective::Single(node)
    }
}

impl From<Vec<PopulateNode>> for PopulateDirective {
    fn from(nodes: Vec<PopulateNode>) -> Self {
        PopulateDirective::Sequence(nodes)
    }
}

/// A resolved expansion, consumed by storage backends
///
/// Depth is capped by construction: the nested level cannot recurse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub path: String,
    pub select: Option<Vec<String>>,
    pub nested: Option<NestedExpansion>,
}

/// The second (and final) expansion level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedExpansion {
    pub path: String,
    pub select: Option<Vec<String>>,
}

/// Resolve a directive into the expansions a backend should perform.
///
/// - Absent directive → empty (no relation expansion)
/// - Single node → one expansion
/// - Sequence → one expansion per node, independent of each other
/// - A node's `populate` → one nested expansion; deeper nesting is ignored
pub fn resolve(directive: Option<&PopulateDirective>) -> Vec<Expansion> {
    let Some(directive) = directive else {
        return Vec::new();
    };

    directive
        .nodes()
        .iter()
        .map(|node| Expansion {
            path: node.path.clone(),
            select: node.select.clone(),
            nested: node.populate.as_deref().map(|nested| NestedExpansion {
                path: nested.path.clone(),
                select: nested.select.clone(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_directive_resolves_to_nothing() {
        assert!(resolve(None).is_empty());
    }

    #[test]
    fn test_single_node() {
        let directive = PopulateDirective::from(PopulateNode::new("author"));
        let expansions = resolve(Some(&directive));
        assert_eq!(expansions.len(), 1);
        assert_eq!(expansions[0].path, "author");
        assert!(expansions[0].select.is_none());
        assert!(expansions[0].nested.is_none());
    }

    #[test]
    fn test_single_node_with_selection() {
        let directive =
            PopulateDirective::from(PopulateNode::new("author").with_select(["name", "email"]));
        let expansions = resolve(Some(&directive));
        assert_eq!(
            expansions[0].select,
            Some(vec!["name".to_string(), "email".to_string()])
        );
    }

    #[test]
    fn test_sequence_nodes_are_independent_siblings() {
        let directive = PopulateDirective::from(vec![
            PopulateNode::new("author"),
            PopulateNode::new("category").with_populate(PopulateNode::new("parent")),
        ]);
        let expansions = resolve(Some(&directive));
        assert_eq!(expansions.len(), 2);
        assert_eq!(expansions[0].path, "author");
        assert!(expansions[0].nested.is_none());
        assert_eq!(expansions[1].path, "category");
        assert_eq!(
            expansions[1].nested.as_ref().map(|n| n.path.as_str()),
            Some("parent")
        );
    }

    #[test]
    fn test_third_level_nesting_is_dropped() {
        let directive = PopulateDirective::from(
            PopulateNode::new("category").with_populate(
                PopulateNode::new("parent").with_populate(PopulateNode::new("grandparent")),
            ),
        );
        let expansions = resolve(Some(&directive));
        assert_eq!(expansions.len(), 1);
        let nested = expansions[0].nested.as_ref().expect("one nested level");
        assert_eq!(nested.path, "parent");
        // NestedExpansion has no further level by construction; the
        // grandparent node never survives resolution.
    }

    #[test]
    fn test_deserialize_single_object() {
        let directive: PopulateDirective =
            serde_json::from_value(serde_json::json!({ "path": "author" }))
                .expect("single node should deserialize");
        assert_eq!(directive.nodes().len(), 1);
    }

    #[test]
    fn test_deserialize_sequence() {
        let directive: PopulateDirective = serde_json::from_value(serde_json::json!([
            { "path": "author", "select": ["name"] },
            { "path": "category", "populate": { "path": "parent" } }
        ]))
        .expect("sequence should deserialize");
        assert_eq!(directive.nodes().len(), 2);
        assert_eq!(
            directive.nodes()[1]
                .populate
                .as_ref()
                .map(|n| n.path.as_str()),
            Some("parent")
        );
    }
}
