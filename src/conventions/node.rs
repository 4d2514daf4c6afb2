//! Dataset tree nodes

use std::collections::HashMap;

/// Kind of node in a dataset tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    /// Dataset (root) node
    Dataset,
    /// Data variable node
    Variable,
    /// 1-D coordinate axis node
    Axis,
    /// Domain of a variable; its children are the governing dimensions
    Domain,
    /// One dimension of a domain
    DomElem,
}

/// A node in a dataset description tree
#[derive(Debug, Clone)]
pub struct DatasetNode {
    pub id: String,
    pub tag: NodeTag,
    /// External (file) attributes
    pub attributes: HashMap<String, String>,
    pub children: Vec<DatasetNode>,
}

impl DatasetNode {
    pub fn new(id: impl Into<String>, tag: NodeTag) -> Self {
        Self {
            id: id.into(),
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// Variable node whose domain lists `dimensions`
    pub fn variable(id: impl Into<String>, dimensions: &[&str]) -> Self {
        let mut domain = DatasetNode::new("", NodeTag::Domain);
        for dim in dimensions {
            domain.add_child(DatasetNode::new(*dim, NodeTag::DomElem));
        }
        let mut node = DatasetNode::new(id, NodeTag::Variable);
        node.add_child(domain);
        node
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: DatasetNode) -> Self {
        self.add_child(child);
        self
    }

    pub fn add_child(&mut self, child: DatasetNode) {
        self.children.push(child);
    }

    pub fn get_external_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First child tagged as a domain
    pub fn get_domain(&self) -> Option<&DatasetNode> {
        self.children.iter().find(|c| c.tag == NodeTag::Domain)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Variable and axis nodes below this one, keyed by id
    pub fn get_id_dict(&self) -> IdDict<'_> {
        let mut dict = IdDict::default();
        let mut stack: Vec<&DatasetNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if matches!(node.tag, NodeTag::Variable | NodeTag::Axis) {
                dict.insert(node);
            }
            if !matches!(node.tag, NodeTag::Domain | NodeTag::DomElem) {
                stack.extend(node.children.iter().rev());
            }
        }
        dict
    }
}

/// Id lookup over a dataset tree, iterated in document order
#[derive(Debug, Default)]
pub struct IdDict<'a> {
    order: Vec<&'a DatasetNode>,
    index: HashMap<&'a str, &'a DatasetNode>,
}

impl<'a> IdDict<'a> {
    fn insert(&mut self, node: &'a DatasetNode) {
        if !self.index.contains_key(node.id.as_str()) {
            self.index.insert(node.id.as_str(), node);
            self.order.push(node);
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a DatasetNode> {
        self.index.get(id).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &'a DatasetNode> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
