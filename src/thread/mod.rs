//! Reply/reference graph of messages.
//!
//! The graph owns every [`ThreadNode`]; edges are [`NodeId`] indices into it,
//! so cyclic reply chains need no shared ownership. Nodes are keyed by
//! normalized `Message-ID`. A placeholder node stands in for a message that is
//! referenced but has not been seen, and is upgraded in place when it is.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::model::record::EmailRecord;

/// Index of a node in a [`ThreadGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One message (real or placeholder) and its edges.
#[derive(Debug, Clone)]
pub struct ThreadNode {
    record: EmailRecord,
    replying_to: Option<NodeId>,
    replies: BTreeSet<NodeId>,
    referenced_by: BTreeSet<NodeId>,
    broken_thread: bool,
    thread_length: usize,
}

impl ThreadNode {
    fn new(record: EmailRecord) -> Self {
        Self {
            record,
            replying_to: None,
            replies: BTreeSet::new(),
            referenced_by: BTreeSet::new(),
            broken_thread: false,
            thread_length: 0,
        }
    }

    pub fn record(&self) -> &EmailRecord {
        &self.record
    }

    pub fn is_placeholder(&self) -> bool {
        self.record.is_placeholder
    }

    /// The message this one is `In-Reply-To`.
    pub fn replying_to(&self) -> Option<NodeId> {
        self.replying_to
    }

    pub fn replies(&self) -> &BTreeSet<NodeId> {
        &self.replies
    }

    pub fn referenced_by(&self) -> &BTreeSet<NodeId> {
        &self.referenced_by
    }

    /// `true` when the parent named by `In-Reply-To` is unknown.
    pub fn broken_thread(&self) -> bool {
        self.broken_thread
    }

    /// Real messages in the reply tree this node belongs to.
    pub fn thread_length(&self) -> usize {
        self.thread_length
    }
}

/// All nodes of a batch, keyed by message identifier.
#[derive(Debug, Default)]
pub struct ThreadGraph {
    nodes: Vec<ThreadNode>,
    by_id: HashMap<String, NodeId>,
}

impl ThreadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&ThreadNode> {
        self.nodes.get(id.0)
    }

    /// Node keyed by a message identifier (angle brackets optional).
    pub fn lookup(&self, message_id: &str) -> Option<NodeId> {
        self.by_id.get(&normalize_id(message_id)).copied()
    }

    pub fn placeholder_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_placeholder()).count()
    }

    pub fn broken_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.broken_thread).count()
    }

    /// Insert a record.
    ///
    /// A placeholder with the same identifier is upgraded in place and keeps
    /// its edges. A second real message with an identifier already taken is
    /// added as a separate node that cannot be looked up.
    pub fn insert(&mut self, record: EmailRecord) -> NodeId {
        let key = record
            .message_id
            .as_deref()
            .map(normalize_id)
            .filter(|k| !k.is_empty());

        let Some(key) = key else {
            return self.push(record);
        };

        match self.by_id.get(&key).copied() {
            Some(id) if self.nodes[id.0].is_placeholder() => {
                debug!(message_id = %key, "Upgrading placeholder");
                self.nodes[id.0].record = record;
                id
            }
            Some(_) => {
                warn!(
                    message_id = %key,
                    record = %record.record_name,
                    "Duplicate Message-ID, keeping both messages"
                );
                self.push(record)
            }
            None => {
                let id = self.push(record);
                self.by_id.insert(key, id);
                id
            }
        }
    }

    /// The node for `message_id`, created as a placeholder named
    /// `record_name` if unknown.
    pub fn placeholder(&mut self, message_id: &str, record_name: &str) -> NodeId {
        if let Some(id) = self.lookup(message_id) {
            return id;
        }
        let id = self.push(EmailRecord::placeholder(message_id.trim(), record_name));
        self.by_id.insert(normalize_id(message_id), id);
        id
    }

    /// Make `parent` the parent of `child`, or mark `child` broken if there is
    /// no parent.
    pub fn link(&mut self, child: NodeId, parent: Option<NodeId>) {
        if let Some(old) = self.nodes[child.0].replying_to.take() {
            self.nodes[old.0].replies.remove(&child);
        }
        match parent {
            Some(parent) => {
                self.nodes[child.0].replying_to = Some(parent);
                self.nodes[child.0].broken_thread = false;
                self.nodes[parent.0].replies.insert(child);
            }
            None => self.nodes[child.0].broken_thread = true,
        }
    }

    /// Note that `referencer` references `referenced_id`, creating a
    /// placeholder for that identifier if needed. A new placeholder takes the
    /// referencer's record name.
    pub fn record_reference(&mut self, referencer: NodeId, referenced_id: &str) -> NodeId {
        let record_name = self.nodes[referencer.0].record.record_name.clone();
        let target = self.placeholder(referenced_id, &record_name);
        self.nodes[target.0].referenced_by.insert(referencer);
        target
    }

    /// Insert a record and record each of its references.
    pub fn add_message(&mut self, record: EmailRecord) -> NodeId {
        let references = record.references.clone();
        let id = self.insert(record);
        for reference in &references {
            if self.lookup(reference) == Some(id) {
                continue;
            }
            self.record_reference(id, reference);
        }
        id
    }

    /// Link every real message that names an `In-Reply-To` to its parent.
    ///
    /// Runs after the whole batch is inserted, so a parent that appears later
    /// in the batch is still found.
    pub fn resolve_links(&mut self) {
        for index in 0..self.nodes.len() {
            let child = NodeId(index);
            let node = &self.nodes[index];
            if node.is_placeholder() {
                continue;
            }
            let Some(parent_id) = node.record.in_reply_to.as_deref() else {
                continue;
            };
            let parent = self.lookup(parent_id).filter(|&p| p != child);
            if parent.is_none() {
                debug!(
                    record = %node.record.record_name,
                    in_reply_to = parent_id,
                    "Replying to an unknown message"
                );
            }
            self.link(child, parent);
        }
    }

    /// Set `thread_length` on every node to the number of real messages in
    /// its reply tree.
    pub fn assign_thread_lengths(&mut self) {
        let mut component = vec![usize::MAX; self.nodes.len()];
        let mut sizes = Vec::new();

        for start in 0..self.nodes.len() {
            if component[start] != usize::MAX {
                continue;
            }
            let label = sizes.len();
            let mut real = 0;
            let mut stack = vec![start];
            component[start] = label;
            while let Some(current) = stack.pop() {
                let node = &self.nodes[current];
                if !node.is_placeholder() {
                    real += 1;
                }
                let neighbours = node
                    .replying_to
                    .into_iter()
                    .chain(node.replies.iter().copied());
                for next in neighbours {
                    if component[next.0] == usize::MAX {
                        component[next.0] = label;
                        stack.push(next.0);
                    }
                }
            }
            sizes.push(real);
        }

        for (node, label) in self.nodes.iter_mut().zip(component) {
            node.thread_length = sizes[label];
        }
    }

    fn push(&mut self, record: EmailRecord) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ThreadNode::new(record));
        id
    }
}

/// Normalize a Message-ID to the text of its first `<...>` token.
///
/// Without a closed bracket pair the first whitespace-separated token is
/// used, so trailing comments and extra identifiers are ignored.
fn normalize_id(id: &str) -> String {
    let trimmed = id.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(len) = trimmed[start + 1..].find('>') {
            return trimmed[start + 1..start + 1 + len].trim().to_string();
        }
    }
    trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}
