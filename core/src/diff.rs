//! Computing edit scripts between two trees.
//!
//! The differ walks both trees one sibling list at a time. Within a list it
//!
//! 1. matches keyed siblings by key and unkeyed siblings by their order among the
//!    unkeyed ones,
//! 2. removes unmatched previous siblings, highest index first,
//! 3. places the next list right to left: new siblings are created, matched siblings
//!    on the longest increasing run of previous indices stay put, every other matched
//!    sibling is moved once,
//! 4. updates and recurses into matched pairs left to right at their final positions.
//!
//! Op positions are always valid for the live tree at the moment the op runs, so the
//! patcher never needs to look ahead.

use alloc::{collections::BTreeMap, string::String, vec, vec::Vec};

use crate::{
    error::DuplicateKey,
    node::{NodeIdentity, VElement, VNode, flatten},
    op::{AttrChange, EditOp, NodePath, NodeSpec},
};

/// Output of one diff pass.
#[derive(Debug, Clone, Default)]
pub struct EditScript {
    /// Ops in application order.
    pub ops: Vec<EditOp>,
    /// Every node of the next tree, in pre-order, with the position it ends up at.
    pub layout: Vec<(NodePath, NodeIdentity)>,
    /// Duplicate keys found in the next tree.
    pub duplicate_keys: Vec<DuplicateKey>,
}

impl EditScript {
    /// Returns `true` when the trees need no host mutation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Diffs `previous` (or nothing, for an initial mount) against `next`.
#[must_use]
pub fn diff(previous: Option<&VNode>, next: &VNode) -> EditScript {
    let prev_roots = previous.map_or_else(Vec::new, |tree| flatten(core::slice::from_ref(tree)));
    let next_roots = flatten(core::slice::from_ref(next));

    let mut differ = Differ::default();
    differ.diff_children(&NodePath::root(), &prev_roots, &next_roots);

    let mut layout = Vec::with_capacity(next.host_node_count());
    collect_layout(&NodePath::root(), &next_roots, &mut layout);

    EditScript {
        ops: differ.ops,
        layout,
        duplicate_keys: differ.duplicate_keys,
    }
}

fn collect_layout(parent: &NodePath, nodes: &[&VNode], out: &mut Vec<(NodePath, NodeIdentity)>) {
    for (index, node) in nodes.iter().enumerate() {
        let Some(identity) = node.identity() else {
            continue;
        };
        let path = parent.child(index);
        out.push((path.clone(), identity));
        collect_layout(&path, &node.children(), out);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Previous(usize),
    Next(usize),
}

#[derive(Debug, Default)]
struct Differ {
    ops: Vec<EditOp>,
    duplicate_keys: Vec<DuplicateKey>,
}

impl Differ {
    fn diff_children(&mut self, parent: &NodePath, prev: &[&VNode], next: &[&VNode]) {
        if prev.is_empty() {
            self.report_duplicate_keys(parent, next);
            for (index, node) in next.iter().enumerate() {
                self.create(parent, index, node);
            }
            return;
        }
        if next.is_empty() {
            for index in (0..prev.len()).rev() {
                self.remove(&parent.child(index), prev[index]);
            }
            return;
        }

        let matches = self.match_siblings(parent, prev, next);

        let mut matched = vec![false; prev.len()];
        for index in matches.iter().flatten() {
            matched[*index] = true;
        }
        for index in (0..prev.len()).rev() {
            if !matched[index] {
                self.remove(&parent.child(index), prev[index]);
            }
        }

        self.place(parent, next, &matches);

        for (index, node) in next.iter().enumerate() {
            if let Some(previous) = matches[index] {
                let path = parent.child(index);
                if prev[previous].same_identity(node) {
                    self.update(&path, prev[previous], node);
                } else {
                    self.replace(&path, prev[previous], node);
                }
            }
        }
    }

    /// For every next sibling, the index of the previous sibling it is matched with.
    fn match_siblings(
        &mut self,
        parent: &NodePath,
        prev: &[&VNode],
        next: &[&VNode],
    ) -> Vec<Option<usize>> {
        let prev_keys = self.effective_keys(parent, prev, Side::Previous);
        let next_keys = self.effective_keys(parent, next, Side::Next);

        let by_key: BTreeMap<&str, usize> = prev_keys
            .iter()
            .enumerate()
            .filter_map(|(index, key)| key.map(|key| (key, index)))
            .collect();
        let mut unkeyed = prev_keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.is_none())
            .map(|(index, _)| index);

        next_keys
            .iter()
            .map(|key| match key {
                Some(key) => by_key.get(key).copied(),
                None => unkeyed.next(),
            })
            .collect()
    }

    /// Reports repeated keys of a sibling list that is created rather than matched.
    fn report_duplicate_keys(&mut self, parent: &NodePath, nodes: &[&VNode]) {
        self.effective_keys(parent, nodes, Side::Next);
    }

    /// Keys that take part in keyed matching. Repeated keys fall back to positional
    /// matching after their first occurrence; repeats in the next tree are reported.
    fn effective_keys<'a>(
        &mut self,
        parent: &NodePath,
        nodes: &[&'a VNode],
        side: Side,
    ) -> Vec<Option<&'a str>> {
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        nodes
            .iter()
            .enumerate()
            .map(|(index, &node)| {
                let key = node.key()?;
                if let Some(&first) = seen.get(key) {
                    if side == Side::Next {
                        let duplicate = DuplicateKey {
                            parent: parent.clone(),
                            key: key.into(),
                            first,
                            duplicate: index,
                        };
                        tracing::warn!(%duplicate, "falling back to positional matching");
                        self.duplicate_keys.push(duplicate);
                    }
                    return None;
                }
                seen.insert(key, index);
                Some(key)
            })
            .collect()
    }

    /// Orders the live list like `next`, assuming unmatched previous siblings are gone.
    fn place(&mut self, parent: &NodePath, next: &[&VNode], matches: &[Option<usize>]) {
        let mut live: Vec<Slot> = {
            let mut kept: Vec<usize> = matches.iter().flatten().copied().collect();
            kept.sort_unstable();
            kept.into_iter().map(Slot::Previous).collect()
        };

        let sources: Vec<usize> = matches.iter().flatten().copied().collect();
        let stable_sources = longest_increasing_subsequence(&sources);
        let mut stable = vec![false; next.len()];
        {
            let mut source = 0;
            let mut keep = stable_sources.iter().peekable();
            for (index, matched) in matches.iter().enumerate() {
                if matched.is_some() {
                    if keep.peek() == Some(&&source) {
                        stable[index] = true;
                        keep.next();
                    }
                    source += 1;
                }
            }
        }

        let slot_of = |index: usize| matches[index].map_or(Slot::Next(index), Slot::Previous);

        for index in (0..next.len()).rev() {
            if stable[index] {
                continue;
            }
            let slot = slot_of(index);
            if let Slot::Previous(_) = slot {
                let from = position(&live, slot);
                live.remove(from);
                let to = anchor(&live, index, next.len(), slot_of);
                live.insert(to, slot);
                if from != to {
                    self.ops.push(EditOp::Move {
                        parent: parent.clone(),
                        from,
                        to,
                    });
                }
            } else {
                let at = anchor(&live, index, next.len(), slot_of);
                live.insert(at, slot);
                self.create(parent, at, next[index]);
            }
        }
    }

    fn update(&mut self, path: &NodePath, prev: &VNode, next: &VNode) {
        match (prev, next) {
            (VNode::Element(a), VNode::Element(b)) => {
                self.diff_attrs(path, a, b);
                self.diff_listeners(path, a, b);
                self.diff_children(path, &prev.children(), &next.children());
            }
            (VNode::Text(a), VNode::Text(b)) | (VNode::Comment(a), VNode::Comment(b)) => {
                if a != b {
                    self.ops.push(EditOp::UpdateText {
                        path: path.clone(),
                        content: b.clone(),
                    });
                }
            }
            _ => self.replace(path, prev, next),
        }
    }

    fn diff_attrs(&mut self, path: &NodePath, prev: &VElement, next: &VElement) {
        for name in prev.attrs().keys() {
            if !next.attrs().contains_key(name) {
                self.ops.push(EditOp::UpdateAttr {
                    path: path.clone(),
                    name: name.clone(),
                    change: AttrChange::Remove,
                });
            }
        }
        for (name, value) in next.attrs() {
            if prev.attrs().get(name) != Some(value) {
                self.ops.push(EditOp::UpdateAttr {
                    path: path.clone(),
                    name: name.clone(),
                    change: AttrChange::Set(value.clone()),
                });
            }
        }
    }

    fn diff_listeners(&mut self, path: &NodePath, prev: &VElement, next: &VElement) {
        for (event, listener) in prev.listeners() {
            let kept = next
                .listeners()
                .get(event)
                .is_some_and(|other| other.ptr_eq(listener));
            if !kept {
                self.detach(path, event);
            }
        }
        for (event, listener) in next.listeners() {
            let kept = prev
                .listeners()
                .get(event)
                .is_some_and(|other| other.ptr_eq(listener));
            if !kept {
                self.ops.push(EditOp::AttachListener {
                    path: path.clone(),
                    event: event.clone(),
                    listener: listener.clone(),
                });
            }
        }
    }

    /// Creates `node` and its subtree at `index` under `parent`, parent before children.
    fn create(&mut self, parent: &NodePath, index: usize, node: &VNode) {
        let Some(spec) = NodeSpec::of(node) else {
            return;
        };
        self.ops.push(EditOp::CreateNode {
            parent: parent.clone(),
            index,
            spec,
        });
        self.fill(&parent.child(index), node);
    }

    /// Attaches the listeners and creates the children of a freshly created node.
    fn fill(&mut self, path: &NodePath, node: &VNode) {
        if let VNode::Element(element) = node {
            for (event, listener) in element.listeners() {
                self.ops.push(EditOp::AttachListener {
                    path: path.clone(),
                    event: event.clone(),
                    listener: listener.clone(),
                });
            }
        }
        let children = node.children();
        self.report_duplicate_keys(path, &children);
        for (index, child) in children.into_iter().enumerate() {
            self.create(path, index, child);
        }
    }

    fn remove(&mut self, path: &NodePath, node: &VNode) {
        self.detach_subtree(path, node);
        self.ops.push(EditOp::RemoveNode { path: path.clone() });
    }

    fn replace(&mut self, path: &NodePath, prev: &VNode, next: &VNode) {
        let Some(spec) = NodeSpec::of(next) else {
            return;
        };
        self.detach_subtree(path, prev);
        self.ops.push(EditOp::ReplaceNode {
            path: path.clone(),
            spec,
        });
        self.fill(path, next);
    }

    fn detach_subtree(&mut self, path: &NodePath, node: &VNode) {
        if let VNode::Element(element) = node {
            for event in element.listeners().keys() {
                self.detach(path, event);
            }
        }
        for (index, child) in node.children().into_iter().enumerate() {
            self.detach_subtree(&path.child(index), child);
        }
    }

    fn detach(&mut self, path: &NodePath, event: &str) {
        self.ops.push(EditOp::DetachListener {
            path: path.clone(),
            event: String::from(event),
        });
    }
}

fn position(live: &[Slot], slot: Slot) -> usize {
    live.iter()
        .position(|candidate| *candidate == slot)
        .unwrap_or(live.len())
}

/// Insertion index for the `index`-th next sibling: right before its placed right neighbour.
fn anchor(live: &[Slot], index: usize, len: usize, slot_of: impl Fn(usize) -> Slot) -> usize {
    if index + 1 < len {
        position(live, slot_of(index + 1))
    } else {
        live.len()
    }
}

/// Positions (into `values`) of one longest strictly increasing subsequence.
fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    // tails[k]: position of the smallest tail of an increasing run of length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; values.len()];

    for (position, value) in values.iter().enumerate() {
        let length = tails.partition_point(|&tail| values[tail] < *value);
        predecessor[position] = length.checked_sub(1).map(|previous| tails[previous]);
        if length == tails.len() {
            tails.push(position);
        } else {
            tails[length] = position;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        run.push(position);
        cursor = predecessor[position];
    }
    run.reverse();
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Listener, comment, element, fragment, text};

    fn list(keys: &[&str]) -> VNode {
        element("ul")
            .children(keys.iter().map(|key| element("li").key(*key).child(text(*key))))
            .into()
    }

    #[test]
    fn lis_picks_a_longest_run() {
        assert_eq!(longest_increasing_subsequence(&[2, 0, 1]), vec![1, 2]);
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2]), vec![0, 1, 2]);
        assert_eq!(longest_increasing_subsequence(&[3, 2, 1, 0]).len(), 1);
        assert_eq!(
            longest_increasing_subsequence(&[4, 1, 5, 2, 3, 0]),
            vec![1, 3, 4]
        );
        assert!(longest_increasing_subsequence(&[]).is_empty());
    }

    #[test]
    fn initial_mount_creates_parent_before_children() {
        let script = diff(None, &element("p").child(text("hi")).into());
        assert_eq!(
            script.ops,
            vec![
                EditOp::CreateNode {
                    parent: NodePath::root(),
                    index: 0,
                    spec: NodeSpec::Element {
                        tag: "p".into(),
                        key: None,
                        attrs: crate::node::Attributes::new(),
                    },
                },
                EditOp::CreateNode {
                    parent: NodePath::from([0]),
                    index: 0,
                    spec: NodeSpec::Text("hi".into()),
                },
            ]
        );
        assert_eq!(script.layout.len(), 2);
    }

    #[test]
    fn identical_trees_produce_no_ops() {
        let listener = Listener::new(|_| {});
        let tree: VNode = element("div")
            .attr("id", "root")
            .listener("click", listener)
            .child(list(&["a", "b"]))
            .child(fragment(vec![text("x"), comment("y")]))
            .into();
        assert!(diff(Some(&tree), &tree.clone()).is_empty());
    }

    #[test]
    fn keyed_rotation_moves_one_node() {
        let script = diff(Some(&list(&["a", "b", "c"])), &list(&["c", "a", "b"]));
        assert_eq!(
            script.ops,
            vec![EditOp::Move {
                parent: NodePath::from([0]),
                from: 2,
                to: 0,
            }]
        );
    }

    #[test]
    fn keyed_reverse_keeps_one_node_in_place() {
        let script = diff(Some(&list(&["a", "b", "c", "d"])), &list(&["d", "c", "b", "a"]));
        assert_eq!(script.ops.len(), 3);
        assert!(script.ops.iter().all(|op| matches!(op, EditOp::Move { .. })));
    }

    #[test]
    fn keyed_insert_and_remove() {
        let script = diff(Some(&list(&["a", "b", "c"])), &list(&["a", "x", "c"]));
        let names: Vec<_> = script.ops.iter().map(EditOp::name).collect();
        assert_eq!(names, ["RemoveNode", "CreateNode", "CreateNode"]);
        assert_eq!(
            script.ops[0],
            EditOp::RemoveNode {
                path: NodePath::from([0, 1])
            }
        );
        assert!(matches!(
            &script.ops[1],
            EditOp::CreateNode { parent, index: 1, .. } if *parent == NodePath::from([0])
        ));
    }

    #[test]
    fn attribute_changes() {
        let prev: VNode = element("div").attr("id", "x").attr("class", "y").into();
        let next: VNode = element("div").attr("id", "x").attr("title", "z").into();
        let script = diff(Some(&prev), &next);
        assert_eq!(
            script.ops,
            vec![
                EditOp::UpdateAttr {
                    path: NodePath::from([0]),
                    name: "class".into(),
                    change: AttrChange::Remove,
                },
                EditOp::UpdateAttr {
                    path: NodePath::from([0]),
                    name: "title".into(),
                    change: AttrChange::Set("z".into()),
                },
            ]
        );
    }

    #[test]
    fn tag_change_replaces() {
        let prev: VNode = element("div").attr("id", "x").into();
        let next: VNode = element("span").attr("id", "x").into();
        let script = diff(Some(&prev), &next);
        assert_eq!(script.ops.len(), 1);
        assert!(matches!(script.ops[0], EditOp::ReplaceNode { .. }));
    }

    #[test]
    fn text_change_updates_in_place() {
        let script = diff(Some(&text("a")), &text("b"));
        assert_eq!(
            script.ops,
            vec![EditOp::UpdateText {
                path: NodePath::from([0]),
                content: "b".into(),
            }]
        );
    }

    #[test]
    fn listeners_detach_before_removal() {
        let prev: VNode = element("div")
            .child(element("button").on("click", |_| {}))
            .into();
        let next: VNode = element("div").into();
        let script = diff(Some(&prev), &next);
        assert_eq!(
            script.ops,
            vec![
                EditOp::DetachListener {
                    path: NodePath::from([0, 0]),
                    event: "click".into(),
                },
                EditOp::RemoveNode {
                    path: NodePath::from([0, 0])
                },
            ]
        );
    }

    #[test]
    fn replaced_listener_is_detached_then_attached() {
        let prev: VNode = element("button").on("click", |_| {}).into();
        let next: VNode = element("button").on("click", |_| {}).into();
        let names: Vec<_> = diff(Some(&prev), &next).ops.iter().map(EditOp::name).collect();
        assert_eq!(names, ["DetachListener", "AttachListener"]);
    }

    #[test]
    fn duplicate_keys_are_reported_and_matched_positionally() {
        let next = list(&["a", "a", "b"]);
        let script = diff(Some(&next), &next);
        assert!(script.is_empty());
        assert_eq!(
            script.duplicate_keys,
            vec![DuplicateKey {
                parent: NodePath::from([0]),
                key: "a".into(),
                first: 0,
                duplicate: 1,
            }]
        );
    }

    #[test]
    fn duplicate_keys_are_reported_in_created_lists() {
        let script = diff(None, &list(&["a", "a"]));
        assert_eq!(script.duplicate_keys.len(), 1);
        assert_eq!(script.duplicate_keys[0].parent, NodePath::from([0]));

        let prev: VNode = element("div").child(text("x")).into();
        let next: VNode = element("div")
            .child(list(&["b", "b"]))
            .child(list(&["c", "d", "c"]))
            .into();
        let script = diff(Some(&prev), &next);
        let reported: Vec<_> = script
            .duplicate_keys
            .iter()
            .map(|duplicate| (duplicate.parent.clone(), duplicate.key.as_str()))
            .collect();
        assert_eq!(
            reported,
            [(NodePath::from([0, 0]), "b"), (NodePath::from([0, 1]), "c")]
        );

        let script = diff(Some(&prev), &fragment(vec![list(&["e", "e"])]));
        assert_eq!(script.duplicate_keys.len(), 1);
    }

    #[test]
    fn fragments_are_spliced_into_positions() {
        let prev: VNode = element("div")
            .child(text("a"))
            .child(fragment(vec![text("b")]))
            .into();
        let next: VNode = element("div")
            .child(fragment(vec![text("a"), text("b")]))
            .child(text("c"))
            .into();
        let script = diff(Some(&prev), &next);
        assert_eq!(
            script.ops,
            vec![EditOp::CreateNode {
                parent: NodePath::from([0]),
                index: 2,
                spec: NodeSpec::Text("c".into()),
            }]
        );
    }
}
