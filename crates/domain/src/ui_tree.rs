//! UI tree snapshots: a flattened, read-only copy of the foreground window.
//!
//! Snapshots are transient. The tree mutates as the target app renders, so
//! one is taken per search cycle and discarded right after.

use serde::{Deserialize, Serialize};

/// Index of a node inside a [`UiTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Screen-space bounding rectangle, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    #[must_use]
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// One node of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    /// Fully qualified resource identifier, e.g. `com.whatsapp:id/send`.
    pub view_id: Option<String>,
    pub text: Option<String>,
    pub content_description: Option<String>,
    /// Widget class, e.g. `android.widget.ImageButton`.
    pub class_name: String,
    pub clickable: bool,
    pub bounds: Rect,
    children: Vec<NodeId>,
}

impl UiNode {
    /// Children in on-screen order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the visible text or the content description equals `label`,
    /// ignoring surrounding whitespace and ASCII case.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        [&self.text, &self.content_description]
            .into_iter()
            .flatten()
            .any(|value| value.trim().eq_ignore_ascii_case(label.trim()))
    }

    /// Human-readable summary used in logs.
    #[must_use]
    pub fn describe(&self) -> String {
        let label = self
            .view_id
            .as_deref()
            .or(self.content_description.as_deref())
            .or(self.text.as_deref())
            .unwrap_or("-");
        format!("{}[{label}]", self.class_name)
    }
}

/// An owned, nested element description used to build a [`UiTree`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiElement {
    pub view_id: Option<String>,
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub class_name: String,
    pub clickable: bool,
    pub bounds: Rect,
    pub children: Vec<UiElement>,
}

impl UiElement {
    /// Start an element of the given widget class.
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn view_id(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = Some(view_id.into());
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn content_description(mut self, description: impl Into<String>) -> Self {
        self.content_description = Some(description.into());
        self
    }

    #[must_use]
    pub fn clickable(mut self, clickable: bool) -> Self {
        self.clickable = clickable;
        self
    }

    #[must_use]
    pub fn bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    #[must_use]
    pub fn child(mut self, child: UiElement) -> Self {
        self.children.push(child);
        self
    }
}

/// A flattened UI tree. Node `0` is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiTree {
    nodes: Vec<UiNode>,
}

impl UiTree {
    /// Flatten a nested element description into an arena.
    #[must_use]
    pub fn from_element(root: UiElement) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.push(root);
        tree
    }

    fn push(&mut self, element: UiElement) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(UiNode {
            view_id: element.view_id,
            text: element.text,
            content_description: element.content_description,
            class_name: element.class_name,
            clickable: element.clickable,
            bounds: element.bounds,
            children: Vec::new(),
        });
        let children: Vec<NodeId> = element
            .children
            .into_iter()
            .map(|child| self.push(child))
            .collect();
        self.nodes[id.0].children = children;
        id
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Look a node up. Returns `None` for ids from another tree.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&UiNode> {
        self.nodes.get(id.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order, depth-first walk starting at the root.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: if self.nodes.is_empty() {
                Vec::new()
            } else {
                vec![self.root()]
            },
        }
    }
}

/// Iterator returned by [`UiTree::depth_first`].
pub struct DepthFirst<'a> {
    tree: &'a UiTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (NodeId, &'a UiNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.get(id)?;
        self.stack.extend(node.children.iter().rev().copied());
        Some((id, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UiTree {
        UiTree::from_element(
            UiElement::new("FrameLayout")
                .child(
                    UiElement::new("LinearLayout")
                        .child(UiElement::new("TextView").text("a"))
                        .child(UiElement::new("TextView").text("b")),
                )
                .child(UiElement::new("Button").text("c")),
        )
    }

    #[test]
    fn should_flatten_all_nodes() {
        assert_eq!(sample().len(), 5);
    }

    #[test]
    fn should_walk_in_pre_order() {
        let tree = sample();
        let classes: Vec<_> = tree
            .depth_first()
            .map(|(_, n)| n.text.clone().unwrap_or_else(|| n.class_name.clone()))
            .collect();
        assert_eq!(classes, ["FrameLayout", "LinearLayout", "a", "b", "c"]);
    }

    #[test]
    fn should_expose_children_of_root() {
        let tree = sample();
        let root = tree.get(tree.root()).unwrap();
        assert_eq!(root.children().len(), 2);
    }

    #[test]
    fn should_return_none_for_foreign_node_id() {
        let tree = sample();
        assert!(tree.get(NodeId(99)).is_none());
    }

    #[test]
    fn should_match_label_on_text_or_description_ignoring_case() {
        let by_text = UiElement::new("Button").text(" send ");
        let by_desc = UiElement::new("ImageButton").content_description("Send");
        let tree = UiTree::from_element(UiElement::new("Root").child(by_text).child(by_desc));
        let labelled: Vec<_> = tree
            .depth_first()
            .filter(|(_, n)| n.has_label("Send"))
            .map(|(id, _)| id.index())
            .collect();
        assert_eq!(labelled, [1, 2]);
    }

    #[test]
    fn should_compute_rect_dimensions() {
        let rect = Rect::new(10, 20, 110, 70);
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
    }

    #[test]
    fn should_describe_node_with_best_available_label() {
        let tree = UiTree::from_element(
            UiElement::new("android.widget.ImageButton").view_id("com.whatsapp:id/send"),
        );
        let node = tree.get(tree.root()).unwrap();
        assert_eq!(
            node.describe(),
            "android.widget.ImageButton[com.whatsapp:id/send]"
        );
    }
}
