//! Send-control search: ordered heuristics over a [`UiTree`].
//!
//! Each heuristic is a [`SearchStrategy`]. A [`ControlLocator`] runs its
//! strategies in order and returns the first hit; every strategy scans the
//! whole tree before the next one is tried. Finding nothing is the only
//! negative outcome.

use serde::{Deserialize, Serialize};

use crate::ui_tree::{NodeId, UiTree};

/// Screen facts a strategy may consult besides the tree itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenInfo {
    pub width: u32,
}

/// A single heuristic for locating the send control.
pub trait SearchStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Return the first matching node, if any.
    fn find(&self, tree: &UiTree, screen: ScreenInfo) -> Option<NodeId>;
}

/// Exact match on the control's resource identifier.
///
/// Clickability is not checked: the identifier alone is trusted.
#[derive(Debug, Clone)]
pub struct ByViewId {
    pub view_id: String,
}

impl SearchStrategy for ByViewId {
    fn name(&self) -> &'static str {
        "view_id"
    }

    fn find(&self, tree: &UiTree, _screen: ScreenInfo) -> Option<NodeId> {
        tree.depth_first()
            .find(|(_, node)| node.view_id.as_deref() == Some(self.view_id.as_str()))
            .map(|(id, _)| id)
    }
}

/// First clickable node whose text or content description equals one of the
/// labels.
#[derive(Debug, Clone)]
pub struct ByLabel {
    pub labels: Vec<String>,
}

impl SearchStrategy for ByLabel {
    fn name(&self) -> &'static str {
        "label"
    }

    fn find(&self, tree: &UiTree, _screen: ScreenInfo) -> Option<NodeId> {
        tree.depth_first()
            .find(|(_, node)| {
                node.clickable && self.labels.iter().any(|label| node.has_label(label))
            })
            .map(|(id, _)| id)
    }
}

/// First clickable node of a generic widget class whose right edge lies
/// beyond `right_edge_fraction` of the screen width.
///
/// Trades precision for coverage on layouts without stable ids or labels.
#[derive(Debug, Clone)]
pub struct ByClassOnRightEdge {
    pub class_name: String,
    pub right_edge_fraction: f64,
}

impl SearchStrategy for ByClassOnRightEdge {
    fn name(&self) -> &'static str {
        "class_on_right_edge"
    }

    fn find(&self, tree: &UiTree, screen: ScreenInfo) -> Option<NodeId> {
        let threshold = f64::from(screen.width) * self.right_edge_fraction;
        tree.depth_first()
            .find(|(_, node)| {
                node.clickable
                    && node.class_name == self.class_name
                    && f64::from(node.bounds.right) > threshold
            })
            .map(|(id, _)| id)
    }
}

/// Knobs for the default strategy list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub send_view_id: String,
    pub send_labels: Vec<String>,
    pub fallback_class: String,
    pub right_edge_fraction: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            send_view_id: "com.whatsapp:id/send".to_string(),
            send_labels: vec!["Send".to_string()],
            fallback_class: "android.widget.ImageButton".to_string(),
            right_edge_fraction: 0.7,
        }
    }
}

/// A strategy hit: which node, and which heuristic found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMatch {
    pub node: NodeId,
    pub strategy: &'static str,
}

/// Runs strategies in priority order.
pub struct ControlLocator {
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl ControlLocator {
    /// Locator with no strategies; add them with [`with_strategy`](Self::with_strategy).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Identifier, then label, then class-on-right-edge.
    #[must_use]
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::empty()
            .with_strategy(ByViewId {
                view_id: config.send_view_id.clone(),
            })
            .with_strategy(ByLabel {
                labels: config.send_labels.clone(),
            })
            .with_strategy(ByClassOnRightEdge {
                class_name: config.fallback_class.clone(),
                right_edge_fraction: config.right_edge_fraction,
            })
    }

    /// Append a strategy with the lowest priority so far.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl SearchStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the strategies in priority order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn locate(&self, tree: &UiTree, screen: ScreenInfo) -> Option<ControlMatch> {
        self.strategies.iter().find_map(|strategy| {
            strategy.find(tree, screen).map(|node| ControlMatch {
                node,
                strategy: strategy.name(),
            })
        })
    }
}

impl Default for ControlLocator {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

impl std::fmt::Debug for ControlLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLocator")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}
