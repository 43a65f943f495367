//! MCTS tree structure and node management
//!
//! Uses arena allocation. Nodes hold the move that reaches them, not a
//! state; the search replays moves from the root position.
//!
//! ## Architecture
//! - Level 2: Tree operations (expand, select_child, backpropagate)
//! - Level 3: PUCT / UCB1 scoring, node accessors
//! - Level 4: Statistics

use khet_core::Move;

// ============================================================================
// TYPES
// ============================================================================

/// Node identifier (index into arena)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// Visit statistics. Values are always from the root player's perspective.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeStats {
    pub visits: u32,
    pub total_value: f32,
}

impl NodeStats {
    /// Mean value, 0.5 before the first visit
    pub fn mean_value(&self) -> f32 {
        if self.visits == 0 {
            0.5
        } else {
            self.total_value / self.visits as f32
        }
    }
}

/// A node in the MCTS tree
#[derive(Clone, Debug)]
pub struct MctsNode {
    pub parent: Option<NodeId>,
    /// Move that led here (None for root)
    pub incoming_move: Option<Move>,
    pub children: Vec<NodeId>,
    pub prior: f32,
    pub stats: NodeStats,
    expanded: bool,
}

impl MctsNode {
    fn new(parent: Option<NodeId>, incoming_move: Option<Move>, prior: f32) -> Self {
        Self {
            parent,
            incoming_move,
            children: Vec::new(),
            prior,
            stats: NodeStats::default(),
            expanded: false,
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }
}

/// Child scoring rule
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Selection {
    /// `q + c * sqrt(ln N / n)`, unvisited children first
    Ucb1 { exploration: f32 },
    /// `q + c * prior * sqrt(N) / (1 + n)`, unvisited ranked by prior
    Puct { c_puct: f32, unvisited_priority: f32 },
}

// ============================================================================
// MCTS TREE (Level 2 - Tree Operations)
// ============================================================================

#[derive(Debug)]
pub struct MctsTree {
    nodes: Vec<MctsNode>,
}

impl Default for MctsTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MctsTree {
    /// Tree holding only an unexpanded root
    pub fn new() -> Self {
        Self {
            nodes: vec![MctsNode::new(None, None, 1.0)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn get(&self, id: NodeId) -> &MctsNode {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach one child per `(move, prior)`. Expansion happens once; later
    /// calls on the same node are ignored.
    pub fn expand(&mut self, node_id: NodeId, moves: &[(Move, f32)]) {
        if self.get(node_id).expanded {
            return;
        }

        let first = self.nodes.len();
        for &(mv, prior) in moves {
            self.nodes.push(MctsNode::new(Some(node_id), Some(mv), prior));
        }
        let node = self.get_mut(node_id);
        node.children = (first..first + moves.len()).map(NodeId).collect();
        node.expanded = true;
    }

    /// Child with the highest selection score
    pub fn select_child(&self, node_id: NodeId, rule: Selection) -> Option<NodeId> {
        let node = self.get(node_id);
        let parent_visits = node.stats.visits;

        node.children.iter().copied().max_by(|&a, &b| {
            let sa = self.score(a, parent_visits, rule);
            let sb = self.score(b, parent_visits, rule);
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Add `value` at every node on `path`
    pub fn backpropagate(&mut self, path: &[NodeId], value: f32) {
        for &id in path {
            let stats = &mut self.get_mut(id).stats;
            stats.visits += 1;
            stats.total_value += value;
        }
    }

    // ========================================================================
    // Level 3: Selection Helpers
    // ========================================================================

    fn score(&self, node_id: NodeId, parent_visits: u32, rule: Selection) -> f32 {
        let node = self.get(node_id);
        let visits = node.stats.visits;

        match rule {
            Selection::Ucb1 { exploration } => {
                if visits == 0 {
                    return f32::INFINITY;
                }
                let explore = ((parent_visits as f32).ln() / visits as f32).sqrt();
                node.stats.mean_value() + exploration * explore
            }
            Selection::Puct { c_puct, unvisited_priority } => {
                if visits == 0 {
                    return unvisited_priority + node.prior;
                }
                let explore = node.prior * (parent_visits as f32).sqrt() / (1.0 + visits as f32);
                node.stats.mean_value() + c_puct * explore
            }
        }
    }

    // ========================================================================
    // Level 4: Best Move Selection
    // ========================================================================

    /// Root child with the most visits. Ties keep the earliest child.
    pub fn best_move(&self) -> Option<Move> {
        let root = self.get(self.root());
        let mut best: Option<&MctsNode> = None;
        for &id in &root.children {
            let child = self.get(id);
            if best.map_or(true, |b| child.stats.visits > b.stats.visits) {
                best = Some(child);
            }
        }
        best.and_then(|n| n.incoming_move)
    }

    /// Visit distribution over the root children, sharpened by
    /// `visits^(1/temperature)`. A temperature near zero puts all mass on
    /// [`MctsTree::best_move`].
    pub fn root_policy(&self, temperature: f32) -> Vec<(Move, f32)> {
        let root = self.get(self.root());
        let moves: Vec<(Move, u32)> = root
            .children
            .iter()
            .filter_map(|&id| {
                let n = self.get(id);
                n.incoming_move.map(|mv| (mv, n.stats.visits))
            })
            .collect();

        let max_visits = moves.iter().map(|&(_, v)| v).max().unwrap_or(0);
        if temperature < 1e-6 || max_visits == 0 {
            let best = self.best_move();
            return moves
                .into_iter()
                .map(|(mv, _)| (mv, if Some(mv) == best { 1.0 } else { 0.0 }))
                .collect();
        }

        // Scale by the largest count first so low temperatures stay finite
        let weights: Vec<f32> = moves
            .iter()
            .map(|&(_, v)| (v as f32 / max_visits as f32).powf(1.0 / temperature))
            .collect();
        let total: f32 = weights.iter().sum();
        moves
            .into_iter()
            .zip(weights)
            .map(|((mv, _), w)| (mv, w / total))
            .collect()
    }

    /// `(move, visits, mean value, prior)` for each root child
    pub fn root_statistics(&self) -> Vec<(Move, u32, f32, f32)> {
        self.get(self.root())
            .children
            .iter()
            .filter_map(|&id| {
                let n = self.get(id);
                n.incoming_move
                    .map(|mv| (mv, n.stats.visits, n.stats.mean_value(), n.prior))
            })
            .collect()
    }

    pub fn total_simulations(&self) -> u32 {
        self.get(self.root()).stats.visits
    }
}

// ============================================================================
// TESTS
// ============================================================================
