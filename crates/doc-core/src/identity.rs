use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::node::{Document, Node};
use crate::plugin::PluginRegistry;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Sequential id generator owned by one editor session.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    /// A generator whose seed no other session in this process shares.
    pub fn for_session() -> Self {
        let session = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::from_seed(format!("s{session}"))
    }

    pub fn next_id(&mut self) -> String {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

/// Every element id in `nodes`, duplicates included once.
pub fn collect_ids(nodes: &[Node]) -> HashSet<String> {
    let mut out = HashSet::new();
    fn walk(nodes: &[Node], out: &mut HashSet<String>) {
        for node in nodes {
            if let Node::Element(el) = node {
                if let Some(id) = &el.id {
                    out.insert(id.clone());
                }
                walk(&el.children, out);
            }
        }
    }
    walk(nodes, &mut out);
    out
}

/// Drops ids in `node` that are already used in the live tree.
pub fn clear_colliding_ids(node: &mut Node, live: &HashSet<String>) {
    let Node::Element(el) = node else {
        return;
    };
    if el.id.as_ref().is_some_and(|id| live.contains(id)) {
        el.id = None;
    }
    for child in &mut el.children {
        clear_colliding_ids(child, live);
    }
}

/// Gives every addressable element a unique id. The first occurrence of an id
/// keeps it; later duplicates and missing ids get fresh ones. Returns how many
/// ids were minted.
pub fn assign_ids(doc: &mut Document, ids: &mut IdGenerator, registry: &PluginRegistry) -> usize {
    let taken = collect_ids(&doc.children);
    let mut seen: HashSet<String> = HashSet::new();
    let mut minted = 0usize;

    fn walk(
        nodes: &mut [Node],
        taken: &HashSet<String>,
        seen: &mut HashSet<String>,
        ids: &mut IdGenerator,
        registry: &PluginRegistry,
        minted: &mut usize,
    ) {
        for node in nodes {
            let Node::Element(el) = node else {
                continue;
            };
            if registry.is_addressable(el.type_name()) {
                let keep = el
                    .id
                    .as_ref()
                    .is_some_and(|id| !id.is_empty() && !seen.contains(id));
                if !keep {
                    let mut fresh = ids.next_id();
                    while taken.contains(&fresh) || seen.contains(&fresh) {
                        fresh = ids.next_id();
                    }
                    el.id = Some(fresh);
                    *minted += 1;
                }
                if let Some(id) = &el.id {
                    seen.insert(id.clone());
                }
            } else {
                el.id = None;
            }
            walk(&mut el.children, taken, seen, ids, registry, minted);
        }
    }

    walk(
        &mut doc.children,
        &taken,
        &mut seen,
        ids,
        registry,
        &mut minted,
    );
    if minted > 0 {
        debug!(minted, seed = ids.seed(), "assigned element ids");
    }
    minted
}
