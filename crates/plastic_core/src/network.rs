//! Scheduling of the modules reachable from a set of sinks.

use std::collections::VecDeque;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::module::{Dependency, ModuleHandle, ModuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Unbound,
    Bound,
    /// A tick failed. Only `reset` is accepted.
    Failed,
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkState::Unbound => f.write_str("unbound"),
            NetworkState::Bound => f.write_str("bound"),
            NetworkState::Failed => f.write_str("failed"),
        }
    }
}

struct Node {
    module: ModuleHandle,
    /// Modules whose outputs this one reads, deduplicated.
    after: Vec<ModuleId>,
}

/// A closed, topologically ordered set of modules driven in lockstep.
pub struct ModuleNetwork {
    order: Vec<ModuleHandle>,
    state: NetworkState,
    ticks: u64,
}

impl ModuleNetwork {
    /// Collect every module reachable from `sinks` and order them so that
    /// each module comes after the producers of its inputs. Module-typed
    /// links pull their targets in without ordering them.
    pub fn new(sinks: &[ModuleHandle]) -> Result<Self> {
        let nodes = collect(sinks)?;
        let order = sort(nodes)?;
        debug!(
            modules = order.len(),
            order = ?order.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "ordered network"
        );
        Ok(ModuleNetwork {
            order,
            state: NetworkState::Unbound,
            ticks: 0,
        })
    }

    pub fn order(&self) -> &[ModuleHandle] {
        &self.order
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Completed ticks since the last bind.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Bind every module in order. If any module fails, the ones already
    /// touched are reset and the network stays unbound.
    pub fn bind(&mut self) -> Result<()> {
        self.expect_state("bind", NetworkState::Unbound)?;
        for (i, module) in self.order.iter().enumerate() {
            if let Err(err) = module.bind() {
                for bound in &self.order[..=i] {
                    bound.reset();
                }
                return Err(err);
            }
        }
        self.state = NetworkState::Bound;
        debug!(modules = self.order.len(), "bound network");
        Ok(())
    }

    /// Tick every module once, in order.
    pub fn tick(&mut self) -> Result<()> {
        self.expect_state("tick", NetworkState::Bound)?;
        trace!(tick = self.ticks, "tick");
        for module in &self.order {
            if let Err(err) = module.tick() {
                warn!(module = %module.name(), tick = self.ticks, error = %err, "tick failed");
                self.state = NetworkState::Failed;
                return Err(err);
            }
        }
        self.ticks += 1;
        Ok(())
    }

    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    /// Reset every module. Legal from any state.
    pub fn reset(&mut self) {
        for module in self.order.iter().rev() {
            module.reset();
        }
        self.state = NetworkState::Unbound;
        self.ticks = 0;
        debug!("reset network");
    }

    fn expect_state(&self, operation: &'static str, expected: NetworkState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                operation,
                state: format!("network is {}", self.state),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleNetwork")
            .field("order", &self.order.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("state", &self.state)
            .field("ticks", &self.ticks)
            .finish()
    }
}

/// Depth-first closure from the sinks, recording nodes in discovery order.
fn collect(sinks: &[ModuleHandle]) -> Result<IndexMap<ModuleId, Node>> {
    let mut nodes: IndexMap<ModuleId, Node> = IndexMap::new();
    let mut stack: Vec<ModuleHandle> = sinks.iter().rev().cloned().collect();

    while let Some(module) = stack.pop() {
        if nodes.contains_key(&module.id()) {
            continue;
        }
        let deps = module.dependencies()?;
        let after: IndexSet<ModuleId> = deps
            .iter()
            .filter_map(|dep| match dep {
                Dependency::Port(m) => Some(m.id()),
                Dependency::Unordered(_) => None,
            })
            .collect();
        for dep in deps.iter().rev() {
            if !nodes.contains_key(&dep.module().id()) {
                stack.push(dep.module().clone());
            }
        }
        nodes.insert(
            module.id(),
            Node {
                module,
                after: after.into_iter().collect(),
            },
        );
    }
    Ok(nodes)
}

/// Kahn's algorithm. Ready modules are taken in discovery order.
fn sort(nodes: IndexMap<ModuleId, Node>) -> Result<Vec<ModuleHandle>> {
    let mut in_degree: IndexMap<ModuleId, usize> = IndexMap::with_capacity(nodes.len());
    let mut dependents: IndexMap<ModuleId, Vec<ModuleId>> = IndexMap::with_capacity(nodes.len());
    for (id, node) in &nodes {
        in_degree.insert(*id, node.after.len());
        for dep in &node.after {
            dependents.entry(*dep).or_default().push(*id);
        }
    }

    let mut ready: VecDeque<ModuleId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(id) = ready.pop_front() {
        order.push(id);
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*dependent);
                }
            }
        }
    }

    if order.len() != nodes.len() {
        let placed: IndexSet<ModuleId> = order.into_iter().collect();
        let modules = nodes
            .values()
            .filter(|node| !placed.contains(&node.module.id()))
            .map(|node| node.module.name())
            .collect();
        return Err(Error::Cycle { modules });
    }

    let mut nodes = nodes;
    Ok(order
        .into_iter()
        .filter_map(|id| nodes.swap_remove(&id).map(|node| node.module))
        .collect())
}
