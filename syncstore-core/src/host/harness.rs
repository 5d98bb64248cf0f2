//! Headless Host Runtime
//!
//! `Harness` is a small, deterministic implementation of [`Host`]. It keeps a
//! tree of components and drives them through the same two phases a real
//! rendering runtime uses:
//!
//! 1. **Render**: the component's render function runs and produces its
//!    output. Hooks are resolved by call order. Nothing is committed yet.
//!
//! 2. **Commit**: the output becomes visible and after-commit effects whose
//!    deps changed run, each preceded by the cleanup of its previous run.
//!
//! Splitting the phases lets callers put arbitrary work (store writes, other
//! components' renders) in between, which is exactly the window the
//! subscription adapter has to survive.
//!
//! # Scheduling
//!
//! Cell writes that change a value mark the owning component dirty. The
//! dirty set is deduplicated, so any number of writes before the next
//! [`flush`](Harness::flush) cause one re-render. `flush` processes dirty
//! components in tree order (parents before children) and repeats until no
//! component is dirty. Components re-render only when their own cells
//! change; a parent re-render does not cascade.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::trace;

use super::{CellSetter, Cleanup, ContextKey, Deps, Host};
use crate::error::HarnessError;

/// Upper bound on re-render passes in a single [`Harness::flush`].
pub const MAX_FLUSH_PASSES: usize = 100;

/// Identifier of a component in a [`Harness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type RenderFn = Box<dyn FnMut(&mut RenderScope<'_>) -> String>;
type Effect = Box<dyn FnOnce() -> Option<Cleanup>>;
type DirtySet = Arc<Mutex<IndexSet<ComponentId>>>;

/// Committed state of one after-commit hook.
#[derive(Default)]
struct EffectSlot {
    deps: Option<Deps>,
    cleanup: Option<Cleanup>,
}

/// Result of a render phase waiting for its commit.
struct PendingCommit {
    output: String,
    effects: Vec<(usize, Deps, Effect)>,
}

struct Instance {
    parent: Option<ComponentId>,
    depth: usize,
    children: Vec<ComponentId>,
    render: Option<RenderFn>,
    cells: Vec<Box<dyn Any + Send>>,
    effects: Vec<EffectSlot>,
    context: HashMap<ContextKey, Box<dyn Any + Send + Sync>>,
    pending: Option<PendingCommit>,
    output: String,
    renders: usize,
}

/// Hook context handed to a render function.
pub struct RenderScope<'a> {
    id: ComponentId,
    instance: &'a mut Instance,
    tree: &'a HashMap<ComponentId, Instance>,
    dirty: &'a DirtySet,
    cell_cursor: usize,
    effect_cursor: usize,
    effects: Vec<(usize, Deps, Effect)>,
    hook_order_changed: bool,
}

impl RenderScope<'_> {
    /// The component being rendered.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// How many times this component has rendered before this render.
    pub fn previous_renders(&self) -> usize {
        self.instance.renders
    }
}

impl Host for RenderScope<'_> {
    fn use_cell<T, F>(&mut self, init: F) -> (T, CellSetter<T>)
    where
        T: Clone + PartialEq + Send + 'static,
        F: FnOnce() -> T,
    {
        let index = self.cell_cursor;
        self.cell_cursor += 1;

        let existing = self
            .instance
            .cells
            .get(index)
            .and_then(|slot| slot.downcast_ref::<Arc<Mutex<T>>>())
            .cloned();

        let cell = match existing {
            Some(cell) => cell,
            None => {
                let cell = Arc::new(Mutex::new(init()));
                if index < self.instance.cells.len() {
                    // A different hook type sits in this slot.
                    self.hook_order_changed = true;
                    self.instance.cells[index] = Box::new(Arc::clone(&cell));
                } else {
                    self.instance.cells.push(Box::new(Arc::clone(&cell)));
                }
                cell
            }
        };

        let value = cell.lock().clone();
        let dirty = Arc::downgrade(self.dirty);
        let id = self.id;

        let setter = CellSetter::new(move |f: &dyn Fn(&T) -> T| {
            let changed = {
                let mut current = cell.lock();
                let next = f(&*current);
                if next != *current {
                    *current = next;
                    true
                } else {
                    false
                }
            };

            if changed {
                if let Some(dirty) = dirty.upgrade() {
                    dirty.lock().insert(id);
                }
            }
        });

        (value, setter)
    }

    fn use_after_commit<F>(&mut self, deps: Deps, effect: F)
    where
        F: FnOnce() -> Option<Cleanup> + 'static,
    {
        let index = self.effect_cursor;
        self.effect_cursor += 1;

        if index == self.instance.effects.len() {
            self.instance.effects.push(EffectSlot::default());
        }

        if self.instance.effects[index].deps.as_ref() != Some(&deps) {
            self.effects.push((index, deps, Box::new(effect)));
        }
    }

    fn provide<T>(&mut self, key: ContextKey, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.instance.context.insert(key, Box::new(value));
    }

    fn consume<T>(&self, key: ContextKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut cursor = self.instance.parent;
        while let Some(id) = cursor {
            let ancestor = self.tree.get(&id)?;
            if let Some(value) = ancestor.context.get(&key) {
                return value.downcast_ref::<T>().cloned();
            }
            cursor = ancestor.parent;
        }
        None
    }
}

/// A headless component tree with split render and commit phases.
pub struct Harness {
    instances: HashMap<ComponentId, Instance>,
    dirty: DirtySet,
    next_id: u64,
}

impl Harness {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
            dirty: Arc::new(Mutex::new(IndexSet::new())),
            next_id: 0,
        }
    }

    /// Add a component without rendering it.
    pub fn create<F>(&mut self, parent: Option<ComponentId>, render: F) -> Result<ComponentId, HarnessError>
    where
        F: FnMut(&mut RenderScope<'_>) -> String + 'static,
    {
        let depth = match parent {
            Some(parent_id) => {
                let parent = self
                    .instances
                    .get_mut(&parent_id)
                    .ok_or(HarnessError::UnknownComponent(parent_id))?;
                parent.depth + 1
            }
            None => 0,
        };

        let id = ComponentId(self.next_id);
        self.next_id += 1;

        if let Some(parent_id) = parent {
            if let Some(parent) = self.instances.get_mut(&parent_id) {
                parent.children.push(id);
            }
        }

        self.instances.insert(
            id,
            Instance {
                parent,
                depth,
                children: Vec::new(),
                render: Some(Box::new(render)),
                cells: Vec::new(),
                effects: Vec::new(),
                context: HashMap::new(),
                pending: None,
                output: String::new(),
                renders: 0,
            },
        );

        Ok(id)
    }

    /// Create, render and commit a component.
    pub fn mount<F>(&mut self, parent: Option<ComponentId>, render: F) -> Result<ComponentId, HarnessError>
    where
        F: FnMut(&mut RenderScope<'_>) -> String + 'static,
    {
        let id = self.create(parent, render)?;
        self.render(id)?;
        self.commit(id)?;
        Ok(id)
    }

    /// Run the render phase of a component.
    ///
    /// The output and effects are held until [`commit`](Harness::commit).
    /// Rendering again before committing replaces the pending result.
    ///
    /// A panic in the render function propagates to the caller. The
    /// component stays in the tree with its last committed state.
    pub fn render(&mut self, id: ComponentId) -> Result<(), HarnessError> {
        let mut instance = self
            .instances
            .remove(&id)
            .ok_or(HarnessError::UnknownComponent(id))?;
        self.dirty.lock().shift_remove(&id);

        let mut render = instance
            .render
            .take()
            .expect("render function missing outside of render");

        let rendered = {
            let mut scope = RenderScope {
                id,
                instance: &mut instance,
                tree: &self.instances,
                dirty: &self.dirty,
                cell_cursor: 0,
                effect_cursor: 0,
                effects: Vec::new(),
                hook_order_changed: false,
            };
            panic::catch_unwind(AssertUnwindSafe(|| render(&mut scope)))
                .map(|output| (output, scope.effects, scope.hook_order_changed))
        };

        instance.render = Some(render);

        let result = match rendered {
            Ok((_, _, true)) => {
                instance.pending = None;
                Err(HarnessError::HookOrderChanged(id))
            }
            Ok((output, effects, false)) => {
                instance.renders += 1;
                instance.pending = Some(PendingCommit { output, effects });
                trace!(component = %id, renders = instance.renders, "rendered");
                Ok(())
            }
            Err(payload) => {
                // Put the component back before the panic continues upward.
                self.instances.insert(id, instance);
                panic::resume_unwind(payload);
            }
        };

        self.instances.insert(id, instance);
        result
    }

    /// Run the commit phase of a rendered component.
    pub fn commit(&mut self, id: ComponentId) -> Result<(), HarnessError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(HarnessError::UnknownComponent(id))?;
        let pending = instance
            .pending
            .take()
            .ok_or(HarnessError::NothingToCommit(id))?;

        instance.output = pending.output;

        for (index, deps, effect) in pending.effects {
            let slot = &mut instance.effects[index];
            if let Some(cleanup) = slot.cleanup.take() {
                cleanup();
            }
            slot.cleanup = effect();
            slot.deps = Some(deps);
        }

        trace!(component = %id, "committed");
        Ok(())
    }

    /// Re-render and commit every dirty component until none is dirty.
    ///
    /// Returns the number of renders performed.
    pub fn flush(&mut self) -> Result<usize, HarnessError> {
        let mut renders = 0;

        for _ in 0..MAX_FLUSH_PASSES {
            let mut batch: Vec<ComponentId> = self.dirty.lock().drain(..).collect();
            batch.retain(|id| self.instances.contains_key(id));
            if batch.is_empty() {
                return Ok(renders);
            }

            batch.sort_by_key(|id| (self.instances[id].depth, *id));

            for id in batch {
                self.render(id)?;
                self.commit(id)?;
                renders += 1;
            }
        }

        if self.dirty.lock().is_empty() {
            Ok(renders)
        } else {
            Err(HarnessError::FlushDidNotSettle {
                passes: MAX_FLUSH_PASSES,
            })
        }
    }

    /// Remove a component and its subtree.
    ///
    /// Descendants are torn down before their ancestors. Every committed
    /// effect cleanup runs.
    pub fn unmount(&mut self, id: ComponentId) -> Result<(), HarnessError> {
        let parent = self
            .instances
            .get(&id)
            .ok_or(HarnessError::UnknownComponent(id))?
            .parent;

        if let Some(parent) = parent.and_then(|parent| self.instances.get_mut(&parent)) {
            parent.children.retain(|child| *child != id);
        }

        let mut order = Vec::new();
        self.collect_post_order(id, &mut order);

        for victim in order {
            if let Some(instance) = self.instances.remove(&victim) {
                self.dirty.lock().shift_remove(&victim);
                for slot in instance.effects {
                    if let Some(cleanup) = slot.cleanup {
                        cleanup();
                    }
                }
                trace!(component = %victim, "unmounted");
            }
        }

        Ok(())
    }

    fn collect_post_order(&self, id: ComponentId, order: &mut Vec<ComponentId>) {
        if let Some(instance) = self.instances.get(&id) {
            for child in &instance.children {
                self.collect_post_order(*child, order);
            }
        }
        order.push(id);
    }

    /// Committed output of a component.
    pub fn output(&self, id: ComponentId) -> Option<&str> {
        self.instances.get(&id).map(|instance| instance.output.as_str())
    }

    /// Number of completed render phases of a component.
    pub fn render_count(&self, id: ComponentId) -> Option<usize> {
        self.instances.get(&id).map(|instance| instance.renders)
    }

    /// Whether a component is waiting for a re-render.
    pub fn is_dirty(&self, id: ComponentId) -> bool {
        self.dirty.lock().contains(&id)
    }

    /// Whether a component exists.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("components", &self.instances.len())
            .field("dirty", &self.dirty.lock().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
