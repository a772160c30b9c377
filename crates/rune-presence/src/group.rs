//! Group mutation interceptor for list-like containers.
//!
//! A [`GroupInterceptor`] observes the child list of one container. Children
//! the host appends are entered with a staggered delay; children the host
//! removes are put back where they were, play their exit animation and are
//! only detached once it settles. Many children can be exiting at once, and a
//! child the host adds back while it is exiting is reclaimed and entered again.
//!
//! Structural changes are read from the tree's own mutation records, one batch
//! at a time: either through [`mutate`](GroupInterceptor::mutate), which runs a
//! change and processes it right away, or through
//! [`process`](GroupInterceptor::process) after changes made elsewhere.
//!
//! ```ignore
//! let mut group = GroupInterceptor::new(&mut scene, list, options);
//! group.mount(&mut scene);
//! group.mutate(&mut scene, |tree| tree.detach(item))?;
//! scene.tick(16.0);
//! group.poll(&mut scene);
//! ```

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace, warn};

use crate::completion::{Completion, Outcome};
use crate::events::PresenceEvent;
use crate::presence::{ElementDescriptor, PresenceContext};
use crate::scene::Scene;
use crate::stagger::{Stagger, StaggerDirection, StaggerPlan};
use crate::tree::{ElementTree, MutationRecord, ObserverId};
use crate::types::{AnimationParams, ElementId};

/// Animations applied by a group to its children.
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    /// Snapshot applied to every entering child before its enter starts.
    pub initial: Option<AnimationParams>,
    pub enter: Option<AnimationParams>,
    /// Exit for removed children that have no registered descriptor.
    pub exit: Option<AnimationParams>,
    pub stagger: Stagger,
    pub direction: StaggerDirection,
    /// Enter the children already present when the group mounts.
    pub appear: bool,
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(mut self, params: AnimationParams) -> Self {
        self.initial = Some(params);
        self
    }

    pub fn enter(mut self, params: AnimationParams) -> Self {
        self.enter = Some(params);
        self
    }

    pub fn exit(mut self, params: AnimationParams) -> Self {
        self.exit = Some(params);
        self
    }

    pub fn stagger(mut self, stagger: Stagger, direction: StaggerDirection) -> Self {
        self.stagger = stagger;
        self.direction = direction;
        self
    }

    pub fn appear(mut self, appear: bool) -> Self {
        self.appear = appear;
        self
    }
}

/// What one batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub entered: Vec<ElementId>,
    /// Removed children that were put back to play their exit.
    pub exiting: Vec<ElementId>,
    pub finalized: Vec<ElementId>,
}

impl BatchSummary {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exiting.is_empty() && self.finalized.is_empty()
    }
}

#[derive(Debug)]
enum ExitSource {
    Descriptor(ElementDescriptor),
    Params(AnimationParams),
}

/// Exit animations keeping one removed child alive.
type ExitParts = Vec<(ElementId, Completion)>;

#[derive(Debug)]
pub struct GroupInterceptor {
    container: ElementId,
    observer: Option<ObserverId>,
    options: GroupOptions,
    presence: Option<PresenceContext>,
    known: HashSet<ElementId>,
    exiting: BTreeMap<ElementId, ExitParts>,
}

impl GroupInterceptor {
    /// Start observing `container`'s child list.
    pub fn new(scene: &mut Scene, container: ElementId, options: GroupOptions) -> Self {
        let observer = scene.tree_mut().observe(container, false);
        Self {
            container,
            observer: Some(observer),
            options,
            presence: None,
            known: HashSet::new(),
            exiting: BTreeMap::new(),
        }
    }

    /// Look up exit descriptors in this boundary's registry.
    pub fn with_presence(mut self, presence: PresenceContext) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn container(&self) -> ElementId {
        self.container
    }

    pub fn options(&self) -> &GroupOptions {
        &self.options
    }

    pub fn is_connected(&self) -> bool {
        self.observer.is_some()
    }

    pub fn is_known(&self, element: ElementId) -> bool {
        self.known.contains(&element)
    }

    pub fn is_exiting(&self, element: ElementId) -> bool {
        self.exiting.contains_key(&element)
    }

    pub fn exiting_count(&self) -> usize {
        self.exiting.len()
    }

    /// Record the children already in the container. With `appear` set they
    /// enter as one staggered batch. Returns the children that entered.
    pub fn mount(&mut self, scene: &mut Scene) -> Vec<ElementId> {
        let present: Vec<ElementId> = scene
            .tree()
            .children(self.container)
            .iter()
            .copied()
            .filter(|c| !self.exiting.contains_key(c) && !self.known.contains(c))
            .collect();
        if self.options.appear {
            self.start_entrances(scene, &present, &[]);
            present
        } else {
            self.known.extend(present);
            Vec::new()
        }
    }

    /// Run a structural change and process the batch it produced.
    pub fn mutate<R>(&mut self, scene: &mut Scene, f: impl FnOnce(&mut ElementTree) -> R) -> R {
        let result = f(scene.tree_mut());
        self.process(scene);
        result
    }

    /// Process every structural change recorded since the last batch, then
    /// finalize exits that have settled.
    pub fn process(&mut self, scene: &mut Scene) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let Some(observer) = self.observer else {
            return summary;
        };
        let records = scene.tree_mut().take_records(observer);
        if !records.is_empty() {
            trace!(container = %self.container, records = records.len(), "processing batch");
            let added: Vec<ElementId> = records
                .iter()
                .flat_map(|r| r.added.iter().copied())
                .collect();

            // Undo removals last-first so every reference sibling is back in
            // place by the time it is needed.
            scene.tree_mut().set_observer_paused(observer, true);
            for record in records.iter().rev() {
                for &element in record.removed.iter().rev() {
                    if self.intercept_removal(scene, element, record, &added) {
                        summary.exiting.push(element);
                    }
                }
            }
            scene.tree_mut().set_observer_paused(observer, false);

            summary.entered = self.enter_batch(scene, added);
        }
        summary.finalized = self.reap(scene);
        summary
    }

    /// Finalize exits that have settled. Returns the finalized children.
    pub fn poll(&mut self, scene: &mut Scene) -> Vec<ElementId> {
        self.reap(scene)
    }

    /// Cancel the exit of a removed child. The child stays in the container
    /// and is treated as present again.
    pub fn cancel_exit(&mut self, scene: &mut Scene, element: ElementId) -> bool {
        let Some(parts) = self.exiting.get(&element) else {
            return false;
        };
        let mut canceled = false;
        for (part, completion) in parts {
            canceled |= scene.cancel_exit(*part);
            canceled |= completion.cancel();
        }
        self.reap(scene);
        canceled
    }

    /// Stop observing. In-flight exits are retired and their children
    /// detached.
    pub fn disconnect(&mut self, scene: &mut Scene) {
        let exiting = std::mem::take(&mut self.exiting);
        for (element, parts) in exiting {
            for (part, _) in &parts {
                if *part != element {
                    scene.cancel_exit(*part);
                }
            }
            self.finalize(scene, element, &parts);
        }
        if let Some(observer) = self.observer.take() {
            scene.tree_mut().disconnect(observer);
        }
        self.known.clear();
        debug!(container = %self.container, "group disconnected");
    }

    fn intercept_removal(
        &mut self,
        scene: &mut Scene,
        element: ElementId,
        record: &MutationRecord,
        added: &[ElementId],
    ) -> bool {
        if self.exiting.contains_key(&element) {
            trace!(%element, "removal ignored: already exiting");
            return false;
        }
        let tree = scene.tree();
        if !tree.contains(element) {
            // Destroyed along with its subtree.
            self.known.remove(&element);
            if let Some(ctx) = &self.presence {
                ctx.unregister(element);
                ctx.prune(|id| tree.contains(id));
            }
            return false;
        }
        if tree.parent(element).is_some() {
            // Moved, or put back by the host within the same batch.
            return false;
        }
        if added.contains(&element) {
            // Added and removed again before it was ever processed.
            self.known.remove(&element);
            return false;
        }

        let plan = self.exit_plan(tree, element);
        if plan.is_empty() {
            self.known.remove(&element);
            return false;
        }

        let reference = restore_reference(
            tree,
            self.container,
            record.previous_sibling,
            record.next_sibling,
        );
        if let Err(err) = scene
            .tree_mut()
            .insert_before(self.container, element, reference)
        {
            warn!(%element, %err, "could not restore removed child");
            self.known.remove(&element);
            return false;
        }

        let parts: ExitParts = plan
            .into_iter()
            .map(|(part, source)| {
                let completion = match source {
                    ExitSource::Descriptor(descriptor) => descriptor.play_exit(scene),
                    ExitSource::Params(params) => scene.start_exit(part, &params),
                };
                (part, completion)
            })
            .collect();
        debug!(%element, parts = parts.len(), "removed child exiting");
        self.known.remove(&element);
        self.exiting.insert(element, parts);
        true
    }

    /// Exit animations for a removed child: its own, or failing that those of
    /// its direct children.
    fn exit_plan(&self, tree: &ElementTree, element: ElementId) -> Vec<(ElementId, ExitSource)> {
        if let Some(source) = self.exit_source(element) {
            return vec![(element, source)];
        }
        let Some(ctx) = &self.presence else {
            return Vec::new();
        };
        tree.children(element)
            .iter()
            .filter_map(|&child| {
                ctx.descriptor(child)
                    .filter(ElementDescriptor::has_exit)
                    .map(|d| (child, ExitSource::Descriptor(d)))
            })
            .collect()
    }

    fn exit_source(&self, element: ElementId) -> Option<ExitSource> {
        let registered = self
            .presence
            .as_ref()
            .and_then(|ctx| ctx.descriptor(element))
            .filter(ElementDescriptor::has_exit);
        match registered {
            Some(descriptor) => Some(ExitSource::Descriptor(descriptor)),
            None => self.options.exit.clone().map(ExitSource::Params),
        }
    }

    fn enter_batch(&mut self, scene: &mut Scene, added: Vec<ElementId>) -> Vec<ElementId> {
        let mut batch: Vec<ElementId> = Vec::new();
        let mut reclaimed: Vec<ElementId> = Vec::new();
        for element in added {
            if batch.contains(&element) || scene.tree().parent(element) != Some(self.container) {
                continue;
            }
            if self.exiting.contains_key(&element) {
                self.reclaim(scene, element);
                reclaimed.push(element);
            } else if self.known.contains(&element) {
                continue;
            }
            batch.push(element);
        }
        let tree = scene.tree();
        batch.sort_by_key(|el| tree.index_of(self.container, *el));
        self.start_entrances(scene, &batch, &reclaimed);
        batch
    }

    /// Take back a child the host added again while it was exiting.
    fn reclaim(&mut self, scene: &mut Scene, element: ElementId) {
        let Some(parts) = self.exiting.remove(&element) else {
            return;
        };
        for (part, completion) in &parts {
            scene.cancel_exit(*part);
            completion.cancel();
        }
        scene.push_event(PresenceEvent::Reclaimed { element });
        debug!(%element, "exiting child reclaimed");
    }

    /// Enter `batch` with staggered delays. Reclaimed children keep their
    /// current values and skip `initial`.
    fn start_entrances(&mut self, scene: &mut Scene, batch: &[ElementId], reclaimed: &[ElementId]) {
        let plan = StaggerPlan::new(self.options.stagger.clone(), self.options.direction);
        let total = batch.len();
        for (index, &element) in batch.iter().enumerate() {
            self.known.insert(element);
            if let Some(initial) = &self.options.initial {
                if !reclaimed.contains(&element) {
                    scene.snap(element, initial);
                }
            }
            if let Some(enter) = &self.options.enter {
                let delay_ms = enter.delay_ms + plan.delay_for(index, total);
                scene.start_enter(element, &enter.clone().with_delay(delay_ms));
            }
        }
        if total > 0 {
            debug!(container = %self.container, total, "children entering");
        }
    }

    fn reap(&mut self, scene: &mut Scene) -> Vec<ElementId> {
        let settled: Vec<ElementId> = self
            .exiting
            .iter()
            .filter(|(_, parts)| parts.iter().all(|(_, c)| !c.is_pending()))
            .map(|(element, _)| *element)
            .collect();

        let mut finalized = Vec::new();
        for element in settled {
            let Some(parts) = self.exiting.remove(&element) else {
                continue;
            };
            let outcomes: Vec<Outcome> = parts.iter().filter_map(|(_, c)| c.outcome()).collect();
            if outcomes.iter().any(Outcome::is_canceled) {
                debug!(%element, "group exit canceled, child kept");
                if scene.tree().parent(element) == Some(self.container) {
                    self.known.insert(element);
                }
                continue;
            }
            for outcome in &outcomes {
                if let Outcome::Failed { reason } = outcome {
                    warn!(%element, %reason, "exit failed, finalizing anyway");
                }
            }
            self.finalize(scene, element, &parts);
            finalized.push(element);
        }
        finalized
    }

    fn finalize(&mut self, scene: &mut Scene, element: ElementId, parts: &[(ElementId, Completion)]) {
        if let Some(ctx) = &self.presence {
            ctx.unregister(element);
            for (part, _) in parts {
                ctx.unregister(*part);
            }
        }
        if let Some(observer) = self.observer {
            scene.tree_mut().set_observer_paused(observer, true);
        }
        scene.finalize(element);
        if let Some(observer) = self.observer {
            scene.tree_mut().set_observer_paused(observer, false);
        }
    }
}

/// Reference node for putting a removed child back where it was.
fn restore_reference(
    tree: &ElementTree,
    container: ElementId,
    previous: Option<ElementId>,
    next: Option<ElementId>,
) -> Option<ElementId> {
    let is_child = |id: ElementId| tree.parent(id) == Some(container);
    if let Some(next) = next.filter(|n| is_child(*n)) {
        return Some(next);
    }
    match previous {
        Some(previous) if is_child(previous) => tree
            .index_of(container, previous)
            .and_then(|i| tree.children(container).get(i + 1).copied()),
        Some(_) => None,
        None => tree.children(container).first().copied(),
    }
}
