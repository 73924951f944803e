//! Per-frame animation tasks.
//!
//! A task is a resumable step function advanced once per frame with the
//! elapsed time. It is removed on the frame it reports [`Step::Done`], or
//! when cancelled. Tasks can be keyed to an entity so that a new animation
//! for the same entity replaces the running one instead of piling up.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tessera_grid::Point;
use tessera_types::EntityId;

/// What a step function wants after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run again next frame.
    Continue,
    /// Finished; remove the task.
    Done,
}

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

type StepFn = Box<dyn FnMut(Duration) -> Step + Send>;

struct Task {
    owner: Option<EntityId>,
    step: StepFn,
}

/// The set of running tasks.
#[derive(Default)]
pub struct Scheduler {
    tasks: BTreeMap<TaskId, Task>,
    owners: HashMap<EntityId, TaskId>,
    next_id: u64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.tasks.len())
            .field("owned", &self.owners.len())
            .finish()
    }
}

impl Scheduler {
    /// No tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `step` every frame until it returns [`Step::Done`].
    pub fn schedule<F>(&mut self, step: F) -> TaskId
    where
        F: FnMut(Duration) -> Step + Send + 'static,
    {
        self.insert(None, Box::new(step))
    }

    /// Like [`Scheduler::schedule`], but cancels any task already keyed
    /// to `entity` first.
    pub fn schedule_for<F>(&mut self, entity: EntityId, step: F) -> TaskId
    where
        F: FnMut(Duration) -> Step + Send + 'static,
    {
        self.cancel_for(&entity);
        let id = self.insert(Some(entity.clone()), Box::new(step));
        self.owners.insert(entity, id);
        id
    }

    /// Remove a task. Returns whether it was still running.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let Some(task) = self.tasks.remove(&id) else {
            return false;
        };
        self.release_owner(task.owner.as_ref(), id);
        true
    }

    /// Remove the task keyed to `entity`, if any.
    pub fn cancel_for(&mut self, entity: &EntityId) -> bool {
        self.owners
            .get(entity)
            .copied()
            .is_some_and(|id| self.cancel(id))
    }

    /// Whether `id` is still running.
    pub fn is_running(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Advance every task by `dt`, in scheduling order. Returns how many
    /// finished.
    pub fn advance(&mut self, dt: Duration) -> usize {
        let finished: Vec<TaskId> = self
            .tasks
            .iter_mut()
            .filter_map(|(id, task)| ((task.step)(dt) == Step::Done).then_some(*id))
            .collect();
        for id in &finished {
            self.cancel(*id);
        }
        finished.len()
    }

    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is running.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every task.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.owners.clear();
    }

    fn insert(&mut self, owner: Option<EntityId>, step: StepFn) -> TaskId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = TaskId(self.next_id);
        self.tasks.insert(id, Task { owner, step });
        id
    }

    fn release_owner(&mut self, owner: Option<&EntityId>, id: TaskId) {
        if let Some(owner) = owner.filter(|owner| self.owners.get(*owner) == Some(&id)) {
            self.owners.remove(owner);
        }
    }
}

/// Linear interpolation of a pixel position over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    from: Point,
    to: Point,
    duration: Duration,
    elapsed: Duration,
}

impl Tween {
    /// A tween that has not started yet.
    pub const fn new(from: Point, to: Point, duration: Duration) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: Duration::ZERO,
        }
    }

    /// Fraction completed, in `[0, 1]`. A zero duration is complete.
    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Current interpolated position.
    pub fn current(&self) -> Point {
        self.from.lerp(self.to, self.progress())
    }

    /// Whether the end position has been reached.
    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Move forward by `dt` and return the new position.
    pub fn advance(&mut self, dt: Duration) -> Point {
        self.elapsed = self.elapsed.saturating_add(dt).min(self.duration);
        self.current()
    }

    /// A step function that feeds each frame's position to `apply` and
    /// finishes with the end position.
    pub fn into_step<F>(mut self, mut apply: F) -> impl FnMut(Duration) -> Step + Send
    where
        F: FnMut(Point) + Send,
    {
        move |dt| {
            apply(self.advance(dt));
            if self.is_finished() {
                Step::Done
            } else {
                Step::Continue
            }
        }
    }
}
