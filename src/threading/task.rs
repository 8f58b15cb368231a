use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier of a submitted task. Ids are never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Scheduling priority. Higher priorities drain first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// The work a task performs.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work with an identity and a priority.
///
/// The work closure runs at most once; it is consumed by the first call to
/// [`Task::execute`].
pub struct Task {
    id: TaskId,
    priority: Priority,
    work: Option<Work>,
}

impl Task {
    /// Creates a task with a fresh, process-unique id.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_starfield::threading::{Priority, Task};
    ///
    /// let a = Task::new(Box::new(|| {}), Priority::High);
    /// let b = Task::new(Box::new(|| {}), Priority::Low);
    /// assert_ne!(a.id(), b.id());
    /// ```
    pub fn new(work: Work, priority: Priority) -> Self {
        Self {
            id: TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)),
            priority,
            work: Some(work),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_executed(&self) -> bool {
        self.work.is_none()
    }

    /// Runs the work. Returns `false` without doing anything if the task already ran.
    pub fn execute(&mut self) -> bool {
        match self.work.take() {
            Some(work) => {
                work();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("executed", &self.is_executed())
            .finish()
    }
}

/// Pending tasks ordered by priority, FIFO within a priority.
///
/// A new task is placed after the last queued task whose priority is greater than
/// or equal to its own, so `pop` always yields the oldest task of the highest
/// priority present.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self { tasks: VecDeque::new() }
    }

    /// Queues a task. Already executed tasks are refused and `false` is returned.
    pub fn insert(&mut self, task: Task) -> bool {
        if task.is_executed() {
            return false;
        }
        let at = self
            .tasks
            .iter()
            .position(|queued| queued.priority < task.priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(at, task);
        true
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|task| task.id == id)
    }

    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let at = self.tasks.iter().position(|task| task.id == id)?;
        self.tasks.remove(at)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
