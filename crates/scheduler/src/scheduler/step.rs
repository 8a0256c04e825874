//! Resumable step sources: the unit of cooperative work.
//!
//! A job body is a sequence of steps. The scheduler advances a source one step
//! at a time and only cares whether a step happened; the value a step yields is
//! ignored. Once a source reports no further steps it can be restarted, which
//! begins a fresh traversal of the same underlying sequence.

use std::fmt;

/// Error raised by a job body while producing a step.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Error returned by [`StepSource`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// `restart` was called before the current traversal reported exhaustion.
    #[error("restart requested while a traversal is still in progress")]
    RestartInProgress,
    #[error(transparent)]
    Job(#[from] JobError),
}

/// A lazily evaluated, restartable sequence of steps.
pub trait StepSource {
    /// Run the next step. Returns `false` once the sequence is exhausted.
    fn advance(&mut self) -> Result<bool, StepError>;

    /// Begin a new traversal from the first step.
    ///
    /// Only valid after `advance` has returned `false`; otherwise returns
    /// [`StepError::RestartInProgress`] and leaves the cursor where it was.
    fn restart(&mut self) -> Result<(), StepError>;

    /// Whether the last `advance` reported the end of the sequence.
    fn is_exhausted(&self) -> bool;
}

impl<S: StepSource + ?Sized> StepSource for Box<S> {
    fn advance(&mut self) -> Result<bool, StepError> {
        (**self).advance()
    }

    fn restart(&mut self) -> Result<(), StepError> {
        (**self).restart()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

// ── Sequences ───────────────────────────────────────────────────────

/// Something that can hand out fresh traversals of the same step sequence.
pub trait StepSequence {
    type Iter: Iterator<Item = Result<bool, JobError>>;

    fn traverse(&mut self) -> Self::Iter;
}

impl<F, I> StepSequence for F
where
    F: FnMut() -> I,
    I: IntoIterator<Item = Result<bool, JobError>>,
{
    type Iter = I::IntoIter;

    fn traverse(&mut self) -> Self::Iter {
        self().into_iter()
    }
}

/// Adapter for sequences whose steps cannot fail.
pub struct Infallible<G>(G);

impl<G, J> StepSequence for Infallible<G>
where
    G: FnMut() -> J,
    J: IntoIterator<Item = bool>,
{
    type Iter = std::iter::Map<J::IntoIter, fn(bool) -> Result<bool, JobError>>;

    fn traverse(&mut self) -> Self::Iter {
        (self.0)().into_iter().map(Ok as fn(bool) -> Result<bool, JobError>)
    }
}

/// Step source over a [`StepSequence`], holding the cursor of the current traversal.
pub struct Resumable<S: StepSequence> {
    sequence: S,
    /// `None` once the current traversal is exhausted.
    cursor: Option<S::Iter>,
}

impl<S: StepSequence> Resumable<S> {
    pub fn new(mut sequence: S) -> Self {
        let cursor = Some(sequence.traverse());
        Self { sequence, cursor }
    }
}

impl<G, J> Resumable<Infallible<G>>
where
    G: FnMut() -> J,
    J: IntoIterator<Item = bool>,
{
    /// Build a source from a factory of plain `bool` iterators.
    pub fn infallible(factory: G) -> Self {
        Self::new(Infallible(factory))
    }
}

impl<S: StepSequence> StepSource for Resumable<S> {
    fn advance(&mut self) -> Result<bool, StepError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(false);
        };
        match cursor.next() {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e.into()),
            None => {
                self.cursor = None;
                Ok(false)
            }
        }
    }

    fn restart(&mut self) -> Result<(), StepError> {
        if self.cursor.is_some() {
            return Err(StepError::RestartInProgress);
        }
        self.cursor = Some(self.sequence.traverse());
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }
}

impl<S: StepSequence> fmt::Debug for Resumable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resumable")
            .field("exhausted", &self.cursor.is_none())
            .finish()
    }
}

// ── Step lists ──────────────────────────────────────────────────────

type StepFn = Box<dyn FnMut() -> Result<(), JobError>>;

/// A job written as an ordered list of discrete step functions.
#[derive(Default)]
pub struct StepList {
    steps: Vec<StepFn>,
    next: usize,
    exhausted: bool,
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step (builder style).
    pub fn step(mut self, f: impl FnMut() -> Result<(), JobError> + 'static) -> Self {
        self.push(f);
        self
    }

    pub fn push(&mut self, f: impl FnMut() -> Result<(), JobError> + 'static) {
        self.steps.push(Box::new(f));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the step the next `advance` will run.
    pub fn position(&self) -> usize {
        self.next
    }
}

impl StepSource for StepList {
    fn advance(&mut self) -> Result<bool, StepError> {
        let Some(step) = self.steps.get_mut(self.next) else {
            self.exhausted = true;
            return Ok(false);
        };
        // A failed step is not consumed.
        step()?;
        self.next += 1;
        Ok(true)
    }

    fn restart(&mut self) -> Result<(), StepError> {
        if !self.exhausted {
            return Err(StepError::RestartInProgress);
        }
        self.next = 0;
        self.exhausted = false;
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl fmt::Debug for StepList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepList")
            .field("len", &self.steps.len())
            .field("next", &self.next)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn drain(source: &mut impl StepSource) -> usize {
        let mut n = 0;
        while source.advance().unwrap() {
            n += 1;
        }
        n
    }

    #[test]
    fn resumable_counts_steps_then_exhausts() {
        let mut src = Resumable::infallible(|| vec![true, false, true]);
        assert!(!src.is_exhausted());
        // Payload is ignored: a `false` element is still a step.
        assert_eq!(drain(&mut src), 3);
        assert!(src.is_exhausted());
        assert!(!src.advance().unwrap());
    }

    #[test]
    fn resumable_restart_begins_new_traversal() {
        let traversals = Rc::new(Cell::new(0));
        let t = traversals.clone();
        let mut src = Resumable::infallible(move || {
            t.set(t.get() + 1);
            std::iter::repeat(true).take(2)
        });
        assert_eq!(traversals.get(), 1);

        assert_eq!(drain(&mut src), 2);
        src.restart().unwrap();
        assert_eq!(traversals.get(), 2);
        assert!(!src.is_exhausted());
        assert_eq!(drain(&mut src), 2);

        src.restart().unwrap();
        src.advance().unwrap();
        assert_eq!(traversals.get(), 3);
    }

    #[test]
    fn resumable_rejects_restart_mid_traversal() {
        let mut src = Resumable::infallible(|| vec![true, true]);
        assert!(src.advance().unwrap());
        assert!(matches!(src.restart(), Err(StepError::RestartInProgress)));
        // Cursor untouched: one step left.
        assert!(src.advance().unwrap());
        assert!(!src.advance().unwrap());
    }

    #[test]
    fn resumable_propagates_job_errors() {
        let mut src = Resumable::new(|| {
            vec![Ok(true), Err(JobError::Failed("boom".into())), Ok(true)]
        });
        assert!(src.advance().unwrap());
        let err = src.advance().unwrap_err();
        assert!(matches!(err, StepError::Job(JobError::Failed(ref m)) if m == "boom"));
    }

    #[test]
    fn empty_sequence_exhausts_on_first_advance() {
        let mut src = Resumable::infallible(Vec::<bool>::new);
        assert!(!src.advance().unwrap());
        assert!(src.is_exhausted());
        src.restart().unwrap();
    }

    #[test]
    fn step_list_runs_each_step_once() {
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());
        let mut list = StepList::new()
            .step(move || {
                a.borrow_mut().push("load");
                Ok(())
            })
            .step(move || {
                b.borrow_mut().push("store");
                Ok(())
            });

        assert_eq!(list.len(), 2);
        assert_eq!(drain(&mut list), 2);
        assert_eq!(*log.borrow(), vec!["load", "store"]);

        list.restart().unwrap();
        assert_eq!(list.position(), 0);
        assert_eq!(drain(&mut list), 2);
        assert_eq!(log.borrow().len(), 4);
    }

    #[test]
    fn step_list_rejects_restart_before_exhaustion() {
        let mut list = StepList::new().step(|| Ok(()));
        assert!(matches!(list.restart(), Err(StepError::RestartInProgress)));
        assert!(list.advance().unwrap());
        assert!(matches!(list.restart(), Err(StepError::RestartInProgress)));
        assert!(!list.advance().unwrap());
        list.restart().unwrap();
    }

    #[test]
    fn step_list_failed_step_is_not_consumed() {
        let attempts = Rc::new(Cell::new(0));
        let a = attempts.clone();
        let mut list = StepList::new().step(move || {
            a.set(a.get() + 1);
            if a.get() == 1 {
                Err(JobError::Failed("first try".into()))
            } else {
                Ok(())
            }
        });

        assert!(list.advance().is_err());
        assert_eq!(list.position(), 0);
        assert!(list.advance().unwrap());
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn boxed_source_forwards() {
        let mut boxed: Box<dyn StepSource> = Box::new(Resumable::infallible(|| vec![true]));
        assert!(boxed.advance().unwrap());
        assert!(!boxed.advance().unwrap());
        assert!(boxed.is_exhausted());
        boxed.restart().unwrap();
    }
}
