//! Batch optimizers: pure transforms applied to a snapshot before sending.

use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;

/// Collapses redundant or mutually-cancelling actions.
///
/// Implementations must be pure: the same input yields the same output and
/// the input slice is never modified. Returning an empty vector means every
/// action cancelled out and the batch is settled without a request.
pub trait ActionOptimizer<A, B>: Send + Sync {
    fn optimize(&self, actions: &[A]) -> Vec<B>;
}

impl<A, B, F> ActionOptimizer<A, B> for F
where
    F: Fn(&[A]) -> Vec<B> + Send + Sync,
{
    fn optimize(&self, actions: &[A]) -> Vec<B> {
        self(actions)
    }
}

/// Sends every action unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<A: Clone> ActionOptimizer<A, A> for Identity {
    fn optimize(&self, actions: &[A]) -> Vec<A> {
        actions.to_vec()
    }
}

/// Keyed last-write-wins with inverse cancellation.
///
/// Walking the batch in order, each action is matched against the surviving
/// action with the same key. If the two are inverses (activate then
/// deactivate), both are dropped. Otherwise the later one replaces the
/// earlier. Survivors are emitted in the order of their latest occurrence.
pub struct CoalesceByKey<A, K, KF, IF> {
    key: KF,
    is_inverse: IF,
    _marker: PhantomData<fn(&A) -> K>,
}

impl<A, K, KF, IF> CoalesceByKey<A, K, KF, IF>
where
    K: Eq + Hash,
    KF: Fn(&A) -> K,
    IF: Fn(&A, &A) -> bool,
{
    pub fn new(key: KF, is_inverse: IF) -> Self {
        Self { key, is_inverse, _marker: PhantomData }
    }
}

impl<A, K, KF> CoalesceByKey<A, K, KF, fn(&A, &A) -> bool>
where
    K: Eq + Hash,
    KF: Fn(&A) -> K,
{
    /// Deduplicate by key only; nothing cancels.
    pub fn last_write_wins(key: KF) -> Self {
        fn never<A>(_: &A, _: &A) -> bool {
            false
        }
        Self { key, is_inverse: never::<A>, _marker: PhantomData }
    }
}

impl<A, K, KF, IF> ActionOptimizer<A, A> for CoalesceByKey<A, K, KF, IF>
where
    A: Clone,
    K: Eq + Hash,
    KF: Fn(&A) -> K + Send + Sync,
    IF: Fn(&A, &A) -> bool + Send + Sync,
{
    fn optimize(&self, actions: &[A]) -> Vec<A> {
        // key -> index of the surviving action for that key
        let mut survivors: HashMap<K, usize> = HashMap::new();
        for (idx, action) in actions.iter().enumerate() {
            let key = (self.key)(action);
            match survivors.remove(&key) {
                Some(prev) if (self.is_inverse)(&actions[prev], action) => {}
                _ => {
                    survivors.insert(key, idx);
                }
            }
        }
        let mut kept: Vec<usize> = survivors.into_values().collect();
        kept.sort_unstable();
        kept.into_iter().map(|idx| actions[idx].clone()).collect()
    }
}
