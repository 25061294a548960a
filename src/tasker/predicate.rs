//! Decision strategies for whether a cycle should request a mutation.

use anyhow::Result;
use async_trait::async_trait;

/// Decides, once per cycle, whether to ask the automutator to act.
#[async_trait]
pub trait MutationPredicate: Send + Sync {
    /// `cycle` counts from 1. An error fails the cycle and triggers backoff.
    async fn should_mutate(&self, cycle: u64) -> Result<bool>;
}

/// Requests a mutation every cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysMutate;

#[async_trait]
impl MutationPredicate for AlwaysMutate {
    async fn should_mutate(&self, _cycle: u64) -> Result<bool> {
        Ok(true)
    }
}

/// Adapts a plain closure into a predicate.
pub struct FnPredicate<F>(F);

impl<F> FnPredicate<F>
where
    F: Fn(u64) -> Result<bool> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> MutationPredicate for FnPredicate<F>
where
    F: Fn(u64) -> Result<bool> + Send + Sync,
{
    async fn should_mutate(&self, cycle: u64) -> Result<bool> {
        (self.0)(cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_predicate_sees_the_cycle_number() {
        let every_other = FnPredicate::new(|cycle| Ok(cycle % 2 == 0));
        assert!(!every_other.should_mutate(1).await.unwrap());
        assert!(every_other.should_mutate(2).await.unwrap());
        assert!(AlwaysMutate.should_mutate(7).await.unwrap());
    }
}
