//! Update ordering verification.
//!
//! The operator updates a pool in batches of at most `maxUnavailable` nodes, taking nodes in
//! their sorted order. Nodes of the same batch are disrupted concurrently, so their relative
//! order carries no meaning. Nodes of different batches must never be inverted.

/// The reason an observed update order does not match the expected one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderingMismatch {
    /// A batch size of zero can never be satisfied.
    InvalidBatchSize,
    /// The two sequences hold a different number of nodes.
    LengthMismatch { expected: usize, observed: usize },
    /// A batch of the observed order differs from the expected batch at the same position.
    BatchMismatch { index: usize, expected: Vec<String>, observed: Vec<String> },
}

impl std::fmt::Display for OrderingMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBatchSize => write!(f, "batch size must be at least 1"),
            Self::LengthMismatch { expected, observed } => write!(f, "expected {} nodes to be updated, observed {}", expected, observed),
            Self::BatchMismatch { index, expected, observed } => write!(
                f,
                "batch {} expected to update [{}], observed [{}]",
                index,
                expected.join(", "),
                observed.join(", ")
            ),
        }
    }
}

/// Verify that `observed` respects the batching of `expected` for the given batch size.
pub fn verify_order<E, O>(expected: &[E], observed: &[O], batch_size: usize) -> Result<(), OrderingMismatch>
where
    E: AsRef<str>,
    O: AsRef<str>,
{
    if batch_size == 0 {
        return Err(OrderingMismatch::InvalidBatchSize);
    }
    if expected.len() != observed.len() {
        return Err(OrderingMismatch::LengthMismatch {
            expected: expected.len(),
            observed: observed.len(),
        });
    }
    for (index, (exp, obs)) in expected.chunks(batch_size).zip(observed.chunks(batch_size)).enumerate() {
        // Compared as sorted multisets, a batch is unordered internally.
        let mut exp_names: Vec<&str> = exp.iter().map(|name| name.as_ref()).collect();
        let mut obs_names: Vec<&str> = obs.iter().map(|name| name.as_ref()).collect();
        exp_names.sort_unstable();
        obs_names.sort_unstable();
        if exp_names != obs_names {
            return Err(OrderingMismatch::BatchMismatch {
                index,
                expected: exp.iter().map(|name| name.as_ref().to_string()).collect(),
                observed: obs.iter().map(|name| name.as_ref().to_string()).collect(),
            });
        }
    }
    Ok(())
}

/// Check that `observed` respects the batching of `expected` for the given batch size.
///
/// With a batch size of 1 this is element-wise equality.
pub fn check_order<E, O>(expected: &[E], observed: &[O], batch_size: usize) -> bool
where
    E: AsRef<str>,
    O: AsRef<str>,
{
    verify_order(expected, observed, batch_size).is_ok()
}
