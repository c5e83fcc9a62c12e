/// A single latent cause switched on with a given activation value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activation {
    /// Global cause index in `0..H`.
    pub cause: usize,
    /// Activation value: 1.0 for binary models, ±1.0 for ternary,
    /// a configured discrete value for DSC.
    pub value: f64,
}

/// One discrete latent configuration: the bounded set of active causes.
///
/// Stateless value type, produced lazily per data point and never
/// mutated. The empty state (all causes off) is the configuration with
/// no activations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateState {
    activations: Vec<Activation>,
}

impl CandidateState {
    /// The all-causes-off state.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a state from activations, normalizing to ascending cause order.
    pub fn new(mut activations: Vec<Activation>) -> Self {
        activations.sort_by_key(|a| a.cause);
        Self { activations }
    }

    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    /// Number of simultaneously active causes.
    pub fn arity(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }

    /// True when `cause` is active in this state.
    pub fn contains(&self, cause: usize) -> bool {
        self.activations.iter().any(|a| a.cause == cause)
    }
}

/// Enumerates every subset of `candidates` with `1 ..= gamma` members.
///
/// Order is deterministic: by subset size, then lexicographically over
/// the positions in `candidates` — so when a budget later truncates the
/// expansion, small states over the best-ranked causes survive first.
pub fn enumerate_subsets(candidates: &[usize], gamma: usize) -> Vec<Vec<usize>> {
    let mut subsets = Vec::new();
    let gamma = gamma.min(candidates.len());

    for size in 1..=gamma {
        let mut picks = vec![0usize; size];
        combinations(candidates, &mut picks, 0, 0, size, &mut subsets);
    }

    subsets
}

fn combinations(
    candidates: &[usize],
    picks: &mut [usize],
    depth: usize,
    start: usize,
    size: usize,
    out: &mut Vec<Vec<usize>>,
) {
    if depth == size {
        out.push(picks.to_vec());
        return;
    }

    // Not enough remaining positions to fill the subset.
    let remaining = size - depth;
    for pos in start..=candidates.len().saturating_sub(remaining) {
        picks[depth] = candidates[pos];
        combinations(candidates, picks, depth + 1, pos + 1, size, out);
    }
}
