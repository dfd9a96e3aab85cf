use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// True when fewer than two rows forced train and test to be the same rows.
    pub degenerate: bool,
}

/// Seeded shuffle split: the first `ceil(test_fraction * n)` shuffled rows
/// form the test set, the rest train. With `n < 2` both sets are all rows.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Split {
    if n < 2 {
        let all: Vec<usize> = (0..n).collect();
        return Split {
            train: all.clone(),
            test: all,
            degenerate: true,
        };
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n - 1);
    let train = order.split_off(n_test);

    Split {
        train,
        test: order,
        degenerate: false,
    }
}
