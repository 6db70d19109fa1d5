//! Train/test splitting for model evaluation.

use crate::error::Result;
use crate::primitives::{Matrix, Vector};

/// Validates inputs and returns (n_train, n_test).
fn validate_split_inputs(x: &Matrix, y: &Vector, test_size: f32) -> Result<(usize, usize)> {
    if test_size <= 0.0 || test_size >= 1.0 {
        return Err(format!("test_size must be between 0 and 1, got {test_size}").into());
    }

    let (n_samples, _) = x.shape();
    if n_samples != y.len() {
        return Err(format!(
            "X and y must have same number of samples, got {} and {}",
            n_samples,
            y.len()
        )
        .into());
    }

    let n_test = (n_samples as f32 * test_size).round() as usize;
    let n_train = n_samples - n_test;
    if n_test == 0 || n_train == 0 {
        return Err(format!(
            "Split would result in empty train or test set (n_train={n_train}, n_test={n_test})"
        )
        .into());
    }

    Ok((n_train, n_test))
}

/// Shuffles sample indices, seeded when a random state is given.
fn shuffle_indices(n_samples: usize, random_state: Option<u64>) -> Vec<usize> {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    let mut indices: Vec<usize> = (0..n_samples).collect();
    if let Some(seed) = random_state {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
    } else {
        let mut rng = rand::thread_rng();
        indices.shuffle(&mut rng);
    }
    indices
}

fn extract_samples(x: &Matrix, y: &Vector, indices: &[usize]) -> (Matrix, Vector) {
    let (_, n_features) = x.shape();
    let mut data = Vec::with_capacity(indices.len() * n_features);
    let mut labels = Vec::with_capacity(indices.len());
    for &idx in indices {
        for col in 0..n_features {
            data.push(x.get(idx, col));
        }
        labels.push(y.as_slice()[idx]);
    }
    let subset = Matrix::from_vec(indices.len(), n_features, data)
        .unwrap_or_else(|_| Matrix::zeros(0, n_features));
    (subset, Vector::from_vec(labels))
}

/// Splits features and targets into shuffled train and test sets.
///
/// Returns `(x_train, x_test, y_train, y_test)`. A fixed `random_state`
/// reproduces the same split.
///
/// # Errors
///
/// Returns an error if `test_size` is outside (0, 1), the sample counts
/// disagree, or either side of the split would be empty.
#[allow(clippy::type_complexity)]
pub fn train_test_split(
    x: &Matrix,
    y: &Vector,
    test_size: f32,
    random_state: Option<u64>,
) -> Result<(Matrix, Matrix, Vector, Vector)> {
    let (n_train, _) = validate_split_inputs(x, y, test_size)?;
    let n_samples = x.shape().0;

    let indices = shuffle_indices(n_samples, random_state);
    let train_indices = &indices[..n_train];
    let test_indices = &indices[n_train..];

    let (x_train, y_train) = extract_samples(x, y, train_indices);
    let (x_test, y_test) = extract_samples(x, y, test_indices);

    Ok((x_train, x_test, y_train, y_test))
}
