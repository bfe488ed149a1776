// ============================================================
// Layer 4: Train/Validation Splitter
// ============================================================
// Shuffles sentence pairs and splits them into two sets:
//   - Training set:   used to update model weights
//   - Validation set: used to measure loss on unseen pairs
//
// Shuffling is driven by a seeded StdRng so a given seed always
// produces the same split. The same helper reorders the training
// pairs between epochs when epoch shuffling is enabled.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Deterministically shuffle `items` in place.
pub fn shuffle_seeded<T>(items: &mut [T], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
}

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` of 1.0 keeps everything for training.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    shuffle_seeded(&mut samples, seed);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Corpus split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}
