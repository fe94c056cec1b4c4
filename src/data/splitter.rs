// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles caption records and splits them into training and
// validation sets.
//
// The split is by IMAGE, not by caption: all variants of one
// image land on the same side. Splitting per caption would let
// the model see an image during training and be "validated" on
// a paraphrase of the same image.
//
// A fixed seed makes the split reproducible, which matters
// because the vocabulary and checkpoints of one run must be
// evaluated against the same held-out images.
//
// Reference: rand crate documentation (SliceRandom, StdRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::caption_record::CaptionRecord;

/// Shuffle `records` with `seed` and split into (train, validation).
///
/// `train_fraction` is clamped to [0, 1].
pub fn split_records(
    mut records:    Vec<CaptionRecord>,
    train_fraction: f64,
    seed:           u64,
) -> (Vec<CaptionRecord>, Vec<CaptionRecord>) {
    let mut rng = StdRng::seed_from_u64(seed);
    records.shuffle(&mut rng);

    let total    = records.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).round() as usize;
    let val      = records.split_off(split_at.min(total));

    tracing::debug!(
        "Image split: {} training, {} validation",
        records.len(),
        val.len()
    );

    (records, val)
}
