// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Teacher-forced train + validation loop using Burn's
// DataLoader and Adam.
//
//   - Training runs on an Autodiff backend for gradients
//   - model.valid() returns the model on the inner backend,
//     with dropout disabled; the validation batcher uses it too
//   - The dataset's EpochCounter is advanced before every epoch
//     so RandomPerEpoch draws a fresh caption variant
//   - Token accuracy counts only non-<pad> targets
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::CaptionBatcher, dataset::CaptionDataset, vocabulary::PAD_ID};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::{CaptioningModel, CaptioningModelConfig};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub fn run_training(
    cfg:           &TrainConfig,
    model_cfg:     &CaptioningModelConfig,
    train_dataset: CaptionDataset,
    val_dataset:   CaptionDataset,
    ckpt_manager:  &CheckpointManager,
) -> Result<Vec<EpochMetrics>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<MyBackend>(cfg, model_cfg, train_dataset, val_dataset, ckpt_manager, device)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    model_cfg:     &CaptioningModelConfig,
    train_dataset: CaptionDataset,
    val_dataset:   CaptionDataset,
    ckpt_manager:  &CheckpointManager,
    device:        B::Device,
) -> Result<Vec<EpochMetrics>> {

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: CaptioningModel<B> = model_cfg.init(&device)?;
    tracing::info!(
        "Model ready: {} layers, d_model={}, vocab={}",
        model_cfg.num_layers, model_cfg.d_model, model_cfg.vocab_size
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    let epoch_counter = train_dataset.epoch_counter();
    let metrics       = MetricsLogger::new(ckpt_manager.dir())?;
    ckpt_manager.clear_best()?;

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(CaptionBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    // Inner backend: no autodiff overhead during validation
    let val_loader = DataLoaderBuilder::new(CaptionBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let mut history       = Vec::with_capacity(cfg.epochs);
    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        epoch_counter.set(epoch);

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(
                batch.features,
                batch.inputs,
                batch.targets,
                Some(batch.input_padding),
            )?;

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum   = 0.0f64;
        let mut val_batches    = 0usize;
        let mut correct_tokens = 0i64;
        let mut total_tokens   = 0i64;

        for batch in val_loader.iter() {
            let (loss, logits) = model_valid.forward_loss(
                batch.features,
                batch.inputs,
                batch.targets.clone(),
                Some(batch.input_padding),
            )?;
            val_loss_sum += loss.into_scalar().elem::<f64>();
            val_batches  += 1;

            // argmax(2) keeps the reduced dim: [t, batch, 1] → [t, batch]
            let [t, n, _] = logits.dims();
            let predicted = logits.argmax(2).reshape([t, n]);
            let real      = batch.targets.clone().equal_elem(PAD_ID as i32).bool_not().int();

            correct_tokens += predicted
                .equal(batch.targets)
                .int()
                .mul(real.clone())
                .sum()
                .into_scalar()
                .elem::<i64>();
            total_tokens += real.sum().into_scalar().elem::<i64>();
        }

        let avg_val_loss = if val_batches  > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let token_acc    = if total_tokens > 0 { correct_tokens as f64 / total_tokens as f64 } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | token_acc={:.1}%",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss, token_acc * 100.0,
        );

        let row = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss, token_acc);
        metrics.log(&row)?;

        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);

        if row.is_improvement(best_val_loss) {
            best_val_loss = row.val_loss;
            ckpt_manager.mark_best(epoch)?;
            tracing::info!("New best val_loss={:.4} at epoch {}", best_val_loss, epoch);
        }
        history.push(row);
    }

    tracing::info!("Training complete!");
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use burn::backend::{Autodiff, NdArray};

    use crate::data::sequence::SequenceEncoder;
    use crate::data::tokenizer::WhitespaceTokenizer;
    use crate::data::vocabulary::VocabularyBuilder;
    use crate::domain::caption_record::{CaptionPolicy, CaptionRecord};
    use crate::infra::feature_store::PrecomputedFeatures;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_two_epochs_write_metrics_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            CaptionRecord::new("img1", vec!["a dog runs".into(), "dog runs".into()]).unwrap(),
            CaptionRecord::new("img2", vec!["a cat sits".into()]).unwrap(),
            CaptionRecord::new("img3", vec!["a cat runs".into()]).unwrap(),
        ];
        let features = PrecomputedFeatures::from_map(HashMap::from([
            ("img1".to_string(), vec![1.0, 0.0, 0.0, 0.5]),
            ("img2".to_string(), vec![0.0, 1.0, 0.0, 0.5]),
            ("img3".to_string(), vec![0.0, 0.0, 1.0, 0.5]),
        ]))
        .unwrap();

        let tok     = WhitespaceTokenizer::new();
        let vocab   = VocabularyBuilder::new(&tok)
            .build(records.iter().flat_map(|r| r.captions().iter().map(String::as_str)))
            .unwrap();
        let encoder = SequenceEncoder::new(6).unwrap();

        let train = CaptionDataset::build(
            &records[..2], &vocab, &tok, &encoder, &features, CaptionPolicy::RandomPerEpoch, 7,
        ).unwrap();
        let val = CaptionDataset::build(
            &records[2..], &vocab, &tok, &encoder, &features, CaptionPolicy::FirstOnly, 7,
        ).unwrap();

        let cfg = TrainConfig {
            checkpoint_dir: dir.path().display().to_string(),
            batch_size:     2,
            epochs:         2,
            lr:             1e-3,
            ..TrainConfig::default()
        };
        let model_cfg = CaptioningModelConfig::new(4, vocab.len())
            .with_d_model(8)
            .with_n_head(2)
            .with_num_layers(1)
            .with_d_ff(16)
            .with_dropout(0.0)
            .with_max_seq_length(6);
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        // Leftovers from an earlier run in the same directory
        ckpt.mark_best(9).unwrap();
        std::fs::write(
            dir.path().join("metrics.csv"),
            "epoch,train_loss,val_loss,token_acc\n1,9.0,9.0,0.0\n2,8.0,8.0,0.0\n3,7.0,7.0,0.0\n",
        ).unwrap();

        let history = train_loop::<TestBackend>(
            &cfg, &model_cfg, train, val, &ckpt, Default::default(),
        ).unwrap();

        assert_eq!(history.len(), 2);
        for row in &history {
            assert!(row.train_loss.is_finite());
            assert!(row.val_loss.is_finite());
            assert!((0.0..=1.0).contains(&row.token_acc));
        }
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let best = if history[1].val_loss < history[0].val_loss { 2 } else { 1 };
        assert_eq!(ckpt.best_epoch().unwrap(), best);

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }
}
