// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-based training of the ECG autoencoder with Adam.
//
// There are no epochs to loop over: the RoundRobinBatcher
// produces an endless stream of batches and counts corpus
// passes itself. One iteration is
//
//   batch ─► forward_loss ─► backward ─► Adam step
//
// with a checkpoint every `save_every` steps and after the
// last one. A run with checkpoints already present resumes
// from the latest step.
//
// Key Burn 0.20 insight:
//   - Training uses MyBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on the inner backend,
//     which is what inference runs on (dropout disabled)
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::RoundRobinBatcher;
use crate::data::prefetch::{EpochBatch, Prefetcher};
use crate::domain::batch::{Batch, Frames};
use crate::domain::traits::{RecordingSource, SignalAutoencoder, StepHyperParams, StepSummary};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{MetricsLogger, StepMetrics};
use crate::ml::model::EcgAutoencoder;
use crate::ml::tensors::{self, ModelInput};

pub type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

// ─── AutoencoderRunner ────────────────────────────────────────────────────────
/// Owns the model, its optimiser and its checkpoints.
pub struct AutoencoderRunner<B: AutodiffBackend, O> {
    model:       EcgAutoencoder<B>,
    optim:       O,
    checkpoints: CheckpointManager,
    device:      B::Device,
    use_delta:   bool,
}

impl<B, O> AutoencoderRunner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<EcgAutoencoder<B>, B>,
{
    pub fn new(
        model:       EcgAutoencoder<B>,
        optim:       O,
        checkpoints: CheckpointManager,
        device:      B::Device,
        use_delta:   bool,
    ) -> Self {
        Self { model, optim, checkpoints, device, use_delta }
    }

    pub fn model(&self) -> &EcgAutoencoder<B> {
        &self.model
    }
}

impl<B, O> SignalAutoencoder for AutoencoderRunner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<EcgAutoencoder<B>, B>,
{
    fn train_step(&mut self, batch: &Batch, hyper: &StepHyperParams) -> Result<StepSummary> {
        let input = ModelInput::<B>::from_batch(
            batch,
            self.use_delta,
            self.model.reduction_ratio,
            &self.device,
        )?;
        let (loss, _) = self.model.forward_loss(input.beats, input.frame_steps, input.frames);

        let summary = StepSummary {
            loss:      loss.total.clone().into_scalar().elem::<f64>(),
            mse:       loss.mse.into_scalar().elem::<f64>(),
            latent_l2: loss.latent_l2.into_scalar().elem::<f64>(),
        };
        if !summary.loss.is_finite() {
            bail!("Loss diverged ({})", summary.loss);
        }

        // Backward pass + Adam update
        let grads = GradientsParams::from_grads(loss.total.backward(), &self.model);
        self.model = self.optim.step(hyper.learning_rate, self.model.clone(), grads);

        Ok(summary)
    }

    fn infer(&self, batch: &Batch) -> Result<Frames> {
        // valid() → EcgAutoencoder<B::InnerBackend>, no autodiff graph
        let model = self.model.valid();
        let input = ModelInput::<B::InnerBackend>::from_batch(
            batch,
            self.use_delta,
            model.reduction_ratio,
            &self.device,
        )?;
        let output = model.forward(input.beats, input.frame_steps, input.frames);
        tensors::to_frames(output.reconstruction)
    }

    fn save(&self, step: usize) -> Result<()> {
        self.checkpoints.save_model(&self.model, step)
    }

    fn load(&mut self, step: Option<usize>) -> Result<usize> {
        let (model, step) = self
            .checkpoints
            .load_model(self.model.clone(), step, &self.device)?;
        self.model = model;
        Ok(step)
    }
}

// ─── Batch stream ─────────────────────────────────────────────────────────────
/// The batcher, either driven inline or through a prefetch thread.
enum BatchStream<S: RecordingSource> {
    Inline(RoundRobinBatcher<S>),
    Prefetched(Prefetcher),
}

impl<S: RecordingSource> BatchStream<S> {
    fn next_batch(&mut self) -> Result<EpochBatch> {
        match self {
            BatchStream::Inline(b) => {
                let batch = b.get_batch()?;
                Ok(EpochBatch { batch, epoch: b.epoch() })
            }
            BatchStream::Prefetched(p) => match p.next_batch() {
                Some(item) => Ok(item?),
                None => bail!("Batch producer stopped"),
            },
        }
    }
}

/// What a finished run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub first_step: usize,
    pub last_step:  usize,
    pub last_loss:  f64,
    pub best_loss:  f64,
}

/// Build the model on the WGPU device and run the loop.
pub fn run_training<S>(
    cfg:          &mut TrainConfig,
    source:       S,
    ckpt_manager: CheckpointManager,
) -> Result<TrainReport>
where
    S: RecordingSource + Send + 'static,
{
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<MyBackend, S>(cfg, source, ckpt_manager, device)
}

/// Rebuild a trained autoencoder from `ckpt` for reconstruction.
/// Returns the runner and the step it was restored from.
pub fn load_autoencoder(
    cfg:        &TrainConfig,
    n_channels: usize,
    ckpt:       CheckpointManager,
    step:       Option<usize>,
) -> Result<(impl SignalAutoencoder, usize)> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    let model: EcgAutoencoder<MyBackend> = cfg.model_config(n_channels).init(&device);
    let mut runner = AutoencoderRunner::new(model, AdamConfig::new().init(), ckpt, device, cfg.use_delta);
    let step = runner.load(step)?;
    Ok((runner, step))
}

pub fn train_loop<B, S>(
    cfg:          &mut TrainConfig,
    source:       S,
    ckpt_manager: CheckpointManager,
    device:       B::Device,
) -> Result<TrainReport>
where
    B: AutodiffBackend,
    S: RecordingSource + Send + 'static,
{
    // ── Batch stream ──────────────────────────────────────────────────────────
    // A resumed run draws a fresh window stream.
    let resume = ckpt_manager.latest_step()?.unwrap_or(0);
    if resume > 0 {
        tracing::info!("Reseeding batcher for resume at step {}", resume);
    }
    let batcher = RoundRobinBatcher::new(source, cfg.batcher.reseeded(resume))?;
    let mut stream = if cfg.prefetch > 0 {
        BatchStream::Prefetched(Prefetcher::spawn(batcher, cfg.prefetch))
    } else {
        BatchStream::Inline(batcher)
    };

    // The first batch fixes the channel count of the model.
    let first_batch = stream.next_batch()?;
    let n_channels  = tensors::signal(&first_batch.batch, cfg.use_delta)?.n_channels();
    match cfg.n_channels {
        Some(n) if n != n_channels => {
            bail!("Corpus has {n_channels} channels but the run was configured for {n}")
        }
        _ => cfg.n_channels = Some(n_channels),
    }
    ckpt_manager.save_config(cfg)?;

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = cfg.model_config(n_channels);
    model_cfg.validate()?;
    let model: EcgAutoencoder<B> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: {} channels, hidden={}, {} conv layers",
        n_channels,
        cfg.hidden,
        model_cfg.n_layers()
    );

    // ── Adam optimiser (with L2 weight decay) ─────────────────────────────────
    let mut optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    if cfg.weight_decay > 0.0 {
        optim_cfg = optim_cfg.with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)));
    }
    let optim = optim_cfg.init();

    let mut runner = AutoencoderRunner::new(model, optim, ckpt_manager.clone(), device, cfg.use_delta);
    let start = match ckpt_manager.latest_step()? {
        Some(_) => {
            let step = runner.load(None)?;
            tracing::info!("Resuming from step {}", step);
            step
        }
        None => 0,
    };

    let metrics = MetricsLogger::new(ckpt_manager.dir())?;

    // ── Step loop ─────────────────────────────────────────────────────────────
    let mut pending   = Some(first_batch);
    let mut last_loss = f64::NAN;
    let mut best_loss = f64::INFINITY;

    for step in start + 1..=cfg.n_iter {
        let item = match pending.take() {
            Some(b) => b,
            None => stream.next_batch()?,
        };

        let lr      = cfg.lr_at(step);
        let summary = runner.train_step(&item.batch, &StepHyperParams { learning_rate: lr })?;
        let row     = StepMetrics::new(step, item.epoch, &summary, lr);
        metrics.log(&row)?;

        if row.is_improvement(best_loss) {
            best_loss = row.loss;
        }
        last_loss = row.loss;

        if step % cfg.log_every.max(1) == 0 {
            println!(
                "Step {:>6}/{} | loss={:.5} | mse={:.5} | latent_l2={:.5}",
                step, cfg.n_iter, summary.loss, summary.mse, summary.latent_l2,
            );
        }
        if cfg.save_every > 0 && step % cfg.save_every == 0 {
            runner.save(step)?;
            tracing::info!("Checkpoint saved for step {}", step);
        }
    }

    if start < cfg.n_iter && (cfg.save_every == 0 || cfg.n_iter % cfg.save_every != 0) {
        runner.save(cfg.n_iter)?;
        tracing::info!("Checkpoint saved for step {}", cfg.n_iter);
    }

    tracing::info!("Training complete!");
    Ok(TrainReport {
        first_step: start + 1,
        last_step:  cfg.n_iter,
        last_loss,
        best_loss,
    })
}
