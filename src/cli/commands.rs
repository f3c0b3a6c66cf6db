// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::predict_use_case::PredictRequest;
use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::BatcherConfig;
use crate::data::windower::WindowConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the autoencoder on a directory of .json recordings
    Train(TrainArgs),

    /// Reconstruct the beats of one recording with a trained checkpoint
    Predict(PredictArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory tree containing .json recordings
    #[arg(long, default_value = "data/recordings")]
    pub data_dir: String,

    /// Directory for checkpoints, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Lanes per batch (one window from each)
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Beats per window, excluding the overlap
    #[arg(long, default_value_t = 10)]
    pub n_frames: usize,

    /// Lookback beats shared with the next window
    #[arg(long, default_value_t = 5)]
    pub overlap: usize,

    /// Beat length reduction of the conv stack (power of two)
    #[arg(long, default_value_t = 8)]
    pub reduction_ratio: usize,

    /// Hidden size of every GRU
    #[arg(long, default_value_t = 128)]
    pub hidden: usize,

    /// Total optimisation steps
    #[arg(long, default_value_t = 10_000)]
    pub n_iter: usize,

    /// Save a checkpoint every this many steps
    #[arg(long, default_value_t = 500)]
    pub save_every: usize,

    /// Print progress every this many steps
    #[arg(long, default_value_t = 50)]
    pub log_every: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Learning rate reached at the last step (power decay from --lr)
    #[arg(long)]
    pub lr_end: Option<f64>,

    /// L2 penalty applied by the optimiser
    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f64,

    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    /// Skip recordings shorter than this many samples
    #[arg(long)]
    pub file_min_len: Option<usize>,

    /// Randomly crop recordings to at most this many samples
    #[arg(long)]
    pub file_max_len: Option<usize>,

    /// Keep only these event columns, in this order (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub required_diseases: Vec<String>,

    /// Train on the delta-coded signal
    #[arg(long)]
    pub delta: bool,

    /// Feed zeros to the decoders instead of the shifted inputs
    #[arg(long)]
    pub no_true_inputs: bool,

    /// Consecutive empty recordings tolerated on a lane before giving up
    #[arg(long, default_value_t = 200)]
    pub max_attempts: usize,

    /// Consecutive empty recordings on a lane before a warning is logged
    #[arg(long, default_value_t = 190)]
    pub warn_attempts: usize,

    /// Fewest parts kept from a bundle file
    #[arg(long, default_value_t = 10)]
    pub bundle_min: usize,

    /// Exclusive upper bound on parts kept from a bundle file
    #[arg(long, default_value_t = 20)]
    pub bundle_max: usize,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Batches prepared ahead on a background thread (0 = off)
    #[arg(long, default_value_t = 0)]
    pub prefetch: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let window = WindowConfig {
            n_frames:        a.n_frames,
            overlap:         a.overlap,
            reduction_ratio: a.reduction_ratio,
            want_events:     !a.required_diseases.is_empty(),
            ..WindowConfig::default()
        };
        let batcher = BatcherConfig {
            batch_size:        a.batch_size,
            window,
            file_min_len:      a.file_min_len,
            file_max_len:      a.file_max_len,
            required_diseases: a.required_diseases,
            max_attempts:      a.max_attempts,
            warn_attempts:     a.warn_attempts,
            bundle_min:        a.bundle_min,
            bundle_max:        a.bundle_max,
            seed:              a.seed,
        };
        TrainConfig {
            data_dir:        a.data_dir,
            checkpoint_dir:  a.checkpoint_dir,
            batcher,
            n_channels:      None,
            hidden:          a.hidden,
            dropout:         a.dropout,
            use_true_inputs: !a.no_true_inputs,
            use_delta:       a.delta,
            n_iter:          a.n_iter,
            save_every:      a.save_every,
            log_every:       a.log_every,
            lr:              a.lr,
            lr_end:          a.lr_end,
            weight_decay:    a.weight_decay,
            prefetch:        a.prefetch,
        }
        .with_signal(a.delta)
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Recording to reconstruct (.json)
    #[arg(long)]
    pub input: PathBuf,

    /// Where to write the reconstruction (.json)
    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Checkpoint step to load (default: latest)
    #[arg(long)]
    pub step: Option<usize>,

    /// Split the recording into this many overlapping chunks (0 = off)
    #[arg(long, default_value_t = 0)]
    pub n_chunks: usize,

    /// Samples shared by neighbouring chunks
    #[arg(long, default_value_t = 700)]
    pub chunk_overlap: usize,

    /// Windows per inference batch
    #[arg(long, default_value_t = 16)]
    pub lanes: usize,
}

impl From<PredictArgs> for PredictRequest {
    fn from(a: PredictArgs) -> Self {
        PredictRequest {
            input:          a.input,
            output:         a.output,
            checkpoint_dir: a.checkpoint_dir,
            step:           a.step,
            n_chunks:       a.n_chunks,
            chunk_overlap:  a.chunk_overlap,
            lanes:          a.lanes,
        }
    }
}
