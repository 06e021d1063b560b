// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train-pass` and `eval-pass`,
// and all their configurable flags. Flags shared by both are
// grouped into flattened Args structs.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, ContextMode etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::eval_pass::EvalPassConfig;
use crate::application::pass::{BackendKind, LoaderConfig, StorePaths};
use crate::application::train_pass::TrainPassConfig;
use crate::config::{ContextMode, DatasetConfig, EvalConfig};
use crate::infra::feature_store::StoreDriver;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Iterate the training split once through the DataLoader
    TrainPass(TrainPassArgs),

    /// Iterate an evaluation split through the query and context views
    EvalPass(EvalPassArgs),
}

/// Dataset settings shared by both commands.
#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// Dataset tag used in log messages
    #[arg(long, default_value = "tvr")]
    pub dset_name: String,

    /// Context modalities, e.g. "video", "sub", "video_sub"
    #[arg(long, default_value = "video_sub")]
    pub ctx_mode: ContextMode,

    /// Keep at most this many query tokens
    #[arg(long, default_value_t = 30)]
    pub max_desc_len: usize,

    /// Keep at most this many clips before pooling
    #[arg(long, default_value_t = 100)]
    pub max_ctx_len: usize,

    /// Skip L2 normalisation of pooled video features
    #[arg(long = "no-norm-vfeat")]
    pub no_norm_vfeat: bool,

    /// Skip L2 normalisation of query and subtitle features
    #[arg(long = "no-norm-tfeat")]
    pub no_norm_tfeat: bool,

    /// Use only the leading fraction of the records, in (0, 1]
    #[arg(long, default_value_t = 1.0)]
    pub data_ratio: f64,
}

impl From<DatasetArgs> for DatasetConfig {
    fn from(a: DatasetArgs) -> Self {
        DatasetConfig {
            dset_name:       a.dset_name,
            ctx_mode:        a.ctx_mode,
            max_desc_len:    a.max_desc_len,
            max_ctx_len:     a.max_ctx_len,
            normalize_vfeat: !a.no_norm_vfeat,
            normalize_tfeat: !a.no_norm_tfeat,
            data_ratio:      a.data_ratio,
        }
    }
}

/// Feature store locations.
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Query token embeddings (.safetensors), keyed by desc_id
    #[arg(long)]
    pub query_store: String,

    /// Clip-level video features (.safetensors), keyed by vid_name
    #[arg(long)]
    pub video_store: Option<String>,

    /// Clip-level subtitle embeddings (.safetensors), keyed by vid_name
    #[arg(long)]
    pub sub_store: Option<String>,

    /// "core" reads each store into memory, "direct" reads per lookup
    #[arg(long, default_value = "core")]
    pub driver: StoreDriver,
}

impl From<StoreArgs> for StorePaths {
    fn from(a: StoreArgs) -> Self {
        StorePaths {
            query:  a.query_store,
            video:  a.video_store,
            sub:    a.sub_store,
            driver: a.driver,
        }
    }
}

/// DataLoader and device settings.
#[derive(Args, Debug)]
pub struct LoaderArgs {
    /// Examples per batch
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Shuffle seed; omit to keep dataset order
    #[arg(long)]
    pub seed: Option<u64>,

    /// DataLoader worker threads (0 = calling thread)
    #[arg(long, default_value_t = 0)]
    pub num_workers: usize,

    /// Wait for the device after every batch transfer
    #[arg(long)]
    pub blocking: bool,

    /// Tensor backend: "ndarray" (CPU) or "wgpu" (GPU)
    #[arg(long, default_value = "ndarray")]
    pub backend: BackendKind,
}

impl From<&LoaderArgs> for LoaderConfig {
    fn from(a: &LoaderArgs) -> Self {
        LoaderConfig {
            batch_size:   a.batch_size,
            shuffle_seed: a.seed,
            num_workers:  a.num_workers,
            blocking:     a.blocking,
        }
    }
}

/// All arguments for the `train-pass` command.
#[derive(Args, Debug)]
pub struct TrainPassArgs {
    /// Training annotations (JSON lines)
    #[arg(long)]
    pub train_path: PathBuf,

    /// Load dataset settings from this JSON file instead of the flags
    #[arg(long)]
    pub dataset_config: Option<PathBuf>,

    /// Write the effective dataset settings to this JSON file
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub stores: StoreArgs,

    #[command(flatten)]
    pub loader: LoaderArgs,
}

/// Convert CLI TrainPassArgs into the application-layer config.
/// The application layer never sees clap types.
impl From<TrainPassArgs> for TrainPassConfig {
    fn from(a: TrainPassArgs) -> Self {
        TrainPassConfig {
            loader:         LoaderConfig::from(&a.loader),
            backend:        a.loader.backend,
            dataset:        a.dataset.into(),
            dataset_config: a.dataset_config,
            save_config:    a.save_config,
            train_path:     a.train_path,
            stores:         a.stores.into(),
        }
    }
}

/// All arguments for the `eval-pass` command.
#[derive(Args, Debug)]
pub struct EvalPassArgs {
    /// Evaluation queries (JSON lines)
    #[arg(long)]
    pub data_path: PathBuf,

    /// Video index file: {split: {vid_name: [duration, index]}}
    #[arg(long)]
    pub video_index: PathBuf,

    /// Split to read from the video index
    #[arg(long, default_value = "val")]
    pub split: String,

    /// Attach ground-truth video names to query items
    #[arg(long)]
    pub load_gt_video: bool,

    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub stores: StoreArgs,

    #[command(flatten)]
    pub loader: LoaderArgs,
}

impl From<EvalPassArgs> for EvalPassConfig {
    fn from(a: EvalPassArgs) -> Self {
        EvalPassConfig {
            loader:  LoaderConfig::from(&a.loader),
            backend: a.loader.backend,
            eval: EvalConfig {
                dataset:         a.dataset.into(),
                eval_split_name: a.split,
                load_gt_video:   a.load_gt_video,
            },
            data_path:        a.data_path,
            video_index_path: a.video_index,
            stores:           a.stores.into(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_pass_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "moment-data", "train-pass",
            "--train-path", "train.jsonl",
            "--query-store", "q.safetensors",
            "--video-store", "v.safetensors",
            "--ctx-mode", "video",
            "--driver", "direct",
            "--data-ratio", "0.5",
            "--seed", "7",
        ])
        .unwrap();

        let Commands::TrainPass(args) = cli.command else {
            panic!("expected train-pass");
        };
        let cfg: TrainPassConfig = args.into();
        assert_eq!(cfg.dataset.ctx_mode, ContextMode::video_only());
        assert_eq!(cfg.dataset.data_ratio, 0.5);
        assert_eq!(cfg.stores.driver, StoreDriver::Direct);
        assert_eq!(cfg.loader.shuffle_seed, Some(7));
        assert_eq!(cfg.backend, BackendKind::NdArray);
    }

    #[test]
    fn test_normalisation_is_on_unless_opted_out() {
        let base = [
            "moment-data", "train-pass",
            "--train-path", "train.jsonl",
            "--query-store", "q.safetensors",
        ];

        let Commands::TrainPass(args) = Cli::try_parse_from(base).unwrap().command else {
            panic!("expected train-pass");
        };
        let cfg: TrainPassConfig = args.into();
        assert!(cfg.dataset.normalize_vfeat);
        assert!(cfg.dataset.normalize_tfeat);

        let opted_out = base.iter().copied().chain(["--no-norm-vfeat", "--no-norm-tfeat"]);
        let Commands::TrainPass(args) = Cli::try_parse_from(opted_out).unwrap().command else {
            panic!("expected train-pass");
        };
        let cfg: TrainPassConfig = args.into();
        assert!(!cfg.dataset.normalize_vfeat);
        assert!(!cfg.dataset.normalize_tfeat);
    }

    #[test]
    fn test_bad_ctx_mode_rejected_by_parser() {
        let result = Cli::try_parse_from([
            "moment-data", "eval-pass",
            "--data-path", "val.jsonl",
            "--video-index", "idx.json",
            "--query-store", "q.safetensors",
            "--ctx-mode", "video_audio",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_eval_pass_split_and_gt_flag() {
        let cli = Cli::try_parse_from([
            "moment-data", "eval-pass",
            "--data-path", "test.jsonl",
            "--video-index", "idx.json",
            "--query-store", "q.safetensors",
            "--split", "test",
            "--load-gt-video",
            "--backend", "wgpu",
        ])
        .unwrap();

        let Commands::EvalPass(args) = cli.command else {
            panic!("expected eval-pass");
        };
        let cfg: EvalPassConfig = args.into();
        assert_eq!(cfg.eval.eval_split_name, "test");
        assert!(cfg.eval.load_gt_video);
        assert_eq!(cfg.backend, BackendKind::Wgpu);
    }
}
