// ============================================================
// Dataset Configuration
// ============================================================
// Everything a dataset needs to know at construction time, kept
// explicit. Serialisable so a run's settings can be stored next
// to its outputs and reloaded later.
//
//   ctx_mode         "video", "sub", "video_sub", "video_sub_tef" ...
//   max_desc_len     keep at most this many query tokens
//   max_ctx_len      keep at most this many clips before pooling
//   normalize_vfeat  L2-normalise pooled video features
//   normalize_tfeat  L2-normalise query and subtitle features
//   data_ratio       use only the first fraction of the records

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

// ─── ContextMode ──────────────────────────────────────────────────────────────
/// Which context modalities a run uses.
///
/// `tef` (temporal endpoint feature) is accepted for compatibility with
/// existing run configurations but produces no feature in this layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextMode {
    pub video: bool,
    pub sub:   bool,
    pub tef:   bool,
}

impl ContextMode {
    pub fn video_only() -> Self {
        Self { video: true, ..Self::default() }
    }

    pub fn video_sub() -> Self {
        Self { video: true, sub: true, tef: false }
    }
}

impl FromStr for ContextMode {
    type Err = DataError;

    /// Parse `_`-separated tokens, e.g. `"video_sub_tef"`.
    fn from_str(s: &str) -> Result<Self> {
        let mut mode = ContextMode::default();
        for token in s.split('_').filter(|t| !t.is_empty()) {
            match token {
                "video" => mode.video = true,
                "sub"   => mode.sub = true,
                "tef"   => mode.tef = true,
                other   => {
                    return Err(DataError::config(format!(
                        "unknown context mode token '{other}' in '{s}'"
                    )))
                }
            }
        }
        Ok(mode)
    }
}

impl fmt::Display for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = [(self.video, "video"), (self.sub, "sub"), (self.tef, "tef")]
            .into_iter()
            .filter_map(|(on, name)| on.then_some(name))
            .collect();
        f.write_str(&tokens.join("_"))
    }
}

impl TryFrom<String> for ContextMode {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ContextMode> for String {
    fn from(mode: ContextMode) -> Self {
        mode.to_string()
    }
}

// ─── EvalMode ─────────────────────────────────────────────────────────────────
/// Which evaluation view to iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    /// One item per query (needs batching/padding)
    Query,
    /// One item per distinct video of the split
    Context,
}

impl FromStr for EvalMode {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "query"   => Ok(EvalMode::Query),
            "context" => Ok(EvalMode::Context),
            other     => Err(DataError::config(format!(
                "invalid data mode '{other}' (expected 'context' or 'query')"
            ))),
        }
    }
}

// ─── DatasetConfig ────────────────────────────────────────────────────────────
/// Settings shared by the training and evaluation datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset tag, e.g. "tvr"; used only for logging
    pub dset_name:       String,
    pub ctx_mode:        ContextMode,
    pub max_desc_len:    usize,
    pub max_ctx_len:     usize,
    pub normalize_vfeat: bool,
    pub normalize_tfeat: bool,
    pub data_ratio:      f64,
}

impl DatasetConfig {
    /// Reject settings that can only come from a setup mistake.
    pub fn validate(&self) -> Result<()> {
        if !(self.data_ratio > 0.0 && self.data_ratio <= 1.0) {
            return Err(DataError::config(format!(
                "data_ratio must be in (0, 1], got {}",
                self.data_ratio
            )));
        }
        if self.max_desc_len == 0 {
            return Err(DataError::config("max_desc_len must be positive"));
        }
        if self.max_ctx_len == 0 {
            return Err(DataError::config("max_ctx_len must be positive"));
        }
        Ok(())
    }

    /// Load a config previously written with `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DataError::RecordIo {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = serde_json::from_str(&json).map_err(|source| DataError::RecordParse {
            path: path.to_path_buf(),
            line: source.line(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config as pretty-printed JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| DataError::RecordParse {
            path: path.to_path_buf(),
            line: 0,
            source,
        })?;
        std::fs::write(path, json).map_err(|source| DataError::RecordIo {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ─── EvalConfig ───────────────────────────────────────────────────────────────
/// Dataset settings plus the evaluation split to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(flatten)]
    pub dataset:         DatasetConfig,
    /// Split name looked up in the video index file, e.g. "val"
    pub eval_split_name: String,
    /// Attach ground-truth video names to query items
    #[serde(default)]
    pub load_gt_video:   bool,
}

impl EvalConfig {
    pub fn validate(&self) -> Result<()> {
        self.dataset.validate()?;
        if self.eval_split_name.trim().is_empty() {
            return Err(DataError::config("eval_split_name must not be empty"));
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DatasetConfig {
        DatasetConfig {
            dset_name:       "tvr".into(),
            ctx_mode:        ContextMode::video_sub(),
            max_desc_len:    30,
            max_ctx_len:     100,
            normalize_vfeat: true,
            normalize_tfeat: true,
            data_ratio:      1.0,
        }
    }

    #[test]
    fn test_context_mode_parsing() {
        let m: ContextMode = "video_sub_tef".parse().unwrap();
        assert!(m.video && m.sub && m.tef);

        let m: ContextMode = "sub".parse().unwrap();
        assert!(!m.video && m.sub && !m.tef);

        assert!("video_audio".parse::<ContextMode>().is_err());
        assert_eq!(ContextMode::video_sub().to_string(), "video_sub");
    }

    #[test]
    fn test_eval_mode_parsing() {
        assert_eq!("context".parse::<EvalMode>().unwrap(), EvalMode::Context);
        assert_eq!("query".parse::<EvalMode>().unwrap(), EvalMode::Query);
        assert!(matches!(
            "video_query".parse::<EvalMode>(),
            Err(DataError::Configuration(_))
        ));
    }

    #[test]
    fn test_ratio_bounds() {
        assert!(base().validate().is_ok());
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let cfg = DatasetConfig { data_ratio: bad, ..base() };
            assert!(cfg.validate().is_err(), "ratio {bad} should be rejected");
        }
    }

    #[test]
    fn test_json_roundtrip_uses_mode_string() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        base().save_json(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"video_sub\""));
        assert_eq!(DatasetConfig::load_json(&path).unwrap(), base());
    }

    #[test]
    fn test_eval_config_flattens_dataset_fields() {
        let eval = EvalConfig { dataset: base(), eval_split_name: "val".into(), load_gt_video: false };
        let json = serde_json::to_value(&eval).unwrap();
        assert_eq!(json["ctx_mode"], "video_sub");
        assert_eq!(json["eval_split_name"], "val");

        let blank = EvalConfig { eval_split_name: " ".into(), ..eval };
        assert!(matches!(blank.validate(), Err(DataError::Configuration(_))));
    }
}
