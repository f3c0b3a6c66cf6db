// ============================================================
// Layer 4 — Batch Assembler
// ============================================================
// Merges one window per lane into a single zero-padded batch.
//
//   lane 0 window [F, 8,  C] ┐
//   lane 1 window [F, 16, C] ├──► batch [3F, 16, C]
//   lane 2 window [F, 8,  C] ┘
//
// where F = n_frames + overlap. Every window is copied
// left-aligned into its lane's block of rows; the remainder
// stays zero. Length vectors are concatenated in lane order.
//
// Events are reduced to the required disease columns, looked
// up by name in each window's own vocabulary and emitted in
// the order of `required_diseases`. A vocabulary lacking any
// required name fails the whole batch.

use crate::data::error::PipelineError;
use crate::data::windower::WindowConfig;
use crate::domain::batch::{Batch, Frames};
use crate::domain::window::Window;

pub struct BatchAssembler {
    config:            WindowConfig,
    required_diseases: Vec<String>,
}

impl BatchAssembler {
    pub fn new(config: &WindowConfig, required_diseases: Vec<String>) -> Self {
        Self { config: config.clone(), required_diseases }
    }

    /// Assemble lane windows (in lane order) into one batch.
    pub fn assemble(&self, windows: Vec<Window>) -> Result<Batch, PipelineError> {
        let per_window = self.config.beats_per_window();
        let lanes      = windows.len();

        for (lane, w) in windows.iter().enumerate() {
            if w.n_beats() != per_window {
                return Err(PipelineError::WindowShape {
                    lane,
                    expected: per_window,
                    found:    w.n_beats(),
                });
            }
        }

        let sequence_length: Vec<usize> = windows
            .iter()
            .flat_map(|w| w.sequence_length.iter().copied())
            .collect();
        let true_length: Vec<usize> = windows
            .iter()
            .flat_map(|w| w.true_length.iter().copied())
            .collect();
        let max_len = sequence_length.iter().copied().max().unwrap_or(0);

        let raw = if self.config.want_raw {
            Some(stack(&windows, |w| w.raw.as_ref(), per_window, max_len)?)
        } else {
            None
        };
        let delta = if self.config.want_delta {
            Some(stack(&windows, |w| w.delta.as_ref(), per_window, max_len)?)
        } else {
            None
        };
        let events = if self.config.want_events {
            Some(self.select_events(&windows)?)
        } else {
            None
        };

        Ok(Batch {
            raw,
            delta,
            events,
            sequence_length,
            true_length,
            beats_per_window: per_window,
            lanes,
        })
    }

    fn select_events(&self, windows: &[Window]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut out = Vec::with_capacity(windows.len() * self.config.beats_per_window());
        let mut width: Option<usize> = None;

        for (lane, w) in windows.iter().enumerate() {
            let Some(rows) = w.events.as_deref() else {
                return Err(PipelineError::MissingEvents { lane });
            };

            if self.required_diseases.is_empty() {
                // Keep every column; all lanes must agree on the width.
                for row in rows {
                    let expected = *width.get_or_insert(row.len());
                    if row.len() != expected {
                        return Err(PipelineError::LabelVocabularyMismatch {
                            expected,
                            found:   row.len(),
                            missing: Vec::new(),
                        });
                    }
                    out.push(row.clone());
                }
                continue;
            }

            let columns: Vec<Option<usize>> = self
                .required_diseases
                .iter()
                .map(|name| w.disease_names.iter().position(|n| n == name))
                .collect();
            let found = columns.iter().filter(|c| c.is_some()).count();
            if found != self.required_diseases.len() {
                let missing = self
                    .required_diseases
                    .iter()
                    .zip(&columns)
                    .filter(|(_, c)| c.is_none())
                    .map(|(n, _)| n.clone())
                    .collect();
                return Err(PipelineError::LabelVocabularyMismatch {
                    expected: self.required_diseases.len(),
                    found,
                    missing,
                });
            }

            let columns: Vec<usize> = columns.into_iter().flatten().collect();
            for row in rows {
                out.push(columns.iter().map(|&c| row[c]).collect());
            }
        }

        Ok(out)
    }
}

/// Stack one tensor kind from every window into `[lanes*F, max_len, C]`.
fn stack<'a>(
    windows:    &'a [Window],
    pick:       impl Fn(&'a Window) -> Option<&'a Frames>,
    per_window: usize,
    max_len:    usize,
) -> Result<Frames, PipelineError> {
    let first = windows
        .first()
        .and_then(&pick)
        .ok_or_else(|| PipelineError::InvalidConfig("window is missing a requested tensor".into()))?;
    let n_channels = first.n_channels();

    let mut out = Frames::zeros(windows.len() * per_window, max_len, n_channels);
    for (lane, w) in windows.iter().enumerate() {
        let frames = pick(w).ok_or_else(|| {
            PipelineError::InvalidConfig(format!("lane {lane} window is missing a requested tensor"))
        })?;
        if frames.n_channels() != n_channels {
            return Err(PipelineError::ChannelMismatch {
                lane,
                expected: n_channels,
                found:    frames.n_channels(),
            });
        }
        out.copy_rows_from(lane * per_window, frames, 0..per_window);
    }
    Ok(out)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const NAMES: [&str; 5] = ["AF", "PVC", "PAC", "LBBB", "RBBB"];

    fn config(want_events: bool) -> WindowConfig {
        WindowConfig {
            n_frames:        2,
            overlap:         1,
            reduction_ratio: 2,
            want_raw:        true,
            want_delta:      false,
            want_events,
        }
    }

    /// Window of 3 beats, all samples = `fill`, each beat `len` long
    fn window(len: usize, fill: f32, channels: usize, names: &[&str]) -> Window {
        let mut raw = Frames::zeros(3, len, channels);
        for r in 0..3 {
            for t in 0..len {
                for c in 0..channels {
                    raw.set(r, t, c, fill);
                }
            }
        }
        let events = (0..3)
            .map(|b| (0..names.len()).map(|c| (b * 10 + c) as f32).collect())
            .collect();
        Window {
            start_beat:      0,
            raw:             Some(raw),
            delta:           None,
            events:          Some(events),
            sequence_length: vec![len; 3],
            true_length:     vec![len - 1; 3],
            disease_names:   Arc::from(names.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
        }
    }

    #[test]
    fn test_batch_shape_and_padding() {
        let asm = BatchAssembler::new(&config(false), vec![]);
        let batch = asm
            .assemble(vec![window(4, 1.0, 3, &NAMES), window(8, 2.0, 3, &NAMES)])
            .unwrap();

        let raw = batch.raw.as_ref().unwrap();
        assert_eq!(raw.shape(), [6, 8, 3]);
        assert_eq!(batch.sequence_length, vec![4, 4, 4, 8, 8, 8]);
        assert_eq!(batch.rows(), 6);
        assert_eq!(batch.lanes, 2);

        // lane 0 rows are left-aligned, tail zero
        assert_eq!(raw.get(0, 3, 2), 1.0);
        assert_eq!(raw.get(0, 4, 0), 0.0);
        assert_eq!(raw.get(2, 7, 1), 0.0);
        // lane 1 rows are full
        assert_eq!(raw.get(3, 7, 1), 2.0);
        assert!(batch.events.is_none());
        assert!(batch.delta.is_none());
    }

    #[test]
    fn test_events_follow_required_order() {
        let required = vec!["PAC".to_string(), "AF".to_string()];
        let asm   = BatchAssembler::new(&config(true), required);
        let batch = asm.assemble(vec![window(2, 0.0, 1, &NAMES)]).unwrap();
        let events = batch.events.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], vec![12.0, 10.0]);
    }

    #[test]
    fn test_missing_required_disease_fails() {
        let required: Vec<String> = NAMES.iter().map(|s| s.to_string()).collect();
        let asm = BatchAssembler::new(&config(true), required);

        // vocabulary intersects only 4 of the 5 required names
        let partial = ["AF", "PVC", "PAC", "LBBB", "Noise"];
        let err = asm.assemble(vec![window(2, 0.0, 1, &partial)]).unwrap_err();
        match err {
            PipelineError::LabelVocabularyMismatch { expected, found, missing } => {
                assert_eq!(expected, 5);
                assert_eq!(found, 4);
                assert_eq!(missing, vec!["RBBB".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_channel_mismatch_fails() {
        let asm = BatchAssembler::new(&config(false), vec![]);
        let err = asm
            .assemble(vec![window(2, 0.0, 3, &NAMES), window(2, 0.0, 2, &NAMES)])
            .unwrap_err();
        assert!(matches!(err, PipelineError::ChannelMismatch { lane: 1, expected: 3, found: 2 }));
    }

    #[test]
    fn test_wrong_window_size_fails() {
        let cfg = WindowConfig { n_frames: 5, ..config(false) };
        let asm = BatchAssembler::new(&cfg, vec![]);
        let err = asm.assemble(vec![window(2, 0.0, 1, &NAMES)]).unwrap_err();
        assert!(matches!(err, PipelineError::WindowShape { expected: 6, found: 3, .. }));
    }

    #[test]
    fn test_window_without_events_fails() {
        let asm = BatchAssembler::new(&config(true), vec!["AF".to_string()]);
        let mut bare = window(2, 0.0, 1, &NAMES);
        bare.events = None;
        let err = asm.assemble(vec![window(2, 0.0, 1, &NAMES), bare]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingEvents { lane: 1 }));
    }

    #[test]
    fn test_unfiltered_events_require_equal_width() {
        let asm = BatchAssembler::new(&config(true), vec![]);
        let ok = asm.assemble(vec![window(2, 0.0, 1, &NAMES), window(2, 0.0, 1, &NAMES)]);
        assert_eq!(ok.unwrap().events.unwrap()[0].len(), 5);

        let err = asm.assemble(vec![window(2, 0.0, 1, &NAMES), window(2, 0.0, 1, &NAMES[..3])]);
        assert!(matches!(err, Err(PipelineError::LabelVocabularyMismatch { .. })));
    }
}
