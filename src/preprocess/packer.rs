//! Packing token id sequences into fixed-length model inputs.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TokenizerError};

/// How a multi-segment packer shortens segments that do not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    /// Hand out the budget one token per segment per round, so short segments
    /// are kept whole and long ones are cut evenly.
    #[default]
    RoundRobin,
    /// Fill segments in order; later segments get what is left.
    Waterfall,
}

impl TruncationStrategy {
    /// How many tokens of each segment to keep within `budget`.
    pub fn allocate(self, lengths: &[usize], budget: usize) -> Vec<usize> {
        match self {
            TruncationStrategy::Waterfall => {
                let mut remaining = budget;
                lengths
                    .iter()
                    .map(|&len| {
                        let take = len.min(remaining);
                        remaining -= take;
                        take
                    })
                    .collect()
            }
            TruncationStrategy::RoundRobin => {
                let mut kept = vec![0; lengths.len()];
                let mut remaining = budget;
                // Each round gives one more token to every segment that still
                // has some, while the budget lasts.
                while remaining > 0 {
                    let mut progressed = false;
                    for (k, &len) in kept.iter_mut().zip(lengths) {
                        if remaining == 0 {
                            break;
                        }
                        if *k < len {
                            *k += 1;
                            remaining -= 1;
                            progressed = true;
                        }
                    }
                    if !progressed {
                        break;
                    }
                }
                kept
            }
        }
    }
}

/// Single-sequence packer: `[start] + ids + [end]`, padded to length.
///
/// The end token is kept even when `ids` must be truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartEndPacker {
    pub sequence_length: usize,
    pub start_value: Option<u32>,
    pub end_value: Option<u32>,
    pub pad_value: u32,
}

impl StartEndPacker {
    pub fn pack(&self, ids: &[u32]) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.sequence_length);
        out.extend(self.start_value);
        out.extend_from_slice(ids);

        let end_len = usize::from(self.end_value.is_some());
        out.truncate(self.sequence_length.saturating_sub(end_len));
        out.extend(self.end_value);

        out.truncate(self.sequence_length);
        out.resize(self.sequence_length, self.pad_value);
        out
    }
}

/// Multi-segment packer:
/// `start + s0 + sep + s1 + sep + ... + s(n-1) + end`, padded to length.
///
/// Segment ids are 0 for the start tokens and `i` for segment `i` together
/// with the separator (or end) tokens following it. Padding gets segment 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSegmentPacker {
    pub sequence_length: usize,
    pub start_value: Vec<u32>,
    pub sep_value: Vec<u32>,
    pub end_value: Vec<u32>,
    pub pad_value: u32,
    pub truncate: TruncationStrategy,
}

impl MultiSegmentPacker {
    /// Pack `segments` into `(token_ids, segment_ids)`.
    ///
    /// Fails if there are no segments, or if the special tokens alone do not
    /// fit in `sequence_length`.
    pub fn pack(&self, segments: &[&[u32]]) -> Result<(Vec<u32>, Vec<u32>)> {
        if segments.is_empty() {
            return Err(TokenizerError::InputShape(
                "at least one segment is required".to_string(),
            ));
        }

        let special_count = self.start_value.len()
            + self.sep_value.len() * (segments.len() - 1)
            + self.end_value.len();
        let budget = self.sequence_length.checked_sub(special_count).ok_or_else(|| {
            TokenizerError::Configuration(format!(
                "sequence_length {} cannot hold the {} special tokens needed for {} segment(s)",
                self.sequence_length,
                special_count,
                segments.len()
            ))
        })?;

        let lengths: Vec<usize> = segments.iter().map(|s| s.len()).collect();
        let kept = self.truncate.allocate(&lengths, budget);

        let mut token_ids = Vec::with_capacity(self.sequence_length);
        let mut segment_ids = Vec::with_capacity(self.sequence_length);

        token_ids.extend_from_slice(&self.start_value);
        segment_ids.resize(token_ids.len(), 0);

        let last = segments.len() - 1;
        for (i, (segment, &keep)) in segments.iter().zip(&kept).enumerate() {
            token_ids.extend_from_slice(&segment[..keep]);
            let closing = if i == last {
                &self.end_value
            } else {
                &self.sep_value
            };
            token_ids.extend_from_slice(closing);
            segment_ids.resize(token_ids.len(), i as u32);
        }

        token_ids.resize(self.sequence_length, self.pad_value);
        segment_ids.resize(self.sequence_length, 0);
        Ok((token_ids, segment_ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bert_packer(sequence_length: usize, truncate: TruncationStrategy) -> MultiSegmentPacker {
        MultiSegmentPacker {
            sequence_length,
            start_value: vec![2],
            sep_value: vec![3],
            end_value: vec![3],
            pad_value: 0,
            truncate,
        }
    }

    // -- Truncation allocation --

    #[test]
    fn test_round_robin_allocation() {
        let s = TruncationStrategy::RoundRobin;
        assert_eq!(s.allocate(&[5, 5], 6), vec![3, 3]);
        assert_eq!(s.allocate(&[1, 10], 6), vec![1, 5]);
        assert_eq!(s.allocate(&[4, 4, 4], 5), vec![2, 2, 1]);
        assert_eq!(s.allocate(&[2, 3], 100), vec![2, 3]);
        assert_eq!(s.allocate(&[2, 3], 0), vec![0, 0]);
        assert!(s.allocate(&[], 4).is_empty());
    }

    #[test]
    fn test_waterfall_allocation() {
        let s = TruncationStrategy::Waterfall;
        assert_eq!(s.allocate(&[5, 5], 6), vec![5, 1]);
        assert_eq!(s.allocate(&[1, 10], 6), vec![1, 5]);
        assert_eq!(s.allocate(&[10, 1], 6), vec![6, 0]);
        assert_eq!(s.allocate(&[2, 3], 100), vec![2, 3]);
    }

    #[test]
    fn test_truncation_strategy_serde() {
        assert_eq!(
            serde_json::to_string(&TruncationStrategy::RoundRobin).unwrap(),
            "\"round_robin\""
        );
        let parsed: TruncationStrategy = serde_json::from_str("\"waterfall\"").unwrap();
        assert_eq!(parsed, TruncationStrategy::Waterfall);
    }

    // -- Multi-segment --

    #[test]
    fn test_single_segment_padded() {
        let packer = bert_packer(8, TruncationStrategy::RoundRobin);
        let (ids, segs) = packer.pack(&[&[5, 6, 7, 8, 1]]).unwrap();
        assert_eq!(ids, vec![2, 5, 6, 7, 8, 1, 3, 0]);
        assert_eq!(segs, vec![0; 8]);
    }

    #[test]
    fn test_two_segments() {
        let packer = bert_packer(8, TruncationStrategy::RoundRobin);
        let (ids, segs) = packer.pack(&[&[5, 6], &[7, 8, 1]]).unwrap();
        assert_eq!(ids, vec![2, 5, 6, 3, 7, 8, 1, 3]);
        assert_eq!(segs, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_two_segments_round_robin_truncation() {
        let packer = bert_packer(7, TruncationStrategy::RoundRobin);
        let (ids, segs) = packer.pack(&[&[10, 11, 12], &[20, 21, 22]]).unwrap();
        assert_eq!(ids, vec![2, 10, 11, 3, 20, 21, 3]);
        assert_eq!(segs, vec![0, 0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_two_segments_waterfall_truncation() {
        let packer = bert_packer(7, TruncationStrategy::Waterfall);
        let (ids, _) = packer.pack(&[&[10, 11, 12], &[20, 21, 22]]).unwrap();
        assert_eq!(ids, vec![2, 10, 11, 12, 3, 20, 3]);
    }

    #[test]
    fn test_multi_token_separator() {
        let packer = MultiSegmentPacker {
            sequence_length: 10,
            start_value: vec![0],
            sep_value: vec![2, 2],
            end_value: vec![2],
            pad_value: 1,
            truncate: TruncationStrategy::RoundRobin,
        };
        let (ids, segs) = packer.pack(&[&[5], &[6, 7]]).unwrap();
        assert_eq!(ids, vec![0, 5, 2, 2, 6, 7, 2, 1, 1, 1]);
        assert_eq!(segs, vec![0, 0, 0, 0, 1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_empty_segments_still_get_specials() {
        let packer = bert_packer(5, TruncationStrategy::RoundRobin);
        let (ids, _) = packer.pack(&[&[], &[]]).unwrap();
        assert_eq!(ids, vec![2, 3, 3, 0, 0]);
    }

    #[test]
    fn test_no_segments_rejected() {
        let packer = bert_packer(8, TruncationStrategy::RoundRobin);
        let err = packer.pack(&[]).unwrap_err();
        assert!(matches!(err, TokenizerError::InputShape(_)));
    }

    #[test]
    fn test_sequence_too_short_for_specials() {
        let packer = bert_packer(2, TruncationStrategy::RoundRobin);
        let err = packer.pack(&[&[5], &[6]]).unwrap_err();
        assert!(matches!(err, TokenizerError::Configuration(_)));
    }

    // -- Start/end --

    #[test]
    fn test_start_end_pack() {
        let packer = StartEndPacker {
            sequence_length: 8,
            start_value: Some(1),
            end_value: Some(1),
            pad_value: 0,
        };
        assert_eq!(packer.pack(&[2, 3, 4, 2, 5]), vec![1, 2, 3, 4, 2, 5, 1, 0]);
    }

    #[test]
    fn test_start_end_truncation_keeps_end() {
        let packer = StartEndPacker {
            sequence_length: 4,
            start_value: Some(1),
            end_value: Some(9),
            pad_value: 0,
        };
        assert_eq!(packer.pack(&[2, 3, 4, 5]), vec![1, 2, 3, 9]);
    }

    #[test]
    fn test_start_end_without_specials() {
        let packer = StartEndPacker {
            sequence_length: 3,
            start_value: None,
            end_value: None,
            pad_value: 7,
        };
        assert_eq!(packer.pack(&[1]), vec![1, 7, 7]);
        assert_eq!(packer.pack(&[1, 2, 3, 4]), vec![1, 2, 3]);
    }

    #[test]
    fn test_start_end_tiny_length() {
        let packer = StartEndPacker {
            sequence_length: 1,
            start_value: Some(1),
            end_value: Some(9),
            pad_value: 0,
        };
        assert_eq!(packer.pack(&[2]), vec![9]);
    }
}
