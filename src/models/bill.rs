//! Bill of process.
//!
//! The raw bill is a list of string tokens supplied by the order feed:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `I`, `INSPECTION` | inspection marker |
//! | `T`, `TRANSITION`, `\|` | end of disassembly, start of reassembly |
//! | `Q`, `QUALITY` | terminal quality/shipping marker |
//! | `D:<label>` / `R:<label>` | operation with an explicit family |
//! | anything else | operation; family decided by position relative to `T` |
//!
//! Parsing never fails. Malformed input is repaired by an explicit policy and
//! every repair is reported as a [`BillCorrection`].

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::PhaseFamily;

/// One parsed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessToken {
    Inspection,
    Operation { family: PhaseFamily, label: String },
    Transition,
    Quality,
}

/// A repair applied while parsing a raw bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillCorrection {
    /// Terminal quality marker was missing and has been appended.
    AppendedQuality,
    /// Leading inspection marker was missing and has been inserted.
    InsertedInspection,
    /// Tokens after the quality marker were dropped.
    IgnoredTrailing(Vec<String>),
    /// Blank tokens were dropped.
    DroppedBlank(usize),
    /// The bill holds no operations (e.g. `I, Q`). Flagged, not synthesized.
    NoOperations,
}

/// An ordered, validated list of process tokens.
///
/// Always starts with [`ProcessToken::Inspection`] and ends with
/// [`ProcessToken::Quality`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillOfProcess {
    tokens: Vec<ProcessToken>,
}

/// Result of parsing a raw bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBill {
    pub bill: BillOfProcess,
    pub corrections: Vec<BillCorrection>,
}

/// Result of choosing among alternative bills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillSelection {
    /// Index into the candidate list that was chosen.
    pub index: usize,
    /// Number of candidates that were valid.
    pub valid_candidates: usize,
    pub parsed: ParsedBill,
}

impl BillOfProcess {
    /// Parses raw tokens, applying the repair policy.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> ParsedBill {
        let mut tokens = Vec::with_capacity(raw.len() + 2);
        let mut corrections = Vec::new();
        let mut blank = 0usize;
        let mut after_transition = false;
        let mut trailing = Vec::new();
        let mut closed = false;

        for token in raw {
            let text = token.as_ref().trim();
            if closed {
                trailing.push(text.to_string());
                continue;
            }
            if text.is_empty() {
                blank += 1;
                continue;
            }
            match text.to_ascii_uppercase().as_str() {
                "I" | "INSPECTION" => {
                    if !tokens.contains(&ProcessToken::Inspection) {
                        tokens.push(ProcessToken::Inspection);
                    }
                }
                "T" | "TRANSITION" | "|" => {
                    if !after_transition {
                        after_transition = true;
                        tokens.push(ProcessToken::Transition);
                    }
                }
                "Q" | "QUALITY" => {
                    tokens.push(ProcessToken::Quality);
                    closed = true;
                }
                _ => tokens.push(Self::operation_token(text, after_transition)),
            }
        }

        if blank > 0 {
            corrections.push(BillCorrection::DroppedBlank(blank));
        }
        if tokens.first() != Some(&ProcessToken::Inspection) {
            tokens.retain(|t| t != &ProcessToken::Inspection);
            tokens.insert(0, ProcessToken::Inspection);
            corrections.push(BillCorrection::InsertedInspection);
        }
        if !closed {
            tokens.push(ProcessToken::Quality);
            corrections.push(BillCorrection::AppendedQuality);
        }
        if !trailing.is_empty() {
            corrections.push(BillCorrection::IgnoredTrailing(trailing));
        }

        let bill = BillOfProcess { tokens };
        if bill.operation_count() == 0 {
            corrections.push(BillCorrection::NoOperations);
        }
        ParsedBill { bill, corrections }
    }

    fn operation_token(text: &str, after_transition: bool) -> ProcessToken {
        let (family, label) = match text.split_once(':') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("D") => {
                (PhaseFamily::Disassembly, rest.trim())
            }
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("R") => {
                (PhaseFamily::Reassembly, rest.trim())
            }
            _ if after_transition => (PhaseFamily::Reassembly, text),
            _ => (PhaseFamily::Disassembly, text),
        };
        ProcessToken::Operation {
            family,
            label: label.to_string(),
        }
    }

    /// Chooses one valid bill uniformly among `candidates`.
    ///
    /// A candidate is valid when it parses with at least one operation.
    /// When no candidate is valid the first one is used (its corrections will
    /// include [`BillCorrection::NoOperations`]). Returns `None` only for an
    /// empty candidate list.
    pub fn select<S: AsRef<str>, R: Rng + ?Sized>(
        candidates: &[Vec<S>],
        rng: &mut R,
    ) -> Option<BillSelection> {
        let parsed: Vec<ParsedBill> = candidates.iter().map(|c| Self::parse(c)).collect();
        let valid: Vec<usize> = parsed
            .iter()
            .enumerate()
            .filter(|(_, p)| p.bill.operation_count() > 0)
            .map(|(i, _)| i)
            .collect();

        let index = match valid.len() {
            0 => 0,
            1 => valid[0],
            n => valid[rng.random_range(0..n)],
        };
        let valid_candidates = valid.len();
        parsed.into_iter().nth(index).map(|parsed| BillSelection {
            index,
            valid_candidates,
            parsed,
        })
    }

    pub fn tokens(&self) -> &[ProcessToken] {
        &self.tokens
    }

    /// Operation labels of one family, in bill order.
    pub fn operations(&self, family: PhaseFamily) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(move |t| match t {
            ProcessToken::Operation { family: f, label } if *f == family => Some(label.as_str()),
            _ => None,
        })
    }

    /// Number of operations across both families.
    pub fn operation_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, ProcessToken::Operation { .. }))
            .count()
    }

    /// Whether the order needs any slot of the given family.
    pub fn requires(&self, family: PhaseFamily) -> bool {
        self.operations(family).next().is_some()
    }
}
