//! Decoding of trial labels.
//!
//! A trial directory is named
//! `<algorithm>_bw<bandwidth>_d<delay>_q<queue>_l<loss>_r<round>`; this module
//! turns that name into a [`ConditionKey`] plus round, or a [`LabelError`]
//! explaining which token is at fault.

use std::str::FromStr;

use thiserror::Error;

use crate::models::{Condition, ConditionKey};

const TOKEN_COUNT: usize = 6;

/// Why a label does not match the trial grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("expected 6 underscore-separated tokens, found {0}")]
    TokenCount(usize),

    #[error("{field} token {token:?} is missing its {prefix:?} prefix")]
    MissingPrefix {
        field: &'static str,
        prefix: &'static str,
        token: String,
    },

    #[error("{field} token {token:?} is not a valid value")]
    InvalidNumber { field: &'static str, token: String },

    #[error("{0} token is empty")]
    Empty(&'static str),
}

/// A decoded trial label.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialLabel {
    pub key: ConditionKey,
    pub round: u32,
    /// Algorithm token exactly as written, for display.
    pub algorithm_display: String,
}

/// Decode a trial label into its condition key and round.
pub fn parse_label(label: &str) -> Result<TrialLabel, LabelError> {
    let tokens: Vec<&str> = label.trim().split('_').collect();
    if tokens.len() != TOKEN_COUNT {
        return Err(LabelError::TokenCount(tokens.len()));
    }

    let algorithm = tokens[0];
    if algorithm.is_empty() {
        return Err(LabelError::Empty("algorithm"));
    }

    let bandwidth_mbps: u32 = numeric(tokens[1], "bandwidth", "bw")?;
    let delay = strip(tokens[2], "delay", "d")?;
    if delay.is_empty() {
        return Err(LabelError::Empty("delay"));
    }
    let queue_depth: u32 = numeric(tokens[3], "queue", "q")?;
    // `+ 0.0` folds `-0` into `0` so both spellings key the same condition.
    let loss_percent: f64 = numeric::<f64>(tokens[4], "loss", "l")? + 0.0;
    if !loss_percent.is_finite() || loss_percent < 0.0 {
        return Err(LabelError::InvalidNumber {
            field: "loss",
            token: tokens[4].to_string(),
        });
    }
    let round: u32 = numeric(tokens[5], "round", "r")?;

    let condition = Condition {
        bandwidth_mbps,
        delay: delay.to_string(),
        queue_depth,
        loss_percent,
    };

    Ok(TrialLabel {
        key: ConditionKey::new(algorithm, condition),
        round,
        algorithm_display: algorithm.to_string(),
    })
}

fn strip<'a>(
    token: &'a str,
    field: &'static str,
    prefix: &'static str,
) -> Result<&'a str, LabelError> {
    token
        .strip_prefix(prefix)
        .ok_or_else(|| LabelError::MissingPrefix {
            field,
            prefix,
            token: token.to_string(),
        })
}

fn numeric<T: FromStr>(
    token: &str,
    field: &'static str,
    prefix: &'static str,
) -> Result<T, LabelError> {
    strip(token, field, prefix)?
        .parse()
        .map_err(|_| LabelError::InvalidNumber {
            field,
            token: token.to_string(),
        })
}
