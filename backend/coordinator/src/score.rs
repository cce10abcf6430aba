//! Pre-submission score estimate.
//!
//! The estimate is informational only. It is never merged into the ledger
//! score that deposits maintain (see [`crate::guarantee`]).

use serde::{Deserialize, Serialize};

pub const BASE_SCORE: u32 = 50;
pub const AUDIT_BONUS: u32 = 20;
pub const KYC_BONUS: u32 = 15;
pub const SOCIAL_LINK_BONUS: u32 = 2;
pub const MAX_SOCIAL_LINKS: usize = 4;
pub const TEAM_BONUS: u32 = 5;
pub const MAX_SCORE: u32 = 100;

/// LUNES holding that earns the full collateral share.
pub const LUNES_TARGET: f64 = 100_000.0;
pub const LUNES_SHARE: f64 = 95.0;
/// Value of other tokens and of NFTs that each earn half the remaining share.
pub const OTHER_TARGET: f64 = 100_000.0;
pub const NFT_TARGET: f64 = 50_000.0;
pub const DIVERSITY_SHARE: f64 = 5.0;

/// Self-declared attributes of a project about to register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectProfile {
    pub has_audit: bool,
    pub has_kyc: bool,
    /// Website, repository, social accounts; empty entries are ignored.
    pub social_links: Vec<String>,
    pub team_size: u32,
}

/// Collateral a project holds or plans to deposit, in whole tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollateralMix {
    pub lunes: f64,
    pub other: f64,
    pub nft: f64,
}

pub struct ScoreEstimator;

impl ScoreEstimator {
    pub fn estimate(profile: &ProjectProfile) -> u8 {
        let mut score = BASE_SCORE;
        if profile.has_audit {
            score += AUDIT_BONUS;
        }
        if profile.has_kyc {
            score += KYC_BONUS;
        }

        let links = profile
            .social_links
            .iter()
            .filter(|l| !l.trim().is_empty())
            .count()
            .min(MAX_SOCIAL_LINKS);
        score += SOCIAL_LINK_BONUS * links as u32;

        if profile.team_size >= 5 {
            score += TEAM_BONUS;
        }
        if profile.team_size >= 10 {
            score += TEAM_BONUS;
        }

        score.min(MAX_SCORE) as u8
    }

    /// Score preview from collateral alone.
    ///
    /// Without LUNES the score is 0. LUNES earn up to 95 points linearly up
    /// to [`LUNES_TARGET`]; other tokens and NFTs share the last 5.
    pub fn from_collateral(mix: &CollateralMix) -> u8 {
        let amount = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        let lunes = amount(mix.lunes);
        if lunes == 0.0 {
            return 0;
        }
        let lunes_score = (lunes / LUNES_TARGET * LUNES_SHARE).min(LUNES_SHARE);
        let diversity = (amount(mix.other) / OTHER_TARGET * DIVERSITY_SHARE / 2.0
            + amount(mix.nft) / NFT_TARGET * DIVERSITY_SHARE / 2.0)
            .min(DIVERSITY_SHARE);
        (lunes_score + diversity).min(MAX_SCORE as f64).round() as u8
    }
}
