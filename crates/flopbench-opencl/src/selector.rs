//! Stability-ranked device selection.
//!
//! Platforms are ranked by an injectable policy table of substring rules.
//! The table exists to route around driver stacks whose newer code paths
//! misbehave: on the hardware this harness grew up on, the vendor
//! implementation hangs while constructing a command queue, and the Mesa
//! implementation, slower on paper, completes every run. Selection logic
//! itself knows nothing about concrete platform names.

use crate::enumerate::{GpuDeviceInfo, PlatformCandidates, PlatformEntry};
use crate::error::SelectionError;
use tracing::info;

/// Rank assigned to platforms no rule matches. Any rule rank must be
/// numerically smaller (better) than this.
pub const UNMATCHED_RANK: u32 = 999;

/// One policy rule: platforms whose display name contains `needle` get
/// `rank`; smaller ranks win.
#[derive(Debug, Clone)]
pub struct RankRule {
    pub needle: String,
    pub rank: u32,
    /// Why this rule exists, kept with the policy data so the empirical
    /// driver knowledge travels with it.
    pub rationale: String,
}

impl RankRule {
    pub fn new(
        needle: impl Into<String>,
        rank: u32,
        rationale: impl Into<String>,
    ) -> Self {
        Self { needle: needle.into(), rank, rationale: rationale.into() }
    }
}

/// Ordered rank table. The first rule whose needle matches decides a
/// platform's rank.
#[derive(Debug, Clone)]
pub struct RankTable {
    rules: Vec<RankRule>,
}

impl RankTable {
    #[must_use]
    pub fn new(rules: Vec<RankRule>) -> Self {
        Self { rules }
    }

    /// The rule matching `platform_name`, if any.
    #[must_use]
    pub fn matched_rule(&self, platform_name: &str) -> Option<&RankRule> {
        self.rules.iter().find(|r| platform_name.contains(&r.needle))
    }

    /// Rank for `platform_name`; [`UNMATCHED_RANK`] when no rule matches.
    #[must_use]
    pub fn rank_of(&self, platform_name: &str) -> u32 {
        self.matched_rule(platform_name).map_or(UNMATCHED_RANK, |r| r.rank)
    }

    #[must_use]
    pub fn rules(&self) -> &[RankRule] {
        &self.rules
    }
}

impl Default for RankTable {
    /// The stability policy observed on gfx701-class hardware.
    fn default() -> Self {
        Self::new(vec![
            RankRule::new(
                "Clover",
                0,
                "Mesa's Clover stack completes every run on the gfx701 driver family",
            ),
            RankRule::new(
                "AMD Accelerated Parallel Processing",
                1,
                "AMD APP hangs inside its OpenCL 2.0 queue-creation entry point on gfx701",
            ),
        ])
    }
}

/// The single chosen (platform, device) pair with its cached attributes.
#[derive(Debug)]
pub struct SelectedDevice {
    pub platform: PlatformEntry,
    pub device: GpuDeviceInfo,
    /// Rank the winning platform received.
    pub rank: u32,
    /// Rationale of the matched rule, when one matched.
    pub rationale: Option<String>,
}

/// Pick the winning platform index from (name, device count) pairs.
///
/// Deterministic: smallest rank wins; on equal rank the first-enumerated
/// platform wins; platforms with zero devices never win. This is the whole
/// selection algorithm, separated from live handles so it can be exercised
/// against synthetic name strings.
pub fn pick_winner<'a, I>(candidates: I, table: &RankTable) -> Result<usize, SelectionError>
where
    I: IntoIterator<Item = (&'a str, usize)>,
{
    let mut best: Option<(usize, u32)> = None;
    for (index, (name, device_count)) in candidates.into_iter().enumerate() {
        if device_count == 0 {
            continue;
        }
        let rank = table.rank_of(name);
        // Strict less-than keeps the first-enumerated platform on ties.
        if best.map_or(true, |(_, best_rank)| rank < best_rank) {
            best = Some((index, rank));
        }
    }
    best.map(|(index, _)| index).ok_or(SelectionError::NoUsableDevice)
}

/// Apply the rank policy to live enumeration results and take the first
/// device of the winning platform.
pub fn select_best(
    candidates: Vec<PlatformCandidates>,
    table: &RankTable,
) -> Result<SelectedDevice, SelectionError> {
    let winner_index = pick_winner(
        candidates.iter().map(|c| (c.platform.name.as_str(), c.devices.len())),
        table,
    )?;

    let winner = candidates
        .into_iter()
        .nth(winner_index)
        .expect("winner index comes from the same iteration");
    let rank = table.rank_of(&winner.platform.name);
    let rationale = table.matched_rule(&winner.platform.name).map(|r| r.rationale.clone());

    let device = winner
        .devices
        .into_iter()
        .next()
        .expect("pick_winner only returns platforms with devices");

    info!(
        "selected GPU: {} on platform {} (rank {rank})",
        device.name, winner.platform.name
    );

    Ok(SelectedDevice { platform: winner.platform, device, rank, rationale })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RankTable {
        RankTable::new(vec![
            RankRule::new("Stable", 0, "known good"),
            RankRule::new("Shaky", 1, "queue creation hangs"),
        ])
    }

    #[test]
    fn higher_priority_rule_beats_lower_and_unmatched() {
        let t = table();
        let winner = pick_winner(
            vec![("Vendor Shaky Stack", 1), ("Mesa Stable Stack", 1), ("Something Else", 1)],
            &t,
        )
        .unwrap();
        assert_eq!(winner, 1);
    }

    #[test]
    fn unstable_rule_still_beats_unmatched() {
        let t = table();
        let winner = pick_winner(vec![("Something Else", 1), ("Vendor Shaky Stack", 1)], &t).unwrap();
        assert_eq!(winner, 1);
    }

    #[test]
    fn unmatched_platforms_tie_and_first_enumerated_wins() {
        let t = table();
        let winner = pick_winner(vec![("Alpha", 2), ("Beta", 4)], &t).unwrap();
        assert_eq!(winner, 0);
    }

    #[test]
    fn platform_without_devices_never_wins() {
        let t = table();
        let winner = pick_winner(vec![("Mesa Stable Stack", 0), ("Something Else", 1)], &t).unwrap();
        assert_eq!(winner, 1);
    }

    #[test]
    fn all_empty_candidates_is_no_usable_device() {
        let t = table();
        let result = pick_winner(vec![("Mesa Stable Stack", 0), ("Vendor Shaky Stack", 0)], &t);
        assert_eq!(result, Err(SelectionError::NoUsableDevice));
    }

    #[test]
    fn empty_candidate_list_is_no_usable_device() {
        let result = pick_winner(std::iter::empty(), &table());
        assert_eq!(result, Err(SelectionError::NoUsableDevice));
    }

    #[test]
    fn default_table_prefers_mesa_over_vendor_stack() {
        let t = RankTable::default();
        assert!(t.rank_of("Clover") < t.rank_of("AMD Accelerated Parallel Processing"));
        assert!(t.rank_of("AMD Accelerated Parallel Processing") < UNMATCHED_RANK);
        assert_eq!(t.rank_of("Intel(R) OpenCL HD Graphics"), UNMATCHED_RANK);
    }

    #[test]
    fn matched_rule_carries_rationale() {
        let t = RankTable::default();
        let rule = t.matched_rule("AMD Accelerated Parallel Processing").unwrap();
        assert!(rule.rationale.contains("hangs"));
    }
}
