//! Target selection (spec §4.5 "Target selection").

use guardant_proto::{EndpointStatus, ServiceEndpoint, TargetSelectionStrategy};

/// Picks a target for `source` among `candidates`, excluding `source`
/// itself. Candidates must already be limited to `healthy` endpoints by
/// the caller; this only orders and picks among them.
pub fn select_target(
    strategy: TargetSelectionStrategy,
    source: &ServiceEndpoint,
    candidates: &[ServiceEndpoint],
) -> Option<ServiceEndpoint> {
    let eligible: Vec<&ServiceEndpoint> =
        candidates.iter().filter(|c| c.id != source.id && c.status == EndpointStatus::Healthy).collect();
    if eligible.is_empty() {
        return None;
    }

    let same_region: Vec<&ServiceEndpoint> = eligible.iter().filter(|c| c.region == source.region).copied().collect();
    let pool = if same_region.is_empty() { &eligible } else { &same_region };

    let picked = match strategy {
        TargetSelectionStrategy::HighestPriority => pool.iter().min_by_key(|c| c.priority).copied(),
        TargetSelectionStrategy::LowestLoad => pool.iter().min_by_key(|c| c.current_load).copied(),
        TargetSelectionStrategy::Random => {
            let idx = (uuid::Uuid::new_v4().as_u128() % pool.len() as u128) as usize;
            pool.get(idx).copied()
        }
    };

    picked.cloned()
}
