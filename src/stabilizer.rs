//! Hold / interpolate / clamp repair for chronically weak interior finger joints.

use crate::config::StabilizerConfig;
use crate::landmark::{FingerChain, JOINT_COUNT, JointId, Landmark};
use crate::tracker::JointMemory;

/// Repairs the PIP and DIP joints of `chain` and refreshes `last_good`.
///
/// No-op unless both the MCP and the tip of the finger are present. Only PIP and
/// DIP positions can change; a joint missing from the input is synthesized in
/// canonical position with confidence 0.
pub fn stabilize(
    landmarks: Vec<Landmark>,
    chain: FingerChain,
    last_good: &mut JointMemory,
    cfg: &StabilizerConfig,
) -> Vec<Landmark> {
    let mut table: [Option<Landmark>; JOINT_COUNT] = [None; JOINT_COUNT];
    for lm in &landmarks {
        table[lm.id.index()] = Some(*lm);
    }

    let (Some(mcp), Some(tip)) = (table[chain.mcp.index()], table[chain.tip.index()]) else {
        return landmarks;
    };

    let hold = cfg.hold_confidence;
    for (id, fraction) in [(chain.pip, cfg.pip_fraction), (chain.dip, cfg.dip_fraction)] {
        let mut current = table[id.index()];
        let cached = last_good.get(id);

        // hold
        if let (Some(lm), Some(last)) = (current.as_mut(), cached) {
            if lm.confidence < hold {
                lm.position = last;
            }
        }

        // interpolate
        if current.is_none_or(|lm| lm.confidence < hold) {
            let confidence = current.map_or(0.0, |lm| lm.confidence);
            let position = mcp.position.lerp(tip.position, fraction);
            current = Some(Landmark::new(id, position, confidence));
        }

        // clamp
        if let (Some(lm), Some(last)) = (current.as_mut(), cached) {
            let step = lm.position - last;
            let dist = step.length();
            if dist > cfg.clamp_max_step {
                lm.position = last + step * (cfg.clamp_max_step / dist);
            }
        }

        table[id.index()] = current;
    }

    for id in [chain.pip, chain.dip, chain.tip] {
        if let Some(lm) = table[id.index()] {
            if lm.confidence >= hold {
                last_good.insert(id, lm.position);
            }
        }
    }

    JointId::ALL
        .iter()
        .filter_map(|id| table[id.index()])
        .collect()
}
