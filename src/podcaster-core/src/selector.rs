//! Engine selection.
//!
//! The preference order is a static table keyed by policy and segment kind.
//! Selection filters that table by availability.

use std::sync::Arc;

use crate::backend::{BackendSet, EngineKind, TtsBackend};
use crate::config::{EnginePolicy, PodcastConfig};
use crate::script::SegmentKind;

const HEADLINE_MIXED: &[EngineKind] = &[EngineKind::ElevenLabs, EngineKind::Kokoro, EngineKind::Mock];
const TEXT_MIXED: &[EngineKind] = &[EngineKind::Kokoro, EngineKind::ElevenLabs, EngineKind::Mock];

/// Engines to try, in order, for a segment kind under a policy.
pub fn preference_order(policy: EnginePolicy, kind: SegmentKind) -> &'static [EngineKind] {
    match (policy, kind) {
        (EnginePolicy::Kokoro, _) => &[EngineKind::Kokoro],
        (EnginePolicy::ElevenLabs, _) => &[EngineKind::ElevenLabs],
        (EnginePolicy::Mock, _) => &[EngineKind::Mock],
        (EnginePolicy::Mixed, SegmentKind::Headline) => HEADLINE_MIXED,
        (EnginePolicy::Mixed, SegmentKind::Text) => TEXT_MIXED,
    }
}

/// Available adapters to try for a segment, in preference order.
///
/// Under the mixed policy the mock engine always ends the list. Single-engine
/// policies return at most their one engine; the segment synthesizer covers an
/// unavailable engine with the mock fallback.
pub fn select(
    kind: SegmentKind,
    config: &PodcastConfig,
    backends: &BackendSet,
) -> Vec<Arc<dyn TtsBackend>> {
    let mut chain: Vec<Arc<dyn TtsBackend>> = preference_order(config.tts_engine, kind)
        .iter()
        .map(|&engine| backends.get(engine))
        .filter(|backend| backend.is_available())
        .cloned()
        .collect();

    if config.tts_engine == EnginePolicy::Mixed
        && !chain.iter().any(|b| b.engine() == EngineKind::Mock)
    {
        chain.push(Arc::clone(backends.mock()));
    }

    chain
}
