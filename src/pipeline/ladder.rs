use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One quality tier of the rendition ladder. The ladder is configuration,
/// not code: new tiers are added by extending RENDITION_LADDER, never by
/// branching on labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RenditionTier {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Peak bandwidth advertised in the master playlist, bits per second.
    pub bandwidth: u64,
    pub video_bitrate_k: u32,
    pub audio_bitrate_k: u32,
}

pub fn default_ladder() -> Vec<RenditionTier> {
    vec![
        RenditionTier {
            label: "480p".to_string(),
            width: 854,
            height: 480,
            bandwidth: 1_100_000,
            video_bitrate_k: 1000,
            audio_bitrate_k: 128,
        },
        RenditionTier {
            label: "720p".to_string(),
            width: 1280,
            height: 720,
            bandwidth: 2_800_000,
            video_bitrate_k: 2500,
            audio_bitrate_k: 128,
        },
        RenditionTier {
            label: "1080p".to_string(),
            width: 1920,
            height: 1080,
            bandwidth: 5_500_000,
            video_bitrate_k: 5000,
            audio_bitrate_k: 192,
        },
        RenditionTier {
            label: "4k".to_string(),
            width: 3840,
            height: 2160,
            bandwidth: 13_000_000,
            video_bitrate_k: 12000,
            audio_bitrate_k: 192,
        },
    ]
}

/// Splits the requested ladder into tiers to encode and tiers to skip.
/// A tier is skipped when its target height exceeds the source height
/// (never upscale). If every tier would be skipped, the lowest tier is
/// kept so the job still produces one playable rendition.
pub fn select_tiers(ladder: &[RenditionTier], source_height: u32) -> (Vec<RenditionTier>, Vec<String>) {
    let mut selected: Vec<RenditionTier> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();

    for tier in ladder {
        if tier.height <= source_height {
            selected.push(tier.clone());
        } else {
            skipped.push(tier.label.clone());
        }
    }

    if selected.is_empty() {
        if let Some(lowest) = ladder.iter().min_by_key(|t| t.height) {
            selected.push(lowest.clone());
            skipped.retain(|label| *label != lowest.label);
        }
    }

    (selected, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_tiers_above_source_height() {
        let ladder = default_ladder();
        let (selected, skipped) = select_tiers(&ladder, 1080);

        let labels: Vec<&str> = selected.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["480p", "720p", "1080p"]);
        assert_eq!(skipped, vec!["4k".to_string()]);
    }

    #[test]
    fn keeps_full_ladder_for_uhd_source() {
        let ladder = default_ladder();
        let (selected, skipped) = select_tiers(&ladder, 2160);
        assert_eq!(selected.len(), 4);
        assert!(skipped.is_empty());
    }

    #[test]
    fn falls_back_to_lowest_tier_for_tiny_source() {
        let ladder = default_ladder();
        let (selected, skipped) = select_tiers(&ladder, 240);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].label, "480p");
        assert!(!skipped.contains(&"480p".to_string()));
        assert_eq!(skipped, vec!["720p".to_string(), "1080p".to_string(), "4k".to_string()]);
    }

    #[test]
    fn ladder_round_trips_through_json() {
        let ladder = default_ladder();
        let raw = serde_json::to_string(&ladder).unwrap();
        let parsed: Vec<RenditionTier> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, ladder);
    }
}
