//! Master playlist assembly. A pure function of the completed renditions:
//! the same set always renders byte-identical output, which is what lets
//! CDNs and caches treat `master.m3u8` as immutable.

#[derive(Clone, Debug, PartialEq)]
pub struct ManifestVariant {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub bandwidth: u64,
    /// Playlist URI relative to the master playlist, e.g. `720p/playlist.m3u8`.
    pub playlist_uri: String,
}

/// Renders the master playlist, variants ordered by ascending bandwidth
/// (ties broken by label so the ordering is total).
pub fn build_master_playlist(variants: &[ManifestVariant]) -> String {
    let mut sorted: Vec<&ManifestVariant> = variants.iter().collect();
    sorted.sort_by(|a, b| a.bandwidth.cmp(&b.bandwidth).then_with(|| a.label.cmp(&b.label)));

    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for variant in sorted {
        out.push_str(&format!(
            "\n#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}\n",
            variant.bandwidth, variant.width, variant.height, variant.playlist_uri
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_variants() -> Vec<ManifestVariant> {
        vec![
            ManifestVariant {
                label: "1080p".into(),
                width: 1920,
                height: 1080,
                bandwidth: 5_500_000,
                playlist_uri: "1080p/playlist.m3u8".into(),
            },
            ManifestVariant {
                label: "480p".into(),
                width: 854,
                height: 480,
                bandwidth: 1_100_000,
                playlist_uri: "480p/playlist.m3u8".into(),
            },
            ManifestVariant {
                label: "720p".into(),
                width: 1280,
                height: 720,
                bandwidth: 2_800_000,
                playlist_uri: "720p/playlist.m3u8".into(),
            },
        ]
    }

    #[test]
    fn orders_variants_by_ascending_bandwidth() {
        let playlist = build_master_playlist(&sample_variants());
        let p480 = playlist.find("480p/playlist.m3u8").unwrap();
        let p720 = playlist.find("720p/playlist.m3u8").unwrap();
        let p1080 = playlist.find("1080p/playlist.m3u8").unwrap();
        assert!(p480 < p720 && p720 < p1080);
    }

    #[test]
    fn renders_expected_bytes() {
        let variants = vec![ManifestVariant {
            label: "480p".into(),
            width: 854,
            height: 480,
            bandwidth: 1_100_000,
            playlist_uri: "480p/playlist.m3u8".into(),
        }];
        let expected = "#EXTM3U\n#EXT-X-VERSION:3\n\n\
                        #EXT-X-STREAM-INF:BANDWIDTH=1100000,RESOLUTION=854x480\n\
                        480p/playlist.m3u8\n";
        assert_eq!(build_master_playlist(&variants), expected);
    }

    #[test]
    fn rebuild_is_byte_identical_regardless_of_input_order() {
        let mut variants = sample_variants();
        let first = build_master_playlist(&variants);
        variants.reverse();
        let second = build_master_playlist(&variants);
        assert_eq!(first, second);
        variants.swap(0, 1);
        assert_eq!(build_master_playlist(&variants), first);
    }

    #[test]
    fn references_exactly_the_given_renditions() {
        let playlist = build_master_playlist(&sample_variants());
        assert_eq!(playlist.matches("#EXT-X-STREAM-INF").count(), 3);
        assert!(!playlist.contains("4k"));
    }
}
