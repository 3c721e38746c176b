// FormatSelector - turns a quality hint into a yt-dlp format spec
//
// Video hints are pixel-height ceilings ("1080", "720p") or "best".
// Audio hints are bitrates ("192") or VBR levels (0-10) for ffmpeg.

use regex::Regex;

use super::models::MediaKind;

lazy_static::lazy_static! {
    static ref HEIGHT_RE: Regex = Regex::new(r"^\s*(\d+)\s*[pP]?\s*$").unwrap();
    static ref BITRATE_RE: Regex = Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([kK])?\s*$").unwrap();
}

/// Format spec used when no height limit applies
pub const BEST_VIDEO_SPEC: &str = "bestvideo+bestaudio/best";

/// Format spec for audio extraction
pub const BEST_AUDIO_SPEC: &str = "bestaudio/best";

pub struct FormatSelector;

impl FormatSelector {
    /// Height ceiling implied by a video quality hint, `None` for "best"
    /// or anything without a usable number
    pub fn height_limit(quality: &str) -> Option<u32> {
        if quality.trim().eq_ignore_ascii_case("best") {
            return None;
        }
        HEIGHT_RE
            .captures(quality)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|h| *h > 0)
    }

    /// Get format spec for yt-dlp based on kind and quality value
    pub fn get_format_spec(kind: MediaKind, quality: &str) -> String {
        match kind {
            MediaKind::Audio => BEST_AUDIO_SPEC.to_string(),
            MediaKind::Video => match Self::height_limit(quality) {
                // Audio streams carry no height, so the audio cap uses `<=?`
                // which also accepts formats with the field unset.
                Some(h) => format!(
                    "bestvideo[height<={h}]+bestaudio[height<=?{h}]/best[height<={h}]/best"
                ),
                None => BEST_VIDEO_SPEC.to_string(),
            },
        }
    }

    /// Value for `--audio-quality`. Numbers above 10 are bitrates in kbps.
    pub fn audio_quality_arg(quality: &str) -> String {
        if quality.trim().eq_ignore_ascii_case("best") {
            return "0".to_string();
        }
        let Some(caps) = BITRATE_RE.captures(quality) else {
            return quality.trim().to_string();
        };
        let number = &caps[1];
        if caps.get(2).is_some() {
            return format!("{}K", number);
        }
        match number.parse::<f32>() {
            Ok(value) if value > 10.0 => format!("{}K", number),
            _ => number.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_has_no_height_constraint() {
        let spec = FormatSelector::get_format_spec(MediaKind::Video, "best");
        assert_eq!(spec, "bestvideo+bestaudio/best");
        assert!(!spec.contains("height"));
    }

    #[test]
    fn test_numeric_quality_caps_both_streams() {
        let spec = FormatSelector::get_format_spec(MediaKind::Video, "720");
        let first_choice = spec.split('/').next().unwrap();
        assert_eq!(
            first_choice,
            "bestvideo[height<=720]+bestaudio[height<=?720]"
        );
        assert!(spec.ends_with("/best"));
    }

    #[test]
    fn test_p_suffix_accepted() {
        assert_eq!(FormatSelector::height_limit("1080p"), Some(1080));
        assert_eq!(FormatSelector::height_limit(" 480 "), Some(480));
        assert_eq!(FormatSelector::height_limit("BEST"), None);
        assert_eq!(FormatSelector::height_limit("hd"), None);
        assert_eq!(FormatSelector::height_limit("0"), None);
    }

    #[test]
    fn test_unparsable_video_quality_is_best() {
        assert_eq!(
            FormatSelector::get_format_spec(MediaKind::Video, "ultra"),
            BEST_VIDEO_SPEC
        );
    }

    #[test]
    fn test_audio_ignores_height() {
        assert_eq!(
            FormatSelector::get_format_spec(MediaKind::Audio, "720"),
            "bestaudio/best"
        );
    }

    #[test]
    fn test_audio_quality_arg() {
        assert_eq!(FormatSelector::audio_quality_arg("192"), "192K");
        assert_eq!(FormatSelector::audio_quality_arg("320k"), "320K");
        assert_eq!(FormatSelector::audio_quality_arg("0"), "0");
        assert_eq!(FormatSelector::audio_quality_arg("5"), "5");
        assert_eq!(FormatSelector::audio_quality_arg("best"), "0");
        assert_eq!(FormatSelector::audio_quality_arg("high"), "high");
    }
}
