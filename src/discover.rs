mod ffprobe;

pub(crate) use ffprobe::{probe, ProbeError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Dimensions {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// Coarse orientation bucket for a video stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AspectRatio {
    Portrait,
    Landscape,
    Other,
}

impl AspectRatio {
    /// Classify by comparing integer quotients against the 16:9 family.
    ///
    /// This only matches dimensions whose truncated quotients line up, so near-16:9 sizes with
    /// remainders can land in `Other`. Zero-sized streams classify as `Portrait`.
    pub(crate) const fn from_dimensions(Dimensions { width, height }: Dimensions) -> Self {
        if height / 16 == width / 9 {
            AspectRatio::Portrait
        } else if height / 9 == width / 16 {
            AspectRatio::Landscape
        } else {
            AspectRatio::Other
        }
    }

    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Dimensions> for AspectRatio {
    fn from(dimensions: Dimensions) -> Self {
        Self::from_dimensions(dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::{AspectRatio, Dimensions};

    fn classify(width: u32, height: u32) -> AspectRatio {
        AspectRatio::from_dimensions(Dimensions { width, height })
    }

    #[test]
    fn full_hd() {
        assert_eq!(classify(1920, 1080), AspectRatio::Landscape);
        assert_eq!(classify(1080, 1920), AspectRatio::Portrait);
    }

    #[test]
    fn square() {
        assert_eq!(classify(1000, 1000), AspectRatio::Other);
    }

    #[test]
    fn sixteen_nine_family() {
        assert_eq!(classify(1280, 720), AspectRatio::Landscape);
        assert_eq!(classify(3840, 2160), AspectRatio::Landscape);
        assert_eq!(classify(720, 1280), AspectRatio::Portrait);
    }

    #[test]
    fn truncation_matches_near_ratios() {
        // 854 / 16 == 53 and 480 / 9 == 53
        assert_eq!(classify(854, 480), AspectRatio::Landscape);
        assert_eq!(classify(640, 480), AspectRatio::Other);
    }

    #[test]
    fn zero_sized() {
        assert_eq!(classify(0, 0), AspectRatio::Portrait);
    }

    #[test]
    fn display() {
        assert_eq!(AspectRatio::Landscape.to_string(), "landscape");
        assert_eq!(AspectRatio::Portrait.to_string(), "portrait");
        assert_eq!(AspectRatio::Other.to_string(), "other");
    }
}
