use std::sync::OnceLock;

pub(crate) fn video_mp4() -> &'static mime::Mime {
    static VIDEO_MP4: OnceLock<mime::Mime> = OnceLock::new();

    VIDEO_MP4.get_or_init(|| "video/mp4".parse().expect("video/mp4 is a valid media type"))
}

/// Image formats accepted as video thumbnails
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThumbnailFormat {
    Jpeg,
    Png,
}

impl ThumbnailFormat {
    /// Matches on the essence of `media_type`, so parameters like charset are ignored
    pub(crate) fn from_media_type(media_type: &mime::Mime) -> Option<Self> {
        match media_type.essence_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub(crate) const fn media_type(self) -> mime::Mime {
        match self {
            Self::Jpeg => mime::IMAGE_JPEG,
            Self::Png => mime::IMAGE_PNG,
        }
    }
}

/// Whether `media_type` is a video this service accepts for upload
pub(crate) fn is_video_mp4(media_type: &mime::Mime) -> bool {
    media_type.essence_str() == video_mp4().essence_str()
}

#[cfg(test)]
mod tests {
    use super::{is_video_mp4, ThumbnailFormat};

    #[test]
    fn mp4_ignores_parameters() {
        assert!(is_video_mp4(&"video/mp4".parse().unwrap()));
        assert!(is_video_mp4(&"video/mp4; codecs=avc1".parse().unwrap()));
        assert!(!is_video_mp4(&"video/webm".parse().unwrap()));
        assert!(!is_video_mp4(&mime::IMAGE_PNG));
    }

    #[test]
    fn thumbnail_formats() {
        assert_eq!(
            ThumbnailFormat::from_media_type(&mime::IMAGE_PNG),
            Some(ThumbnailFormat::Png)
        );
        assert_eq!(
            ThumbnailFormat::from_media_type(&"image/jpeg".parse().unwrap()),
            Some(ThumbnailFormat::Jpeg)
        );
        assert_eq!(ThumbnailFormat::from_media_type(&mime::IMAGE_GIF), None);
        assert_eq!(ThumbnailFormat::Png.media_type(), mime::IMAGE_PNG);
    }
}
