use crate::discover::AspectRatio;

const TOKEN_BYTES: usize = 32;

/// How keys are laid out inside the bucket
///
/// A deployment should pick one layout and keep it, since existing URLs are never rewritten
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    serde::Deserialize,
    serde::Serialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub(crate) enum KeyLayout {
    /// `{aspect_ratio}/{token}.{ext}`
    #[default]
    AspectRatio,

    /// `{token}.{ext}`
    Flat,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ObjectKey {
    inner: String,
}

impl ObjectKey {
    pub(crate) fn generate(layout: KeyLayout, aspect_ratio: AspectRatio, extension: &str) -> Self {
        let token = generate_token();

        let inner = match layout {
            KeyLayout::AspectRatio => format!("{aspect_ratio}/{token}.{extension}"),
            KeyLayout::Flat => format!("{token}.{extension}"),
        };

        ObjectKey { inner }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.inner
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();

    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::{KeyLayout, ObjectKey};
    use crate::discover::AspectRatio;

    fn is_token(s: &str) -> bool {
        s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    #[test]
    fn aspect_ratio_layout() {
        let key = ObjectKey::generate(KeyLayout::AspectRatio, AspectRatio::Landscape, "mp4");

        let (prefix, file) = key.as_str().split_once('/').unwrap();
        let token = file.strip_suffix(".mp4").unwrap();

        assert_eq!(prefix, "landscape");
        assert!(is_token(token), "{token}");
    }

    #[test]
    fn flat_layout() {
        let key = ObjectKey::generate(KeyLayout::Flat, AspectRatio::Portrait, "mp4");

        assert!(!key.as_str().contains('/'));
        assert!(is_token(key.as_str().strip_suffix(".mp4").unwrap()));
    }

    #[test]
    fn keys_are_unique() {
        let a = ObjectKey::generate(KeyLayout::AspectRatio, AspectRatio::Other, "mp4");
        let b = ObjectKey::generate(KeyLayout::AspectRatio, AspectRatio::Other, "mp4");

        assert_ne!(a, b);
    }

    #[test]
    fn layout_config_names() {
        let layout: KeyLayout = serde_json::from_str(r#""aspect_ratio""#).unwrap();
        assert_eq!(layout, KeyLayout::AspectRatio);

        let layout: KeyLayout = serde_json::from_str(r#""flat""#).unwrap();
        assert_eq!(layout, KeyLayout::Flat);
    }
}
