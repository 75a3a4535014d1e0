//! Entity profiles kept in session state and mirrored to browser storage.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entropy::Entropy;
use crate::error::ErrorCode;
use crate::store::{BrowserStore, StoreError};

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "bold", "brisk", "calm", "crimson", "curious", "daring", "dusty",
    "eager", "fancy", "gentle", "golden", "hidden", "humble", "icy", "jolly", "keen", "lively",
    "lucky", "mellow", "misty", "nimble", "noble", "olive", "polar", "proud", "quiet", "rapid",
    "rustic", "silent", "silver", "steady", "sunny", "swift", "tidy", "vivid", "wandering",
    "wild", "zesty",
];

const NOUNS: &[&str] = &[
    "anchor", "badger", "beacon", "birch", "canyon", "cedar", "comet", "delta", "ember",
    "falcon", "fjord", "garnet", "glacier", "harbor", "heron", "island", "juniper", "kestrel",
    "lagoon", "lantern", "maple", "meadow", "nebula", "orchid", "otter", "pebble", "quartz",
    "raven", "reef", "sparrow", "summit", "thistle", "tundra", "valley", "walrus", "willow",
    "yarrow", "zephyr",
];

/// Errors raised while loading or saving a profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("stored profile is invalid: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProfileError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid(_) => ErrorCode::ValidationFailed,
            Self::Store(err) => err.code(),
        }
    }
}

/// Name of an entity: a base namespace (e.g. a family name) plus other names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileName {
    pub namespace: String,
    pub other_names: Vec<String>,
}

/// Representative picture of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileImage {
    /// Base64-encoded image bytes, or a URL.
    pub data: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub credits: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProfile {
    #[serde(default = "new_entity_id")]
    pub entity_id: String,
    #[serde(default)]
    pub name: Option<ProfileName>,
    #[serde(default)]
    pub representative_image: Option<ProfileImage>,
}

/// Edits requested from the profile editor.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate<'a> {
    pub namespace: &'a str,
    /// Whitespace-separated other names.
    pub other_names: &'a str,
    /// Raw bytes of a newly uploaded image.
    pub image: Option<&'a [u8]>,
    pub caption: &'a str,
    pub credits: &'a str,
}

/// Non-fatal outcome of [`EntityProfile::apply_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileWarning {
    /// Caption or credits were given but there is no image to attach them to.
    ImageRequired,
}

impl std::fmt::Display for ProfileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageRequired => f.write_str(
                "A representative image is required if you want to add its caption or credits.",
            ),
        }
    }
}

/// Where [`load_or_create`] found its profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    Stored,
    Generated,
}

fn new_entity_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

fn pick<'a>(entropy: &mut dyn Entropy, words: &[&'a str]) -> &'a str {
    let last = i64::try_from(words.len()).unwrap_or(i64::MAX) - 1;
    let index = usize::try_from(entropy.next_in(0, last)).unwrap_or(0);
    words.get(index).copied().unwrap_or_default()
}

/// Two-word `adjective noun` name.
fn random_name(entropy: &mut dyn Entropy) -> (String, String) {
    (
        pick(entropy, ADJECTIVES).to_string(),
        pick(entropy, NOUNS).to_string(),
    )
}

impl EntityProfile {
    /// Empty profile with a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entity_id: new_entity_id(),
            name: None,
            representative_image: None,
        }
    }

    /// Profile named from two random two-word names.
    ///
    /// The namespace is the first word; the other three words become the
    /// other names. All words are title-cased.
    pub fn random(entropy: &mut dyn Entropy) -> Self {
        let (first, second) = random_name(entropy);
        let (third, fourth) = random_name(entropy);
        Self {
            name: Some(ProfileName {
                namespace: title_case(&first),
                other_names: vec![title_case(&second), title_case(&third), title_case(&fourth)],
            }),
            ..Self::new()
        }
    }

    /// `NAMESPACE, Other Names` as shown in notifications.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.name.as_ref().map(|name| {
            format!(
                "{}, {}",
                name.namespace.to_uppercase(),
                name.other_names.join(" ")
            )
        })
    }

    /// Apply editor changes.
    ///
    /// A new image replaces the current one along with its caption and
    /// credits. Without a new image, caption and credits edit the current
    /// image; if there is none they are dropped with a warning.
    pub fn apply_update(&mut self, update: &ProfileUpdate<'_>) -> Option<ProfileWarning> {
        self.name = Some(ProfileName {
            namespace: update.namespace.to_string(),
            other_names: update
                .other_names
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        });

        if let Some(bytes) = update.image.filter(|bytes| !bytes.is_empty()) {
            self.representative_image = Some(ProfileImage {
                data: STANDARD.encode(bytes),
                caption: update.caption.to_string(),
                credits: update.credits.to_string(),
            });
            return None;
        }

        match self.representative_image.as_mut() {
            Some(image) => {
                image.caption = update.caption.to_string();
                image.credits = update.credits.to_string();
                None
            }
            None if !update.caption.is_empty() || !update.credits.is_empty() => {
                Some(ProfileWarning::ImageRequired)
            }
            None => None,
        }
    }

    /// Decoded image bytes, when the image data is base64 rather than a URL.
    #[must_use]
    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        self.representative_image
            .as_ref()
            .and_then(|image| STANDARD.decode(&image.data).ok())
    }
}

impl Default for EntityProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// Load the profile stored under `key`, or generate and store a random one.
///
/// # Errors
///
/// Returns an error if the store fails or holds an unparseable profile.
pub fn load_or_create(
    store: &mut dyn BrowserStore,
    key: &str,
    entropy: &mut dyn Entropy,
) -> Result<(EntityProfile, ProfileSource), ProfileError> {
    if let Some(text) = store.get(key)? {
        let profile: EntityProfile = serde_json::from_str(&text)?;
        info!(entity = %profile.entity_id, "profile loaded from browser storage");
        return Ok((profile, ProfileSource::Stored));
    }

    let profile = EntityProfile::random(entropy);
    save(store, key, &profile)?;
    info!(entity = %profile.entity_id, "generated random profile");
    Ok((profile, ProfileSource::Generated))
}

/// Write `profile` under `key`.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn save(
    store: &mut dyn BrowserStore,
    key: &str,
    profile: &EntityProfile,
) -> Result<(), ProfileError> {
    let text = serde_json::to_string(profile)?;
    store.set(key, &text)?;
    debug!(entity = %profile.entity_id, "profile saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::DeterministicRng;
    use crate::store::MemoryStore;

    #[test]
    fn random_profile_has_four_title_cased_words() {
        let mut rng = DeterministicRng::new(4);
        let profile = EntityProfile::random(&mut rng);
        let name = profile.name.as_ref().expect("named");
        assert_eq!(name.other_names.len(), 3);
        for word in std::iter::once(&name.namespace).chain(name.other_names.iter()) {
            let first = word.chars().next().expect("non-empty");
            assert!(first.is_uppercase(), "{word} not title-cased");
        }
        assert_eq!(profile.entity_id.len(), 32);
    }

    #[test]
    fn display_name_upper_cases_namespace() {
        let profile = EntityProfile {
            name: Some(ProfileName {
                namespace: "Holmes".into(),
                other_names: vec!["Sherlock".into(), "Scott".into()],
            }),
            ..EntityProfile::new()
        };
        assert_eq!(profile.display_name().as_deref(), Some("HOLMES, Sherlock Scott"));
        assert_eq!(EntityProfile::new().display_name(), None);
    }

    #[test]
    fn update_sets_names_and_encodes_image() {
        let mut profile = EntityProfile::new();
        let warning = profile.apply_update(&ProfileUpdate {
            namespace: "Watson",
            other_names: "  John   Hamish ",
            image: Some(b"png-bytes"),
            caption: "At Baker Street",
            credits: "Mrs Hudson",
        });
        assert_eq!(warning, None);
        let name = profile.name.as_ref().expect("named");
        assert_eq!(name.namespace, "Watson");
        assert_eq!(name.other_names, vec!["John", "Hamish"]);
        let image = profile.representative_image.as_ref().expect("image");
        assert_eq!(image.data, "cG5nLWJ5dGVz");
        assert_eq!(image.caption, "At Baker Street");
        assert_eq!(profile.image_bytes().as_deref(), Some(&b"png-bytes"[..]));
    }

    #[test]
    fn caption_without_image_warns() {
        let mut profile = EntityProfile::new();
        let warning = profile.apply_update(&ProfileUpdate {
            namespace: "Hudson",
            caption: "orphan caption",
            ..ProfileUpdate::default()
        });
        assert_eq!(warning, Some(ProfileWarning::ImageRequired));
        assert!(profile.representative_image.is_none());
        assert_eq!(profile.name.map(|n| n.namespace).as_deref(), Some("Hudson"));
    }

    #[test]
    fn caption_edits_existing_image() {
        let mut profile = EntityProfile::new();
        profile.apply_update(&ProfileUpdate {
            namespace: "Adler",
            image: Some(b"img"),
            ..ProfileUpdate::default()
        });
        let warning = profile.apply_update(&ProfileUpdate {
            namespace: "Adler",
            other_names: "Irene",
            caption: "new caption",
            credits: "new credits",
            ..ProfileUpdate::default()
        });
        assert_eq!(warning, None);
        let image = profile.representative_image.expect("image kept");
        assert_eq!(image.data, STANDARD.encode(b"img"));
        assert_eq!(image.caption, "new caption");
        assert_eq!(image.credits, "new credits");
    }

    #[test]
    fn load_or_create_generates_once_then_reuses() {
        let mut store = MemoryStore::new();
        let mut rng = DeterministicRng::new(12);

        let (first, source) = load_or_create(&mut store, "p", &mut rng).expect("create");
        assert_eq!(source, ProfileSource::Generated);

        let (second, source) = load_or_create(&mut store, "p", &mut rng).expect("load");
        assert_eq!(source, ProfileSource::Stored);
        assert_eq!(first, second);
    }

    #[test]
    fn stored_profile_tolerates_missing_optional_fields() {
        let mut store = MemoryStore::new();
        store
            .set("p", r#"{"name": {"namespace": "Moriarty", "other_names": ["James"]}}"#)
            .expect("seed");
        let mut rng = DeterministicRng::new(0);
        let (profile, source) = load_or_create(&mut store, "p", &mut rng).expect("load");
        assert_eq!(source, ProfileSource::Stored);
        assert_eq!(profile.entity_id.len(), 32);
        assert!(profile.representative_image.is_none());
    }

    #[test]
    fn invalid_stored_profile_is_an_error() {
        let mut store = MemoryStore::new();
        store.set("p", r#"{"name": 5}"#).expect("seed");
        let mut rng = DeterministicRng::new(0);
        let err = load_or_create(&mut store, "p", &mut rng).expect_err("invalid");
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn title_case_normalises_words() {
        assert_eq!(title_case("amber"), "Amber");
        assert_eq!(title_case("mIxEd"), "Mixed");
        assert_eq!(title_case(""), "");
    }
}
