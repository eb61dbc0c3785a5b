use nostr_sdk::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::domain::text::shorten_npub;

/// Editable profile metadata (NIP-01 kind 0)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub picture: Option<String>,
    pub website: Option<String>,
    pub nip05: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProfileField {
    Name,
    DisplayName,
    About,
    Picture,
    Website,
    #[strum(serialize = "nip05")]
    Nip05,
}

impl Profile {
    /// Preferred author label: display name, then name
    pub fn label(&self) -> Option<&str> {
        [&self.display_name, &self.name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }

    pub fn get(&self, field: ProfileField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Set a field from form input; blank input clears it
    pub fn set(&mut self, field: ProfileField, value: &str) {
        let value = value.trim();
        *self.slot_mut(field) = (!value.is_empty()).then(|| value.to_string());
    }

    fn slot(&self, field: ProfileField) -> &Option<String> {
        match field {
            ProfileField::Name => &self.name,
            ProfileField::DisplayName => &self.display_name,
            ProfileField::About => &self.about,
            ProfileField::Picture => &self.picture,
            ProfileField::Website => &self.website,
            ProfileField::Nip05 => &self.nip05,
        }
    }

    fn slot_mut(&mut self, field: ProfileField) -> &mut Option<String> {
        match field {
            ProfileField::Name => &mut self.name,
            ProfileField::DisplayName => &mut self.display_name,
            ProfileField::About => &mut self.about,
            ProfileField::Picture => &mut self.picture,
            ProfileField::Website => &mut self.website,
            ProfileField::Nip05 => &mut self.nip05,
        }
    }
}

impl From<&Metadata> for Profile {
    fn from(metadata: &Metadata) -> Self {
        Self {
            name: metadata.name.clone(),
            display_name: metadata.display_name.clone(),
            about: metadata.about.clone(),
            picture: metadata.picture.clone(),
            website: metadata.website.clone(),
            nip05: metadata.nip05.clone(),
        }
    }
}

impl From<&Profile> for Metadata {
    fn from(profile: &Profile) -> Self {
        let mut metadata = Metadata::new();
        metadata.name = profile.name.clone();
        metadata.display_name = profile.display_name.clone();
        metadata.about = profile.about.clone();
        metadata.picture = profile.picture.clone();
        metadata.website = profile.website.clone();
        metadata.nip05 = profile.nip05.clone();
        metadata
    }
}

/// Label for an author, falling back to a shortened npub when no profile is known
pub fn author_label(pubkey: &PublicKey, profile: Option<&Profile>) -> String {
    if let Some(label) = profile.and_then(Profile::label) {
        return label.to_string();
    }

    let Ok(npub) = pubkey.to_bech32();
    shorten_npub(npub)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::*;

    use super::*;

    fn pubkey() -> PublicKey {
        PublicKey::from_hex("4d39c23b3b03bf99494df5f3a149c7908ae1bc7416807fdd6b34a31886eaae25")
            .expect("valid public key")
    }

    #[test]
    fn test_label_prefers_display_name() {
        let profile = Profile {
            name: Some(String::from("alice123")),
            display_name: Some(String::from("Alice")),
            ..Profile::default()
        };
        assert_eq!(profile.label(), Some("Alice"));
    }

    #[test]
    fn test_label_skips_empty_display_name() {
        let profile = Profile {
            name: Some(String::from("bob")),
            display_name: Some(String::new()),
            ..Profile::default()
        };
        assert_eq!(profile.label(), Some("bob"));
        assert_eq!(Profile::default().label(), None);
    }

    #[test]
    fn test_author_label_falls_back_to_npub() {
        assert_eq!(author_label(&pubkey(), None), "f5uuy:mjmug");

        let profile = Profile::default();
        assert_eq!(author_label(&pubkey(), Some(&profile)), "f5uuy:mjmug");

        let profile = Profile {
            name: Some(String::from("akiomik")),
            ..Profile::default()
        };
        assert_eq!(author_label(&pubkey(), Some(&profile)), "akiomik");
    }

    #[rstest]
    #[case("name", ProfileField::Name)]
    #[case("display_name", ProfileField::DisplayName)]
    #[case("About", ProfileField::About)]
    #[case("nip05", ProfileField::Nip05)]
    fn test_profile_field_from_str(#[case] input: &str, #[case] expected: ProfileField) {
        assert_eq!(input.parse::<ProfileField>().ok(), Some(expected));
    }

    #[test]
    fn test_set_blank_clears_field() {
        let mut profile = Profile::default();
        profile.set(ProfileField::Website, "  https://x.com/alice ");
        assert_eq!(profile.get(ProfileField::Website), Some("https://x.com/alice"));

        profile.set(ProfileField::Website, "   ");
        assert_eq!(profile.get(ProfileField::Website), None);
    }

    #[test]
    fn test_metadata_conversion() {
        let profile = Profile {
            name: Some(String::from("alice")),
            about: Some(String::from("よろしく！")),
            nip05: Some(String::from("alice@example.com")),
            ..Profile::default()
        };
        let metadata = Metadata::from(&profile);
        assert_eq!(metadata.name.as_deref(), Some("alice"));
        assert_eq!(Profile::from(&metadata), profile);
    }
}
