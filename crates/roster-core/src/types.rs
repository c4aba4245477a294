use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::search::normalize_for_search;

/// Opaque participant identifier, unique within a group.
///
/// Serialized and displayed as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberIdentity(Vec<u8>);

impl MemberIdentity {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex-encoded identity.
    pub fn from_hex(value: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(value.trim()).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for MemberIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for MemberIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberIdentity({})", self.to_hex())
    }
}

impl From<&[u8]> for MemberIdentity {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for MemberIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for MemberIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_hex(&value).map_err(de::Error::custom)
    }
}

/// Linked contact record for a member the user already knows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactRef {
    pub identity: MemberIdentity,
    /// Name published by the contact.
    pub display_name: String,
    /// Local nickname set by the user, takes precedence when present.
    #[serde(default)]
    pub custom_name: Option<String>,
}

/// Identity-details snapshot carried by group membership without a contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IdentityDetails {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl IdentityDetails {
    /// "First Last", skipping blank parts. `None` when both are blank.
    pub fn full_name(&self) -> Option<String> {
        let parts = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    fn searchable_parts(&self) -> impl Iterator<Item = &str> {
        [
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.company.as_deref(),
            self.position.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// One row of the group-membership query supplied by the engine layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberRow {
    pub identity: MemberIdentity,
    #[serde(default)]
    pub contact: Option<ContactRef>,
    #[serde(default)]
    pub details: Option<IdentityDetails>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub admin: bool,
}

/// Display projection of a group participant.
#[derive(Debug, Clone)]
pub struct GroupMember {
    pub identity: MemberIdentity,
    pub contact: Option<ContactRef>,
    pub identity_details: Option<IdentityDetails>,
    /// Accent-stripped lowercase text used by member filtering.
    pub search_string: String,
    /// Invited but not yet joined.
    pub pending: bool,
    pub admin: bool,
    pub is_you: bool,
    pub removable: bool,
    pub selected: bool,
}

impl GroupMember {
    /// Build a member from a membership row.
    ///
    /// `can_remove` is whether the current user may remove members at all;
    /// the user's own row is never removable.
    pub fn from_row(row: MemberRow, own_identity: &MemberIdentity, can_remove: bool) -> Self {
        let is_you = row.identity == *own_identity;
        let search_string = build_search_string(row.contact.as_ref(), row.details.as_ref());
        Self {
            identity: row.identity,
            contact: row.contact,
            identity_details: row.details,
            search_string,
            pending: row.pending,
            admin: row.admin,
            is_you,
            removable: can_remove && !is_you,
            selected: false,
        }
    }

    /// Best available human-readable name.
    pub fn display_name(&self) -> String {
        if let Some(contact) = &self.contact {
            if let Some(custom) = contact
                .custom_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
            {
                return custom.to_owned();
            }
            if !contact.display_name.trim().is_empty() {
                return contact.display_name.trim().to_owned();
            }
        }
        self.identity_details
            .as_ref()
            .and_then(IdentityDetails::full_name)
            .unwrap_or_else(|| self.identity.to_hex())
    }
}

impl PartialEq for GroupMember {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.pending == other.pending
            && self.admin == other.admin
            && self.selected == other.selected
            && self.contact == other.contact
            && self.identity_details == other.identity_details
            && self.search_string == other.search_string
    }
}

impl Eq for GroupMember {}

/// Project query rows into fresh, unselected members.
pub fn members_from_rows(
    rows: Vec<MemberRow>,
    own_identity: &MemberIdentity,
    can_remove: bool,
) -> Vec<GroupMember> {
    rows.into_iter()
        .map(|row| GroupMember::from_row(row, own_identity, can_remove))
        .collect()
}

fn build_search_string(contact: Option<&ContactRef>, details: Option<&IdentityDetails>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(contact) = contact {
        if let Some(custom) = contact.custom_name.as_deref() {
            parts.push(custom);
        }
        parts.push(&contact.display_name);
    }
    if let Some(details) = details {
        parts.extend(details.searchable_parts());
    }

    let joined = parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_for_search(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(first: &str, last: &str) -> IdentityDetails {
        IdentityDetails {
            first_name: Some(first.to_owned()),
            last_name: Some(last.to_owned()),
            company: Some("Acmé".to_owned()),
            position: None,
        }
    }

    fn pending_row(id: u8) -> MemberRow {
        MemberRow {
            identity: MemberIdentity::new(vec![id]),
            contact: None,
            details: Some(details("Élodie", "Durand")),
            pending: true,
            admin: false,
        }
    }

    #[test]
    fn identity_hex_round_trips_through_json() {
        let identity = MemberIdentity::new(vec![0xde, 0xad, 0x01]);
        let encoded = serde_json::to_string(&identity).expect("encode");
        assert_eq!(encoded, "\"dead01\"");
        let decoded: MemberIdentity = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, identity);
    }

    #[test]
    fn rejects_invalid_hex_identity() {
        assert!(MemberIdentity::from_hex("zz").is_err());
        assert!(serde_json::from_str::<MemberIdentity>("\"abc\"").is_err());
    }

    #[test]
    fn pending_member_search_string_comes_from_details() {
        let own = MemberIdentity::new(vec![0xff]);
        let member = GroupMember::from_row(pending_row(1), &own, true);
        assert_eq!(member.search_string, "elodie durand acme");
        assert_eq!(member.display_name(), "Élodie Durand");
        assert!(member.pending);
        assert!(member.removable);
        assert!(!member.is_you);
        assert!(!member.selected);
    }

    #[test]
    fn own_row_is_never_removable() {
        let own = MemberIdentity::new(vec![7]);
        let member = GroupMember::from_row(pending_row(7), &own, true);
        assert!(member.is_you);
        assert!(!member.removable);
    }

    #[test]
    fn contact_custom_name_wins_for_display() {
        let identity = MemberIdentity::new(vec![2]);
        let row = MemberRow {
            identity: identity.clone(),
            contact: Some(ContactRef {
                identity,
                display_name: "Robert Martin".to_owned(),
                custom_name: Some("Bob".to_owned()),
            }),
            details: None,
            pending: false,
            admin: true,
        };
        let member = GroupMember::from_row(row, &MemberIdentity::new(vec![9]), false);
        assert_eq!(member.display_name(), "Bob");
        assert_eq!(member.search_string, "bob robert martin");
        assert!(!member.removable);
    }

    #[test]
    fn display_name_falls_back_to_hex() {
        let row = MemberRow {
            identity: MemberIdentity::new(vec![0xab, 0xcd]),
            contact: None,
            details: None,
            pending: true,
            admin: false,
        };
        let member = GroupMember::from_row(row, &MemberIdentity::new(vec![0]), false);
        assert_eq!(member.display_name(), "abcd");
        assert_eq!(member.search_string, "");
    }

    #[test]
    fn equality_ignores_removable_flag() {
        let own = MemberIdentity::new(vec![0xff]);
        let a = GroupMember::from_row(pending_row(1), &own, true);
        let mut b = GroupMember::from_row(pending_row(1), &own, false);
        assert_eq!(a, b);

        b.selected = true;
        assert_ne!(a, b);
    }

    #[test]
    fn row_flags_default_when_missing_from_json() {
        let row: MemberRow =
            serde_json::from_str(r#"{"identity":"0a0b"}"#).expect("row should parse");
        assert_eq!(row.identity.as_bytes(), &[0x0a, 0x0b]);
        assert!(!row.pending);
        assert!(!row.admin);
        assert!(row.contact.is_none());
    }
}
