//! Permission bitset and overwrite types.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// A channel permission bitset.
///
/// Bit positions follow the chat platform's permission flags; only the bits
/// this service cares about get named constants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);

    pub const ADMINISTRATOR: Permissions = Permissions(1 << 3);
    pub const VIEW_CHANNEL: Permissions = Permissions(1 << 10);
    pub const SEND_MESSAGES: Permissions = Permissions(1 << 11);
    pub const EMBED_LINKS: Permissions = Permissions(1 << 14);
    pub const ATTACH_FILES: Permissions = Permissions(1 << 15);
    pub const READ_MESSAGE_HISTORY: Permissions = Permissions(1 << 16);

    /// The full in-ticket permission bundle: everything a principal needs to
    /// meaningfully participate in a ticket channel.
    pub const IN_TICKET: Permissions = Permissions(
        Self::READ_MESSAGE_HISTORY.0
            | Self::VIEW_CHANNEL.0
            | Self::SEND_MESSAGES.0
            | Self::EMBED_LINKS.0
            | Self::ATTACH_FILES.0,
    );

    /// Returns true if every bit of `other` is set in `self`.
    pub fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bits of `required` that are missing from `self`.
    pub fn missing(self, required: Permissions) -> Permissions {
        Permissions(required.0 & !self.0)
    }

    /// Human readable names of the set bits, for user-facing permission
    /// errors. Unknown bits are omitted.
    pub fn humanize(self) -> String {
        const NAMES: &[(Permissions, &str)] = &[
            (Permissions::ADMINISTRATOR, "Administrator"),
            (Permissions::VIEW_CHANNEL, "View Channel"),
            (Permissions::SEND_MESSAGES, "Send Messages"),
            (Permissions::EMBED_LINKS, "Embed Links"),
            (Permissions::ATTACH_FILES, "Attach Files"),
            (Permissions::READ_MESSAGE_HISTORY, "Read Message History"),
        ];

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        names.join(", ")
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Permissions) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Permissions;

    fn bitand(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 & rhs.0)
    }
}

impl Not for Permissions {
    type Output = Permissions;

    fn not(self) -> Permissions {
        Permissions(!self.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Which kind of principal an overwrite targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Role,
    Member,
}

/// An access-control entry granting or denying permission bits to a role or
/// member on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overwrite {
    pub kind: PrincipalKind,
    /// Role or user id, depending on `kind`.
    pub id: u64,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

impl Overwrite {
    /// An overwrite allowing `allow` for a role, denying nothing.
    pub fn role_allow(id: u64, allow: Permissions) -> Self {
        Self {
            kind: PrincipalKind::Role,
            id,
            allow,
            deny: Permissions::NONE,
        }
    }

    /// An overwrite denying `deny` for a role, allowing nothing.
    pub fn role_deny(id: u64, deny: Permissions) -> Self {
        Self {
            kind: PrincipalKind::Role,
            id,
            allow: Permissions::NONE,
            deny,
        }
    }

    /// An overwrite allowing `allow` for a member, denying nothing.
    pub fn member_allow(id: u64, allow: Permissions) -> Self {
        Self {
            kind: PrincipalKind::Member,
            id,
            allow,
            deny: Permissions::NONE,
        }
    }

    /// True if this overwrite targets the same principal as `other`.
    pub fn same_principal(&self, other: &Overwrite) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}
