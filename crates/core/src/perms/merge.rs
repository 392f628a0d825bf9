//! Overwrite set merging.

use super::types::Overwrite;

/// Merge `base` overwrites into `overrides`.
///
/// For each base entry targeting a principal that also appears in
/// `overrides`, the two are combined bitwise: allows are OR-ed, denies are
/// OR-ed, and any bit present in both masks is cleared from the deny side
/// (an allow always wins). Base entries with no matching principal are
/// appended unchanged. Inputs are never mutated; the result owns fresh
/// copies. Output order is overrides first, then unmatched base entries.
pub fn merge_overwrites(base: &[Overwrite], overrides: &[Overwrite]) -> Vec<Overwrite> {
    let mut merged: Vec<Overwrite> = overrides.to_vec();

    'outer: for b in base {
        for m in merged.iter_mut() {
            if m.same_principal(b) {
                m.allow |= b.allow;
                m.deny |= b.deny;
                // clear the overlapping bits on the deny side
                m.deny = m.deny & !m.allow;
                continue 'outer;
            }
        }

        merged.push(b.clone());
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perms::{Permissions, PrincipalKind};

    #[test]
    fn test_disjoint_sets_concatenate() {
        let base = vec![Overwrite::role_allow(1, Permissions::SEND_MESSAGES)];
        let overrides = vec![Overwrite::member_allow(2, Permissions::VIEW_CHANNEL)];

        let merged = merge_overwrites(&base, &overrides);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, 2);
        assert_eq!(merged[1].id, 1);
    }

    #[test]
    fn test_matching_principal_is_combined() {
        let base = vec![Overwrite {
            kind: PrincipalKind::Role,
            id: 7,
            allow: Permissions::SEND_MESSAGES,
            deny: Permissions::ATTACH_FILES,
        }];
        let overrides = vec![Overwrite {
            kind: PrincipalKind::Role,
            id: 7,
            allow: Permissions::VIEW_CHANNEL,
            deny: Permissions::EMBED_LINKS,
        }];

        let merged = merge_overwrites(&base, &overrides);
        assert_eq!(merged.len(), 1);
        assert!(merged[0]
            .allow
            .contains(Permissions::SEND_MESSAGES | Permissions::VIEW_CHANNEL));
        assert!(merged[0]
            .deny
            .contains(Permissions::ATTACH_FILES | Permissions::EMBED_LINKS));
    }

    #[test]
    fn test_allow_wins_over_deny() {
        let base = vec![Overwrite::role_deny(3, Permissions::IN_TICKET)];
        let overrides = vec![Overwrite::role_allow(3, Permissions::SEND_MESSAGES)];

        let merged = merge_overwrites(&base, &overrides);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].allow.contains(Permissions::SEND_MESSAGES));
        // the denied bundle lost its send-messages bit
        assert!(!merged[0].deny.contains(Permissions::SEND_MESSAGES));
        assert!(merged[0].deny.contains(Permissions::VIEW_CHANNEL));
    }

    #[test]
    fn test_no_overlapping_bits_for_any_pair() {
        // exhaustive sweep over small bit patterns
        for base_allow in 0u64..8 {
            for base_deny in 0u64..8 {
                for over_allow in 0u64..8 {
                    for over_deny in 0u64..8 {
                        let base = vec![Overwrite {
                            kind: PrincipalKind::Member,
                            id: 1,
                            allow: Permissions(base_allow),
                            deny: Permissions(base_deny),
                        }];
                        let overrides = vec![Overwrite {
                            kind: PrincipalKind::Member,
                            id: 1,
                            allow: Permissions(over_allow),
                            deny: Permissions(over_deny),
                        }];
                        let merged = merge_overwrites(&base, &overrides);
                        assert_eq!(merged.len(), 1);
                        assert_eq!(
                            merged[0].allow.0 & merged[0].deny.0,
                            0,
                            "allow/deny overlap for ({base_allow},{base_deny},{over_allow},{over_deny})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_role_and_member_with_same_id_stay_separate() {
        let base = vec![Overwrite::role_allow(5, Permissions::SEND_MESSAGES)];
        let overrides = vec![Overwrite::member_allow(5, Permissions::VIEW_CHANNEL)];

        let merged = merge_overwrites(&base, &overrides);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_inputs_not_mutated() {
        let base = vec![Overwrite::role_deny(1, Permissions::IN_TICKET)];
        let overrides = vec![Overwrite::role_allow(1, Permissions::IN_TICKET)];
        let base_before = base.clone();
        let overrides_before = overrides.clone();

        let _ = merge_overwrites(&base, &overrides);
        assert_eq!(base, base_before);
        assert_eq!(overrides, overrides_before);
    }
}
