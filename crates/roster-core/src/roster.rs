use std::collections::HashSet;

use tracing::{debug, trace};

use crate::{
    search::{SearchFilter, filter_members},
    types::{GroupMember, MemberIdentity},
};

/// In-memory roster with an active filter and the visible subset it yields.
///
/// Every mutation is applied in full before the visible subset is
/// recomputed, so `visible()` always reflects the latest roster and filter.
#[derive(Debug, Clone, Default)]
pub struct MemberRoster {
    members: Vec<GroupMember>,
    filter: SearchFilter,
    visible: Vec<GroupMember>,
}

impl MemberRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full roster in source order.
    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    /// Members accepted by the current filter, in roster order.
    pub fn visible(&self) -> &[GroupMember] {
        &self.visible
    }

    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    /// Identities currently selected, in roster order.
    pub fn selected_identities(&self) -> Vec<MemberIdentity> {
        self.members
            .iter()
            .filter(|member| member.selected)
            .map(|member| member.identity.clone())
            .collect()
    }

    pub fn find(&self, identity: &MemberIdentity) -> Option<&GroupMember> {
        self.members.iter().find(|member| member.identity == *identity)
    }

    /// Replace the roster and re-apply the current filter.
    pub fn set_members(&mut self, members: Vec<GroupMember>) {
        self.replace_members(members);
        self.refilter();
    }

    /// Compile a new filter from free text and recompute the visible subset.
    pub fn set_search_filter(&mut self, text: &str) {
        self.replace_filter(text);
        self.refilter();
    }

    /// Flip the selection of the member with `identity`.
    ///
    /// Returns the new selection state, or `None` when no member matches.
    pub fn toggle_member_selection(&mut self, identity: &MemberIdentity) -> Option<bool> {
        let toggled = self.flip_selection(identity);
        self.refilter();
        toggled
    }

    /// Bulk selection.
    ///
    /// With `merge == false` the selection becomes exactly `identities`.
    /// With `merge == true` matching members are selected and all others keep
    /// their current state; this is the preselection path applied once to a
    /// freshly loaded roster.
    pub fn set_selected_members(&mut self, identities: &HashSet<MemberIdentity>, merge: bool) {
        self.assign_selection(identities, merge);
        self.refilter();
    }

    pub(crate) fn replace_members(&mut self, members: Vec<GroupMember>) {
        debug!(member_count = members.len(), "roster replaced");
        self.members = members;
    }

    pub(crate) fn replace_filter(&mut self, text: &str) {
        self.filter = SearchFilter::parse(text);
        trace!(
            pattern_count = self.filter.pattern_count(),
            "search filter updated"
        );
    }

    pub(crate) fn flip_selection(&mut self, identity: &MemberIdentity) -> Option<bool> {
        let toggled = self
            .members
            .iter_mut()
            .find(|member| member.identity == *identity)
            .map(|member| {
                member.selected = !member.selected;
                member.selected
            });
        match toggled {
            Some(selected) => debug!(%identity, selected, "member selection toggled"),
            None => trace!(%identity, "toggle ignored: identity not in roster"),
        }
        toggled
    }

    pub(crate) fn assign_selection(&mut self, identities: &HashSet<MemberIdentity>, merge: bool) {
        for member in &mut self.members {
            let wanted = identities.contains(&member.identity);
            if merge {
                if wanted {
                    member.selected = true;
                }
            } else {
                member.selected = wanted;
            }
        }
        debug!(
            requested = identities.len(),
            merge,
            selected = self.members.iter().filter(|m| m.selected).count(),
            "bulk selection applied"
        );
    }

    fn refilter(&mut self) {
        self.visible = filter_members(&self.members, &self.filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemberRow, members_from_rows};

    fn member(id: u8, search: &str) -> GroupMember {
        let mut member = GroupMember::from_row(
            MemberRow {
                identity: MemberIdentity::new(vec![id]),
                contact: None,
                details: None,
                pending: false,
                admin: false,
            },
            &MemberIdentity::new(vec![0]),
            true,
        );
        member.search_string = search.to_owned();
        member
    }

    fn id(value: u8) -> MemberIdentity {
        MemberIdentity::new(vec![value])
    }

    fn roster() -> MemberRoster {
        let mut roster = MemberRoster::new();
        roster.set_members(vec![
            member(1, "alice dupont"),
            member(2, "bob martin"),
            member(3, "carol dumas"),
        ]);
        roster
    }

    fn visible_ids(roster: &MemberRoster) -> Vec<MemberIdentity> {
        roster
            .visible()
            .iter()
            .map(|m| m.identity.clone())
            .collect()
    }

    #[test]
    fn empty_roster_has_empty_visible_subset() {
        let mut roster = MemberRoster::new();
        roster.set_search_filter("alice");
        assert!(roster.visible().is_empty());
        roster.set_search_filter("");
        assert!(roster.visible().is_empty());
    }

    #[test]
    fn blank_filter_keeps_full_roster_in_order() {
        let mut roster = roster();
        roster.set_search_filter("   ");
        assert_eq!(roster.visible(), roster.members());
        assert_eq!(visible_ids(&roster), vec![id(1), id(2), id(3)]);
    }

    #[test]
    fn multi_token_filter_is_an_and() {
        let mut roster = MemberRoster::new();
        roster.set_members(vec![member(1, "alice dupont"), member(2, "bob martin")]);
        roster.set_search_filter("al du");
        assert_eq!(visible_ids(&roster), vec![id(1)]);
    }

    #[test]
    fn visible_matches_brute_force_for_various_filters() {
        let mut roster = roster();
        for filter in ["du", "a", "ar", "o m", "dupont alice", "", "x"] {
            roster.set_search_filter(filter);
            let tokens = filter.split_whitespace().collect::<Vec<_>>();
            let expected = roster
                .members()
                .iter()
                .filter(|m| tokens.iter().all(|t| m.search_string.contains(t)))
                .map(|m| m.identity.clone())
                .collect::<Vec<_>>();
            assert_eq!(visible_ids(&roster), expected, "filter {filter:?}");
        }
    }

    #[test]
    fn filter_without_match_is_empty() {
        let mut roster = roster();
        roster.set_search_filter("zzz");
        assert!(roster.visible().is_empty());
    }

    #[test]
    fn set_members_reapplies_current_filter() {
        let mut roster = roster();
        roster.set_search_filter("bob");
        assert_eq!(visible_ids(&roster), vec![id(2)]);

        roster.set_members(vec![member(4, "bobby tables"), member(5, "dave")]);
        assert_eq!(visible_ids(&roster), vec![id(4)]);
    }

    #[test]
    fn toggle_twice_restores_selection() {
        let mut roster = roster();
        assert_eq!(roster.toggle_member_selection(&id(2)), Some(true));
        assert!(roster.find(&id(2)).is_some_and(|m| m.selected));
        assert_eq!(roster.toggle_member_selection(&id(2)), Some(false));
        assert!(roster.find(&id(2)).is_some_and(|m| !m.selected));
        assert!(roster.selected_identities().is_empty());
    }

    #[test]
    fn toggle_unknown_identity_is_noop() {
        let mut roster = roster();
        let before = roster.members().to_vec();
        assert_eq!(roster.toggle_member_selection(&id(42)), None);
        assert_eq!(roster.members(), before.as_slice());
    }

    #[test]
    fn toggle_is_reflected_in_visible_subset() {
        let mut roster = roster();
        roster.set_search_filter("bob");
        roster.toggle_member_selection(&id(2));
        assert!(roster.visible()[0].selected);
    }

    #[test]
    fn exclusive_bulk_selection_replaces_previous_selection() {
        let mut roster = roster();
        roster.toggle_member_selection(&id(3));
        roster.set_selected_members(&HashSet::from([id(1), id(2)]), false);
        assert_eq!(roster.selected_identities(), vec![id(1), id(2)]);
    }

    #[test]
    fn merge_bulk_selection_keeps_other_selections() {
        let mut roster = roster();
        roster.toggle_member_selection(&id(3));
        roster.set_selected_members(&HashSet::from([id(1)]), true);
        assert_eq!(roster.selected_identities(), vec![id(1), id(3)]);
    }

    #[test]
    fn bulk_selection_reaches_filtered_out_members() {
        let mut roster = roster();
        roster.set_search_filter("alice");
        roster.set_selected_members(&HashSet::from([id(3)]), false);
        assert_eq!(roster.selected_identities(), vec![id(3)]);
        assert!(!roster.visible()[0].selected);
    }

    #[test]
    fn rows_build_unselected_members() {
        let rows = vec![MemberRow {
            identity: id(1),
            contact: None,
            details: None,
            pending: true,
            admin: false,
        }];
        let mut roster = MemberRoster::new();
        roster.set_members(members_from_rows(rows, &id(9), true));
        assert_eq!(roster.members().len(), 1);
        assert!(roster.selected_identities().is_empty());
    }
}
