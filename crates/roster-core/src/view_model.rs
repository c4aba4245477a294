//! Screen-scoped view-model for group member search and selection.
//!
//! Mutations are applied to the roster immediately. The filter pass runs on
//! the task runner and its result is published on the consumer's execution
//! context. Each pass is tagged with a generation so an older pass that
//! completes late never replaces a newer one.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{debug, trace, warn};

use crate::{
    error::RosterError,
    notifications::{EngineNotification, NotificationBus, NotificationKind, SubscriptionHandle},
    roster::MemberRoster,
    search::filter_members,
    task::{ExecutionContext, TaskRunner},
    types::{GroupMember, MemberIdentity, MemberRow, members_from_rows},
};

/// Rendering snapshot published after each filter pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberListSnapshot {
    /// Generation of the mutation this snapshot reflects.
    pub generation: u64,
    /// Filter text the snapshot was computed with.
    pub filter: String,
    /// Members accepted by the filter, in roster order.
    pub visible: Vec<GroupMember>,
    /// Size of the full roster.
    pub total: usize,
    /// Selected identities across the full roster, in roster order.
    pub selected: Vec<MemberIdentity>,
}

/// Callback used to publish new snapshots.
pub type SnapshotCallback = Arc<dyn Fn(MemberListSnapshot) + Send + Sync + 'static>;

/// Supplies membership rows for a group, typically backed by the engine database.
pub trait MemberSource: Send + Sync {
    fn load_members(&self, group_id: &str) -> Result<Vec<MemberRow>, RosterError>;
}

/// Handles returned by [`GroupMembersViewModel::attach`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSubscription {
    handles: Vec<SubscriptionHandle>,
}

impl SourceSubscription {
    /// Unregister every handler. Returns how many were still registered.
    pub fn detach(self, bus: &NotificationBus) -> usize {
        self.handles
            .into_iter()
            .filter(|handle| bus.unsubscribe(*handle))
            .count()
    }
}

#[derive(Debug, Default)]
struct ViewModelState {
    roster: MemberRoster,
    generation: u64,
    published_generation: u64,
    latest: MemberListSnapshot,
}

/// View-model owned by one member list screen.
#[derive(Clone)]
pub struct GroupMembersViewModel {
    state: Arc<Mutex<ViewModelState>>,
    runner: TaskRunner,
    context: Arc<dyn ExecutionContext>,
    on_publish: SnapshotCallback,
    own_identity: MemberIdentity,
    can_remove: bool,
}

impl GroupMembersViewModel {
    /// Create an empty view-model.
    ///
    /// `own_identity` marks the user's own row; `can_remove` is whether the
    /// user may remove members from this group.
    pub fn new(
        runner: TaskRunner,
        context: Arc<dyn ExecutionContext>,
        on_publish: SnapshotCallback,
        own_identity: MemberIdentity,
        can_remove: bool,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ViewModelState::default())),
            runner,
            context,
            on_publish,
            own_identity,
            can_remove,
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> MemberListSnapshot {
        self.lock_state().latest.clone()
    }

    /// Current full roster, including selection changes not yet published.
    pub fn members(&self) -> Vec<GroupMember> {
        self.lock_state().roster.members().to_vec()
    }

    pub fn selected_identities(&self) -> Vec<MemberIdentity> {
        self.lock_state().roster.selected_identities()
    }

    /// Replace the roster.
    pub fn set_members(&self, members: Vec<GroupMember>) {
        self.mutate(|roster| roster.replace_members(members));
    }

    /// Replace the roster from freshly queried rows.
    pub fn set_rows(&self, rows: Vec<MemberRow>) {
        let members = members_from_rows(rows, &self.own_identity, self.can_remove);
        self.set_members(members);
    }

    /// Apply a new free-text filter.
    pub fn set_search_filter(&self, text: &str) {
        self.mutate(|roster| roster.replace_filter(text));
    }

    /// Flip selection of one member. Returns the new state, `None` if absent.
    pub fn toggle_member_selection(&self, identity: &MemberIdentity) -> Option<bool> {
        let mut toggled = None;
        self.mutate(|roster| toggled = roster.flip_selection(identity));
        toggled
    }

    /// Bulk selection; see [`MemberRoster::set_selected_members`].
    pub fn set_selected_members(&self, identities: &HashSet<MemberIdentity>, merge: bool) {
        self.mutate(|roster| roster.assign_selection(identities, merge));
    }

    /// Initial selection applied once after the roster is first loaded.
    pub fn preselect(&self, identities: &HashSet<MemberIdentity>) {
        self.set_selected_members(identities, true);
    }

    /// Reload rows for `group_id` from `source`.
    pub fn reload(&self, source: &dyn MemberSource, group_id: &str) -> Result<(), RosterError> {
        let rows = source.load_members(group_id)?;
        debug!(%group_id, row_count = rows.len(), "member rows reloaded");
        self.set_rows(rows);
        Ok(())
    }

    /// Keep the roster in sync with `group_id` through bus notifications.
    ///
    /// Membership changes of that group and detail updates of any current
    /// member trigger a reload from `source`.
    pub fn attach(
        &self,
        bus: &NotificationBus,
        source: Arc<dyn MemberSource>,
        group_id: impl Into<String>,
    ) -> SourceSubscription {
        let group_id = group_id.into();

        let members_handle = {
            let view_model = self.clone();
            let source = Arc::clone(&source);
            let group_id = group_id.clone();
            bus.subscribe(NotificationKind::GroupMembersChanged, move |notification| {
                if let EngineNotification::GroupMembersChanged { group_id: changed } = notification
                    && *changed == group_id
                {
                    view_model.reload_logged(source.as_ref(), &group_id);
                }
            })
        };

        let details_handle = {
            let view_model = self.clone();
            bus.subscribe(NotificationKind::ContactDetailsUpdated, move |notification| {
                let EngineNotification::ContactDetailsUpdated { identity } = notification else {
                    return;
                };
                let is_member = view_model.lock_state().roster.find(identity).is_some();
                if is_member {
                    view_model.reload_logged(source.as_ref(), &group_id);
                }
            })
        };

        SourceSubscription {
            handles: vec![members_handle, details_handle],
        }
    }

    fn reload_logged(&self, source: &dyn MemberSource, group_id: &str) {
        if let Err(err) = self.reload(source, group_id) {
            warn!(%group_id, error = %err, "failed reloading group members");
        }
    }

    fn mutate<F>(&self, apply: F)
    where
        F: FnOnce(&mut MemberRoster),
    {
        let (generation, members, filter) = {
            let mut state = self.lock_state();
            apply(&mut state.roster);
            state.generation += 1;
            (
                state.generation,
                state.roster.members().to_vec(),
                state.roster.filter().clone(),
            )
        };

        trace!(generation, "scheduling filter pass");
        let view_model = self.clone();
        self.runner.submit_then(
            move || {
                let visible = filter_members(&members, &filter);
                MemberListSnapshot {
                    generation,
                    filter: filter.raw().to_owned(),
                    visible,
                    total: members.len(),
                    selected: members
                        .iter()
                        .filter(|member| member.selected)
                        .map(|member| member.identity.clone())
                        .collect(),
                }
            },
            Arc::clone(&self.context),
            move |result| match result {
                Ok(snapshot) => view_model.deliver(snapshot),
                Err(err) => warn!(generation, error = %err, "filter pass failed"),
            },
        );
    }

    /// Publish `snapshot` unless a newer generation was already published.
    fn deliver(&self, snapshot: MemberListSnapshot) {
        {
            let mut state = self.lock_state();
            if snapshot.generation <= state.published_generation {
                trace!(
                    generation = snapshot.generation,
                    published = state.published_generation,
                    "dropping stale filter result"
                );
                return;
            }
            state.published_generation = snapshot.generation;
            state.latest = snapshot.clone();
        }
        debug!(
            generation = snapshot.generation,
            visible = snapshot.visible.len(),
            total = snapshot.total,
            "member list published"
        );
        (self.on_publish)(snapshot);
    }

    fn lock_state(&self) -> MutexGuard<'_, ViewModelState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => {
                warn!("view-model state lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}
