//! Core contract for group member lists.
//!
//! This crate defines the member model, the search/selection roster and its
//! asynchronous view-model, plus the notification bus, task runner and
//! settings abstractions that presentation code is wired through.

/// Stable error types.
pub mod error;
/// Typed publish/subscribe bus for engine notifications.
pub mod notifications;
/// Synchronous roster with filtering and selection.
pub mod roster;
/// Search-string normalization and filter compilation.
pub mod search;
/// Typed settings service contract.
pub mod settings;
/// Background task submission and execution contexts.
pub mod task;
/// Member identity, rows and display projections.
pub mod types;
/// Screen-scoped asynchronous member list view-model.
pub mod view_model;

pub use error::{RosterError, RosterErrorCategory};
pub use notifications::{
    EngineNotification, NotificationBus, NotificationHandler, NotificationKind, SubscriptionHandle,
};
pub use roster::MemberRoster;
pub use search::{SearchFilter, filter_members, normalize_for_search};
pub use settings::{AppIcon, LocationIntegration, SettingsService};
pub use task::{
    ChannelContext, ContextQueue, ExecutionContext, InlineContext, TaskHandle, TaskRunner,
};
pub use types::{
    ContactRef, GroupMember, IdentityDetails, MemberIdentity, MemberRow, members_from_rows,
};
pub use view_model::{
    GroupMembersViewModel, MemberListSnapshot, MemberSource, SnapshotCallback, SourceSubscription,
};
