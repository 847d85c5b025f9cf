//! Membership lists and the per-message response set.

use crate::base::types::RenderedGroup;

/// Separator between members in the stored form of a group.
///
/// ASCII unit separator; it never occurs in platform user identifiers.
pub const MEMBER_DELIMITER: char = '\u{1f}';

/// One named list of user identifiers.
///
/// Members are unique and keep their insertion order, which is also the order
/// they are displayed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSet {
    name: String,
    members: Vec<String>,
}

impl MembershipSet {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: Vec::new() }
    }

    /// Create a group from existing members, dropping repeats after their first occurrence.
    pub fn from_members<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new(name);
        for member in members {
            set.add(member.into());
        }
        set
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    /// Append `user_id` unless it is already present.
    ///
    /// Returns `true` if the set changed.
    pub fn add(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        if self.contains(&user_id) {
            return false;
        }
        self.members.push(user_id);
        true
    }

    /// Remove `user_id`, keeping the remaining members in order.
    ///
    /// Returns `true` if the set changed.
    pub fn remove(&mut self, user_id: &str) -> bool {
        match self.members.iter().position(|m| m == user_id) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }
}

/// All groups attached to one message, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSet {
    prompt: String,
    groups: Vec<MembershipSet>,
}

impl ResponseSet {
    pub fn new(prompt: impl Into<String>, groups: Vec<MembershipSet>) -> Self {
        Self { prompt: prompt.into(), groups }
    }

    /// Name of the prompt type that created this set.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn groups(&self) -> &[MembershipSet] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [MembershipSet] {
        &mut self.groups
    }

    pub fn group(&self, name: &str) -> Option<&MembershipSet> {
        self.groups.iter().find(|g| g.name() == name)
    }

    /// Index of the group a button `action_id` selects.
    ///
    /// Action identifiers are the lowercased group names.
    pub fn group_for_action(&self, action_id: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name().to_lowercase() == action_id.to_lowercase())
    }

    /// The group `user_id` currently belongs to, if any.
    pub fn group_of(&self, user_id: &str) -> Option<&MembershipSet> {
        self.groups.iter().find(|g| g.contains(user_id))
    }

    /// Ordered `(name, members)` pairs for display.
    pub fn rendered(&self) -> Vec<RenderedGroup> {
        self.groups
            .iter()
            .map(|g| RenderedGroup {
                name: g.name().to_string(),
                members: g.members().to_vec(),
            })
            .collect()
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut set = MembershipSet::new("UP");

        assert!(set.add("alice"));
        assert!(!set.add("alice"));

        assert_eq!(set.members(), &["alice".to_string()]);
    }

    #[test]
    fn test_remove_keeps_insertion_order() {
        let mut set = MembershipSet::from_members("GOING", ["alice", "bob", "carol", "dave"]);

        assert!(set.remove("bob"));
        assert!(!set.remove("bob"));

        assert_eq!(set.members(), &["alice", "carol", "dave"]);
    }

    #[test]
    fn test_from_members_drops_repeats() {
        let set = MembershipSet::from_members("DOWN", ["bob", "alice", "bob"]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.members(), &["bob", "alice"]);
    }

    #[test]
    fn test_contains() {
        let set = MembershipSet::from_members("UP", ["alice"]);

        assert!(set.contains("alice"));
        assert!(!set.contains("Alice"));
        assert!(!MembershipSet::new("UP").contains("alice"));
    }

    #[test]
    fn test_response_set_lookups() {
        let set = ResponseSet::new("event", vec![MembershipSet::from_members("Going", ["alice"]), MembershipSet::from_members("Flaking", ["bob"])]);

        assert_eq!(set.group_for_action("flaking"), Some(1));
        assert_eq!(set.group_for_action("maybe"), None);
        assert_eq!(set.group_of("alice").map(MembershipSet::name), Some("Going"));
        assert!(set.group_of("carol").is_none());
        assert_eq!(set.group("Flaking").map(MembershipSet::len), Some(1));
    }

    #[test]
    fn test_rendered_keeps_group_order() {
        let set = ResponseSet::new("quiz", vec![MembershipSet::from_members("UP", ["alice", "carol"]), MembershipSet::new("DOWN")]);

        let rendered = set.rendered();

        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].name, "UP");
        assert_eq!(rendered[0].members, vec!["alice", "carol"]);
        assert_eq!(rendered[1].name, "DOWN");
        assert!(rendered[1].members.is_empty());
    }
}
