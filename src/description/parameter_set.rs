//! # Parameter Set
//!
//! An ordered group of parameters of one kind. Parameters live in the owning
//! description's arena; a set only keeps their handles, so queries take the
//! arena as an argument.

use std::collections::{BTreeMap, BTreeSet};

use super::parameter::{Parameter, NO_LIST};
use super::ParameterId;

/// What a parameter set stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterSetKind {
    /// Persisted configuration
    Master,
    /// Live state
    Values,
    /// Per-peer link configuration
    Link,
}

impl ParameterSetKind {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "master" => Some(Self::Master),
            "values" => Some(Self::Values),
            "link" => Some(Self::Link),
            _ => None,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Master => "MASTER",
            Self::Values => "VALUES",
            Self::Link => "LINK",
        }
    }
}

/// One `value id value` pair of a `default_values` block
pub type DefaultValue = (String, String);

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub id: String,
    pub kind: ParameterSetKind,
    /// Declaration order is kept
    pub parameters: Vec<ParameterId>,
    /// Physical lists (byte banks) the parameters are spread over
    pub lists: BTreeSet<u32>,
    /// Default values keyed by channel function
    pub default_values: BTreeMap<String, Vec<DefaultValue>>,
    /// Id of a reusable definition from `paramset_defs`
    pub subset_reference: String,
    pub address_start: i32,
    pub address_step: i32,
    pub count: i32,
    pub channel_offset: i32,
    pub peer_address_offset: i32,
    pub peer_channel_offset: i32,
}

impl ParameterSet {
    pub fn new(kind: ParameterSetKind) -> Self {
        Self {
            id: String::new(),
            kind,
            parameters: Vec::new(),
            lists: BTreeSet::new(),
            default_values: BTreeMap::new(),
            subset_reference: String::new(),
            address_start: -1,
            address_step: -1,
            count: -1,
            channel_offset: -1,
            peer_address_offset: -1,
            peer_channel_offset: -1,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Append a parameter and record its list
    pub fn push(&mut self, id: ParameterId, list: u32) {
        self.parameters.push(id);
        if list < NO_LIST {
            self.lists.insert(list);
        }
    }

    /// Handle of the parameter called `name`
    pub fn find(&self, arena: &[Parameter], name: &str) -> Option<ParameterId> {
        self.parameters.iter().copied().find(|p| arena[p.0].id == name)
    }

    /// The parameter called `name`
    pub fn parameter<'a>(&self, arena: &'a [Parameter], name: &str) -> Option<&'a Parameter> {
        self.find(arena, name).map(|p| &arena[p.0])
    }

    /// All parameters in declaration order
    pub fn iter<'a>(&'a self, arena: &'a [Parameter]) -> impl Iterator<Item = &'a Parameter> + 'a {
        self.parameters.iter().map(move |p| &arena[p.0])
    }

    /// Parameters stored in physical list `list`
    pub fn parameters_in_list<'a>(&'a self, arena: &'a [Parameter], list: u32) -> Vec<&'a Parameter> {
        self.iter(arena).filter(|p| p.physical.list == list).collect()
    }

    /// Parameters of `list` whose byte range overlaps `start..=end`
    ///
    /// # Arguments
    ///
    /// * `arena` - Parameter arena of the owning description
    /// * `start` - First byte of the range
    /// * `end` - Last byte of the range, inclusive
    /// * `list` - Physical list the parameters must belong to
    pub fn indices<'a>(&'a self, arena: &'a [Parameter], start: u32, end: u32, list: u32) -> Vec<&'a Parameter> {
        self.iter(arena)
            .filter(|p| p.physical.list == list)
            .filter(|p| p.physical.end_index >= start && p.physical.start_index <= end)
            .collect()
    }

    /// The parameter at exactly `index`
    pub fn at_index<'a>(&'a self, arena: &'a [Parameter], index: f64) -> Option<&'a Parameter> {
        self.iter(arena).find(|p| p.physical.index == index)
    }

    pub fn lists(&self) -> impl Iterator<Item = u32> + '_ {
        self.lists.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::parameter::PhysicalParameter;

    fn arena() -> Vec<Parameter> {
        let mut params = Vec::new();
        for (id, list, index, size) in [
            ("INTERVAL", 1, 5.0, 1.0),
            ("LED_MODE", 1, 6.4, 0.2),
            ("TIMEOUT", 3, 12.0, 2.0),
        ] {
            let mut physical = PhysicalParameter { list, index, size, size_defined: true, ..Default::default() };
            physical.update_range();
            params.push(Parameter { id: id.into(), physical, ..Default::default() });
        }
        params
    }

    fn set() -> ParameterSet {
        let mut set = ParameterSet::new(ParameterSetKind::Master);
        set.push(ParameterId(0), 1);
        set.push(ParameterId(1), 1);
        set.push(ParameterId(2), 3);
        set
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ParameterSetKind::parse(" Values "), Some(ParameterSetKind::Values));
        assert_eq!(ParameterSetKind::parse("peer"), None);
        assert_eq!(ParameterSetKind::Link.type_name(), "LINK");
    }

    #[test]
    fn test_lookup_by_name() {
        let params = arena();
        let set = set();
        assert_eq!(set.parameter(&params, "TIMEOUT").map(|p| p.physical.list), Some(3));
        assert!(set.parameter(&params, "MISSING").is_none());
        assert_eq!(set.lists().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_list_and_range_queries() {
        let params = arena();
        let set = set();
        assert_eq!(set.parameters_in_list(&params, 1).len(), 2);
        let ids: Vec<_> = set.indices(&params, 6, 13, 1).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["LED_MODE"]);
        let ids: Vec<_> = set.indices(&params, 13, 13, 3).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["TIMEOUT"]);
        assert_eq!(set.at_index(&params, 6.4).map(|p| p.id.as_str()), Some("LED_MODE"));
    }

    #[test]
    fn test_unlisted_parameters_not_recorded() {
        let mut set = ParameterSet::new(ParameterSetKind::Values);
        set.push(ParameterId(0), NO_LIST);
        assert!(set.lists.is_empty());
        assert_eq!(set.parameters.len(), 1);
    }
}
