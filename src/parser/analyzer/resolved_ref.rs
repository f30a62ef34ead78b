use std::{collections::BTreeSet, fmt};

use serde::Serialize;

use crate::database::SystemColumn;

/// Position of a column inside its range entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColumnPosition {
    /// 1-based, counting dropped placeholders
    User(u32),
    System(SystemColumn),
}

impl ColumnPosition {
    /// Signed attribute number: positive for user columns, negative for system ones.
    pub fn attnum(self) -> i32 {
        match self {
            ColumnPosition::User(n) => n as i32,
            ColumnPosition::System(sys) => sys.attnum(),
        }
    }
}

/// Where a resolved reference points: `levels_up` scopes outward, at
/// `entity_slot` (1-based) of that scope's range entries. No
/// `column_position` means the whole row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedRef {
    pub levels_up: u32,
    pub entity_slot: u32,
    pub column_position: Option<ColumnPosition>,
}

impl ResolvedRef {
    pub fn column(levels_up: u32, entity_slot: u32, position: ColumnPosition) -> Self {
        Self { levels_up, entity_slot, column_position: Some(position) }
    }

    pub fn whole_row(levels_up: u32, entity_slot: u32) -> Self {
        Self { levels_up, entity_slot, column_position: None }
    }
}

/// Set of attribute numbers touched by a query, per range entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSet(BTreeSet<i32>);

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attnum: i32) -> bool {
        self.0.insert(attnum)
    }

    pub fn contains(&self, attnum: i32) -> bool {
        self.0.contains(&attnum)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for ColumnSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.0.iter().map(i32::to_string).collect::<Vec<_>>();
        write!(f, "{{{}}}", items.join(","))
    }
}

impl FromIterator<i32> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
