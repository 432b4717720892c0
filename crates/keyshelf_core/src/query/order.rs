//! Traversal order directives.

use crate::store::Direction;
use std::fmt;

/// Traverse the index over `column` in `direction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    column: String,
    direction: Direction,
}

impl Order {
    /// Ascending order; `unique` skips records repeating an index key.
    pub fn ascending(column: impl Into<String>, unique: bool) -> Self {
        let direction = if unique {
            Direction::NextUnique
        } else {
            Direction::Next
        };
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Descending order; `unique` skips records repeating an index key.
    pub fn descending(column: impl Into<String>, unique: bool) -> Self {
        let direction = if unique {
            Direction::PrevUnique
        } else {
            Direction::Prev
        };
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Parses `"<column> asc|desc"`; anything else gives `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let mut tokens = input.split_whitespace();
        let column = tokens.next()?;
        match tokens.next()? {
            "asc" => Some(Self::ascending(column, false)),
            "desc" => Some(Self::descending(column, false)),
            _ => None,
        }
    }

    /// Column whose index is traversed.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Traversal direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction)
    }
}
