use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
        #[serde(transparent)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Position of the object in its arena.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// Uniquely identifies a table within a schema.
    TableId
);

handle!(
    /// Uniquely identifies a column within a schema, attached or not.
    ColumnId
);

handle!(
    /// Uniquely identifies an index within a schema.
    IndexId
);

handle!(
    /// Uniquely identifies a relationship within a schema.
    RelationshipId
);
