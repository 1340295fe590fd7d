//! Name generation for derived columns.

use crate::ids::TableId;
use crate::schema::Schema;

/// Case-insensitive name comparison, including non-ASCII letters.
pub fn names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Return `base` if it is free, otherwise the first of `base<sep>1`,
/// `base<sep>2`, ... that `is_taken` rejects.
pub fn disambiguate(base: &str, separator: &str, mut is_taken: impl FnMut(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{base}{separator}{n}");
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Name for a generated foreign key column: the parent column's name, or
/// `<parent table><sep><column>` when that is taken, numbered if needed.
pub fn foreign_key_column_name(
    parent_table: &str,
    parent_column: &str,
    separator: &str,
    mut is_taken: impl FnMut(&str) -> bool,
) -> String {
    if !is_taken(parent_column) {
        return parent_column.to_string();
    }
    let combined = format!("{parent_table}{separator}{parent_column}");
    disambiguate(&combined, separator, is_taken)
}

impl Schema {
    /// Whether `table` holds a column named `name`, ignoring case.
    pub fn has_column_named(&self, table: TableId, name: &str) -> bool {
        self.column_by_name(table, name).is_some()
    }

    /// A column name based on `base` that is free in `table`.
    pub fn unique_column_name(&self, table: TableId, base: &str) -> String {
        disambiguate(base, &self.settings.name_separator, |candidate| {
            self.has_column_named(table, candidate)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_across_unicode_case() {
        assert!(!names_match("Straße", "STRASSE"));
        assert!(names_match("Ärger", "ärger"));
        assert!(names_match("ÉTAT", "état"));
        assert!(!names_match("etat", "état"));
    }

    #[test]
    fn free_names_are_kept() {
        let name = disambiguate("id", "_", |_| false);
        assert_eq!(name, "id");
    }

    #[test]
    fn taken_names_get_the_first_free_suffix() {
        let taken = ["id", "id_1", "id_2"];
        let name = disambiguate("id", "_", |candidate| taken.contains(&candidate));
        assert_eq!(name, "id_3");
    }

    #[test]
    fn foreign_key_names_fall_back_to_the_parent_table() {
        let taken = ["emp_id"];
        let name = foreign_key_column_name("emp", "emp_id", "_", |candidate| {
            taken.contains(&candidate)
        });
        assert_eq!(name, "emp_emp_id");

        let taken = ["emp_id", "emp_emp_id"];
        let name = foreign_key_column_name("emp", "emp_id", "_", |candidate| {
            taken.contains(&candidate)
        });
        assert_eq!(name, "emp_emp_id_1");
    }
}
