//! Row materialization
//!
//! Turns raw result rows into display rows: every visible field gets its
//! value coerced to text and passed through its display transform.

use crate::config::PrimaryKey;
use crate::database::{Columns, Row};
use crate::field::{DatabaseType, Field, FieldModel, Markup};
use crate::parameter::Parameters;
use crate::schema::{InfoItem, InfoRow};

/// Materialize one raw row
///
/// `columns` is `None` for rows that did not come from SQL; then every field
/// is taken from the row as-is. Fields excluded by the column allow-list are
/// still passed to their display transform, with an empty value, and are
/// emitted with an empty value.
pub fn materialize(
    row: &Row,
    fields: &[Field],
    primary_key: &PrimaryKey,
    params: &Parameters,
    columns: Option<&Columns>,
) -> InfoRow {
    let mut item_row = InfoRow::new();
    let id = primary_key.type_name.coerce(row.get(&primary_key.name));

    for field in fields.iter().filter(|field| !field.hide) {
        let head_field = field.head_field();
        let joined = field.valid_join().is_some();
        let stored = joined || columns.map_or(true, |columns| columns.contains(&field.name));

        // columns outside the allow-list or the table materialize blank
        let value = if stored && params.is_column_visible(&head_field) {
            let type_name = if joined {
                DatabaseType::Varchar
            } else {
                field.type_name
            };
            type_name.coerce(row.get(&head_field))
        } else {
            String::new()
        };

        let content = field
            .to_display(FieldModel {
                id: &id,
                value: &value,
                row,
            })
            .into_markup();
        item_row.insert(head_field, InfoItem::new(content, value));
    }

    item_row.insert(
        primary_key.name.clone(),
        InfoItem::new(Markup::new(id.clone()), id),
    );
    item_row
}
