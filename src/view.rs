//! Plain-text rendering of the list, detail, and form views.

use crate::form::UserForm;
use crate::store::UserList;
use crate::user::User;
use crate::validation::{Field, FieldErrors};

const TABLE_HEADERS: [&str; 4] = ["ID", "Name", "Email", "Phone"];

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, w: usize) -> String {
    format!("{}{}", s, " ".repeat(w.saturating_sub(width(s))))
}

/// Render users as a table, one row per record, in list order
pub fn render_table(users: &UserList) -> String {
    if users.is_empty() {
        return "No users.".to_string();
    }

    let rows: Vec<[String; 4]> = users
        .iter()
        .map(|u| [u.id_label(), u.name.clone(), u.email.clone(), u.phone.clone()])
        .collect();

    let mut widths = TABLE_HEADERS.map(width);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(width(cell));
        }
    }

    let line = |cells: [&str; 4]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| pad(c, *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(TABLE_HEADERS));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &rows {
        out.push(line([
            row[0].as_str(),
            row[1].as_str(),
            row[2].as_str(),
            row[3].as_str(),
        ]));
    }
    out.join("\n")
}

/// Read-only detail view of one user
pub fn render_detail(user: &User) -> String {
    [
        user.name.clone(),
        format!("Email: {}", user.email),
        format!("Phone: {}", user.phone),
        format!("Address: {}, {}", user.address.street, user.address.city),
        format!("Company: {}", user.company.name),
        format!("Website: {}", user.website),
    ]
    .join("\n")
}

/// Field messages, one per line
pub fn render_errors(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("  {}: {}", field, message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn field_value(user: &User, field: Field) -> &str {
    match field {
        Field::Name => user.name.as_str(),
        Field::Email => user.email.as_str(),
        Field::Phone => user.phone.as_str(),
        Field::Username => user.username.as_str(),
        Field::Street => user.address.street.as_str(),
        Field::City => user.address.city.as_str(),
        Field::Company => user.company.name.as_str(),
        Field::Website => user.website.as_str(),
    }
}

/// The open form: every field with its value and any error beneath it
pub fn render_form(form: &UserForm) -> String {
    let mut out = vec![form.title().to_string()];
    for field in Field::ALL {
        let value = field_value(form.draft(), field);
        let marker = if field == Field::Username {
            " (read-only)"
        } else {
            ""
        };
        out.push(format!("  {:<24} {}{}", field.label(), value, marker));
        if let Some(message) = form.errors().get(field) {
            out.push(format!("    ! {}", message));
        }
    }
    out.push(format!(
        "  [submit: {}] [cancel]",
        form.submit_label()
    ));
    out.join("\n")
}
