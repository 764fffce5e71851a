//! HTML views.
//!
//! Every interpolated value goes through [`escape`].

use axum::response::Html;
use std::fmt::Write;

use crate::api::handlers::auth::{Notice, UserSummary};

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape(title)
    ))
}

fn notice_paragraph(message: Option<&str>) -> String {
    message.map_or_else(String::new, |message| {
        format!("<p class=\"error\">{}</p>\n", escape(message))
    })
}

#[must_use]
pub fn landing(username: Option<&str>) -> Html<String> {
    match username {
        Some(username) => layout(
            "Clubhouse",
            &format!(
                "<h1>Hello, {}!</h1>\n\
                 <a href=\"/members\">Go to the members area</a>\n\
                 <a href=\"/logout\">Log out</a>",
                escape(username)
            ),
        ),
        None => layout(
            "Clubhouse",
            "<h1>Welcome to the clubhouse</h1>\n\
             <a href=\"/signup\">Sign up</a>\n\
             <a href=\"/login\">Log in</a>",
        ),
    }
}

#[must_use]
pub fn signup(notice: Option<Notice>) -> Html<String> {
    let message = match notice {
        Some(Notice::EmailTaken) => Some("An account with that email already exists."),
        Some(Notice::UsernameTaken) => Some("That username is already taken."),
        _ => None,
    };
    layout(
        "Sign up",
        &format!(
            "<h1>Sign up</h1>\n{}\
             <form method=\"post\" action=\"/signup\">\n\
             <input name=\"username\" type=\"text\" placeholder=\"username\" maxlength=\"20\">\n\
             <input name=\"email\" type=\"email\" placeholder=\"email\">\n\
             <input name=\"password\" type=\"password\" placeholder=\"password\" maxlength=\"20\">\n\
             <button type=\"submit\">Sign up</button>\n\
             </form>",
            notice_paragraph(message)
        ),
    )
}

#[must_use]
pub fn login(notice: Option<Notice>) -> Html<String> {
    let message = match notice {
        Some(Notice::EmailNotFound) => Some("No account is registered with that email."),
        Some(Notice::WrongPassword) => Some("Incorrect password."),
        _ => None,
    };
    layout(
        "Log in",
        &format!(
            "<h1>Log in</h1>\n{}\
             <form method=\"post\" action=\"/login\">\n\
             <input name=\"email\" type=\"email\" placeholder=\"email\">\n\
             <input name=\"password\" type=\"password\" placeholder=\"password\" maxlength=\"20\">\n\
             <button type=\"submit\">Log in</button>\n\
             </form>",
            notice_paragraph(message)
        ),
    )
}

#[must_use]
pub fn members(username: &str, image: &str) -> Html<String> {
    layout(
        "Members",
        &format!(
            "<h1>Hello, {}.</h1>\n\
             <img src=\"{}\" alt=\"members only\">\n\
             <a href=\"/logout\">Log out</a>",
            escape(username),
            escape(image)
        ),
    )
}

#[must_use]
pub fn admin(users: &[UserSummary]) -> Html<String> {
    let mut rows = String::new();
    for user in users {
        let username = escape(&user.username);
        // Infallible: writing to a String.
        let _ = write!(
            rows,
            "<tr><td>{username}</td><td>{}</td><td>\
             <form method=\"post\" action=\"/promote/{username}\"><button>Promote</button></form>\
             <form method=\"post\" action=\"/demote/{username}\"><button>Demote</button></form>\
             </td></tr>\n",
            user.user_type
        );
    }
    layout(
        "Admin",
        &format!(
            "<h1>Users</h1>\n<table>\n<tr><th>Username</th><th>Role</th><th></th></tr>\n\
             {rows}</table>"
        ),
    )
}

#[must_use]
pub fn error(message: &str) -> Html<String> {
    layout(
        "Error",
        &format!(
            "<h1>Error</h1>\n<p>{}</p>\n<a href=\"/\">Home</a>",
            escape(message)
        ),
    )
}

#[must_use]
pub fn not_found(picture: &str) -> Html<String> {
    layout(
        "Not found",
        &format!(
            "<h1>Page not found</h1>\n<img src=\"{}\" alt=\"not found\">\n<a href=\"/\">Home</a>",
            escape(picture)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::UserType;

    #[test]
    fn escape_replaces_markup() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn landing_variants() {
        assert!(landing(None).0.contains("/signup"));
        let page = landing(Some("alice")).0;
        assert!(page.contains("Hello, alice!"));
        assert!(page.contains("/logout"));
    }

    #[test]
    fn forms_show_only_their_own_notices() {
        assert!(login(Some(Notice::WrongPassword)).0.contains("Incorrect password."));
        assert!(!login(Some(Notice::EmailTaken)).0.contains("class=\"error\""));
        assert!(signup(Some(Notice::EmailTaken)).0.contains("already exists"));
        assert!(!signup(None).0.contains("class=\"error\""));
    }

    #[test]
    fn admin_lists_every_user() {
        let users = vec![
            UserSummary {
                username: "alice".to_string(),
                user_type: UserType::Admin,
            },
            UserSummary {
                username: "bob".to_string(),
                user_type: UserType::User,
            },
        ];
        let page = admin(&users).0;
        assert!(page.contains("<td>alice</td><td>admin</td>"));
        assert!(page.contains("<td>bob</td><td>user</td>"));
        assert!(page.contains("action=\"/promote/bob\""));
        assert!(page.contains("action=\"/demote/alice\""));
    }

    #[test]
    fn error_page_escapes_message() {
        let page = error("<script>").0;
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
