use axum::{
    Extension,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use rand::Rng;

use super::auth::Session;
use crate::api::views;

const MEMBER_IMAGES: [&str; 3] = [
    "/images/breaking-cell.jpg",
    "/images/breaking-back.jpg",
    "/images/baking-bread.jpg",
];

const NOT_FOUND_IMAGE: &str = "/images/notFound.jpg";

pub async fn root(Extension(session): Extension<Session>) -> Html<String> {
    views::landing(session.username().await.as_deref())
}

/// Members area; anonymous visitors go back to the landing page.
pub async fn members(Extension(session): Extension<Session>) -> Response {
    let Some(username) = session.username().await else {
        return Redirect::to("/").into_response();
    };
    views::members(&username, pick_member_image()).into_response()
}

fn pick_member_image() -> &'static str {
    MEMBER_IMAGES[rand::thread_rng().gen_range(0..MEMBER_IMAGES.len())]
}

pub async fn not_found() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, views::not_found(NOT_FOUND_IMAGE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_image_comes_from_fixed_set() {
        for _ in 0..50 {
            assert!(MEMBER_IMAGES.contains(&pick_member_image()));
        }
    }
}
