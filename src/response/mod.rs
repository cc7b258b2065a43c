//! Viewer-relative response projection.
//!
//! Wrapping derives `is_followed` / `is_liked` / `is_saved` / `is_owned` /
//! `is_me` flags from aggregates that are already in memory; nothing here
//! touches the store. Callers pre-load the authors they need (one
//! `Store::get_users_map` call per list) so feed rendering stays a constant
//! number of queries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Comment, Quote, User};

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub seq: i64,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub display_image: String,
    pub following: Vec<String>,
    pub followers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_followed: bool,
    pub is_me: bool,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: String,
    pub text: String,
    pub author: UserView,
    pub likes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub is_liked: bool,
    pub is_owned: bool,
}

#[derive(Debug, Serialize)]
pub struct QuoteView {
    pub id: String,
    pub seq: i64,
    pub text: String,
    pub tags: Vec<String>,
    pub emotion: String,
    pub author: UserView,
    pub likes: Vec<String>,
    pub comments: Vec<CommentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_liked: bool,
    pub is_saved: bool,
    pub is_owned: bool,
}

pub fn wrap_user(requested: &User, viewer: &User) -> UserView {
    UserView {
        id: requested.id.clone(),
        seq: requested.seq,
        username: requested.username.clone(),
        firstname: requested.firstname.clone(),
        lastname: requested.lastname.clone(),
        display_image: requested.display_image.clone(),
        following: requested.following.clone(),
        followers: requested.followers.clone(),
        created_at: requested.created_at,
        updated_at: requested.updated_at,
        is_followed: viewer.is_following(&requested.id),
        is_me: requested.is_me(&viewer.id),
    }
}

/// Project a comment for the viewer. Returns `None` when the comment's
/// author is not present in `authors` (the account has been deleted).
pub fn wrap_comment(
    comment: &Comment,
    authors: &HashMap<String, User>,
    viewer: &User,
) -> Option<CommentView> {
    let author = authors.get(&comment.author_id)?;
    Some(CommentView {
        id: comment.id.clone(),
        text: comment.text.clone(),
        author: wrap_user(author, viewer),
        likes: comment.likes.clone(),
        created_at: comment.created_at,
        is_liked: comment.is_liked(&viewer.id),
        is_owned: comment.is_owned(&viewer.id),
    })
}

/// Project a quote for the viewer. Returns `None` when the quote's author is
/// not present in `authors`.
pub fn wrap_quote(
    quote: &Quote,
    authors: &HashMap<String, User>,
    viewer: &User,
) -> Option<QuoteView> {
    let author = authors.get(&quote.author_id)?;
    let comments = quote
        .comments
        .iter()
        .filter_map(|comment| wrap_comment(comment, authors, viewer))
        .collect();

    Some(QuoteView {
        id: quote.id.clone(),
        seq: quote.seq,
        text: quote.text.clone(),
        tags: quote.tags.clone(),
        emotion: quote.emotion.clone(),
        author: wrap_user(author, viewer),
        likes: quote.likes.clone(),
        comments,
        created_at: quote.created_at,
        updated_at: quote.updated_at,
        is_liked: quote.is_liked(&viewer.id),
        is_saved: viewer.is_saved(&quote.id),
        is_owned: quote.is_owned(&viewer.id),
    })
}

/// Every author id a batch of quotes needs projected: quote authors plus
/// comment authors, deduplicated.
pub fn author_ids_of(quotes: &[Quote]) -> Vec<String> {
    let mut ids = Vec::new();
    for quote in quotes {
        if !ids.contains(&quote.author_id) {
            ids.push(quote.author_id.clone());
        }
        for comment in &quote.comments {
            if !ids.contains(&comment.author_id) {
                ids.push(comment.author_id.clone());
            }
        }
    }
    ids
}
