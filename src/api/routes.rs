//! Endpoint candidates for each remote operation.
//!
//! Deployments of the backend expose the same operations under different
//! paths. Each builder returns the candidates in preference order: the
//! current shape first, the legacy alternates after it. The dispatch loop
//! walks the list until one answers.

use crate::types::{TargetId, TargetRef, UserId};
use std::fmt;

/// HTTP method for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One endpoint candidate: a method and a path relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the configured base URL, leading slash included.
    pub path: String,
}

impl Route {
    /// Creates a route.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Candidates for casting a vote on a target.
pub fn vote(target: TargetRef) -> Vec<Route> {
    vec![
        Route::new(
            Method::Post,
            format!("/votes/{}", target.target_type.singular()),
        ),
        Route::new(
            Method::Post,
            format!("/{}/{}/vote", target.target_type.collection(), target.id),
        ),
    ]
}

/// Candidates for toggling a like on a target.
pub fn like(target: TargetRef) -> Vec<Route> {
    vec![
        Route::new(
            Method::Post,
            format!("/{}/{}/like", target.target_type.collection(), target.id),
        ),
        Route::new(
            Method::Post,
            format!("/likes/{}", target.target_type.singular()),
        ),
    ]
}

/// Candidates for setting the approval axis of a target.
pub fn approve(target: TargetRef) -> Vec<Route> {
    vec![
        Route::new(
            Method::Patch,
            format!("/{}/{}/approve", target.target_type.collection(), target.id),
        ),
        Route::new(
            Method::Patch,
            format!(
                "/admin/{}/{}/approve",
                target.target_type.collection(),
                target.id
            ),
        ),
    ]
}

/// Candidates for setting the flag axis of a target.
pub fn flag(target: TargetRef) -> Vec<Route> {
    vec![
        Route::new(
            Method::Patch,
            format!("/{}/{}/flag", target.target_type.collection(), target.id),
        ),
        Route::new(
            Method::Patch,
            format!(
                "/admin/{}/{}/flag",
                target.target_type.collection(),
                target.id
            ),
        ),
    ]
}

/// Candidates for deleting a target.
pub fn delete_content(target: TargetRef) -> Vec<Route> {
    vec![
        Route::new(
            Method::Delete,
            format!("/{}/{}", target.target_type.collection(), target.id),
        ),
        Route::new(
            Method::Post,
            format!("/{}/{}/delete", target.target_type.collection(), target.id),
        ),
    ]
}

/// Candidates for blocking or unblocking a user.
pub fn block(user: UserId) -> Vec<Route> {
    vec![
        Route::new(Method::Patch, format!("/users/{}/block", user)),
        Route::new(Method::Post, format!("/users/{}/block", user)),
    ]
}

/// Candidates for changing a user's admin role.
pub fn admin_role(user: UserId) -> Vec<Route> {
    vec![Route::new(Method::Patch, format!("/users/{}", user))]
}

/// Candidates for deleting a user account.
pub fn delete_user(user: UserId) -> Vec<Route> {
    vec![Route::new(Method::Delete, format!("/users/{}", user))]
}

/// Candidates for creating a post.
pub fn create_post() -> Vec<Route> {
    vec![Route::new(Method::Post, "/posts")]
}

/// Candidates for creating a comment under a post.
pub fn create_comment(post_id: TargetId) -> Vec<Route> {
    vec![
        Route::new(Method::Post, format!("/posts/{}/comments", post_id)),
        Route::new(Method::Post, "/comments"),
    ]
}

/// Candidates for fetching one target's current state.
pub fn fetch_target(target: TargetRef) -> Vec<Route> {
    vec![Route::new(
        Method::Get,
        format!("/{}/{}", target.target_type.collection(), target.id),
    )]
}

/// Candidates for listing posts.
pub fn list_posts() -> Vec<Route> {
    vec![Route::new(Method::Get, "/posts")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_candidates_in_preference_order() {
        let candidates = vote(TargetRef::post(17));
        assert_eq!(candidates[0], Route::new(Method::Post, "/votes/post"));
        assert_eq!(candidates[1], Route::new(Method::Post, "/posts/17/vote"));
    }

    #[test]
    fn test_comment_paths_use_comment_segments() {
        let candidates = like(TargetRef::comment(4));
        assert_eq!(candidates[0].path, "/comments/4/like");
        assert_eq!(candidates[1].path, "/likes/comment");
    }

    #[test]
    fn test_user_routes() {
        assert_eq!(block(9)[0].path, "/users/9/block");
        assert_eq!(admin_role(9)[0], Route::new(Method::Patch, "/users/9"));
        assert_eq!(delete_user(9)[0], Route::new(Method::Delete, "/users/9"));
    }

    #[test]
    fn test_route_display() {
        let route = Route::new(Method::Patch, "/posts/1/approve");
        assert_eq!(route.to_string(), "PATCH /posts/1/approve");
    }
}
