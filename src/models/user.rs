//! Minimal user surface the core needs
//!
//! Authentication lives outside the crate; the core only checks that a
//! referenced user exists, is active, and (for dispute resolution) holds the
//! admin role.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::users;

pub const ROLE_PLAYER: &str = "player";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl NewUser {
    pub fn player(id: &str, username: &str) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
            role: ROLE_PLAYER.to_string(),
            is_active: true,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn admin(id: &str, username: &str) -> Self {
        Self {
            role: ROLE_ADMIN.to_string(),
            ..Self::player(id, username)
        }
    }
}

impl User {
    pub fn create(conn: &mut SqliteConnection, new_user: NewUser) -> Result<User> {
        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(conn)
            .context("Failed to insert user")?;

        users::table
            .filter(users::id.eq(new_user.id))
            .first(conn)
            .context("Failed to retrieve created user")
    }

    pub fn find_by_id(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<User>> {
        users::table
            .filter(users::id.eq(user_id))
            .first(conn)
            .optional()
            .context("Failed to query user")
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}
