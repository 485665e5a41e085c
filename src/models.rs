use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::schema::categories;
use crate::schema::comments;
use crate::schema::users;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Writer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Writer => "writer",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "writer" => Ok(Role::Writer),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Active,
    Banned,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Active => "active",
            Status::Banned => "banned",
        }
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Status::Pending),
            "active" => Ok(Status::Active),
            "banned" => Ok(Status::Banned),
            _ => Err(()),
        }
    }
}

#[derive(Identifiable, Queryable, Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub phone: Option<String>,
    pub created_at: String,
    pub email_verified: bool,
}

impl User {
    /// Rows written by older tooling may carry unexpected values; those read as the least privileged role.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Writer)
    }

    pub fn status(&self) -> Status {
        self.status.parse().unwrap_or(Status::Active)
    }
}

#[derive(Identifiable, Queryable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub folder: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: String,
}

#[derive(Identifiable, Queryable, Debug, Clone)]
pub struct Comment {
    pub id: i32,
    pub category: String,
    pub post_filename: String,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}
