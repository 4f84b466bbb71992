//! User model backed by the `users` table.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::FilterTarget;

/// Single-character `Y`/`N` flag stored in `CHAR(1)` columns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Flag {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Yes => "Y",
            Flag::No => "N",
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Flag::Yes)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid flag '{0}', expected Y or N")]
pub struct InvalidFlag(pub String);

impl FromStr for Flag {
    type Err = InvalidFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Y" => Ok(Flag::Yes),
            "N" => Ok(Flag::No),
            _ => Err(InvalidFlag(s.to_string())),
        }
    }
}

impl From<bool> for Flag {
    fn from(b: bool) -> Self {
        if b {
            Flag::Yes
        } else {
            Flag::No
        }
    }
}

/// A user row. Serialises as the flat column map, without the password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub userid: String,
    #[serde(skip_serializing, default)]
    pub passwd: String,
    pub surname: String,
    pub forename: String,
    pub telno: String,
    pub addr1: Option<String>,
    pub addr2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub active: Flag,
    pub admin: Flag,
}

/// Columns selected for a [`User`], in table order.
pub const USER_COLUMNS: &str =
    "id, userid, passwd, surname, forename, telno, addr1, addr2, city, state, postcode, active, admin";

impl FilterTarget for User {
    const TABLE: &'static str = "users";

    // passwd is not filterable
    fn column(field: &str) -> Option<&'static str> {
        match field {
            "id" => Some("id"),
            "userid" => Some("userid"),
            "surname" => Some("surname"),
            "forename" => Some("forename"),
            "telno" => Some("telno"),
            "addr1" => Some("addr1"),
            "addr2" => Some("addr2"),
            "city" => Some("city"),
            "state" => Some("state"),
            "postcode" => Some("postcode"),
            "active" => Some("active"),
            "admin" => Some("admin"),
            _ => None,
        }
    }
}

/// A user about to be inserted; the id is assigned by SQLite.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub userid: String,
    pub passwd: String,
    pub surname: String,
    pub forename: String,
    pub telno: String,
    pub addr1: Option<String>,
    pub addr2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub active: Flag,
    pub admin: Flag,
}

/// Result of the active/admin/inactive user benchmark.
#[derive(Debug, Clone, Serialize, Default)]
pub struct UsersReport {
    pub inactive_users: Vec<User>,
    pub active_users: Vec<User>,
    pub admin_users: Vec<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User {
            id: 1,
            userid: "user_0".into(),
            passwd: "hunter2".into(),
            surname: "Smith".into(),
            forename: "Ann".into(),
            telno: "555-0100".into(),
            addr1: Some("1 Main St".into()),
            addr2: None,
            city: Some("Springfield".into()),
            state: None,
            postcode: None,
            active: Flag::Yes,
            admin: Flag::No,
        }
    }

    #[test]
    fn test_serialises_flags_and_hides_password() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["active"], "Y");
        assert_eq!(json["admin"], "N");
        assert_eq!(json["userid"], "user_0");
        assert!(json.get("passwd").is_none());
        assert!(json["addr2"].is_null());
    }

    #[test]
    fn test_flag_round_trip() {
        assert_eq!("Y".parse::<Flag>(), Ok(Flag::Yes));
        assert_eq!("y".parse::<Flag>(), Err(InvalidFlag("y".to_string())));
        assert_eq!(Flag::from(false).as_str(), "N");
    }

    #[test]
    fn test_password_is_not_filterable() {
        assert_eq!(User::column("passwd"), None);
        assert_eq!(User::column("admin"), Some("admin"));
    }
}
