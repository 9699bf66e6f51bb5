use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::{Duration, OffsetDateTime};

/// Current UTC time truncated to whole seconds, so stored timestamps share
/// one fixed-width text form and compare in chronological order.
pub fn utc_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond()))
}

/// Declares a closed set of wire strings, stored as TEXT and
/// (de)serialized as the same strings everywhere.
macro_rules! text_enum {
    ($(#[$meta:meta])* pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                #[sqlx(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "expected one of {}, got `{other}`",
                        [$($text),+].join(", ")
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    /// Role carried in access tokens.
    pub enum Role {
        User => "user",
        Admin => "admin",
        SuperAdmin => "super-admin",
    }
}

text_enum! {
    pub enum AdminRole {
        Admin => "admin",
        SuperAdmin => "super-admin",
    }
}

impl From<AdminRole> for Role {
    fn from(role: AdminRole) -> Self {
        match role {
            AdminRole::Admin => Role::Admin,
            AdminRole::SuperAdmin => Role::SuperAdmin,
        }
    }
}

text_enum! {
    pub enum Category {
        Sell => "sell",
        Rent => "rent",
    }
}

text_enum! {
    pub enum Condition {
        FairlyUsed => "fairly_used",
        NewlyBuilt => "newly_built",
        OldAndRenovated => "old_and_renovated",
    }
}

text_enum! {
    pub enum PropertyType {
        Apartment => "apartment",
        Condominium => "condominium",
        Villa => "villa",
    }
}

text_enum! {
    pub enum ListedBy {
        Agent => "agent",
        Owner => "owner",
    }
}

text_enum! {
    pub enum FurnishStatus {
        Furnished => "furnished",
        SemiFurnished => "semi_furnished",
        Unfurnished => "unfurnished",
    }
}

text_enum! {
    pub enum HouseStatus {
        Pending => "pending",
        Available => "available",
        Rented => "rented",
        Sold => "sold",
    }
}

text_enum! {
    pub enum VisitStatus {
        NotSeen => "not_seen",
        Seen => "seen",
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub invitation_code: String,
    pub invited_by: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Admin {
    pub id: i64,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub id_front: Option<String>,
    pub id_back: Option<String>,
    pub role: AdminRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Area {
    pub code: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct House {
    pub id: i64,
    pub category: Category,
    pub area_code: i64,
    pub location: String,
    pub address: String,
    pub size: f64,
    pub condition: Option<Condition>,
    pub bedrooms: i64,
    pub toilets: i64,
    pub bathrooms: i64,
    pub property_type: PropertyType,
    pub listed_by: ListedBy,
    pub furnish_status: FurnishStatus,
    pub facilities: Json<Vec<String>>,
    pub description: String,
    pub price: f64,
    pub negotiable: bool,
    pub parking_space: bool,
    pub status: HouseStatus,
    pub image_urls: Json<Vec<String>>,
    pub video_url: Option<String>,
    pub owner_id: i64,
    pub assigned_admin_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A user's request to visit a house.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invitation {
    pub id: i64,
    pub user_id: i64,
    pub house_id: i64,
    pub status: VisitStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub preferred_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub visited_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SuccessReport {
    pub id: i64,
    pub admin_id: i64,
    pub invitation_id: i64,
    pub price: f64,
    pub commission: f64,
    pub transaction_photo: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FailureReport {
    pub id: i64,
    pub admin_id: i64,
    pub invitation_id: i64,
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Featured placement of a house until `expires_at`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VipStatus {
    pub id: i64,
    pub house_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub duration_days: i64,
    pub price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}
