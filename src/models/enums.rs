use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a value is outside one of the closed sets below
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: String,
}

// Each closed set gets serde names, FromStr and Display from one table so the
// wire codes cannot drift between them.
macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)+
                    other => Err(InvalidEnumValue {
                        kind: $kind,
                        value: other.to_string(),
                    }),
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

closed_set! {
    /// Band office departments a staff account belongs to
    Department, "department" {
        BandOffice => "BAND_OFFICE",
        JwHealthCenter => "J_W_HEALTH_CENTER",
        Cscmec => "CSCMEC",
        Council => "COUNCIL",
        Recreation => "RECREATION",
        Utilities => "UTILITIES",
    }
}

closed_set! {
    /// Staff roles, declared from least to most privileged
    Role, "role" {
        Staff => "STAFF",
        StaffAdmin => "STAFF_ADMIN",
        Admin => "ADMIN",
        ChiefCouncil => "CHIEF_COUNCIL",
    }
}

closed_set! {
    /// Input types a sign-up form field can render as
    FieldType, "field type" {
        Text => "TEXT",
        TextArea => "TEXTAREA",
        Select => "SELECT",
        MultiSelect => "MULTISELECT",
        Checkbox => "CHECKBOX",
        Date => "DATE",
        Number => "NUMBER",
        Email => "EMAIL",
        Phone => "PHONE",
    }
}

closed_set! {
    /// Portal categories used when cross-posting bulletins and forms
    BulletinCategory, "bulletin category" {
        ChiefAndCouncil => "CHIEFNCOUNCIL",
        Health => "HEALTH",
        Education => "EDUCATION",
        Recreation => "RECREATION",
        Employment => "EMPLOYMENT",
        ProgramEvents => "PROGRAM_EVENTS",
        Announcements => "ANNOUNCEMENTS",
    }
}

impl Default for Department {
    fn default() -> Self {
        Department::BandOffice
    }
}

impl Role {
    fn rank(&self) -> u8 {
        match self {
            Role::Staff => 0,
            Role::StaffAdmin => 1,
            Role::Admin => 2,
            Role::ChiefCouncil => 3,
        }
    }

    /// True when this role carries at least the privileges of `required`
    pub fn at_least(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl FieldType {
    /// Select-style fields carry an option list
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::MultiSelect)
    }
}

impl Default for BulletinCategory {
    fn default() -> Self {
        BulletinCategory::ProgramEvents
    }
}
