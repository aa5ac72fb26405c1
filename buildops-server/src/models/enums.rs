//! Status, role and category enumerations mirrored from Postgres enum types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Declare an enum stored as a Postgres enum type and sent as snake_case JSON.
macro_rules! pg_enum {
    (
        $(#[$meta:meta])*
        $name:ident => $pg_type:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[serde(rename_all = "snake_case")]
        #[sqlx(type_name = $pg_type, rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ValidationError::InvalidVariant {
                        field: $pg_type,
                        value: other.to_owned(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }
    };
}

pg_enum! {
    TenantStatus => "tenant_status" {
        Active => "active",
        Suspended => "suspended",
        Cancelled => "cancelled",
        Trial => "trial",
    }
}

pg_enum! {
    UserRole => "user_role" {
        Owner => "owner",
        Admin => "admin",
        Member => "member",
        Client => "client",
    }
}

impl UserRole {
    /// Owners and admins may manage the team.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

pg_enum! {
    UserStatus => "user_status" {
        Active => "active",
        Suspended => "suspended",
        Pending => "pending",
    }
}

pg_enum! {
    HomeownerStatus => "homeowner_status" {
        Inquiry => "inquiry",
        Contracted => "contracted",
        Construction => "construction",
        PunchList => "punch_list",
        Completed => "completed",
        Warranty => "warranty",
        Archived => "archived",
    }
}

pg_enum! {
    ClientStatus => "client_status" {
        Lead => "lead",
        Prospect => "prospect",
        Onboarding => "onboarding",
        Active => "active",
        Completed => "completed",
        Churned => "churned",
    }
}

pg_enum! {
    ProjectStatus => "project_status" {
        Draft => "draft",
        Planning => "planning",
        InProgress => "in_progress",
        Review => "review",
        Completed => "completed",
        OnHold => "on_hold",
        Cancelled => "cancelled",
    }
}

impl ProjectStatus {
    /// Statuses counted as active work on the dashboard.
    pub const ACTIVE: &'static [Self] = &[Self::Planning, Self::InProgress, Self::Review];
}

pg_enum! {
    TaskStatus => "task_status" {
        Backlog => "backlog",
        Todo => "todo",
        InProgress => "in_progress",
        InReview => "in_review",
        Done => "done",
    }
}

impl TaskStatus {
    /// Statuses counted as pending work on the dashboard.
    pub const PENDING: &'static [Self] = &[Self::Todo, Self::InProgress];
}

pg_enum! {
    TaskPriority => "task_priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

pg_enum! {
    CommunicationType => "communication_type" {
        CallInbound => "call_inbound",
        CallOutbound => "call_outbound",
        CallMissed => "call_missed",
        CallVoicemail => "call_voicemail",
        SmsInbound => "sms_inbound",
        SmsOutbound => "sms_outbound",
        EmailInbound => "email_inbound",
        EmailOutbound => "email_outbound",
    }
}

impl CommunicationType {
    pub const CALLS: &'static [Self] = &[
        Self::CallInbound,
        Self::CallOutbound,
        Self::CallMissed,
        Self::CallVoicemail,
    ];
    pub const SMS: &'static [Self] = &[Self::SmsInbound, Self::SmsOutbound];
}

pg_enum! {
    CommunicationStatus => "communication_status" {
        Completed => "completed",
        PendingFollowUp => "pending_follow_up",
        Urgent => "urgent",
        Archived => "archived",
    }
}

pg_enum! {
    Sentiment => "sentiment" {
        Positive => "positive",
        Neutral => "neutral",
        Negative => "negative",
    }
}

pg_enum! {
    SubcontractorStatus => "subcontractor_status" {
        Active => "active",
        Preferred => "preferred",
        OnHold => "on_hold",
        DoNotUse => "do_not_use",
    }
}

pg_enum! {
    TradeCategory => "trade_category" {
        GeneralContractor => "general_contractor",
        Electrical => "electrical",
        Plumbing => "plumbing",
        Hvac => "hvac",
        Roofing => "roofing",
        Framing => "framing",
        Concrete => "concrete",
        Flooring => "flooring",
        Painting => "painting",
        Landscaping => "landscaping",
        Excavation => "excavation",
        Insulation => "insulation",
        Drywall => "drywall",
        Cabinets => "cabinets",
        Countertops => "countertops",
        WindowsDoors => "windows_doors",
        Appliances => "appliances",
        Cleaning => "cleaning",
        Other => "other",
    }
}

pg_enum! {
    InvoiceStatus => "invoice_status" {
        Draft => "draft",
        Open => "open",
        Paid => "paid",
        Void => "void",
    }
}

pg_enum! {
    SubscriptionStatus => "subscription_status" {
        Active => "active",
        PastDue => "past_due",
        Cancelled => "cancelled",
        Trialing => "trialing",
        Incomplete => "incomplete",
    }
}

pg_enum! {
    VerificationKind => "verification_kind" {
        PasswordReset => "password_reset",
        EmailVerification => "email_verification",
    }
}

pg_enum! {
    /// Linear onboarding wizard position, see [`crate::models::onboarding`].
    OnboardingStep => "onboarding_step" {
        Company => "company",
        Team => "team",
        Branding => "branding",
        Integrations => "integrations",
        Billing => "billing",
        Complete => "complete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&HomeownerStatus::PunchList).unwrap();
        assert_eq!(json, "\"punch_list\"");
        let parsed: TradeCategory = serde_json::from_str("\"windows_doors\"").unwrap();
        assert_eq!(parsed, TradeCategory::WindowsDoors);
    }

    #[test]
    fn as_str_matches_serde() {
        for status in TaskStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert_eq!("in_review".parse::<TaskStatus>().unwrap(), TaskStatus::InReview);
        let err = "finished".parse::<TaskStatus>().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidVariant { field: "task_status", .. }));
    }

    #[test]
    fn admin_roles() {
        assert!(UserRole::Owner.is_admin());
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Member.is_admin());
        assert!(!UserRole::Client.is_admin());
    }
}
