//! # Enumerated Choices
//!
//! Every closed set of values in the schema is a Rust enum with a stable
//! snake_case wire form (what the database and the JSON API store) and a
//! Persian display label. Adding a variant forces every exhaustive `match`
//! in the workspace, including the statistics buckets, to handle it.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, $label:literal; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable wire representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }

            /// Persian display label.
            pub fn label_fa(&self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $wire => Ok(Self::$variant), )+
                    other => Err(ValidationError::UnknownChoice {
                        kind: $kind,
                        value: other.to_string(),
                        expected: [$($wire),+].join(", "),
                    }),
                }
            }
        }
    };
}

choice_enum! {
    /// Relationship of a dependent to the account holder.
    Relation, "relation" {
        /// Husband or wife.
        Spouse => "spouse", "همسر";
        /// Son or daughter.
        Child => "child", "فرزند";
        /// Father or mother.
        Parent => "parent", "والدین";
        /// Brother or sister.
        Sibling => "sibling", "خواهر/برادر";
        /// Anything else.
        Other => "other", "سایر";
    }
}

choice_enum! {
    /// Education stage served by a school.
    SchoolType, "school type" {
        Elementary => "elementary", "ابتدایی";
        Middle => "middle", "متوسطه اول";
        High => "high", "متوسطه دوم";
        Combined => "combined", "ترکیبی";
    }
}

choice_enum! {
    /// Insurance plan tier. Declaration order is the listing order.
    PlanType, "plan type" {
        Basic => "basic", "پایه";
        Standard => "standard", "استاندارد";
        Premium => "premium", "ویژه";
    }
}

choice_enum! {
    /// Kind of medical service a coverage line pays for.
    CoverageType, "coverage type" {
        Outpatient => "outpatient", "درمان سرپایی";
        Hospitalization => "hospitalization", "بستری";
        Medication => "medication", "دارو";
        Laboratory => "laboratory", "آزمایش";
        Imaging => "imaging", "تصویربرداری";
        Dental => "dental", "دندانپزشکی";
        Ophthalmology => "ophthalmology", "چشم‌پزشکی";
        Physiotherapy => "physiotherapy", "فیزیوتراپی";
    }
}

choice_enum! {
    /// Lifecycle status of an insurance registration.
    RegistrationStatus, "registration status" {
        /// Submitted, awaiting review.
        Pending => "pending", "در انتظار بررسی";
        /// Accepted by an administrator, not yet in force.
        Approved => "approved", "تایید شده";
        /// Refused by an administrator.
        Rejected => "rejected", "رد شده";
        /// Coverage in force.
        Active => "active", "فعال";
        /// Coverage period ended.
        Expired => "expired", "منقضی شده";
        /// Withdrawn.
        Cancelled => "cancelled", "لغو شده";
    }
}

impl RegistrationStatus {
    /// Pending, approved and active registrations block a new one for the
    /// same user.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved | Self::Active)
    }
}

impl Default for RegistrationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

choice_enum! {
    /// Category of an uploaded supporting document.
    DocumentType, "document type" {
        NationalId => "national_id", "کارت ملی";
        BirthCertificate => "birth_certificate", "شناسنامه";
        MarriageCertificate => "marriage_certificate", "سند ازدواج";
        EmploymentLetter => "employment_letter", "حکم کارگزینی";
        InsuranceRequest => "insurance_request", "فرم درخواست بیمه";
        MedicalRecords => "medical_records", "مدارک پزشکی";
        Other => "other", "سایر";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_round_trips_through_from_str() {
        for r in Relation::ALL {
            assert_eq!(r.as_str().parse::<Relation>().unwrap(), *r);
        }
        for c in CoverageType::ALL {
            assert_eq!(c.as_str().parse::<CoverageType>().unwrap(), *c);
        }
        for d in DocumentType::ALL {
            assert_eq!(d.as_str().parse::<DocumentType>().unwrap(), *d);
        }
    }

    #[test]
    fn serde_uses_snake_case_wire_form() {
        assert_eq!(
            serde_json::to_string(&DocumentType::BirthCertificate).unwrap(),
            "\"birth_certificate\""
        );
        let s: RegistrationStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(s, RegistrationStatus::Cancelled);
    }

    #[test]
    fn unknown_value_lists_choices() {
        let err = "gold".parse::<PlanType>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("gold"));
        assert!(msg.contains("basic, standard, premium"));
    }

    #[test]
    fn open_statuses() {
        let open: Vec<_> = RegistrationStatus::ALL
            .iter()
            .filter(|s| s.is_open())
            .collect();
        assert_eq!(
            open,
            vec![
                &RegistrationStatus::Pending,
                &RegistrationStatus::Approved,
                &RegistrationStatus::Active
            ]
        );
    }

    #[test]
    fn plan_types_order_by_tier() {
        assert!(PlanType::Basic < PlanType::Standard);
        assert!(PlanType::Standard < PlanType::Premium);
    }

    #[test]
    fn relation_labels_are_persian() {
        assert_eq!(Relation::Spouse.label_fa(), "همسر");
        assert_eq!(Relation::Child.label_fa(), "فرزند");
    }

    #[test]
    fn counts_match_schema() {
        assert_eq!(Relation::ALL.len(), 5);
        assert_eq!(SchoolType::ALL.len(), 4);
        assert_eq!(PlanType::ALL.len(), 3);
        assert_eq!(CoverageType::ALL.len(), 8);
        assert_eq!(RegistrationStatus::ALL.len(), 6);
        assert_eq!(DocumentType::ALL.len(), 7);
    }
}
