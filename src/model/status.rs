//! Stored state values for the booking, assignment and notification
//! workflows. Every variant maps to the exact string persisted in the
//! database; transitions themselves are enforced by conditional updates
//! at the query site, not here.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Requested,
    AwaitingPayment,
    Confirmed,
    Declined,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Confirmed => "confirmed",
            Self::Declined => "declined",
            Self::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(Self::Requested),
            "awaiting_payment" => Some(Self::AwaitingPayment),
            "confirmed" => Some(Self::Confirmed),
            "declined" => Some(Self::Declined),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Terminal states have no outgoing transitions. `confirmed` is final
    /// for the student (no refund path) but still feeds the assignment
    /// pipeline, so it is not considered terminal here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Declined | Self::Canceled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStatus {
    Created,
    Submitted,
    Graded,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Submitted => "submitted",
            Self::Graded => "graded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            // submit-and-grade is one atomic call, so `submitted` is a
            // transient phase that never persists between requests
            "submitted" => Some(Self::Submitted),
            "graded" => Some(Self::Graded),
            _ => None,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    None,
    Applied,
    Dismissed,
}

impl NotificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Applied => "applied",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "applied" => Some(Self::Applied),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    TutorApplication,
    CourseMatch,
    CourseAccepted,
    CourseRejected,
    CourseAssignedElsewhere,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TutorApplication => "tutor_application",
            Self::CourseMatch => "course_match",
            Self::CourseAccepted => "course_accepted",
            Self::CourseRejected => "course_rejected",
            Self::CourseAssignedElsewhere => "course_assigned_elsewhere",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    Student,
    Tutor,
    Admin,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Tutor => "tutor",
            Self::Admin => "admin",
        }
    }
}

/// Caller-visible score classification. The server never gates anything on
/// the band; it is reported alongside the numeric grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeBand {
    Fail,
    BelowPassing,
    Pass,
}

impl GradeBand {
    pub fn for_grade(grade: i32) -> Self {
        match grade {
            g if g < 50 => Self::Fail,
            g if g < 70 => Self::BelowPassing,
            _ => Self::Pass,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::BelowPassing => "below_passing",
            Self::Pass => "pass",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_status_round_trips() {
        for status in [
            BookingStatus::Requested,
            BookingStatus::AwaitingPayment,
            BookingStatus::Confirmed,
            BookingStatus::Declined,
            BookingStatus::Canceled,
        ] {
            assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::from_str("paid"), None);
    }

    #[test]
    fn terminal_booking_states() {
        assert!(BookingStatus::Declined.is_terminal());
        assert!(BookingStatus::Canceled.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(!BookingStatus::Requested.is_terminal());
        assert!(!BookingStatus::AwaitingPayment.is_terminal());
    }

    #[test]
    fn grade_band_thresholds() {
        assert_eq!(GradeBand::for_grade(0), GradeBand::Fail);
        assert_eq!(GradeBand::for_grade(49), GradeBand::Fail);
        assert_eq!(GradeBand::for_grade(50), GradeBand::BelowPassing);
        assert_eq!(GradeBand::for_grade(60), GradeBand::BelowPassing);
        assert_eq!(GradeBand::for_grade(69), GradeBand::BelowPassing);
        assert_eq!(GradeBand::for_grade(70), GradeBand::Pass);
        assert_eq!(GradeBand::for_grade(100), GradeBand::Pass);
    }
}
