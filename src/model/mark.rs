use strum_macros::{AsRefStr, Display, EnumString};

/// Value of a staff/day cell in the monthly sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum MonthlyMark {
    #[strum(serialize = "Absent")]
    Absent,
    #[strum(serialize = "Present")]
    Present,
    #[strum(serialize = "Present(LATE)")]
    PresentLate,
}

/// Status column of the daily sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum DailyStatus {
    #[strum(serialize = "IN")]
    In,
    #[strum(serialize = "OUT")]
    Out,
}
