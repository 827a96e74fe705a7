//! Mirrors ledger state onto the monthly attendance matrix and the daily in/out board.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use super::{CellWrite, GridSpan, Rgb, SheetsError, Spreadsheet, TextRule, Worksheet};
use crate::model::mark::{DailyStatus, MonthlyMark};
use crate::model::staff::Staff;

pub const MONTHLY_INITIAL_ROWS: u32 = 50;
pub const DAILY_HEADERS: [&str; 4] = ["Name", "Department", "Status", "Time"];
const DAILY_STATUS_COL: u32 = 3;
const DAILY_FORMAT_LAST_ROW: u32 = 100;

const GREEN: Rgb = Rgb::new(0.8, 1.0, 0.8);
const RED: Rgb = Rgb::new(1.0, 0.8, 0.8);
const AMBER: Rgb = Rgb::new(1.0, 0.9, 0.6);

pub fn monthly_title(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

pub fn daily_title(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// True for titles shaped like a monthly sheet, e.g. "September 2026".
fn is_monthly_title(title: &str) -> bool {
    NaiveDate::parse_from_str(&format!("01 {title}"), "%d %B %Y").is_ok()
}

pub fn event_time(at: NaiveDateTime) -> String {
    at.format("%H:%M:%S").to_string()
}

/// `["Name", "YYYY-MM-01", ..., last day of the month]`.
pub fn monthly_headers(date: NaiveDate) -> Vec<String> {
    let mut headers = vec!["Name".to_string()];
    if let Some(first) = date.with_day(1) {
        headers.extend(
            first
                .iter_days()
                .take_while(|d| d.month() == date.month())
                .map(daily_title),
        );
    }
    headers
}

fn monthly_rules(cols: u32) -> Vec<TextRule> {
    let span = GridSpan {
        first_row: 2,
        last_row: MONTHLY_INITIAL_ROWS,
        first_col: 2,
        last_col: cols,
    };
    [
        (MonthlyMark::Present, GREEN),
        (MonthlyMark::Absent, RED),
        (MonthlyMark::PresentLate, AMBER),
    ]
    .into_iter()
    .map(|(mark, background)| TextRule {
        span,
        text: mark.to_string(),
        background,
    })
    .collect()
}

fn daily_rules() -> Vec<TextRule> {
    let span = GridSpan {
        first_row: 2,
        last_row: DAILY_FORMAT_LAST_ROW,
        first_col: DAILY_STATUS_COL,
        last_col: DAILY_STATUS_COL,
    };
    [(DailyStatus::In, GREEN), (DailyStatus::Out, RED)]
        .into_iter()
        .map(|(status, background)| TextRule {
            span,
            text: status.to_string(),
            background,
        })
        .collect()
}

/// Name to 1-based row number, skipping the header row and blank names.
fn row_index(names: &[String]) -> HashMap<String, u32> {
    names
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, name)| !name.trim().is_empty())
        .map(|(i, name)| (name.clone(), i as u32 + 1))
        .collect()
}

/// Worksheets and row positions resolved once per run.
#[derive(Debug, Clone)]
pub struct SheetSession {
    pub monthly: Worksheet,
    pub daily: Worksheet,
    pub today_col: u32,
    pub monthly_rows: HashMap<String, u32>,
    pub daily_rows: HashMap<String, u32>,
}

pub struct SheetProjector<'a> {
    sheets: &'a dyn Spreadsheet,
    session: SheetSession,
}

impl<'a> SheetProjector<'a> {
    /// Prepares both views for `today` and caches row positions for later updates.
    ///
    /// Safe to re-run on the same day: only still-blank cells in today's column are
    /// filled with "Absent", and rows are only appended for staff not yet listed.
    pub async fn initialize(
        sheets: &'a dyn Spreadsheet,
        roster: &[Staff],
        today: NaiveDate,
    ) -> Result<SheetProjector<'a>, SheetsError> {
        let existing = sheets.worksheets().await?;
        let (monthly, today_col, monthly_rows) =
            init_monthly(sheets, &existing, roster, today).await?;
        let (daily, daily_rows) = init_daily(sheets, &existing, roster, today).await?;

        Ok(Self {
            sheets,
            session: SheetSession {
                monthly,
                daily,
                today_col,
                monthly_rows,
                daily_rows,
            },
        })
    }

    pub fn session(&self) -> &SheetSession {
        &self.session
    }

    /// Sign-in: today's monthly cell and the daily row.
    pub async fn project_sign_in(
        &self,
        name: &str,
        mark: MonthlyMark,
        at: NaiveDateTime,
    ) -> Result<(), SheetsError> {
        let monthly = self.write_monthly_mark(name, mark).await;
        let daily = self.write_daily_row(name, DailyStatus::In, at).await;
        monthly.and(daily)
    }

    /// Sign-out: the daily row only. The monthly cell keeps its Present mark.
    pub async fn project_sign_out(&self, name: &str, at: NaiveDateTime) -> Result<(), SheetsError> {
        info!(name, "Monthly sheet unchanged after sign-out");
        self.write_daily_row(name, DailyStatus::Out, at).await
    }

    /// Forced sign-outs from the end-of-day sweep, written as one batch.
    pub async fn project_sweep(&self, names: &[String], at: NaiveDateTime) -> Result<(), SheetsError> {
        let time = event_time(at);
        let writes: Vec<CellWrite> = names
            .iter()
            .filter_map(|name| match self.session.daily_rows.get(name) {
                Some(row) => Some(CellWrite::row(
                    *row,
                    DAILY_STATUS_COL,
                    vec![DailyStatus::Out.to_string(), time.clone()],
                )),
                None => {
                    warn!(name = %name, "Daily sheet has no row for swept staff member");
                    None
                }
            })
            .collect();

        if writes.is_empty() {
            info!("No daily sheet updates for end-of-day sweep");
            return Ok(());
        }
        self.sheets.batch_write(&self.session.daily, &writes).await?;
        info!(count = writes.len(), "Daily sheet: applied end-of-day OUT updates");
        Ok(())
    }

    async fn write_monthly_mark(&self, name: &str, mark: MonthlyMark) -> Result<(), SheetsError> {
        let Some(row) = self.session.monthly_rows.get(name) else {
            warn!(name, "Monthly sheet has no row for staff member, status not updated");
            return Ok(());
        };
        let write = CellWrite::single(*row, self.session.today_col, mark.to_string());
        self.sheets.batch_write(&self.session.monthly, &[write]).await?;
        info!(name, %mark, "Monthly sheet updated");
        Ok(())
    }

    async fn write_daily_row(
        &self,
        name: &str,
        status: DailyStatus,
        at: NaiveDateTime,
    ) -> Result<(), SheetsError> {
        let Some(row) = self.session.daily_rows.get(name) else {
            warn!(name, "Daily sheet has no row for staff member, status not updated");
            return Ok(());
        };
        let time = event_time(at);
        let write = CellWrite::row(*row, DAILY_STATUS_COL, vec![status.to_string(), time.clone()]);
        self.sheets.batch_write(&self.session.daily, &[write]).await?;
        info!(name, %status, time = %time, "Daily sheet updated");
        Ok(())
    }
}

async fn init_monthly(
    sheets: &dyn Spreadsheet,
    existing: &[Worksheet],
    roster: &[Staff],
    today: NaiveDate,
) -> Result<(Worksheet, u32, HashMap<String, u32>), SheetsError> {
    let title = monthly_title(today);
    let headers = monthly_headers(today);
    let cols = headers.len() as u32;
    let today_str = daily_title(today);

    let month = match existing.iter().find(|w| w.title == title) {
        Some(ws) => {
            info!(sheet = %title, "Using existing monthly sheet");
            ws.clone()
        }
        None => {
            info!(sheet = %title, "Creating monthly sheet");
            let ws = sheets.add_worksheet(&title, MONTHLY_INITIAL_ROWS, cols).await?;
            sheets
                .batch_write(&ws, &[CellWrite::row(1, 1, headers.clone())])
                .await?;
            sheets.replace_conditional_rules(&ws, &monthly_rules(cols)).await?;
            ws
        }
    };

    let mut current_headers = sheets.row_values(&month, 1).await?;
    if current_headers != headers {
        info!(sheet = %title, "Rewriting monthly sheet headers");
        sheets
            .batch_write(&month, &[CellWrite::row(1, 1, headers.clone())])
            .await?;
        sheets.replace_conditional_rules(&month, &monthly_rules(cols)).await?;
        current_headers = sheets.row_values(&month, 1).await?;
    }

    let today_col = current_headers
        .iter()
        .position(|h| *h == today_str)
        .map(|i| i as u32 + 1)
        .ok_or_else(|| SheetsError::MissingColumn {
            sheet: title.clone(),
            header: today_str.clone(),
        })?;

    let mut names = sheets.col_values(&month, 1).await?;
    let mut listed: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut new_rows = Vec::new();
    for staff in roster {
        if listed.insert(staff.name.as_str()) {
            info!(name = %staff.name, "New staff member for monthly sheet");
            let mut row = vec![String::new(); headers.len()];
            row[0] = staff.name.clone();
            new_rows.push(row);
        }
    }
    if !new_rows.is_empty() {
        sheets.append_rows(&month, &new_rows).await?;
        info!(count = new_rows.len(), "Added staff rows to monthly sheet");
        names = sheets.col_values(&month, 1).await?;
    }
    let monthly_rows = row_index(&names);

    let day_values = sheets.col_values(&month, today_col).await?;
    let mut blank_rows: Vec<u32> = monthly_rows
        .values()
        .copied()
        .filter(|row| {
            day_values
                .get(*row as usize - 1)
                .is_none_or(|v| v.trim().is_empty())
        })
        .collect();
    blank_rows.sort_unstable();
    let absent: Vec<CellWrite> = blank_rows
        .into_iter()
        .map(|row| CellWrite::single(row, today_col, MonthlyMark::Absent.to_string()))
        .collect();
    if !absent.is_empty() {
        sheets.batch_write(&month, &absent).await?;
        info!(count = absent.len(), day = %today_str, "Marked unmarked staff Absent");
    }

    Ok((month, today_col, monthly_rows))
}

async fn init_daily(
    sheets: &dyn Spreadsheet,
    existing: &[Worksheet],
    roster: &[Staff],
    today: NaiveDate,
) -> Result<(Worksheet, HashMap<String, u32>), SheetsError> {
    let title = daily_title(today);

    let daily = match existing.iter().find(|w| w.title == title) {
        Some(ws) => {
            info!(sheet = %title, "Using existing daily sheet");
            ws.clone()
        }
        None => {
            // Monthly matrices, past or present, are never recycled.
            let ws = match existing.iter().find(|w| !is_monthly_title(&w.title)) {
                Some(previous) => {
                    info!(from = %previous.title, to = %title, "Repurposing worksheet as daily sheet");
                    sheets.rename_worksheet(previous, &title).await?
                }
                None => {
                    info!(sheet = %title, "Creating daily sheet");
                    sheets
                        .add_worksheet(&title, DAILY_FORMAT_LAST_ROW, DAILY_HEADERS.len() as u32)
                        .await?
                }
            };
            sheets.clear(&ws).await?;
            sheets.replace_conditional_rules(&ws, &daily_rules()).await?;
            ws
        }
    };

    let expected: Vec<String> = DAILY_HEADERS.iter().map(|h| h.to_string()).collect();
    if sheets.row_values(&daily, 1).await? != expected {
        info!(sheet = %title, "Writing daily sheet headers");
        sheets
            .batch_write(&daily, &[CellWrite::row(1, 1, expected.clone())])
            .await?;
        sheets.format_header(&daily, expected.len() as u32).await?;
        sheets.replace_conditional_rules(&daily, &daily_rules()).await?;
    }

    let names = sheets.col_values(&daily, 1).await?;
    let mut listed: HashSet<&str> = names.iter().map(String::as_str).collect();
    let new_rows: Vec<Vec<String>> = roster
        .iter()
        .filter(|staff| listed.insert(staff.name.as_str()))
        .map(|staff| {
            vec![
                staff.name.clone(),
                staff.department.clone().unwrap_or_else(|| "N/A".to_string()),
                DailyStatus::Out.to_string(),
                String::new(),
            ]
        })
        .collect();

    let names = if new_rows.is_empty() {
        info!("Daily sheet already lists every staff member");
        names
    } else {
        sheets.append_rows(&daily, &new_rows).await?;
        info!(count = new_rows.len(), "Added staff rows to daily sheet");
        sheets.col_values(&daily, 1).await?
    };

    Ok((daily, row_index(&names)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemorySheets, staff};

    const MONTH: &str = "October 2026";
    const DAY: &str = "2026-10-18";
    const TODAY_COL: u32 = 19;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn roster() -> Vec<Staff> {
        vec![
            staff("T1", "Alice", "Operations"),
            staff("T2", "Bob", "Finance"),
        ]
    }

    #[test]
    fn month_headers_cover_every_day() {
        let headers = monthly_headers(today());
        assert_eq!(headers.len(), 32);
        assert_eq!(headers[0], "Name");
        assert_eq!(headers[1], "2026-10-01");
        assert_eq!(headers[31], "2026-10-31");

        let feb = monthly_headers(NaiveDate::from_ymd_opt(2028, 2, 10).unwrap());
        assert_eq!(feb.len(), 30);
    }

    #[test]
    fn monthly_titles_are_recognised() {
        assert!(is_monthly_title("September 2026"));
        assert!(is_monthly_title(MONTH));
        assert!(!is_monthly_title("2026-09-30"));
        assert!(!is_monthly_title("Sheet1"));
    }

    #[test]
    fn titles_and_times() {
        assert_eq!(monthly_title(today()), MONTH);
        assert_eq!(daily_title(today()), DAY);
        assert_eq!(event_time(today().and_hms_opt(7, 5, 9).unwrap()), "07:05:09");
    }

    #[tokio::test]
    async fn fresh_workbook_gets_both_sheets() {
        let sheets = MemorySheets::with_default_tab("Sheet1");

        let projector = SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();

        let mut titles = sheets.titles();
        titles.sort();
        assert_eq!(titles, vec![DAY.to_string(), MONTH.to_string()]);

        let month = sheets.sheet(MONTH).unwrap();
        assert_eq!(month.grid[0].len(), 32);
        assert_eq!(month.rules.len(), 3);
        assert_eq!(sheets.cell(MONTH, 2, 1), "Alice");
        assert_eq!(sheets.cell(MONTH, 3, 1), "Bob");
        assert_eq!(sheets.cell(MONTH, 2, TODAY_COL), "Absent");
        assert_eq!(sheets.cell(MONTH, 3, TODAY_COL), "Absent");
        assert_eq!(sheets.cell(MONTH, 2, TODAY_COL - 1), "");

        let daily = sheets.sheet(DAY).unwrap();
        assert!(daily.header_formatted);
        assert_eq!(daily.rules.len(), 2);
        assert_eq!(daily.grid[0], DAILY_HEADERS.map(String::from).to_vec());
        assert_eq!(
            daily.grid[2],
            vec!["Bob", "Finance", "OUT", ""]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );

        let session = projector.session();
        assert_eq!(session.today_col, TODAY_COL);
        assert_eq!(session.monthly_rows.get("Bob"), Some(&3));
        assert_eq!(session.daily_rows.get("Alice"), Some(&2));
    }

    #[tokio::test]
    async fn rerun_keeps_marks_and_rows() {
        let sheets = MemorySheets::with_default_tab("Sheet1");
        SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();
        sheets.set_cell(MONTH, 2, TODAY_COL, "Present");
        sheets.set_cell(DAY, 2, 3, "IN");

        SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();

        assert_eq!(sheets.cell(MONTH, 2, TODAY_COL), "Present");
        assert_eq!(sheets.cell(MONTH, 3, TODAY_COL), "Absent");
        assert_eq!(sheets.cell(MONTH, 4, 1), "");
        assert_eq!(sheets.cell(DAY, 2, 3), "IN");
        assert_eq!(sheets.cell(DAY, 4, 1), "");
        assert_eq!(sheets.titles().len(), 2);
    }

    #[tokio::test]
    async fn new_staff_are_appended() {
        let sheets = MemorySheets::with_default_tab("Sheet1");
        SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();

        let mut grown = roster();
        grown.push(Staff {
            tag_id: "T3".to_string(),
            name: "Carol".to_string(),
            department: None,
        });
        let projector = SheetProjector::initialize(&sheets, &grown, today())
            .await
            .unwrap();

        assert_eq!(sheets.cell(MONTH, 4, 1), "Carol");
        assert_eq!(sheets.cell(MONTH, 4, TODAY_COL), "Absent");
        assert_eq!(sheets.cell(DAY, 4, 1), "Carol");
        assert_eq!(sheets.cell(DAY, 4, 2), "N/A");
        assert_eq!(projector.session().daily_rows.get("Carol"), Some(&4));
    }

    #[tokio::test]
    async fn stale_monthly_headers_are_rewritten() {
        let sheets = MemorySheets::default();
        sheets.insert_sheet(MONTH, vec![vec!["Name", "1", "2"], vec!["Alice"]]);
        sheets.insert_sheet(DAY, vec![]);

        let projector = SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();

        assert_eq!(sheets.cell(MONTH, 1, 2), "2026-10-01");
        assert_eq!(sheets.sheet(MONTH).unwrap().rules.len(), 3);
        assert_eq!(projector.session().today_col, TODAY_COL);
        assert_eq!(projector.session().monthly_rows.get("Alice"), Some(&2));
        assert_eq!(projector.session().monthly_rows.get("Bob"), Some(&3));
    }

    #[tokio::test]
    async fn existing_daily_sheet_is_not_cleared() {
        let sheets = MemorySheets::default();
        sheets.insert_sheet(
            DAY,
            vec![
                vec!["Name", "Department", "Status", "Time"],
                vec!["Bob", "Finance", "IN", "07:40:00"],
            ],
        );

        let projector = SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();

        assert_eq!(sheets.cell(DAY, 2, 3), "IN");
        assert_eq!(sheets.cell(DAY, 3, 1), "Alice");
        assert!(!sheets.sheet(DAY).unwrap().header_formatted);
        assert_eq!(projector.session().daily_rows.get("Bob"), Some(&2));
        assert!(sheets.titles().contains(&MONTH.to_string()));
    }

    #[tokio::test]
    async fn yesterdays_board_is_repurposed() {
        let sheets = MemorySheets::default();
        sheets.insert_sheet(
            "2026-10-17",
            vec![
                vec!["Name", "Department", "Status", "Time"],
                vec!["Alice", "Operations", "OUT", "16:30:00"],
            ],
        );

        SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();

        assert!(!sheets.titles().contains(&"2026-10-17".to_string()));
        assert_eq!(sheets.cell(DAY, 2, 1), "Alice");
        assert_eq!(sheets.cell(DAY, 2, 4), "");
        assert_eq!(sheets.cell(DAY, 3, 1), "Bob");
    }

    #[tokio::test]
    async fn sweep_writes_only_known_rows() {
        let sheets = MemorySheets::with_default_tab("Sheet1");
        let projector = SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();
        let at = today().and_hms_opt(17, 0, 0).unwrap();

        projector
            .project_sweep(&["Bob".to_string(), "Ghost".to_string()], at)
            .await
            .unwrap();

        assert_eq!(sheets.cell(DAY, 3, 3), "OUT");
        assert_eq!(sheets.cell(DAY, 3, 4), "17:00:00");
        assert_eq!(sheets.cell(DAY, 2, 4), "");
    }

    #[tokio::test]
    async fn last_months_matrix_survives_month_change() {
        let sheets = MemorySheets::default();
        sheets.insert_sheet(
            "September 2026",
            vec![vec!["Name", "2026-09-01"], vec!["Alice", "Present"]],
        );
        sheets.insert_sheet(
            "2026-09-30",
            vec![vec!["Name", "Department", "Status", "Time"]],
        );
        let first = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();

        SheetProjector::initialize(&sheets, &roster(), first)
            .await
            .unwrap();

        let mut titles = sheets.titles();
        titles.sort();
        assert_eq!(titles, vec!["2026-10-01", MONTH, "September 2026"]);
        assert_eq!(sheets.cell("September 2026", 2, 2), "Present");
        assert_eq!(sheets.cell("2026-10-01", 2, 1), "Alice");
    }

    #[tokio::test]
    async fn workbook_of_only_monthly_sheets_gets_a_new_daily_tab() {
        let sheets = MemorySheets::default();
        sheets.insert_sheet("September 2026", vec![vec!["Name"], vec!["Bob"]]);

        SheetProjector::initialize(&sheets, &roster(), today())
            .await
            .unwrap();

        assert_eq!(sheets.titles().len(), 3);
        assert_eq!(sheets.cell("September 2026", 2, 1), "Bob");
        assert_eq!(sheets.cell(DAY, 2, 1), "Alice");
    }
}
