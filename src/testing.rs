//! In-memory ledger and workbook used by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::model::onsite::{ActiveRecord, DayWindow, OnsiteRecord};
use crate::model::staff::{Assignment, Staff};
use crate::sheets::a1::a1_to_rowcol;
use crate::sheets::{CellWrite, SheetsError, Spreadsheet, TextRule, Worksheet};
use crate::store::{AttendanceStore, StoreError};

pub fn staff(tag_id: &str, name: &str, department: &str) -> Staff {
    Staff {
        tag_id: tag_id.to_string(),
        name: name.to_string(),
        department: Some(department.to_string()),
    }
}

#[derive(Default)]
struct LedgerState {
    staff: Vec<Staff>,
    assignments: Vec<Assignment>,
    records: Vec<OnsiteRecord>,
    assignment_inserts: usize,
    fail_writes: bool,
    fail_sweep: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<LedgerState>,
}

impl MemoryStore {
    pub fn with_staff(staff: Vec<Staff>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().staff = staff;
        store
    }

    pub fn add_assignment(&self, tag_id: &str, name: &str) {
        self.state.lock().unwrap().assignments.push(Assignment {
            tag_id: tag_id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn add_record(&self, tag_id: &str, at: NaiveDateTime, active: bool) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.records.len() as u64 + 1;
        state.records.push(OnsiteRecord {
            id,
            tag_id: tag_id.to_string(),
            scan_date: at,
            active,
            sign_out_date: None,
        });
        id
    }

    pub fn records(&self) -> Vec<OnsiteRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.state.lock().unwrap().assignments.clone()
    }

    pub fn assignment_inserts(&self) -> usize {
        self.state.lock().unwrap().assignment_inserts
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn fail_sweep(&self, fail: bool) {
        self.state.lock().unwrap().fail_sweep = fail;
    }
}

fn write_refused() -> StoreError {
    StoreError::Database(sqlx::Error::Protocol("write refused by test".to_string()))
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn staff_roster(&self) -> Result<Vec<Staff>, StoreError> {
        Ok(self.state.lock().unwrap().staff.clone())
    }

    async fn staff_by_tag(&self, tag_id: &str) -> Result<Option<Staff>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.staff.iter().find(|s| s.tag_id == tag_id).cloned())
    }

    async fn assignment_by_tag(&self, tag_id: &str) -> Result<Option<Assignment>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.assignments.iter().find(|a| a.tag_id == tag_id).cloned())
    }

    async fn insert_assignment(&self, tag_id: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(write_refused());
        }
        state.assignment_inserts += 1;
        state.assignments.push(Assignment {
            tag_id: tag_id.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn latest_record(
        &self,
        tag_id: &str,
        day: &DayWindow,
    ) -> Result<Option<OnsiteRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| r.tag_id == tag_id && day.contains(r.scan_date))
            .max_by_key(|r| (r.scan_date, r.id))
            .cloned())
    }

    async fn open_record(&self, tag_id: &str, at: NaiveDateTime) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(write_refused());
        }
        let id = state.records.len() as u64 + 1;
        state.records.push(OnsiteRecord {
            id,
            tag_id: tag_id.to_string(),
            scan_date: at,
            active: true,
            sign_out_date: None,
        });
        Ok(id)
    }

    async fn close_record(&self, record_id: u64, at: NaiveDateTime) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(write_refused());
        }
        if let Some(r) = state.records.iter_mut().find(|r| r.id == record_id) {
            r.active = false;
            r.sign_out_date = Some(at);
        }
        Ok(())
    }

    async fn active_records(&self, day: &DayWindow) -> Result<Vec<ActiveRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| r.active && day.contains(r.scan_date))
            .map(|r| ActiveRecord {
                id: r.id,
                tag_id: r.tag_id.clone(),
                name: state
                    .staff
                    .iter()
                    .find(|s| s.tag_id == r.tag_id)
                    .map(|s| s.name.clone()),
            })
            .collect())
    }

    async fn close_records(&self, record_ids: &[u64], at: NaiveDateTime) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sweep || state.fail_writes {
            return Err(write_refused());
        }
        for r in state.records.iter_mut().filter(|r| record_ids.contains(&r.id)) {
            r.active = false;
            r.sign_out_date = Some(at);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct MemSheet {
    pub ws: Worksheet,
    pub grid: Vec<Vec<String>>,
    pub rules: Vec<TextRule>,
    pub header_formatted: bool,
}

#[derive(Default)]
struct WorkbookState {
    sheets: Vec<MemSheet>,
    next_id: i64,
    fail_writes: bool,
    writes: usize,
}

/// Workbook held in memory. Reads drop trailing empty cells like the Sheets API does.
#[derive(Default)]
pub struct MemorySheets {
    state: Mutex<WorkbookState>,
}

fn trim_trailing(mut cells: Vec<String>) -> Vec<String> {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

impl MemorySheets {
    /// Workbook with one default tab, like a freshly created spreadsheet.
    pub fn with_default_tab(title: &str) -> Self {
        let book = Self::default();
        book.insert_sheet(title, Vec::new());
        book
    }

    pub fn insert_sheet(&self, title: &str, grid: Vec<Vec<&str>>) -> Worksheet {
        let mut state = self.state.lock().unwrap();
        let ws = Worksheet {
            id: state.next_id,
            title: title.to_string(),
            index: state.sheets.len() as u32,
        };
        state.next_id += 1;
        state.sheets.push(MemSheet {
            ws: ws.clone(),
            grid: grid
                .into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect(),
            rules: Vec::new(),
            header_formatted: false,
        });
        ws
    }

    pub fn sheet(&self, title: &str) -> Option<MemSheet> {
        let state = self.state.lock().unwrap();
        state.sheets.iter().find(|s| s.ws.title == title).cloned()
    }

    pub fn titles(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.sheets.iter().map(|s| s.ws.title.clone()).collect()
    }

    pub fn cell(&self, title: &str, row: u32, col: u32) -> String {
        self.sheet(title)
            .and_then(|s| {
                s.grid
                    .get(row as usize - 1)
                    .and_then(|r| r.get(col as usize - 1))
                    .cloned()
            })
            .unwrap_or_default()
    }

    pub fn set_cell(&self, title: &str, row: u32, col: u32, value: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(sheet) = state.sheets.iter_mut().find(|s| s.ws.title == title) {
            put(&mut sheet.grid, row, col, value);
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    fn with_sheet<T>(
        &self,
        sheet: &Worksheet,
        f: impl FnOnce(&mut MemSheet) -> T,
    ) -> Result<T, SheetsError> {
        let mut state = self.state.lock().unwrap();
        let found = state
            .sheets
            .iter_mut()
            .find(|s| s.ws.id == sheet.id)
            .ok_or_else(|| SheetsError::Api {
                status: 400,
                message: format!("no sheet with id {}", sheet.id),
            })?;
        Ok(f(found))
    }

    fn count_write(&self) -> Result<(), SheetsError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(SheetsError::Api {
                status: 403,
                message: "write refused by test".to_string(),
            });
        }
        state.writes += 1;
        Ok(())
    }
}

fn put(grid: &mut Vec<Vec<String>>, row: u32, col: u32, value: &str) {
    let (r, c) = (row as usize - 1, col as usize - 1);
    if grid.len() <= r {
        grid.resize(r + 1, Vec::new());
    }
    if grid[r].len() <= c {
        grid[r].resize(c + 1, String::new());
    }
    grid[r][c] = value.to_string();
}

#[async_trait]
impl Spreadsheet for MemorySheets {
    async fn worksheets(&self) -> Result<Vec<Worksheet>, SheetsError> {
        let state = self.state.lock().unwrap();
        let mut list: Vec<Worksheet> = state.sheets.iter().map(|s| s.ws.clone()).collect();
        list.sort_by_key(|w| w.index);
        Ok(list)
    }

    async fn add_worksheet(
        &self,
        title: &str,
        _rows: u32,
        _cols: u32,
    ) -> Result<Worksheet, SheetsError> {
        self.count_write()?;
        Ok(self.insert_sheet(title, Vec::new()))
    }

    async fn rename_worksheet(
        &self,
        sheet: &Worksheet,
        title: &str,
    ) -> Result<Worksheet, SheetsError> {
        self.count_write()?;
        self.with_sheet(sheet, |s| {
            s.ws.title = title.to_string();
            s.ws.clone()
        })
    }

    async fn clear(&self, sheet: &Worksheet) -> Result<(), SheetsError> {
        self.count_write()?;
        self.with_sheet(sheet, |s| s.grid.clear())
    }

    async fn row_values(&self, sheet: &Worksheet, row: u32) -> Result<Vec<String>, SheetsError> {
        self.with_sheet(sheet, |s| {
            trim_trailing(s.grid.get(row as usize - 1).cloned().unwrap_or_default())
        })
    }

    async fn col_values(&self, sheet: &Worksheet, col: u32) -> Result<Vec<String>, SheetsError> {
        self.with_sheet(sheet, |s| {
            trim_trailing(
                s.grid
                    .iter()
                    .map(|r| r.get(col as usize - 1).cloned().unwrap_or_default())
                    .collect(),
            )
        })
    }

    async fn batch_write(
        &self,
        sheet: &Worksheet,
        writes: &[CellWrite],
    ) -> Result<(), SheetsError> {
        self.count_write()?;
        self.with_sheet(sheet, |s| {
            for w in writes {
                let (row, col) = a1_to_rowcol(&w.anchor).expect("valid anchor");
                for (dr, values) in w.values.iter().enumerate() {
                    for (dc, value) in values.iter().enumerate() {
                        put(&mut s.grid, row + dr as u32, col + dc as u32, value);
                    }
                }
            }
        })
    }

    async fn append_rows(
        &self,
        sheet: &Worksheet,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        self.count_write()?;
        self.with_sheet(sheet, |s| {
            let last = s
                .grid
                .iter()
                .rposition(|r| r.iter().any(|c| !c.is_empty()))
                .map_or(0, |i| i + 1);
            for (i, values) in rows.iter().enumerate() {
                for (c, value) in values.iter().enumerate() {
                    put(&mut s.grid, (last + i + 1) as u32, c as u32 + 1, value);
                }
            }
        })
    }

    async fn replace_conditional_rules(
        &self,
        sheet: &Worksheet,
        rules: &[TextRule],
    ) -> Result<(), SheetsError> {
        self.count_write()?;
        self.with_sheet(sheet, |s| s.rules = rules.to_vec())
    }

    async fn format_header(&self, sheet: &Worksheet, _cols: u32) -> Result<(), SheetsError> {
        self.count_write()?;
        self.with_sheet(sheet, |s| s.header_formatted = true)
    }
}
