/// Column number to letters: 1 -> A, 26 -> Z, 27 -> AA.
pub fn column_letters(col: u32) -> String {
    let mut n = col.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn rowcol_to_a1(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

/// `'Title'!range`, with embedded quotes doubled.
pub fn qualified(title: &str, range: &str) -> String {
    format!("'{}'!{}", title.replace('\'', "''"), range)
}

/// The whole worksheet as a range.
pub fn whole_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Parses `B12` into `(12, 2)`.
#[cfg(test)]
pub fn a1_to_rowcol(cell: &str) -> Option<(u32, u32)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0u32, |acc, c| acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1));
    let row = digits.parse().ok().filter(|r| *r > 0)?;
    Some((row, col))
}
