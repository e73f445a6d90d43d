//! Decoders for the two snapshot body record kinds.
//!
//! Both decoders are pure: one raw fixed-width line in, one CSV row
//! (without trailing newline) out, no shared state.
//!
//! Company record layout (byte offsets, half-open):
//! - 0–8   registry identifier
//! - 9–10  status code
//! - 32–36 officer count (decimal)
//! - 36–40 name length (decimal)
//! - 40–   name (space padded, length from the preceding field)
//!
//! Person record layout:
//! - 0–8   registry identifier
//! - 8–9   appointment-date origin
//! - 10–12 appointment type
//! - 12–24 person number
//! - 24–25 corporate indicator
//! - 25–33 appointment date
//! - 33–41 resignation date
//! - 41–49 postcode
//! - 49–57 partial date of birth
//! - 57–65 full date of birth
//! - 65–69 free-text length (decimal)
//! - 69–   free-text block: up to 14 fields delimited by `<`

use crate::field::{decimal, escape, slice};

/// Header row of the companies output file.
pub const COMPANIES_HEADER: &str =
    "Company Number,Company Status,Number of Officers,Company Name";

/// Header row of the persons output file.
pub const PERSONS_HEADER: &str = "Company Number,App Date Origin,Appointment Type,\
Person number,Corporate indicator,Appointment Date,Resignation Date,Person Postcode,\
Partial Date of Birth,Full Date of Birth,Title,Forenames,Surname,Honours,Care_of,\
PO_box,Address line 1,Address line 2,Post_town,County,Country,Occupation,Nationality,\
Resident Country";

/// Delimiter and fill character of the person free-text block.
const FILLER: char = '<';

/// Number of free-text columns in a person row.
const FREE_TEXT_FIELDS: usize = 14;

/// Decode a company body line into a CSV row.
///
/// The name is clamped to the line length and trimmed of trailing spaces
/// only; leading spaces are part of the value.
///
/// ```
/// use snapshots_rs::decode_company;
///
/// let line = "SC1234561A                      00030012ACME WIDGETS";
/// assert_eq!(decode_company(line), "SC123456,A,3,ACME WIDGETS");
/// ```
pub fn decode_company(line: &str) -> String {
    let number = slice(line, 0, 8);
    let status = slice(line, 9, 10);
    let officers = decimal(slice(line, 32, 36));
    let name_length = decimal(slice(line, 36, 40));
    let name = slice(line, 40, 40 + name_length).trim_end_matches(' ');
    format!("{number},{status},{officers},{}", escape(name))
}

/// Decode a person body line into a CSV row.
///
/// Emits 10 fixed columns followed by exactly 14 free-text columns.
/// Trailing filler runs in the free-text block are stripped before
/// splitting, missing fields come out empty, and fields past the 14th
/// are discarded.
pub fn decode_person(line: &str) -> String {
    let fixed = [
        slice(line, 0, 8),   // registry identifier
        slice(line, 8, 9),   // appointment-date origin
        slice(line, 10, 12), // appointment type
        slice(line, 12, 24), // person number
        slice(line, 24, 25), // corporate indicator
        slice(line, 25, 33), // appointment date
        slice(line, 33, 41), // resignation date
        slice(line, 41, 49), // postcode
        slice(line, 49, 57), // partial date of birth
        slice(line, 57, 65), // full date of birth
    ];

    let block_length = decimal(slice(line, 65, 69));
    let block = slice(line, 69, 69 + block_length).trim_end_matches(FILLER);

    let mut parts = [""; FREE_TEXT_FIELDS];
    if !block.is_empty() {
        // One extra split so a 15th piece absorbs anything past the last
        // kept delimiter instead of bleeding into field 14.
        let pieces = block.splitn(FREE_TEXT_FIELDS + 1, FILLER);
        for (slot, piece) in parts.iter_mut().zip(pieces) {
            *slot = piece.trim();
        }
    }

    let mut row = String::with_capacity(256);
    for (i, value) in fixed.iter().enumerate() {
        if i > 0 {
            row.push(',');
        }
        row.push_str(&escape(value));
    }
    for value in parts {
        row.push(',');
        row.push_str(&escape(value));
    }
    row
}
