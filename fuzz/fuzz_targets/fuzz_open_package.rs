#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_parts::{OpenOptions, RecordReader, SpreadsheetPackage};

/// Keep per-input work bounded; ZIP bombs are caught by the part size limit below.
const MAX_INPUT_BYTES: usize = 256 * 1024;
const MAX_PART_BYTES: u64 = 1024 * 1024;
const MAX_ENTRIES: usize = 256;
const MAX_RECORDS: usize = 10_000;

fn drain(reader: &mut RecordReader) {
    for _ in 0..MAX_RECORDS {
        match reader.next_record() {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let options = OpenOptions::default()
        .with_max_part_bytes(MAX_PART_BYTES)
        .with_max_entries(MAX_ENTRIES)
        .with_require_workbook(false);

    let Ok(mut pkg) =
        SpreadsheetPackage::open_with_options(std::io::Cursor::new(data.to_vec()), options)
    else {
        return;
    };

    if let Ok(mut reader) = pkg.workbook_reader() {
        drain(&mut reader);
    }
    if let Ok(Some(mut reader)) = pkg.shared_strings_reader() {
        drain(&mut reader);
    }
    if let Ok(Some(mut reader)) = pkg.styles_reader() {
        drain(&mut reader);
    }

    let sheets = pkg.worksheet_part_names().unwrap_or_default();
    for sheet in sheets.iter().take(16) {
        if let Ok(Some(mut reader)) = pkg.worksheet_reader(sheet) {
            drain(&mut reader);
        }
        if let Ok(Some(mut reader)) = pkg.comments_reader(sheet) {
            drain(&mut reader);
        }
    }

    pkg.close();
    pkg.close();
});
