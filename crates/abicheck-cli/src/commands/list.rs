//! List command - show the built-in cases

use abicheck_runtime::suite::builtin;
use abicheck_runtime::CaseTable;
use anyhow::Result;
use std::io::{self, Write};

/// Write `index:signature` per case, or a JSON array
pub fn write_cases<W: Write>(out: &mut W, cases: &CaseTable, json: bool) -> Result<()> {
    if json {
        let entries: Vec<_> = cases
            .cases()
            .iter()
            .enumerate()
            .map(|(index, case)| {
                serde_json::json!({
                    "index": index,
                    "signature": case.signature(),
                })
            })
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
    } else {
        for (index, case) in cases.cases().iter().enumerate() {
            writeln!(out, "{}:{}", index, case.signature())?;
        }
    }
    Ok(())
}

pub fn run(json: bool) -> Result<()> {
    let stdout = io::stdout();
    write_cases(&mut stdout.lock(), &builtin::cases(), json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_plain() {
        let mut buf = Vec::new();
        write_cases(&mut buf, &builtin::cases(), false).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(text.lines().count(), builtin::cases().len());
        assert!(text.starts_with("0:v\n1:ii\n"));
    }

    #[test]
    fn test_list_json() {
        let mut buf = Vec::new();
        write_cases(&mut buf, &builtin::cases(), true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), builtin::cases().len());
        assert_eq!(entries[1]["signature"], "ii");
    }
}
