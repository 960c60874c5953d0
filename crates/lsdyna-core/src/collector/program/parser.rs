//! Parser for the `lstc_qrun -p` running programs report.
//!
//! Data rows have exactly eight whitespace separated columns:
//!
//! ```text
//!     User             Host          Program              Started       # procs
//!      hna    84212@o0284.ten.osc.ed MPPDYNA          Tue Mar 17 16:18    28
//! ```
//!
//! user = column 0, program = column 2, CPUs = column 7.

use tracing::warn;

use super::ProgramUsageRecord;

const FIELD_COUNT: usize = 8;

/// Parses the running programs report, skipping headers and malformed rows.
pub fn parse_programs(raw: &str) -> Vec<ProgramUsageRecord> {
    let mut records = Vec::new();
    for line in raw.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != FIELD_COUNT {
            continue;
        }
        let used = match fields[7].parse::<f64>() {
            Ok(used) => used,
            Err(_) => {
                warn!(line, item = fields[7], "error converting to float");
                continue;
            }
        };
        records.push(ProgramUsageRecord {
            user: fields[0].to_string(),
            program: fields[2].to_string(),
            used,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::PROGRAM_STDOUT;

    #[test]
    fn test_parse_report() {
        let records = parse_programs(PROGRAM_STDOUT);
        assert_eq!(
            records,
            vec![
                ProgramUsageRecord {
                    user: "hna".into(),
                    program: "MPPDYNA".into(),
                    used: 28.0,
                },
                ProgramUsageRecord {
                    user: "sciappst".into(),
                    program: "MPPDYNA".into(),
                    used: 10.0,
                },
            ]
        );
    }

    #[test]
    fn test_only_eight_field_rows() {
        let input = "\
    User             Host          Program              Started       # procs
-----------------------------------------------------------------------------
No programs queued
     hna    84212@o0284.ten.osc.ed MPPDYNA          Tue Mar 17 16:18
     hna    84212@o0284.ten.osc.ed MPPDYNA          Tue Mar 17 16:18    28  extra
";
        assert!(parse_programs(input).is_empty());
    }

    #[test]
    fn test_bad_cpu_count_skipped() {
        let input = "\
     hna    84212@o0284.ten.osc.ed MPPDYNA          Tue Mar 17 16:18    many
     bob    11111@o0001.ten.osc.ed LS-DYNA          Wed Mar 18 09:00    4
";
        let records = parse_programs(input);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user, "bob");
        assert_eq!(records[0].program, "LS-DYNA");
        assert_eq!(records[0].used, 4.0);
    }

    #[test]
    fn test_fractional_cpus() {
        let input = "u1 1@h P Mon Jan 1 00:00 2.5\n";
        assert_eq!(parse_programs(input)[0].used, 2.5);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_programs("").is_empty());
        assert!(parse_programs("\n\n").is_empty());
    }
}
